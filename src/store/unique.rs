use tracing::warn;

use super::{RecordStore, StoreError};
use crate::record::{Record, RecordId, StoredRecord};

/// Adapter that keeps at most one record per year.
///
/// The check and the write are two separate store calls, so two processes
/// racing on the same year can still both succeed.
pub struct UniqueYears<S> {
    inner: S,
}

impl<S: RecordStore> UniqueYears<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn ensure_free(&self, year: i32, except: Option<&RecordId>) -> Result<(), StoreError> {
        let taken = self
            .inner
            .list()
            .await?
            .into_iter()
            .find(|d| d.year() == year && Some(&d.id) != except);
        if let Some(doc) = taken {
            warn!(year, existing = %doc.id, "duplicate year rejected");
            return Err(StoreError::InvalidArgument(format!(
                "a record for {} already exists ({})",
                year, doc.id
            )));
        }
        Ok(())
    }
}

impl<S: RecordStore> RecordStore for UniqueYears<S> {
    async fn create(&self, record: &Record) -> Result<RecordId, StoreError> {
        self.ensure_free(record.year, None).await?;
        self.inner.create(record).await
    }

    async fn list(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.list().await
    }

    async fn update(&self, id: &RecordId, record: &Record) -> Result<(), StoreError> {
        self.ensure_free(record.year, Some(id)).await?;
        self.inner.update(id, record).await
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }
}
