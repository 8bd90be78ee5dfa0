use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{RecordStore, StoreError};
use crate::record::{Record, RecordId, StoredRecord};

/// Insertion-ordered collection held in memory.
///
/// Writes can be switched off to mimic a store that answers
/// `permission-denied`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<StoredRecord>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::Acquire) {
            return Err(StoreError::PermissionDenied(
                "collection is read-only".to_string(),
            ));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn create(&self, record: &Record) -> Result<RecordId, StoreError> {
        self.check_writable()?;
        let id = RecordId::generate();
        let mut docs = self.docs.write().await;
        docs.push(StoredRecord {
            id: id.clone(),
            updated_at: Utc::now(),
            record: record.clone(),
        });
        debug!(id = %id, year = record.year, "created");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.docs.read().await.clone())
    }

    async fn update(&self, id: &RecordId, record: &Record) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;
        let doc = docs
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        doc.record = record.clone();
        doc.updated_at = Utc::now();
        debug!(id = %id, year = record.year, "updated");
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|d| &d.id != id);
        Ok(docs.len() != before)
    }
}
