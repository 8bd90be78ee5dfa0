// src/page/mod.rs
pub mod notice;

use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, error, info};

use crate::aggregate::{self, Summary, YearFilter, YearPoint};
use crate::dataset::DatasetDescriptor;
use crate::error::{Error, Result};
use crate::import::{self, ImportReport};
use crate::record::{RecordId, StoredRecord};
use crate::store::{RecordStore, StoreError};
use crate::table::{self, EditError, EditSession, RecordForm, TableRow};

pub use notice::{Notice, NoticeKind};

pub const DEFAULT_NOTICE_TTL_SECS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The confirmation was declined; nothing happened.
    Cancelled,
    Deleted,
    /// The store had no such record.
    Missing,
}

/// One dataset's view: cached records, year filter, edit session and notice.
///
/// The cache is only ever replaced wholesale from the store; every write is
/// followed by a reload.
pub struct DatasetPage<S> {
    descriptor: DatasetDescriptor,
    store: S,
    records: Vec<StoredRecord>,
    filter: YearFilter,
    session: EditSession,
    notice: Option<Notice>,
    notice_ttl: Duration,
}

impl<S: RecordStore> DatasetPage<S> {
    pub fn new(descriptor: DatasetDescriptor, store: S) -> Self {
        Self {
            descriptor,
            store,
            records: Vec::new(),
            filter: YearFilter::All,
            session: EditSession::new(),
            notice: None,
            notice_ttl: Duration::seconds(DEFAULT_NOTICE_TTL_SECS),
        }
    }

    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    /// Build the page and do the initial fetch.
    pub async fn open(descriptor: DatasetDescriptor, store: S) -> Result<Self> {
        let mut page = Self::new(descriptor, store);
        page.reload().await?;
        Ok(page)
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    pub fn filter(&self) -> YearFilter {
        self.filter
    }

    pub fn editing(&self) -> Option<&RecordId> {
        self.session.editing()
    }

    /// Replace the cache with a fresh fetch, ordered by year.
    pub async fn reload(&mut self) -> Result<()> {
        match self.store.list().await {
            Ok(mut docs) => {
                docs.sort_by_key(|d| d.year());
                debug!(dataset = %self.descriptor.name, records = docs.len(), "reloaded");
                self.records = docs;
                Ok(())
            }
            Err(e) => Err(self.fail("load", e.into())),
        }
    }

    pub fn select_year(&mut self, filter: YearFilter) {
        self.filter = filter;
    }

    pub fn summary(&self) -> Summary {
        aggregate::summarize(&self.records, &self.descriptor, self.filter)
    }

    /// Years for the selector; not affected by the current filter.
    pub fn years(&self) -> Vec<i32> {
        aggregate::years(&self.records)
    }

    pub fn series(&self) -> Vec<YearPoint> {
        aggregate::yearly_series(&self.records, &self.descriptor)
    }

    pub fn rows(&self) -> Vec<TableRow> {
        table::rows(&self.records, &self.descriptor, &self.session)
    }

    pub fn blank_form(&self) -> RecordForm {
        RecordForm::blank(&self.descriptor)
    }

    /// Add a single record. The year is validated before the store is touched.
    pub async fn add(&mut self, form: &RecordForm) -> Result<RecordId> {
        let record = match form.to_record(&self.descriptor) {
            Ok(r) => r,
            Err(EditError::InvalidYear) => {
                return Err(self.fail("add", Error::Validation("Year is required.".into())))
            }
            Err(e) => return Err(self.fail("add", e.into())),
        };
        let id = match self.store.create(&record).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail("add", e.into())),
        };
        info!(dataset = %self.descriptor.name, id = %id, year = record.year, "record added");
        self.reload().await?;
        self.succeed(format!("Added record for {}.", record.year));
        Ok(id)
    }

    /// Bulk import. The page reloads even when the import stopped part way.
    pub async fn import_file(&mut self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let outcome = import::import_file(&self.store, &self.descriptor, path).await;
        let wrote_any = match &outcome {
            Ok(report) => report.persisted > 0,
            Err(import::ImportError::Store { persisted, .. }) => *persisted > 0,
            Err(_) => false,
        };
        if wrote_any {
            self.reload().await?;
        }
        match outcome {
            Ok(report) => {
                self.succeed(format!("Imported {} record(s).", report.persisted));
                Ok(report)
            }
            Err(e) => Err(self.fail("import", e.into())),
        }
    }

    /// Open `id` for editing. Refused while another row is open.
    pub fn begin_edit(&mut self, id: &RecordId) -> Result<()> {
        let result = match self.records.iter().find(|d| &d.id == id) {
            Some(doc) => self.session.begin(doc, &self.descriptor).map(|_| ()).map_err(Error::from),
            None => Err(Error::Store(StoreError::NotFound(id.clone()))),
        };
        result.map_err(|e| self.fail("edit", e))
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let result = match self.session.form_mut() {
            Ok(form) => form.set(&self.descriptor, field, value),
            Err(e) => Err(e),
        };
        result.map_err(|e| self.fail("edit", e.into()))
    }

    pub fn cancel_edit(&mut self) {
        if let Some(id) = self.session.close() {
            debug!(id = %id, "edit cancelled");
        }
    }

    /// Full-record overwrite from the open draft. On failure the row stays open.
    pub async fn save_edit(&mut self) -> Result<()> {
        let (id, record) = match self.session.pending(&self.descriptor) {
            Ok(p) => p,
            Err(EditError::InvalidYear) => {
                return Err(self.fail("save", Error::Validation("Year is required.".into())))
            }
            Err(e) => return Err(self.fail("save", e.into())),
        };
        if let Err(e) = self.store.update(&id, &record).await {
            return Err(self.fail("save", e.into()));
        }
        self.session.close();
        info!(dataset = %self.descriptor.name, id = %id, year = record.year, "record updated");
        self.reload().await?;
        self.succeed(format!("Saved record for {}.", record.year));
        Ok(())
    }

    /// Delete after `confirm` agrees. Closes any open edit and reloads
    /// whatever the store answered.
    pub async fn delete<F>(&mut self, id: &RecordId, confirm: F) -> Result<DeleteOutcome>
    where
        F: FnOnce(&RecordId) -> bool,
    {
        if !confirm(id) {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.session.close();

        let result = self.store.delete(id).await;
        // A failed reload is logged by `reload`; the delete error wins.
        let reloaded = self.reload().await;
        let existed = match result {
            Ok(existed) => existed,
            Err(e) => return Err(self.fail("delete", e.into())),
        };
        reloaded?;
        if existed {
            info!(dataset = %self.descriptor.name, id = %id, "record deleted");
            self.succeed("Record deleted.");
            Ok(DeleteOutcome::Deleted)
        } else {
            debug!(id = %id, "delete of unknown record ignored");
            Ok(DeleteOutcome::Missing)
        }
    }

    /// The current notice, if it has not expired at `now`.
    pub fn notice(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.notice
            .as_ref()
            .filter(|n| n.is_live(now, self.notice_ttl))
    }

    fn succeed(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::success(message));
    }

    fn fail(&mut self, action: &str, err: Error) -> Error {
        error!(dataset = %self.descriptor.name, action, error = %err, "action failed");
        self.notice = Some(Notice::error(err.user_message()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::builtin;
    use crate::record::Record;
    use crate::store::{MemoryStore, UniqueYears};

    async fn page_with(records: &[Record]) -> DatasetPage<MemoryStore> {
        let store = MemoryStore::new();
        for r in records {
            store.create(r).await.unwrap();
        }
        DatasetPage::open(builtin::civil_status(), store).await.unwrap()
    }

    #[tokio::test]
    async fn reload_orders_by_year() {
        let page = page_with(&[Record::new(2021), Record::new(2019), Record::new(2020)]).await;
        let years: Vec<i32> = page.records().iter().map(|r| r.year()).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
        assert_eq!(page.years(), vec![2019, 2020, 2021]);
    }

    #[tokio::test]
    async fn add_requires_a_year_before_touching_the_store() {
        let mut page = page_with(&[]).await;
        let form = page.blank_form();
        let err = page.add(&form).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(page.store().list().await.unwrap().is_empty());
        let n = page.notice(Utc::now()).unwrap();
        assert_eq!(n.kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn add_creates_and_reloads() {
        let mut page = page_with(&[]).await;
        let mut form = page.blank_form();
        form.set(page.descriptor(), "year", "2022").unwrap();
        form.set(page.descriptor(), "Single", "12").unwrap();
        let id = page.add(&form).await.unwrap();
        assert_eq!(page.records().len(), 1);
        assert_eq!(page.records()[0].id, id);
        assert_eq!(page.records()[0].count("single"), 12);
        assert_eq!(page.notice(Utc::now()).unwrap().kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn edit_cancel_leaves_store_untouched() {
        let mut page = page_with(&[Record::new(2019).with("married", 50)]).await;
        let id = page.records()[0].id.clone();
        let before = page.store().list().await.unwrap();

        page.begin_edit(&id).unwrap();
        page.set_field("married", "60").unwrap();
        page.cancel_edit();

        assert!(page.editing().is_none());
        assert_eq!(page.store().list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn failed_save_stays_in_editing() {
        let mut page = page_with(&[Record::new(2019).with("married", 50)]).await;
        let id = page.records()[0].id.clone();
        page.begin_edit(&id).unwrap();
        page.set_field("married", "60").unwrap();

        page.store().set_read_only(true);
        let err = page.save_edit().await.unwrap_err();
        assert!(matches!(err, Error::Store(ref e) if e.code() == "permission-denied"));
        assert_eq!(page.editing(), Some(&id));
        assert_eq!(page.records()[0].count("married"), 50);

        page.store().set_read_only(false);
        page.save_edit().await.unwrap();
        assert!(page.editing().is_none());
        assert_eq!(page.records()[0].count("married"), 60);
    }

    #[tokio::test]
    async fn save_with_blank_year_is_a_validation_error() {
        let mut page = page_with(&[Record::new(2019)]).await;
        let id = page.records()[0].id.clone();
        page.begin_edit(&id).unwrap();
        page.set_field("year", " ").unwrap();
        let err = page.save_edit().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(page.editing(), Some(&id));
    }

    #[tokio::test]
    async fn second_edit_is_refused() {
        let mut page = page_with(&[Record::new(2019), Record::new(2020)]).await;
        let a = page.records()[0].id.clone();
        let b = page.records()[1].id.clone();
        page.begin_edit(&a).unwrap();
        let err = page.begin_edit(&b).unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::AlreadyEditing { .. })));
        let rows = page.rows();
        assert!(rows[0].edit_enabled);
        assert!(!rows[1].edit_enabled);
    }

    #[tokio::test]
    async fn refused_edits_raise_a_notice() {
        let mut page = page_with(&[Record::new(2019)]).await;
        let err = page.begin_edit(&RecordId::from("nope")).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotFound(_))));
        assert_eq!(page.notice(Utc::now()).unwrap().kind, NoticeKind::Error);

        let mut page = page_with(&[Record::new(2019)]).await;
        let err = page.set_field("single", "3").unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::NotEditing)));
        assert_eq!(page.notice(Utc::now()).unwrap().kind, NoticeKind::Error);

        let id = page.records()[0].id.clone();
        page.begin_edit(&id).unwrap();
        let err = page.set_field("spouses", "3").unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::UnknownField(_))));
        assert!(page.notice(Utc::now()).unwrap().message.contains("spouses"));
    }

    /// Every read fails; deletes are refused.
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        async fn create(&self, _: &Record) -> std::result::Result<RecordId, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn list(&self) -> std::result::Result<Vec<StoredRecord>, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn update(&self, _: &RecordId, _: &Record) -> std::result::Result<(), StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn delete(&self, _: &RecordId) -> std::result::Result<bool, StoreError> {
            Err(StoreError::PermissionDenied("read-only".into()))
        }
    }

    #[tokio::test]
    async fn delete_error_is_reported_over_reload_error() {
        let mut page = DatasetPage::new(builtin::sex(), BrokenStore);
        let err = page
            .delete(&RecordId::from("abc"), |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(ref e) if e.code() == "permission-denied"));
        let n = page.notice(Utc::now()).unwrap();
        assert_eq!(n.kind, NoticeKind::Error);
        assert!(n.message.contains("permission"));
    }

    #[tokio::test]
    async fn declined_delete_does_nothing() {
        let mut page = page_with(&[Record::new(2019)]).await;
        let id = page.records()[0].id.clone();
        let outcome = page.delete(&id, |_| false).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(page.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_closes_edit_and_missing_id_is_silent() {
        let mut page = page_with(&[Record::new(2019), Record::new(2020)]).await;
        let a = page.records()[0].id.clone();
        let b = page.records()[1].id.clone();
        page.begin_edit(&a).unwrap();

        let outcome = page.delete(&b, |_| true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(page.editing().is_none());
        assert_eq!(page.records().len(), 1);

        let outcome = page.delete(&b, |_| true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Missing);
        assert_eq!(page.records().len(), 1);
    }

    #[tokio::test]
    async fn notices_expire() {
        let mut page = page_with(&[])
            .await
            .with_notice_ttl(Duration::milliseconds(10));
        let mut form = page.blank_form();
        form.year = "2001".into();
        page.add(&form).await.unwrap();
        let raised = page.notice(Utc::now()).unwrap().raised_at;
        assert!(page.notice(raised + Duration::milliseconds(10)).is_none());
    }

    #[tokio::test]
    async fn duplicate_year_rejected_when_unique() {
        let store = UniqueYears::new(MemoryStore::new());
        let mut page = DatasetPage::open(builtin::sex(), store).await.unwrap();
        let mut form = page.blank_form();
        form.year = "2019".into();
        page.add(&form).await.unwrap();
        let err = page.add(&form).await.unwrap_err();
        assert!(matches!(err, Error::Store(ref e) if e.code() == "invalid-argument"));
        assert_eq!(page.records().len(), 1);
    }

    #[tokio::test]
    async fn summary_follows_selected_year() {
        let mut page = page_with(&[
            Record::new(2019).with("single", 100),
            Record::new(2020).with("single", 80),
        ])
        .await;
        assert_eq!(page.summary().total("single"), 180);
        page.select_year(YearFilter::Year(2019));
        assert_eq!(page.summary().total("single"), 100);
        assert_eq!(page.years(), vec![2019, 2020]);
    }
}
