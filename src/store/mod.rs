// src/store/mod.rs
pub mod memory;
pub mod parquet_store;
pub mod unique;

use std::future::Future;
use thiserror::Error;

use crate::record::{Record, RecordId, StoredRecord};

pub use self::memory::MemoryStore;
pub use self::parquet_store::ParquetStore;
pub use self::unique::UniqueYears;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record `{0}` not found")]
    NotFound(RecordId),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("store backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    /// Stable code, independent of the backend.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not-found",
            StoreError::PermissionDenied(_) => "permission-denied",
            StoreError::InvalidArgument(_) => "invalid-argument",
            StoreError::Corrupt(_) => "corrupt",
            StoreError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                "permission-denied"
            }
            StoreError::Io(_) => "io",
            StoreError::Arrow(_) | StoreError::Parquet(_) | StoreError::Backend(_) => "backend",
        }
    }

    /// Message suitable for a notice shown to a person.
    pub fn user_message(&self) -> String {
        match self.code() {
            "not-found" => "The record no longer exists. Reload and try again.".to_string(),
            "permission-denied" => {
                "You do not have permission to change this dataset.".to_string()
            }
            "invalid-argument" => format!("The store rejected the data: {}", self),
            _ => format!("Store error: {}", self),
        }
    }
}

/// One dataset collection in a document store.
///
/// Callers await each operation before issuing the next; implementations only
/// need to be safe against concurrent callers, not fair to them.
pub trait RecordStore: Send + Sync {
    /// Insert a new document and return its assigned id.
    fn create(
        &self,
        record: &Record,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// All documents, in insertion order.
    fn list(&self) -> impl Future<Output = Result<Vec<StoredRecord>, StoreError>> + Send;

    /// Full overwrite of an existing document.
    fn update(
        &self,
        id: &RecordId,
        record: &Record,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove a document. Returns whether it existed; a missing id is not an error.
    fn delete(&self, id: &RecordId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
