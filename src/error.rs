use thiserror::Error;

use crate::dataset::DatasetError;
use crate::import::ImportError;
use crate::store::StoreError;
use crate::table::EditError;

/// Everything a dataset page operation can fail with. None of these leave the
/// page unusable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl Error {
    /// Text for a transient notice.
    pub fn user_message(&self) -> String {
        match self {
            Error::Store(e) => e.user_message(),
            Error::Import(ImportError::Store { persisted, source }) => format!(
                "Import stopped after {} record(s). {}",
                persisted,
                source.user_message()
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
