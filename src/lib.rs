//! Filipino emigrant statistics: dataset descriptors, CSV import, aggregation,
//! an editable-table model and pluggable record stores.

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod import;
pub mod page;
pub mod record;
pub mod store;
pub mod table;

pub use error::{Error, Result};
