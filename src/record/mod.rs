// src/record/mod.rs
pub mod coerce;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

pub use coerce::{coerce_count, parse_year, MAX_COUNT};

/// Opaque, store-assigned identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Fresh random id, as assigned by the stores on create.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One year's counts across a dataset's categories.
///
/// Categories are keyed by their canonical key; a key that is absent reads as 0.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    pub year: i32,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl Record {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            counts: BTreeMap::new(),
        }
    }

    /// Builder-style setter, mostly handy in tests and the CLI.
    pub fn with(mut self, key: &str, value: u64) -> Self {
        self.counts.insert(key.to_string(), value);
        self
    }

    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: &str, value: u64) {
        self.counts.insert(key.to_string(), value);
    }
}

/// A record as returned by a store: the record plus its id and last write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: Record,
}

impl StoredRecord {
    pub fn year(&self) -> i32 {
        self.record.year
    }

    pub fn count(&self, key: &str) -> u64 {
        self.record.count(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_category_reads_as_zero() {
        let r = Record::new(2019).with("single", 100);
        assert_eq!(r.count("single"), 100);
        assert_eq!(r.count("married"), 0);
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn record_serializes_flat() {
        let r = Record::new(2020).with("male", 3).with("female", 4);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["year"], 2020);
        assert_eq!(v["male"], 3);
        assert_eq!(v["female"], 4);
    }
}
