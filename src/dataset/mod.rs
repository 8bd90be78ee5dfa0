// src/dataset/mod.rs
pub mod builtin;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Lower-case and drop all whitespace, so `"Not Reported"`, `"notReported"`
/// and `"not reported"` compare equal.
pub fn normalize_header(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), "").to_lowercase()
}

/// A named bucket within a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Canonical field key as stored in records.
    pub key: String,
    /// Display label; also accepted as a column header.
    pub label: String,
    /// Extra header spellings.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Category {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            aliases: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Normalized spellings to try against headers, canonical key first.
    pub fn header_candidates(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2 + self.aliases.len());
        for name in std::iter::once(&self.key)
            .chain(std::iter::once(&self.label))
            .chain(self.aliases.iter())
        {
            let n = normalize_header(name);
            if !n.is_empty() && !out.contains(&n) {
                out.push(n);
            }
        }
        out
    }
}

/// Chart family a dataset is usually rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    Treemap,
    Choropleth,
}

/// Everything that distinguishes one dataset variant from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Short name used on the command line, e.g. `civil-status`.
    pub name: String,
    pub title: String,
    /// Store collection the records live in.
    pub collection: String,
    pub chart: ChartKind,
    pub categories: Vec<Category>,
}

impl DatasetDescriptor {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }

    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Find the category a user-typed field name refers to (key, label or alias).
    pub fn resolve_field(&self, name: &str) -> Option<&Category> {
        if let Some(c) = self.category(name) {
            return Some(c);
        }
        let n = normalize_header(name);
        self.categories
            .iter()
            .find(|c| c.header_candidates().contains(&n))
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.categories.is_empty() {
            return Err(DatasetError::NoCategories(self.name.clone()));
        }
        if self.collection.trim().is_empty() {
            return Err(DatasetError::NoCollection(self.name.clone()));
        }
        let mut seen = Vec::with_capacity(self.categories.len());
        for c in &self.categories {
            if c.key == "year" || c.key == "id" || c.key == "updated_at" {
                return Err(DatasetError::ReservedKey {
                    dataset: self.name.clone(),
                    key: c.key.clone(),
                });
            }
            if seen.contains(&&c.key) {
                return Err(DatasetError::DuplicateKey {
                    dataset: self.name.clone(),
                    key: c.key.clone(),
                });
            }
            seen.push(&c.key);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("unknown dataset `{0}`")]
    Unknown(String),
    #[error("dataset `{0}` has no categories")]
    NoCategories(String),
    #[error("dataset `{0}` has no collection name")]
    NoCollection(String),
    #[error("dataset `{dataset}` uses reserved key `{key}`")]
    ReservedKey { dataset: String, key: String },
    #[error("dataset `{dataset}` declares `{key}` twice")]
    DuplicateKey { dataset: String, key: String },
}

/// Named dataset descriptors: the built-ins plus anything configured.
#[derive(Debug, Clone)]
pub struct Registry {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

impl Registry {
    pub fn builtin() -> Self {
        let datasets = builtin::all()
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Self { datasets }
    }

    /// Built-ins overridden/extended by `extra`; same name replaces.
    pub fn with_overrides(extra: &[DatasetDescriptor]) -> Result<Self, DatasetError> {
        let mut reg = Self::builtin();
        for d in extra {
            d.validate()?;
            reg.datasets.insert(d.name.clone(), d.clone());
        }
        Ok(reg)
    }

    pub fn get(&self, name: &str) -> Result<&DatasetDescriptor, DatasetError> {
        self.datasets
            .get(name)
            .ok_or_else(|| DatasetError::Unknown(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
