// src/config.rs
use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::dataset::{DatasetDescriptor, Registry};
use crate::page::DEFAULT_NOTICE_TTL_SECS;

/// How a store treats a second record for a year that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateYears {
    /// Keep both; aggregates add them together.
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub notice_ttl_secs: i64,
    pub duplicate_years: DuplicateYears,
    /// Extra datasets, or replacements for built-ins with the same name.
    pub datasets: Vec<DatasetDescriptor>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            notice_ttl_secs: DEFAULT_NOTICE_TTL_SECS,
            duplicate_years: DuplicateYears::Allow,
            datasets: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from a YAML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings = Self::from_yaml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), datasets = settings.datasets.len(), "config loaded");
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)?;
        if settings.notice_ttl_secs < 0 {
            anyhow::bail!("notice_ttl_secs must not be negative");
        }
        settings.notice_ttl()?;
        Ok(settings)
    }

    pub fn notice_ttl(&self) -> Result<Duration> {
        Duration::try_seconds(self.notice_ttl_secs)
            .with_context(|| format!("notice_ttl_secs {} is out of range", self.notice_ttl_secs))
    }

    pub fn registry(&self) -> Result<Registry> {
        Registry::with_overrides(&self.datasets).context("invalid dataset in config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_without_file() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.registry().unwrap().len(), 6);
    }

    #[test]
    fn yaml_overrides_and_extends() {
        let yaml = r#"
data_dir: /var/lib/emistats
duplicate_years: reject
datasets:
  - name: region
    title: Emigrants by Region of Origin
    collection: emigrant_region
    chart: choropleth
    categories:
      - { key: ncr, label: National Capital Region, aliases: [NCR, Metro Manila] }
      - { key: calabarzon, label: CALABARZON }
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.data_dir, PathBuf::from("/var/lib/emistats"));
        assert_eq!(s.duplicate_years, DuplicateYears::Reject);
        assert_eq!(s.notice_ttl_secs, DEFAULT_NOTICE_TTL_SECS);

        let reg = s.registry().unwrap();
        assert_eq!(reg.len(), 7);
        let region = reg.get("region").unwrap();
        assert_eq!(region.categories[0].aliases, vec!["NCR", "Metro Manila"]);
    }

    #[test]
    fn unknown_keys_and_bad_datasets_are_errors() {
        assert!(Settings::from_yaml("data_dirr: x\n").is_err());
        assert!(Settings::from_yaml("notice_ttl_secs: -1\n").is_err());
        assert!(Settings::from_yaml("notice_ttl_secs: 9223372036854775807\n").is_err());
        let s = Settings::from_yaml("notice_ttl_secs: 86400\n").unwrap();
        assert_eq!(s.notice_ttl().unwrap(), Duration::days(1));

        let s = Settings::from_yaml(
            "datasets:\n  - { name: x, title: X, collection: c, chart: bar, categories: [] }\n",
        )
        .unwrap();
        assert!(s.registry().is_err());
    }
}
