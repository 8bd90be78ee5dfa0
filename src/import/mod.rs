// src/import/mod.rs
pub mod export;

use csv::{ReaderBuilder, StringRecord, Trim};
use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dataset::{normalize_header, DatasetDescriptor};
use crate::record::{coerce_count, parse_year, Record};
use crate::store::{RecordStore, StoreError};

pub use export::{export_file, write_csv};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("`{0}` is not a .csv file")]
    NotCsv(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("file has no header row")]
    MissingHeader,
    #[error("import stopped after {persisted} record(s): {source}")]
    Store {
        persisted: usize,
        #[source]
        source: StoreError,
    },
}

/// Records parsed from a file, before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedImport {
    pub records: Vec<Record>,
    /// 1-based file lines of rows dropped for lacking a usable year.
    pub skipped_lines: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub persisted: usize,
    pub skipped_lines: Vec<u64>,
}

/// Header positions resolved once per file.
#[derive(Debug)]
struct ColumnMap<'a> {
    year: Option<usize>,
    categories: Vec<(&'a str, Option<usize>)>,
}

impl<'a> ColumnMap<'a> {
    fn resolve(headers: &StringRecord, descriptor: &'a DatasetDescriptor) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let find_exact = |name: &str| headers.iter().position(|h| h == name);
        let find_normalized =
            |name: &str| normalized.iter().position(|h| h.as_str() == name);

        let year = ["year", "Year", "YEAR"]
            .iter()
            .find_map(|n| find_exact(*n))
            .or_else(|| find_normalized("year"));

        let categories = descriptor
            .categories
            .iter()
            .map(|cat| {
                let idx = find_exact(cat.key.as_str())
                    .or_else(|| find_exact(cat.label.as_str()))
                    .or_else(|| {
                        cat.header_candidates()
                            .iter()
                            .find_map(|c| find_normalized(c.as_str()))
                    });
                (cat.key.as_str(), idx)
            })
            .collect();

        Self { year, categories }
    }

    fn unmatched(&self) -> Vec<&'a str> {
        self.categories
            .iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Parse delimited text into normalized records for `descriptor`.
///
/// Rows without a numeric year are skipped; unknown columns are ignored and
/// categories with no matching column are 0.
pub fn parse_records<R: Read>(
    reader: R,
    descriptor: &DatasetDescriptor,
) -> Result<ParsedImport, ImportError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::MissingHeader);
    }

    let columns = ColumnMap::resolve(&headers, descriptor);
    if columns.year.is_none() {
        warn!(dataset = %descriptor.name, "no year column; every row will be skipped");
    }
    let unmatched = columns.unmatched();
    if !unmatched.is_empty() {
        debug!(dataset = %descriptor.name, ?unmatched, "categories without a column default to 0");
    }

    let mut parsed = ParsedImport::default();
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let year = columns
            .year
            .and_then(|i| row.get(i))
            .and_then(parse_year);
        let Some(year) = year else {
            debug!(line, "row skipped: missing or non-numeric year");
            parsed.skipped_lines.push(line);
            continue;
        };

        let mut record = Record::new(year);
        for (key, idx) in &columns.categories {
            let value = idx.and_then(|i| row.get(i)).map(coerce_count).unwrap_or(0);
            record.set(key, value);
        }
        parsed.records.push(record);
    }

    Ok(parsed)
}

/// Write `records` one at a time, in order. Stops at the first failure;
/// earlier writes stay.
pub async fn persist<S: RecordStore>(store: &S, records: &[Record]) -> Result<usize, ImportError> {
    let mut persisted = 0;
    for record in records {
        if let Err(source) = store.create(record).await {
            return Err(ImportError::Store { persisted, source });
        }
        persisted += 1;
    }
    Ok(persisted)
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Read, parse and persist a `.csv` file. Nothing is written unless the
/// whole file parses.
#[tracing::instrument(level = "info", skip(store, descriptor, path), fields(dataset = %descriptor.name, path = %path.as_ref().display()))]
pub async fn import_file<S: RecordStore, P: AsRef<Path>>(
    store: &S,
    descriptor: &DatasetDescriptor,
    path: P,
) -> Result<ImportReport, ImportError> {
    let path = path.as_ref();
    if !has_csv_extension(path) {
        return Err(ImportError::NotCsv(path.to_path_buf()));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let parsed = parse_records(Cursor::new(bytes), descriptor)?;
    info!(
        rows = parsed.records.len(),
        skipped = parsed.skipped_lines.len(),
        "parsed"
    );

    let persisted = persist(store, &parsed.records).await?;
    info!(persisted, "imported");
    Ok(ImportReport {
        persisted,
        skipped_lines: parsed.skipped_lines,
    })
}
