use arrow::{
    array::{Array, ArrayRef, Int32Array, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

use super::{RecordStore, StoreError};
use crate::dataset::DatasetDescriptor;
use crate::record::{Record, RecordId, StoredRecord};

const SNAPSHOT: &str = "records.parquet";
const FIXED_COLUMNS: [&str; 3] = ["id", "year", "updated_at"];

/// Where a collection lives on disk and which category columns it always has.
///
/// Count columns the descriptor does not name (written under a wider
/// descriptor) are read back and written out again untouched.
#[derive(Clone)]
struct Layout {
    path: PathBuf,
    tmp_path: PathBuf,
    keys: Arc<Vec<String>>,
}

impl Layout {
    fn schema_for(keys: &[String]) -> ArrowSchema {
        let mut fields = vec![
            Field::new("id", ArrowDataType::Utf8, false),
            Field::new("year", ArrowDataType::Int32, false),
            Field::new(
                "updated_at",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ];
        fields.extend(
            keys.iter()
                .map(|k| Field::new(k.as_str(), ArrowDataType::UInt64, false)),
        );
        ArrowSchema::new(fields)
    }

    fn read(&self) -> Result<Vec<StoredRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(1024)
            .build()?;

        let mut rows = Vec::new();
        for batch in reader {
            self.decode(&batch?, &mut rows)?;
        }
        Ok(rows)
    }

    /// Category columns absent from the file (an older descriptor) read as 0.
    fn decode(&self, batch: &RecordBatch, out: &mut Vec<StoredRecord>) -> Result<(), StoreError> {
        let ids = column::<StringArray>(batch, "id")?;
        let years = column::<Int32Array>(batch, "year")?;
        let times = column::<TimestampMicrosecondArray>(batch, "updated_at")?;
        let schema = batch.schema();
        let counts: Vec<(&str, &UInt64Array)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .filter(|(f, _)| !FIXED_COLUMNS.contains(&f.name().as_str()))
            .filter_map(|(f, c)| {
                c.as_any()
                    .downcast_ref::<UInt64Array>()
                    .map(|c| (f.name().as_str(), c))
            })
            .collect();

        for row in 0..batch.num_rows() {
            let mut record = Record::new(years.value(row));
            for key in self.keys.iter() {
                record.set(key, 0);
            }
            for (key, col) in &counts {
                if !col.is_null(row) {
                    record.set(key, col.value(row));
                }
            }
            let updated_at = DateTime::<Utc>::from_timestamp_micros(times.value(row))
                .ok_or_else(|| StoreError::Corrupt(format!("bad timestamp at row {}", row)))?;
            out.push(StoredRecord {
                id: RecordId::from(ids.value(row)),
                updated_at,
                record,
            });
        }
        Ok(())
    }

    /// Rewrite the whole snapshot: write `.tmp`, then rename over the old file.
    fn write(&self, rows: &[StoredRecord]) -> Result<(), StoreError> {
        let extras: BTreeSet<&str> = rows
            .iter()
            .flat_map(|r| r.record.counts.keys())
            .map(String::as_str)
            .filter(|k| !self.keys.iter().any(|known| known == k))
            .collect();
        if !extras.is_empty() {
            debug!(?extras, "keeping columns outside the descriptor");
        }
        let mut keys: Vec<String> = self.keys.to_vec();
        keys.extend(extras.into_iter().map(str::to_string));
        let schema = Arc::new(Self::schema_for(&keys));

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year()))),
            Arc::new(TimestampMicrosecondArray::from_iter_values(
                rows.iter().map(|r| r.updated_at.timestamp_micros()),
            )),
        ];
        for key in &keys {
            columns.push(Arc::new(UInt64Array::from_iter_values(
                rows.iter().map(|r| r.count(key)),
            )));
        }
        let batch = RecordBatch::try_new(schema.clone(), columns)?;

        let file = File::create(&self.tmp_path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer =
            ArrowWriter::try_new(BufWriter::new(file), schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::Corrupt(format!("missing or mistyped `{}` column", name)))
}

/// A collection persisted as one Parquet snapshot under `<root>/<collection>/`.
///
/// Every mutation rewrites the snapshot, which is fine at the tens-to-hundreds
/// of records a dataset holds. Writers are serialized within the process;
/// across processes the last rename wins.
pub struct ParquetStore {
    layout: Layout,
    write_lock: Mutex<()>,
}

impl ParquetStore {
    pub fn open(root: impl AsRef<Path>, descriptor: &DatasetDescriptor) -> Result<Self, StoreError> {
        let dir = root.as_ref().join(&descriptor.collection);
        fs::create_dir_all(&dir)?;
        let keys: Vec<String> = descriptor.keys().map(str::to_string).collect();
        Ok(Self {
            layout: Layout {
                path: dir.join(SNAPSHOT),
                tmp_path: dir.join(format!("{}.tmp", SNAPSHOT)),
                keys: Arc::new(keys),
            },
            write_lock: Mutex::new(()),
        })
    }

    /// Names of the collections that have a snapshot under `root`.
    pub fn collections(root: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}/*/{}", root.as_ref().display(), SNAPSHOT);
        let paths = glob(&pattern).map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut names: Vec<String> = paths
            .filter_map(Result::ok)
            .filter_map(|p| {
                p.parent()
                    .and_then(|d| d.file_name())
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn path(&self) -> &Path {
        &self.layout.path
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Layout) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || f(&layout))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {}", e)))?
    }
}

impl RecordStore for ParquetStore {
    async fn create(&self, record: &Record) -> Result<RecordId, StoreError> {
        let _guard = self.write_lock.lock().await;
        let id = RecordId::generate();
        let doc = StoredRecord {
            id: id.clone(),
            updated_at: Utc::now(),
            record: record.clone(),
        };
        self.run(move |layout| {
            let mut rows = layout.read()?;
            rows.push(doc);
            layout.write(&rows)
        })
        .await?;
        debug!(id = %id, year = record.year, path = %self.layout.path.display(), "created");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.run(|layout| layout.read()).await
    }

    async fn update(&self, id: &RecordId, record: &Record) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let id = id.clone();
        let record = record.clone();
        self.run(move |layout| {
            let mut rows = layout.read()?;
            let doc = rows
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let kept: Vec<(String, u64)> = doc
                .record
                .counts
                .iter()
                .filter(|(k, _)| !layout.keys.contains(*k))
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            doc.record = record;
            for (k, v) in kept {
                doc.record.counts.entry(k).or_insert(v);
            }
            doc.updated_at = Utc::now();
            layout.write(&rows)
        })
        .await
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let id = id.clone();
        self.run(move |layout| {
            let mut rows = layout.read()?;
            let before = rows.len();
            rows.retain(|d| d.id != id);
            if rows.len() == before {
                return Ok(false);
            }
            layout.write(&rows)?;
            Ok(true)
        })
        .await
    }
}
