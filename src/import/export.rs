use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{fs, io::Write, path::Path};

use crate::dataset::DatasetDescriptor;
use crate::record::StoredRecord;

/// Write records as CSV: `year` then every category key, in descriptor order.
/// The output re-imports to the same records.
pub fn write_csv<W: Write>(
    writer: W,
    descriptor: &DatasetDescriptor,
    records: &[StoredRecord],
) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let mut header = vec!["year"];
    header.extend(descriptor.keys());
    wtr.write_record(&header).context("writing CSV header")?;

    for doc in records {
        let mut row = Vec::with_capacity(header.len());
        row.push(doc.year().to_string());
        row.extend(descriptor.keys().map(|k| doc.count(k).to_string()));
        wtr.write_record(&row)
            .with_context(|| format!("writing record {}", doc.id))?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

/// Export to `path`, written to a temporary sibling then renamed into place.
pub fn export_file(
    path: impl AsRef<Path>,
    descriptor: &DatasetDescriptor,
    records: &[StoredRecord],
) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("csv.tmp");
    let file = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    write_csv(file, descriptor, records)?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::builtin;
    use crate::import::parse_records;
    use crate::record::{Record, RecordId};
    use chrono::Utc;
    use tempfile::tempdir;

    fn doc(record: Record) -> StoredRecord {
        StoredRecord {
            id: RecordId::generate(),
            updated_at: Utc::now(),
            record,
        }
    }

    #[test]
    fn exported_file_reimports_identically() {
        let desc = builtin::sex();
        let docs = vec![
            doc(Record::new(2019).with("male", 5).with("female", 6)),
            doc(Record::new(2020).with("male", 7).with("female", 0)),
        ];

        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sex.csv");
        export_file(&path, &desc, &docs).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("year,male,female\n"));

        let parsed = parse_records(text.as_bytes(), &desc).unwrap();
        let originals: Vec<Record> = docs.into_iter().map(|d| d.record).collect();
        assert_eq!(parsed.records, originals);
    }
}
