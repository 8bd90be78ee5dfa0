// src/table/mod.rs
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::dataset::DatasetDescriptor;
use crate::record::{coerce_count, parse_year, Record, RecordId, StoredRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("record {active} is already being edited")]
    AlreadyEditing { active: RecordId },
    #[error("no record is being edited")]
    NotEditing,
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("year is required and must be a whole number")]
    InvalidYear,
}

/// Text-valued form for one record: what a person types before it becomes numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordForm {
    pub year: String,
    /// Category key -> raw text.
    pub values: BTreeMap<String, String>,
}

impl RecordForm {
    /// Blank form for the add flow.
    pub fn blank(descriptor: &DatasetDescriptor) -> Self {
        Self {
            year: String::new(),
            values: descriptor
                .keys()
                .map(|k| (k.to_string(), String::new()))
                .collect(),
        }
    }

    /// Form seeded from a stored record; every category is stringified, missing ones as `0`.
    pub fn from_record(record: &Record, descriptor: &DatasetDescriptor) -> Self {
        Self {
            year: record.year.to_string(),
            values: descriptor
                .keys()
                .map(|k| (k.to_string(), record.count(k).to_string()))
                .collect(),
        }
    }

    /// Set `year` or any category by key, label or alias.
    pub fn set(
        &mut self,
        descriptor: &DatasetDescriptor,
        field: &str,
        value: &str,
    ) -> Result<(), EditError> {
        if field.trim().eq_ignore_ascii_case("year") {
            self.year = value.to_string();
            return Ok(());
        }
        let cat = descriptor
            .resolve_field(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        self.values.insert(cat.key.clone(), value.to_string());
        Ok(())
    }

    /// Convert back to numbers. The year must parse; category text that is
    /// not a number becomes 0.
    pub fn to_record(&self, descriptor: &DatasetDescriptor) -> Result<Record, EditError> {
        let year = parse_year(&self.year).ok_or(EditError::InvalidYear)?;
        let mut record = Record::new(year);
        for key in descriptor.keys() {
            let raw = self.values.get(key).map(String::as_str).unwrap_or("");
            record.set(key, coerce_count(raw));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    id: RecordId,
    form: RecordForm,
}

/// Single-row edit lock for the editable table.
///
/// `viewing` is `draft == None`. Only one row may be open at a time; opening a
/// second one is refused rather than silently replacing the first.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    draft: Option<Draft>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn editing(&self) -> Option<&RecordId> {
        self.draft.as_ref().map(|d| &d.id)
    }

    pub fn is_editing(&self, id: &RecordId) -> bool {
        self.editing() == Some(id)
    }

    /// Whether the Edit control for `id` is enabled.
    pub fn can_edit(&self, id: &RecordId) -> bool {
        match self.editing() {
            None => true,
            Some(active) => active == id,
        }
    }

    /// `viewing -> editing`. Re-opening the row already open keeps its draft.
    pub fn begin(
        &mut self,
        doc: &StoredRecord,
        descriptor: &DatasetDescriptor,
    ) -> Result<&mut RecordForm, EditError> {
        if let Some(active) = self.editing() {
            if active != &doc.id {
                return Err(EditError::AlreadyEditing {
                    active: active.clone(),
                });
            }
        }
        if self.draft.is_none() {
            self.draft = Some(Draft {
                id: doc.id.clone(),
                form: RecordForm::from_record(&doc.record, descriptor),
            });
        }
        self.form_mut()
    }

    pub fn form(&self) -> Option<&RecordForm> {
        self.draft.as_ref().map(|d| &d.form)
    }

    pub fn form_mut(&mut self) -> Result<&mut RecordForm, EditError> {
        self.draft
            .as_mut()
            .map(|d| &mut d.form)
            .ok_or(EditError::NotEditing)
    }

    /// The open row and its converted record, leaving the session untouched.
    pub fn pending(&self, descriptor: &DatasetDescriptor) -> Result<(RecordId, Record), EditError> {
        let draft = self.draft.as_ref().ok_or(EditError::NotEditing)?;
        let record = draft.form.to_record(descriptor)?;
        Ok((draft.id.clone(), record))
    }

    /// Back to `viewing`, discarding the draft.
    pub fn close(&mut self) -> Option<RecordId> {
        self.draft.take().map(|d| d.id)
    }
}

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub id: RecordId,
    pub year: String,
    /// Text cells in descriptor category order; the draft's text for the open row.
    pub cells: Vec<String>,
    pub editing: bool,
    pub edit_enabled: bool,
}

pub fn rows(
    records: &[StoredRecord],
    descriptor: &DatasetDescriptor,
    session: &EditSession,
) -> Vec<TableRow> {
    records
        .iter()
        .map(|doc| {
            let editing = session.is_editing(&doc.id);
            let (year, cells) = match session.form().filter(|_| editing) {
                Some(form) => (
                    form.year.clone(),
                    descriptor
                        .keys()
                        .map(|k| form.values.get(k).cloned().unwrap_or_default())
                        .collect(),
                ),
                None => (
                    doc.year().to_string(),
                    descriptor
                        .keys()
                        .map(|k| doc.count(k).to_string())
                        .collect(),
                ),
            };
            TableRow {
                id: doc.id.clone(),
                year,
                cells,
                editing,
                edit_enabled: session.can_edit(&doc.id),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::builtin;
    use chrono::Utc;

    fn doc(id: &str, record: Record) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            updated_at: Utc::now(),
            record,
        }
    }

    #[test]
    fn form_roundtrips_a_record() {
        let desc = builtin::civil_status();
        let rec = Record::new(2019).with("single", 100).with("married", 50);
        let form = RecordForm::from_record(&rec, &desc);
        assert_eq!(form.values["divorced"], "0");
        let back = form.to_record(&desc).unwrap();
        assert_eq!(back.count("single"), 100);
        assert_eq!(back.count("married"), 50);
        assert_eq!(back.counts.len(), desc.categories.len());
    }

    #[test]
    fn form_conversion_coerces_and_validates() {
        let desc = builtin::sex();
        let mut form = RecordForm::blank(&desc);
        assert_eq!(form.to_record(&desc), Err(EditError::InvalidYear));

        form.set(&desc, "year", "2021").unwrap();
        form.set(&desc, "Male", "abc").unwrap();
        form.set(&desc, "female", "12").unwrap();
        let r = form.to_record(&desc).unwrap();
        assert_eq!((r.year, r.count("male"), r.count("female")), (2021, 0, 12));

        assert_eq!(
            form.set(&desc, "other", "1"),
            Err(EditError::UnknownField("other".into()))
        );
    }

    #[test]
    fn only_one_row_can_be_open() {
        let desc = builtin::sex();
        let a = doc("a", Record::new(2019).with("male", 1));
        let b = doc("b", Record::new(2020));
        let mut session = EditSession::new();
        assert!(session.can_edit(&a.id) && session.can_edit(&b.id));

        session.begin(&a, &desc).unwrap().set(&desc, "male", "9").unwrap();
        assert!(session.is_editing(&a.id));
        assert!(!session.can_edit(&b.id));
        assert_eq!(
            session.begin(&b, &desc).unwrap_err(),
            EditError::AlreadyEditing { active: a.id.clone() }
        );

        // reopening the same row keeps the draft
        assert_eq!(session.begin(&a, &desc).unwrap().values["male"], "9");

        assert_eq!(session.close(), Some(a.id.clone()));
        assert!(session.editing().is_none());
        assert!(session.begin(&b, &desc).is_ok());
    }

    #[test]
    fn pending_requires_an_open_row() {
        let desc = builtin::sex();
        let session = EditSession::new();
        assert_eq!(session.pending(&desc).unwrap_err(), EditError::NotEditing);
    }

    #[test]
    fn rows_show_draft_text_for_the_open_row() {
        let desc = builtin::sex();
        let docs = vec![
            doc("a", Record::new(2019).with("male", 1).with("female", 2)),
            doc("b", Record::new(2020).with("male", 3)),
        ];
        let mut session = EditSession::new();
        session
            .begin(&docs[0], &desc)
            .unwrap()
            .set(&desc, "female", "20x")
            .unwrap();

        let rendered = rows(&docs, &desc, &session);
        assert_eq!(rendered[0].cells, vec!["1", "20x"]);
        assert!(rendered[0].editing && rendered[0].edit_enabled);
        assert_eq!(rendered[1].cells, vec!["3", "0"]);
        assert!(!rendered[1].editing && !rendered[1].edit_enabled);
    }
}
