//! File import for the command-line front end: candidate and job records as
//! JSON, decision logs as CSV.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use super::domain::{Candidate, Job};
use super::fairness::{AuditFields, AuditRecord};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    MissingColumn { column: String },
    InvalidFlag {
        row: usize,
        column: String,
        value: String,
    },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read input file: {}", err),
            ImportError::Json(err) => write!(f, "invalid JSON record data: {}", err),
            ImportError::Csv(err) => write!(f, "invalid decision CSV data: {}", err),
            ImportError::MissingColumn { column } => {
                write!(f, "decision CSV has no '{}' column", column)
            }
            ImportError::InvalidFlag { row, column, value } => write!(
                f,
                "row {}: '{}' is not a yes/no value for column '{}'",
                row, value, column
            ),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Json(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::MissingColumn { .. } | ImportError::InvalidFlag { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Candidates file: either a bare array or `{ "candidates": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateFile {
    List(Vec<Candidate>),
    Wrapped { candidates: Vec<Candidate> },
}

pub fn load_candidates<P: AsRef<Path>>(path: P) -> Result<Vec<Candidate>, ImportError> {
    let file = File::open(path)?;
    read_candidates(BufReader::new(file))
}

pub fn read_candidates<R: Read>(reader: R) -> Result<Vec<Candidate>, ImportError> {
    let candidates = match serde_json::from_reader::<_, CandidateFile>(reader)? {
        CandidateFile::List(candidates) => candidates,
        CandidateFile::Wrapped { candidates } => candidates,
    };
    Ok(candidates)
}

pub fn load_job<P: AsRef<Path>>(path: P) -> Result<Job, ImportError> {
    let file = File::open(path)?;
    read_job(BufReader::new(file))
}

pub fn read_job<R: Read>(reader: R) -> Result<Job, ImportError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Reads one audit record per CSV row. Group values are kept as text, the
/// outcome and qualification columns are parsed as flags and blank cells
/// count as missing.
pub fn parse_audit_rows<R: Read>(
    reader: R,
    fields: &AuditFields,
) -> Result<Vec<AuditRecord>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut required = vec![fields.outcome.as_str(), fields.group.as_str()];
    if let Some(qualified) = fields.qualified.as_deref() {
        required.push(qualified);
    }
    for column in required {
        if !headers.iter().any(|header| header == column) {
            return Err(ImportError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for (index, row) in csv_reader
        .deserialize::<BTreeMap<String, String>>()
        .enumerate()
    {
        let row = DecisionRow(row?);
        // Header is line 1.
        let line = index + 2;
        let mut record = AuditRecord::default();

        if let Some(group) = row.cell(&fields.group) {
            record = record.with_group(fields.group.clone(), group);
        }
        if let Some(selected) = row.flag(line, &fields.outcome)? {
            record = record.with_flag(fields.outcome.clone(), selected);
        }
        if let Some(column) = &fields.qualified {
            if let Some(qualified) = row.flag(line, column)? {
                record = record.with_flag(column.clone(), qualified);
            }
        }
        records.push(record);
    }

    Ok(records)
}

struct DecisionRow(BTreeMap<String, String>);

impl DecisionRow {
    /// Blank cells count as missing.
    fn cell(&self, column: &str) -> Option<&str> {
        self.0
            .get(column)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn flag(&self, line: usize, column: &str) -> Result<Option<bool>, ImportError> {
        let Some(value) = self.cell(column) else {
            return Ok(None);
        };
        parse_flag(value)
            .map(Some)
            .ok_or_else(|| ImportError::InvalidFlag {
                row: line,
                column: column.to_string(),
                value: value.to_string(),
            })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "selected" | "hired" | "shortlisted" => Some(true),
        "false" | "no" | "n" | "0" | "rejected" | "not_selected" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::hiring::fairness::AuditSubject;
    use std::io::Cursor;

    fn fields() -> AuditFields {
        AuditFields::new("selected", "gender").with_qualified("qualified")
    }

    #[test]
    fn parses_flags_and_keeps_blank_cells_missing() {
        let csv = "gender,selected,qualified\nF,yes,1\nM,rejected,\n , true,false\n";
        let records = parse_audit_rows(Cursor::new(csv), &fields()).expect("parse");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].group_value("gender"), Some("F"));
        assert_eq!(records[0].flag("selected"), Some(true));
        assert_eq!(records[0].flag("qualified"), Some(true));
        assert_eq!(records[1].flag("selected"), Some(false));
        assert_eq!(records[1].flag("qualified"), None);
        assert_eq!(records[2].group_value("gender"), None);
    }

    #[test]
    fn missing_column_is_reported() {
        let csv = "gender,selected\nF,yes\n";
        let error = parse_audit_rows(Cursor::new(csv), &fields()).expect_err("qualified missing");
        match error {
            ImportError::MissingColumn { column } => assert_eq!(column, "qualified"),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_flag_names_row_and_column() {
        let csv = "gender,selected\nF,yes\nM,maybe\n";
        let error = parse_audit_rows(Cursor::new(csv), &AuditFields::new("selected", "gender"))
            .expect_err("invalid flag");
        match error {
            ImportError::InvalidFlag { row, column, value } => {
                assert_eq!(row, 3);
                assert_eq!(column, "selected");
                assert_eq!(value, "maybe");
            }
            other => panic!("expected invalid flag, got {other:?}"),
        }
    }

    #[test]
    fn candidates_accept_bare_and_wrapped_arrays() {
        let bare = r#"[{"id": "c-1", "skills": ["Rust"]}]"#;
        let wrapped = r#"{"candidates": [{"id": "c-1"}, {"id": "c-2"}]}"#;

        let first = read_candidates(Cursor::new(bare)).expect("bare");
        assert_eq!(first.len(), 1);
        assert!(first[0].skills.contains("Rust"));
        assert_eq!(read_candidates(Cursor::new(wrapped)).expect("wrapped").len(), 2);
    }

    #[test]
    fn load_job_propagates_io_errors() {
        let error = load_job("./does-not-exist.json").expect_err("expected io error");
        assert!(matches!(error, ImportError::Io(_)));
    }
}
