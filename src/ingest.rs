//! Corpus ingestion from a parsed tabular upload.
//!
//! An upload is a JSON array of objects, one per spreadsheet row, keyed by
//! column header. File-format conversion (CSV, XLSX) happens upstream; this
//! module only maps columns onto ticket fields and applies the engine's
//! acceptance rules:
//!
//! - Rows without a problem description are rejected and counted.
//! - Missing category → `Uncategorized`; missing priority → `Medium`.
//! - Missing ticket id → `T-<row number>`.
//! - Timestamps that do not parse are dropped, not treated as errors.
//!
//! Input errors ([`IngestError`]) abort ingestion before any engine state
//! changes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use helpdesk_insight_core::models::{Corpus, Ticket, DEFAULT_PRIORITY, UNCATEGORIZED};

use crate::config::IngestConfig;

/// One upload row: column header → cell value.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload is empty")]
    EmptyUpload,

    #[error("upload could not be parsed: {0}")]
    Unparseable(String),

    #[error("required column '{column}' (mapped to field '{field}') not found in upload")]
    MissingColumn { field: String, column: String },

    #[error("no usable rows: all {rejected} rows lack a problem description")]
    NoUsableRows { rejected: usize },

    #[error("failed to read upload {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub corpus: Corpus,
    pub accepted: usize,
    pub rejected: usize,
}

/// Read and parse an upload file.
pub fn load_upload(path: &Path) -> Result<Vec<Row>, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_upload(&bytes)
}

/// Parse upload bytes into rows.
pub fn parse_upload(bytes: &[u8]) -> Result<Vec<Row>, IngestError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(IngestError::EmptyUpload);
    }
    let rows: Vec<Row> =
        serde_json::from_slice(bytes).map_err(|e| IngestError::Unparseable(e.to_string()))?;
    if rows.is_empty() {
        return Err(IngestError::EmptyUpload);
    }
    Ok(rows)
}

/// Map upload rows onto tickets.
pub fn ingest_rows(rows: &[Row], columns: &IngestConfig) -> Result<IngestReport, IngestError> {
    if rows.is_empty() {
        return Err(IngestError::EmptyUpload);
    }

    let description_col = columns.column("problem_description");
    if !rows.iter().any(|r| r.contains_key(description_col)) {
        return Err(IngestError::MissingColumn {
            field: "problem_description".to_string(),
            column: description_col.to_string(),
        });
    }

    let mut tickets: Vec<Ticket> = Vec::with_capacity(rows.len());
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut rejected = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let row_number = i + 1;
        let field = |name: &str| cell(row, columns.column(name));

        let Some(description) = field("problem_description") else {
            rejected += 1;
            warn!(row = row_number, "rejected upload row without a problem description");
            continue;
        };

        let mut id = field("ticket_id").unwrap_or_else(|| format!("T-{:04}", row_number));
        if !seen_ids.insert(id.clone()) {
            let renamed = format!("{}#{}", id, row_number);
            warn!(row = row_number, id = %id, renamed = %renamed, "duplicate ticket id");
            seen_ids.insert(renamed.clone());
            id = renamed;
        }

        let mut ticket = Ticket::new(
            id,
            description,
            field("category").unwrap_or_else(|| UNCATEGORIZED.to_string()),
            field("priority").unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
        );
        ticket.solution = field("solution");
        ticket.technician = field("technician");
        ticket.status = field("status");
        ticket.created_at = field("created_at").and_then(|s| parse_timestamp(&s));
        ticket.due_at = field("due_date").and_then(|s| parse_timestamp(&s));
        ticket.responded_at = field("responded_at").and_then(|s| parse_timestamp(&s));
        tickets.push(ticket);
    }

    if tickets.is_empty() {
        return Err(IngestError::NoUsableRows { rejected });
    }

    debug!(accepted = tickets.len(), rejected, "upload ingested");

    let accepted = tickets.len();
    Ok(IngestReport {
        corpus: Corpus::new(tickets),
        accepted,
        rejected,
    })
}

/// Cell text, trimmed; empty and null cells are absent.
fn cell(row: &Row, column: &str) -> Option<String> {
    let text = match row.get(column)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Parse the timestamp formats spreadsheets commonly export.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
