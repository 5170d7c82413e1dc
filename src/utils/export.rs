//! Tabular export of publication records.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::PublicationRecord;

/// File format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Pick a format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Errors that can occur while exporting records
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Cannot infer export format from '{0}' (use .csv or .json)")]
    UnknownFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render records as CSV, one header row then one row per record
pub fn export_csv<'a>(records: impl IntoIterator<Item = &'a PublicationRecord>) -> String {
    let mut out = PublicationRecord::FIELD_NAMES.join(",");
    out.push('\n');

    for record in records {
        let row: Vec<String> = record.fields().iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Render records as a pretty-printed JSON array
pub fn export_json<'a>(
    records: impl IntoIterator<Item = &'a PublicationRecord>,
) -> Result<String, ExportError> {
    let records: Vec<&PublicationRecord> = records.into_iter().collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Write records to `path`, choosing the format from its extension
pub fn write_export<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a PublicationRecord>,
) -> Result<ExportFormat, ExportError> {
    let format =
        ExportFormat::from_path(path).ok_or_else(|| ExportError::UnknownFormat(path.to_path_buf()))?;

    let content = match format {
        ExportFormat::Csv => export_csv(records),
        ExportFormat::Json => export_json(records)?,
    };

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    tracing::debug!("Exported records to {}", path.display());
    Ok(format)
}
