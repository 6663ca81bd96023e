//! Structured error types for facturas.
//!
//! Every fallible operation in the crate returns [`Result`], so the batch
//! runner can tell a fatal precondition apart from a per-invoice failure.

use std::path::PathBuf;

/// All errors that can occur while loading, rendering or saving invoices.
#[derive(Debug, thiserror::Error)]
pub enum FacturaError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (configuration or job file) error.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid cell reference.
    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    /// The package does not look like a spreadsheet we can edit.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The template file does not exist. Fatal for a whole batch.
    #[error("template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    /// The template is missing an anchor the layout relies on.
    #[error("template layout: {0}")]
    Template(String),

    /// No merge with exactly this range exists.
    #[error("merge range {0} not found")]
    MergeNotFound(String),

    /// A merge would overlap an existing, different merge.
    #[error("merge range {range} overlaps existing merge {existing}")]
    MergeOverlap { range: String, existing: String },

    /// Course list or roster could not be used.
    #[error("roster: {0}")]
    Roster(String),

    /// Selections that cannot produce a generation run.
    #[error("invalid request: {0}")]
    Request(String),

    /// One invoice of a batch failed while the batch was set to abort.
    #[error("invoice {filename} failed: {source}")]
    Invoice {
        filename: String,
        #[source]
        source: Box<FacturaError>,
    },
}

impl FacturaError {
    /// True for the failure kinds that best-effort merge cleanup tolerates.
    #[must_use]
    pub fn is_merge_miss(&self) -> bool {
        matches!(self, Self::MergeNotFound(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FacturaError>;

impl From<String> for FacturaError {
    fn from(s: String) -> Self {
        Self::Parse(s)
    }
}

impl From<&str> for FacturaError {
    fn from(s: &str) -> Self {
        Self::Parse(s.to_string())
    }
}
