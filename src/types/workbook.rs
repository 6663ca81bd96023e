use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

use super::Sheet;

/// A loaded spreadsheet package with its active worksheet opened for editing.
///
/// Cloning is cheap for the package bytes (shared, read-only) and deep for
/// the grid, so every clone can be edited independently.
#[derive(Debug, Clone)]
pub struct Workbook {
    /// The editable worksheet.
    pub sheet: Sheet,
    /// Original package bytes; untouched parts are copied from here on save.
    pub(crate) package: Arc<[u8]>,
    /// ZIP path of the worksheet part (e.g. `xl/worksheets/sheet1.xml`).
    pub(crate) sheet_path: String,
    /// Worksheet XML that is not modelled by [`Sheet`], kept verbatim.
    pub(crate) envelope: SheetEnvelope,
}

impl Workbook {
    /// Read and parse an XLSX file from disk.
    ///
    /// # Errors
    /// I/O, ZIP or XML errors, or a package without a worksheet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Parse XLSX bytes.
    ///
    /// # Errors
    /// ZIP or XML errors, or a package without a worksheet.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        crate::parser::parse(data.into())
    }

    /// Serialize to XLSX bytes.
    ///
    /// # Errors
    /// ZIP or XML errors while rebuilding the package.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        crate::export::save_xlsx(self)
    }

    /// Serialize and write to `path`.
    ///
    /// # Errors
    /// Serialization or I/O errors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_xlsx_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    #[must_use]
    pub fn sheet_path(&self) -> &str {
        &self.sheet_path
    }
}

/// The worksheet XML around the parts the grid models.
///
/// Written back as: `head`, `<dimension>` (only if the source had one),
/// `head_rest`, `<sheetData>`, `before_merges`, `<mergeCells>`,
/// `after_merges`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SheetEnvelope {
    pub head: String,
    pub head_rest: Option<String>,
    /// Namespace prefix used by the source for worksheet elements.
    pub prefix: Option<String>,
    pub before_merges: String,
    pub after_merges: String,
}

impl SheetEnvelope {
    /// Qualified element name with the source's prefix.
    pub(crate) fn qname(&self, local: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{local}"),
            None => local.to_string(),
        }
    }
}
