//! XLSX export pipeline.
//!
//! Produces the output package by patching the template's ZIP archive:
//! the edited worksheet is re-serialized, everything else is passed
//! through byte-identical apart from the recalculation bookkeeping.

pub(crate) mod sheet_writer;
pub(crate) mod zip_patcher;

use crate::error::Result;
use crate::types::Workbook;

/// Save a workbook to XLSX bytes.
pub(crate) fn save_xlsx(workbook: &Workbook) -> Result<Vec<u8>> {
    let bytes = zip_patcher::patch_zip(workbook)?;
    tracing::debug!(
        sheet = %workbook.sheet.name,
        bytes = bytes.len(),
        "serialized workbook"
    );
    Ok(bytes)
}
