//! XLSX package reader
//!
//! Opens the ZIP archive, resolves the workbook relationships and loads the
//! active worksheet into an editable [`Sheet`](crate::types::Sheet).

mod relationships;
mod worksheet;

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;
use zip::ZipArchive;

use crate::error::{FacturaError, Result};
use crate::types::Workbook;

use relationships::{get_sheet_info, parse_shared_strings, parse_workbook_relationships};
use worksheet::parse_sheet;

pub(crate) const WORKBOOK_PATH: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
pub(crate) const CALC_CHAIN_PATH: &str = "xl/calcChain.xml";

/// Parse a package and open its active worksheet.
pub(crate) fn parse(package: Arc<[u8]>) -> Result<Workbook> {
    let mut archive = ZipArchive::new(Cursor::new(package.as_ref()))?;

    // Relationships first; they carry the real part paths
    let relationships = parse_workbook_relationships(&mut archive);
    let (sheets, active_tab) = get_sheet_info(&mut archive, &relationships.worksheets)?;

    let info = match sheets.get(active_tab) {
        Some(info) => info,
        None => {
            tracing::warn!(active_tab, "active tab out of range, using the first sheet");
            sheets
                .first()
                .ok_or_else(|| FacturaError::Parse("workbook has no worksheets".into()))?
        }
    };

    let shared_strings = match relationships.shared_strings.as_deref() {
        Some(path) => match read_part(&mut archive, path)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let sheet_xml = read_part(&mut archive, &info.path)?
        .ok_or_else(|| FacturaError::Parse(format!("missing worksheet part {}", info.path)))?;
    let (sheet, envelope) = parse_sheet(&sheet_xml, &info.name, &shared_strings)?;

    tracing::debug!(
        sheet = %info.name,
        path = %info.path,
        shared_strings = shared_strings.len(),
        "opened workbook"
    );

    Ok(Workbook {
        sheet,
        sheet_path: info.path.clone(),
        envelope,
        package: Arc::clone(&package),
    })
}

/// Read a part as UTF-8 text. `Ok(None)` when the part does not exist.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<String>> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}
