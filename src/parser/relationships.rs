//! Relationship parsing - workbook relationships, sheet list, shared strings.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::error::{FacturaError, Result};
use crate::xml_helpers::{attr_string, attr_string_local, attr_u32};

/// Workbook relationships parsed from xl/_rels/workbook.xml.rels
///
/// Paths are resolved relative to the xl/ directory and stored as full paths.
#[derive(Default, Debug)]
pub(super) struct WorkbookRelationships {
    /// Map of rId -> full path for worksheet relationships
    /// e.g., "rId1" -> "xl/worksheets/sheet1.xml"
    pub worksheets: HashMap<String, String>,
    /// Path to shared strings file (e.g., "xl/sharedStrings.xml")
    pub shared_strings: Option<String>,
}

/// Sheet metadata from workbook.xml
#[derive(Debug, Clone)]
pub(super) struct SheetInfo {
    pub name: String,
    pub path: String,
}

/// Resolve a relationship target against the xl/ directory.
fn resolve_target(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("xl/{target}")
    }
}

/// Parse workbook relationships from xl/_rels/workbook.xml.rels
pub(super) fn parse_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> WorkbookRelationships {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name(super::WORKBOOK_RELS_PATH) else {
        return rels; // Relationships file is optional
    };

    let reader = BufReader::new(file);
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);

    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let id = attr_string(e, b"Id").unwrap_or_default();
                    let target = attr_string(e, b"Target").unwrap_or_default();
                    let rel_type = attr_string(e, b"Type").unwrap_or_default();

                    if rel_type.ends_with("/worksheet") && !id.is_empty() && !target.is_empty() {
                        rels.worksheets.insert(id, resolve_target(&target));
                    } else if rel_type.ends_with("/sharedStrings") {
                        rels.shared_strings = Some(resolve_target(&target));
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Get sheet names and paths from xl/workbook.xml, plus the active tab index.
pub(super) fn get_sheet_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<(Vec<SheetInfo>, usize)> {
    let file = archive.by_name(super::WORKBOOK_PATH)?;

    let reader = BufReader::new(file);
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);

    let mut sheets = Vec::new();
    let mut active_tab = 0usize;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attr_u32(e, b"activeTab") {
                        active_tab = usize::try_from(tab).unwrap_or(0);
                    }
                }
                b"sheet" => {
                    let name = attr_string(e, b"name").unwrap_or_default();
                    let path = attr_string_local(e, b"id")
                        .and_then(|rid| relationships.get(&rid).cloned());
                    match path {
                        Some(path) => sheets.push(SheetInfo { name, path }),
                        None => tracing::warn!(sheet = %name, "sheet without a worksheet part"),
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if sheets.is_empty() {
        return Err(FacturaError::Parse("workbook has no worksheets".into()));
    }

    Ok((sheets, active_tab))
}

/// Parse the shared string table. Rich text runs are flattened to plain text;
/// phonetic runs (`rPh`) are skipped.
pub(super) fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut phonetic_depth = 0u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" => in_t = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(t) => {
                if in_t && phonetic_depth == 0 {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&t.unescape()?);
                    }
                }
            }
            Event::CData(c) => {
                if in_t && phonetic_depth == 0 {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&String::from_utf8_lossy(&c));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}
