//! Patch an XLSX ZIP archive with the edited worksheet.
//!
//! Unmodified entries are copied via `raw_copy_file` (zero recompression cost).
//! The edited worksheet is regenerated. Because formulas are written without
//! cached results, the calculation chain is dropped and the workbook is
//! flagged for a full recalculation on load.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::Result;
use crate::parser::{
    read_part, CALC_CHAIN_PATH, CONTENT_TYPES_PATH, WORKBOOK_PATH, WORKBOOK_RELS_PATH,
};
use crate::types::Workbook;

use super::sheet_writer::write_sheet_xml;

/// `workbook.xml` children that must come after `<calcPr>` (ECMA-376 order).
const AFTER_CALC_PR: &[&[u8]] = &[
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// Rebuild the package around the workbook's edited sheet.
///
/// Returns the new XLSX file as `Vec<u8>`.
pub(crate) fn patch_zip(workbook: &Workbook) -> Result<Vec<u8>> {
    let original: &[u8] = workbook.package.as_ref();
    let mut archive = ZipArchive::new(Cursor::new(original))?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PATH)?;
    let content_types = read_part(&mut archive, CONTENT_TYPES_PATH)?;
    let workbook_rels = read_part(&mut archive, WORKBOOK_RELS_PATH)?;

    let buf: Vec<u8> = Vec::with_capacity(original.len());
    let mut writer = ZipWriter::new(Cursor::new(buf));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        let name = entry.name().to_string();

        let replacement = if name == workbook.sheet_path {
            Some(write_sheet_xml(&workbook.sheet, &workbook.envelope))
        } else if name == CALC_CHAIN_PATH {
            tracing::debug!("dropping calculation chain");
            continue;
        } else if name == WORKBOOK_PATH {
            workbook_xml.as_deref().map(force_full_calc).transpose()?
        } else if name == CONTENT_TYPES_PATH {
            content_types.as_deref().map(strip_calc_chain_override).transpose()?
        } else if name == WORKBOOK_RELS_PATH {
            workbook_rels.as_deref().map(strip_calc_chain_rel).transpose()?
        } else {
            None
        };

        match replacement {
            Some(xml) => {
                drop(entry);
                writer.start_file(&name, options)?;
                writer.write_all(xml.as_bytes())?;
            }
            // Pass through unmodified entry (raw copy, no re-compression)
            None => writer.raw_copy_file(entry)?,
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Set `fullCalcOnLoad="1"` on `<calcPr>`, adding the element if missing.
pub(crate) fn force_full_calc(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 64));
    let mut depth = 0u32;
    let mut prefix: Option<String> = None;
    let mut done = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(e) => {
                if depth == 0 {
                    prefix = crate::xml_helpers::name_prefix(&e);
                }
                if depth == 1 && !done && AFTER_CALC_PR.contains(&e.local_name().as_ref()) {
                    writer.write_event(Event::Empty(new_calc_pr(prefix.as_deref())))?;
                    done = true;
                }
                if depth == 1 && e.local_name().as_ref() == b"calcPr" {
                    writer.write_event(Event::Start(patched_calc_pr(&e)))?;
                    done = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && !done && AFTER_CALC_PR.contains(&e.local_name().as_ref()) {
                    writer.write_event(Event::Empty(new_calc_pr(prefix.as_deref())))?;
                    done = true;
                }
                if depth == 1 && e.local_name().as_ref() == b"calcPr" {
                    writer.write_event(Event::Empty(patched_calc_pr(&e)))?;
                    done = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && !done {
                    writer.write_event(Event::Empty(new_calc_pr(prefix.as_deref())))?;
                    done = true;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn new_calc_pr(prefix: Option<&str>) -> BytesStart<'static> {
    let name = match prefix {
        Some(p) => format!("{p}:calcPr"),
        None => "calcPr".to_string(),
    };
    let mut calc_pr = BytesStart::new(name);
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    calc_pr
}

fn patched_calc_pr(e: &BytesStart) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"fullCalcOnLoad" {
            patched.push_attribute(attr);
        }
    }
    patched.push_attribute(("fullCalcOnLoad", "1"));
    patched.into_owned()
}

/// Remove the `<Override>` for the calculation chain from `[Content_Types].xml`.
pub(crate) fn strip_calc_chain_override(xml: &str) -> Result<String> {
    let target = format!("/{CALC_CHAIN_PATH}");
    filter_elements(xml, b"Override", |e| {
        crate::xml_helpers::attr_string(e, b"PartName").as_deref() == Some(target.as_str())
    })
}

/// Remove the calculation chain `<Relationship>` from the workbook rels.
pub(crate) fn strip_calc_chain_rel(xml: &str) -> Result<String> {
    filter_elements(xml, b"Relationship", |e| {
        crate::xml_helpers::attr_string(e, b"Type")
            .is_some_and(|t| t.ends_with("/calcChain"))
    })
}

/// Copy `xml`, dropping every element named `local` for which `drop_if` holds.
fn filter_elements(
    xml: &str,
    local: &[u8],
    drop_if: impl Fn(&BytesStart) -> bool,
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skipping = 0u32;

    loop {
        let event = reader.read_event()?;
        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }
        match event {
            Event::Empty(e) if e.local_name().as_ref() == local && drop_if(&e) => {}
            Event::Start(e) if e.local_name().as_ref() == local && drop_if(&e) => skipping = 1,
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_force_full_calc_patches_existing_calc_pr() {
        let xml = r#"<?xml version="1.0"?><workbook xmlns="main"><sheets><sheet name="Hoja1" sheetId="1"/></sheets><calcPr calcId="191029" fullCalcOnLoad="0"/></workbook>"#;
        let out = force_full_calc(xml).unwrap();
        assert!(out.contains(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#));
        assert_eq!(out.matches("calcPr").count(), 1);
    }

    #[test]
    fn test_force_full_calc_inserts_before_ext_lst() {
        let xml = r#"<workbook><sheets/><definedNames/><extLst/></workbook>"#;
        let out = force_full_calc(xml).unwrap();
        assert_eq!(
            out,
            r#"<workbook><sheets/><definedNames/><calcPr fullCalcOnLoad="1"/><extLst/></workbook>"#
        );
    }

    #[test]
    fn test_force_full_calc_inserts_at_end() {
        let xml = r#"<x:workbook xmlns:x="main"><x:sheets/></x:workbook>"#;
        let out = force_full_calc(xml).unwrap();
        assert_eq!(
            out,
            r#"<x:workbook xmlns:x="main"><x:sheets/><x:calcPr fullCalcOnLoad="1"/></x:workbook>"#
        );
    }

    #[test]
    fn test_strip_calc_chain_override() {
        let xml = r#"<Types><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/calcChain.xml" ContentType="calc"/><Override PartName="/xl/workbook.xml" ContentType="wb"/></Types>"#;
        let out = strip_calc_chain_override(xml).unwrap();
        assert!(!out.contains("calcChain"));
        assert!(out.contains("/xl/workbook.xml"));
    }

    #[test]
    fn test_strip_calc_chain_rel() {
        let xml = r#"<Relationships><Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId9" Type="http://x/calcChain" Target="calcChain.xml"/></Relationships>"#;
        let out = strip_calc_chain_rel(xml).unwrap();
        assert!(!out.contains("calcChain"));
        assert!(out.contains("rId1"));
    }
}
