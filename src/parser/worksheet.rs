//! Worksheet parsing - splits the sheet XML into the editable grid and the
//! verbatim envelope around it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

use crate::cell_ref::{parse_cell_range, parse_cell_ref_bytes};
use crate::error::{FacturaError, Result};
use crate::types::{Cell, CellValue, Formula, FormulaKind, Row, Sheet, SheetEnvelope};
use crate::xml_helpers::{attr_string, attr_u32, name_prefix, raw_attrs_except};

/// Worksheet children that must come after `<mergeCells>` (ECMA-376 order).
/// Used to place a new `<mergeCells>` when the source had none.
const AFTER_MERGE_CELLS: &[&[u8]] = &[
    b"phoneticPr",
    b"conditionalFormatting",
    b"dataValidations",
    b"hyperlinks",
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Copy, Clone)]
enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Date,
    Default,
}

fn parse_cell_type_tag(value: &[u8]) -> CellTypeTag {
    match value {
        b"s" => CellTypeTag::Shared,
        b"b" => CellTypeTag::Bool,
        b"e" => CellTypeTag::Error,
        b"str" => CellTypeTag::Str,
        b"inlineStr" => CellTypeTag::Inline,
        b"d" => CellTypeTag::Date,
        _ => CellTypeTag::Default,
    }
}

/// Parse a worksheet part into its grid and envelope.
pub(super) fn parse_sheet(
    xml: &str,
    name: &str,
    shared_strings: &[String],
) -> Result<(Sheet, SheetEnvelope)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut sheet = Sheet::new(name);
    let mut prefix = None;
    let mut dimension: Option<(usize, usize)> = None;
    let mut sheet_data: Option<(usize, usize)> = None;
    let mut merge_cells: Option<(usize, usize)> = None;
    let mut merge_anchor: Option<usize> = None;
    let mut depth: u32 = 0;

    loop {
        let start = reader.buffer_position();
        let event = reader.read_event()?;
        let end = reader.buffer_position();

        match event {
            Event::Start(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"sheetData" if depth == 1 => {
                        prefix = name_prefix(&e);
                        parse_sheet_data(&mut reader, &mut sheet, shared_strings)?;
                        sheet_data = Some((start, reader.buffer_position()));
                    }
                    b"mergeCells" if depth == 1 => {
                        parse_merge_cells(&mut reader, &mut sheet)?;
                        merge_cells = Some((start, reader.buffer_position()));
                    }
                    other => {
                        if depth == 1
                            && sheet_data.is_some()
                            && merge_anchor.is_none()
                            && AFTER_MERGE_CELLS.contains(&other)
                        {
                            merge_anchor = Some(start);
                        }
                        depth += 1;
                    }
                }
            }
            Event::Empty(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"dimension" if depth == 1 => dimension = Some((start, end)),
                    b"sheetData" if depth == 1 => {
                        prefix = name_prefix(&e);
                        sheet_data = Some((start, end));
                    }
                    b"mergeCells" if depth == 1 => merge_cells = Some((start, end)),
                    other => {
                        if depth == 1
                            && sheet_data.is_some()
                            && merge_anchor.is_none()
                            && AFTER_MERGE_CELLS.contains(&other)
                        {
                            merge_anchor = Some(start);
                        }
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && merge_anchor.is_none() {
                    merge_anchor = Some(start);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (data_start, data_end) = sheet_data
        .ok_or_else(|| FacturaError::Parse(format!("sheet '{name}' has no sheetData")))?;

    let slice = |from: usize, to: usize| -> Result<String> {
        xml.get(from..to)
            .map(str::to_string)
            .ok_or_else(|| FacturaError::Parse(format!("sheet '{name}': bad XML offsets")))
    };

    let (head, head_rest) = match dimension {
        Some((dim_start, dim_end)) if dim_end <= data_start => {
            (slice(0, dim_start)?, Some(slice(dim_end, data_start)?))
        }
        _ => (slice(0, data_start)?, None),
    };

    let (before_merges, after_merges) = match merge_cells {
        Some((m_start, m_end)) => (slice(data_end, m_start)?, slice(m_end, xml.len())?),
        None => {
            let anchor = merge_anchor
                .filter(|&a| a >= data_end)
                .unwrap_or(xml.len());
            (slice(data_end, anchor)?, slice(anchor, xml.len())?)
        }
    };

    tracing::debug!(
        sheet = %name,
        rows = sheet.rows().count(),
        merges = sheet.merges().len(),
        "parsed worksheet"
    );

    Ok((
        sheet,
        SheetEnvelope {
            head,
            head_rest,
            prefix,
            before_merges,
            after_merges,
        },
    ))
}

/// Read `<row>` elements until `</sheetData>`.
fn parse_sheet_data(
    reader: &mut Reader<&[u8]>,
    sheet: &mut Sheet,
    shared_strings: &[String],
) -> Result<()> {
    let mut next_row: u32 = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let r = row_index(&e, next_row);
                let mut row = Row {
                    attrs: raw_attrs_except(&e, &[b"r", b"spans"]),
                    cells: BTreeMap::new(),
                };
                parse_row_cells(reader, &mut row, shared_strings)?;
                sheet.push_row(r, row);
                next_row = r.saturating_add(1);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let r = row_index(&e, next_row);
                sheet.push_row(
                    r,
                    Row {
                        attrs: raw_attrs_except(&e, &[b"r", b"spans"]),
                        cells: BTreeMap::new(),
                    },
                );
                next_row = r.saturating_add(1);
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(()),
            Event::Eof => {
                return Err(FacturaError::Parse(
                    "unexpected end of worksheet inside sheetData".into(),
                ))
            }
            _ => {}
        }
    }
}

/// 0-indexed row from the `r` attribute, or the next row in sequence.
fn row_index(e: &BytesStart, next_row: u32) -> u32 {
    attr_u32(e, b"r")
        .and_then(|r| r.checked_sub(1))
        .unwrap_or(next_row)
}

/// Read `<c>` elements until `</row>`.
fn parse_row_cells(
    reader: &mut Reader<&[u8]>,
    row: &mut Row,
    shared_strings: &[String],
) -> Result<()> {
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let head = CellHead::from_element(&e, next_col);
                let cell = parse_cell_body(reader, &head, shared_strings)?;
                row.cells.insert(head.col, cell);
                next_col = head.col.saturating_add(1);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let head = CellHead::from_element(&e, next_col);
                row.cells.insert(
                    head.col,
                    Cell {
                        style_idx: head.style_idx,
                        value: CellValue::Empty,
                    },
                );
                next_col = head.col.saturating_add(1);
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(()),
            Event::Eof => {
                return Err(FacturaError::Parse(
                    "unexpected end of worksheet inside row".into(),
                ))
            }
            _ => {}
        }
    }
}

/// Attributes of a `<c>` element.
struct CellHead {
    col: u32,
    style_idx: Option<u32>,
    tag: CellTypeTag,
}

impl CellHead {
    fn from_element(e: &BytesStart, next_col: u32) -> Self {
        let mut head = Self {
            col: next_col,
            style_idx: None,
            tag: CellTypeTag::Default,
        };
        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"r" => {
                    if let Some((col, _)) = parse_cell_ref_bytes(&attr.value) {
                        head.col = col;
                    }
                }
                b"s" => {
                    head.style_idx = std::str::from_utf8(&attr.value)
                        .ok()
                        .and_then(|s| s.parse().ok());
                }
                b"t" => head.tag = parse_cell_type_tag(&attr.value),
                _ => {}
            }
        }
        head
    }
}

/// Which child of `<c>` text currently belongs to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Value,
    Formula,
    InlineText,
}

/// Read the children of a `<c>` element until `</c>`.
fn parse_cell_body(
    reader: &mut Reader<&[u8]>,
    head: &CellHead,
    shared_strings: &[String],
) -> Result<Cell> {
    let mut field = Field::None;
    let mut value_text: Option<String> = None;
    let mut formula: Option<(String, FormulaKind)> = None;
    let mut inline: Option<String> = None;
    let mut phonetic_depth = 0u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => {
                    field = Field::Value;
                    value_text.get_or_insert_with(String::new);
                }
                b"f" => {
                    field = Field::Formula;
                    formula = Some((String::new(), formula_kind(&e)));
                }
                b"is" => {
                    inline.get_or_insert_with(String::new);
                }
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 && inline.is_some() => field = Field::InlineText,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"f" => formula = Some((String::new(), formula_kind(&e))),
                b"is" => {
                    inline.get_or_insert_with(String::new);
                }
                _ => {}
            },
            Event::Text(t) => {
                let text = t.unescape()?;
                push_field_text(field, &text, &mut value_text, &mut formula, &mut inline);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                push_field_text(field, &text, &mut value_text, &mut formula, &mut inline);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"c" => break,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"v" | b"f" | b"t" => field = Field::None,
                _ => {}
            },
            Event::Eof => {
                return Err(FacturaError::Parse(
                    "unexpected end of worksheet inside cell".into(),
                ))
            }
            _ => {}
        }
    }

    let plain = plain_value(head.tag, value_text, inline, shared_strings);
    let value = match formula {
        Some((expr, kind)) => CellValue::Formula(Formula {
            expr,
            kind,
            cached: plain.map(Box::new),
        }),
        None => plain.unwrap_or(CellValue::Empty),
    };

    Ok(Cell {
        style_idx: head.style_idx,
        value,
    })
}

fn push_field_text(
    field: Field,
    text: &str,
    value_text: &mut Option<String>,
    formula: &mut Option<(String, FormulaKind)>,
    inline: &mut Option<String>,
) {
    let target = match field {
        Field::Value => value_text.as_mut(),
        Field::Formula => formula.as_mut().map(|(expr, _)| expr),
        Field::InlineText => inline.as_mut(),
        Field::None => None,
    };
    if let Some(target) = target {
        target.push_str(text);
    }
}

fn formula_kind(e: &BytesStart) -> FormulaKind {
    let range = attr_string(e, b"ref").and_then(|r| parse_cell_range(&r));
    match attr_string(e, b"t").as_deref() {
        Some("shared") => FormulaKind::Shared {
            index: attr_u32(e, b"si").unwrap_or(0),
            range,
        },
        Some("array") => match range {
            Some(range) => FormulaKind::Array { range },
            None => FormulaKind::Normal,
        },
        _ => FormulaKind::Normal,
    }
}

/// The non-formula value of a cell (or a formula's cached result).
fn plain_value(
    tag: CellTypeTag,
    value_text: Option<String>,
    inline: Option<String>,
    shared_strings: &[String],
) -> Option<CellValue> {
    match tag {
        CellTypeTag::Shared => {
            let idx: usize = value_text?.trim().parse().ok()?;
            match shared_strings.get(idx) {
                Some(s) => Some(CellValue::Text(s.clone())),
                None => {
                    tracing::warn!(idx, "shared string index out of range");
                    None
                }
            }
        }
        CellTypeTag::Inline => inline.or(value_text).map(CellValue::Text),
        CellTypeTag::Str | CellTypeTag::Date => value_text.map(CellValue::Text),
        CellTypeTag::Bool => value_text.map(|v| {
            let v = v.trim();
            CellValue::Boolean(v == "1" || v.eq_ignore_ascii_case("true"))
        }),
        CellTypeTag::Error => value_text.map(CellValue::Error),
        CellTypeTag::Default => value_text
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(CellValue::Number),
    }
}

/// Read `<mergeCell>` elements until `</mergeCells>`.
fn parse_merge_cells(reader: &mut Reader<&[u8]>, sheet: &mut Sheet) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"mergeCell" => {
                match attr_string(&e, b"ref").as_deref().and_then(parse_cell_range) {
                    Some(range) => sheet.push_merge(range),
                    None => tracing::warn!("skipping mergeCell without a valid ref"),
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"mergeCells" => return Ok(()),
            Event::Eof => {
                return Err(FacturaError::Parse(
                    "unexpected end of worksheet inside mergeCells".into(),
                ))
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::cell_ref::CellAddr;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:K17"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData><row r="2" spans="1:2"><c r="A2" t="s"><v>0</v></c><c r="B2" s="3"/></row><row r="9" ht="30" customHeight="1"><c r="A9" s="5" t="inlineStr"><is><t>Parte 1</t></is></c><c r="B9" s="6"><v>100</v></c><c r="J9" s="7"><f>SUM(C9:H9)</f><v>0</v></c><c r="K9" t="str"><f t="shared" ref="K9:K11" si="0">J9&amp;"x"</f><v>0x</v></c></row><row r="11"><c r="D11" s="8"/><c r="E11" t="b"><v>1</v></c><c r="F11" t="e"><v>#DIV/0!</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="D11:H11"/></mergeCells><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

    fn addr(a1: &str) -> CellAddr {
        a1.parse().unwrap()
    }

    #[test]
    fn test_parse_cells() {
        let shared = vec!["Curso:".to_string()];
        let (sheet, _) = parse_sheet(SHEET, "Hoja1", &shared).unwrap();

        assert_eq!(sheet.cell(addr("A2")).unwrap().text(), Some("Curso:"));
        assert_eq!(sheet.style_at(addr("B2")), Some(3));
        assert_eq!(sheet.cell(addr("A9")).unwrap().text(), Some("Parte 1"));
        assert_eq!(sheet.cell(addr("B9")).unwrap().number(), Some(100.0));

        let j9 = sheet.cell(addr("J9")).unwrap().formula().unwrap();
        assert_eq!(j9.expr, "SUM(C9:H9)");
        assert_eq!(j9.kind, FormulaKind::Normal);
        assert_eq!(j9.cached.as_deref(), Some(&CellValue::Number(0.0)));

        let k9 = sheet.cell(addr("K9")).unwrap().formula().unwrap();
        assert_eq!(k9.expr, "J9&\"x\"");
        assert_eq!(
            k9.kind,
            FormulaKind::Shared {
                index: 0,
                range: Some("K9:K11".parse().unwrap())
            }
        );

        assert_eq!(
            sheet.cell(addr("E11")).unwrap().value,
            CellValue::Boolean(true)
        );
        assert_eq!(
            sheet.cell(addr("F11")).unwrap().value,
            CellValue::Error("#DIV/0!".into())
        );
    }

    #[test]
    fn test_parse_row_attrs_and_merges() {
        let (sheet, _) = parse_sheet(SHEET, "Hoja1", &[]).unwrap();
        let row = sheet.row(8).unwrap();
        assert_eq!(
            row.attrs,
            vec![
                ("ht".to_string(), "30".to_string()),
                ("customHeight".to_string(), "1".to_string())
            ]
        );
        assert_eq!(sheet.merges().len(), 1);
        assert_eq!(sheet.merges()[0].to_string(), "D11:H11");
    }

    #[test]
    fn test_envelope_split() {
        let (_, env) = parse_sheet(SHEET, "Hoja1", &[]).unwrap();
        assert!(env.head.ends_with("main\">"));
        assert_eq!(
            env.head_rest.as_deref(),
            Some(r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#)
        );
        assert_eq!(env.before_merges, "");
        assert!(env.after_merges.starts_with("<pageMargins"));
        assert!(env.after_merges.ends_with("</worksheet>"));
        assert!(env.prefix.is_none());
    }

    #[test]
    fn test_envelope_anchor_without_merges() {
        let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/><sheetProtection sheet="1"/><pageMargins left="0.7"/></worksheet>"#;
        let (sheet, env) = parse_sheet(xml, "Hoja1", &[]).unwrap();
        assert!(sheet.merges().is_empty());
        assert!(env.head_rest.is_none());
        assert_eq!(env.before_merges, r#"<sheetProtection sheet="1"/>"#);
        assert_eq!(env.after_merges, r#"<pageMargins left="0.7"/></worksheet>"#);
    }

    #[test]
    fn test_rows_without_r_attribute() {
        let xml = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row><c t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#;
        let (sheet, _) = parse_sheet(xml, "Hoja1", &[]).unwrap();
        assert_eq!(sheet.cell(addr("B1")).unwrap().number(), Some(2.0));
        assert_eq!(sheet.cell(addr("A2")).unwrap().text(), Some("x"));
    }

    #[test]
    fn test_missing_sheet_data_is_an_error() {
        let xml = r#"<worksheet><sheetViews/></worksheet>"#;
        assert!(parse_sheet(xml, "Hoja1", &[]).is_err());
    }
}
