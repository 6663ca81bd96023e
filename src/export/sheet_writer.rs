//! Generates worksheet XML from a [`Sheet`] and its envelope.
//!
//! Modified sheets use inline strings (`t="inlineStr"`) instead of shared
//! string references, avoiding the need to rebuild the shared string table.
//! Everything the grid does not model is written back byte-for-byte from the
//! envelope captured at parse time.

use crate::cell_ref::{col_to_letter, CellRange};
use crate::types::{Cell, CellValue, Formula, FormulaKind, Row, Sheet, SheetEnvelope};
use crate::xml_helpers::xml_escape;

/// Write a complete worksheet XML string.
pub(crate) fn write_sheet_xml(sheet: &Sheet, envelope: &SheetEnvelope) -> String {
    let names = Names::new(envelope);
    let mut out = String::with_capacity(envelope.head.len() + envelope.after_merges.len() + 8192);

    out.push_str(&envelope.head);

    // <dimension> only when the source carried one
    if let Some(rest) = &envelope.head_rest {
        let dim = sheet
            .used_range()
            .map_or_else(|| "A1".to_string(), |r| full_ref(&r));
        out.push_str(&format!("<{} ref=\"{dim}\"/>", names.dimension));
        out.push_str(rest);
    }

    // <sheetData>
    out.push_str(&format!("<{}>", names.sheet_data));
    for (r, row) in sheet.rows() {
        write_row(&mut out, &names, r, row);
    }
    out.push_str(&format!("</{}>", names.sheet_data));

    out.push_str(&envelope.before_merges);

    // <mergeCells>
    let merges = sheet.merges();
    if !merges.is_empty() {
        out.push_str(&format!(
            "<{} count=\"{}\">",
            names.merge_cells,
            merges.len()
        ));
        for merge in merges {
            out.push_str(&format!(
                "<{} ref=\"{}\"/>",
                names.merge_cell,
                full_ref(merge)
            ));
        }
        out.push_str(&format!("</{}>", names.merge_cells));
    }

    out.push_str(&envelope.after_merges);
    out
}

/// Element names qualified with the source's namespace prefix.
struct Names {
    dimension: String,
    sheet_data: String,
    row: String,
    c: String,
    v: String,
    f: String,
    is: String,
    t: String,
    merge_cells: String,
    merge_cell: String,
}

impl Names {
    fn new(envelope: &SheetEnvelope) -> Self {
        Self {
            dimension: envelope.qname("dimension"),
            sheet_data: envelope.qname("sheetData"),
            row: envelope.qname("row"),
            c: envelope.qname("c"),
            v: envelope.qname("v"),
            f: envelope.qname("f"),
            is: envelope.qname("is"),
            t: envelope.qname("t"),
            merge_cells: envelope.qname("mergeCells"),
            merge_cell: envelope.qname("mergeCell"),
        }
    }
}

/// `A1:B2` for ranges, always with both corners (merge refs need both).
fn full_ref(range: &CellRange) -> String {
    format!(
        "{}{}:{}{}",
        col_to_letter(range.start_col),
        range.start_row + 1,
        col_to_letter(range.end_col),
        range.end_row + 1
    )
}

fn write_row(out: &mut String, names: &Names, r: u32, row: &Row) {
    out.push_str(&format!("<{} r=\"{}\"", names.row, r + 1));
    for (key, value) in &row.attrs {
        // Values were kept escaped at parse time
        out.push_str(&format!(" {key}=\"{value}\""));
    }
    if row.cells.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for (&col, cell) in &row.cells {
        write_cell(out, names, r, col, cell);
    }
    out.push_str(&format!("</{}>", names.row));
}

/// Write a single `<c>` element.
fn write_cell(out: &mut String, names: &Names, row: u32, col: u32, cell: &Cell) {
    out.push_str(&format!("<{} r=\"{}{}\"", names.c, col_to_letter(col), row + 1));

    if let Some(si) = cell.style_idx {
        out.push_str(&format!(" s=\"{si}\""));
    }

    match &cell.value {
        CellValue::Empty => out.push_str("/>"),
        CellValue::Formula(formula) => write_formula_cell(out, names, formula),
        plain => {
            let (tag, body) = plain_parts(plain, names);
            out.push_str(tag);
            out.push('>');
            out.push_str(&body);
            out.push_str(&format!("</{}>", names.c));
        }
    }
}

/// Type attribute and body for a non-formula value.
fn plain_parts(value: &CellValue, names: &Names) -> (&'static str, String) {
    match value {
        CellValue::Text(s) => (
            " t=\"inlineStr\"",
            format!(
                "<{is}><{t} xml:space=\"preserve\">{}</{t}></{is}>",
                xml_escape(s),
                is = names.is,
                t = names.t
            ),
        ),
        CellValue::Number(n) if n.is_finite() => ("", format!("<{v}>{n}</{v}>", v = names.v)),
        CellValue::Number(_) => (" t=\"e\"", format!("<{v}>#NUM!</{v}>", v = names.v)),
        CellValue::Boolean(b) => (
            " t=\"b\"",
            format!("<{v}>{}</{v}>", u8::from(*b), v = names.v),
        ),
        CellValue::Error(e) => (" t=\"e\"", format!("<{v}>{}</{v}>", xml_escape(e), v = names.v)),
        CellValue::Empty | CellValue::Formula(_) => ("", String::new()),
    }
}

fn write_formula_cell(out: &mut String, names: &Names, formula: &Formula) {
    // A cached string result is written as t="str"; the workbook is flagged
    // for full recalculation so stale caches are replaced on open.
    let cached = formula.cached.as_deref();
    let tag = match cached {
        Some(CellValue::Text(_)) => " t=\"str\"",
        Some(CellValue::Boolean(_)) => " t=\"b\"",
        Some(CellValue::Error(_)) => " t=\"e\"",
        Some(CellValue::Number(n)) if !n.is_finite() => " t=\"e\"",
        _ => "",
    };
    out.push_str(tag);
    out.push('>');

    let f = &names.f;
    let attrs = match &formula.kind {
        FormulaKind::Normal => String::new(),
        FormulaKind::Shared { index, range } => match range {
            Some(range) => format!(" t=\"shared\" ref=\"{}\" si=\"{index}\"", full_ref(range)),
            None => format!(" t=\"shared\" si=\"{index}\""),
        },
        FormulaKind::Array { range } => format!(" t=\"array\" ref=\"{}\"", full_ref(range)),
    };
    if formula.expr.is_empty() {
        out.push_str(&format!("<{f}{attrs}/>"));
    } else {
        out.push_str(&format!("<{f}{attrs}>{}</{f}>", xml_escape(&formula.expr)));
    }

    if let Some(value) = cached {
        let v = &names.v;
        match value {
            CellValue::Text(s) | CellValue::Error(s) => {
                out.push_str(&format!("<{v}>{}</{v}>", xml_escape(s)));
            }
            CellValue::Number(n) if n.is_finite() => out.push_str(&format!("<{v}>{n}</{v}>")),
            CellValue::Number(_) => out.push_str(&format!("<{v}>#NUM!</{v}>")),
            CellValue::Boolean(b) => out.push_str(&format!("<{v}>{}</{v}>", u8::from(*b))),
            CellValue::Empty | CellValue::Formula(_) => {}
        }
    }

    out.push_str(&format!("</{}>", names.c));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cell_ref::CellAddr;

    fn addr(a1: &str) -> CellAddr {
        a1.parse().unwrap()
    }

    fn envelope() -> SheetEnvelope {
        SheetEnvelope {
            head: "<worksheet>".into(),
            head_rest: Some("<sheetViews/>".into()),
            prefix: None,
            before_merges: String::new(),
            after_merges: "<pageMargins/></worksheet>".into(),
        }
    }

    #[test]
    fn test_writes_envelope_around_grid() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_text(addr("B2"), "Bases de datos");
        sheet.set_style(addr("B2"), Some(3));
        sheet.set_number(addr("B9"), 100.0);
        sheet.merge("D11:H11".parse().unwrap()).unwrap();

        let xml = write_sheet_xml(&sheet, &envelope());
        assert_eq!(
            xml,
            concat!(
                "<worksheet><dimension ref=\"B2:B9\"/><sheetViews/><sheetData>",
                "<row r=\"2\"><c r=\"B2\" s=\"3\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Bases de datos</t></is></c></row>",
                "<row r=\"9\"><c r=\"B9\"><v>100</v></c></row>",
                "</sheetData>",
                "<mergeCells count=\"1\"><mergeCell ref=\"D11:H11\"/></mergeCells>",
                "<pageMargins/></worksheet>"
            )
        );
    }

    #[test]
    fn test_formula_without_cache_has_no_value() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_formula(addr("J12"), "SUM(J9:J11)");
        let mut env = envelope();
        env.head_rest = None;
        let xml = write_sheet_xml(&sheet, &env);
        assert!(xml.contains("<c r=\"J12\"><f>SUM(J9:J11)</f></c>"));
        assert!(!xml.contains("<dimension"));
    }

    #[test]
    fn test_escapes_text_and_formula() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_text(addr("A1"), "Pérez & <Ruiz>");
        sheet.set_formula(addr("A2"), "IF(A1<>\"\",1,0)");
        let xml = write_sheet_xml(&sheet, &envelope());
        assert!(xml.contains("Pérez &amp; &lt;Ruiz&gt;"));
        assert!(xml.contains("<f>IF(A1&lt;&gt;&quot;&quot;,1,0)</f>"));
    }

    #[test]
    fn test_prefixed_elements() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_number(addr("A1"), 1.5);
        let mut env = envelope();
        env.prefix = Some("x".into());
        env.head_rest = None;
        let xml = write_sheet_xml(&sheet, &env);
        assert!(xml.contains("<x:sheetData><x:row r=\"1\"><x:c r=\"A1\"><x:v>1.5</x:v></x:c></x:row></x:sheetData>"));
    }

    #[test]
    fn test_empty_styled_cell() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_style(addr("C10"), Some(7));
        let xml = write_sheet_xml(&sheet, &envelope());
        assert!(xml.contains("<row r=\"10\"><c r=\"C10\" s=\"7\"/></row>"));
    }
}
