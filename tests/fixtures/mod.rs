//! Test fixtures for generating invoice templates in memory.
//!
//! [`reference_template`] reproduces the layout of the real `plantilla.xlsx`
//! (1-based coordinates):
//!
//! - `A1:K1` merged title, header captions in column A, values in `B2`,
//!   `B3` and `B5`
//! - criterion weights on row 8 (`C8:H8`)
//! - the native rubric row 9, styled across `A:K`, with the weighted score
//!   formula in `J9`
//! - the net grade band on rows 10 to 12, `D11:H11` merged, `SUM(J9:J10)`
//!   in `J11`
//! - final grade in `J13`, late penalty weights on row 14, checks on row 16
//!   and the penalty factor in `F18`
//! - a calculation chain, so saving has something to drop
//!
//! # Example
//!
//! ```rust,ignore
//! let xlsx = reference_template().build();
//! let template = facturas::Workbook::from_bytes(xlsx).unwrap();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::ZipWriter;

/// Style indices of the fixture's `cellXfs` table.
pub mod style {
    pub const TITLE: u32 = 1;
    pub const CAPTION: u32 = 2;
    pub const VALUE: u32 = 3;
    pub const WEIGHT: u32 = 4;
    pub const RUBRIC: u32 = 5;
    pub const PERCENT: u32 = 6;
    pub const SCORE: u32 = 7;
    pub const TOTAL: u32 = 8;
    pub const NET_BAND: u32 = 9;
}

/// Height of the native rubric row.
pub const NATIVE_ROW_HEIGHT: &str = "24";

#[derive(Debug, Clone)]
enum Value {
    Blank,
    Text(String),
    Number(f64),
    Formula(String),
}

#[derive(Debug, Clone)]
struct CellSpec {
    style: Option<u32>,
    value: Value,
}

/// Builder for a single-sheet template package.
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    /// Keyed by 0-indexed (row, col).
    cells: BTreeMap<(u32, u32), CellSpec>,
    row_heights: BTreeMap<u32, String>,
    merges: Vec<String>,
    calc_chain: bool,
    sheet_name: String,
}

impl TemplateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calc_chain: true,
            sheet_name: "Factura".to_string(),
            ..Self::default()
        }
    }

    fn put(mut self, cell_ref: &str, style: Option<u32>, value: Value) -> Self {
        let (col, row) = facturas::cell_ref::parse_cell_ref(cell_ref)
            .unwrap_or_else(|| panic!("bad cell reference {cell_ref}"));
        self.cells.insert((row, col), CellSpec { style, value });
        self
    }

    #[must_use]
    pub fn text(self, cell_ref: &str, text: &str, style: Option<u32>) -> Self {
        self.put(cell_ref, style, Value::Text(text.to_string()))
    }

    #[must_use]
    pub fn number(self, cell_ref: &str, n: f64, style: Option<u32>) -> Self {
        self.put(cell_ref, style, Value::Number(n))
    }

    #[must_use]
    pub fn formula(self, cell_ref: &str, expr: &str, style: Option<u32>) -> Self {
        self.put(cell_ref, style, Value::Formula(expr.to_string()))
    }

    #[must_use]
    pub fn styled(self, cell_ref: &str, style: u32) -> Self {
        self.put(cell_ref, Some(style), Value::Blank)
    }

    /// Custom height for a 1-based row.
    #[must_use]
    pub fn row_height(mut self, row: u32, height: &str) -> Self {
        self.row_heights.insert(row - 1, height.to_string());
        self
    }

    #[must_use]
    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_string());
        self
    }

    #[must_use]
    pub fn without_calc_chain(mut self) -> Self {
        self.calc_chain = false;
        self
    }

    /// Remove every cell on a 1-based row.
    #[must_use]
    pub fn without_row(mut self, row: u32) -> Self {
        self.cells.retain(|&(r, _), _| r != row - 1);
        self.row_heights.remove(&(row - 1));
        self
    }

    /// Build the XLSX file as bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut shared_strings: Vec<String> = Vec::new();
        for cell in self.cells.values() {
            if let Value::Text(s) = &cell.value {
                if !shared_strings.contains(s) {
                    shared_strings.push(s.clone());
                }
            }
        }

        let parts = [
            ("[Content_Types].xml", content_types(self.calc_chain)),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/_rels/workbook.xml.rels", workbook_rels(self.calc_chain)),
            ("xl/workbook.xml", workbook(&self.sheet_name)),
            ("xl/styles.xml", STYLES.to_string()),
            ("xl/sharedStrings.xml", shared_strings_xml(&shared_strings)),
            ("xl/worksheets/sheet1.xml", self.sheet_xml(&shared_strings)),
        ];
        for (path, xml) in parts {
            zip.start_file(path, options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        if self.calc_chain {
            zip.start_file("xl/calcChain.xml", options).unwrap();
            zip.write_all(self.calc_chain_xml().as_bytes()).unwrap();
        }

        zip.finish().expect("Failed to finish ZIP").into_inner()
    }

    /// Build and write to `path`.
    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }

    fn sheet_xml(&self, shared_strings: &[String]) -> String {
        let mut rows: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for &r in self.row_heights.keys() {
            rows.entry(r).or_default();
        }
        for (&(r, c), cell) in &self.cells {
            let cell_ref = format!("{}{}", facturas::cell_ref::col_to_letter(c), r + 1);
            let s = cell.style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default();
            let xml = match &cell.value {
                Value::Blank => format!(r#"<c r="{cell_ref}"{s}/>"#),
                Value::Text(t) => {
                    let idx = shared_strings.iter().position(|x| x == t).unwrap();
                    format!(r#"<c r="{cell_ref}"{s} t="s"><v>{idx}</v></c>"#)
                }
                Value::Number(n) => format!(r#"<c r="{cell_ref}"{s}><v>{n}</v></c>"#),
                Value::Formula(f) => {
                    format!(r#"<c r="{cell_ref}"{s}><f>{}</f><v>0</v></c>"#, escape_xml(f))
                }
            };
            rows.entry(r).or_default().push(xml);
        }

        let mut sheet_data = String::new();
        for (r, cells) in rows {
            let ht = self
                .row_heights
                .get(&r)
                .map(|h| format!(r#" ht="{h}" customHeight="1""#))
                .unwrap_or_default();
            sheet_data.push_str(&format!(r#"<row r="{}"{ht}>"#, r + 1));
            for c in cells {
                sheet_data.push_str(&c);
            }
            sheet_data.push_str("</row>");
        }

        let merges = if self.merges.is_empty() {
            String::new()
        } else {
            let inner: String = self
                .merges
                .iter()
                .map(|m| format!(r#"<mergeCell ref="{m}"/>"#))
                .collect();
            format!(r#"<mergeCells count="{}">{inner}</mergeCells>"#, self.merges.len())
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:K20"/><sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/><cols><col min="1" max="1" width="28" customWidth="1"/><col min="2" max="11" width="11" customWidth="1"/></cols><sheetData>{sheet_data}</sheetData>{merges}<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><pageSetup orientation="landscape"/></worksheet>"#
        )
    }

    fn calc_chain_xml(&self) -> String {
        let entries: String = self
            .cells
            .iter()
            .filter(|(_, cell)| matches!(cell.value, Value::Formula(_)))
            .map(|(&(r, c), _)| {
                format!(
                    r#"<c r="{}{}" i="1"/>"#,
                    facturas::cell_ref::col_to_letter(c),
                    r + 1
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{entries}</calcChain>"#
        )
    }
}

/// The reference invoice template.
#[must_use]
pub fn reference_template() -> TemplateBuilder {
    use style::*;

    let mut b = TemplateBuilder::new()
        .text("A1", "Factura de calificación", Some(TITLE))
        .merge("A1:K1")
        .text("A2", "Curso:", Some(CAPTION))
        .styled("B2", VALUE)
        .text("A3", "Tarea:", Some(CAPTION))
        .styled("B3", VALUE)
        .text("A5", "Estudiante:", Some(CAPTION))
        .styled("B5", VALUE)
        .text("A7", "Parte", Some(CAPTION))
        .text("B7", "Porcentaje", Some(CAPTION))
        .text("J7", "Nota", Some(CAPTION))
        .text("A8", "Peso del criterio", Some(CAPTION));

    for (col, weight) in ["C", "D", "E", "F", "G", "H"]
        .iter()
        .zip([10.0, 20.0, 20.0, 20.0, 20.0, 10.0])
    {
        b = b.number(&format!("{col}8"), weight, Some(WEIGHT));
    }

    // Native rubric row
    for col in ["C", "D", "E", "F", "G", "H", "I", "K"] {
        b = b.styled(&format!("{col}9"), RUBRIC);
    }
    b = b
        .text("A9", "Parte 1", Some(RUBRIC))
        .number("B9", 100.0, Some(PERCENT))
        .formula(
            "J9",
            "(C9*$C$8+D9*$D$8+E9*$E$8+F9*$F$8+G9*$G$8+H9*$H$8)*B9/100",
            Some(SCORE),
        )
        .row_height(9, NATIVE_ROW_HEIGHT);

    // Net grade band
    b = b
        .text("A11", "Nota neta", Some(CAPTION))
        .text("D11", "Nota neta", Some(NET_BAND))
        .merge("D11:H11")
        .formula("J11", "SUM(J9:J10)", Some(TOTAL))
        .text("A13", "Nota final", Some(CAPTION))
        .formula("J13", "J11-J11*F18", Some(TOTAL))
        .text("A14", "Peso del atraso", Some(CAPTION))
        .text("A16", "Días de atraso", Some(CAPTION))
        .text("A18", "Penalización", Some(CAPTION))
        .formula("F18", "D16*D14+E16*E14+F16*F14+G16*G14+H16*H14", Some(TOTAL))
        .text("A20", "Observaciones:", Some(CAPTION));

    for (col, weight) in ["D", "E", "F", "G", "H"]
        .iter()
        .zip([0.1, 0.2, 0.3, 0.4, 0.5])
    {
        b = b
            .number(&format!("{col}14"), weight, Some(WEIGHT))
            .number(&format!("{col}16"), 0.0, Some(WEIGHT));
    }
    b
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn content_types(calc_chain: bool) -> String {
    let chain = if calc_chain {
        r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>{chain}</Types>"#
    )
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn workbook_rels(calc_chain: bool) -> String {
    let chain = if calc_chain {
        r#"<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>{chain}</Relationships>"#
    )
}

fn workbook(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView activeTab="0"/></bookViews><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets><calcPr calcId="191029"/></workbook>"#,
        escape_xml(sheet_name)
    )
}

fn shared_strings_xml(strings: &[String]) -> String {
    let items: String = strings
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", escape_xml(s)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{items}</sst>"#,
        strings.len()
    )
}

/// Ten cell formats; only their indices matter to the generator.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="0.00"/></numFmts><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFD9E1F2"/></patternFill></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="10"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"><alignment horizontal="center"/></xf><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/><xf numFmtId="9" fontId="0" fillId="0" borderId="1" xfId="0" applyNumberFormat="1" applyBorder="1"/><xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"><alignment wrapText="1"/></xf><xf numFmtId="164" fontId="0" fillId="0" borderId="1" xfId="0" applyNumberFormat="1" applyBorder="1"/><xf numFmtId="164" fontId="1" fillId="0" borderId="1" xfId="0" applyNumberFormat="1" applyFont="1" applyBorder="1"/><xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyNumberFormat="1" applyFont="1" applyFill="1" applyBorder="1"/><xf numFmtId="0" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1"><alignment horizontal="center"/></xf></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Read one part of a package as text.
#[must_use]
pub fn read_part(xlsx: &[u8], path: &str) -> Option<String> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(xlsx)).unwrap();
    let mut file = archive.by_name(path).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    Some(text)
}
