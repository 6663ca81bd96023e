use std::collections::BTreeMap;

use crate::cell_ref::{CellAddr, CellRange};
use crate::error::{FacturaError, Result};

use super::{Cell, CellValue, Formula};

/// A worksheet row: its own XML attributes (height, row style, ...) and a
/// sparse map of cells keyed by 0-indexed column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Attributes other than `r` and `spans`, in escaped XML form.
    pub attrs: Vec<(String, String)>,
    pub cells: BTreeMap<u32, Cell>,
}

/// The editable cell grid of one worksheet.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    rows: BTreeMap<u32, Row>,
    merges: Vec<CellRange>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rows in ascending order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &Row)> {
        self.rows.iter().map(|(&r, row)| (r, row))
    }

    #[must_use]
    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(&row)
    }

    #[must_use]
    pub fn cell(&self, addr: CellAddr) -> Option<&Cell> {
        self.rows.get(&addr.row)?.cells.get(&addr.col)
    }

    /// Mutable access to a cell, creating it (and its row) when absent.
    pub fn cell_mut(&mut self, addr: CellAddr) -> &mut Cell {
        self.rows
            .entry(addr.row)
            .or_default()
            .cells
            .entry(addr.col)
            .or_default()
    }

    /// Replace the value of a cell, keeping its style.
    pub fn set_value(&mut self, addr: CellAddr, value: CellValue) {
        self.cell_mut(addr).value = value;
    }

    pub fn set_text(&mut self, addr: CellAddr, text: impl Into<String>) {
        self.set_value(addr, CellValue::Text(text.into()));
    }

    pub fn set_number(&mut self, addr: CellAddr, n: f64) {
        self.set_value(addr, CellValue::Number(n));
    }

    /// Write a formula (no leading `=`) with no cached result.
    pub fn set_formula(&mut self, addr: CellAddr, expr: impl Into<String>) {
        self.set_value(addr, CellValue::Formula(Formula::new(expr)));
    }

    #[must_use]
    pub fn style_at(&self, addr: CellAddr) -> Option<u32> {
        self.cell(addr).and_then(|c| c.style_idx)
    }

    pub fn set_style(&mut self, addr: CellAddr, style_idx: Option<u32>) {
        self.cell_mut(addr).style_idx = style_idx;
    }

    /// Copy the style of `from` onto `to`. A source without a style leaves
    /// the target untouched.
    pub fn copy_style(&mut self, from: CellAddr, to: CellAddr) {
        if let Some(style) = self.style_at(from) {
            self.set_style(to, Some(style));
        }
    }

    /// Copy row-level attributes (height, row style) from one row to another.
    pub fn copy_row_attrs(&mut self, from: u32, to: u32) {
        let Some(attrs) = self.rows.get(&from).map(|r| r.attrs.clone()) else {
            return;
        };
        self.rows.entry(to).or_default().attrs = attrs;
    }

    /// Bounding range of every row and cell present, for `<dimension>`.
    #[must_use]
    pub fn used_range(&self) -> Option<CellRange> {
        let (&first_row, _) = self.rows.iter().next()?;
        let (&last_row, _) = self.rows.iter().next_back()?;
        let mut min_col = u32::MAX;
        let mut max_col = 0;
        for row in self.rows.values() {
            if let Some((&c, _)) = row.cells.iter().next() {
                min_col = min_col.min(c);
            }
            if let Some((&c, _)) = row.cells.iter().next_back() {
                max_col = max_col.max(c);
            }
        }
        if min_col == u32::MAX {
            min_col = 0;
        }
        Some(CellRange::new(first_row, min_col, last_row, max_col))
    }

    /// Insert `count` empty rows before row `at`.
    ///
    /// Rows at or below `at` move down together with their cells and row
    /// attributes. Shared/array formula ranges and merges are adjusted the
    /// way the spreadsheet application adjusts them. Formula text is left
    /// as-is.
    pub fn insert_rows(&mut self, at: u32, count: u32) {
        if count == 0 {
            return;
        }
        let moved = self.rows.split_off(&at);
        for (r, row) in moved {
            self.rows.insert(r.saturating_add(count), row);
        }
        for row in self.rows.values_mut() {
            for cell in row.cells.values_mut() {
                if let CellValue::Formula(f) = &mut cell.value {
                    f.kind.shift_for_insert(at, count);
                }
            }
        }
        for merge in &mut self.merges {
            *merge = merge.shifted_for_insert(at, count);
        }
    }

    #[must_use]
    pub fn merges(&self) -> &[CellRange] {
        &self.merges
    }

    /// Merge a range. Merging a range that is already merged is a no-op.
    ///
    /// # Errors
    /// [`FacturaError::MergeOverlap`] when another merge covers part of `range`.
    pub fn merge(&mut self, range: CellRange) -> Result<()> {
        if self.merges.contains(&range) {
            return Ok(());
        }
        if let Some(existing) = self.merges.iter().find(|m| m.overlaps(&range)) {
            return Err(FacturaError::MergeOverlap {
                range: range.to_string(),
                existing: existing.to_string(),
            });
        }
        self.merges.push(range);
        Ok(())
    }

    /// Remove the merge with exactly this range.
    ///
    /// # Errors
    /// [`FacturaError::MergeNotFound`] when no such merge exists.
    pub fn unmerge(&mut self, range: CellRange) -> Result<()> {
        let idx = self
            .merges
            .iter()
            .position(|m| *m == range)
            .ok_or_else(|| FacturaError::MergeNotFound(range.to_string()))?;
        self.merges.remove(idx);
        Ok(())
    }

    /// Used by the parser: add a row read from the worksheet XML.
    pub(crate) fn push_row(&mut self, r: u32, row: Row) {
        self.rows.insert(r, row);
    }

    /// Used by the parser: record a merge as read, without overlap checks.
    pub(crate) fn push_merge(&mut self, range: CellRange) {
        self.merges.push(range);
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
    use crate::types::FormulaKind;

    fn addr(a1: &str) -> CellAddr {
        a1.parse().unwrap()
    }

    #[test]
    fn test_set_value_keeps_style() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_style(addr("B5"), Some(4));
        sheet.set_text(addr("B5"), "Ana");
        let cell = sheet.cell(addr("B5")).unwrap();
        assert_eq!(cell.style_idx, Some(4));
        assert_eq!(cell.text(), Some("Ana"));
    }

    #[test]
    fn test_insert_rows_moves_cells_and_attrs() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_text(addr("A9"), "Parte 1");
        let mut band = Row {
            attrs: vec![("ht".into(), "24".into())],
            cells: BTreeMap::new(),
        };
        band.cells.insert(
            9,
            Cell {
                style_idx: None,
                value: CellValue::Text("neta".into()),
            },
        );
        sheet.push_row(10, band);

        sheet.insert_rows(9, 3);

        assert_eq!(sheet.cell(addr("A9")).unwrap().text(), Some("Parte 1"));
        assert!(sheet.cell(addr("J11")).is_none());
        assert_eq!(sheet.cell(addr("J14")).unwrap().text(), Some("neta"));
        assert_eq!(sheet.row(13).unwrap().attrs[0].1, "24");
        assert!(sheet.row(10).is_none());
    }

    #[test]
    fn test_insert_rows_shifts_merges_and_shared_ranges() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.push_merge("D11:H11".parse().unwrap());
        sheet.push_merge("A1:B1".parse().unwrap());
        sheet.set_value(
            addr("K12"),
            CellValue::Formula(Formula {
                expr: "J12*2".into(),
                kind: FormulaKind::Shared {
                    index: 0,
                    range: Some("K12:K14".parse().unwrap()),
                },
                cached: None,
            }),
        );

        sheet.insert_rows(9, 2);

        let merges: Vec<String> = sheet.merges().iter().map(ToString::to_string).collect();
        assert_eq!(merges, vec!["D13:H13", "A1:B1"]);
        let f = sheet.cell(addr("K14")).unwrap().formula().unwrap();
        assert_eq!(
            f.kind,
            FormulaKind::Shared {
                index: 0,
                range: Some("K14:K16".parse().unwrap())
            }
        );
    }

    #[test]
    fn test_insert_zero_rows_is_noop() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_number(addr("B9"), 100.0);
        sheet.insert_rows(9, 0);
        assert_eq!(sheet.cell(addr("B9")).unwrap().number(), Some(100.0));
    }

    #[test]
    fn test_merge_is_idempotent_for_identical_range() {
        let mut sheet = Sheet::new("Hoja1");
        let range: CellRange = "D11:H11".parse().unwrap();
        sheet.merge(range).unwrap();
        sheet.merge(range).unwrap();
        assert_eq!(sheet.merges().len(), 1);
    }

    #[test]
    fn test_merge_rejects_overlap() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.merge("D11:H11".parse().unwrap()).unwrap();
        let err = sheet.merge("E11:I11".parse().unwrap()).unwrap_err();
        assert!(matches!(err, FacturaError::MergeOverlap { .. }));
    }

    #[test]
    fn test_unmerge_missing_range() {
        let mut sheet = Sheet::new("Hoja1");
        let err = sheet.unmerge("D10:H10".parse().unwrap()).unwrap_err();
        assert!(err.is_merge_miss());
    }

    #[test]
    fn test_copy_style_skips_unstyled_source() {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_style(addr("C10"), Some(7));
        sheet.copy_style(addr("C9"), addr("C10"));
        assert_eq!(sheet.style_at(addr("C10")), Some(7));

        sheet.set_style(addr("C9"), Some(3));
        sheet.copy_style(addr("C9"), addr("C10"));
        assert_eq!(sheet.style_at(addr("C10")), Some(3));
    }

    #[test]
    fn test_used_range() {
        let mut sheet = Sheet::new("Hoja1");
        assert!(sheet.used_range().is_none());
        sheet.set_text(addr("B2"), "x");
        sheet.set_text(addr("K17"), "y");
        assert_eq!(sheet.used_range().unwrap().to_string(), "B2:K17");
    }
}
