use crate::cell_ref::CellRange;

/// A single cell's value and style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// Index into the workbook's `cellXfs` table. One index carries the whole
    /// visual format: font, border, fill, number format and alignment.
    pub style_idx: Option<u32>,
    pub value: CellValue,
}

impl Cell {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn number(&self) -> Option<f64> {
        match self.value {
            CellValue::Number(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn formula(&self) -> Option<&Formula> {
        match &self.value {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }
}

/// Cell content.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    /// Style-only cell.
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(String),
    Formula(Formula),
}

/// A formula as stored in the worksheet, without the leading `=`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub expr: String,
    pub kind: FormulaKind,
    /// Last computed result saved by the spreadsheet application.
    pub cached: Option<Box<CellValue>>,
}

impl Formula {
    /// A plain formula with no cached result.
    #[must_use]
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            kind: FormulaKind::Normal,
            cached: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaKind {
    Normal,
    /// Shared formula group member; the group's master also carries the range.
    Shared { index: u32, range: Option<CellRange> },
    Array { range: CellRange },
}

impl FormulaKind {
    pub(crate) fn shift_for_insert(&mut self, at: u32, count: u32) {
        match self {
            Self::Normal => {}
            Self::Shared { range, .. } => {
                if let Some(r) = range {
                    *r = r.shifted_for_insert(at, count);
                }
            }
            Self::Array { range } => *range = range.shifted_for_insert(at, count),
        }
    }
}
