//! Utilities for parsing and formatting Excel-style cell references and ranges.
//!
//! Rows and columns are 0-indexed everywhere in the crate; the A1 text form
//! is 1-based for rows and lettered for columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FacturaError;

/// Parse a cell reference like "A1" or "$D$8" into (col, row), 0-indexed.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    parse_cell_ref_bytes(cell_ref.trim().as_bytes())
}

/// Parse a cell reference from raw bytes (ASCII) into (col, row), 0-indexed.
///
/// This is the bytes equivalent of [`parse_cell_ref`] for use when working with
/// raw XML attribute values (e.g., `attr.value` from quick-xml).
pub fn parse_cell_ref_bytes(ref_bytes: &[u8]) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for &b in ref_bytes {
        if b == b'$' {
            continue;
        }
        if b.is_ascii_alphabetic() {
            // Letters after digits ("A1B") are not a reference.
            if saw_row {
                return None;
            }
            let upper = b.to_ascii_uppercase();
            col = col
                .checked_mul(26)?
                .checked_add(u32::from(upper - b'A') + 1)?;
            saw_col = true;
        } else if b.is_ascii_digit() {
            row = row.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row || row == 0 {
        return None;
    }

    Some((col - 1, row - 1))
}

/// Convert a 0-indexed column into its letter form (0 -> "A", 26 -> "AA").
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = u64::from(col) + 1;
    while n > 0 {
        n -= 1;
        let offset = u8::try_from(n % 26).unwrap_or(0);
        result.insert(0, char::from(b'A' + offset));
        n /= 26;
    }
    result
}

/// Parse a column in letter form ("D", "aa") into its 0-indexed number.
pub fn letter_to_col(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    parse_cell_ref(&format!("{letters}1")).map(|(col, _)| col)
}

/// A single cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddr {
    pub row: u32,
    pub col: u32,
}

impl CellAddr {
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Same column, another row.
    #[must_use]
    pub const fn at_row(self, row: u32) -> Self {
        Self { row, col: self.col }
    }

    /// A1 form with both coordinates absolute (`$D$8`).
    #[must_use]
    pub fn absolute(self) -> String {
        format!("${}${}", col_to_letter(self.col), u64::from(self.row) + 1)
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letter(self.col), u64::from(self.row) + 1)
    }
}

impl FromStr for CellAddr {
    type Err = FacturaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (col, row) =
            parse_cell_ref(s).ok_or_else(|| FacturaError::CellRef(s.to_string()))?;
        Ok(Self { row, col })
    }
}

impl Serialize for CellAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A rectangular range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Build a range from two corners given in any order.
    #[must_use]
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }

    /// A single-row range spanning `first_col..=last_col`.
    #[must_use]
    pub fn row_span(row: u32, first_col: u32, last_col: u32) -> Self {
        Self::new(row, first_col, row, last_col)
    }

    #[must_use]
    pub fn top_left(&self) -> CellAddr {
        CellAddr::new(self.start_row, self.start_col)
    }

    #[must_use]
    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }

    #[must_use]
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Adjust the range for `count` rows inserted before row `at`.
    ///
    /// Ranges entirely at or below `at` move down; a range straddling `at`
    /// grows to keep covering the same cells.
    #[must_use]
    pub fn shifted_for_insert(self, at: u32, count: u32) -> Self {
        if self.start_row >= at {
            Self {
                start_row: self.start_row.saturating_add(count),
                end_row: self.end_row.saturating_add(count),
                ..self
            }
        } else if self.end_row >= at {
            Self {
                end_row: self.end_row.saturating_add(count),
                ..self
            }
        } else {
            self
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = CellAddr::new(self.start_row, self.start_col);
        if self.start_row == self.end_row && self.start_col == self.end_col {
            return write!(f, "{start}");
        }
        let end = CellAddr::new(self.end_row, self.end_col);
        write!(f, "{start}:{end}")
    }
}

impl FromStr for CellRange {
    type Err = FacturaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cell_range(s).ok_or_else(|| FacturaError::CellRef(s.to_string()))
    }
}

/// Parse a cell range like "A1:B10" or a single cell "A1".
pub fn parse_cell_range(range: &str) -> Option<CellRange> {
    if let Some((start, end)) = range.split_once(':') {
        let (start_col, start_row) = parse_cell_ref(start)?;
        let (end_col, end_row) = parse_cell_ref(end)?;
        Some(CellRange::new(start_row, start_col, end_row, end_col))
    } else {
        let (col, row) = parse_cell_ref(range)?;
        Some(CellRange::new(row, col, row, col))
    }
}
