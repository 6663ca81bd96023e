//! Anchor coordinates of the invoice template.
//!
//! The template is purely positional: the engine never searches for its
//! anchors, it reads them from a [`TemplateLayout`]. The defaults describe
//! the reference `plantilla.xlsx`; a configuration file may override any
//! field. In JSON, rows are 1-based numbers and columns are letters, the way
//! they appear in the spreadsheet application. In memory everything is
//! 0-indexed.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell_ref::{col_to_letter, letter_to_col, CellAddr, CellRange};
use crate::error::{FacturaError, Result};

/// An inclusive run of columns, written `C:H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColSpan {
    pub first: u32,
    pub last: u32,
}

impl ColSpan {
    #[must_use]
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    #[must_use]
    pub fn cols(self) -> RangeInclusive<u32> {
        self.first..=self.last
    }

    /// The span on a single row.
    #[must_use]
    pub fn on_row(self, row: u32) -> CellRange {
        CellRange::row_span(row, self.first, self.last)
    }
}

impl fmt::Display for ColSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", col_to_letter(self.first), col_to_letter(self.last))
    }
}

impl FromStr for ColSpan {
    type Err = FacturaError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || FacturaError::Template(format!("invalid column span '{s}'"));
        let (first, last) = s.split_once(':').ok_or_else(bad)?;
        let first = letter_to_col(first).ok_or_else(bad)?;
        let last = letter_to_col(last).ok_or_else(bad)?;
        if first > last {
            return Err(bad());
        }
        Ok(Self { first, last })
    }
}

impl Serialize for ColSpan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColSpan {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Every anchor the engine touches.
///
/// Rows below the rubric block are expressed as offsets from the row just
/// past the block, so for N parts the net grade sits on
/// `native_row + N + net_offset`. Keeping the offsets fixed is what makes the
/// downstream formulas line up for every N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateLayout {
    pub course_cell: CellAddr,
    pub task_cell: CellAddr,
    pub group_caption_cell: CellAddr,
    pub group_names_cell: CellAddr,
    /// Caption for a one-member group.
    pub single_caption: String,
    /// Caption for a team.
    pub team_caption: String,

    /// Header row holding the global weight of each criterion column.
    #[serde(with = "excel_row")]
    pub criteria_weight_row: u32,
    /// The template's built-in rubric row (R).
    #[serde(with = "excel_row")]
    pub native_row: u32,

    #[serde(with = "excel_col")]
    pub label_col: u32,
    #[serde(with = "excel_col")]
    pub weight_col: u32,
    #[serde(with = "excel_col")]
    pub score_col: u32,
    pub criteria_cols: ColSpan,
    /// Columns whose style is copied from the native row into new rows.
    pub styled_cols: ColSpan,

    /// Rows reserved below the block for the net-grade display.
    pub band_rows: u32,
    /// Columns merged on the net-grade row.
    pub band_cols: ColSpan,

    pub net_offset: u32,
    pub final_offset: u32,
    pub penalty_weights_offset: u32,
    pub penalty_checks_offset: u32,
    pub penalty_sum_offset: u32,
    #[serde(with = "excel_col")]
    pub penalty_sum_col: u32,
    /// Columns multiplied pairwise (check x weight) for the late penalty.
    pub penalty_cols: ColSpan,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            course_cell: CellAddr::new(1, 1),
            task_cell: CellAddr::new(2, 1),
            group_caption_cell: CellAddr::new(4, 0),
            group_names_cell: CellAddr::new(4, 1),
            single_caption: "Estudiante:".to_string(),
            team_caption: "Estudiantes:".to_string(),
            criteria_weight_row: 7,
            native_row: 8,
            label_col: 0,
            weight_col: 1,
            score_col: 9,
            criteria_cols: ColSpan::new(2, 7),
            styled_cols: ColSpan::new(0, 10),
            band_rows: 3,
            band_cols: ColSpan::new(3, 7),
            net_offset: 1,
            final_offset: 3,
            penalty_weights_offset: 4,
            penalty_checks_offset: 6,
            penalty_sum_offset: 8,
            penalty_sum_col: 5,
            penalty_cols: ColSpan::new(3, 7),
        }
    }
}

impl TemplateLayout {
    /// Row of rubric part `i` (0-based).
    #[must_use]
    pub const fn part_row(&self, i: u32) -> u32 {
        self.native_row + i
    }

    /// First row past a block of `n` parts; the offsets below count from here.
    #[must_use]
    pub const fn block_end(&self, n: u32) -> u32 {
        self.native_row + n
    }

    #[must_use]
    pub const fn net_row(&self, n: u32) -> u32 {
        self.block_end(n) + self.net_offset
    }

    #[must_use]
    pub const fn final_row(&self, n: u32) -> u32 {
        self.block_end(n) + self.final_offset
    }

    #[must_use]
    pub const fn penalty_weights_row(&self, n: u32) -> u32 {
        self.block_end(n) + self.penalty_weights_offset
    }

    #[must_use]
    pub const fn penalty_checks_row(&self, n: u32) -> u32 {
        self.block_end(n) + self.penalty_checks_offset
    }

    #[must_use]
    pub const fn penalty_sum_row(&self, n: u32) -> u32 {
        self.block_end(n) + self.penalty_sum_offset
    }

    /// The net-grade band rows as laid out in the unexpanded template.
    #[must_use]
    pub fn template_band_rows(&self) -> RangeInclusive<u32> {
        let first = self.native_row + 1;
        first..=first + self.band_rows.saturating_sub(1)
    }

    /// Top-left cell of the net-grade merge in the unexpanded template.
    #[must_use]
    pub const fn template_net_anchor(&self) -> CellAddr {
        CellAddr::new(self.net_row(1), self.band_cols.first)
    }

    /// Check that the anchors are mutually consistent.
    ///
    /// # Errors
    /// [`FacturaError::Template`] naming the first inconsistent anchor.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(FacturaError::Template(msg.to_string()));
        if self.criteria_weight_row >= self.native_row {
            return fail("criteria weight row must be above the native rubric row");
        }
        if self.band_rows == 0 {
            return fail("net-grade band needs at least one row");
        }
        if self.net_offset == 0 {
            return fail("net grade row must be below the rubric block");
        }
        let fixed_cols = [self.label_col, self.weight_col, self.score_col];
        if fixed_cols
            .iter()
            .any(|c| self.criteria_cols.cols().contains(c))
        {
            return fail("label, weight and score columns must lie outside the criteria columns");
        }
        if self.criteria_cols.first < self.styled_cols.first
            || self.criteria_cols.last > self.styled_cols.last
        {
            return fail("criteria columns must be inside the styled columns");
        }
        Ok(())
    }
}

/// 1-based row numbers in configuration files.
mod excel_row {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(row: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::from(*row) + 1)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let row = u32::deserialize(deserializer)?;
        row.checked_sub(1)
            .ok_or_else(|| serde::de::Error::custom("row numbers start at 1"))
    }
}

/// Column letters in configuration files.
mod excel_col {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::cell_ref::{col_to_letter, letter_to_col};

    pub fn serialize<S: Serializer>(col: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&col_to_letter(*col))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        letter_to_col(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid column '{text}'")))
    }
}
