//! Formula text written by the engine. Formulas carry no leading `=`.

use crate::cell_ref::CellAddr;
use crate::layout::TemplateLayout;

/// Weighted score of the rubric row `row`: every criterion value times the
/// criterion's global weight from the header row, scaled by the row's own
/// percentage.
#[must_use]
pub fn part_score(layout: &TemplateLayout, row: u32) -> String {
    let terms: Vec<String> = layout
        .criteria_cols
        .cols()
        .map(|col| {
            let value = CellAddr::new(row, col);
            let weight = CellAddr::new(layout.criteria_weight_row, col).absolute();
            format!("{value}*{weight}")
        })
        .collect();
    let row_weight = CellAddr::new(row, layout.weight_col);
    format!("({})*{row_weight}/100", terms.join("+"))
}

/// Net grade: the score column from the native row through the first band
/// row, which is how the reference template sums it.
#[must_use]
pub fn net_grade(layout: &TemplateLayout, n: u32) -> String {
    let first = CellAddr::new(layout.native_row, layout.score_col);
    let last = CellAddr::new(layout.block_end(n), layout.score_col);
    format!("SUM({first}:{last})")
}

/// Late-penalty factor: check flag times weight, per penalty column.
#[must_use]
pub fn late_penalty(layout: &TemplateLayout, n: u32) -> String {
    let checks = layout.penalty_checks_row(n);
    let weights = layout.penalty_weights_row(n);
    layout
        .penalty_cols
        .cols()
        .map(|col| format!("{}*{}", CellAddr::new(checks, col), CellAddr::new(weights, col)))
        .collect::<Vec<_>>()
        .join("+")
}

/// Final grade: net grade reduced by the late-penalty factor.
#[must_use]
pub fn final_grade(layout: &TemplateLayout, n: u32) -> String {
    let net = CellAddr::new(layout.net_row(n), layout.score_col);
    let factor = CellAddr::new(layout.penalty_sum_row(n), layout.penalty_sum_col);
    format!("{net}-{net}*{factor}")
}
