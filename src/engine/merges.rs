//! Best-effort merge cleanup.
//!
//! Removing a merge that is not there is expected while repairing the
//! template and is ignored. Any other merge failure is returned.

use std::ops::RangeInclusive;

use crate::cell_ref::CellRange;
use crate::error::Result;
use crate::types::Sheet;

/// Remove `range` if it is merged. Returns whether a merge was removed.
pub(crate) fn unmerge_best_effort(sheet: &mut Sheet, range: CellRange) -> Result<bool> {
    match sheet.unmerge(range) {
        Ok(()) => Ok(true),
        Err(e) if e.is_merge_miss() => {
            tracing::trace!(%range, "no merge to remove");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Remove every merge whose first row falls in `rows`. Returns how many
/// were removed.
pub(crate) fn sweep_starting_in(sheet: &mut Sheet, rows: RangeInclusive<u32>) -> Result<usize> {
    let stray: Vec<CellRange> = sheet
        .merges()
        .iter()
        .filter(|m| rows.contains(&m.start_row))
        .copied()
        .collect();

    let mut removed = 0;
    for range in stray {
        if unmerge_best_effort(sheet, range)? {
            tracing::debug!(%range, "removed stray merge");
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_unmerge_missing_is_ignored() {
        let mut sheet = Sheet::new("Hoja1");
        assert!(!unmerge_best_effort(&mut sheet, "D10:H10".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_sweep_only_touches_rows_in_range() {
        let mut sheet = Sheet::new("Hoja1");
        for r in ["A1:B1", "E13:H13", "D9:E9", "D20:H20"] {
            sheet.merge(r.parse().unwrap()).unwrap();
        }
        let removed = sweep_starting_in(&mut sheet, 8..=13).unwrap();
        assert_eq!(removed, 2);
        let left: Vec<String> = sheet.merges().iter().map(ToString::to_string).collect();
        assert_eq!(left, vec!["A1:B1", "D20:H20"]);
    }
}
