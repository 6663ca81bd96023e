//! Template layout engine.
//!
//! Turns the template into one invoice: header values, the rubric block
//! resized to N rows with the native row's formatting, the net-grade merge
//! repaired, and the formulas below the block rewritten for the new rows.

pub mod formulas;
mod merges;

use crate::cell_ref::CellAddr;
use crate::error::{FacturaError, Result};
use crate::layout::TemplateLayout;
use crate::model::Invocation;
use crate::types::{Sheet, Workbook};

/// Render one invoice from `template`.
///
/// The template is cloned; the returned workbook is independent of it and of
/// every other invoice rendered from it.
///
/// # Errors
/// [`FacturaError::Request`] when the invocation has no parts,
/// [`FacturaError::Template`] when the native rubric row is missing, and any
/// merge failure other than removing a merge that does not exist.
pub fn render(
    template: &Workbook,
    invocation: &Invocation,
    layout: &TemplateLayout,
) -> Result<Workbook> {
    let n = invocation.part_count();
    if n == 0 {
        return Err(FacturaError::Request("an invoice needs at least one rubric part".into()));
    }
    check_anchors(&template.sheet, layout)?;

    let mut book = template.clone();
    let sheet = &mut book.sheet;

    write_header(sheet, invocation, layout);

    // Captured before any unmerge; the anchor moves with the rows below it.
    let net_style = sheet.style_at(layout.template_net_anchor());

    if n > 1 {
        expand_block(sheet, n, layout)?;
    }

    populate_parts(sheet, invocation, layout);
    relocate_totals(sheet, n, layout, net_style)?;

    tracing::debug!(
        parts = n,
        group = %invocation.group.display_names(),
        merges = sheet.merges().len(),
        "rendered invoice"
    );
    Ok(book)
}

fn check_anchors(sheet: &Sheet, layout: &TemplateLayout) -> Result<()> {
    if sheet.row(layout.native_row).is_none() {
        return Err(FacturaError::Template(format!(
            "native rubric row {} is missing from sheet '{}'",
            u64::from(layout.native_row) + 1,
            sheet.name
        )));
    }
    Ok(())
}

fn write_header(sheet: &mut Sheet, invocation: &Invocation, layout: &TemplateLayout) {
    sheet.set_text(layout.course_cell, invocation.course_label.as_str());
    sheet.set_text(layout.task_cell, invocation.task_name.as_str());

    let caption = if invocation.group.is_team() {
        &layout.team_caption
    } else {
        &layout.single_caption
    };
    sheet.set_text(layout.group_caption_cell, caption.as_str());
    sheet.set_text(layout.group_names_cell, invocation.group.display_names());
}

/// Grow the rubric block from one row to `n`.
fn expand_block(sheet: &mut Sheet, n: u32, layout: &TemplateLayout) -> Result<()> {
    // The band merges belong to the old layout
    for row in layout.template_band_rows() {
        merges::unmerge_best_effort(sheet, layout.band_cols.on_row(row))?;
    }

    let inserted = n - 1;
    sheet.insert_rows(layout.native_row + 1, inserted);

    let swept = merges::sweep_starting_in(sheet, layout.native_row..=layout.block_end(n))?;
    tracing::debug!(inserted, swept, "expanded rubric block");
    Ok(())
}

fn populate_parts(sheet: &mut Sheet, invocation: &Invocation, layout: &TemplateLayout) {
    let native = layout.native_row;
    for (row, part) in (native..).zip(&invocation.parts) {
        sheet.set_text(CellAddr::new(row, layout.label_col), part.label.as_str());
        sheet.set_number(CellAddr::new(row, layout.weight_col), part.weight);
        sheet.set_formula(
            CellAddr::new(row, layout.score_col),
            formulas::part_score(layout, row),
        );

        if row > native {
            for col in layout.styled_cols.cols() {
                sheet.copy_style(CellAddr::new(native, col), CellAddr::new(row, col));
            }
            sheet.copy_row_attrs(native, row);
        }
    }
}

/// Rewrite the totals below the block and restore the net-grade merge.
fn relocate_totals(
    sheet: &mut Sheet,
    n: u32,
    layout: &TemplateLayout,
    net_style: Option<u32>,
) -> Result<()> {
    let net_row = layout.net_row(n);

    sheet.merge(layout.band_cols.on_row(net_row))?;
    if net_style.is_some() {
        sheet.set_style(CellAddr::new(net_row, layout.band_cols.first), net_style);
    }

    sheet.set_formula(
        CellAddr::new(net_row, layout.score_col),
        formulas::net_grade(layout, n),
    );
    sheet.set_formula(
        CellAddr::new(layout.penalty_sum_row(n), layout.penalty_sum_col),
        formulas::late_penalty(layout, n),
    );
    sheet.set_formula(
        CellAddr::new(layout.final_row(n), layout.score_col),
        formulas::final_grade(layout, n),
    );
    Ok(())
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
    use crate::model::{Group, RubricPart};
    use crate::types::SheetEnvelope;
    use std::sync::Arc;

    fn addr(a1: &str) -> CellAddr {
        a1.parse().unwrap()
    }

    /// The reference layout without a package behind it.
    fn template() -> Workbook {
        let mut sheet = Sheet::new("Hoja1");
        sheet.set_text(addr("A2"), "Curso:");
        for col in ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K"] {
            sheet.set_style(addr(&format!("{col}9")), Some(5));
        }
        sheet.set_text(addr("A9"), "Parte 1");
        sheet.set_number(addr("B9"), 100.0);
        sheet.set_style(addr("D11"), Some(9));
        sheet.set_text(addr("A11"), "Nota neta");
        sheet.set_text(addr("A13"), "Nota final");
        sheet.merge("D11:H11".parse().unwrap()).unwrap();
        sheet.merge("A1:K1".parse().unwrap()).unwrap();
        Workbook {
            sheet,
            package: Arc::from(Vec::new()),
            sheet_path: "xl/worksheets/sheet1.xml".into(),
            envelope: SheetEnvelope::default(),
        }
    }

    fn invocation(weights: &[f64], members: &[&str]) -> Invocation {
        Invocation {
            course_label: "CE-1101 - Programación".into(),
            task_name: "Tarea 1".into(),
            part_label: "Parte".into(),
            group: Group::new(members.iter().map(ToString::to_string).collect()).unwrap(),
            parts: weights
                .iter()
                .zip(0..)
                .map(|(&w, i)| RubricPart::new("Parte", i, w, None))
                .collect(),
        }
    }

    #[test]
    fn test_single_part_keeps_native_layout() {
        let template = template();
        let layout = TemplateLayout::default();
        let out = render(&template, &invocation(&[100.0], &["Mora Luis"]), &layout).unwrap();

        assert_eq!(out.sheet.cell(addr("A11")).unwrap().text(), Some("Nota neta"));
        assert_eq!(out.sheet.cell(addr("A5")).unwrap().text(), Some("Estudiante:"));
        assert_eq!(out.sheet.cell(addr("B5")).unwrap().text(), Some("Mora Luis"));
        assert_eq!(
            out.sheet.cell(addr("J11")).unwrap().formula().unwrap().expr,
            "SUM(J9:J10)"
        );
        let merges: Vec<String> = out.sheet.merges().iter().map(ToString::to_string).collect();
        assert_eq!(merges, vec!["D11:H11", "A1:K1"]);
        assert_eq!(out.sheet.style_at(addr("D11")), Some(9));
    }

    #[test]
    fn test_three_parts_shift_totals_and_copy_styles() {
        let template = template();
        let layout = TemplateLayout::default();
        let out = render(
            &template,
            &invocation(&[50.0, 30.0, 20.0], &["Pérez García", "Gómez Li"]),
            &layout,
        )
        .unwrap();
        let sheet = &out.sheet;

        assert_eq!(sheet.cell(addr("A5")).unwrap().text(), Some("Estudiantes:"));
        assert_eq!(sheet.cell(addr("B5")).unwrap().text(), Some("Pérez García, Gómez Li"));
        assert_eq!(sheet.cell(addr("A11")).unwrap().text(), Some("Parte 3"));
        assert_eq!(sheet.cell(addr("B10")).unwrap().number(), Some(30.0));
        assert_eq!(sheet.cell(addr("A13")).unwrap().text(), Some("Nota neta"));
        assert_eq!(sheet.style_at(addr("K11")), Some(5));
        assert_eq!(sheet.style_at(addr("D13")), Some(9));
        assert_eq!(
            sheet.cell(addr("J13")).unwrap().formula().unwrap().expr,
            "SUM(J9:J12)"
        );
        assert_eq!(
            sheet.cell(addr("J15")).unwrap().formula().unwrap().expr,
            "J13-J13*F20"
        );
        let merges: Vec<String> = sheet.merges().iter().map(ToString::to_string).collect();
        assert_eq!(merges, vec!["A1:K1", "D13:H13"]);
    }

    #[test]
    fn test_template_is_not_mutated() {
        let template = template();
        let layout = TemplateLayout::default();
        render(&template, &invocation(&[25.0; 4], &["Mora Luis"]), &layout).unwrap();
        assert!(template.sheet.cell(addr("B5")).is_none());
        assert_eq!(template.sheet.cell(addr("A11")).unwrap().text(), Some("Nota neta"));
    }

    #[test]
    fn test_missing_band_merge_is_ignored() {
        let mut template = template();
        template.sheet.unmerge("D11:H11".parse().unwrap()).unwrap();
        let layout = TemplateLayout::default();
        let out = render(&template, &invocation(&[50.0, 30.0, 20.0], &["Mora Luis"]), &layout)
            .unwrap();
        let merges: Vec<String> = out.sheet.merges().iter().map(ToString::to_string).collect();
        assert_eq!(merges, vec!["A1:K1", "D13:H13"]);
    }

    #[test]
    fn test_merge_over_net_row_is_reported() {
        let mut template = template();
        template.sheet.unmerge("D11:H11".parse().unwrap()).unwrap();
        template.sheet.push_merge("C11:E11".parse().unwrap());
        let layout = TemplateLayout::default();

        let err = render(&template, &invocation(&[50.0, 30.0, 20.0], &["Mora Luis"]), &layout)
            .unwrap_err();
        match err {
            FacturaError::MergeOverlap { range, existing } => {
                assert_eq!(range, "D13:H13");
                assert_eq!(existing, "C13:E13");
            }
            other => panic!("expected MergeOverlap, got {other:?}"),
        }

        let err = render(&template, &invocation(&[100.0], &["Mora Luis"]), &layout).unwrap_err();
        assert!(matches!(err, FacturaError::MergeOverlap { .. }));
    }

    #[test]
    fn test_rejects_empty_parts_and_missing_native_row() {
        let layout = TemplateLayout::default();
        let err = render(&template(), &invocation(&[], &["Mora Luis"]), &layout).unwrap_err();
        assert!(matches!(err, FacturaError::Request(_)));

        let mut bare = template();
        bare.sheet = Sheet::new("Hoja1");
        let err = render(&bare, &invocation(&[100.0], &["Mora Luis"]), &layout).unwrap_err();
        assert!(matches!(err, FacturaError::Template(_)));
    }
}
