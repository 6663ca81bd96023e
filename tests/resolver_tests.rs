//! Invocation resolver tests: file names, weights and team selection.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::collections::BTreeMap;

use facturas::resolver::{
    self, invoice_filename, GenerationRequest, RubricConfig, StudentSelection, TeamBoard,
};
use facturas::{Course, FacturaError, Group};
use test_case::test_case;

fn course() -> Course {
    Course {
        code: "CE1101".into(),
        name: "Introducción a la Programación".into(),
    }
}

fn roster() -> Vec<String> {
    [
        "Pérez García Ana",
        "Gómez Li Bo",
        "Mora Vargas Luis",
        "Solano Ruiz Eva",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

// ============================================================================
// FILE NAMES
// ============================================================================

#[test]
fn test_team_filename_is_sanitized() {
    let team = Group::new(names(&["Pérez García", "Gómez Li"])).unwrap();
    assert_eq!(
        invoice_filename("Tarea 1: Intro/Basics", "CE1101", &team),
        "Factura_Tarea_1_IntroBasics_CE1101_Equipo_Pérez_Gómez.xlsx"
    );
}

#[test_case("Tarea 1", "Mora Vargas Luis", "Factura_Tarea_1_CE1101_Mora_Vargas_Luis.xlsx" ; "plain")]
#[test_case("  Tarea *2*  ", "Mora Luis", "Factura_Tarea_2_CE1101_Mora_Luis.xlsx" ; "trimmed and stripped")]
#[test_case("Proyecto", "O'Neil <Ana>", "Factura_Proyecto_CE1101_O'Neil_Ana.xlsx" ; "illegal in name")]
fn test_single_student_filename(task: &str, student: &str, expected: &str) {
    assert_eq!(
        invoice_filename(task, "CE1101", &Group::single(student)),
        expected
    );
}

#[test]
fn test_filenames_are_deterministic() {
    let request = GenerationRequest {
        course: course(),
        task_name: "Tarea 1".into(),
        part_label: "Parte".into(),
        rubric: RubricConfig::default(),
        groups: vec![Group::single("Mora Vargas Luis")],
    };
    let first = resolver::resolve(&request).unwrap();
    let second = resolver::resolve(&request).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// WEIGHTS
// ============================================================================

#[test]
fn test_three_to_five_parts_resets_weights() {
    let three = RubricConfig::default().resize(3, &BTreeMap::from([(0, 50.0), (1, 30.0), (2, 20.0)]));
    assert_eq!(three.parts[0].weight, 50.0);

    let five = three.resize(5, &BTreeMap::new());
    let weights: Vec<f64> = five.parts.iter().map(|p| p.weight).collect();
    assert_eq!(weights, vec![20.0; 5]);
    assert_eq!(five.weight_warning(), None);
}

#[test_case(0, 1 ; "clamped up")]
#[test_case(7, 7 ; "in range")]
#[test_case(99, 20 ; "clamped down")]
fn test_part_count_bounds(requested: u32, expected: u32) {
    assert_eq!(
        RubricConfig::default()
            .resize(requested, &BTreeMap::new())
            .part_count(),
        expected
    );
}

#[test]
fn test_weight_warning_does_not_block() {
    let rubric = RubricConfig::default().resize(2, &BTreeMap::from([(0, 70.0), (1, 40.0)]));
    let request = GenerationRequest {
        course: course(),
        task_name: "Tarea 1".into(),
        part_label: "Parte".into(),
        rubric,
        groups: vec![Group::single("Mora Vargas Luis")],
    };
    let plan = resolver::resolve(&request).unwrap();
    assert_eq!(plan.weight_warning, Some(110.0));
    assert_eq!(plan.invoices.len(), 1);
    assert_eq!(plan.invoices[0].invocation.parts[1].weight, 40.0);
}

// ============================================================================
// TEAMS
// ============================================================================

#[test]
fn test_student_cannot_join_two_teams() {
    let mut board = TeamBoard::new(2);
    board.assign(0, names(&["Pérez García Ana", "Gómez Li Bo"])).unwrap();

    let err = board.assign(1, names(&["Gómez Li Bo"])).unwrap_err();
    assert!(matches!(err, FacturaError::Request(_)));
    assert!(board.team(1).unwrap().is_empty());

    assert_eq!(
        board.available_for(1, &roster()),
        names(&["Mora Vargas Luis", "Solano Ruiz Eva"])
    );
}

#[test]
fn test_reassigning_within_the_same_team() {
    let mut board = TeamBoard::new(1);
    board.assign(0, names(&["Pérez García Ana"])).unwrap();
    board
        .assign(0, names(&["Pérez García Ana", "Mora Vargas Luis"]))
        .unwrap();
    assert_eq!(board.groups().len(), 1);
    assert!(board.groups()[0].is_team());
}

#[test]
fn test_teams_selection_rejects_overlap() {
    let selection = StudentSelection::Teams(vec![
        names(&["Pérez García Ana", "Gómez Li Bo"]),
        names(&["Gómez Li Bo", "Mora Vargas Luis"]),
    ]);
    assert!(selection.into_groups(&roster()).is_err());
}

#[test]
fn test_resolve_rejects_overlapping_groups() {
    let request = GenerationRequest {
        course: course(),
        task_name: "Tarea 1".into(),
        part_label: "Parte".into(),
        rubric: RubricConfig::default(),
        groups: vec![
            Group::new(names(&["Pérez García Ana", "Gómez Li Bo"])).unwrap(),
            Group::single("Gómez Li Bo"),
        ],
    };
    assert!(resolver::resolve(&request).is_err());
}

#[test]
fn test_all_students_one_invoice_each() {
    let groups = StudentSelection::All.into_groups(&roster()).unwrap();
    let request = GenerationRequest {
        course: course(),
        task_name: "Tarea 1".into(),
        part_label: "Reto".into(),
        rubric: RubricConfig::default().resize(3, &BTreeMap::new()),
        groups,
    };
    let plan = resolver::resolve(&request).unwrap();

    assert_eq!(plan.invoices.len(), 4);
    let first = &plan.invoices[0];
    assert_eq!(first.filename, "Factura_Tarea_1_CE1101_Pérez_García_Ana.xlsx");
    assert_eq!(
        first.invocation.course_label,
        "CE1101 - Introducción a la Programación"
    );
    assert_eq!(first.invocation.parts[2].label, "Reto 3");
}

#[test]
fn test_unknown_student_is_rejected() {
    let selection = StudentSelection::Individual(names(&["Nadie"]));
    assert!(selection.into_groups(&roster()).is_err());
}
