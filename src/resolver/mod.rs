//! Invocation resolver.
//!
//! Turns the selections made by the caller (course, students or teams,
//! rubric) into one [`Invocation`] per group together with its output file
//! name. Everything here is a pure function over explicit state.

pub mod filename;
pub mod teams;
pub mod weights;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{FacturaError, Result};
use crate::model::{Course, Group, Invocation};

pub use filename::{invoice_filename, sanitize};
pub use teams::TeamBoard;
pub use weights::{PartConfig, RubricConfig};

/// How students are grouped into invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "students")]
pub enum StudentSelection {
    /// One invoice per listed student.
    Individual(Vec<String>),
    /// One invoice per student on the roster.
    All,
    /// One invoice per team.
    Teams(Vec<Vec<String>>),
}

impl StudentSelection {
    /// Expand to groups, checking every name against `roster`.
    ///
    /// # Errors
    /// [`FacturaError::Request`] for names missing from the roster, a
    /// student placed in two teams, or a selection with no students.
    pub fn into_groups(self, roster: &[String]) -> Result<Vec<Group>> {
        let known: HashSet<&str> = roster.iter().map(String::as_str).collect();
        let check = |name: &str| {
            if known.contains(name) {
                Ok(())
            } else {
                Err(FacturaError::Request(format!("{name} is not on the roster")))
            }
        };

        let groups = match self {
            Self::Individual(students) => {
                let mut seen = HashSet::new();
                let mut groups = Vec::with_capacity(students.len());
                for name in students {
                    check(&name)?;
                    if seen.insert(name.clone()) {
                        groups.push(Group::single(name));
                    }
                }
                groups
            }
            Self::All => roster.iter().cloned().map(Group::single).collect(),
            Self::Teams(teams) => {
                let mut board = TeamBoard::new(teams.len());
                for (i, members) in teams.into_iter().enumerate() {
                    for name in &members {
                        check(name)?;
                    }
                    board.assign(i, members)?;
                }
                board.groups()
            }
        };

        if groups.is_empty() {
            return Err(FacturaError::Request("no students selected".into()));
        }
        Ok(groups)
    }
}

/// A complete generation run as chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub course: Course,
    pub task_name: String,
    /// What the rubric rows are called ("Parte", "Ejercicio", "Reto").
    pub part_label: String,
    pub rubric: RubricConfig,
    pub groups: Vec<Group>,
}

/// One invoice to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInvoice {
    pub invocation: Invocation,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub invoices: Vec<PlannedInvoice>,
    /// Total weight, when it is not 100. Never blocks generation.
    pub weight_warning: Option<f64>,
}

/// Plan every invoice of a run.
///
/// # Errors
/// [`FacturaError::Request`] when there are no parts or no groups, or when a
/// student appears in more than one group.
pub fn resolve(request: &GenerationRequest) -> Result<Resolution> {
    if request.rubric.parts.is_empty() {
        return Err(FacturaError::Request("the rubric has no parts".into()));
    }
    if request.groups.is_empty() {
        return Err(FacturaError::Request("no groups to invoice".into()));
    }
    ensure_disjoint(&request.groups)?;

    let weight_warning = request.rubric.weight_warning();
    if let Some(total) = weight_warning {
        tracing::warn!(total, "rubric weights do not add up to 100%");
    }

    let parts = request.rubric.to_parts(&request.part_label);
    let course_label = request.course.label();

    let invoices = request
        .groups
        .iter()
        .map(|group| PlannedInvoice {
            filename: invoice_filename(&request.task_name, &request.course.code, group),
            invocation: Invocation {
                course_label: course_label.clone(),
                task_name: request.task_name.clone(),
                part_label: request.part_label.clone(),
                group: group.clone(),
                parts: parts.clone(),
            },
        })
        .collect();

    Ok(Resolution {
        invoices,
        weight_warning,
    })
}

fn ensure_disjoint(groups: &[Group]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in groups.iter().flat_map(Group::members) {
        if !seen.insert(name.as_str()) {
            return Err(FacturaError::Request(format!(
                "{name} appears in more than one group"
            )));
        }
    }
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
    use std::collections::BTreeMap;

    fn roster() -> Vec<String> {
        ["Pérez García", "Gómez Li", "Mora Luis"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn request(groups: Vec<Group>) -> GenerationRequest {
        GenerationRequest {
            course: Course {
                code: "CE1101".into(),
                name: "Programación".into(),
            },
            task_name: "Tarea 1: Intro/Basics".into(),
            part_label: "Parte".into(),
            rubric: RubricConfig::default().resize(2, &BTreeMap::new()),
            groups,
        }
    }

    #[test]
    fn test_resolve_team() {
        let groups = StudentSelection::Teams(vec![vec!["Pérez García".into(), "Gómez Li".into()]])
            .into_groups(&roster())
            .unwrap();
        let resolution = resolve(&request(groups)).unwrap();
        assert!(resolution.weight_warning.is_none());
        let invoice = &resolution.invoices[0];
        assert_eq!(
            invoice.filename,
            "Factura_Tarea_1_IntroBasics_CE1101_Equipo_Pérez_Gómez.xlsx"
        );
        assert_eq!(invoice.invocation.course_label, "CE1101 - Programación");
        assert_eq!(invoice.invocation.parts.len(), 2);
        assert_eq!(invoice.invocation.parts[1].weight, 50.0);
    }

    #[test]
    fn test_all_students_are_individual_groups() {
        let groups = StudentSelection::All.into_groups(&roster()).unwrap();
        let resolution = resolve(&request(groups)).unwrap();
        let names: Vec<&str> = resolution.invoices.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Factura_Tarea_1_IntroBasics_CE1101_Pérez_García.xlsx",
                "Factura_Tarea_1_IntroBasics_CE1101_Gómez_Li.xlsx",
                "Factura_Tarea_1_IntroBasics_CE1101_Mora_Luis.xlsx",
            ]
        );
    }

    #[test]
    fn test_overlapping_teams_rejected() {
        let selection = StudentSelection::Teams(vec![
            vec!["Pérez García".into()],
            vec!["Pérez García".into(), "Mora Luis".into()],
        ]);
        assert!(selection.into_groups(&roster()).is_err());

        let groups = vec![Group::single("Mora Luis"), Group::single("Mora Luis")];
        assert!(matches!(
            resolve(&request(groups)),
            Err(FacturaError::Request(_))
        ));
    }

    #[test]
    fn test_unknown_and_empty_selections() {
        assert!(StudentSelection::Individual(vec!["Nadie".into()])
            .into_groups(&roster())
            .is_err());
        assert!(StudentSelection::Individual(Vec::new())
            .into_groups(&roster())
            .is_err());
        assert!(resolve(&request(Vec::new())).is_err());
    }

    #[test]
    fn test_weight_warning_is_reported_not_fatal() {
        let mut req = request(vec![Group::single("Mora Luis")]);
        req.rubric = req.rubric.resize(2, &BTreeMap::from([(0, 80.0)]));
        let resolution = resolve(&req).unwrap();
        assert_eq!(resolution.weight_warning, Some(130.0));
        assert_eq!(resolution.invoices.len(), 1);
    }

    #[test]
    fn test_selection_json() {
        let all: StudentSelection = serde_json::from_str(r#"{"mode": "all"}"#).unwrap();
        assert_eq!(all, StudentSelection::All);
        let teams: StudentSelection =
            serde_json::from_str(r#"{"mode": "teams", "students": [["Mora Luis"]]}"#).unwrap();
        assert_eq!(teams, StudentSelection::Teams(vec![vec!["Mora Luis".into()]]));
    }
}
