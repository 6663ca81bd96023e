//! Data passed from the resolver to the engine.

use serde::{Deserialize, Serialize};

use crate::error::{FacturaError, Result};

/// A course from the course list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub name: String,
}

impl Course {
    /// Label written to the invoice header, e.g. `CE-1101 - Introducción`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// One weighted rubric row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricPart {
    pub index: u32,
    /// Text of the label cell: `"{part_label} {index + 1}"`, plus
    /// `": {name}"` when a name was given.
    pub label: String,
    /// Percentage, 0 to 100.
    pub weight: f64,
    pub name: Option<String>,
}

impl RubricPart {
    #[must_use]
    pub fn new(part_label: &str, index: u32, weight: f64, name: Option<&str>) -> Self {
        let name = name.filter(|n| !n.trim().is_empty());
        let mut label = format!("{part_label} {}", u64::from(index) + 1);
        if let Some(name) = name {
            label.push_str(": ");
            label.push_str(name);
        }
        Self {
            index,
            label,
            weight,
            name: name.map(str::to_string),
        }
    }
}

/// Students evaluated together in one invoice. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Group(Vec<String>);

impl Group {
    /// # Errors
    /// [`FacturaError::Request`] for an empty member list.
    pub fn new(members: Vec<String>) -> Result<Self> {
        if members.is_empty() {
            return Err(FacturaError::Request("a group needs at least one student".into()));
        }
        Ok(Self(members))
    }

    #[must_use]
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.0
    }

    /// Two or more members.
    #[must_use]
    pub fn is_team(&self) -> bool {
        self.0.len() > 1
    }

    /// Names as written to the header: the single name, or all of them
    /// joined with `", "`.
    #[must_use]
    pub fn display_names(&self) -> String {
        self.0.join(", ")
    }
}

impl TryFrom<Vec<String>> for Group {
    type Error = FacturaError;

    fn try_from(members: Vec<String>) -> Result<Self> {
        Self::new(members)
    }
}

impl From<Group> for Vec<String> {
    fn from(group: Group) -> Self {
        group.0
    }
}

/// Everything needed to render one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub course_label: String,
    pub task_name: String,
    pub part_label: String,
    pub group: Group,
    pub parts: Vec<RubricPart>,
}

impl Invocation {
    /// Number of rubric rows (N).
    #[must_use]
    pub fn part_count(&self) -> u32 {
        u32::try_from(self.parts.len()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_part_label_with_and_without_name() {
        assert_eq!(RubricPart::new("Parte", 0, 50.0, None).label, "Parte 1");
        assert_eq!(RubricPart::new("Reto", 2, 50.0, Some("  ")).label, "Reto 3");
        let named = RubricPart::new("Ejercicio", 1, 25.0, Some("Árboles"));
        assert_eq!(named.label, "Ejercicio 2: Árboles");
        assert_eq!(named.name.as_deref(), Some("Árboles"));
    }

    #[test]
    fn test_part_name_kept_as_written() {
        let part = RubricPart::new("Parte", 0, 100.0, Some(" Pruebas  "));
        assert_eq!(part.label, "Parte 1:  Pruebas  ");
        assert_eq!(part.name.as_deref(), Some(" Pruebas  "));
    }

    #[test]
    fn test_group_rejects_empty() {
        assert!(Group::new(Vec::new()).is_err());
        assert!(serde_json::from_str::<Group>("[]").is_err());
        let team: Group = serde_json::from_str(r#"["Pérez García Ana", "Gómez Li Bo"]"#).unwrap();
        assert!(team.is_team());
        assert_eq!(team.display_names(), "Pérez García Ana, Gómez Li Bo");
        assert!(!Group::single("Mora Luis").is_team());
    }

    #[test]
    fn test_course_label() {
        let course = Course {
            code: "CE-1101".into(),
            name: "Introducción a la Programación".into(),
        };
        assert_eq!(course.label(), "CE-1101 - Introducción a la Programación");
    }
}
