//! Job files: a fully resolved selection saved as JSON.
//!
//! ```json
//! {
//!   "course": "CE1101",
//!   "roster": "grupo1.csv",
//!   "students": { "mode": "teams", "students": [["Pérez García Ana", "Gómez Li Bo"]] },
//!   "task_name": "Tarea 1",
//!   "part_label": "Parte",
//!   "parts": [{ "weight": 60 }, { "weight": 40, "name": "Pruebas" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FacturaError, Result};
use crate::model::Course;
use crate::resolver::{GenerationRequest, PartConfig, RubricConfig, StudentSelection};
use crate::roster::find_course;

fn default_task_name() -> String {
    "Tarea 1".to_string()
}

fn default_part_label() -> String {
    "Parte".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Course code, looked up in the course list.
    pub course: String,
    /// Roster file, relative to the job file's directory.
    pub roster: PathBuf,
    pub students: StudentSelection,
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default = "default_part_label")]
    pub part_label: String,
    /// Rubric parts in order. When only `part_count` is given the weights
    /// are spread evenly. Counts and weights are clamped as in the UI.
    #[serde(default)]
    pub parts: Vec<PartConfig>,
    #[serde(default)]
    pub part_count: Option<u32>,
}

impl Job {
    /// # Errors
    /// I/O or JSON errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut job: Self = serde_json::from_slice(&data)?;
        if job.roster.is_relative() {
            if let Some(dir) = path.parent() {
                job.roster = dir.join(&job.roster);
            }
        }
        Ok(job)
    }

    /// The rubric this job asks for.
    #[must_use]
    pub fn rubric(&self) -> RubricConfig {
        if self.parts.is_empty() {
            let n = self.part_count.unwrap_or(1);
            return RubricConfig::default().resize(n, &BTreeMap::new());
        }
        RubricConfig::from_parts(&self.parts)
    }

    /// Combine the job with the course list and roster.
    ///
    /// # Errors
    /// [`FacturaError::Request`] for an unknown course or an invalid student
    /// selection.
    pub fn into_request(self, courses: &[Course], roster: &[String]) -> Result<GenerationRequest> {
        let course = find_course(courses, &self.course)
            .cloned()
            .ok_or_else(|| FacturaError::Request(format!("unknown course '{}'", self.course)))?;
        let rubric = self.rubric();
        let groups = self.students.into_groups(roster)?;
        Ok(GenerationRequest {
            course,
            task_name: self.task_name,
            part_label: self.part_label,
            rubric,
            groups,
        })
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

    fn courses() -> Vec<Course> {
        vec![Course {
            code: "CE1101".into(),
            name: "Programación".into(),
        }]
    }

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job: Job = serde_json::from_str(
            r#"{"course": "CE1101", "roster": "g.csv", "students": {"mode": "all"}, "part_count": 4}"#,
        )
        .unwrap();
        assert_eq!(job.task_name, "Tarea 1");
        assert_eq!(job.part_label, "Parte");
        let rubric = job.rubric();
        assert_eq!(rubric.part_count(), 4);
        assert_eq!(rubric.parts[3].weight, 25.0);
    }

    #[test]
    fn test_into_request() {
        let job: Job = serde_json::from_str(
            r#"{"course": "CE1101", "roster": "g.csv",
                "students": {"mode": "individual", "students": ["Mora Luis"]},
                "parts": [{"weight": 60}, {"weight": 40, "name": "Pruebas"}]}"#,
        )
        .unwrap();
        let request = job
            .into_request(&courses(), &["Mora Luis".to_string()])
            .unwrap();
        assert_eq!(request.course.code, "CE1101");
        assert_eq!(request.groups.len(), 1);
        assert_eq!(request.rubric.parts[1].name.as_deref(), Some("Pruebas"));
    }

    #[test]
    fn test_explicit_parts_follow_rubric_bounds() {
        let parts: Vec<String> = (0..22).map(|_| r#"{"weight": 5}"#.to_string()).collect();
        let json = format!(
            r#"{{"course": "CE1101", "roster": "g.csv", "students": {{"mode": "all"}},
                "parts": [{{"weight": 250}}, {{"weight": -10}}, {}]}}"#,
            parts.join(", ")
        );
        let job: Job = serde_json::from_str(&json).unwrap();
        let rubric = job.rubric();
        assert_eq!(rubric.part_count(), 20);
        assert_eq!(rubric.parts[0].weight, 100.0);
        assert_eq!(rubric.parts[1].weight, 0.0);
        assert_eq!(rubric.parts[19].weight, 5.0);
    }

    #[test]
    fn test_unknown_course() {
        let job: Job = serde_json::from_str(
            r#"{"course": "XX", "roster": "g.csv", "students": {"mode": "all"}}"#,
        )
        .unwrap();
        assert!(job.into_request(&courses(), &["Mora Luis".to_string()]).is_err());
    }

    #[test]
    fn test_load_resolves_roster_next_to_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"course": "CE1101", "roster": "grupo1.csv", "students": {"mode": "all"}}"#,
        )
        .unwrap();
        let job = Job::load(&path).unwrap();
        assert_eq!(job.roster, dir.path().join("grupo1.csv"));
    }
}
