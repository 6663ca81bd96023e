//! Team selection with disjoint membership.

use serde::{Deserialize, Serialize};

use crate::error::{FacturaError, Result};
use crate::model::Group;

/// Upper bound on teams per run.
pub const MAX_TEAMS: usize = 20;

/// Members of each team, in selection order.
///
/// A student belongs to at most one team at a time; [`TeamBoard::assign`]
/// refuses anything that would break that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamBoard {
    teams: Vec<Vec<String>>,
}

impl TeamBoard {
    /// A board with `count` empty teams (clamped to `1..=MAX_TEAMS`).
    #[must_use]
    pub fn new(count: usize) -> Self {
        let mut board = Self::default();
        board.set_team_count(count);
        board
    }

    #[must_use]
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    #[must_use]
    pub fn team(&self, team: usize) -> Option<&[String]> {
        self.teams.get(team).map(Vec::as_slice)
    }

    /// Grow with empty teams or drop trailing ones.
    pub fn set_team_count(&mut self, count: usize) {
        self.teams.resize_with(count.clamp(1, MAX_TEAMS), Vec::new);
    }

    /// Roster names that `team` may choose from: everyone not held by a
    /// different team.
    #[must_use]
    pub fn available_for(&self, team: usize, roster: &[String]) -> Vec<String> {
        roster
            .iter()
            .filter(|name| self.holder_of(name).map_or(true, |holder| holder == team))
            .cloned()
            .collect()
    }

    /// Replace the members of `team`.
    ///
    /// # Errors
    /// [`FacturaError::Request`] when `team` does not exist or a name is
    /// already in another team. The board is unchanged on error.
    pub fn assign(&mut self, team: usize, names: Vec<String>) -> Result<()> {
        if team >= self.teams.len() {
            return Err(FacturaError::Request(format!(
                "team {} does not exist ({} teams)",
                team + 1,
                self.teams.len()
            )));
        }
        for name in &names {
            if let Some(holder) = self.holder_of(name).filter(|&h| h != team) {
                return Err(FacturaError::Request(format!(
                    "{name} is already in team {}",
                    holder + 1
                )));
            }
        }

        let mut members: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !members.contains(&name) {
                members.push(name);
            }
        }
        if let Some(slot) = self.teams.get_mut(team) {
            *slot = members;
        }
        Ok(())
    }

    /// Non-empty teams as groups, in team order.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.teams
            .iter()
            .filter_map(|members| Group::new(members.clone()).ok())
            .collect()
    }

    fn holder_of(&self, name: &str) -> Option<usize> {
        self.teams
            .iter()
            .position(|members| members.iter().any(|m| m == name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn roster() -> Vec<String> {
        ["Pérez Ana", "Gómez Bo", "Mora Luis", "Solís Eva"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_student_cannot_join_two_teams() {
        let mut board = TeamBoard::new(2);
        board.assign(0, names(&["Pérez Ana", "Gómez Bo"])).unwrap();
        let err = board.assign(1, names(&["Gómez Bo"])).unwrap_err();
        assert!(err.to_string().contains("team 1"));
        assert_eq!(board.team(1), Some(&[][..]));
    }

    #[test]
    fn test_available_excludes_other_teams_only() {
        let mut board = TeamBoard::new(2);
        board.assign(0, names(&["Pérez Ana"])).unwrap();
        assert_eq!(
            board.available_for(1, &roster()),
            names(&["Gómez Bo", "Mora Luis", "Solís Eva"])
        );
        assert_eq!(board.available_for(0, &roster()), roster());
    }

    #[test]
    fn test_reassigning_own_team_is_allowed() {
        let mut board = TeamBoard::new(1);
        board.assign(0, names(&["Pérez Ana"])).unwrap();
        board.assign(0, names(&["Pérez Ana", "Mora Luis", "Mora Luis"])).unwrap();
        assert_eq!(board.team(0).unwrap().len(), 2);
    }

    #[test]
    fn test_shrinking_frees_students() {
        let mut board = TeamBoard::new(3);
        board.assign(2, names(&["Solís Eva"])).unwrap();
        board.set_team_count(2);
        board.assign(0, names(&["Solís Eva"])).unwrap();
        assert_eq!(board.team_count(), 2);
    }

    #[test]
    fn test_groups_skip_empty_teams() {
        let mut board = TeamBoard::new(3);
        board.assign(0, names(&["Pérez Ana", "Gómez Bo"])).unwrap();
        board.assign(2, names(&["Mora Luis"])).unwrap();
        let groups = board.groups();
        assert_eq!(groups.len(), 2);
        assert!(groups[0].is_team());
        assert_eq!(groups[1].members(), &["Mora Luis".to_string()]);
    }

    #[test]
    fn test_team_count_bounds() {
        assert_eq!(TeamBoard::new(0).team_count(), 1);
        assert_eq!(TeamBoard::new(50).team_count(), MAX_TEAMS);
        assert!(TeamBoard::new(1).assign(3, Vec::new()).is_err());
    }
}
