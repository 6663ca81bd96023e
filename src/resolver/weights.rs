//! Rubric configuration: part count, weights and optional names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::RubricPart;

/// Upper bound on rubric parts.
pub const MAX_PARTS: u32 = 20;

/// Weights that differ from 100 by more than this trigger a warning.
pub const WEIGHT_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    /// Percentage, 0 to 100.
    pub weight: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// The rubric as configured before generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricConfig {
    pub parts: Vec<PartConfig>,
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            parts: vec![PartConfig {
                weight: 100.0,
                name: None,
            }],
        }
    }
}

impl RubricConfig {
    /// Configuration from explicit parts, held to the same bounds as
    /// [`RubricConfig::resize`]: at most [`MAX_PARTS`] parts, each weight in
    /// `0..=100`. An empty list gives the default single part.
    #[must_use]
    pub fn from_parts(parts: &[PartConfig]) -> Self {
        if parts.is_empty() {
            return Self::default();
        }
        let limit = usize::try_from(MAX_PARTS).unwrap_or(usize::MAX);
        if parts.len() > limit {
            tracing::warn!(count = parts.len(), max = MAX_PARTS, "extra rubric parts dropped");
        }
        let parts = parts
            .iter()
            .take(limit)
            .map(|p| PartConfig {
                weight: p.weight.clamp(0.0, 100.0),
                name: p.name.clone(),
            })
            .collect();
        Self { parts }
    }

    #[must_use]
    pub fn part_count(&self) -> u32 {
        u32::try_from(self.parts.len()).unwrap_or(u32::MAX)
    }

    /// Configuration for `n` parts, derived from `self`.
    ///
    /// `n` is clamped to `1..=MAX_PARTS`. When the count changes every
    /// weight resets to `100 / n`; previous manual weights are not kept.
    /// `overrides` (part index to weight) apply afterwards either way.
    /// Names stay with their index.
    #[must_use]
    pub fn resize(&self, n: u32, overrides: &BTreeMap<u32, f64>) -> Self {
        let n = n.clamp(1, MAX_PARTS);
        let count_changed = n != self.part_count();
        let even = 100.0 / f64::from(n);

        let mut parts: Vec<PartConfig> = (0..n)
            .map(|i| {
                let previous = usize::try_from(i).ok().and_then(|i| self.parts.get(i));
                PartConfig {
                    weight: match previous {
                        Some(p) if !count_changed => p.weight,
                        _ => even,
                    },
                    name: previous.and_then(|p| p.name.clone()),
                }
            })
            .collect();

        for (&index, &weight) in overrides {
            let slot = usize::try_from(index).ok().and_then(|i| parts.get_mut(i));
            match slot {
                Some(part) => part.weight = weight.clamp(0.0, 100.0),
                None => tracing::warn!(index, n, "weight override beyond the part count ignored"),
            }
        }

        Self { parts }
    }

    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.parts.iter().map(|p| p.weight).sum()
    }

    /// The total when it is not within [`WEIGHT_TOLERANCE`] of 100.
    #[must_use]
    pub fn weight_warning(&self) -> Option<f64> {
        let total = self.total_weight();
        ((total - 100.0).abs() > WEIGHT_TOLERANCE).then_some(total)
    }

    /// Rubric parts labelled with `part_label`.
    #[must_use]
    pub fn to_parts(&self, part_label: &str) -> Vec<RubricPart> {
        (0..)
            .zip(&self.parts)
            .map(|(i, p)| RubricPart::new(part_label, i, p.weight, p.name.as_deref()))
            .collect()
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

    fn weights(config: &RubricConfig) -> Vec<f64> {
        config.parts.iter().map(|p| p.weight).collect()
    }

    #[test]
    fn test_three_to_five_resets_to_twenty() {
        let three = RubricConfig::default().resize(3, &BTreeMap::from([(0, 50.0)]));
        assert_eq!(weights(&three)[0], 50.0);
        let five = three.resize(5, &BTreeMap::new());
        assert_eq!(weights(&five), vec![20.0; 5]);
    }

    #[test]
    fn test_same_count_keeps_manual_weights() {
        let config = RubricConfig::default().resize(2, &BTreeMap::from([(1, 70.0)]));
        assert_eq!(weights(&config), vec![50.0, 70.0]);
        let again = config.resize(2, &BTreeMap::from([(0, 30.0)]));
        assert_eq!(weights(&again), vec![30.0, 70.0]);
    }

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(RubricConfig::default().resize(0, &BTreeMap::new()).part_count(), 1);
        assert_eq!(RubricConfig::default().resize(99, &BTreeMap::new()).part_count(), 20);
    }

    #[test]
    fn test_explicit_parts_are_clamped() {
        let many: Vec<PartConfig> = (0..25)
            .map(|i| PartConfig {
                weight: if i == 0 { 150.0 } else { -5.0 },
                name: None,
            })
            .collect();
        let config = RubricConfig::from_parts(&many);
        assert_eq!(config.part_count(), MAX_PARTS);
        assert_eq!(config.parts[0].weight, 100.0);
        assert_eq!(config.parts[1].weight, 0.0);
        assert_eq!(RubricConfig::from_parts(&[]), RubricConfig::default());
    }

    #[test]
    fn test_names_follow_index() {
        let mut config = RubricConfig::default().resize(3, &BTreeMap::new());
        config.parts[1].name = Some("Grafos".into());
        let grown = config.resize(4, &BTreeMap::new());
        assert_eq!(grown.parts[1].name.as_deref(), Some("Grafos"));
        let shrunk = grown.resize(1, &BTreeMap::new());
        assert!(shrunk.parts[0].name.is_none());
    }

    #[test]
    fn test_weight_warning() {
        let even = RubricConfig::default().resize(3, &BTreeMap::new());
        assert!(even.weight_warning().is_none());
        let off = even.resize(3, &BTreeMap::from([(0, 50.0)]));
        let total = off.weight_warning().unwrap();
        assert!((total - 116.666).abs() < 0.01);
    }

    #[test]
    fn test_to_parts() {
        let mut config = RubricConfig::default().resize(2, &BTreeMap::new());
        config.parts[0].name = Some("Diseño".into());
        let parts = config.to_parts("Reto");
        assert_eq!(parts[0].label, "Reto 1: Diseño");
        assert_eq!(parts[1].label, "Reto 2");
        assert_eq!(parts[1].weight, 50.0);
    }
}
