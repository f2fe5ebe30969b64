// src/core/analyzers/rubric.rs

use std::collections::BTreeMap;

use strum::IntoEnumIterator;

use crate::core::error::ConfigError;
use crate::core::knowledge_base::{get_rubric_check, rubric_checks};
use crate::core::models::Category;

/// Points per rubric check, after configuration overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rubric {
    points: BTreeMap<&'static str, u32>,
}

impl Default for Rubric {
    fn default() -> Self {
        Self {
            points: rubric_checks().iter().map(|c| (c.id, c.points)).collect(),
        }
    }
}

impl Rubric {
    /// Applies `overrides` on top of the built-in rubric. Unknown ids and
    /// categories whose budget would exceed 100 points are rejected.
    pub fn with_overrides(overrides: &BTreeMap<String, u32>) -> Result<Self, ConfigError> {
        let mut rubric = Rubric::default();
        for (id, points) in overrides {
            let check = get_rubric_check(id)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown rubric check '{}'", id)))?;
            rubric.points.insert(check.id, *points);
        }
        for category in Category::iter() {
            let budget = rubric.budget(category);
            if budget > 100 {
                return Err(ConfigError::Invalid(format!(
                    "rubric for {} totals {} points, the maximum is 100",
                    category, budget
                )));
            }
        }
        Ok(rubric)
    }

    /// Points for `id`; zero for ids outside the rubric.
    pub fn points(&self, id: &str) -> u32 {
        self.points.get(id).copied().unwrap_or(0)
    }

    pub fn budget(&self, category: Category) -> u32 {
        rubric_checks()
            .iter()
            .filter(|c| c.category == category)
            .map(|c| self.points(c.id))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_replaces_points() {
        let overrides = BTreeMap::from([("META_OPEN_GRAPH".to_string(), 0)]);
        let rubric = Rubric::with_overrides(&overrides).unwrap();
        assert_eq!(rubric.points("META_OPEN_GRAPH"), 0);
        assert_eq!(rubric.budget(Category::Meta), 90);
    }

    #[test]
    fn test_budget_over_100_is_rejected() {
        let overrides = BTreeMap::from([("SPEED_PAGE_SIZE".to_string(), 31)]);
        assert!(Rubric::with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_unknown_id_scores_zero() {
        assert_eq!(Rubric::default().points("NOT_A_CHECK"), 0);
    }
}
