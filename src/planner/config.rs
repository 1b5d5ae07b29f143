//! Planner configuration

use serde::{Deserialize, Serialize};

/// Default cap on OR branches produced by rewriting IN lists
pub const DEFAULT_MAX_IN_AS_OR_BRANCHES: usize = 100;

/// Planner configuration.
///
/// # Example
///
/// ```
/// use recordplan::planner::PlannerConfig;
///
/// let config = PlannerConfig::default()
///     .with_in_as_or(true)
///     .with_max_in_as_or_branches(16);
/// assert!(config.attempt_failed_in_join_as_or);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Rewrite IN lists into an ordered union of equality branches when an
    /// IN-join cannot produce the requested sort
    pub attempt_failed_in_join_as_or: bool,

    /// Largest product of IN list lengths one OR rewrite may expand into
    pub max_in_as_or_branches: usize,

    /// Distribute an OR conjunct over the other conjuncts when the query
    /// would otherwise need an unbounded scan
    pub attempt_or_distribution: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            attempt_failed_in_join_as_or: false,
            max_in_as_or_branches: DEFAULT_MAX_IN_AS_OR_BRANCHES,
            attempt_or_distribution: true,
        }
    }
}

impl PlannerConfig {
    /// Enable or disable the IN-as-OR rewrite
    pub fn with_in_as_or(mut self, enabled: bool) -> Self {
        self.attempt_failed_in_join_as_or = enabled;
        self
    }

    /// Set the branch cap for the IN-as-OR rewrite
    pub fn with_max_in_as_or_branches(mut self, max: usize) -> Self {
        self.max_in_as_or_branches = max;
        self
    }

    /// Enable or disable OR distribution
    pub fn with_or_distribution(mut self, enabled: bool) -> Self {
        self.attempt_or_distribution = enabled;
        self
    }

    /// True if an OR rewrite with the given IN list lengths stays within the
    /// branch cap. Overflow counts as exceeding it.
    pub fn allows_in_as_or(&self, list_lengths: &[usize]) -> bool {
        list_lengths
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))
            .map_or(false, |product| product <= self.max_in_as_or_branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlannerConfig::default();
        assert!(!config.attempt_failed_in_join_as_or);
        assert_eq!(config.max_in_as_or_branches, 100);
        assert!(config.attempt_or_distribution);
    }

    #[test]
    fn test_branch_guard() {
        let config = PlannerConfig::default().with_max_in_as_or_branches(12);
        assert!(config.allows_in_as_or(&[3, 4]));
        assert!(!config.allows_in_as_or(&[3, 5]));
        assert!(!config.allows_in_as_or(&[usize::MAX, 2]));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"attempt_failed_in_join_as_or": true}"#).unwrap();
        assert!(config.attempt_failed_in_join_as_or);
        assert_eq!(config.max_in_as_or_branches, DEFAULT_MAX_IN_AS_OR_BRANCHES);
    }
}
