//! Domain errors for the entrain synchronization engine.
//!
//! Validation errors are fatal for the constructor call that produced
//! them and leave no partial swarm behind. Inside the loops, agent-level
//! failures (insufficient energy, rejected actions) are the normal path
//! and never surface here.

use thiserror::Error;

/// Errors surfaced by swarm construction and the run loops.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwarmError {
    /// Requested population size is zero or above the configured cap.
    #[error("invalid swarm size {size}: must be between 1 and {max}")]
    InvalidSwarmSize {
        /// The rejected size.
        size: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The target pattern is unusable. Every offending field is listed.
    #[error("invalid goal state: {}", violations.join("; "))]
    InvalidGoalState {
        /// One entry per offending field.
        violations: Vec<String>,
    },

    /// The configuration bundle is out of range. Every violation is listed.
    #[error("invalid configuration: {}", violations.join("; "))]
    InvalidConfig {
        /// One entry per out-of-range field.
        violations: Vec<String>,
    },

    /// The goal-directed loop exhausted its iteration budget without
    /// meeting the achievement test.
    #[error("failed to converge after {iterations} iterations")]
    FailedToConverge {
        /// Ticks consumed before giving up.
        iterations: u32,
    },

    /// The caller's cancellation token ended the run.
    #[error("canceled by caller")]
    Canceled,

    /// Lookup of an agent id that is not part of this swarm.
    #[error("agent not found: {0}")]
    AgentNotFound(String),
}

impl SwarmError {
    /// Whether this error came from constructor validation (the swarm was
    /// never built) as opposed to a run outcome.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSwarmSize { .. }
                | Self::InvalidGoalState { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Whether retrying the same call can possibly succeed. Validation
    /// errors are permanent for identical inputs; convergence failure is
    /// not (noise may land differently next run).
    pub const fn is_permanent(&self) -> bool {
        self.is_validation()
    }
}

/// Convenience alias used across the crate.
pub type SwarmResult<T> = Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_all_violations() {
        let err = SwarmError::InvalidConfig {
            violations: vec!["a out of range".into(), "b out of range".into()],
        };
        let message = err.to_string();
        assert!(message.contains("a out of range"));
        assert!(message.contains("b out of range"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(SwarmError::InvalidSwarmSize { size: 0, max: 10 }.is_validation());
        assert!(!SwarmError::FailedToConverge { iterations: 100 }.is_validation());
        assert!(!SwarmError::Canceled.is_validation());
    }

    #[test]
    fn test_converge_failure_is_retryable() {
        assert!(!SwarmError::FailedToConverge { iterations: 5 }.is_permanent());
        assert!(SwarmError::InvalidGoalState { violations: vec![] }.is_permanent());
    }
}
