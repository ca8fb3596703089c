//! Error taxonomy for offer and bidding solves.
//!
//! Configuration problems are reported before any solver call and stay
//! distinguishable from solver failures and from a bisection that ran out of
//! iterations.

use std::fmt;

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"reserve.eps"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    /// Creates a configuration error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} - {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Terminal status reported by the external solver when no usable solution exists.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// The constraint set admits no point.
    Infeasible,
    /// The objective can be improved without bound.
    Unbounded,
    /// Numerical failure or any other solver-side error.
    Failed(String),
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Failed(msg) => write!(f, "failed ({msg})"),
        }
    }
}

/// Errors returned by every solve entry point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BidError {
    /// Rejected input parameters (bounds, risk level, scheme name, ...).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Ensemble shapes that cannot be combined (empty, ragged, horizon mismatch).
    #[error("invalid ensemble: {0}")]
    InvalidEnsemble(String),

    /// The solver returned without a usable solution.
    #[error("solver error in {problem}: {status}")]
    Solver {
        /// Label of the problem that was being solved.
        problem: &'static str,
        /// Status reported by the solver.
        status: SolveStatus,
    },

    /// The violation-budget search hit its iteration bound with the bracket still open.
    #[error(
        "violation budget search did not converge after {iterations} iterations \
         (bracket [{bracket_low}, {bracket_high}])"
    )]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Lower end of the final bracket.
        bracket_low: f64,
        /// Upper end of the final bracket.
        bracket_high: f64,
    },
}

impl BidError {
    /// Shorthand for a [`BidError::Config`] on `field`.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        BidError::Config(ConfigError::new(field, message))
    }

    /// Returns `true` for errors raised before the solver was involved.
    pub fn is_config(&self) -> bool {
        matches!(self, BidError::Config(_) | BidError::InvalidEnsemble(_))
    }
}

/// Convenience alias used throughout the crate.
pub type BidResult<T> = Result<T, BidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_field() {
        let err = BidError::config("reserve.eps", "must lie in (0, 1)");
        assert_eq!(
            err.to_string(),
            "config error: reserve.eps - must lie in (0, 1)"
        );
        assert!(err.is_config());
    }

    #[test]
    fn solver_error_is_not_config() {
        let err = BidError::Solver {
            problem: "cvar",
            status: SolveStatus::Infeasible,
        };
        assert!(!err.is_config());
        assert_eq!(err.to_string(), "solver error in cvar: infeasible");
    }
}
