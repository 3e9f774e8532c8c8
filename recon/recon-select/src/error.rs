//! Error types for face selection and mesh assembly.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why the solver returned no assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No assignment satisfies the constraints.
    Infeasible,
    /// The time budget ran out before optimality was proven.
    Timeout(Duration),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infeasible => write!(f, "program is infeasible"),
            Self::Timeout(budget) => write!(f, "time budget of {budget:?} exhausted"),
        }
    }
}

/// Errors that can occur during face selection and mesh assembly.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The solver produced no assignment.
    #[error("optimization failed: {reason}")]
    OptimizationFailed {
        /// Solver outcome.
        reason: FailureReason,
    },

    /// The optimum selects no face at all.
    #[error("optimal selection is empty")]
    EmptyResult,

    /// The selected faces do not form a closed, orientable surface.
    #[error("mesh assembly failed: {details}")]
    MeshAssemblyFailed {
        /// Which check failed.
        details: String,
    },

    /// The binary program is malformed.
    #[error("invalid program: {reason}")]
    InvalidProgram {
        /// Description of the defect.
        reason: String,
    },

    /// Objective weights are out of range.
    #[error("invalid objective weights: {reason}")]
    InvalidWeights {
        /// Description of the violated condition.
        reason: String,
    },
}

/// Result type for selection operations.
pub type SelectResult<T> = std::result::Result<T, SelectionError>;
