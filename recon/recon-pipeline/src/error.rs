//! Error taxonomy of the reconstruction pipeline.

use recon_hypothesis::HypothesisError;
use recon_select::{FailureReason, SelectionError};
use thiserror::Error;

/// Result type for reconstruction.
pub type ReconResult<T> = std::result::Result<T, ReconError>;

/// Every way a reconstruction can fail.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Objective weights are negative or do not sum to 1.
    #[error("invalid objective weights: {reason}")]
    InvalidWeights {
        /// Description of the violated condition.
        reason: String,
    },

    /// No planar segment has enough support.
    #[error("insufficient planar segments: none of {groups} groups has {min_support} points")]
    InsufficientSegments {
        /// Number of input groups.
        groups: usize,
        /// Minimum support required.
        min_support: usize,
    },

    /// The supporting planes do not enclose any volume.
    #[error("plane arrangement has no enclosed face ({planes} planes)")]
    ArrangementEmpty {
        /// Number of distinct planes in the arrangement.
        planes: usize,
    },

    /// The solver found no assignment.
    #[error("optimization failed: {reason}")]
    OptimizationFailed {
        /// Solver outcome.
        reason: FailureReason,
    },

    /// The optimum selects no face.
    #[error("optimal selection is empty")]
    EmptyResult,

    /// The selected faces do not form a closed 2-manifold.
    #[error("mesh assembly failed: {details}")]
    MeshAssemblyFailed {
        /// Which check failed.
        details: String,
    },

    /// A parameter is out of range or the program is malformed.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of the defect.
        reason: String,
    },
}

impl From<HypothesisError> for ReconError {
    fn from(err: HypothesisError) -> Self {
        match err {
            HypothesisError::InsufficientSegments {
                groups,
                min_support,
            } => Self::InsufficientSegments {
                groups,
                min_support,
            },
            HypothesisError::ArrangementEmpty { planes } => Self::ArrangementEmpty { planes },
            HypothesisError::InvalidParameter { reason } => Self::InvalidParameter { reason },
        }
    }
}

impl From<SelectionError> for ReconError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::OptimizationFailed { reason } => Self::OptimizationFailed { reason },
            SelectionError::EmptyResult => Self::EmptyResult,
            SelectionError::MeshAssemblyFailed { details } => Self::MeshAssemblyFailed { details },
            SelectionError::InvalidProgram { reason } => Self::InvalidParameter { reason },
            SelectionError::InvalidWeights { reason } => Self::InvalidWeights { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = ReconError::ArrangementEmpty { planes: 1 };
        assert_eq!(
            err.to_string(),
            "plane arrangement has no enclosed face (1 planes)"
        );
        let err = ReconError::OptimizationFailed {
            reason: FailureReason::Timeout(Duration::from_secs(2)),
        };
        assert!(err.to_string().contains("2s"));
    }

    #[test]
    fn test_stage_conversions() {
        let err: ReconError = HypothesisError::InsufficientSegments {
            groups: 3,
            min_support: 40,
        }
        .into();
        assert!(matches!(
            err,
            ReconError::InsufficientSegments {
                groups: 3,
                min_support: 40
            }
        ));

        let err: ReconError = SelectionError::InvalidWeights {
            reason: "sum".to_string(),
        }
        .into();
        assert!(matches!(err, ReconError::InvalidWeights { .. }));

        let err: ReconError = SelectionError::InvalidProgram {
            reason: "x".to_string(),
        }
        .into();
        assert!(matches!(err, ReconError::InvalidParameter { .. }));
    }
}
