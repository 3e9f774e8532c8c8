//! Error types for hypothesis generation.

use thiserror::Error;

/// Errors that can occur while building the face hypotheses.
#[derive(Debug, Error)]
pub enum HypothesisError {
    /// No planar segment survived refinement.
    #[error("no supporting plane survived refinement ({groups} groups, min support {min_support})")]
    InsufficientSegments {
        /// Number of vertex groups in the input.
        groups: usize,
        /// Minimum member count a group needed.
        min_support: usize,
    },

    /// The plane arrangement has no face that could bound a volume.
    #[error("plane arrangement has no enclosed face ({planes} planes)")]
    ArrangementEmpty {
        /// Number of planes that entered the arrangement.
        planes: usize,
    },

    /// A parameter is out of range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of why the parameter is invalid.
        reason: String,
    },
}

/// Result type for hypothesis generation.
pub type HypothesisResult<T> = std::result::Result<T, HypothesisError>;
