//! Piecewise-planar surface reconstruction.
//!
//! Turns a point cloud that is already partitioned into planar segments into
//! a closed polygon model, PolyFit style:
//!
//! 1. refine the segments into supporting planes,
//! 2. intersect the planes into candidate faces,
//! 3. score each face against the points,
//! 4. derive the manifold constraints,
//! 5. select faces with a constrained binary program,
//! 6. assemble and validate the polygon mesh.
//!
//! [`reconstruct`] runs the stages with the configuration in
//! [`ReconstructionParams`]; [`reconstruct_with_solver`] accepts any
//! [`BinarySolver`].
//!
//! # Example
//!
//! ```
//! use recon_pipeline::{ObjectiveWeights, ReconError};
//!
//! // Weights are checked before anything runs.
//! let err: ReconError = ObjectiveWeights::new(0.5, 0.5, 0.0001).unwrap_err().into();
//! assert!(matches!(err, ReconError::InvalidWeights { .. }));
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod params;
mod reconstruct;

pub use error::{ReconError, ReconResult};
pub use params::ReconstructionParams;
pub use reconstruct::{reconstruct, reconstruct_with_solver, Reconstruction, ReconstructionStats};

// Re-export the configuration and solver surface for convenience
pub use recon_hypothesis::{ArrangementParams, ConfidenceParams, RefineParams, SupportingPlane};
pub use recon_select::{
    AssemblyParams, BinarySolver, FailureReason, ObjectiveWeights, SelectionParams,
    SolveOutcome, SolveRequest, SolverBackend, WEIGHT_SUM_TOLERANCE,
};
