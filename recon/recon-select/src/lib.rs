//! Face selection and polygon mesh assembly.
//!
//! This crate turns the candidate faces of a plane arrangement into a
//! watertight polygon model:
//!
//! - [`SelectionFormulator`] - builds the binary program that trades data
//!   fitting, model coverage and model complexity under manifold constraints
//! - [`BinarySolver`] - the solver contract, with the bundled
//!   [`BranchAndBound`] and [`Exhaustive`] backends
//! - [`MeshAssembler`] - orients, merges and cleans the selected faces
//! - [`validate_polygon_mesh`] - closed 2-manifold check of the result
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use recon_hypothesis::{AdjacencyGraph, ArrangementBuilder, ConfidenceScore, SupportingPlane};
//! use recon_select::{MeshAssembler, ObjectiveWeights, SelectionFormulator, SolverBackend};
//! use recon_types::{Aabb, Plane, Point3, Vector3};
//!
//! let planes: Vec<SupportingPlane> = [
//!     (Vector3::x(), 0.0), (Vector3::x(), -2.0),
//!     (Vector3::y(), 0.0), (Vector3::y(), -2.0),
//!     (Vector3::z(), 0.0), (Vector3::z(), -2.0),
//! ]
//! .into_iter()
//! .enumerate()
//! .map(|(id, (n, d))| SupportingPlane {
//!     id,
//!     plane: Plane::new(n, d).unwrap(),
//!     members: Vec::new(),
//!     labels: vec![id as u32],
//!     rms_residual: 0.0,
//! })
//! .collect();
//! let bounds = Aabb::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0));
//! let arrangement = ArrangementBuilder::default().build(&planes, &bounds).unwrap();
//! let constraints = AdjacencyGraph::build(&arrangement).constraints();
//! let scores: Vec<ConfidenceScore> = arrangement
//!     .faces()
//!     .iter()
//!     .map(|f| if f.enclosed {
//!         ConfidenceScore { fitting: 0.95, coverage: 0.9, support: 200 }
//!     } else {
//!         ConfidenceScore::UNSUPPORTED
//!     })
//!     .collect();
//!
//! let formulator = SelectionFormulator::new(ObjectiveWeights::default());
//! let problem = formulator.formulate(&arrangement, &scores, &constraints).unwrap();
//! let solver = SolverBackend::default().solver();
//! let selection = formulator
//!     .solve(&problem, solver.as_ref(), Duration::from_secs(10))
//!     .unwrap();
//! let mesh = MeshAssembler::default().assemble(&arrangement, &selection).unwrap();
//!
//! assert_eq!(mesh.face_count(), 6);
//! assert!((mesh.signed_volume() - 8.0).abs() < 1e-9);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod assemble;
mod error;
mod formulate;
mod params;
mod program;
mod solver;
mod validate;
mod weights;

pub use assemble::MeshAssembler;
pub use error::{FailureReason, SelectResult, SelectionError};
pub use formulate::{SelectionFormulator, SelectionProblem, SelectionResult};
pub use params::{AssemblyParams, SelectionParams};
pub use program::{BinaryProgram, Domain, LinearConstraint, Sense, FEASIBILITY_TOLERANCE};
pub use solver::{
    Assignment, BinarySolver, BranchAndBound, Exhaustive, SolveOutcome, SolveRequest,
    SolverBackend,
};
pub use validate::{validate_polygon_mesh, MeshCheck};
pub use weights::{ObjectiveWeights, WEIGHT_SUM_TOLERANCE};
