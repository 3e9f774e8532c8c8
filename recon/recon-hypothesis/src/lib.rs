//! Face hypotheses for piecewise-planar surface reconstruction.
//!
//! Given a point cloud already partitioned into planar segments, this crate
//! generates every planar face a closed model could be built from:
//!
//! - [`PlaneRefiner`] - fits, filters and merges segments into supporting planes
//! - [`ArrangementBuilder`] - intersects the planes inside the bounding volume,
//!   producing the candidate faces and their shared edges
//! - [`ConfidenceEvaluator`] - scores each candidate face against the points
//! - [`AdjacencyGraph`] - edge and vertex incidence plus the manifold
//!   constraints a face selection must satisfy
//!
//! Choosing among the candidates is left to the `recon-select` crate.
//!
//! # Layer 1 Crate
//!
//! This is a Layer 1 crate built on `recon-types`. It does no I/O and does not
//! solve anything.
//!
//! # Example
//!
//! ```
//! use recon_hypothesis::{
//!     AdjacencyGraph, ArrangementBuilder, ConfidenceEvaluator, PlaneRefiner, RefineParams,
//! };
//! use recon_types::{Point, PointSet, Point3, Vector3};
//!
//! // Sample the six faces of a unit cube, one segment per face.
//! let mut points = Vec::new();
//! for axis in 0..3 {
//!     for (k, level) in [0.0, 1.0].into_iter().enumerate() {
//!         let mut normal = Vector3::zeros();
//!         normal[axis] = if level > 0.5 { 1.0 } else { -1.0 };
//!         for i in 0..12 {
//!             for j in 0..12 {
//!                 let mut p = Point3::origin();
//!                 p[axis] = level;
//!                 p[(axis + 1) % 3] = (f64::from(i) + 0.5) / 12.0;
//!                 p[(axis + 2) % 3] = (f64::from(j) + 0.5) / 12.0;
//!                 points.push(Point::new(p, normal, (axis * 2 + k) as u32));
//!             }
//!         }
//!     }
//! }
//! let points = PointSet::new(points);
//!
//! let planes = PlaneRefiner::new(RefineParams::default()).refine(&points).unwrap();
//! let arrangement = ArrangementBuilder::default().build(&planes, &points.bounds()).unwrap();
//! let scores = ConfidenceEvaluator::default()
//!     .evaluate(&arrangement, &planes, &points)
//!     .unwrap();
//! let constraints = AdjacencyGraph::build(&arrangement).constraints();
//!
//! assert_eq!(planes.len(), 6);
//! assert_eq!(arrangement.enclosed_count(), 6);
//! assert_eq!(scores.len(), arrangement.faces().len());
//! assert_eq!(constraints.edge_parity.len(), 12);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod adjacency;
mod arrangement;
mod confidence;
mod error;
mod params;
mod refine;

pub use adjacency::{AdjacencyGraph, EdgeParity, FanSeparation, ManifoldConstraints, VertexCycle};
pub use arrangement::{Arrangement, ArrangementBuilder, CandidateFace, Edge};
pub use confidence::{ConfidenceEvaluator, ConfidenceScore};
pub use error::{HypothesisError, HypothesisResult};
pub use params::{ArrangementParams, ConfidenceParams, RefineParams};
pub use refine::{fit_plane, PlaneFit, PlaneRefiner, SupportingPlane};
