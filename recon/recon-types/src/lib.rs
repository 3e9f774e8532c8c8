//! Core types for planar surface reconstruction.
//!
//! This crate provides the data model shared by the reconstruction stages:
//!
//! - [`Point`], [`VertexGroup`] and [`PointSet`] - a segmented point cloud
//! - [`Plane`] - an oriented plane equation `n·p + d = 0`
//! - [`Aabb`] - axis-aligned bounding box
//! - [`PolygonMesh`] - the reconstructed piecewise-planar surface
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate: pure data and geometry, no I/O, no solver.
//!
//! # Units
//!
//! This library is **unit-agnostic**. All coordinates are `f64`. Tolerances in
//! downstream crates are expressed relative to the bounding box diagonal.
//!
//! # Example
//!
//! ```
//! use recon_types::{Point, PointSet, Point3, Vector3};
//!
//! let points = vec![
//!     Point::new(Point3::new(0.0, 0.0, 0.0), Vector3::z(), 0),
//!     Point::new(Point3::new(1.0, 0.0, 0.0), Vector3::z(), 0),
//!     Point::new(Point3::new(0.0, 1.0, 0.0), Vector3::z(), 0),
//! ];
//!
//! let set = PointSet::new(points);
//! assert_eq!(set.len(), 3);
//! assert_eq!(set.groups().len(), 1);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod bounds;
mod plane;
mod point;
mod polygon_mesh;

pub use bounds::Aabb;
pub use plane::Plane;
pub use point::{Point, PointSet, VertexGroup};
pub use polygon_mesh::{PolygonFace, PolygonMesh};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};
