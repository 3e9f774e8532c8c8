//! Plane arrangement: the candidate faces of the reconstruction.
//!
//! Every supporting plane is clipped to the (inflated) bounding box of the
//! input and cut by every other plane. The resulting convex cells, welded into
//! one shared vertex set, are the candidate faces; the segments where cells
//! meet are the edges.
//!
//! # Tolerances
//!
//! One snap tolerance, relative to the bounding-box diagonal, is used for
//! everything: a vertex within it of a cutting plane is on the plane, vertices
//! closer than it are welded, and a vertex within it of an edge's interior is
//! inserted into that edge. The lowest index wins every tie.

mod cells;
mod weld;

use hashbrown::HashMap;
use nalgebra::Point3;
use rayon::prelude::*;
use recon_types::{Aabb, Plane};
use tracing::{debug, info, warn};

use crate::error::{HypothesisError, HypothesisResult};
use crate::params::ArrangementParams;
use crate::refine::SupportingPlane;

use self::cells::{cells_on_plane, polygon_area};
use self::weld::{split_t_junctions, weld_cells};

/// A convex cell of one supporting plane.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateFace {
    /// Index in [`Arrangement::faces`].
    pub id: usize,
    /// Id of the supporting plane the face lies in.
    pub plane: usize,
    /// Vertex loop, counter-clockwise around the plane normal.
    pub vertices: Vec<usize>,
    /// Boundary edges in loop order: `edges[i]` joins `vertices[i]` and
    /// `vertices[i + 1]`.
    pub edges: Vec<usize>,
    /// Polygon area.
    pub area: f64,
    /// Mean of the loop vertices.
    pub centroid: Point3<f64>,
    /// Whether the face can take part in a closed surface.
    pub enclosed: bool,
}

/// A segment shared by one or more candidate faces.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Index in [`Arrangement::edges`].
    pub id: usize,
    /// Endpoint vertex ids, lower id first.
    pub vertices: [usize; 2],
    /// Every incident face id, ascending.
    pub faces: Vec<usize>,
}

impl Edge {
    /// Whether `vertex` is an endpoint.
    #[must_use]
    pub fn touches(&self, vertex: usize) -> bool {
        self.vertices.contains(&vertex)
    }
}

/// The subdivision of the bounding volume by the supporting planes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arrangement {
    vertices: Vec<Point3<f64>>,
    faces: Vec<CandidateFace>,
    edges: Vec<Edge>,
    bounds: Aabb,
    tolerance: f64,
    planes: usize,
}

impl Arrangement {
    /// Welded vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// All candidate faces, enclosed or not.
    #[must_use]
    pub fn faces(&self) -> &[CandidateFace] {
        &self.faces
    }

    /// All edges.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Face by id.
    #[must_use]
    pub fn face(&self, id: usize) -> Option<&CandidateFace> {
        self.faces.get(id)
    }

    /// Edge by id.
    #[must_use]
    pub fn edge(&self, id: usize) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// The inflated box the planes were clipped to.
    #[must_use]
    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Absolute snap tolerance used while building.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of planes that took part after duplicate filtering.
    #[must_use]
    pub const fn plane_count(&self) -> usize {
        self.planes
    }

    /// Faces that can be part of a closed surface.
    pub fn enclosed_faces(&self) -> impl Iterator<Item = &CandidateFace> {
        self.faces.iter().filter(|f| f.enclosed)
    }

    /// Number of enclosed faces.
    #[must_use]
    pub fn enclosed_count(&self) -> usize {
        self.enclosed_faces().count()
    }

    /// Faces lying in the given supporting plane, ascending id.
    pub fn faces_on_plane(&self, plane: usize) -> impl Iterator<Item = &CandidateFace> {
        self.faces.iter().filter(move |f| f.plane == plane)
    }

    /// Sum of all face areas.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.faces.iter().map(|f| f.area).sum()
    }

    /// Incident faces of an edge that are enclosed.
    pub fn enclosed_faces_of<'a>(&'a self, edge: &'a Edge) -> impl Iterator<Item = usize> + 'a {
        edge.faces
            .iter()
            .copied()
            .filter(move |&f| self.faces[f].enclosed)
    }

    /// Whether every edge of every enclosed face has another enclosed face.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.enclosed_faces().all(|face| {
            face.edges
                .iter()
                .all(|&e| self.enclosed_faces_of(&self.edges[e]).count() >= 2)
        })
    }
}

/// Builds the plane arrangement.
///
/// # Example
///
/// ```
/// use recon_hypothesis::{ArrangementBuilder, ArrangementParams, SupportingPlane};
/// use recon_types::{Aabb, Plane, Point3, Vector3};
///
/// // The six faces of the unit cube.
/// let planes: Vec<SupportingPlane> = [
///     (Vector3::x(), 0.0), (Vector3::x(), -1.0),
///     (Vector3::y(), 0.0), (Vector3::y(), -1.0),
///     (Vector3::z(), 0.0), (Vector3::z(), -1.0),
/// ]
/// .into_iter()
/// .enumerate()
/// .map(|(id, (n, d))| SupportingPlane {
///     id,
///     plane: Plane::new(n, d).unwrap(),
///     members: Vec::new(),
///     labels: vec![id as u32],
///     rms_residual: 0.0,
/// })
/// .collect();
///
/// let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let arrangement = ArrangementBuilder::default().build(&planes, &bounds).unwrap();
/// assert_eq!(arrangement.faces().len(), 54);
/// assert_eq!(arrangement.enclosed_count(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArrangementBuilder {
    params: ArrangementParams,
}

impl ArrangementBuilder {
    /// Create a builder.
    #[must_use]
    pub const fn new(params: ArrangementParams) -> Self {
        Self { params }
    }

    /// Arrangement parameters.
    #[must_use]
    pub const fn params(&self) -> &ArrangementParams {
        &self.params
    }

    /// Intersect `planes` within `bounds` (the bounding box of the input
    /// points, inflated here by the configured margin).
    ///
    /// # Errors
    ///
    /// - [`HypothesisError::InvalidParameter`] for bad parameters or an empty
    ///   or flat bounding box.
    /// - [`HypothesisError::ArrangementEmpty`] if no plane is left or no face
    ///   can bound a volume.
    pub fn build(&self, planes: &[SupportingPlane], bounds: &Aabb) -> HypothesisResult<Arrangement> {
        self.params.validate()?;

        let diagonal = bounds.diagonal();
        if bounds.is_empty() || !diagonal.is_finite() || diagonal <= 0.0 {
            return Err(HypothesisError::InvalidParameter {
                reason: "bounding box is empty or degenerate".to_string(),
            });
        }
        let tolerance = self.params.snap_tolerance_relative * diagonal;
        let volume = bounds.expanded(self.params.bbox_margin * diagonal);

        let active = self.distinct_planes(planes, tolerance);
        info!(
            planes = planes.len(),
            distinct = active.len(),
            tolerance,
            "Building plane arrangement"
        );
        if active.is_empty() {
            return Err(HypothesisError::ArrangementEmpty { planes: 0 });
        }

        let build_one = |(id, plane): &(usize, Plane)| {
            let cutters: Vec<&Plane> = active
                .iter()
                .filter(|(other, p)| {
                    if other == id {
                        return false;
                    }
                    let angle = plane.angle_to(p);
                    if angle < self.params.parallel_angle {
                        debug!(
                            plane = *id,
                            other = *other,
                            angle,
                            "Plane not cut by near-parallel plane"
                        );
                        return false;
                    }
                    true
                })
                .map(|(_, p)| p)
                .collect();
            cells_on_plane(plane, &cutters, &volume, tolerance)
        };
        let per_plane: Vec<Vec<Vec<Point3<f64>>>> = if self.params.parallel {
            active.par_iter().map(build_one).collect()
        } else {
            active.iter().map(build_one).collect()
        };

        let min_area = tolerance * tolerance;
        let mut cells = Vec::new();
        let mut dropped = 0usize;
        for ((id, _), plane_cells) in active.iter().zip(per_plane) {
            for cell in plane_cells {
                if polygon_area(&cell) < min_area {
                    dropped += 1;
                } else {
                    cells.push((*id, cell));
                }
            }
        }
        if dropped > 0 {
            warn!(dropped, min_area, "Dropped sliver cells");
        }

        let mut welded = weld_cells(&cells, tolerance);
        split_t_junctions(&mut welded, &active, tolerance);

        let mut arrangement = assemble(welded, volume, tolerance, active.len());
        let peeled = peel_unenclosed(&mut arrangement);

        info!(
            vertices = arrangement.vertices.len(),
            faces = arrangement.faces.len(),
            edges = arrangement.edges.len(),
            enclosed = arrangement.enclosed_count(),
            peeled,
            "Plane arrangement complete"
        );

        if arrangement.enclosed_count() == 0 {
            return Err(HypothesisError::ArrangementEmpty {
                planes: arrangement.planes,
            });
        }

        Ok(arrangement)
    }

    /// Drop degenerate planes and later duplicates of earlier planes.
    fn distinct_planes(&self, planes: &[SupportingPlane], tolerance: f64) -> Vec<(usize, Plane)> {
        let mut kept: Vec<(usize, Plane)> = Vec::with_capacity(planes.len());
        for sp in planes {
            let plane = sp.plane;
            if !plane.normal().iter().all(|c| c.is_finite()) || !plane.offset().is_finite() {
                debug!(plane = sp.id, "Skipping non-finite plane");
                continue;
            }
            let duplicate_of = kept.iter().find(|(_, other)| {
                if plane.angle_to(other) >= self.params.parallel_angle {
                    return false;
                }
                let same_way = plane.normal().dot(other.normal()) > 0.0;
                let other_offset = if same_way {
                    other.offset()
                } else {
                    -other.offset()
                };
                (plane.offset() - other_offset).abs() <= tolerance
            });
            if let Some((first, _)) = duplicate_of {
                debug!(plane = sp.id, duplicate_of = first, "Skipping duplicate plane");
                continue;
            }
            kept.push((sp.id, plane));
        }
        kept
    }
}

/// Turn welded cells into faces and edges.
fn assemble(welded: weld::WeldedCells, bounds: Aabb, tolerance: f64, planes: usize) -> Arrangement {
    let weld::WeldedCells { vertices, loops } = welded;

    let mut faces = Vec::with_capacity(loops.len());
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();

    for (id, (plane, loop_)) in loops.into_iter().enumerate() {
        let n = loop_.len();
        let mut face_edges = Vec::with_capacity(n);
        for i in 0..n {
            let (a, b) = (loop_[i], loop_[(i + 1) % n]);
            let key = if a < b { (a, b) } else { (b, a) };
            let edge_id = *edge_index.entry(key).or_insert_with(|| {
                edges.push(Edge {
                    id: edges.len(),
                    vertices: [key.0, key.1],
                    faces: Vec::new(),
                });
                edges.len() - 1
            });
            let incident = &mut edges[edge_id].faces;
            if incident.last() != Some(&id) {
                incident.push(id);
            }
            face_edges.push(edge_id);
        }

        let positions: Vec<Point3<f64>> = loop_.iter().map(|&v| vertices[v]).collect();
        let centroid = Point3::from(
            positions.iter().map(|p| p.coords).sum::<nalgebra::Vector3<f64>>() / n as f64,
        );
        faces.push(CandidateFace {
            id,
            plane,
            area: polygon_area(&positions),
            centroid,
            vertices: loop_,
            edges: face_edges,
            enclosed: true,
        });
    }

    Arrangement {
        vertices,
        faces,
        edges,
        bounds,
        tolerance,
        planes,
    }
}

/// Mark faces that can never be part of a closed surface.
///
/// A face with an edge that no other enclosed face shares would leave a
/// boundary if selected. Removing it can expose its neighbours, so this runs
/// to a fixed point. Returns the number of faces marked.
fn peel_unenclosed(arrangement: &mut Arrangement) -> usize {
    let mut peeled = 0;
    loop {
        let mut changed = false;
        for f in 0..arrangement.faces.len() {
            if !arrangement.faces[f].enclosed {
                continue;
            }
            let exposed = arrangement.faces[f].edges.iter().any(|&e| {
                arrangement
                    .enclosed_faces_of(&arrangement.edges[e])
                    .count()
                    < 2
            });
            if exposed {
                arrangement.faces[f].enclosed = false;
                peeled += 1;
                changed = true;
            }
        }
        if !changed {
            return peeled;
        }
    }
}
