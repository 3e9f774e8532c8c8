//! Indexed polygon mesh, the output of reconstruction.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Aabb;

/// A planar polygon face of a [`PolygonMesh`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonFace {
    /// Vertex loop, counter-clockwise when viewed from outside.
    pub vertices: Vec<u32>,
    /// Index of the supporting plane the face lies in.
    pub plane: usize,
}

impl PolygonFace {
    /// Create a face from a vertex loop and its supporting plane index.
    #[must_use]
    pub const fn new(vertices: Vec<u32>, plane: usize) -> Self {
        Self { vertices, plane }
    }

    /// Directed boundary edges `(from, to)` in loop order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// A polygon mesh with indexed vertices.
///
/// # Memory Layout
///
/// - `vertices`: `Vec<Point3<f64>>` - vertex positions
/// - `faces`: `Vec<PolygonFace>` - polygon loops referencing vertices by index
///
/// # Example
///
/// ```
/// use recon_types::{PolygonMesh, PolygonFace, Point3};
///
/// let mut mesh = PolygonMesh::new();
/// mesh.vertices.push(Point3::new(0.0, 0.0, 0.0));
/// mesh.vertices.push(Point3::new(1.0, 0.0, 0.0));
/// mesh.vertices.push(Point3::new(1.0, 1.0, 0.0));
/// mesh.vertices.push(Point3::new(0.0, 1.0, 0.0));
/// mesh.faces.push(PolygonFace::new(vec![0, 1, 2, 3], 0));
///
/// assert_eq!(mesh.face_count(), 1);
/// assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Polygon faces.
    pub faces: Vec<PolygonFace>,
}

impl PolygonMesh {
    /// Create a new empty mesh.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Number of distinct undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        let mut edges: Vec<(u32, u32)> = self
            .faces
            .iter()
            .flat_map(PolygonFace::edges)
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges.len()
    }

    /// Area-weighted normal of a face (Newell's method). Its length is twice
    /// the polygon area.
    #[must_use]
    pub fn face_normal_raw(&self, face: &PolygonFace) -> Vector3<f64> {
        let mut normal = Vector3::zeros();
        for (a, b) in face.edges() {
            let p = &self.vertices[a as usize];
            let q = &self.vertices[b as usize];
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
        }
        normal
    }

    /// Area of a face.
    #[must_use]
    pub fn face_area(&self, face: &PolygonFace) -> f64 {
        self.face_normal_raw(face).norm() * 0.5
    }

    /// Total surface area.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.faces.iter().map(|f| self.face_area(f)).sum()
    }

    /// Signed enclosed volume (positive for outward-facing closed meshes).
    ///
    /// Faces are fan-triangulated from their first vertex; for planar convex
    /// or star-shaped polygons this is exact.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for [a, b, c] in self.triangulate() {
            let v0 = &self.vertices[a as usize];
            let v1 = &self.vertices[b as usize];
            let v2 = &self.vertices[c as usize];
            volume += v0.coords.dot(&v1.coords.cross(&v2.coords));
        }
        volume / 6.0
    }

    /// Fan triangulation of every face.
    #[must_use]
    pub fn triangulate(&self) -> Vec<[u32; 3]> {
        let mut triangles = Vec::new();
        for face in &self.faces {
            let loop_ = &face.vertices;
            for i in 1..loop_.len().saturating_sub(1) {
                triangles.push([loop_[0], loop_[i], loop_[i + 1]]);
            }
        }
        triangles
    }

    /// Bounding box of the vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter())
    }

    /// Reverse the winding of every face.
    pub fn flip_faces(&mut self) {
        for face in &mut self.faces {
            face.vertices.reverse();
        }
    }
}
