//! Polygon mesh validation.
//!
//! Checks that an assembled model is a closed, consistently oriented
//! 2-manifold.

use std::fmt;

use hashbrown::HashMap;
use recon_types::PolygonMesh;

/// Result of validating a [`PolygonMesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshCheck {
    /// Total number of vertices.
    pub vertex_count: usize,
    /// Total number of faces.
    pub face_count: usize,
    /// Total number of undirected edges.
    pub edge_count: usize,

    /// Edges with only one adjacent face.
    pub boundary_edge_count: usize,
    /// Edges with more than two adjacent faces.
    pub non_manifold_edge_count: usize,
    /// Edges traversed twice in the same direction.
    pub inconsistent_edge_count: usize,
    /// Faces with fewer than three distinct vertices or (near) zero area.
    pub degenerate_face_count: usize,
    /// Vertices whose incident faces form more than one fan.
    pub non_manifold_vertex_count: usize,

    /// Signed enclosed volume.
    pub signed_volume: f64,
}

impl MeshCheck {
    /// No boundary edges.
    #[must_use]
    pub const fn is_watertight(&self) -> bool {
        self.boundary_edge_count == 0
    }

    /// No non-manifold edges or vertices.
    #[must_use]
    pub const fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0 && self.non_manifold_vertex_count == 0
    }

    /// Every shared edge is traversed once in each direction.
    #[must_use]
    pub const fn is_oriented(&self) -> bool {
        self.inconsistent_edge_count == 0
    }

    /// Watertight, manifold, oriented, non-degenerate and facing outward.
    #[must_use]
    pub fn is_closed_manifold(&self) -> bool {
        self.face_count > 0
            && self.is_watertight()
            && self.is_manifold()
            && self.is_oriented()
            && self.degenerate_face_count == 0
            && self.signed_volume > 0.0
    }

    /// Total number of defects found.
    #[must_use]
    pub const fn issue_count(&self) -> usize {
        self.boundary_edge_count
            + self.non_manifold_edge_count
            + self.inconsistent_edge_count
            + self.degenerate_face_count
            + self.non_manifold_vertex_count
    }
}

impl fmt::Display for MeshCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} faces, {} edges",
            self.vertex_count, self.face_count, self.edge_count
        )?;
        if self.issue_count() == 0 {
            return write!(f, ", volume {:.6}", self.signed_volume);
        }
        let issues = [
            (self.boundary_edge_count, "boundary edges"),
            (self.non_manifold_edge_count, "non-manifold edges"),
            (self.inconsistent_edge_count, "inconsistently oriented edges"),
            (self.degenerate_face_count, "degenerate faces"),
            (self.non_manifold_vertex_count, "non-manifold vertices"),
        ];
        for (count, what) in issues {
            if count > 0 {
                write!(f, "; {count} {what}")?;
            }
        }
        Ok(())
    }
}

/// Validate a polygon mesh.
///
/// Faces with area at or below `degenerate_area` count as degenerate.
///
/// # Example
///
/// ```
/// use recon_select::validate_polygon_mesh;
/// use recon_types::{PolygonFace, PolygonMesh, Point3};
///
/// let mut mesh = PolygonMesh::new();
/// mesh.vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// ];
/// for tri in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]] {
///     mesh.faces.push(PolygonFace::new(tri.to_vec(), 0));
/// }
///
/// let check = validate_polygon_mesh(&mesh, 1e-12);
/// assert!(check.is_closed_manifold());
/// assert_eq!(check.edge_count, 6);
/// ```
#[must_use]
pub fn validate_polygon_mesh(mesh: &PolygonMesh, degenerate_area: f64) -> MeshCheck {
    let mut check = MeshCheck {
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        signed_volume: mesh.signed_volume(),
        ..MeshCheck::default()
    };

    let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
    let mut undirected: HashMap<(u32, u32), usize> = HashMap::new();
    for face in &mesh.faces {
        let mut distinct = face.vertices.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 || mesh.face_area(face) <= degenerate_area {
            check.degenerate_face_count += 1;
        }
        for (a, b) in face.edges() {
            *directed.entry((a, b)).or_insert(0) += 1;
            let key = if a < b { (a, b) } else { (b, a) };
            *undirected.entry(key).or_insert(0) += 1;
        }
    }

    check.edge_count = undirected.len();
    for &count in undirected.values() {
        match count {
            1 => check.boundary_edge_count += 1,
            2 => {}
            _ => check.non_manifold_edge_count += 1,
        }
    }
    check.inconsistent_edge_count = directed.values().filter(|&&c| c > 1).count();
    check.non_manifold_vertex_count = count_non_manifold_vertices(mesh);
    check
}

/// Count vertices whose incident faces split into several edge-connected fans.
fn count_non_manifold_vertices(mesh: &PolygonMesh) -> usize {
    let mut vertex_faces: Vec<Vec<usize>> = vec![Vec::new(); mesh.vertex_count()];
    for (f, face) in mesh.faces.iter().enumerate() {
        for &v in &face.vertices {
            if let Some(list) = vertex_faces.get_mut(v as usize) {
                if list.last() != Some(&f) {
                    list.push(f);
                }
            }
        }
    }

    let mut count = 0;
    for (v, faces) in vertex_faces.iter().enumerate() {
        if faces.len() < 2 {
            continue;
        }
        // Faces around `v` are linked when they share an edge at `v`.
        let mut parent: Vec<usize> = (0..faces.len()).collect();
        let mut by_neighbor: HashMap<u32, usize> = HashMap::new();
        for (local, &f) in faces.iter().enumerate() {
            let loop_ = &mesh.faces[f].vertices;
            let n = loop_.len();
            for i in 0..n {
                if loop_[i] as usize != v {
                    continue;
                }
                for w in [loop_[(i + n - 1) % n], loop_[(i + 1) % n]] {
                    match by_neighbor.get(&w) {
                        Some(&other) => union(&mut parent, local, other),
                        None => {
                            by_neighbor.insert(w, local);
                        }
                    }
                }
            }
        }
        let fans = (0..faces.len()).filter(|&i| find(&mut parent, i) == i).count();
        if fans > 1 {
            count += 1;
        }
    }
    count
}

pub(crate) fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

pub(crate) fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // Lower root wins so results do not depend on call order.
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi] = lo;
    }
}
