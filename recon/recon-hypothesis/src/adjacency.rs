//! Incidence structures and manifold constraints over the arrangement.
//!
//! Only enclosed faces are eligible for selection. An edge with at least two
//! eligible faces is *interior*: a closed surface uses either none or exactly
//! two of them. At each vertex the used interior edges must close up, so no
//! used edge may be the only used one at that vertex.
//!
//! The faces around a vertex form its *link*: one node per interior edge at
//! the vertex and one arc per face corner, joining the two edges the face
//! has there. With edge parity in place every used node has exactly two
//! selected arcs, so the selected link is a union of cycles. The surface is
//! manifold at the vertex only if there is a single cycle, which is enforced
//! by forbidding every pair of node-disjoint link cycles from being fully
//! selected together.

use tracing::warn;

use crate::arrangement::Arrangement;

/// Upper bound on the link cycles enumerated at one vertex.
const MAX_LINK_CYCLES: usize = 1024;

/// Parity requirement of one interior edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeParity {
    /// Edge id.
    pub edge: usize,
    /// Eligible incident faces, ascending.
    pub faces: Vec<usize>,
}

/// Cycle requirement at one vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexCycle {
    /// Vertex id.
    pub vertex: usize,
    /// Interior edges at the vertex, ascending.
    pub edges: Vec<usize>,
}

/// Two separate fans of faces around one vertex.
///
/// Selecting all of `faces` would make the surface touch itself at the
/// vertex, so at most `faces.len() - 1` of them may be selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanSeparation {
    /// Vertex id.
    pub vertex: usize,
    /// Faces of both fans, ascending.
    pub faces: Vec<usize>,
}

/// Everything a face selection must satisfy to form a closed 2-manifold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifoldConstraints {
    /// One record per interior edge, ascending edge id.
    pub edge_parity: Vec<EdgeParity>,
    /// One record per vertex with interior edges, ascending vertex id.
    pub vertex_cycles: Vec<VertexCycle>,
    /// Fan pairs that must not be selected together, ascending vertex id.
    pub fan_separations: Vec<FanSeparation>,
    /// Faces that must not be selected, ascending.
    pub rejected_faces: Vec<usize>,
}

/// Edge and vertex incidence of an [`Arrangement`].
///
/// # Example
///
/// ```
/// use recon_hypothesis::{AdjacencyGraph, ArrangementBuilder, SupportingPlane};
/// use recon_types::{Aabb, Plane, Point3, Vector3};
///
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
/// let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let arrangement = ArrangementBuilder::default().build(&planes, &bounds).unwrap();
///
/// let graph = AdjacencyGraph::build(&arrangement);
/// let constraints = graph.constraints();
/// assert_eq!(constraints.edge_parity.len(), 12);
/// assert_eq!(constraints.vertex_cycles.len(), 8);
/// assert!(constraints.fan_separations.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    /// All incident faces per edge.
    incident: Vec<Vec<usize>>,
    /// Eligible incident faces per edge.
    eligible: Vec<Vec<usize>>,
    /// Interior edges per vertex, ascending.
    vertex_edges: Vec<Vec<usize>>,
    /// Link arcs per vertex: a face and the positions of its two edges at
    /// the vertex in `vertex_edges`.
    corners: Vec<Vec<Corner>>,
    rejected: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    face: usize,
    nodes: [usize; 2],
}

impl AdjacencyGraph {
    /// Build the incidence structures.
    #[must_use]
    pub fn build(arrangement: &Arrangement) -> Self {
        let faces = arrangement.faces();
        let incident: Vec<Vec<usize>> = arrangement.edges().iter().map(|e| e.faces.clone()).collect();
        let eligible: Vec<Vec<usize>> = incident
            .iter()
            .map(|fs| fs.iter().copied().filter(|&f| faces[f].enclosed).collect())
            .collect();

        let mut vertex_edges = vec![Vec::new(); arrangement.vertices().len()];
        for (edge, candidates) in arrangement.edges().iter().zip(&eligible) {
            if candidates.len() >= 2 {
                for &v in &edge.vertices {
                    vertex_edges[v].push(edge.id);
                }
            }
        }

        let mut corners = vec![Vec::new(); vertex_edges.len()];
        for face in faces.iter().filter(|f| f.enclosed) {
            let n = face.vertices.len();
            if face.edges.len() != n {
                continue;
            }
            for (i, &v) in face.vertices.iter().enumerate() {
                let at_vertex = &vertex_edges[v];
                let before = at_vertex.binary_search(&face.edges[(i + n - 1) % n]);
                let after = at_vertex.binary_search(&face.edges[i]);
                if let (Ok(a), Ok(b)) = (before, after) {
                    corners[v].push(Corner {
                        face: face.id,
                        nodes: [a, b],
                    });
                }
            }
        }

        let rejected = faces.iter().filter(|f| !f.enclosed).map(|f| f.id).collect();

        Self {
            incident,
            eligible,
            vertex_edges,
            corners,
            rejected,
        }
    }

    /// Eligible faces incident to an edge.
    #[must_use]
    pub fn faces_for_edge(&self, edge: usize) -> &[usize] {
        self.eligible.get(edge).map_or(&[], Vec::as_slice)
    }

    /// Interior edges incident to a vertex.
    #[must_use]
    pub fn edges_for_vertex(&self, vertex: usize) -> &[usize] {
        self.vertex_edges.get(vertex).map_or(&[], Vec::as_slice)
    }

    /// Whether an edge has at least two eligible faces.
    #[must_use]
    pub fn is_interior(&self, edge: usize) -> bool {
        self.faces_for_edge(edge).len() >= 2
    }

    /// Ids of interior edges, ascending.
    pub fn interior_edges(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.eligible.len()).filter(|&e| self.is_interior(e))
    }

    /// Faces that can never be selected.
    #[must_use]
    pub fn rejected_faces(&self) -> &[usize] {
        &self.rejected
    }

    /// The manifold constraints of a face selection.
    #[must_use]
    pub fn constraints(&self) -> ManifoldConstraints {
        let edge_parity = self
            .interior_edges()
            .map(|edge| EdgeParity {
                edge,
                faces: self.eligible[edge].clone(),
            })
            .collect();

        let vertex_cycles = self
            .vertex_edges
            .iter()
            .enumerate()
            .filter(|(_, edges)| !edges.is_empty())
            .map(|(vertex, edges)| VertexCycle {
                vertex,
                edges: edges.clone(),
            })
            .collect();

        let fan_separations = (0..self.vertex_edges.len())
            .flat_map(|vertex| self.separations_at(vertex))
            .collect();

        ManifoldConstraints {
            edge_parity,
            vertex_cycles,
            fan_separations,
            rejected_faces: self.rejected.clone(),
        }
    }

    /// Every pair of node-disjoint link cycles at a vertex.
    fn separations_at(&self, vertex: usize) -> Vec<FanSeparation> {
        let node_count = self.vertex_edges[vertex].len();
        // Two disjoint cycles need at least two nodes each.
        if node_count < 4 {
            return Vec::new();
        }
        if node_count > 64 {
            warn!(vertex, edges = node_count, "Too many edges to separate fans at vertex");
            return Vec::new();
        }
        let corners = &self.corners[vertex];
        let arcs: Vec<[usize; 2]> = corners.iter().map(|c| c.nodes).collect();
        let Some(cycles) = link_cycles(node_count, &arcs) else {
            warn!(vertex, limit = MAX_LINK_CYCLES, "Too many link cycles to separate fans at vertex");
            return Vec::new();
        };

        let mut separations = Vec::new();
        for (i, first) in cycles.iter().enumerate() {
            for second in &cycles[i + 1..] {
                if first.nodes & second.nodes != 0 {
                    continue;
                }
                let mut faces: Vec<usize> = first
                    .arcs
                    .iter()
                    .chain(&second.arcs)
                    .map(|&k| corners[k].face)
                    .collect();
                faces.sort_unstable();
                faces.dedup();
                separations.push(FanSeparation { vertex, faces });
            }
        }
        separations
    }

    /// Vertices where the selected faces form more than one fan.
    ///
    /// `selected` is indexed by face id. Only enclosed faces are considered.
    #[must_use]
    pub fn branching_vertices(&self, selected: &[bool]) -> Vec<usize> {
        (0..self.corners.len())
            .filter(|&v| self.fan_count(v, selected) > 1)
            .collect()
    }

    /// Number of connected pieces of the selected link at a vertex.
    fn fan_count(&self, vertex: usize, selected: &[bool]) -> usize {
        let node_count = self.vertex_edges[vertex].len();
        let mut parent: Vec<usize> = (0..node_count).collect();
        let mut touched = vec![false; node_count];
        for corner in &self.corners[vertex] {
            if !selected.get(corner.face).copied().unwrap_or(false) {
                continue;
            }
            let [a, b] = corner.nodes;
            touched[a] = true;
            touched[b] = true;
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }
        (0..node_count)
            .filter(|&n| touched[n] && find(&mut parent, n) == n)
            .count()
    }

    /// Edges whose number of selected incident faces is neither 0 nor 2.
    ///
    /// `selected` is indexed by face id. Every edge of the arrangement is
    /// checked, counting all incident faces.
    #[must_use]
    pub fn parity_violations(&self, selected: &[bool]) -> Vec<usize> {
        self.incident
            .iter()
            .enumerate()
            .filter(|(_, faces)| {
                let count = faces
                    .iter()
                    .filter(|&&f| selected.get(f).copied().unwrap_or(false))
                    .count();
                count != 0 && count != 2
            })
            .map(|(edge, _)| edge)
            .collect()
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// A simple cycle of a link: the bitmask of its nodes and its arcs.
#[derive(Debug)]
struct LinkCycle {
    nodes: u64,
    arcs: Vec<usize>,
}

/// Simple cycles of a link multigraph with at most 64 nodes, each reported
/// once. `None` if there are more than [`MAX_LINK_CYCLES`].
fn link_cycles(node_count: usize, arcs: &[[usize; 2]]) -> Option<Vec<LinkCycle>> {
    let mut adjacent = vec![Vec::new(); node_count];
    for (k, &[a, b]) in arcs.iter().enumerate() {
        adjacent[a].push((k, b));
        adjacent[b].push((k, a));
    }
    let mut search = CycleSearch {
        adjacent,
        path: Vec::new(),
        visited: 0,
        cycles: Vec::new(),
    };
    for start in 0..node_count {
        search.visited = 1 << start;
        if !search.extend(start, start) {
            return None;
        }
    }
    Some(search.cycles)
}

/// Depth-first cycle enumeration. Every cycle is found from its lowest node
/// and kept in the direction whose first arc is lower than its last.
struct CycleSearch {
    adjacent: Vec<Vec<(usize, usize)>>,
    path: Vec<usize>,
    visited: u64,
    cycles: Vec<LinkCycle>,
}

impl CycleSearch {
    fn extend(&mut self, start: usize, node: usize) -> bool {
        for i in 0..self.adjacent[node].len() {
            let (arc, next) = self.adjacent[node][i];
            if next == start {
                if self.path.first().is_some_and(|&first| first < arc) {
                    let mut arcs = self.path.clone();
                    arcs.push(arc);
                    self.cycles.push(LinkCycle {
                        nodes: self.visited,
                        arcs,
                    });
                    if self.cycles.len() > MAX_LINK_CYCLES {
                        return false;
                    }
                }
            } else if next > start && self.visited & (1 << next) == 0 {
                self.visited |= 1 << next;
                self.path.push(arc);
                let complete = self.extend(start, next);
                self.path.pop();
                self.visited &= !(1 << next);
                if !complete {
                    return false;
                }
            }
        }
        true
    }
}
