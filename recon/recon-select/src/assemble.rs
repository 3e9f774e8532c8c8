//! Assembly of the selected faces into a polygon mesh.
//!
//! The selected faces are checked for edge parity, oriented consistently
//! with outward normals, optionally merged per supporting plane and cleaned
//! of collinear vertices before the result is validated.

use std::collections::VecDeque;

use hashbrown::HashMap;
use recon_hypothesis::Arrangement;
use recon_types::{Point3, PolygonFace, PolygonMesh};
use tracing::{debug, info, warn};

use crate::error::{SelectResult, SelectionError};
use crate::formulate::SelectionResult;
use crate::params::AssemblyParams;
use crate::validate::{find, union, validate_polygon_mesh};

/// Builds the output [`PolygonMesh`] from a face selection.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use recon_hypothesis::{AdjacencyGraph, ArrangementBuilder, SupportingPlane};
/// use recon_select::{MeshAssembler, SelectionResult};
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
/// let selection = SelectionResult {
///     selected: arrangement.faces().iter().map(|f| f.enclosed).collect(),
///     objective: 0.0,
/// };
/// let mesh = MeshAssembler::default().assemble(&arrangement, &selection).unwrap();
/// assert_eq!(mesh.face_count(), 6);
/// assert_eq!(mesh.vertex_count(), 8);
/// assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshAssembler {
    params: AssemblyParams,
}

impl MeshAssembler {
    /// Create an assembler with the given parameters.
    #[must_use]
    pub const fn new(params: AssemblyParams) -> Self {
        Self { params }
    }

    /// Get the parameters.
    #[must_use]
    pub const fn params(&self) -> &AssemblyParams {
        &self.params
    }

    /// Assemble the selected faces.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyResult`] if nothing is selected and
    /// [`SelectionError::MeshAssemblyFailed`] if the selection does not
    /// match the arrangement, breaks edge parity, cannot be oriented, or
    /// does not validate as a closed 2-manifold.
    pub fn assemble(
        &self,
        arrangement: &Arrangement,
        selection: &SelectionResult,
    ) -> SelectResult<PolygonMesh> {
        let faces = arrangement.faces();
        let selected = &selection.selected;
        if selected.len() != faces.len() {
            return Err(assembly_failed(format!(
                "selection covers {} of {} faces",
                selected.len(),
                faces.len()
            )));
        }
        if !selected.iter().any(|&s| s) {
            return Err(SelectionError::EmptyResult);
        }
        check_parity(arrangement, selected)?;

        let mut loops = orient(arrangement, selected)?;
        let chosen: Vec<usize> = (0..faces.len()).filter(|&f| selected[f]).collect();

        let mut polygons: Vec<(Vec<usize>, usize)> = if self.params.merge_coplanar {
            merge_coplanar(arrangement, selected, &chosen, &mut loops)
        } else {
            chosen
                .iter()
                .map(|&f| (std::mem::take(&mut loops[f]), faces[f].plane))
                .collect()
        };

        let tolerance = arrangement.tolerance();
        let dissolved = if self.params.dissolve_collinear {
            dissolve_collinear(arrangement.vertices(), &mut polygons, tolerance)
        } else {
            0
        };

        let mesh = compact(arrangement.vertices(), &polygons)?;
        let check = validate_polygon_mesh(&mesh, tolerance * tolerance);
        if !check.is_closed_manifold() {
            warn!(%check, "Assembled mesh is not a closed manifold");
            return Err(assembly_failed(check.to_string()));
        }

        info!(
            selected = chosen.len(),
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            dissolved,
            volume = check.signed_volume,
            "Assembled polygon mesh"
        );
        Ok(mesh)
    }
}

fn assembly_failed(details: String) -> SelectionError {
    SelectionError::MeshAssemblyFailed { details }
}

/// Every edge must have zero or two selected faces.
fn check_parity(arrangement: &Arrangement, selected: &[bool]) -> SelectResult<()> {
    for edge in arrangement.edges() {
        let count = edge.faces.iter().filter(|&&f| selected[f]).count();
        if count != 0 && count != 2 {
            return Err(assembly_failed(format!(
                "edge {} has {count} selected faces",
                edge.id
            )));
        }
    }
    Ok(())
}

/// Orient the selected face loops consistently, outward per component.
///
/// Returns one loop per face (empty for unselected faces).
fn orient(arrangement: &Arrangement, selected: &[bool]) -> SelectResult<Vec<Vec<usize>>> {
    let faces = arrangement.faces();
    let edges = arrangement.edges();

    // Whether face `f` walks the edge at position `i` from its lower vertex.
    let forward = |f: usize, i: usize| faces[f].vertices[i] == edges[faces[f].edges[i]].vertices[0];

    let mut flip: Vec<Option<bool>> = vec![None; faces.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..faces.len() {
        if !selected[seed] || flip[seed].is_some() {
            continue;
        }
        flip[seed] = Some(false);
        queue.push_back(seed);
        let mut component = Vec::new();

        while let Some(f) = queue.pop_front() {
            component.push(f);
            let flip_f = flip[f].unwrap_or(false);
            for (i, &e) in faces[f].edges.iter().enumerate() {
                let walks_forward = forward(f, i) != flip_f;
                let Some(g) = edges[e]
                    .faces
                    .iter()
                    .copied()
                    .find(|&g| g != f && selected[g])
                else {
                    continue;
                };
                let Some(j) = faces[g].edges.iter().position(|&x| x == e) else {
                    continue;
                };
                // The neighbor must walk the shared edge the other way.
                let wanted = forward(g, j) == walks_forward;
                match flip[g] {
                    None => {
                        flip[g] = Some(wanted);
                        queue.push_back(g);
                    }
                    Some(current) if current != wanted => {
                        return Err(assembly_failed(format!(
                            "faces {f} and {g} cannot be oriented consistently"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    let positions = arrangement.vertices();
    let mut loops: Vec<Vec<usize>> = vec![Vec::new(); faces.len()];
    for component in &components {
        let oriented: Vec<Vec<usize>> = component
            .iter()
            .map(|&f| {
                let mut l = faces[f].vertices.clone();
                if flip[f] == Some(true) {
                    l.reverse();
                }
                l
            })
            .collect();
        let volume: f64 = oriented.iter().map(|l| loop_volume(positions, l)).sum();
        debug!(faces = component.len(), volume, "Oriented component");
        for (&f, mut l) in component.iter().zip(oriented) {
            if volume < 0.0 {
                l.reverse();
            }
            loops[f] = l;
        }
    }
    Ok(loops)
}

/// Six times the signed volume contribution of one polygon loop.
fn loop_volume(positions: &[Point3<f64>], loop_: &[usize]) -> f64 {
    let p0 = positions[loop_[0]].coords;
    (1..loop_.len().saturating_sub(1))
        .map(|i| {
            let p1 = positions[loop_[i]].coords;
            let p2 = positions[loop_[i + 1]].coords;
            p0.dot(&p1.cross(&p2))
        })
        .sum()
}

/// Merge edge-adjacent selected faces that share a supporting plane.
///
/// Groups whose boundary is not a single simple loop (holes, pinches) keep
/// their faces unmerged.
fn merge_coplanar(
    arrangement: &Arrangement,
    selected: &[bool],
    chosen: &[usize],
    loops: &mut [Vec<usize>],
) -> Vec<(Vec<usize>, usize)> {
    let faces = arrangement.faces();
    let mut parent: Vec<usize> = (0..faces.len()).collect();
    for edge in arrangement.edges() {
        let mut on_edge = edge.faces.iter().copied().filter(|&f| selected[f]);
        if let (Some(a), Some(b)) = (on_edge.next(), on_edge.next()) {
            if faces[a].plane == faces[b].plane {
                union(&mut parent, a, b);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for &f in chosen {
        let root = find(&mut parent, f);
        let slot = *group_of.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(f);
    }

    let mut polygons = Vec::with_capacity(groups.len());
    let mut merged = 0usize;
    for group in groups {
        let plane = faces[group[0]].plane;
        if group.len() == 1 {
            polygons.push((std::mem::take(&mut loops[group[0]]), plane));
            continue;
        }
        match trace_boundary(&group, loops) {
            Some(boundary) => {
                merged += group.len() - 1;
                polygons.push((boundary, plane));
            }
            None => {
                warn!(
                    plane,
                    faces = group.len(),
                    "Coplanar faces do not form a simple polygon, keeping them separate"
                );
                for &f in &group {
                    polygons.push((std::mem::take(&mut loops[f]), plane));
                }
            }
        }
    }
    debug!(merged, polygons = polygons.len(), "Merged coplanar faces");
    polygons
}

/// The single boundary loop of a group of oriented faces, if there is one.
fn trace_boundary(group: &[usize], loops: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut half_edges: Vec<(usize, usize)> = Vec::new();
    for &f in group {
        let l = &loops[f];
        let n = l.len();
        half_edges.extend((0..n).map(|i| (l[i], l[(i + 1) % n])));
    }
    let present: hashbrown::HashSet<(usize, usize)> = half_edges.iter().copied().collect();
    let mut boundary: Vec<(usize, usize)> = half_edges
        .into_iter()
        .filter(|&(a, b)| !present.contains(&(b, a)))
        .collect();
    boundary.sort_unstable();

    let mut next: HashMap<usize, usize> = HashMap::with_capacity(boundary.len());
    for &(a, b) in &boundary {
        if next.insert(a, b).is_some() {
            return None;
        }
    }

    let &(start, _) = boundary.first()?;
    let mut result = Vec::with_capacity(boundary.len());
    let mut current = start;
    loop {
        result.push(current);
        current = *next.get(&current)?;
        if current == start {
            break;
        }
        if result.len() > boundary.len() {
            return None;
        }
    }
    (result.len() == boundary.len() && result.len() >= 3).then_some(result)
}

/// Drop vertices with exactly two neighbors that lie on the segment between
/// them. Returns the number of vertices removed.
fn dissolve_collinear(
    positions: &[Point3<f64>],
    polygons: &mut [(Vec<usize>, usize)],
    tolerance: f64,
) -> usize {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); positions.len()];
    let mut vertex_polygons: Vec<Vec<usize>> = vec![Vec::new(); positions.len()];
    for (p, (l, _)) in polygons.iter().enumerate() {
        let n = l.len();
        for i in 0..n {
            let (a, b) = (l[i], l[(i + 1) % n]);
            if !neighbors[a].contains(&b) {
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
            if vertex_polygons[a].last() != Some(&p) {
                vertex_polygons[a].push(p);
            }
        }
    }

    let mut removed = 0;
    for v in 0..positions.len() {
        let &[a, b] = neighbors[v].as_slice() else {
            continue;
        };
        if neighbors[a].contains(&b)
            || !between(&positions[a], &positions[v], &positions[b], tolerance)
            || vertex_polygons[v].iter().any(|&p| polygons[p].0.len() <= 3)
        {
            continue;
        }
        for &p in &vertex_polygons[v] {
            polygons[p].0.retain(|&x| x != v);
        }
        for (end, other) in [(a, b), (b, a)] {
            for slot in &mut neighbors[end] {
                if *slot == v {
                    *slot = other;
                }
            }
        }
        neighbors[v].clear();
        removed += 1;
    }
    removed
}

/// Whether `v` lies on the segment `a`-`b` within `tolerance`.
fn between(a: &Point3<f64>, v: &Point3<f64>, b: &Point3<f64>, tolerance: f64) -> bool {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= tolerance * tolerance {
        return false;
    }
    let av = v - a;
    let t = av.dot(&ab);
    t > 0.0 && t < len_sq && av.cross(&ab).norm() <= tolerance * len_sq.sqrt()
}

/// Renumber the used vertices densely, in ascending arrangement order.
fn compact(positions: &[Point3<f64>], polygons: &[(Vec<usize>, usize)]) -> SelectResult<PolygonMesh> {
    let mut remap: Vec<Option<u32>> = vec![None; positions.len()];
    let mut used: Vec<usize> = polygons.iter().flat_map(|(l, _)| l.iter().copied()).collect();
    used.sort_unstable();
    used.dedup();

    let mut mesh = PolygonMesh::new();
    for v in used {
        let index = u32::try_from(mesh.vertices.len())
            .map_err(|_| assembly_failed("too many vertices for 32-bit indices".to_string()))?;
        remap[v] = Some(index);
        mesh.vertices.push(positions[v]);
    }
    for (l, plane) in polygons {
        let vertices = l.iter().filter_map(|&v| remap[v]).collect();
        mesh.faces.push(PolygonFace::new(vertices, *plane));
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_hypothesis::{ArrangementBuilder, SupportingPlane};
    use recon_types::{Aabb, Plane, Vector3};

    fn arrangement(planes: &[(Vector3<f64>, f64)], max: Point3<f64>) -> Arrangement {
        let planes: Vec<SupportingPlane> = planes
            .iter()
            .enumerate()
            .map(|(id, (n, d))| SupportingPlane {
                id,
                plane: Plane::new(*n, *d).unwrap(),
                members: Vec::new(),
                labels: vec![u32::try_from(id).unwrap()],
                rms_residual: 0.0,
            })
            .collect();
        let bounds = Aabb::new(Point3::origin(), max);
        ArrangementBuilder::default().build(&planes, &bounds).unwrap()
    }

    fn cube() -> Arrangement {
        arrangement(
            &[
                (Vector3::x(), 0.0),
                (Vector3::x(), -1.0),
                (Vector3::y(), 0.0),
                (Vector3::y(), -1.0),
                (Vector3::z(), 0.0),
                (Vector3::z(), -1.0),
            ],
            Point3::new(1.0, 1.0, 1.0),
        )
    }

    /// Unit cube split in two by x = 1 inside a 2x1x1 box.
    fn split_box() -> Arrangement {
        arrangement(
            &[
                (Vector3::x(), 0.0),
                (Vector3::x(), -1.0),
                (Vector3::x(), -2.0),
                (Vector3::y(), 0.0),
                (Vector3::y(), -1.0),
                (Vector3::z(), 0.0),
                (Vector3::z(), -1.0),
            ],
            Point3::new(2.0, 1.0, 1.0),
        )
    }

    fn outer_hull(arrangement: &Arrangement) -> SelectionResult {
        // Everything enclosed except the divider at x = 1 (plane 1).
        SelectionResult {
            selected: arrangement
                .faces()
                .iter()
                .map(|f| f.enclosed && f.plane != 1)
                .collect(),
            objective: 0.0,
        }
    }

    #[test]
    fn test_cube_is_outward() {
        let arrangement = cube();
        let selection = SelectionResult {
            selected: arrangement.faces().iter().map(|f| f.enclosed).collect(),
            objective: 0.0,
        };
        let mesh = MeshAssembler::default().assemble(&arrangement, &selection).unwrap();
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 8);
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
        for face in &mesh.faces {
            let normal = mesh.face_normal_raw(face);
            let centroid = face
                .vertices
                .iter()
                .map(|&v| mesh.vertices[v as usize].coords)
                .sum::<Vector3<f64>>()
                / face.vertices.len() as f64;
            assert!(normal.dot(&(centroid - Vector3::new(0.5, 0.5, 0.5))) > 0.0);
        }
    }

    #[test]
    fn test_merges_split_box() {
        let arrangement = split_box();
        let selection = outer_hull(&arrangement);
        assert_eq!(selection.selected.iter().filter(|&&s| s).count(), 10);

        let mesh = MeshAssembler::default().assemble(&arrangement, &selection).unwrap();
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 8);
        assert!((mesh.signed_volume() - 2.0).abs() < 1e-9);
        assert!((mesh.surface_area() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_raw_assembly_keeps_cells() {
        let arrangement = split_box();
        let selection = outer_hull(&arrangement);
        let mesh = MeshAssembler::new(AssemblyParams::raw())
            .assemble(&arrangement, &selection)
            .unwrap();
        assert_eq!(mesh.face_count(), 10);
        assert_eq!(mesh.vertex_count(), 12);
        assert!((mesh.signed_volume() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_without_dissolve_keeps_midpoints() {
        let arrangement = split_box();
        let selection = outer_hull(&arrangement);
        let mesh = MeshAssembler::new(AssemblyParams::default().with_dissolve_collinear(false))
            .assemble(&arrangement, &selection)
            .unwrap();
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 12);
    }

    #[test]
    fn test_parity_violation() {
        let arrangement = cube();
        let mut selected: Vec<bool> = arrangement.faces().iter().map(|f| f.enclosed).collect();
        let first = selected.iter().position(|&s| s).unwrap();
        selected[first] = false;
        let err = MeshAssembler::default()
            .assemble(&arrangement, &SelectionResult { selected, objective: 0.0 })
            .unwrap_err();
        assert!(matches!(err, SelectionError::MeshAssemblyFailed { .. }));
    }

    #[test]
    fn test_empty_and_mismatched_selection() {
        let arrangement = cube();
        let none = SelectionResult {
            selected: vec![false; arrangement.faces().len()],
            objective: 0.0,
        };
        assert!(matches!(
            MeshAssembler::default().assemble(&arrangement, &none),
            Err(SelectionError::EmptyResult)
        ));
        let short = SelectionResult {
            selected: vec![true],
            objective: 0.0,
        };
        assert!(matches!(
            MeshAssembler::default().assemble(&arrangement, &short),
            Err(SelectionError::MeshAssemblyFailed { .. })
        ));
    }

    #[test]
    fn test_between() {
        let a = Point3::origin();
        let b = Point3::new(2.0, 0.0, 0.0);
        assert!(between(&a, &Point3::new(1.0, 1e-9, 0.0), &b, 1e-6));
        assert!(!between(&a, &Point3::new(1.0, 0.1, 0.0), &b, 1e-6));
        assert!(!between(&a, &Point3::new(3.0, 0.0, 0.0), &b, 1e-6));
    }
}
