//! Global vertex welding and T-junction repair for arrangement cells.

use hashbrown::HashMap;
use nalgebra::Point3;
use recon_types::Plane;

/// Cells after welding: shared vertex positions and per-cell index loops.
#[derive(Debug, Clone, Default)]
pub(crate) struct WeldedCells {
    pub vertices: Vec<Point3<f64>>,
    /// `(plane id, vertex loop)`; cells that collapsed are removed.
    pub loops: Vec<(usize, Vec<usize>)>,
}

/// Weld all cell vertices closer than `epsilon`.
///
/// Vertices are visited in creation order and the first one seen becomes the
/// representative of everything within `epsilon` of it, so the result does
/// not depend on hash iteration order.
pub(crate) fn weld_cells(cells: &[(usize, Vec<Point3<f64>>)], epsilon: f64) -> WeldedCells {
    let raw: Vec<Point3<f64>> = cells.iter().flat_map(|(_, c)| c.iter().copied()).collect();
    if raw.is_empty() {
        return WeldedCells::default();
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (idx, p) in raw.iter().enumerate() {
        spatial_hash.entry(pos_to_cell(p, cell_size)).or_default().push(idx);
    }

    let mut remap: Vec<usize> = (0..raw.len()).collect();
    for (idx, p) in raw.iter().enumerate() {
        if remap[idx] != idx {
            continue;
        }
        let cell = pos_to_cell(p, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other > idx && remap[other] == other && (raw[other] - p).norm() < epsilon {
                            remap[other] = idx;
                        }
                    }
                }
            }
        }
    }

    // Representatives are never remapped, so one hop resolves every chain.
    let mut compact = vec![usize::MAX; raw.len()];
    let mut vertices = Vec::new();
    for idx in 0..raw.len() {
        if remap[idx] == idx {
            compact[idx] = vertices.len();
            vertices.push(raw[idx]);
        }
    }

    let mut loops = Vec::with_capacity(cells.len());
    let mut offset = 0;
    for (plane, cell) in cells {
        let mut ids: Vec<usize> = (offset..offset + cell.len())
            .map(|raw_idx| compact[remap[raw_idx]])
            .collect();
        offset += cell.len();

        ids.dedup();
        while ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        if ids.len() >= 3 {
            loops.push((*plane, ids));
        }
    }

    WeldedCells { vertices, loops }
}

/// Insert vertices that lie inside a cell edge into that edge.
///
/// A vertex created by one plane can land in the middle of an edge of a cell
/// on another plane. Splitting the edge there makes both cells share it.
pub(crate) fn split_t_junctions(welded: &mut WeldedCells, planes: &[(usize, Plane)], epsilon: f64) {
    let vertices = &welded.vertices;
    let on_plane: HashMap<usize, Vec<usize>> = planes
        .iter()
        .map(|(id, plane)| {
            let ids = (0..vertices.len())
                .filter(|&v| plane.signed_distance(&vertices[v]).abs() <= epsilon)
                .collect();
            (*id, ids)
        })
        .collect();

    for (plane, ids) in &mut welded.loops {
        let Some(candidates) = on_plane.get(plane) else {
            continue;
        };
        let n = ids.len();
        let mut refined = Vec::with_capacity(n);
        for i in 0..n {
            let a = ids[i];
            let b = ids[(i + 1) % n];
            refined.push(a);

            let pa = vertices[a];
            let ab = vertices[b] - pa;
            let len_sq = ab.norm_squared();
            if len_sq <= epsilon * epsilon {
                continue;
            }
            let mut inner: Vec<(f64, usize)> = candidates
                .iter()
                .filter(|&&w| !ids.contains(&w))
                .filter_map(|&w| {
                    let t = (vertices[w] - pa).dot(&ab) / len_sq;
                    let foot = pa + ab * t;
                    let interior = t * len_sq.sqrt() > epsilon && (1.0 - t) * len_sq.sqrt() > epsilon;
                    (interior && (vertices[w] - foot).norm() <= epsilon).then_some((t, w))
                })
                .collect();
            inner.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
            refined.extend(inner.into_iter().map(|(_, w)| w));
        }
        *ids = refined;
    }
}

/// Convert position to spatial hash cell.
#[allow(clippy::cast_possible_truncation)]
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_weld_shares_vertices() {
        let cells = vec![
            (
                0,
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                ],
            ),
            (
                0,
                vec![
                    Point3::new(1.0 + 1e-12, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                    Point3::new(0.0, 0.0, 1e-12),
                ],
            ),
        ];
        let welded = weld_cells(&cells, 1e-9);
        assert_eq!(welded.vertices.len(), 4);
        assert_eq!(welded.loops[0].1, vec![0, 1, 2]);
        assert_eq!(welded.loops[1].1, vec![2, 3, 0]);
        // Representative keeps the first position seen.
        assert_eq!(welded.vertices[2], Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_weld_drops_collapsed_cells() {
        let cells = vec![(
            0,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1e-12, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
        )];
        let welded = weld_cells(&cells, 1e-9);
        assert!(welded.loops.is_empty());
    }

    #[test]
    fn test_t_junction_is_inserted() {
        // A square next to two half-height squares on the same plane.
        let cells = vec![
            (
                0,
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
            ),
            (
                0,
                vec![
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 0.5, 0.0),
                    Point3::new(1.0, 0.5, 0.0),
                ],
            ),
        ];
        let mut welded = weld_cells(&cells, 1e-9);
        let plane = Plane::new(Vector3::z(), 0.0).unwrap();
        split_t_junctions(&mut welded, &[(0, plane)], 1e-9);

        let mid = welded
            .vertices
            .iter()
            .position(|p| *p == Point3::new(1.0, 0.5, 0.0))
            .unwrap();
        assert_eq!(welded.loops[0].1, vec![0, 1, mid, 2, 3]);
        assert_eq!(welded.loops[1].1.len(), 4);
    }
}
