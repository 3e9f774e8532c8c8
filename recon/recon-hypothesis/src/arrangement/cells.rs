//! Convex cells of one supporting plane.
//!
//! The cross-section of the bounding box with a plane is a convex polygon.
//! Cutting it by every other plane yields the plane's cells. All polygons are
//! vertex loops wound counter-clockwise around the plane normal; splitting
//! keeps that winding.

use nalgebra::{Point3, Vector3};
use recon_types::{Aabb, Plane};

/// Position of a vertex relative to a cutting plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Front,
    Back,
    On,
}

impl Side {
    fn classify(distance: f64, tolerance: f64) -> Self {
        if distance > tolerance {
            Self::Front
        } else if distance < -tolerance {
            Self::Back
        } else {
            Self::On
        }
    }
}

/// Outcome of splitting a polygon by a plane.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Split {
    /// No vertex behind the plane.
    Front,
    /// No vertex in front of the plane. Polygons lying on the plane land here.
    Back,
    /// Vertices strictly on both sides.
    Spanning {
        front: Vec<Point3<f64>>,
        back: Vec<Point3<f64>>,
    },
}

/// Split a convex polygon by the plane `normal·p + offset = 0`.
///
/// Vertices within `tolerance` of the plane are on it and go to both halves.
/// New vertices are placed where an edge crosses the plane.
pub(crate) fn split_polygon(
    polygon: &[Point3<f64>],
    normal: &Vector3<f64>,
    offset: f64,
    tolerance: f64,
) -> Split {
    let distances: Vec<f64> = polygon
        .iter()
        .map(|p| normal.dot(&p.coords) + offset)
        .collect();
    let sides: Vec<Side> = distances
        .iter()
        .map(|&d| Side::classify(d, tolerance))
        .collect();

    let has_front = sides.contains(&Side::Front);
    let has_back = sides.contains(&Side::Back);
    match (has_front, has_back) {
        (false, _) => return Split::Back,
        (true, false) => return Split::Front,
        (true, true) => {}
    }

    let n = polygon.len();
    let mut front = Vec::with_capacity(n + 1);
    let mut back = Vec::with_capacity(n + 1);
    for i in 0..n {
        let j = (i + 1) % n;
        let (pi, si, di) = (&polygon[i], sides[i], distances[i]);
        match si {
            Side::Front => front.push(*pi),
            Side::Back => back.push(*pi),
            Side::On => {
                front.push(*pi);
                back.push(*pi);
            }
        }

        let sj = sides[j];
        let crossing = matches!(
            (si, sj),
            (Side::Front, Side::Back) | (Side::Back, Side::Front)
        );
        if crossing {
            let dj = distances[j];
            let t = di / (di - dj);
            let x = pi + (polygon[j] - pi) * t;
            front.push(x);
            back.push(x);
        }
    }

    Split::Spanning { front, back }
}

/// Cross-section of `bounds` with `plane`, or `None` if the plane misses it.
pub(crate) fn cross_section(
    plane: &Plane,
    bounds: &Aabb,
    tolerance: f64,
) -> Option<Vec<Point3<f64>>> {
    let origin = plane.project(&bounds.center());
    let (u, v) = plane.basis();
    // A square of half-width one diagonal around the projected center covers
    // the whole cross-section.
    let half = bounds.diagonal().max(tolerance);

    let mut polygon = vec![
        origin - u * half - v * half,
        origin + u * half - v * half,
        origin + u * half + v * half,
        origin - u * half + v * half,
    ];

    for (normal, offset) in bounds.half_spaces() {
        match split_polygon(&polygon, &normal, offset, tolerance) {
            Split::Back => {}
            Split::Front => return None,
            Split::Spanning { back, .. } => polygon = back,
        }
        if polygon.len() < 3 {
            return None;
        }
    }

    Some(polygon)
}

/// Cut the cross-section of `plane` by each of `cutters`, in order.
pub(crate) fn cells_on_plane(
    plane: &Plane,
    cutters: &[&Plane],
    bounds: &Aabb,
    tolerance: f64,
) -> Vec<Vec<Point3<f64>>> {
    let Some(section) = cross_section(plane, bounds, tolerance) else {
        return Vec::new();
    };

    let mut cells = vec![section];
    for cutter in cutters {
        let mut next = Vec::with_capacity(cells.len() * 2);
        for cell in cells {
            match split_polygon(&cell, cutter.normal(), cutter.offset(), tolerance) {
                Split::Front | Split::Back => next.push(cell),
                Split::Spanning { front, back } => {
                    if back.len() >= 3 {
                        next.push(back);
                    }
                    if front.len() >= 3 {
                        next.push(front);
                    }
                }
            }
        }
        cells = next;
    }

    cells
}

/// Area-weighted normal of a polygon loop (Newell's method).
pub(crate) fn newell_normal(polygon: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = polygon.len();
    for i in 0..n {
        let p = &polygon[i];
        let q = &polygon[(i + 1) % n];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    normal
}

/// Area of a planar polygon loop.
pub(crate) fn polygon_area(polygon: &[Point3<f64>]) -> f64 {
    newell_normal(polygon).norm() * 0.5
}
