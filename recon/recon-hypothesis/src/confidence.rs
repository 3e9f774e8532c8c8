//! Face confidence: how well the input points support each candidate face.
//!
//! Every member point of a supporting plane is assigned to one face on that
//! plane: the face containing its projection, or else the nearest face. Per
//! face this gives
//!
//! - **fitting**: `1 - mean|d| / fitting_distance`, clamped to `[0, 1]`, where
//!   `d` is the point's distance to the plane;
//! - **coverage**: the fraction of a regular grid over the face that holds
//!   assigned points. The grid cell size scales with the mean
//!   nearest-neighbour spacing of the plane's points.
//!
//! Faces without assigned points get [`ConfidenceScore::UNSUPPORTED`].

use hashbrown::HashMap;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;
use rayon::prelude::*;
use recon_types::PointSet;
use tracing::{debug, info};

use crate::arrangement::Arrangement;
use crate::error::HypothesisResult;
use crate::params::ConfidenceParams;
use crate::refine::SupportingPlane;

/// Upper bound on coverage grid cells per face.
const MAX_GRID_CELLS: f64 = 1_048_576.0;

/// Support of one candidate face by the input points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceScore {
    /// Closeness of the assigned points to the face, in `[0, 1]`.
    pub fitting: f64,
    /// Fraction of the face area populated by points, in `[0, 1]`.
    pub coverage: f64,
    /// Number of assigned points.
    pub support: usize,
}

impl ConfidenceScore {
    /// Score of a face that no point was assigned to.
    pub const UNSUPPORTED: Self = Self {
        fitting: 0.0,
        coverage: 0.0,
        support: 0,
    };

    /// Whether any point was assigned to the face.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.support > 0
    }
}

/// Scores candidate faces against the source points.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceEvaluator {
    params: ConfidenceParams,
}

impl ConfidenceEvaluator {
    /// Create an evaluator.
    #[must_use]
    pub const fn new(params: ConfidenceParams) -> Self {
        Self { params }
    }

    /// Confidence parameters.
    #[must_use]
    pub const fn params(&self) -> &ConfidenceParams {
        &self.params
    }

    /// Score every face of `arrangement`; the result is indexed by face id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HypothesisError::InvalidParameter`] for out-of-range
    /// parameters.
    pub fn evaluate(
        &self,
        arrangement: &Arrangement,
        planes: &[SupportingPlane],
        points: &PointSet,
    ) -> HypothesisResult<Vec<ConfidenceScore>> {
        self.params.validate()?;

        let diagonal = points.bounds().diagonal();
        let fitting_distance = (self.params.fitting_distance_relative * diagonal).max(f64::MIN_POSITIVE);
        let tolerance = arrangement.tolerance();
        let mut scores = vec![ConfidenceScore::UNSUPPORTED; arrangement.faces().len()];

        info!(
            faces = scores.len(),
            planes = planes.len(),
            fitting_distance,
            "Evaluating face confidence"
        );

        for sp in planes {
            let faces: Vec<usize> = arrangement.faces_on_plane(sp.id).map(|f| f.id).collect();
            if faces.is_empty() || sp.members.is_empty() {
                continue;
            }

            let polygons: Vec<Vec<Point2<f64>>> = faces
                .iter()
                .map(|&f| {
                    arrangement.faces()[f]
                        .vertices
                        .iter()
                        .map(|&v| sp.plane.to_local(&arrangement.vertices()[v]))
                        .collect()
                })
                .collect();

            let samples: Vec<(Point2<f64>, f64)> = sp
                .members
                .iter()
                .filter_map(|&i| points.point(i))
                .map(|p| (sp.plane.to_local(&p.position), sp.plane.signed_distance(&p.position).abs()))
                .collect();

            let locate = |sample: &(Point2<f64>, f64)| locate_face(&polygons, &sample.0, tolerance);
            let owner: Vec<usize> = if self.params.parallel {
                samples.par_iter().map(locate).collect()
            } else {
                samples.iter().map(locate).collect()
            };

            let locals: Vec<Point2<f64>> = samples.iter().map(|s| s.0).collect();
            let cell_size = mean_spacing(&locals).map(|s| s * self.params.coverage_cell_factor);
            debug!(plane = sp.id, faces = faces.len(), points = samples.len(), ?cell_size, "Scoring plane");

            for (k, &face) in faces.iter().enumerate() {
                let assigned: Vec<usize> = (0..samples.len()).filter(|&i| owner[i] == k).collect();
                if assigned.is_empty() {
                    continue;
                }
                let mean_distance =
                    assigned.iter().map(|&i| samples[i].1).sum::<f64>() / assigned.len() as f64;
                let fitting = (1.0 - mean_distance / fitting_distance).clamp(0.0, 1.0);

                let coverage = match cell_size {
                    Some(h) if h > 0.0 => {
                        let members: Vec<Point2<f64>> = assigned.iter().map(|&i| samples[i].0).collect();
                        grid_coverage(&polygons[k], &members, h, self.params.coverage_min_points)
                    }
                    _ => 1.0,
                };

                scores[face] = ConfidenceScore {
                    fitting,
                    coverage,
                    support: assigned.len(),
                };
            }
        }

        info!(
            supported = scores.iter().filter(|s| s.is_supported()).count(),
            "Face confidence complete"
        );

        Ok(scores)
    }
}

/// Index of the polygon containing `q`, or of the nearest one. Lowest index
/// wins ties.
fn locate_face(polygons: &[Vec<Point2<f64>>], q: &Point2<f64>, tolerance: f64) -> usize {
    if let Some(k) = polygons.iter().position(|poly| contains(poly, q, tolerance)) {
        return k;
    }
    let mut best = (f64::INFINITY, 0);
    for (k, poly) in polygons.iter().enumerate() {
        let d = boundary_distance(poly, q);
        if d < best.0 {
            best = (d, k);
        }
    }
    best.1
}

/// Point-in-convex-polygon test for a counter-clockwise loop.
fn contains(polygon: &[Point2<f64>], q: &Point2<f64>, tolerance: f64) -> bool {
    let n = polygon.len();
    (0..n).all(|i| {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let edge = b - a;
        let cross = edge.x * (q.y - a.y) - edge.y * (q.x - a.x);
        cross >= -tolerance * edge.norm()
    })
}

fn boundary_distance(polygon: &[Point2<f64>], q: &Point2<f64>) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let a = polygon[i];
            let ab = polygon[(i + 1) % n] - a;
            let len_sq = ab.norm_squared();
            let t = if len_sq > 0.0 {
                ((q - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (q - (a + ab * t)).norm()
        })
        .fold(f64::INFINITY, f64::min)
}

/// Mean distance from each point to its nearest other point.
fn mean_spacing(points: &[Point2<f64>]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let mut kdtree: KdTree<f64, 2> = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        kdtree.add(&[p.x, p.y], i as u64);
    }

    let total: f64 = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            kdtree
                .nearest_n::<SquaredEuclidean>(&[p.x, p.y], 2)
                .into_iter()
                .find(|n| n.item != i as u64)
                .map_or(0.0, |n| n.distance.sqrt())
        })
        .sum();

    Some(total / points.len() as f64)
}

/// Fraction of grid cells centred inside `polygon` that hold at least
/// `min_points` of `points`. A polygon smaller than one cell counts as covered.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_coverage(polygon: &[Point2<f64>], points: &[Point2<f64>], cell_size: f64, min_points: usize) -> f64 {
    let (mut lo, mut hi) = (polygon[0], polygon[0]);
    for p in polygon {
        lo = Point2::new(lo.x.min(p.x), lo.y.min(p.y));
        hi = Point2::new(hi.x.max(p.x), hi.y.max(p.y));
    }
    let extent = hi - lo;

    let mut h = cell_size;
    let cells = (extent.x / h).ceil().max(1.0) * (extent.y / h).ceil().max(1.0);
    if cells > MAX_GRID_CELLS {
        h *= (cells / MAX_GRID_CELLS).sqrt();
    }
    let nx = (extent.x / h).ceil().max(1.0) as i64;
    let ny = (extent.y / h).ceil().max(1.0) as i64;

    let mut counts: HashMap<(i64, i64), usize> = HashMap::new();
    for p in points {
        let cell = (((p.x - lo.x) / h).floor() as i64, ((p.y - lo.y) / h).floor() as i64);
        *counts.entry(cell).or_default() += 1;
    }

    let (mut total, mut covered) = (0usize, 0usize);
    for ix in 0..nx {
        for iy in 0..ny {
            let centre = Point2::new(lo.x + (ix as f64 + 0.5) * h, lo.y + (iy as f64 + 0.5) * h);
            if !contains(polygon, &centre, 0.0) {
                continue;
            }
            total += 1;
            if counts.get(&(ix, iy)).copied().unwrap_or(0) >= min_points {
                covered += 1;
            }
        }
    }

    if total == 0 {
        return if points.is_empty() { 0.0 } else { 1.0 };
    }
    covered as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::ArrangementBuilder;
    use crate::params::RefineParams;
    use crate::refine::PlaneRefiner;
    use nalgebra::{Point3, Vector3};
    use recon_types::Point;

    /// Low-discrepancy samples of the unit square.
    fn r2_square(n: usize) -> Vec<(f64, f64)> {
        let g = 1.324_717_957_244_746;
        let (a1, a2) = (1.0 / g, 1.0 / (g * g));
        (1..=n)
            .map(|i| {
                let i = i as f64;
                ((0.5 + a1 * i).fract(), (0.5 + a2 * i).fract())
            })
            .collect()
    }

    /// Points on the six faces of the unit cube, one group per face.
    fn cube_points(n: usize, keep: impl Fn(f64, f64) -> bool) -> PointSet {
        let mut points = Vec::new();
        for axis in 0..3 {
            for (label_offset, level) in [(0u32, 0.0), (1, 1.0)] {
                let mut normal = Vector3::zeros();
                normal[axis] = if level > 0.5 { 1.0 } else { -1.0 };
                for (s, t) in r2_square(n) {
                    if !keep(s, t) {
                        continue;
                    }
                    let mut p = Point3::origin();
                    p[axis] = level;
                    p[(axis + 1) % 3] = s;
                    p[(axis + 2) % 3] = t;
                    let label = u32::try_from(axis).unwrap() * 2 + label_offset;
                    points.push(Point::new(p, normal, label));
                }
            }
        }
        PointSet::new(points)
    }

    fn evaluate(points: &PointSet) -> (Arrangement, Vec<ConfidenceScore>) {
        let planes = PlaneRefiner::new(RefineParams::default()).refine(points).unwrap();
        let arrangement = ArrangementBuilder::default()
            .build(&planes, &points.bounds())
            .unwrap();
        let scores = ConfidenceEvaluator::default()
            .evaluate(&arrangement, &planes, points)
            .unwrap();
        (arrangement, scores)
    }

    #[test]
    fn test_cube_faces_are_supported() {
        let points = cube_points(400, |_, _| true);
        let (arrangement, scores) = evaluate(&points);

        for face in arrangement.faces() {
            let score = scores[face.id];
            if face.enclosed {
                assert_eq!(score.support, 400);
                assert!(score.fitting > 0.999);
                assert!(score.coverage > 0.9, "coverage {}", score.coverage);
            } else {
                assert_eq!(score, ConfidenceScore::UNSUPPORTED);
            }
        }
    }

    #[test]
    fn test_partial_coverage() {
        let points = cube_points(400, |s, _| s < 0.5);
        let (arrangement, scores) = evaluate(&points);

        for face in arrangement.enclosed_faces() {
            let coverage = scores[face.id].coverage;
            assert!(coverage > 0.3 && coverage < 0.7, "coverage {coverage}");
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let points = cube_points(200, |_, _| true);
        let planes = PlaneRefiner::new(RefineParams::default()).refine(&points).unwrap();
        let arrangement = ArrangementBuilder::default()
            .build(&planes, &points.bounds())
            .unwrap();
        let parallel = ConfidenceEvaluator::default()
            .evaluate(&arrangement, &planes, &points)
            .unwrap();
        let sequential = ConfidenceEvaluator::new(ConfidenceParams::default().with_parallel(false))
            .evaluate(&arrangement, &planes, &points)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_locate_prefers_lowest_containing_face() {
        let left = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let right: Vec<_> = left.iter().map(|p| Point2::new(p.x + 1.0, p.y)).collect();
        let polygons = vec![left, right];

        // On the shared edge: both contain it, lowest wins.
        assert_eq!(locate_face(&polygons, &Point2::new(1.0, 0.5), 1e-9), 0);
        assert_eq!(locate_face(&polygons, &Point2::new(1.5, 0.5), 1e-9), 1);
        // Outside both: nearest.
        assert_eq!(locate_face(&polygons, &Point2::new(2.5, 0.5), 1e-9), 1);
    }

    #[test]
    fn test_tiny_face_is_covered_when_hit() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.01, 0.0),
            Point2::new(0.01, 0.01),
            Point2::new(0.0, 0.01),
        ];
        let coverage = grid_coverage(&square, &[Point2::new(0.005, 0.005)], 1.0, 1);
        assert!((coverage - 1.0).abs() < f64::EPSILON);
    }
}
