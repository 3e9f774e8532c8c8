//! Supporting plane refinement.
//!
//! Each vertex group is fitted with a least-squares plane. Groups that are too
//! small, too noisy or degenerate are dropped, and nearly coplanar groups are
//! merged so that every physical plane is represented once.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use recon_types::{Plane, PointSet};
use tracing::{debug, info, warn};

use crate::error::{HypothesisError, HypothesisResult};
use crate::params::RefineParams;

/// A refined planar segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupportingPlane {
    /// Dense index among the surviving planes.
    pub id: usize,
    /// Fitted plane, oriented along the mean point normal.
    pub plane: Plane,
    /// Indices of the member points in the source [`PointSet`].
    pub members: Vec<usize>,
    /// Labels of the vertex groups merged into this plane, ascending.
    pub labels: Vec<u32>,
    /// Root mean square distance of the members to `plane`.
    pub rms_residual: f64,
}

impl SupportingPlane {
    /// Number of member points.
    #[must_use]
    pub fn support(&self) -> usize {
        self.members.len()
    }
}

/// Result of a least-squares plane fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFit {
    /// Fitted plane.
    pub plane: Plane,
    /// Root mean square distance of the fitted points.
    pub rms_residual: f64,
}

/// Fit a plane to a subset of points by PCA.
///
/// The normal is the eigenvector of the smallest covariance eigenvalue,
/// flipped to agree with the mean of the point normals. When the point
/// normals cancel out, the largest normal component is made positive.
///
/// Returns `None` for fewer than three points or for collinear or coincident
/// positions.
#[must_use]
pub fn fit_plane(points: &PointSet, members: &[usize]) -> Option<PlaneFit> {
    let selected: Vec<_> = members.iter().filter_map(|&i| points.point(i)).collect();
    if selected.len() < 3 {
        return None;
    }

    let n = selected.len() as f64;
    let centroid: Vector3<f64> = selected.iter().map(|p| p.position.coords).sum::<Vector3<f64>>() / n;

    let mut cov = Matrix3::zeros();
    for p in &selected {
        let diff = p.position.coords - centroid;
        cov += diff * diff.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let middle = eigen.eigenvalues[order[1]];
    let largest = eigen.eigenvalues[order[2]];
    if largest <= 0.0 || middle <= 1e-10 * largest {
        return None;
    }

    let column = eigen.eigenvectors.column(order[0]);
    let mut normal = Vector3::new(column[0], column[1], column[2]);

    let mean_normal: Vector3<f64> = selected.iter().map(|p| p.normal).sum();
    let reference = if mean_normal.norm() > 1e-12 {
        mean_normal
    } else {
        // Orientation is arbitrary: pick the dominant axis.
        let imax = normal.iamax();
        let mut axis = Vector3::zeros();
        axis[imax] = 1.0;
        axis
    };
    if normal.dot(&reference) < 0.0 {
        normal = -normal;
    }

    let plane = Plane::new(normal, -normal.dot(&centroid))?;
    let sum_sq: f64 = selected
        .iter()
        .map(|p| plane.signed_distance(&p.position).powi(2))
        .sum();

    Some(PlaneFit {
        plane,
        rms_residual: (sum_sq / n).sqrt(),
    })
}

/// Turns vertex groups into supporting planes.
///
/// # Example
///
/// ```
/// use recon_hypothesis::{PlaneRefiner, RefineParams};
/// use recon_types::{Point, PointSet, Point3, Vector3};
///
/// let points: Vec<Point> = (0..10)
///     .flat_map(|i| (0..10).map(move |j| {
///         Point::new(Point3::new(f64::from(i), f64::from(j), 2.0), Vector3::z(), 0)
///     }))
///     .collect();
/// let set = PointSet::new(points);
///
/// let planes = PlaneRefiner::new(RefineParams::default().with_min_support(10))
///     .refine(&set)
///     .unwrap();
/// assert_eq!(planes.len(), 1);
/// assert!((planes[0].plane.normal().z - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlaneRefiner {
    params: RefineParams,
}

/// A segment while refinement is in progress.
struct Segment {
    fit: PlaneFit,
    members: Vec<usize>,
    labels: Vec<u32>,
}

impl PlaneRefiner {
    /// Create a refiner.
    #[must_use]
    pub const fn new(params: RefineParams) -> Self {
        Self { params }
    }

    /// Refinement parameters.
    #[must_use]
    pub const fn params(&self) -> &RefineParams {
        &self.params
    }

    /// Fit, filter and merge the vertex groups of `points`.
    ///
    /// Groups are visited in ascending label order and the surviving planes
    /// get dense ids in that order.
    ///
    /// # Errors
    ///
    /// - [`HypothesisError::InvalidParameter`] for out-of-range parameters.
    /// - [`HypothesisError::InsufficientSegments`] if no group survives.
    pub fn refine(&self, points: &PointSet) -> HypothesisResult<Vec<SupportingPlane>> {
        self.params.validate()?;

        let diagonal = points.bounds().diagonal();
        let max_residual = self.params.max_residual_relative * diagonal;
        let merge_distance = self.params.merge_distance_relative * diagonal;
        let groups = points.groups();

        info!(
            groups = groups.len(),
            points = points.len(),
            "Refining planar segments"
        );

        let mut segments = Vec::with_capacity(groups.len());
        for group in groups {
            if group.len() < self.params.min_support {
                debug!(
                    label = group.label,
                    members = group.len(),
                    min_support = self.params.min_support,
                    "Dropping under-supported segment"
                );
                continue;
            }
            let Some(fit) = fit_plane(points, &group.indices) else {
                debug!(label = group.label, "Dropping degenerate segment");
                continue;
            };
            if fit.rms_residual > max_residual {
                debug!(
                    label = group.label,
                    rms = fit.rms_residual,
                    max_residual,
                    "Dropping noisy segment"
                );
                continue;
            }
            segments.push(Segment {
                fit,
                members: group.indices.clone(),
                labels: vec![group.label],
            });
        }

        if segments.is_empty() {
            return Err(HypothesisError::InsufficientSegments {
                groups: groups.len(),
                min_support: self.params.min_support,
            });
        }

        let fitted = segments.len();
        merge_coplanar(points, &mut segments, self.params.merge_angle, merge_distance);

        let planes: Vec<SupportingPlane> = segments
            .into_iter()
            .enumerate()
            .map(|(id, s)| SupportingPlane {
                id,
                plane: s.fit.plane,
                members: s.members,
                labels: s.labels,
                rms_residual: s.fit.rms_residual,
            })
            .collect();

        info!(
            fitted,
            merged = fitted - planes.len(),
            planes = planes.len(),
            "Plane refinement complete"
        );

        Ok(planes)
    }
}

/// Repeatedly merge the most parallel qualifying pair until none is left.
fn merge_coplanar(
    points: &PointSet,
    segments: &mut Vec<Segment>,
    max_angle: f64,
    max_distance: f64,
) {
    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                let angle = segments[i].fit.plane.angle_to(&segments[j].fit.plane);
                if angle > max_angle || best.is_some_and(|(a, _, _)| angle >= a) {
                    continue;
                }
                let d_ij = mean_distance(points, &segments[i].members, &segments[j].fit.plane);
                let d_ji = mean_distance(points, &segments[j].members, &segments[i].fit.plane);
                if d_ij > max_distance || d_ji > max_distance {
                    continue;
                }
                best = Some((angle, i, j));
            }
        }

        let Some((angle, i, j)) = best else {
            return;
        };

        let mut members = segments[i].members.clone();
        members.extend_from_slice(&segments[j].members);
        let Some(fit) = fit_plane(points, &members) else {
            warn!(i, j, "Merged segment is degenerate; stopping merge");
            return;
        };

        let absorbed = segments.remove(j);
        let target = &mut segments[i];
        debug!(
            labels = ?target.labels,
            absorbed = ?absorbed.labels,
            angle,
            "Merging coplanar segments"
        );
        target.fit = fit;
        target.members = members;
        target.labels.extend(absorbed.labels);
        target.labels.sort_unstable();
    }
}

fn mean_distance(points: &PointSet, members: &[usize], plane: &Plane) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let total: f64 = members
        .iter()
        .filter_map(|&i| points.point(i))
        .map(|p| plane.signed_distance(&p.position).abs())
        .sum();
    total / members.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use recon_types::{Point, Point3};

    /// An `n × n` grid on `z = height` with the given label and normal sign.
    fn grid(label: u32, height: f64, n: u32, up: bool) -> Vec<Point> {
        let normal = if up { Vector3::z() } else { -Vector3::z() };
        (0..n)
            .flat_map(|i| {
                (0..n).map(move |j| {
                    Point::new(
                        Point3::new(f64::from(i) / f64::from(n), f64::from(j) / f64::from(n), height),
                        normal,
                        label,
                    )
                })
            })
            .collect()
    }

    fn params() -> RefineParams {
        RefineParams::default().with_min_support(10)
    }

    #[test]
    fn test_fit_plane_follows_normals() {
        let set = PointSet::new(grid(0, 0.5, 8, false));
        let all: Vec<usize> = (0..set.len()).collect();
        let fit = fit_plane(&set, &all).unwrap();
        assert_relative_eq!(fit.plane.normal().z, -1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.plane.signed_distance(&Point3::new(0.0, 0.0, 0.5)), 0.0, epsilon = 1e-9);
        assert!(fit.rms_residual < 1e-9);
    }

    #[test]
    fn test_fit_plane_rejects_collinear() {
        let points: Vec<Point> = (0..10)
            .map(|i| Point::new(Point3::new(f64::from(i), 0.0, 0.0), Vector3::z(), 0))
            .collect();
        let set = PointSet::new(points);
        let all: Vec<usize> = (0..set.len()).collect();
        assert!(fit_plane(&set, &all).is_none());
        assert!(fit_plane(&set, &[0, 1]).is_none());
    }

    #[test]
    fn test_drops_small_groups() {
        let mut points = grid(0, 0.0, 6, true);
        points.extend(grid(1, 1.0, 2, true));
        let set = PointSet::new(points);

        let planes = PlaneRefiner::new(params()).refine(&set).unwrap();
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].labels, vec![0]);
        assert_eq!(planes[0].id, 0);
    }

    #[test]
    fn test_insufficient_segments() {
        let set = PointSet::new(grid(0, 0.0, 2, true));
        let err = PlaneRefiner::new(params()).refine(&set).unwrap_err();
        assert!(matches!(
            err,
            HypothesisError::InsufficientSegments {
                groups: 1,
                min_support: 10
            }
        ));
    }

    #[test]
    fn test_merges_coplanar_groups() {
        let mut points = grid(3, 0.0, 6, true);
        let mut shifted = grid(1, 0.0, 6, true);
        for p in &mut shifted {
            p.position.x += 2.0;
        }
        points.extend(shifted);
        let set = PointSet::new(points);

        let planes = PlaneRefiner::new(params()).refine(&set).unwrap();
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].labels, vec![1, 3]);
        assert_eq!(planes[0].support(), 72);
    }

    #[test]
    fn test_keeps_parallel_offset_groups() {
        let mut points = grid(0, 0.0, 6, true);
        points.extend(grid(1, 1.0, 6, true));
        let set = PointSet::new(points);

        let planes = PlaneRefiner::new(params()).refine(&set).unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[1].id, 1);
    }

    #[test]
    fn test_without_merging_keeps_tilted_groups() {
        let mut points = grid(0, 0.0, 6, true);
        let mut tilted = grid(1, 0.0, 6, true);
        for p in &mut tilted {
            p.position.z = 0.01 * p.position.x;
        }
        points.extend(tilted);
        let set = PointSet::new(points);

        let merged = PlaneRefiner::new(params()).refine(&set).unwrap();
        assert_eq!(merged.len(), 1);

        let separate = PlaneRefiner::new(RefineParams::without_merging().with_min_support(10))
            .refine(&set)
            .unwrap();
        assert_eq!(separate.len(), 2);
    }
}
