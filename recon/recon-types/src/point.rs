//! Segmented point cloud.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Aabb;

/// A sample point with its normal and the planar segment it belongs to.
///
/// # Example
///
/// ```
/// use recon_types::{Point, Point3, Vector3};
///
/// let p = Point::new(Point3::new(1.0, 2.0, 3.0), Vector3::z(), 7);
/// assert_eq!(p.group, Some(7));
///
/// let q = Point::ungrouped(Point3::origin(), Vector3::x());
/// assert!(q.group.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// Position in space.
    pub position: Point3<f64>,
    /// Surface normal (may be zero if unknown).
    pub normal: Vector3<f64>,
    /// Label of the planar segment, if the point was segmented.
    pub group: Option<u32>,
}

impl Point {
    /// Create a segmented point.
    #[must_use]
    pub const fn new(position: Point3<f64>, normal: Vector3<f64>, group: u32) -> Self {
        Self {
            position,
            normal,
            group: Some(group),
        }
    }

    /// Create a point that belongs to no segment.
    #[must_use]
    pub const fn ungrouped(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            normal,
            group: None,
        }
    }
}

/// A planar segment: a label and the indices of its member points.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexGroup {
    /// Segment label as found on the points.
    pub label: u32,
    /// Indices into [`PointSet::points`], in input order.
    pub indices: Vec<usize>,
}

impl VertexGroup {
    /// Number of member points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// An immutable segmented point cloud.
///
/// Groups are derived from the point labels once at construction and are
/// ordered by ascending label.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSet {
    points: Vec<Point>,
    groups: Vec<VertexGroup>,
}

impl PointSet {
    /// Build a point set, collecting groups from the point labels.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        let mut by_label: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, point) in points.iter().enumerate() {
            if let Some(label) = point.group {
                by_label.entry(label).or_default().push(idx);
            }
        }
        let groups = by_label
            .into_iter()
            .map(|(label, indices)| VertexGroup { label, indices })
            .collect();
        Self { points, groups }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Point by index.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    /// Planar segments ordered by label.
    #[must_use]
    pub fn groups(&self) -> &[VertexGroup] {
        &self.groups
    }

    /// Number of points that belong to some segment.
    #[must_use]
    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(VertexGroup::len).sum()
    }

    /// Bounding box of all point positions.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.points.iter().map(|p| &p.position))
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
