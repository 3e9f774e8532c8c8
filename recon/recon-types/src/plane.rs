//! Oriented plane equation.

use nalgebra::{Point2, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An oriented plane `normal·p + offset = 0` with a unit normal.
///
/// # Example
///
/// ```
/// use recon_types::{Plane, Point3, Vector3};
///
/// let plane = Plane::from_point_normal(&Point3::new(0.0, 0.0, 2.0), &Vector3::z()).unwrap();
/// assert!((plane.signed_distance(&Point3::new(5.0, 1.0, 3.0)) - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    normal: Vector3<f64>,
    offset: f64,
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and offset.
    ///
    /// The equation is rescaled so the normal has unit length. Returns `None`
    /// for zero-length or non-finite input.
    #[must_use]
    pub fn new(normal: Vector3<f64>, offset: f64) -> Option<Self> {
        let len = normal.norm();
        if !len.is_finite() || !offset.is_finite() || len < 1e-12 {
            return None;
        }
        Some(Self {
            normal: normal / len,
            offset: offset / len,
        })
    }

    /// Create the plane through `point` with the given normal.
    #[must_use]
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Option<Self> {
        let len = normal.norm();
        if !len.is_finite() || len < 1e-12 {
            return None;
        }
        let n = normal / len;
        Self::new(n, -n.dot(&point.coords))
    }

    /// Unit normal.
    #[inline]
    #[must_use]
    pub const fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Offset `d` of `n·p + d = 0`.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance of a point (positive on the normal side).
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) + self.offset
    }

    /// Orthogonal projection of a point onto the plane.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Point3<f64> {
        point - self.normal * self.signed_distance(point)
    }

    /// Plane with the opposite orientation.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Unsigned angle between the two planes' normals, in `[0, π/2]`.
    #[must_use]
    pub fn angle_to(&self, other: &Self) -> f64 {
        self.normal.dot(&other.normal).abs().clamp(0.0, 1.0).acos()
    }

    /// Point on the plane closest to the origin.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        Point3::from(-self.normal * self.offset)
    }

    /// Orthonormal in-plane basis `(u, v)` with `u × v = normal`.
    ///
    /// The basis depends only on the normal, so every caller sees the same
    /// 2D frame for a given plane.
    #[must_use]
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = helper.cross(&n).normalize();
        let v = n.cross(&u);
        (u, v)
    }

    /// Coordinates of a point in the plane's 2D frame (after projection).
    #[must_use]
    pub fn to_local(&self, point: &Point3<f64>) -> Point2<f64> {
        let (u, v) = self.basis();
        let rel = point - self.origin();
        Point2::new(rel.dot(&u), rel.dot(&v))
    }

    /// Lift 2D frame coordinates back onto the plane.
    #[must_use]
    pub fn from_local(&self, local: &Point2<f64>) -> Point3<f64> {
        let (u, v) = self.basis();
        self.origin() + u * local.x + v * local.y
    }
}
