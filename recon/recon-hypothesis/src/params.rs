//! Parameters for hypothesis generation.
//!
//! Distances are given relative to the bounding-box diagonal of the input
//! points, so the same parameters work for models of any scale.

use crate::error::{HypothesisError, HypothesisResult};

/// Parameters for supporting plane refinement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefineParams {
    /// Minimum number of member points a segment needs. Default: 40
    pub min_support: usize,

    /// Maximum RMS distance of members to their fitted plane, relative to
    /// the diagonal. Default: 0.05
    pub max_residual_relative: f64,

    /// Maximum angle in radians between two planes that may be merged.
    /// Default: 10 degrees
    pub merge_angle: f64,

    /// Maximum mean distance of one segment's points to the other segment's
    /// plane for a merge, relative to the diagonal. Default: 0.01
    pub merge_distance_relative: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            min_support: 40,
            max_residual_relative: 0.05,
            merge_angle: 10.0_f64.to_radians(),
            merge_distance_relative: 0.01,
        }
    }
}

impl RefineParams {
    /// Create params with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Params that keep every segment apart (no merging).
    #[must_use]
    pub fn without_merging() -> Self {
        Self {
            merge_angle: 0.0,
            merge_distance_relative: 0.0,
            ..Default::default()
        }
    }

    /// Set the minimum support.
    #[must_use]
    pub const fn with_min_support(mut self, min_support: usize) -> Self {
        self.min_support = min_support;
        self
    }

    /// Set the relative residual limit.
    #[must_use]
    pub const fn with_max_residual(mut self, relative: f64) -> Self {
        self.max_residual_relative = relative;
        self
    }

    /// Set the merge angle in radians.
    #[must_use]
    pub const fn with_merge_angle(mut self, radians: f64) -> Self {
        self.merge_angle = radians;
        self
    }

    /// Set the relative merge distance.
    #[must_use]
    pub const fn with_merge_distance(mut self, relative: f64) -> Self {
        self.merge_distance_relative = relative;
        self
    }

    /// Check that every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`HypothesisError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> HypothesisResult<()> {
        if self.min_support < 3 {
            return Err(invalid(format!(
                "min_support must be at least 3, got {}",
                self.min_support
            )));
        }
        non_negative("max_residual_relative", self.max_residual_relative)?;
        non_negative("merge_angle", self.merge_angle)?;
        non_negative("merge_distance_relative", self.merge_distance_relative)
    }
}

/// Parameters for the plane arrangement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrangementParams {
    /// Inflation of the bounding box on every side, relative to the diagonal.
    /// Default: 0.05
    pub bbox_margin: f64,

    /// Vertex snapping and on-plane tolerance, relative to the diagonal.
    /// Default: 1e-6
    pub snap_tolerance_relative: f64,

    /// Planes closer than this angle (radians) are treated as parallel.
    /// Default: 1e-3
    pub parallel_angle: f64,

    /// Build per-plane cells on the rayon pool. Default: true
    pub parallel: bool,
}

impl Default for ArrangementParams {
    fn default() -> Self {
        Self {
            bbox_margin: 0.05,
            snap_tolerance_relative: 1e-6,
            parallel_angle: 1e-3,
            parallel: true,
        }
    }
}

impl ArrangementParams {
    /// Create params with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounding box margin.
    #[must_use]
    pub const fn with_bbox_margin(mut self, relative: f64) -> Self {
        self.bbox_margin = relative;
        self
    }

    /// Set the relative snap tolerance.
    #[must_use]
    pub const fn with_snap_tolerance(mut self, relative: f64) -> Self {
        self.snap_tolerance_relative = relative;
        self
    }

    /// Enable or disable the rayon pool.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`HypothesisError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> HypothesisResult<()> {
        non_negative("bbox_margin", self.bbox_margin)?;
        positive("snap_tolerance_relative", self.snap_tolerance_relative)?;
        non_negative("parallel_angle", self.parallel_angle)
    }
}

/// Parameters for face confidence scoring.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceParams {
    /// Mean point distance at which the fitting score reaches zero, relative
    /// to the diagonal. Default: 0.01
    pub fitting_distance_relative: f64,

    /// Coverage grid cell size as a multiple of the mean nearest-neighbour
    /// spacing of the plane's points. Default: 3.0
    pub coverage_cell_factor: f64,

    /// Points a grid cell needs to count as covered. Default: 1
    pub coverage_min_points: usize,

    /// Assign points to faces on the rayon pool. Default: true
    pub parallel: bool,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            fitting_distance_relative: 0.01,
            coverage_cell_factor: 3.0,
            coverage_min_points: 1,
            parallel: true,
        }
    }
}

impl ConfidenceParams {
    /// Create params with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative fitting distance.
    #[must_use]
    pub const fn with_fitting_distance(mut self, relative: f64) -> Self {
        self.fitting_distance_relative = relative;
        self
    }

    /// Set the coverage cell factor.
    #[must_use]
    pub const fn with_coverage_cell_factor(mut self, factor: f64) -> Self {
        self.coverage_cell_factor = factor;
        self
    }

    /// Enable or disable the rayon pool.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`HypothesisError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> HypothesisResult<()> {
        positive("fitting_distance_relative", self.fitting_distance_relative)?;
        positive("coverage_cell_factor", self.coverage_cell_factor)?;
        if self.coverage_min_points == 0 {
            return Err(invalid("coverage_min_points must be at least 1".to_string()));
        }
        Ok(())
    }
}

const fn invalid(reason: String) -> HypothesisError {
    HypothesisError::InvalidParameter { reason }
}

fn non_negative(name: &str, value: f64) -> HypothesisResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and >= 0, got {value}")))
    }
}

fn positive(name: &str, value: f64) -> HypothesisResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and > 0, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RefineParams::default().validate().is_ok());
        assert!(ArrangementParams::default().validate().is_ok());
        assert!(ConfidenceParams::default().validate().is_ok());
    }

    #[test]
    fn test_refine_builder() {
        let params = RefineParams::new()
            .with_min_support(10)
            .with_merge_angle(0.2)
            .with_merge_distance(0.02);
        assert_eq!(params.min_support, 10);
        assert!((params.merge_angle - 0.2).abs() < 1e-12);
        assert!((params.merge_distance_relative - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_without_merging() {
        let params = RefineParams::without_merging();
        assert!(params.merge_angle.abs() < f64::EPSILON);
        assert_eq!(params.min_support, 40);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RefineParams::new().with_min_support(2).validate().is_err());
        assert!(ArrangementParams::new()
            .with_snap_tolerance(0.0)
            .validate()
            .is_err());
        assert!(ArrangementParams::new()
            .with_bbox_margin(f64::NAN)
            .validate()
            .is_err());
        assert!(ConfidenceParams::new()
            .with_coverage_cell_factor(-1.0)
            .validate()
            .is_err());
    }
}
