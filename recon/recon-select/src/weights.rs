//! Objective weights of the face selection.

use std::fmt;

use crate::error::{SelectResult, SelectionError};

/// How far the weight sum may stray from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative importance of the three objective terms.
///
/// - **data fitting**: prefer faces that explain many points closely;
/// - **model coverage**: penalize selected area that no point covers;
/// - **model complexity**: penalize selected area as such, favouring
///   compact models.
///
/// The weights must be non-negative and sum to 1 within
/// [`WEIGHT_SUM_TOLERANCE`].
///
/// # Example
///
/// ```
/// use recon_select::ObjectiveWeights;
///
/// let weights = ObjectiveWeights::new(0.43, 0.27, 0.30).unwrap();
/// assert!((weights.data_fitting() - 0.43).abs() < 1e-12);
///
/// assert!(ObjectiveWeights::new(0.5, 0.5, 0.0001).is_err());
/// assert!(ObjectiveWeights::new(1.2, -0.2, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveWeights {
    data_fitting: f64,
    model_coverage: f64,
    model_complexity: f64,
}

impl ObjectiveWeights {
    /// Check and create weights.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::InvalidWeights`] if a weight is negative or
    /// not finite, or if the sum differs from 1 by more than
    /// [`WEIGHT_SUM_TOLERANCE`].
    pub fn new(data_fitting: f64, model_coverage: f64, model_complexity: f64) -> SelectResult<Self> {
        for (name, value) in [
            ("data fitting", data_fitting),
            ("model coverage", model_coverage),
            ("model complexity", model_complexity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectionError::InvalidWeights {
                    reason: format!("{name} weight must be finite and >= 0, got {value}"),
                });
            }
        }
        let sum = data_fitting + model_coverage + model_complexity;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SelectionError::InvalidWeights {
                reason: format!("weights must sum to 1, got {sum}"),
            });
        }
        Ok(Self {
            data_fitting,
            model_coverage,
            model_complexity,
        })
    }

    /// Weight of the data fitting term.
    #[must_use]
    pub const fn data_fitting(&self) -> f64 {
        self.data_fitting
    }

    /// Weight of the model coverage term.
    #[must_use]
    pub const fn model_coverage(&self) -> f64 {
        self.model_coverage
    }

    /// Weight of the model complexity term.
    #[must_use]
    pub const fn model_complexity(&self) -> f64 {
        self.model_complexity
    }
}

impl Default for ObjectiveWeights {
    /// 0.43 / 0.27 / 0.30, a balance that works for most building scans.
    fn default() -> Self {
        Self {
            data_fitting: 0.43,
            model_coverage: 0.27,
            model_complexity: 0.30,
        }
    }
}

impl fmt::Display for ObjectiveWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fitting {:.4}, coverage {:.4}, complexity {:.4}",
            self.data_fitting, self.model_coverage, self.model_complexity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let d = ObjectiveWeights::default();
        assert!(ObjectiveWeights::new(d.data_fitting(), d.model_coverage(), d.model_complexity()).is_ok());
    }

    #[test]
    fn test_sum_within_tolerance() {
        assert!(ObjectiveWeights::new(0.5, 0.5, 5e-7).is_ok());
        assert!(ObjectiveWeights::new(0.5, 0.5, 0.0001).is_err());
        assert!(ObjectiveWeights::new(0.3, 0.3, 0.3).is_err());
    }

    #[test]
    fn test_rejects_negative_and_nan() {
        assert!(matches!(
            ObjectiveWeights::new(1.1, -0.1, 0.0),
            Err(SelectionError::InvalidWeights { .. })
        ));
        assert!(ObjectiveWeights::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_extreme_weights_are_allowed() {
        assert!(ObjectiveWeights::new(1.0, 0.0, 0.0).is_ok());
        assert!(ObjectiveWeights::new(0.0, 0.0, 1.0).is_ok());
    }
}
