//! Parameters of a full reconstruction.

use std::time::Duration;

use recon_hypothesis::{ArrangementParams, ConfidenceParams, RefineParams};
use recon_select::{AssemblyParams, ObjectiveWeights, SelectionParams, SolverBackend};

use crate::error::ReconResult;

/// Configuration of every reconstruction stage.
///
/// All configuration is passed explicitly; nothing is read from global state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use recon_pipeline::{ObjectiveWeights, ReconstructionParams, SolverBackend};
///
/// let params = ReconstructionParams::new(ObjectiveWeights::new(0.5, 0.3, 0.2).unwrap())
///     .with_backend(SolverBackend::Exhaustive)
///     .with_time_budget(Duration::from_secs(5));
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconstructionParams {
    /// Objective weights of the face selection.
    pub weights: ObjectiveWeights,
    /// Segment filtering and merging.
    pub refine: RefineParams,
    /// Plane arrangement construction.
    pub arrangement: ArrangementParams,
    /// Face confidence scoring.
    pub confidence: ConfidenceParams,
    /// Solver backend and time budget.
    pub selection: SelectionParams,
    /// Output polygon clean-up.
    pub assembly: AssemblyParams,
}

impl ReconstructionParams {
    /// Default stage parameters with the given weights.
    #[must_use]
    pub fn new(weights: ObjectiveWeights) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    /// Set the objective weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the refinement parameters.
    #[must_use]
    pub fn with_refine(mut self, refine: RefineParams) -> Self {
        self.refine = refine;
        self
    }

    /// Set the arrangement parameters.
    #[must_use]
    pub fn with_arrangement(mut self, arrangement: ArrangementParams) -> Self {
        self.arrangement = arrangement;
        self
    }

    /// Set the confidence parameters.
    #[must_use]
    pub fn with_confidence(mut self, confidence: ConfidenceParams) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the assembly parameters.
    #[must_use]
    pub const fn with_assembly(mut self, assembly: AssemblyParams) -> Self {
        self.assembly = assembly;
        self
    }

    /// Set the solver backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.selection.backend = backend;
        self
    }

    /// Set the solver time budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.selection.time_budget = budget;
        self
    }

    /// Run every stage on the calling thread.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.arrangement.parallel = false;
        self.confidence.parallel = false;
        self
    }

    /// Check every stage's parameters.
    ///
    /// The weights are re-checked as well, since deserialized weights have
    /// not passed through [`ObjectiveWeights::new`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconError::InvalidWeights`] or
    /// [`crate::ReconError::InvalidParameter`].
    pub fn validate(&self) -> ReconResult<()> {
        ObjectiveWeights::new(
            self.weights.data_fitting(),
            self.weights.model_coverage(),
            self.weights.model_complexity(),
        )?;
        self.refine.validate()?;
        self.arrangement.validate()?;
        self.confidence.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ReconstructionParams::default().validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let params = ReconstructionParams::default()
            .with_backend(SolverBackend::Exhaustive)
            .with_time_budget(Duration::from_millis(10))
            .with_refine(RefineParams::default().with_min_support(5))
            .sequential();
        assert_eq!(params.selection.backend, SolverBackend::Exhaustive);
        assert_eq!(params.selection.time_budget, Duration::from_millis(10));
        assert_eq!(params.refine.min_support, 5);
        assert!(!params.arrangement.parallel);
        assert!(!params.confidence.parallel);
    }

    #[test]
    fn test_invalid_stage_parameter() {
        let params =
            ReconstructionParams::default().with_refine(RefineParams::default().with_min_support(0));
        assert!(matches!(
            params.validate(),
            Err(crate::ReconError::InvalidParameter { .. })
        ));
    }
}
