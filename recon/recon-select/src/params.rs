//! Parameters for face selection and mesh assembly.

use std::time::Duration;

use crate::solver::SolverBackend;

/// Parameters for face selection.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionParams {
    /// Solver backend. Default: branch and bound
    pub backend: SolverBackend,

    /// Wall-clock budget of the solver call. Default: 60 seconds
    pub time_budget: Duration,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            backend: SolverBackend::BranchAndBound,
            time_budget: Duration::from_secs(60),
        }
    }
}

impl SelectionParams {
    /// Create params with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the solver backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the time budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }
}

/// Parameters for turning a face selection into a polygon mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblyParams {
    /// Merge adjacent selected faces on the same supporting plane into one
    /// polygon. Default: true
    pub merge_coplanar: bool,

    /// Remove vertices that sit on a straight run between exactly two
    /// neighbors. Default: true
    pub dissolve_collinear: bool,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            merge_coplanar: true,
            dissolve_collinear: true,
        }
    }
}

impl AssemblyParams {
    /// Keep every selected arrangement face as its own polygon.
    #[must_use]
    pub const fn raw() -> Self {
        Self {
            merge_coplanar: false,
            dissolve_collinear: false,
        }
    }

    /// Enable or disable coplanar merging.
    #[must_use]
    pub const fn with_merge_coplanar(mut self, merge: bool) -> Self {
        self.merge_coplanar = merge;
        self
    }

    /// Enable or disable collinear vertex removal.
    #[must_use]
    pub const fn with_dissolve_collinear(mut self, dissolve: bool) -> Self {
        self.dissolve_collinear = dissolve;
        self
    }
}
