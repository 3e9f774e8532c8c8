//! Solver contract and the bundled backends.
//!
//! The selection stage talks to a solver through one request/response call:
//! [`BinarySolver::solve`] takes a [`SolveRequest`] (program and time budget)
//! and returns a [`SolveOutcome`]. Any backend implementing the trait can be
//! plugged in.

mod branch_bound;
mod exhaustive;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::program::BinaryProgram;

pub use branch_bound::BranchAndBound;
pub use exhaustive::Exhaustive;

/// Improvement an incumbent must exceed to be replaced.
pub(crate) const IMPROVEMENT_EPSILON: f64 = 1e-12;

/// One solve call.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    /// Program to minimize.
    pub program: &'a BinaryProgram,
    /// Wall-clock budget for the call.
    pub time_budget: Duration,
}

impl<'a> SolveRequest<'a> {
    /// Create a request.
    #[must_use]
    pub const fn new(program: &'a BinaryProgram, time_budget: Duration) -> Self {
        Self {
            program,
            time_budget,
        }
    }
}

/// An optimal assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Value of every variable.
    pub values: Vec<bool>,
    /// Objective value of `values`.
    pub objective: f64,
}

/// Response to a [`SolveRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// A proven optimum.
    Optimal(Assignment),
    /// No feasible assignment exists.
    Infeasible,
    /// The budget ran out first.
    Timeout,
}

/// A backend that minimizes binary programs.
pub trait BinarySolver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Minimize `request.program` within `request.time_budget`.
    fn solve(&self, request: &SolveRequest<'_>) -> SolveOutcome;
}

/// Bundled solver backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverBackend {
    /// Depth-first branch and bound with constraint propagation.
    #[default]
    BranchAndBound,
    /// Enumeration of every assignment; for small programs and testing.
    Exhaustive,
}

impl SolverBackend {
    /// Instantiate the backend.
    #[must_use]
    pub fn solver(self) -> Box<dyn BinarySolver> {
        match self {
            Self::BranchAndBound => Box::new(BranchAndBound),
            Self::Exhaustive => Box::new(Exhaustive),
        }
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchAndBound => f.write_str("branch-and-bound"),
            Self::Exhaustive => f.write_str("exhaustive"),
        }
    }
}

impl FromStr for SolverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "branch-and-bound" | "bnb" => Ok(Self::BranchAndBound),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(format!(
                "unknown solver '{other}' (expected 'branch-and-bound' or 'exhaustive')"
            )),
        }
    }
}
