//! Reference solver that enumerates every assignment.

use std::time::Instant;

use tracing::debug;

use super::{Assignment, BinarySolver, IMPROVEMENT_EPSILON, SolveOutcome, SolveRequest};
use crate::program::Domain;

/// Largest number of free variables that can be enumerated.
const MAX_FREE_VARIABLES: usize = 63;

/// Assignments tried between deadline checks.
const DEADLINE_STRIDE: u64 = 1024;

/// Brute-force solver.
///
/// Free variables are enumerated in lexicographic order (lowest index is the
/// most significant); the first assignment with the lowest objective wins.
/// Only usable for a few dozen free variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exhaustive;

impl BinarySolver for Exhaustive {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn solve(&self, request: &SolveRequest<'_>) -> SolveOutcome {
        let program = request.program;
        let started = Instant::now();
        let deadline = started.checked_add(request.time_budget);

        let free: Vec<usize> = (0..program.variable_count())
            .filter(|&j| program.domains()[j] == Domain::Binary)
            .collect();
        if free.len() > MAX_FREE_VARIABLES {
            debug!(free = free.len(), "Too many free variables to enumerate");
            return SolveOutcome::Timeout;
        }

        let mut values: Vec<bool> = program
            .domains()
            .iter()
            .map(|d| matches!(d, Domain::Fixed(true)))
            .collect();
        let k = free.len();
        let mut best: Option<Assignment> = None;

        for mask in 0..(1u64 << k) {
            if mask % DEADLINE_STRIDE == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                return SolveOutcome::Timeout;
            }
            for (bit, &var) in free.iter().enumerate() {
                values[var] = (mask >> (k - 1 - bit)) & 1 == 1;
            }
            if !program.is_feasible(&values) {
                continue;
            }
            let objective = program.objective_value(&values);
            if best
                .as_ref()
                .map_or(true, |b| objective < b.objective - IMPROVEMENT_EPSILON)
            {
                best = Some(Assignment {
                    values: values.clone(),
                    objective,
                });
            }
        }

        debug!(free = k, elapsed = ?started.elapsed(), "Enumeration finished");
        best.map_or(SolveOutcome::Infeasible, SolveOutcome::Optimal)
    }
}
