//! Depth-first branch and bound over binary variables.
//!
//! Each node fixes one free variable and propagates the consequences through
//! the rows using activity bounds: if forcing a variable one way would push a
//! row's minimum or maximum activity past its limits, the variable takes the
//! other value. A node whose objective lower bound (fixed cost plus every
//! negative coefficient still free) cannot beat the incumbent is pruned.
//!
//! Branching order is fixed up front (ascending objective coefficient, then
//! index), and a variable with a negative coefficient is tried `true` first.
//! The search is therefore fully deterministic.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use super::{Assignment, BinarySolver, IMPROVEMENT_EPSILON, SolveOutcome, SolveRequest};
use crate::program::{BinaryProgram, Domain, FEASIBILITY_TOLERANCE};

/// Exact branch-and-bound solver.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use recon_select::{
///     BinaryProgram, BinarySolver, BranchAndBound, Domain, LinearConstraint, Sense,
///     SolveOutcome, SolveRequest,
/// };
///
/// // Pick at most one of two items, preferring the cheaper one.
/// let mut program = BinaryProgram::new();
/// let a = program.add_variable(-1.0, Domain::Binary);
/// let b = program.add_variable(-3.0, Domain::Binary);
/// program.add_constraint(LinearConstraint::new(vec![(a, 1.0), (b, 1.0)], Sense::LessEqual, 1.0));
///
/// let outcome = BranchAndBound.solve(&SolveRequest::new(&program, Duration::from_secs(1)));
/// let SolveOutcome::Optimal(assignment) = outcome else { panic!("no optimum") };
/// assert_eq!(assignment.values, vec![false, true]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound;

impl BinarySolver for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch-and-bound"
    }

    fn solve(&self, request: &SolveRequest<'_>) -> SolveOutcome {
        let started = Instant::now();
        let deadline = started.checked_add(request.time_budget);
        let mut search = Search::new(request.program);
        let outcome = search.run(deadline);
        debug!(
            nodes = search.nodes,
            elapsed = ?started.elapsed(),
            outcome = outcome_name(&outcome),
            "Branch and bound finished"
        );
        outcome
    }
}

const fn outcome_name(outcome: &SolveOutcome) -> &'static str {
    match outcome {
        SolveOutcome::Optimal(_) => "optimal",
        SolveOutcome::Infeasible => "infeasible",
        SolveOutcome::Timeout => "timeout",
    }
}

/// A row as an activity range.
struct Row {
    terms: Vec<(usize, f64)>,
    lo: f64,
    hi: f64,
}

/// A branching decision that may still be flipped.
struct Frame {
    var: usize,
    /// Trail length before the decision.
    mark: usize,
    /// Value still to try, if any.
    alternative: Option<bool>,
}

struct Search<'a> {
    program: &'a BinaryProgram,
    rows: Vec<Row>,
    var_rows: Vec<Vec<usize>>,
    values: Vec<Option<bool>>,
    trail: Vec<usize>,
    order: Vec<usize>,
    /// Constant plus coefficients of variables fixed to `true`.
    fixed_cost: f64,
    /// Sum of the negative coefficients of unassigned variables.
    free_negative: f64,
    incumbent: Option<Assignment>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    nodes: u64,
}

impl<'a> Search<'a> {
    fn new(program: &'a BinaryProgram) -> Self {
        let n = program.variable_count();
        let rows: Vec<Row> = program
            .constraints()
            .iter()
            .map(|c| {
                let (lo, hi) = c.bounds();
                Row {
                    terms: c.terms.clone(),
                    lo,
                    hi,
                }
            })
            .collect();

        let mut var_rows = vec![Vec::new(); n];
        for (r, row) in rows.iter().enumerate() {
            for &(var, _) in &row.terms {
                if var_rows[var].last() != Some(&r) {
                    var_rows[var].push(r);
                }
            }
        }

        let objective = program.objective();
        let mut order: Vec<usize> = (0..n)
            .filter(|&j| program.domains()[j] == Domain::Binary)
            .collect();
        order.sort_by(|&a, &b| objective[a].total_cmp(&objective[b]).then(a.cmp(&b)));

        let row_count = rows.len();
        Self {
            program,
            rows,
            var_rows,
            values: vec![None; n],
            trail: Vec::with_capacity(n),
            order,
            fixed_cost: program.constant(),
            free_negative: objective.iter().map(|c| c.min(0.0)).sum(),
            incumbent: None,
            queue: VecDeque::with_capacity(row_count),
            queued: vec![false; row_count],
            nodes: 0,
        }
    }

    fn run(&mut self, deadline: Option<Instant>) -> SolveOutcome {
        for j in 0..self.values.len() {
            if let Domain::Fixed(value) = self.program.domains()[j] {
                self.assign(j, value);
            }
        }
        for r in 0..self.rows.len() {
            self.enqueue(r);
        }
        if !self.propagate() {
            return SolveOutcome::Infeasible;
        }

        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return SolveOutcome::Timeout;
            }
            self.nodes += 1;

            if !self.pruned() {
                if let Some(var) = self.next_free() {
                    let first = self.program.objective()[var] < 0.0;
                    stack.push(Frame {
                        var,
                        mark: self.trail.len(),
                        alternative: Some(!first),
                    });
                    if self.decide(var, first) {
                        continue;
                    }
                } else {
                    self.record_incumbent();
                }
            }

            if !self.backtrack(&mut stack) {
                break;
            }
        }

        match self.incumbent.take() {
            Some(assignment) => SolveOutcome::Optimal(assignment),
            None => SolveOutcome::Infeasible,
        }
    }

    /// Undo to the deepest decision with an untried value and try it.
    /// Returns `false` once the tree is exhausted.
    fn backtrack(&mut self, stack: &mut Vec<Frame>) -> bool {
        while let Some(frame) = stack.last_mut() {
            let (var, mark) = (frame.var, frame.mark);
            let alternative = frame.alternative.take();
            self.undo_to(mark);
            match alternative {
                Some(value) => {
                    if self.decide(var, value) && !self.pruned() {
                        return true;
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        false
    }

    fn decide(&mut self, var: usize, value: bool) -> bool {
        self.assign(var, value);
        self.propagate()
    }

    fn assign(&mut self, var: usize, value: bool) {
        let coef = self.program.objective()[var];
        self.values[var] = Some(value);
        self.trail.push(var);
        self.free_negative -= coef.min(0.0);
        if value {
            self.fixed_cost += coef;
        }
        for k in 0..self.var_rows[var].len() {
            let r = self.var_rows[var][k];
            self.enqueue(r);
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else {
                break;
            };
            let coef = self.program.objective()[var];
            if self.values[var].take() == Some(true) {
                self.fixed_cost -= coef;
            }
            self.free_negative += coef.min(0.0);
        }
    }

    fn enqueue(&mut self, row: usize) {
        if !self.queued[row] {
            self.queued[row] = true;
            self.queue.push_back(row);
        }
    }

    fn clear_queue(&mut self) {
        while let Some(r) = self.queue.pop_front() {
            self.queued[r] = false;
        }
    }

    /// Minimum and maximum activity of a row under the partial assignment.
    fn activity(&self, row: usize) -> (f64, f64) {
        let (mut min, mut max) = (0.0, 0.0);
        for &(var, coef) in &self.rows[row].terms {
            match self.values[var] {
                Some(true) => {
                    min += coef;
                    max += coef;
                }
                Some(false) => {}
                None if coef > 0.0 => max += coef,
                None => min += coef,
            }
        }
        (min, max)
    }

    /// Propagate queued rows to a fixed point; `false` on conflict.
    fn propagate(&mut self) -> bool {
        while let Some(r) = self.queue.pop_front() {
            self.queued[r] = false;
            let (lo, hi) = (self.rows[r].lo, self.rows[r].hi);
            let (mut min, mut max) = self.activity(r);
            if min > hi + FEASIBILITY_TOLERANCE || max < lo - FEASIBILITY_TOLERANCE {
                self.clear_queue();
                return false;
            }

            for k in 0..self.rows[r].terms.len() {
                let (var, coef) = self.rows[r].terms[k];
                if self.values[var].is_some() || coef == 0.0 {
                    continue;
                }
                let forced = if coef > 0.0 {
                    if min + coef > hi + FEASIBILITY_TOLERANCE {
                        Some(false)
                    } else if max - coef < lo - FEASIBILITY_TOLERANCE {
                        Some(true)
                    } else {
                        None
                    }
                } else if max + coef < lo - FEASIBILITY_TOLERANCE {
                    Some(false)
                } else if min - coef > hi + FEASIBILITY_TOLERANCE {
                    Some(true)
                } else {
                    None
                };

                if let Some(value) = forced {
                    self.assign(var, value);
                    (min, max) = self.activity(r);
                    if min > hi + FEASIBILITY_TOLERANCE || max < lo - FEASIBILITY_TOLERANCE {
                        self.clear_queue();
                        return false;
                    }
                }
            }
        }
        true
    }

    fn pruned(&self) -> bool {
        self.incumbent.as_ref().is_some_and(|best| {
            self.fixed_cost + self.free_negative >= best.objective - IMPROVEMENT_EPSILON
        })
    }

    fn next_free(&self) -> Option<usize> {
        self.order.iter().copied().find(|&j| self.values[j].is_none())
    }

    fn record_incumbent(&mut self) {
        let values: Vec<bool> = self.values.iter().map(|v| v.unwrap_or(false)).collect();
        if !self.program.is_feasible(&values) {
            return;
        }
        let objective = self.program.objective_value(&values);
        let improves = self
            .incumbent
            .as_ref()
            .map_or(true, |best| objective < best.objective - IMPROVEMENT_EPSILON);
        if improves {
            debug!(objective, nodes = self.nodes, "New incumbent");
            self.incumbent = Some(Assignment { values, objective });
        }
    }
}
