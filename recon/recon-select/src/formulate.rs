//! Face selection as a constrained binary program.
//!
//! Every candidate face gets a variable `x_f`, every interior edge a helper
//! variable `y_e`. With `A` the total candidate area, `N` the number of
//! points assigned to faces and `s_f = support_f / N`, the objective is
//!
//! ```text
//! λ_fit  · Σ s_f · ((1 - fitting_f)·x_f + (1 - x_f))
//! λ_cov  · Σ (1 - coverage_f) · (area_f / A) · x_f
//! λ_cplx · Σ (area_f / A) · x_f
//! ```
//!
//! The first term charges a point that is explained by a selected face for
//! its residual and a point left unexplained in full, so discarding
//! well-supported faces is never free. The constraints are
//!
//! - `Σ_{f ∋ e} x_f - 2·y_e = 0` for every interior edge (0 or 2 faces),
//! - `y_e - Σ_{e' ≠ e} y_{e'} <= 0` over the interior edges at every vertex
//!   (no used edge ends at a vertex alone),
//! - `Σ_{f ∈ S} x_f <= |S| - 1` for every fan separation `S` (two separate
//!   fans never meet at one vertex),
//! - `x_f = 0` for every face outside the enclosed part of the arrangement.

use std::time::{Duration, Instant};

use recon_hypothesis::{Arrangement, ConfidenceScore, ManifoldConstraints};
use tracing::{debug, info, warn};

use crate::error::{FailureReason, SelectResult, SelectionError};
use crate::program::{BinaryProgram, Domain, LinearConstraint, Sense};
use crate::solver::{BinarySolver, SolveOutcome, SolveRequest};
use crate::weights::ObjectiveWeights;

/// The binary program of one face selection, with the variable layout.
#[derive(Debug, Clone)]
pub struct SelectionProblem {
    program: BinaryProgram,
    face_vars: Vec<usize>,
    edge_vars: Vec<(usize, usize)>,
}

impl SelectionProblem {
    /// The program to minimize.
    #[must_use]
    pub const fn program(&self) -> &BinaryProgram {
        &self.program
    }

    /// Variable index of each face, by face id.
    #[must_use]
    pub fn face_variables(&self) -> &[usize] {
        &self.face_vars
    }

    /// `(edge id, variable index)` of each interior edge, ascending edge id.
    #[must_use]
    pub fn edge_variables(&self) -> &[(usize, usize)] {
        &self.edge_vars
    }
}

/// The solved face selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    /// Whether each face is part of the model, by face id.
    pub selected: Vec<bool>,
    /// Objective value of the optimum.
    pub objective: f64,
}

impl SelectionResult {
    /// Number of selected faces.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Ids of the selected faces, ascending.
    pub fn selected_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected
            .iter()
            .enumerate()
            .filter_map(|(f, &s)| s.then_some(f))
    }
}

/// Builds and solves the face selection program.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use recon_hypothesis::{AdjacencyGraph, ArrangementBuilder, ConfidenceScore, SupportingPlane};
/// use recon_select::{BranchAndBound, ObjectiveWeights, SelectionFormulator};
/// use recon_types::{Aabb, Plane, Point3, Vector3};
///
/// let planes: Vec<SupportingPlane> = [
///     (Vector3::x(), 0.0), (Vector3::x(), -1.0),
///     (Vector3::y(), 0.0), (Vector3::y(), -1.0),
///     (Vector3::z(), 0.0), (Vector3::z(), -1.0),
/// ]
/// .into_iter()
/// .enumerate()
/// .map(|(id, (n, d))| SupportingPlane {
///     id,
///     plane: Plane::new(n, d).unwrap(),
///     members: Vec::new(),
///     labels: vec![id as u32],
///     rms_residual: 0.0,
/// })
/// .collect();
/// let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let arrangement = ArrangementBuilder::default().build(&planes, &bounds).unwrap();
/// let constraints = AdjacencyGraph::build(&arrangement).constraints();
///
/// // Every enclosed face is perfectly explained by 100 points.
/// let scores: Vec<ConfidenceScore> = arrangement
///     .faces()
///     .iter()
///     .map(|f| if f.enclosed {
///         ConfidenceScore { fitting: 1.0, coverage: 1.0, support: 100 }
///     } else {
///         ConfidenceScore::UNSUPPORTED
///     })
///     .collect();
///
/// let formulator = SelectionFormulator::new(ObjectiveWeights::default());
/// let problem = formulator.formulate(&arrangement, &scores, &constraints).unwrap();
/// let result = formulator
///     .solve(&problem, &BranchAndBound, Duration::from_secs(10))
///     .unwrap();
/// assert_eq!(result.selected_count(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectionFormulator {
    weights: ObjectiveWeights,
}

impl SelectionFormulator {
    /// Create a formulator with the given objective weights.
    #[must_use]
    pub const fn new(weights: ObjectiveWeights) -> Self {
        Self { weights }
    }

    /// The objective weights.
    #[must_use]
    pub const fn weights(&self) -> &ObjectiveWeights {
        &self.weights
    }

    /// Build the selection program.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::InvalidProgram`] if `scores` does not have
    /// one entry per candidate face, if the arrangement has no area, or if
    /// the constraints refer to unknown faces or edges.
    pub fn formulate(
        &self,
        arrangement: &Arrangement,
        scores: &[ConfidenceScore],
        constraints: &ManifoldConstraints,
    ) -> SelectResult<SelectionProblem> {
        let faces = arrangement.faces();
        if scores.len() != faces.len() {
            return Err(SelectionError::InvalidProgram {
                reason: format!("{} scores for {} candidate faces", scores.len(), faces.len()),
            });
        }
        let total_area = arrangement.total_area();
        if !total_area.is_finite() || total_area <= 0.0 {
            return Err(SelectionError::InvalidProgram {
                reason: "candidate faces have no area".to_string(),
            });
        }
        let total_support = scores.iter().map(|s| s.support).sum::<usize>() as f64;

        let mut fixed = vec![false; faces.len()];
        for &f in &constraints.rejected_faces {
            let slot = fixed.get_mut(f).ok_or_else(|| SelectionError::InvalidProgram {
                reason: format!("rejected face {f} does not exist"),
            })?;
            *slot = true;
        }

        let w = &self.weights;
        let mut program = BinaryProgram::new();
        let mut face_vars = Vec::with_capacity(faces.len());
        for (face, score) in faces.iter().zip(scores) {
            let share = if total_support > 0.0 {
                score.support as f64 / total_support
            } else {
                0.0
            };
            let area = face.area / total_area;
            let coefficient = -w.data_fitting() * share * score.fitting
                + w.model_coverage() * (1.0 - score.coverage) * area
                + w.model_complexity() * area;
            program.add_constant(w.data_fitting() * share);

            let domain = if fixed[face.id] {
                Domain::Fixed(false)
            } else {
                Domain::Binary
            };
            face_vars.push(program.add_variable(coefficient, domain));
        }

        let mut edge_var = vec![None; arrangement.edges().len()];
        let mut edge_vars = Vec::with_capacity(constraints.edge_parity.len());
        for parity in &constraints.edge_parity {
            if parity.edge >= edge_var.len() {
                return Err(SelectionError::InvalidProgram {
                    reason: format!("parity record for unknown edge {}", parity.edge),
                });
            }
            let y = program.add_variable(0.0, Domain::Binary);
            edge_var[parity.edge] = Some(y);
            edge_vars.push((parity.edge, y));

            let mut terms = Vec::with_capacity(parity.faces.len() + 1);
            for &f in &parity.faces {
                let x = *face_vars.get(f).ok_or_else(|| SelectionError::InvalidProgram {
                    reason: format!("edge {} refers to unknown face {f}", parity.edge),
                })?;
                terms.push((x, 1.0));
            }
            terms.push((y, -2.0));
            program.add_constraint(LinearConstraint::new(terms, Sense::Equal, 0.0));
        }

        for cycle in &constraints.vertex_cycles {
            let ys: Vec<usize> = cycle
                .edges
                .iter()
                .filter_map(|&e| edge_var.get(e).copied().flatten())
                .collect();
            if ys.len() != cycle.edges.len() {
                return Err(SelectionError::InvalidProgram {
                    reason: format!("vertex {} refers to an edge without parity", cycle.vertex),
                });
            }
            for (i, &y) in ys.iter().enumerate() {
                let mut terms = Vec::with_capacity(ys.len());
                terms.push((y, 1.0));
                terms.extend(
                    ys.iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i)
                        .map(|(_, &other)| (other, -1.0)),
                );
                program.add_constraint(LinearConstraint::new(terms, Sense::LessEqual, 0.0));
            }
        }

        for separation in &constraints.fan_separations {
            let mut terms = Vec::with_capacity(separation.faces.len());
            for &f in &separation.faces {
                let x = *face_vars.get(f).ok_or_else(|| SelectionError::InvalidProgram {
                    reason: format!("vertex {} refers to unknown face {f}", separation.vertex),
                })?;
                terms.push((x, 1.0));
            }
            let rhs = terms.len() as f64 - 1.0;
            program.add_constraint(LinearConstraint::new(terms, Sense::LessEqual, rhs));
        }

        program.validate()?;
        info!(
            faces = faces.len(),
            free_faces = faces.len() - constraints.rejected_faces.len(),
            edges = edge_vars.len(),
            separations = constraints.fan_separations.len(),
            constraints = program.constraint_count(),
            "Formulated face selection"
        );

        Ok(SelectionProblem {
            program,
            face_vars,
            edge_vars,
        })
    }

    /// Solve a formulated selection with the given backend.
    ///
    /// # Errors
    ///
    /// - [`SelectionError::OptimizationFailed`] if the solver reports
    ///   infeasibility or runs out of time
    /// - [`SelectionError::InvalidProgram`] if the solver returns an
    ///   assignment of the wrong size
    /// - [`SelectionError::EmptyResult`] if the optimum selects no face
    pub fn solve(
        &self,
        problem: &SelectionProblem,
        solver: &dyn BinarySolver,
        time_budget: Duration,
    ) -> SelectResult<SelectionResult> {
        let start = Instant::now();
        debug!(solver = solver.name(), ?time_budget, "Solving face selection");
        let outcome = solver.solve(&SolveRequest::new(&problem.program, time_budget));

        let assignment = match outcome {
            SolveOutcome::Optimal(assignment) => assignment,
            SolveOutcome::Infeasible => {
                warn!(solver = solver.name(), "Face selection is infeasible");
                return Err(SelectionError::OptimizationFailed {
                    reason: FailureReason::Infeasible,
                });
            }
            SolveOutcome::Timeout => {
                warn!(solver = solver.name(), ?time_budget, "Face selection timed out");
                return Err(SelectionError::OptimizationFailed {
                    reason: FailureReason::Timeout(time_budget),
                });
            }
        };
        if assignment.values.len() != problem.program.variable_count() {
            return Err(SelectionError::InvalidProgram {
                reason: format!(
                    "solver returned {} values for {} variables",
                    assignment.values.len(),
                    problem.program.variable_count()
                ),
            });
        }

        let selected: Vec<bool> = problem
            .face_vars
            .iter()
            .map(|&v| assignment.values[v])
            .collect();
        let result = SelectionResult {
            selected,
            objective: assignment.objective,
        };
        info!(
            solver = solver.name(),
            selected = result.selected_count(),
            objective = result.objective,
            elapsed_ms = start.elapsed().as_millis(),
            "Face selection solved"
        );
        if result.selected_count() == 0 {
            return Err(SelectionError::EmptyResult);
        }
        Ok(result)
    }
}
