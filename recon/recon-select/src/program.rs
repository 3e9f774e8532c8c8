//! Binary linear programs.
//!
//! A [`BinaryProgram`] minimizes `constant + Σ c_j·x_j` over binary variables
//! `x_j`, subject to linear rows `Σ a_ij·x_j (≤ | = | ≥) b_i`. Some variables
//! may be fixed in advance.

use std::fmt;

use crate::error::{SelectResult, SelectionError};

/// Absolute tolerance when checking row activities.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Allowed values of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    /// Free binary variable.
    Binary,
    /// Variable fixed to the given value.
    Fixed(bool),
}

/// Relation between a row's activity and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sense {
    /// `activity <= rhs`
    LessEqual,
    /// `activity == rhs`
    Equal,
    /// `activity >= rhs`
    GreaterEqual,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::LessEqual => "<=",
            Self::Equal => "=",
            Self::GreaterEqual => ">=",
        };
        f.write_str(symbol)
    }
}

/// One linear row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearConstraint {
    /// `(variable, coefficient)` pairs.
    pub terms: Vec<(usize, f64)>,
    /// Relation to `rhs`.
    pub sense: Sense,
    /// Right-hand side.
    pub rhs: f64,
}

impl LinearConstraint {
    /// Create a row.
    #[must_use]
    pub const fn new(terms: Vec<(usize, f64)>, sense: Sense, rhs: f64) -> Self {
        Self { terms, sense, rhs }
    }

    /// Row activity under a full assignment.
    #[must_use]
    pub fn activity(&self, values: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|(var, _)| values.get(*var).copied().unwrap_or(false))
            .map(|(_, coef)| coef)
            .sum()
    }

    /// Whether the row holds under a full assignment.
    #[must_use]
    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let activity = self.activity(values);
        match self.sense {
            Sense::LessEqual => activity <= self.rhs + FEASIBILITY_TOLERANCE,
            Sense::Equal => (activity - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
            Sense::GreaterEqual => activity >= self.rhs - FEASIBILITY_TOLERANCE,
        }
    }

    /// Activity range `[lo, hi]` the row allows.
    #[must_use]
    pub const fn bounds(&self) -> (f64, f64) {
        match self.sense {
            Sense::LessEqual => (f64::NEG_INFINITY, self.rhs),
            Sense::Equal => (self.rhs, self.rhs),
            Sense::GreaterEqual => (self.rhs, f64::INFINITY),
        }
    }
}

/// A minimization problem over binary variables.
///
/// # Example
///
/// ```
/// use recon_select::{BinaryProgram, Domain, LinearConstraint, Sense};
///
/// let mut program = BinaryProgram::new();
/// let a = program.add_variable(-1.0, Domain::Binary);
/// let b = program.add_variable(-2.0, Domain::Binary);
/// program.add_constraint(LinearConstraint::new(vec![(a, 1.0), (b, 1.0)], Sense::LessEqual, 1.0));
///
/// assert_eq!(program.variable_count(), 2);
/// assert!(program.is_feasible(&[false, true]));
/// assert!(!program.is_feasible(&[true, true]));
/// assert!((program.objective_value(&[false, true]) + 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryProgram {
    objective: Vec<f64>,
    constant: f64,
    domains: Vec<Domain>,
    constraints: Vec<LinearConstraint>,
}

impl BinaryProgram {
    /// Create an empty program.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            objective: Vec::new(),
            constant: 0.0,
            domains: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Add a variable with its objective coefficient; returns its index.
    pub fn add_variable(&mut self, coefficient: f64, domain: Domain) -> usize {
        self.objective.push(coefficient);
        self.domains.push(domain);
        self.objective.len() - 1
    }

    /// Add a row.
    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    /// Add `value` to the objective constant.
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Objective constant.
    #[must_use]
    pub const fn constant(&self) -> f64 {
        self.constant
    }

    /// Objective coefficients, indexed by variable.
    #[must_use]
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    /// Variable domains, indexed by variable.
    #[must_use]
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// All rows.
    #[must_use]
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Number of variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    /// Number of rows.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of variables that are not fixed.
    #[must_use]
    pub fn free_variable_count(&self) -> usize {
        self.domains.iter().filter(|d| **d == Domain::Binary).count()
    }

    /// Objective value of a full assignment.
    #[must_use]
    pub fn objective_value(&self, values: &[bool]) -> f64 {
        self.constant
            + self
                .objective
                .iter()
                .zip(values)
                .filter(|(_, &x)| x)
                .map(|(c, _)| c)
                .sum::<f64>()
    }

    /// Whether a full assignment respects every domain and row.
    #[must_use]
    pub fn is_feasible(&self, values: &[bool]) -> bool {
        values.len() == self.variable_count()
            && self.domains.iter().zip(values).all(|(d, &x)| match d {
                Domain::Binary => true,
                Domain::Fixed(v) => *v == x,
            })
            && self.constraints.iter().all(|c| c.is_satisfied(values))
    }

    /// Check indices and coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::InvalidProgram`] for non-finite numbers or
    /// out-of-range variable indices.
    pub fn validate(&self) -> SelectResult<()> {
        if !self.constant.is_finite() {
            return Err(invalid("objective constant is not finite".to_string()));
        }
        if let Some(j) = self.objective.iter().position(|c| !c.is_finite()) {
            return Err(invalid(format!("objective coefficient of x{j} is not finite")));
        }
        let n = self.variable_count();
        for (i, row) in self.constraints.iter().enumerate() {
            if !row.rhs.is_finite() {
                return Err(invalid(format!("row {i} has a non-finite right-hand side")));
            }
            for &(var, coef) in &row.terms {
                if var >= n {
                    return Err(invalid(format!("row {i} references x{var} of {n} variables")));
                }
                if !coef.is_finite() {
                    return Err(invalid(format!("row {i} has a non-finite coefficient on x{var}")));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for BinaryProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BinaryProgram: {} variables ({} free), {} constraints",
            self.variable_count(),
            self.free_variable_count(),
            self.constraint_count()
        )
    }
}

const fn invalid(reason: String) -> SelectionError {
    SelectionError::InvalidProgram { reason }
}
