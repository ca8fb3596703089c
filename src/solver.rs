//! Boundary to the external LP solver.
//!
//! Every optimisation in this crate is a [`Formulation`]: it declares its
//! variables and constraints into a fresh [`ProblemBuilder`], names an
//! objective and a sense, and reads its decision back out of the
//! [`SolvedProblem`]. The builder owns the `good_lp` model for exactly one
//! solve and is consumed by it.

use std::collections::HashMap;
use std::fmt;

use clarabel::solver::SolverStatus;
use good_lp::solvers::clarabel::{ClarabelSolution, clarabel};
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    VariableDefinition,
};
use tracing::info;

use crate::error::{BidError, BidResult, SolveStatus};

/// Optimisation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Maximise the objective.
    Maximise,
    /// Minimise the objective.
    Minimise,
}

/// Size and outcome of a finished solve, safe to hand back to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSummary {
    /// Problem label used in logs and errors.
    pub label: &'static str,
    /// Number of decision variables.
    pub num_variables: usize,
    /// Number of linear constraints (variable bounds excluded).
    pub num_constraints: usize,
    /// Optimal objective value reported by the solver.
    pub objective: f64,
}

impl fmt::Display for ProblemSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} variables, {} constraints, objective {:.6}",
            self.label, self.num_variables, self.num_constraints, self.objective
        )
    }
}

/// Accumulates variables and constraints for one solve.
pub struct ProblemBuilder {
    label: &'static str,
    vars: ProblemVariables,
    handles: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl ProblemBuilder {
    /// Starts an empty problem.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            vars: ProblemVariables::new(),
            handles: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds one variable with the bounds carried by `def`.
    pub fn variable(&mut self, def: VariableDefinition) -> Variable {
        let v = self.vars.add(def);
        self.handles.push(v);
        v
    }

    /// Adds `n` variables sharing the same bounds.
    pub fn variables(&mut self, n: usize, def: VariableDefinition) -> Vec<Variable> {
        (0..n).map(|_| self.variable(def.clone())).collect()
    }

    /// Adds a `rows x cols` block of variables sharing the same bounds.
    pub fn matrix(&mut self, rows: usize, cols: usize, def: VariableDefinition) -> Vec<Vec<Variable>> {
        (0..rows).map(|_| self.variables(cols, def.clone())).collect()
    }

    /// Adds a linear constraint.
    pub fn constrain(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Hands the problem to the solver.
    ///
    /// # Errors
    ///
    /// Returns [`BidError::Solver`] carrying the solver status when no
    /// solution is available. Variable values are never defaulted. The
    /// backend hands unbounded problems back as solutions, so the raw
    /// Clarabel status is checked as well.
    pub fn solve(self, sense: Sense, objective: Expression) -> BidResult<SolvedProblem> {
        let Self {
            label,
            vars,
            handles,
            constraints,
        } = self;
        let num_variables = handles.len();
        let num_constraints = constraints.len();

        let unsolved = match sense {
            Sense::Maximise => vars.maximise(objective.clone()),
            Sense::Minimise => vars.minimise(objective.clone()),
        };
        let mut model = unsolved.using(clarabel);
        for c in constraints {
            model = model.with(c);
        }

        let solution: ClarabelSolution = model.solve().map_err(|e| BidError::Solver {
            problem: label,
            status: status_from(e),
        })?;
        accepted(&solution.inner().status).map_err(|status| BidError::Solver {
            problem: label,
            status,
        })?;

        let values: HashMap<Variable, f64> =
            handles.iter().map(|v| (*v, solution.value(*v))).collect();
        let objective = solution.eval(objective);
        let summary = ProblemSummary {
            label,
            num_variables,
            num_constraints,
            objective,
        };
        info!(
            problem = label,
            variables = num_variables,
            constraints = num_constraints,
            objective,
            "solved"
        );
        Ok(SolvedProblem { values, summary })
    }
}

fn status_from(err: ResolutionError) -> SolveStatus {
    match err {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        other => SolveStatus::Failed(other.to_string()),
    }
}

/// Reduced-accuracy solutions are accepted; dual infeasibility means the
/// objective is unbounded.
fn accepted(status: &SolverStatus) -> Result<(), SolveStatus> {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(()),
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            Err(SolveStatus::Unbounded)
        }
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Err(SolveStatus::Infeasible)
        }
        other => Err(SolveStatus::Failed(format!("{other:?}"))),
    }
}

/// Primal values and objective of a successful solve.
#[derive(Debug, Clone)]
pub struct SolvedProblem {
    values: HashMap<Variable, f64>,
    summary: ProblemSummary,
}

impl SolvedProblem {
    /// Value of one variable.
    ///
    /// # Panics
    ///
    /// Panics if `var` was not declared in the builder that produced this solution.
    pub fn value(&self, var: Variable) -> f64 {
        self.values[&var]
    }

    /// Values of a vector of variables.
    pub fn vector(&self, vars: &[Variable]) -> Vec<f64> {
        vars.iter().map(|v| self.value(*v)).collect()
    }

    /// Optimal objective value.
    pub fn objective(&self) -> f64 {
        self.summary.objective
    }

    /// Size and outcome summary.
    pub fn summary(&self) -> &ProblemSummary {
        &self.summary
    }
}

/// A linear program that can be built, solved and read back.
///
/// Implementations stay free of solver plumbing: they only declare their
/// model into the builder and interpret the values.
pub trait Formulation {
    /// Variable handles needed to read the decision back.
    type Handles;
    /// Decision returned to the caller.
    type Output;

    /// Label used in logs and solver errors.
    fn label(&self) -> &'static str;

    /// Declares variables and constraints, returning the objective and its sense.
    fn formulate(&self, builder: &mut ProblemBuilder) -> (Sense, Expression, Self::Handles);

    /// Interprets a solved problem.
    fn extract(&self, solved: &SolvedProblem, handles: Self::Handles) -> Self::Output;
}

/// Builds a fresh problem for `formulation`, solves it and extracts the decision.
///
/// # Errors
///
/// Propagates solver failures as [`BidError::Solver`].
pub fn solve<F: Formulation>(formulation: &F) -> BidResult<(F::Output, ProblemSummary)> {
    let mut builder = ProblemBuilder::new(formulation.label());
    let (sense, objective, handles) = formulation.formulate(&mut builder);
    let solved = builder.solve(sense, objective)?;
    let output = formulation.extract(&solved, handles);
    Ok((output, solved.summary().clone()))
}

#[cfg(test)]
mod tests {
    use good_lp::{constraint, variable};

    use super::*;

    #[test]
    fn maximise_small_lp() {
        let mut b = ProblemBuilder::new("small");
        let x = b.variable(variable().min(0.0).max(4.0));
        let y = b.variable(variable().min(0.0));
        b.constrain(constraint!(x + y <= 6.0));
        b.constrain(constraint!(y <= 3.0));
        let solved = b.solve(Sense::Maximise, x + 2.0 * y).expect("feasible");
        assert!((solved.value(x) - 3.0).abs() < 1e-5);
        assert!((solved.value(y) - 3.0).abs() < 1e-5);
        assert!((solved.objective() - 9.0).abs() < 1e-5);
        assert_eq!(solved.summary().num_variables, 2);
        assert_eq!(solved.summary().num_constraints, 2);
    }

    #[test]
    fn minimise_small_lp() {
        let mut b = ProblemBuilder::new("min");
        let x = b.variable(variable().min(1.5));
        let solved = b
            .solve(Sense::Minimise, Expression::from(x))
            .expect("feasible");
        assert!((solved.value(x) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn infeasible_problem_is_a_typed_error() {
        let mut b = ProblemBuilder::new("broken");
        let x = b.variable(variable().min(0.0).max(1.0));
        b.constrain(constraint!(x >= 2.0));
        let err = b
            .solve(Sense::Maximise, Expression::from(x))
            .expect_err("must be infeasible");
        match err {
            BidError::Solver { problem, status } => {
                assert_eq!(problem, "broken");
                assert_ne!(status, SolveStatus::Unbounded);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unbounded_problem_is_an_error_not_a_value() {
        let mut b = ProblemBuilder::new("open");
        let x = b.variable(variable().min(0.0));
        let result = b.solve(Sense::Maximise, Expression::from(x));
        match result {
            Err(BidError::Solver { problem, status }) => {
                assert_eq!(problem, "open");
                assert_eq!(status, SolveStatus::Unbounded);
            }
            other => panic!("unbounded problem must not solve: {other:?}"),
        }
    }

    #[test]
    fn unbounded_minimisation_is_reported_too() {
        let mut b = ProblemBuilder::new("open_below");
        let x = b.variable(variable().max(3.0));
        let y = b.variable(variable().min(0.0).max(1.0));
        b.constrain(constraint!(x + y <= 4.0));
        let err = b
            .solve(Sense::Minimise, x + y)
            .expect_err("objective has no lower bound");
        assert!(matches!(
            err,
            BidError::Solver {
                status: SolveStatus::Unbounded,
                ..
            }
        ));
    }

    #[test]
    fn clarabel_statuses_map_to_typed_outcomes() {
        assert_eq!(accepted(&SolverStatus::Solved), Ok(()));
        assert_eq!(accepted(&SolverStatus::AlmostSolved), Ok(()));
        assert_eq!(accepted(&SolverStatus::DualInfeasible), Err(SolveStatus::Unbounded));
        assert_eq!(accepted(&SolverStatus::AlmostDualInfeasible), Err(SolveStatus::Unbounded));
        assert_eq!(accepted(&SolverStatus::PrimalInfeasible), Err(SolveStatus::Infeasible));
        assert!(matches!(
            accepted(&SolverStatus::MaxIterations),
            Err(SolveStatus::Failed(_))
        ));
    }

    #[test]
    fn matrix_helpers_keep_row_layout() {
        let mut b = ProblemBuilder::new("matrix");
        let m = b.matrix(2, 3, variable().min(0.0).max(1.0));
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].len(), 3);
        let total: Expression = m.iter().flatten().copied().sum();
        let solved = b.solve(Sense::Maximise, total).expect("feasible");
        let values: Vec<f64> = m.iter().flat_map(|row| solved.vector(row)).collect();
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-5));
    }
}
