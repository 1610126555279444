//! The boundary between the landing formulation and a MILP solver.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::{default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use tracing::{debug, warn};

use crate::error::SolveError;

use super::model::{MilpInstance, Sense, VarKind};

/// Tolerance used to flag constraint violations in a returned assignment.
const FEASIBILITY_TOLERANCE: f64 = 1e-4;

/// An optimal value for every variable of the instance, indexed by `VarId`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub values: Vec<f64>,
    pub objective: f64,
}

/// Anything able to solve a [`MilpInstance`] to optimality.
///
/// Ties between optimal solutions are broken by the implementation.
pub trait SolverAdapter {
    fn solve(&self, instance: &MilpInstance) -> Result<Assignment, SolveError>;
}

impl<S: SolverAdapter + ?Sized> SolverAdapter for &S {
    fn solve(&self, instance: &MilpInstance) -> Result<Assignment, SolveError> {
        (**self).solve(instance)
    }
}

/// Solves through `good_lp` with its default (pure Rust) backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilpSolver;

impl SolverAdapter for MilpSolver {
    fn solve(&self, instance: &MilpInstance) -> Result<Assignment, SolveError> {
        let start = Instant::now();

        let mut vars = ProblemVariables::new();
        let handles = instance.variables.iter()
            .map(|v| {
                let def = match v.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Continuous => {
                        let def = variable().min(v.lower);
                        if v.upper.is_finite() { def.max(v.upper) } else { def }
                    }
                };
                vars.add(def.name(v.name.clone()))
            })
            .collect::<Vec<_>>();

        let expression = |e: &super::model::LinExpr| {
            e.terms.iter().fold(Expression::from(e.constant), |acc, (v, c)| acc + *c * handles[v.0])
        };

        let mut problem = vars.minimise(expression(&instance.objective)).using(default_solver);
        for c in instance.constraints.iter() {
            let lhs = expression(&c.expr);
            let constraint = match c.sense {
                Sense::LessEq => lhs.leq(c.rhs),
                Sense::GreaterEq => lhs.geq(c.rhs),
                Sense::Equal => lhs.eq(c.rhs),
            };
            problem.add_constraint(constraint);
        }

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => return Err(SolveError::Infeasible),
            Err(ResolutionError::Unbounded) => return Err(SolveError::Unbounded),
            Err(e) => return Err(SolveError::Solver(e.to_string())),
        };

        let values = handles.iter().map(|h| solution.value(*h)).collect::<Vec<f64>>();
        let objective = instance.objective.eval(&values);

        let violated = instance.constraints.iter().filter(|c| !c.is_satisfied(&values, FEASIBILITY_TOLERANCE)).count();
        if violated > 0 {
            warn!(violated, "solver returned an assignment outside the feasibility tolerance");
        }
        debug!(objective, elapsed = ?start.elapsed(), "model solved");

        Ok(Assignment { values, objective })
    }
}

/// Runs the wrapped solver on a worker thread and gives up after `limit`.
///
/// The worker is detached on timeout; its eventual verdict is discarded.
#[derive(Debug, Clone)]
pub struct TimeLimited<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeLimited<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        TimeLimited { inner, limit }
    }
}

impl<S: SolverAdapter + Clone + Send + 'static> SolverAdapter for TimeLimited<S> {
    fn solve(&self, instance: &MilpInstance) -> Result<Assignment, SolveError> {
        let (tx, rx) = channel();
        let inner = self.inner.clone();
        let instance = instance.clone();

        thread::Builder::new()
            .name("milp-solve".into())
            .spawn(move || {
                let verdict = catch_unwind(AssertUnwindSafe(|| inner.solve(&instance)))
                    .unwrap_or_else(|_| Err(SolveError::Solver("solver panicked".into())));
                let _ = tx.send(verdict);
            })
            .map_err(|e| SolveError::Solver(format!("cannot spawn solver thread: {e}")))?;

        match rx.recv_timeout(self.limit) {
            Ok(verdict) => verdict,
            Err(RecvTimeoutError::Timeout) => {
                warn!(limit = ?self.limit, "solver timed out");
                Err(SolveError::Timeout(self.limit))
            },
            Err(RecvTimeoutError::Disconnected) => Err(SolveError::Solver("solver thread vanished".into())),
        }
    }
}
