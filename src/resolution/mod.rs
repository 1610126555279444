//! Landing time optimization: the MILP formulation, the solver boundary and
//! the static and rolling horizon schedulers built on them.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::debug;

use crate::error::SolveError;
use crate::instance::{Cost, Time};

pub mod model;
pub mod solver;
pub mod static_case;
pub mod rolling;
pub mod solve;

pub use model::{MilpInstance, ModelBuilder, DEFAULT_MAX_DISPLACEMENT};
pub use rolling::{schedule_dynamic, DynamicSolution, RollingConfig, RollingHorizonScheduler, RollingHorizonState, StepRecord};
pub use solver::{Assignment, MilpSolver, SolverAdapter, TimeLimited};
pub use static_case::{schedule_static, ScheduledLanding, Solution, StaticConfig};

/// What one solve says about the flights of its model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSolution {
    pub times: BTreeMap<usize, Time>,
    pub runways: BTreeMap<usize, usize>,
    pub objective: Cost,
    /// Earliness + lateness over every flight of the model
    pub landing_cost: Cost,
    /// Sum of the displacement variables, 0 without a previous schedule
    pub displacement_cost: Cost,
}

pub fn solve_model<S: SolverAdapter + ?Sized>(instance: &MilpInstance, solver: &S) -> Result<ModelSolution, SolveError> {
    let start = Instant::now();
    let Assignment { values, objective } = solver.solve(instance)?;

    let times = instance.landing.iter().map(|(i, v)| (*i, values[v.0])).collect();
    let runways = instance.landing.keys()
        .filter_map(|i| instance.runway_of(*i, &values).map(|r| (*i, r)))
        .collect();
    let landing_cost = instance.landing_cost.eval(&values);
    let displacement_cost = instance.displacement.values().map(|v| values[v.0]).sum();

    debug!(objective, landing_cost, displacement_cost, elapsed = ?start.elapsed(), "solution extracted");

    Ok(ModelSolution { times, runways, objective, landing_cost, displacement_cost })
}
