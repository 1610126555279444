//! One-shot scheduling of every flight of a catalog.

use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::ScheduleError;
use crate::instance::{Cost, FlightCatalog, Time};

use super::model::ModelBuilder;
use super::solver::{MilpSolver, SolverAdapter, TimeLimited};
use super::solve_model;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticConfig {
    pub runways: usize,
    pub time_limit: Option<Duration>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        StaticConfig { runways: 1, time_limit: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledLanding {
    pub flight: usize,
    pub time: Time,
    /// Only reported when more than one runway is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runway: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub landings: Vec<ScheduledLanding>,
    pub cost: Cost,
}

impl Solution {
    pub fn time_of(&self, flight: usize) -> Option<Time> {
        self.landings.iter().find(|l| l.flight == flight).map(|l| l.time)
    }
}

pub fn schedule_static_with<S: SolverAdapter + ?Sized>(catalog: &FlightCatalog, runways: usize, solver: &S) -> Result<Solution, ScheduleError> {
    let model = ModelBuilder::new(catalog, catalog.ids()).runways(runways).build()?;
    let solution = solve_model(&model, solver)?;

    let landings = solution.times.iter()
        .map(|(flight, time)| ScheduledLanding {
            flight: *flight,
            time: *time,
            runway: if runways > 1 { solution.runways.get(flight).copied() } else { None },
        })
        .collect::<Vec<ScheduledLanding>>();

    let priced: Cost = landings.iter().map(|l| catalog.flights[l.flight].landing_cost(l.time)).sum();
    debug!(priced, objective = solution.objective, "landing cost recomputed from times");
    info!(flights = catalog.nb_flights(), runways, cost = solution.objective, "static schedule found");

    Ok(Solution { landings, cost: solution.objective })
}

/// Schedules all flights at once with the default solver.
pub fn schedule_static(catalog: &FlightCatalog, config: StaticConfig) -> Result<Solution, ScheduleError> {
    match config.time_limit {
        Some(limit) => schedule_static_with(catalog, config.runways, &TimeLimited::new(MilpSolver, limit)),
        None => schedule_static_with(catalog, config.runways, &MilpSolver),
    }
}
