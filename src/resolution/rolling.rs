//! Rolling horizon re-scheduling over a discrete event clock.
//!
//! The clock jumps from one flight appearance to the next. Every flight goes
//! through `Unseen -> Active -> Frozen`; a flight is frozen as soon as its
//! planned landing time falls within the freeze window of the current time,
//! and from then on its landing time never changes. Every appearance after
//! the first triggers a re-optimization of the active and frozen flights in
//! which moving an already planned active flight is charged a displacement
//! cost.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::{ModelError, ScheduleError};
use crate::instance::{Cost, FlightCatalog, Time};

use super::model::{ModelBuilder, DEFAULT_MAX_DISPLACEMENT};
use super::solver::{MilpSolver, SolverAdapter, TimeLimited};
use super::static_case::ScheduledLanding;
use super::solve_model;

/// Freeze window used when neither the caller nor the instance provides one.
pub const DEFAULT_FREEZE_WINDOW: Time = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingConfig {
    pub freeze_window: Time,
    pub max_displacement: Cost,
    pub time_limit: Option<Duration>,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig {
            freeze_window: DEFAULT_FREEZE_WINDOW,
            max_displacement: DEFAULT_MAX_DISPLACEMENT,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightStatus {
    Unseen,
    Active,
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub time: Time,
    /// The flight whose appearance triggered this step
    pub activated: usize,
    /// Flights frozen during this step
    pub frozen: Vec<usize>,
    pub landing_cost: Cost,
    pub displacement_cost: Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSolution {
    pub landings: Vec<ScheduledLanding>,
    /// Accumulated over every re-optimization
    pub displacement_cost: Cost,
    /// Earliness + lateness of the last re-optimization
    pub landing_cost: Cost,
    pub steps: Vec<StepRecord>,
}

impl DynamicSolution {
    pub fn time_of(&self, flight: usize) -> Option<Time> {
        self.landings.iter().find(|l| l.flight == flight).map(|l| l.time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingHorizonState {
    pub current_time: Time,
    pub unseen: BTreeSet<usize>,
    pub active: BTreeSet<usize>,
    pub frozen: BTreeSet<usize>,
    /// Best known landing time, `None` until first scheduled
    pub landing: Vec<Option<Time>>,
    pub freeze_window: Time,
    pub displacement: Cost,
    pub landing_cost: Cost,
}

impl RollingHorizonState {
    pub fn new(catalog: &FlightCatalog, freeze_window: Time) -> Self {
        RollingHorizonState {
            current_time: Time::NEG_INFINITY,
            unseen: catalog.ids().collect(),
            active: BTreeSet::new(),
            frozen: BTreeSet::new(),
            landing: vec![None; catalog.nb_flights()],
            freeze_window,
            displacement: 0.0,
            landing_cost: 0.0,
        }
    }

    pub fn status(&self, flight: usize) -> Option<FlightStatus> {
        if self.unseen.contains(&flight) {
            Some(FlightStatus::Unseen)
        } else if self.active.contains(&flight) {
            Some(FlightStatus::Active)
        } else if self.frozen.contains(&flight) {
            Some(FlightStatus::Frozen)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.unseen.is_empty()
    }

    /// True when the three sets are disjoint and cover `0..nb_flights`.
    pub fn is_partition(&self, nb_flights: usize) -> bool {
        let total = self.unseen.len() + self.active.len() + self.frozen.len();
        total == nb_flights && (0..nb_flights).all(|i| self.status(i).is_some())
    }

    /// The unseen flight appearing first, lowest id on ties.
    pub fn next_unseen(&self, catalog: &FlightCatalog) -> Option<usize> {
        self.unseen.iter()
            .map(|i| &catalog.flights[*i])
            .min_by(|a, b| a.appearance.total_cmp(&b.appearance).then(a.id.cmp(&b.id)))
            .map(|f| f.id)
    }

    /// Advances the clock to the appearance of `flight` and makes it active.
    pub fn activate(&mut self, catalog: &FlightCatalog, flight: usize) {
        if self.unseen.remove(&flight) {
            self.current_time = catalog.flights[flight].appearance;
            self.active.insert(flight);
        }
    }

    /// Freezes every active flight planned to land within the freeze window.
    pub fn freeze_due(&mut self) -> Vec<usize> {
        let horizon = self.current_time + self.freeze_window;
        let due = self.active.iter()
            .copied()
            .filter(|i| matches!(self.landing[*i], Some(t) if t <= horizon))
            .collect::<Vec<usize>>();
        for i in due.iter() {
            self.active.remove(i);
            self.frozen.insert(*i);
        }
        due
    }

    fn known(&self, ids: impl Iterator<Item = usize>) -> BTreeMap<usize, Time> {
        ids.filter_map(|i| self.landing[i].map(|t| (i, t))).collect()
    }
}

pub struct RollingHorizonScheduler<'a, S> {
    catalog: &'a FlightCatalog,
    solver: S,
    config: RollingConfig,
    state: RollingHorizonState,
    steps: Vec<StepRecord>,
}

impl<'a, S: SolverAdapter> RollingHorizonScheduler<'a, S> {
    pub fn new(catalog: &'a FlightCatalog, solver: S, config: RollingConfig) -> Self {
        let state = RollingHorizonState::new(catalog, config.freeze_window);
        RollingHorizonScheduler { catalog, solver, config, state, steps: vec![] }
    }

    pub fn state(&self) -> &RollingHorizonState {
        &self.state
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Processes the next appearance, `None` once every flight has appeared.
    pub fn step(&mut self) -> Result<Option<&StepRecord>, ScheduleError> {
        let Some(flight) = self.state.next_unseen(self.catalog) else {
            return Ok(None);
        };

        let record = if self.steps.is_empty() {
            self.bootstrap(flight)
        } else {
            self.reoptimize(flight).map_err(|e| ScheduleError::Step {
                time: self.state.current_time,
                flight,
                source: Box::new(e),
            })?
        };

        debug_assert!(self.state.is_partition(self.catalog.nb_flights()));
        self.steps.push(record);
        Ok(self.steps.last())
    }

    /// Nobody competes with the first flight: it lands on target.
    fn bootstrap(&mut self, flight: usize) -> StepRecord {
        self.state.activate(self.catalog, flight);
        self.state.landing[flight] = Some(self.catalog.flights[flight].target);
        self.state.landing_cost = 0.0;

        info!(time = self.state.current_time, flight, "first flight scheduled on target");

        StepRecord { time: self.state.current_time, activated: flight, frozen: vec![], landing_cost: 0.0, displacement_cost: 0.0 }
    }

    fn reoptimize(&mut self, flight: usize) -> Result<StepRecord, ScheduleError> {
        self.state.activate(self.catalog, flight);
        let frozen = self.state.freeze_due();

        let frozen_times = self.state.known(self.state.frozen.iter().copied());
        let previous = self.state.known(self.state.active.iter().copied().filter(|i| *i != flight));
        let ids = self.state.active.iter().chain(self.state.frozen.iter()).copied().collect::<Vec<usize>>();

        debug!(
            time = self.state.current_time,
            flight,
            active = self.state.active.len(),
            frozen = self.state.frozen.len(),
            newly_frozen = ?frozen,
            "re-optimizing"
        );

        let model = ModelBuilder::new(self.catalog, ids)
            .frozen(frozen_times)
            .previous(previous)
            .max_displacement(self.config.max_displacement)
            .build()?;
        let solution = solve_model(&model, &self.solver)?;

        // frozen flights keep their exact value, the model pins them anyway
        for i in self.state.active.iter().copied() {
            if let Some(t) = solution.times.get(&i) {
                self.state.landing[i] = Some(*t);
            }
        }
        self.state.displacement += solution.displacement_cost;
        self.state.landing_cost = solution.landing_cost;

        info!(
            time = self.state.current_time,
            flight,
            newly_frozen = frozen.len(),
            landing_cost = solution.landing_cost,
            displacement_cost = solution.displacement_cost,
            "horizon re-optimized"
        );

        Ok(StepRecord {
            time: self.state.current_time,
            activated: flight,
            frozen,
            landing_cost: solution.landing_cost,
            displacement_cost: solution.displacement_cost,
        })
    }

    pub fn run(mut self) -> Result<DynamicSolution, ScheduleError> {
        if self.catalog.nb_flights() == 0 {
            return Err(ModelError::EmptyActiveSet.into());
        }
        while self.step()?.is_some() {}

        let landings = self.state.landing.iter()
            .enumerate()
            .filter_map(|(flight, t)| t.map(|time| ScheduledLanding { flight, time, runway: None }))
            .collect();

        info!(
            steps = self.steps.len(),
            displacement_cost = self.state.displacement,
            landing_cost = self.state.landing_cost,
            "rolling horizon completed"
        );

        Ok(DynamicSolution {
            landings,
            displacement_cost: self.state.displacement,
            landing_cost: self.state.landing_cost,
            steps: self.steps,
        })
    }
}

pub fn schedule_dynamic_with<S: SolverAdapter>(catalog: &FlightCatalog, config: RollingConfig, solver: S) -> Result<DynamicSolution, ScheduleError> {
    RollingHorizonScheduler::new(catalog, solver, config).run()
}

/// Runs the rolling horizon over the whole catalog with the default solver.
pub fn schedule_dynamic(catalog: &FlightCatalog, config: RollingConfig) -> Result<DynamicSolution, ScheduleError> {
    match config.time_limit {
        Some(limit) => schedule_dynamic_with(catalog, config, TimeLimited::new(MilpSolver, limit)),
        None => schedule_dynamic_with(catalog, config, MilpSolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveError;
    use crate::instance::{Flight, SeparationMatrix};
    use crate::resolution::model::MilpInstance;
    use crate::resolution::solver::Assignment;

    fn catalog(appearances: &[Time]) -> FlightCatalog {
        let flights = appearances.iter()
            .copied()
            .enumerate()
            .map(|(id, appearance)| Flight {
                id,
                appearance,
                earliest: appearance + 10.0,
                target: appearance + 40.0,
                latest: appearance + 200.0,
                early_rate: 1.0,
                late_rate: 1.0,
            })
            .collect();
        FlightCatalog::new(flights, SeparationMatrix::uniform(appearances.len(), 5.0), 0.0).unwrap()
    }

    struct Failing(SolveError);

    impl SolverAdapter for Failing {
        fn solve(&self, _: &MilpInstance) -> Result<Assignment, SolveError> {
            Err(self.0.clone())
        }
    }

    #[test]
    fn next_unseen_breaks_ties_by_id() {
        let c = catalog(&[30.0, 10.0, 10.0]);
        let mut state = RollingHorizonState::new(&c, 20.0);
        assert_eq!(state.next_unseen(&c), Some(1));
        state.activate(&c, 1);
        assert_eq!(state.current_time, 10.0);
        assert_eq!(state.next_unseen(&c), Some(2));
        assert_eq!(state.status(1), Some(FlightStatus::Active));
        assert!(state.is_partition(3));
    }

    #[test]
    fn freezes_only_flights_inside_the_window() {
        let c = catalog(&[0.0, 0.0, 0.0]);
        let mut state = RollingHorizonState::new(&c, 20.0);
        for i in 0..3 {
            state.activate(&c, i);
        }
        state.landing = vec![Some(15.0), Some(20.0), None];
        state.current_time = 0.0;
        assert_eq!(state.freeze_due(), vec![0, 1]);
        assert_eq!(state.status(0), Some(FlightStatus::Frozen));
        assert_eq!(state.status(2), Some(FlightStatus::Active));
        assert!(state.is_partition(3));
    }

    #[test]
    fn single_flight_needs_no_solver() {
        let c = catalog(&[5.0]);
        let solution = schedule_dynamic_with(&c, RollingConfig::default(), Failing(SolveError::Infeasible)).unwrap();
        assert_eq!(solution.time_of(0), Some(45.0));
        assert_eq!(solution.landing_cost, 0.0);
        assert_eq!(solution.displacement_cost, 0.0);
        assert_eq!(solution.steps.len(), 1);
    }

    #[test]
    fn infeasible_step_aborts_the_run() {
        let c = catalog(&[0.0, 10.0, 20.0]);
        let err = schedule_dynamic_with(&c, RollingConfig::default(), Failing(SolveError::Infeasible)).unwrap_err();
        assert!(err.is_infeasible());
        assert!(matches!(err, ScheduleError::Step { flight: 1, time, .. } if time == 10.0));
    }

    #[test]
    fn timeout_is_not_infeasibility() {
        let c = catalog(&[0.0, 10.0]);
        let limit = Duration::from_secs(1);
        let err = schedule_dynamic_with(&c, RollingConfig::default(), Failing(SolveError::Timeout(limit))).unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_infeasible());
    }

    #[test]
    fn empty_catalog_is_a_model_error() {
        let c = catalog(&[]);
        let err = schedule_dynamic(&c, RollingConfig::default()).unwrap_err();
        assert!(matches!(err, ScheduleError::Model(ModelError::EmptyActiveSet)));
    }
}
