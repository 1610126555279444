use std::time::Duration;

use thiserror::Error;

use crate::instance::Time;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("cannot read instance: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse json instance: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("invalid number '{token}' while reading {what}")]
    InvalidNumber { token: String, what: &'static str },
    #[error("separation row {row} has {len} entries, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },
    #[error("{flights} flights but a separation matrix of size {separation}")]
    SizeMismatch { flights: usize, separation: usize },
    #[error("flight at position {position} has id {id}")]
    BadId { position: usize, id: usize },
}

/// Malformed or contradictory inputs to the model builder. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("no flight to schedule")]
    EmptyActiveSet,
    #[error("unknown flight {0}")]
    UnknownFlight(usize),
    #[error("flight {flight} has earliest time {earliest} after latest time {latest}")]
    InvalidWindow { flight: usize, earliest: Time, latest: Time },
    #[error("flight {flight} frozen at {time}, outside its window [{earliest}, {latest}]")]
    FrozenOutsideWindow { flight: usize, time: Time, earliest: Time, latest: Time },
    #[error("at least one runway is required")]
    NoRunway,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("no schedule satisfies every time window and separation constraint")]
    Infeasible,
    #[error("the model is unbounded")]
    Unbounded,
    #[error("no verdict from the solver within {0:?}")]
    Timeout(Duration),
    #[error("solver failure: {0}")]
    Solver(String),
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("rolling horizon aborted at t={time} after flight {flight} appeared: {source}")]
    Step { time: Time, flight: usize, source: Box<ScheduleError> },
}

impl ScheduleError {
    /// The innermost cause, skipping rolling horizon step context.
    pub fn root(&self) -> &ScheduleError {
        match self {
            ScheduleError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the constraints admit no schedule, as opposed to solver trouble.
    pub fn is_infeasible(&self) -> bool {
        matches!(self.root(), ScheduleError::Solve(SolveError::Infeasible))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ScheduleError::Solve(SolveError::Timeout(_)))
    }
}
