//! Aircraft landing scheduling with mixed-integer linear programming.
//!
//! Landing times (and runways) are chosen within each flight's time window so
//! that every pair of flights respects its separation time, minimizing the
//! earliness/lateness cost. Flights can be scheduled all at once
//! ([`resolution::schedule_static`]) or as they appear over time with a
//! rolling horizon ([`resolution::schedule_dynamic`]).

pub mod error;
pub mod generate;
pub mod instance;
pub mod parser;
pub mod report;
pub mod resolution;

pub use error::{InstanceError, ModelError, ScheduleError, SolveError};
pub use instance::{Flight, FlightCatalog, SeparationMatrix};
