//! This module defines an abstract representation of an aircraft landing instance.

use serde::{Serialize, Deserialize};

use crate::error::InstanceError;

pub type Time = f64;
pub type Cost = f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: usize,
    /// The time at which the aircraft becomes known to the scheduler
    pub appearance: Time,
    pub earliest: Time,
    pub target: Time,
    pub latest: Time,
    /// Cost per time unit of landing before the target
    pub early_rate: Cost,
    /// Cost per time unit of landing after the target
    pub late_rate: Cost,
}

impl Flight {
    /// Earliness/lateness cost of landing this flight at `time`.
    pub fn landing_cost(&self, time: Time) -> Cost {
        if time < self.target {
            (self.target - time) * self.early_rate
        } else {
            (time - self.target) * self.late_rate
        }
    }

    pub fn contains(&self, time: Time, tolerance: Time) -> bool {
        time >= self.earliest - tolerance && time <= self.latest + tolerance
    }
}

/// Minimum time gap required between `i` and `j` when `i` lands first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationMatrix {
    rows: Vec<Vec<Time>>,
}

impl SeparationMatrix {
    pub fn new(rows: Vec<Vec<Time>>) -> Result<Self, InstanceError> {
        let n = rows.len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(InstanceError::NotSquare { row, len: r.len(), expected: n });
        }
        Ok(SeparationMatrix { rows })
    }

    /// A matrix requiring the same gap between every pair of distinct flights.
    pub fn uniform(n: usize, gap: Time) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { gap }).collect())
            .collect();
        SeparationMatrix { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Time {
        self.rows[i][j]
    }

    pub fn rows(&self) -> &[Vec<Time>] {
        &self.rows
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightCatalog {
    /// Freeze time announced by the instance file, if any
    #[serde(default)]
    pub freeze_time: Time,
    pub flights: Vec<Flight>,
    pub separation: SeparationMatrix,
}

impl FlightCatalog {
    pub fn new(flights: Vec<Flight>, separation: SeparationMatrix, freeze_time: Time) -> Result<Self, InstanceError> {
        if flights.len() != separation.len() {
            return Err(InstanceError::SizeMismatch { flights: flights.len(), separation: separation.len() });
        }
        if let Some((pos, f)) = flights.iter().enumerate().find(|(pos, f)| f.id != *pos) {
            return Err(InstanceError::BadId { position: pos, id: f.id });
        }
        Ok(FlightCatalog { freeze_time, flights, separation })
    }

    pub fn nb_flights(&self) -> usize {
        self.flights.len()
    }

    pub fn flight(&self, id: usize) -> Option<&Flight> {
        self.flights.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.flights.iter().map(|f| f.id)
    }
}
