//! Reading and writing instances in the OR-Library "airland" text format:
//!
//! ```text
//! num_flights freeze_time
//! appearance earliest target latest early_rate late_rate
//! sep[i][0] sep[i][1] ... sep[i][num_flights - 1]
//! ...
//! ```
//!
//! Line breaks carry no meaning, every value is a whitespace separated token.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::InstanceError;
use crate::instance::{Flight, FlightCatalog, SeparationMatrix};

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn number(&mut self, what: &'static str) -> Result<f64, InstanceError> {
        let token = self.inner.next().ok_or(InstanceError::UnexpectedEof(what))?;
        token.parse::<f64>().map_err(|_| InstanceError::InvalidNumber { token: token.to_string(), what })
    }

    fn count(&mut self, what: &'static str) -> Result<usize, InstanceError> {
        let token = self.inner.next().ok_or(InstanceError::UnexpectedEof(what))?;
        token.parse::<usize>().map_err(|_| InstanceError::InvalidNumber { token: token.to_string(), what })
    }
}

pub fn parse_airland(text: &str) -> Result<FlightCatalog, InstanceError> {
    let mut tokens = Tokens { inner: text.split_whitespace() };

    let nb_flights = tokens.count("number of flights")?;
    let freeze_time = tokens.number("freeze time")?;

    let mut flights = Vec::with_capacity(nb_flights);
    let mut rows = Vec::with_capacity(nb_flights);
    for id in 0..nb_flights {
        flights.push(Flight {
            id,
            appearance: tokens.number("appearance time")?,
            earliest: tokens.number("earliest landing time")?,
            target: tokens.number("target landing time")?,
            latest: tokens.number("latest landing time")?,
            early_rate: tokens.number("earliness penalty")?,
            late_rate: tokens.number("lateness penalty")?,
        });
        let row = (0..nb_flights)
            .map(|_| tokens.number("separation time"))
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }

    FlightCatalog::new(flights, SeparationMatrix::new(rows)?, freeze_time)
}

pub fn write_airland(catalog: &FlightCatalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, " {} {}", catalog.nb_flights(), catalog.freeze_time);
    for (f, row) in catalog.flights.iter().zip(catalog.separation.rows()) {
        let _ = writeln!(
            out,
            " {} {} {} {} {:.2} {:.2}",
            f.appearance, f.earliest, f.target, f.latest, f.early_rate, f.late_rate
        );
        for chunk in row.chunks(10) {
            let line = chunk.iter().map(|s| format!(" {s}")).collect::<String>();
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

/// Loads a json instance when the file ends in `.json`, an airland file otherwise.
pub fn load(path: impl AsRef<Path>) -> Result<FlightCatalog, InstanceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let catalog = if path.extension().is_some_and(|e| e == "json") {
        let catalog: FlightCatalog = serde_json::from_str(&text)?;
        let separation = SeparationMatrix::new(catalog.separation.rows().to_vec())?;
        FlightCatalog::new(catalog.flights, separation, catalog.freeze_time)?
    } else {
        parse_airland(&text)?
    };

    info!(path = %path.display(), flights = catalog.nb_flights(), freeze_time = catalog.freeze_time, "instance loaded");
    Ok(catalog)
}
