//! Rendering of static and dynamic schedules.

use std::fmt::Write as _;

use clap::ValueEnum;
use serde::Serialize;

use crate::resolution::{DynamicSolution, Solution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

pub trait Report: Serialize {
    fn text(&self) -> String;

    fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Text => Ok(self.text()),
            ReportFormat::Json => serde_json::to_string_pretty(self),
        }
    }
}

impl Report for Solution {
    fn text(&self) -> String {
        let mut out = String::new();
        let with_runway = self.landings.iter().any(|l| l.runway.is_some());
        for l in self.landings.iter() {
            let _ = write!(out, "flight {:>4}  lands at {:>10.2}", l.flight, l.time);
            if let (true, Some(r)) = (with_runway, l.runway) {
                let _ = write!(out, "  on runway {}", r + 1);
            }
            out.push('\n');
        }
        let _ = writeln!(out, "landing cost {:.2}", self.cost);
        out
    }
}

impl Report for DynamicSolution {
    fn text(&self) -> String {
        let mut out = String::new();
        for s in self.steps.iter() {
            let _ = write!(out, "t={:>8.2}  flight {:>4} appears", s.time, s.activated);
            if !s.frozen.is_empty() {
                let frozen = s.frozen.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", ");
                let _ = write!(out, "  frozen [{frozen}]");
            }
            let _ = writeln!(out, "  landing {:.2}  displacement {:.2}", s.landing_cost, s.displacement_cost);
        }
        for l in self.landings.iter() {
            let _ = writeln!(out, "flight {:>4}  lands at {:>10.2}", l.flight, l.time);
        }
        let _ = writeln!(out, "displacement cost {:.2}", self.displacement_cost);
        let _ = writeln!(out, "landing cost {:.2}", self.landing_cost);
        out
    }
}
