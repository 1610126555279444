use std::{fs::File, io::Write, time::Duration};

use anyhow::Context;
use clap::Args;
use tracing::warn;

use crate::parser;
use crate::report::{Report, ReportFormat};
use crate::resolution::{schedule_dynamic, schedule_static, RollingConfig, StaticConfig, DEFAULT_MAX_DISPLACEMENT};
use crate::resolution::rolling::DEFAULT_FREEZE_WINDOW;

#[derive(Debug, Args)]
pub struct Solve {
    /// The path to the instance file (airland text, or json)
    #[clap(short, long)]
    pub instance: String,
    /// timeout of a single MILP solve, in seconds
    #[clap(short, long)]
    pub timeout: Option<u64>,
    /// Output format
    #[clap(short, long, value_enum, default_value="text")]
    pub format: ReportFormat,
    /// If present, the path where to write the schedule
    #[clap(short, long)]
    pub output: Option<String>,
}

impl Solve {
    fn time_limit(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    fn emit(&self, report: &impl Report) -> anyhow::Result<()> {
        let rendered = report.render(self.format)?;
        match self.output.as_ref() {
            Some(output) => File::create(output)
                .and_then(|mut f| f.write_all(rendered.as_bytes()))
                .with_context(|| format!("cannot write schedule to {output}"))?,
            None => print!("{rendered}"),
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct StaticSolve {
    #[command(flatten)]
    pub solve: Solve,
    /// number of runways
    #[clap(short, long, default_value="1")]
    pub runways: usize,
}

impl StaticSolve {
    pub fn solve(&self) -> anyhow::Result<()> {
        let catalog = parser::load(&self.solve.instance)?;
        let config = StaticConfig { runways: self.runways, time_limit: self.solve.time_limit() };
        let solution = schedule_static(&catalog, config)?;
        self.solve.emit(&solution)
    }
}

#[derive(Debug, Args)]
pub struct DynamicSolve {
    #[command(flatten)]
    pub solve: Solve,
    /// freeze window, defaults to the freeze time of the instance
    #[clap(long)]
    pub freeze: Option<f64>,
    /// upper bound on the displacement cost of a single flight
    #[clap(long, default_value_t=DEFAULT_MAX_DISPLACEMENT)]
    pub max_displacement: f64,
}

impl DynamicSolve {
    pub fn solve(&self) -> anyhow::Result<()> {
        let catalog = parser::load(&self.solve.instance)?;
        let freeze_window = match self.freeze {
            Some(freeze) => freeze,
            None if catalog.freeze_time > 0.0 => catalog.freeze_time,
            None => {
                warn!(freeze = DEFAULT_FREEZE_WINDOW, "instance has no freeze time, using default");
                DEFAULT_FREEZE_WINDOW
            },
        };
        let config = RollingConfig {
            freeze_window,
            max_displacement: self.max_displacement,
            time_limit: self.solve.time_limit(),
        };
        let solution = schedule_dynamic(&catalog, config)?;
        self.solve.emit(&solution)
    }
}
