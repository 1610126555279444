use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use alp_milp::generate::AlpGenerator;
use alp_milp::resolution::solve::{DynamicSolve, StaticSolve};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct AlpTools {
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a random instance
    Generate(AlpGenerator),
    /// Schedule every flight at once, on one or more runways
    Static(StaticSolve),
    /// Schedule flights as they appear with a rolling horizon
    Dynamic(DynamicSolve),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = AlpTools::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Generate(mut generate) => generate.generate().map_err(anyhow::Error::from),
        Command::Static(solve) => solve.solve(),
        Command::Dynamic(solve) => solve.solve(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}
