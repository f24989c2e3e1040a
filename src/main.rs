//! csma-sim CLI
//!
//! Runs the scenarios of one section of a scenario file and writes one CSV
//! trace per run.
//!
//! # Example
//!
//! ```bash
//! # Every run of the default "simulation" section
//! csma-sim scenarios.json
//!
//! # Runs 0 and 3 of another section, traces under out/
//! csma-sim scenarios.json --section dense --run 0 --run 3 --output-dir out
//!
//! # How many runs does the section expand to?
//! csma-sim scenarios.json --list
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use csma_sim::{run_scenario, CsvLogger, RunConfig, Scenario, SimResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// CSMA/CA simulator
///
/// Deterministic: the same scenario and seed always produce the same trace.
#[derive(Parser, Debug)]
#[command(name = "csma-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (JSON)
    config: PathBuf,

    /// Section of the scenario file to run
    #[arg(short = 's', long, default_value = "simulation")]
    section: String,

    /// Run index within the section; repeat for several. Defaults to all runs.
    #[arg(short = 'r', long = "run")]
    runs: Vec<usize>,

    /// Print the number of runs in the section and exit
    #[arg(long)]
    list: bool,

    /// Directory for the trace files
    #[arg(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,csma_sim=info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_internal() {
                error!(error = %e, "simulation aborted");
            } else {
                error!(error = %e, "cannot run scenario");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> SimResult<()> {
    let scenario = Scenario::load(&args.config, &args.section)?;

    if args.list {
        println!("{}", scenario.run_count());
        return Ok(());
    }

    let indices: Vec<usize> = if args.runs.is_empty() {
        (0..scenario.run_count()).collect()
    } else {
        args.runs.clone()
    };

    fs::create_dir_all(&args.output_dir)?;
    for index in indices {
        let config = scenario.run(index)?;
        let path = trace_path(&args.output_dir, scenario.name(), &config);
        execute(&config, &path)?;
    }
    Ok(())
}

fn trace_path(dir: &Path, section: &str, config: &RunConfig) -> PathBuf {
    match &config.output {
        Some(name) => dir.join(name),
        None => dir.join(format!("{section}_{}.csv", config.index)),
    }
}

fn execute(config: &RunConfig, path: &Path) -> SimResult<()> {
    let logger = CsvLogger::new(BufWriter::new(File::create(path)?))?;
    let (summary, logger) = run_scenario(config, logger)?;
    logger.finish()?;

    info!(run = config.index, trace = %path.display(), "trace written");
    println!("run {}: {summary}", config.index);
    Ok(())
}
