//! `krill`: command-line entry point for the thread-modular keyset/flow
//! proof engine.
//!
//! Parsing a concrete source language is out of scope for the core (spec
//! §1), so the "program file" this CLI takes is a one-line pointer to a
//! built-in scenario registered in [`demo`] rather than a program in some
//! surface syntax; [`demo::SCENARIOS`] lists what's available. Everything
//! downstream of scenario selection — the driver, the solver, the flow
//! and logic layers — is the real engine, unaware that its input didn't
//! come from a parser.

pub mod config;
pub mod demo;
pub mod error;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::RunConfig;
use error::CliError;

/// `krill` — verify a thread-modular keyset/flow-interface program.
#[derive(Parser, Debug)]
#[command(name = "krill", version, about, long_about = None)]
pub struct Cli {
    /// Path to a program file. Its first non-blank line names a built-in
    /// scenario (see `--list-scenarios`).
    pub program: PathBuf,

    /// Path to a TOML config file overriding the solver's tuning knobs
    /// (`max-inflow-predecessors`, `max-join`, `loop-abort-after`,
    /// `postprocess-flow-graphs`, `macro-strategy`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Raise the log level to `debug` (structured `tracing` spans for
    /// every interface function and command visited).
    #[arg(long)]
    pub debug_print: bool,

    /// Print the wall-clock time the proof took.
    #[arg(long)]
    pub timer: bool,

    /// List the built-in scenario names and exit.
    #[arg(long)]
    pub list_scenarios: bool,
}

fn init_logging(debug_print: bool) {
    let default_level = if debug_print { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn read_run_config(path: Option<&PathBuf>) -> Result<RunConfig, CliError> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| CliError::ConfigRead { path: path.clone(), source })?;
    toml::from_str(&text).map_err(|source| CliError::ConfigParse { path: path.clone(), source })
}

fn scenario_name(path: &PathBuf) -> Result<String, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ProgramRead { path: path.clone(), source })?;
    let name = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    Ok(name.to_string())
}

/// Parses arguments and runs the proof.
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.debug_print);

    if cli.list_scenarios {
        for name in demo::SCENARIOS {
            println!("{name}");
        }
        return Ok(());
    }

    let run_config = read_run_config(cli.config.as_ref())?;
    let name = scenario_name(&cli.program)?;
    let scenario = demo::load(&name).ok_or_else(|| CliError::UnknownScenario {
        name: name.clone(),
        available: demo::SCENARIOS,
    })?;
    info!(scenario = %name, "loaded scenario");

    let demo::Scenario { mut factory, config, functions } = scenario;
    let limits = run_config.limits();
    let strategy = run_config.strategy();

    let started = Instant::now();
    let report = keyset_proof::verify_program(&mut factory, &config, &limits, strategy, &functions)?;
    let elapsed = started.elapsed();
    info!(sweeps = report.sweeps, effects = report.pool.len(), "verification succeeded");

    println!(
        "verified {} interface function(s) in {} sweep(s), {} interference effect(s) recorded",
        functions.len(),
        report.sweeps,
        report.pool.len()
    );
    if cli.timer {
        println!("elapsed: {:.3}s", elapsed.as_secs_f64());
    }

    Ok(())
}
