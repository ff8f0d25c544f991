use anyhow::Context;
use clap::Parser;
use std::env;
use std::path::PathBuf;

mod config;
mod error;
mod runner;
mod selection;

use config::{Platform, RunnerConfig};
use error::RunnerError;
use runner::{Plan, ProcessLauncher};

#[derive(Parser)]
#[command(name = "nan-spec-runner")]
#[command(version)]
#[command(about = "Build the NAN addon tests and run them under Electron")]
struct Cli {
    /// Comma-separated tests to run, e.g. --only=asyncworker,nan-test.js
    #[arg(long)]
    only: Option<String>,

    /// Electron source root (the directory holding third_party/nan)
    #[arg(long, env = "ELECTRON_SRC_DIR")]
    src_dir: Option<PathBuf>,

    /// Build output directory name under <src>/out, e.g. Testing
    #[arg(long, env = "ELECTRON_OUT_DIR")]
    out_dir: Option<String>,

    /// Print the planned commands as JSON instead of running them
    #[arg(long)]
    dry_run: bool,
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let src_dir = match cli.src_dir {
        Some(dir) => dir,
        None => env::current_dir().map_err(RunnerError::CurrentDir)?,
    };
    let out_dir = config::resolve_out_dir(&src_dir, cli.out_dir.as_deref())?;
    let ambient = env::vars_os().collect();
    let config = RunnerConfig::new(Platform::current(), src_dir, out_dir, ambient);

    // An empty --only means no filter at all.
    let only = cli
        .only
        .as_deref()
        .map(selection::parse_only)
        .filter(|entries| !entries.is_empty());
    if cli.dry_run {
        let tests = runner::select_tests(&config, only.as_deref())?;
        let plan = Plan::new(&config, tests);
        let json = serde_json::to_string_pretty(&plan).context("failed to render the run plan")?;
        println!("{}", json);
        return Ok(0);
    }

    Ok(runner::run(&config, only.as_deref(), &ProcessLauncher).await?)
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("An unhandled error occurred in the nan spec runner: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}
