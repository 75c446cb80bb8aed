//! E2E test runner entry point
//!
//! Exit status: 0 when every test passed (flaky counts as passed), 1 when
//! any test failed, 2 when the environment was unusable.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rwa_e2e::backend::BackendProcess;
use rwa_e2e::config::is_ci;
use rwa_e2e::runner::plan;
use rwa_e2e::{catalogue, E2eResult, Filter, Suite, SuiteConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "rwa-e2e")]
#[command(about = "E2E and API test runner for the Real World App")]
struct Args {
    /// Suite configuration file (defaults apply when missing)
    #[arg(short, long, default_value = "e2e.yaml")]
    config: PathBuf,

    /// Run only tests whose name contains this text
    #[arg(short, long)]
    name: Option<String>,

    /// Run only tests with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only this suite
    #[arg(short, long, value_enum)]
    suite: Option<Suite>,

    /// Run browser tests only in this project
    #[arg(short, long)]
    project: Option<String>,

    /// Retries per failed test (overrides config and CI default)
    #[arg(long)]
    retries: Option<u32>,

    /// Concurrent tests (overrides config and CI default)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show the browser windows
    #[arg(long)]
    headed: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Start the backend when it is not running
    #[arg(long)]
    start_backend: bool,

    /// Print the planned tests and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = SuiteConfig::load(&args.config)?;
    if args.retries.is_some() {
        config.retries = args.retries;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    config.resolve_ci(is_ci());

    let filter = Filter {
        name: args.name,
        tag: args.tag,
        suite: args.suite,
        project: args.project,
    };
    let scenarios = catalogue();

    if args.list {
        for job in plan(&scenarios, &config.projects, &filter) {
            for line in job.describe() {
                println!("{}", line);
            }
        }
        return Ok(true);
    }

    info!(
        "RWA e2e v{} (retries: {}, workers: {})",
        env!("CARGO_PKG_VERSION"),
        config.retries(),
        config.workers()
    );

    let runner = TestRunner::new(config)?;

    // Held until the run is over; stopped on drop
    let _backend = if args.start_backend {
        BackendProcess::ensure_running(runner.api(), &runner.config().backend).await?
    } else {
        None
    };

    let results = runner.run(&scenarios, &filter).await?;
    runner.write_results(&results)?;

    Ok(results.is_success())
}
