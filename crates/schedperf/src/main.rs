//! schedperf: measure how fast a scheduler binds pods.
//!
//! # Usage
//!
//! ```text
//! schedperf run --config schedperf.toml --iterations 200
//! schedperf run --case 1000Nodes/1000Pods --format json
//! schedperf config > schedperf.toml
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use schedperf::{FileConfig, LocalClusterFactory, OutputFormat};
use schedperf_harness::BenchmarkDriver;

#[derive(Parser)]
#[command(
    name = "schedperf",
    about = "Scheduler throughput benchmark",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the benchmark matrix.
    Run(RunArgs),
    /// Print the default configuration as TOML.
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file (defaults apply when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Measured pods per case, raised to each case's minimum.
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Only run the named case (e.g. 1000Nodes/1000Pods). Repeatable.
    #[arg(long = "case")]
    cases: Vec<String>,

    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Keep each case's store in a redb file under this directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Config => {
            print!("{}", FileConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,schedperf=debug"));

    // Logs go to stderr so reports on stdout stay machine-readable.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config.bench.iterations = iterations;
    }
    if !args.cases.is_empty() {
        config.bench.cases.retain(|case| args.cases.contains(&case.name()));
        if config.bench.cases.is_empty() {
            anyhow::bail!("no configured case matches {:?}", args.cases);
        }
    }
    config.validate()?;

    let factory = LocalClusterFactory::new(args.data_dir, config.scheduler_config()?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut driver = BenchmarkDriver::from_config(factory, &config.bench)?.with_shutdown(shutdown_rx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        cases = config.bench.cases.len(),
        iterations = config.bench.iterations,
        "benchmark starting"
    );
    let reports = driver
        .run_matrix(&config.bench.cases, config.bench.iterations)
        .await;

    print!("{}", schedperf::render(&reports, args.format)?);

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "benchmark finished with failures");
        anyhow::bail!("{failed} of {} cases failed", reports.len());
    }
    info!(total = reports.len(), "benchmark finished");
    Ok(())
}
