//! pulse_commit binary
//!
//! Runs the scheduled metrics commit loop, or one of its pieces on demand.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pulse_commit::{
    shutdown_signal, CommitWorkflow, Config, MetricsFormat, MetricsRecorder, Scheduler,
    SystemCollector, SystemCommandRunner,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pulse_commit")]
#[command(about = "Scheduled host metrics with a daily git commit log")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "Samples CPU, memory, disk and network usage at fixed times of day, appends a \
                  summary line to a commit-log file and pushes it to the configured remote.\n\n\
                  Run a single instance per repository: concurrent instances are not guarded \
                  against and can corrupt the log or its history."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository root (overrides the configuration file)
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted (default)
    Run,

    /// Run a single commit cycle and exit
    Once,

    /// Print a summary of current system metrics
    Summary,

    /// Record one snapshot to a metrics store without touching git
    Record(RecordArgs),
}

#[derive(Args)]
struct RecordArgs {
    /// Store format: structured (json) or flat (txt); inferred from --output when omitted
    #[arg(short, long)]
    format: Option<MetricsFormat>,

    /// Store path (defaults to the configured metrics file)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match &cli.command {
        Some(Commands::Run) | None => run_command(&config).await?,
        Some(Commands::Once) => {
            if !once_command(&config).await? {
                std::process::exit(1);
            }
        }
        Some(Commands::Summary) => summary_command(&config).await?,
        Some(Commands::Record(args)) => record_command(&config, args).await?,
    }

    Ok(())
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    // RUST_LOG, when set, overrides the flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli).as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(repo) = &cli.repo {
        config = config.with_repo_path(repo);
    }

    config.validate().context("Invalid configuration")?;
    info!("Repository: {}", config.repo_path.display());
    Ok(config)
}

fn build_workflow(config: &Config) -> Result<CommitWorkflow<SystemCollector, SystemCommandRunner>> {
    config
        .ensure_directories()
        .context("Failed to create data directories")?;

    Ok(CommitWorkflow::new(
        config,
        SystemCollector::from_config(config),
        SystemCommandRunner,
    ))
}

async fn run_command(config: &Config) -> Result<()> {
    // Install signal handlers before the first cycle starts.
    let shutdown = shutdown_signal();

    let workflow = build_workflow(config)?;
    let mut scheduler =
        Scheduler::new(config, workflow).context("Failed to register trigger times")?;

    scheduler.run_until(shutdown).await;
    Ok(())
}

async fn once_command(config: &Config) -> Result<bool> {
    let mut workflow = build_workflow(config)?;
    Ok(workflow.run_cycle().await.is_success())
}

async fn summary_command(config: &Config) -> Result<()> {
    let mut recorder =
        MetricsRecorder::new(SystemCollector::from_config(config), config.metrics_path());
    println!("{}", recorder.get_summary().await?);
    Ok(())
}

async fn record_command(config: &Config, args: &RecordArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| config.metrics_path());
    let format = args
        .format
        .or_else(|| MetricsFormat::from_path(&output))
        .unwrap_or(config.format);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut recorder = MetricsRecorder::new(SystemCollector::from_config(config), &output);
    let snapshot = recorder.log_metrics(format).await?;

    println!("{}", snapshot.summary());
    println!("✓ Metrics saved to: {}", output.display());
    Ok(())
}
