use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueHint};
use serde_json::to_writer_pretty;
use shipyard::config::{self, Config, DEFAULT_CONFIG_FILE};
use shipyard::context::ReleaseContext;
use shipyard::errlog;
use shipyard::errors::ReleaseError;
use shipyard::init::generate_config;
use shipyard::observability::{MetricsCollector, MetricsSnapshot, log_snapshot};
use shipyard::pipeline::PipelineExecutor;
use shipyard::publishers;
use shipyard::stages;
use shipyard::validation::validate_config;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = configure_tracing(cli.debug) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Release(args) => run_release(args),
        Commands::Check { config } => check_config(&config),
        Commands::Init {
            config,
            project_name,
            force,
        } => init_config(&config, project_name, force),
        Commands::ListStages => list_stages(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ReleaseError>() {
            Some(release_err) if !errlog::report(release_err) => ExitCode::SUCCESS,
            Some(_) => ExitCode::FAILURE,
            None => {
                error!("{err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn configure_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

/// Loads `path`, falling back to the defaults when the default config file
/// is absent.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
        warn!(file = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    Config::load(path)
}

fn run_release(args: ReleaseArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let workdir = env::current_dir().context("Failed to determine current directory")?;

    let mut ctx = ReleaseContext::new(config, workdir);
    ctx.parallelism = config::resolve_parallelism(args.parallelism, &ctx.config);
    ctx.snapshot = args.snapshot;
    ctx.skip_publish = args.skip_publish || args.snapshot;
    ctx.skip_validate = args.skip_validate;
    if let Some(path) = &args.release_notes {
        let notes = fs::read_to_string(path)
            .with_context(|| format!("Failed to read release notes: {}", path.display()))?;
        ctx.release_notes = Some(notes);
    }

    let metrics = MetricsCollector::new();
    let executor = PipelineExecutor::new(stages::default_stages()?, metrics.clone());
    let report = executor.run(&mut ctx);
    for outcome in &report.stages {
        info!(
            stage = outcome.name,
            state = ?outcome.state,
            duration_ms = outcome.duration.as_secs_f64() * 1_000.0,
            "stage finished"
        );
    }

    let snapshot = metrics.snapshot();
    if args.print_metrics {
        log_snapshot(&snapshot);
    }
    let outcome = report.into_result();
    let written = write_metrics(
        &snapshot,
        args.metrics_json.as_deref(),
        args.metrics_prometheus.as_deref(),
    );
    match (written, &outcome) {
        (Err(err), Err(_)) => error!("{err:#}"),
        (Err(err), Ok(_)) => return Err(err),
        (Ok(()), _) => {}
    }

    outcome?;
    info!(version = %ctx.version, "release succeeded");
    Ok(())
}

fn write_metrics(
    snapshot: &MetricsSnapshot,
    json_path: Option<&Path>,
    prometheus_path: Option<&Path>,
) -> Result<()> {
    if let Some(path) = json_path {
        create_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        to_writer_pretty(file, snapshot)
            .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
        info!(metrics = %path.display(), "Metrics JSON written");
    }
    if let Some(path) = prometheus_path {
        create_parent(path)?;
        fs::write(path, snapshot.to_prometheus())
            .with_context(|| format!("Failed to write Prometheus metrics: {}", path.display()))?;
        info!(metrics = %path.display(), "Prometheus metrics written");
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create metrics directory: {}", parent.display()))?;
    }
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    let registry = publishers::default_registry()?;
    let report = validate_config(&config, &registry);

    for warning in &report.warnings {
        warn!(file = %path.display(), "{warning}");
    }

    if report.is_ok() {
        info!(file = %path.display(), "config is valid");
        Ok(())
    } else {
        for error_msg in &report.errors {
            error!(file = %path.display(), "{error_msg}");
        }
        Err(anyhow!(
            "config validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn init_config(path: &Path, project_name: Option<String>, force: bool) -> Result<()> {
    let project_name = match project_name {
        Some(name) => name,
        None => env::current_dir()
            .context("Failed to determine current directory")?
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string()),
    };
    let written = generate_config(&project_name, path, force)?;
    info!(file = %written.display(), project = %project_name, "config written");
    Ok(())
}

fn list_stages() -> Result<()> {
    let stages = stages::default_stages()?;
    println!("Release stages:");
    for stage in &stages {
        println!("- {:<10} {}", stage.name(), stage.describe());
    }
    let registry = publishers::default_registry()?;
    println!("Publishers:");
    for (name, phase) in registry.entries() {
        println!("- {name:<10} {phase}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "shipyard", version, about = "Release pipeline orchestrator")]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, collect and publish a release.
    Release(ReleaseArgs),
    /// Check a config file for errors.
    Check {
        #[arg(
            short = 'f',
            long,
            default_value = DEFAULT_CONFIG_FILE,
            value_hint = ValueHint::FilePath
        )]
        config: PathBuf,
    },
    /// Write a starter config file.
    Init {
        #[arg(
            short = 'f',
            long,
            default_value = DEFAULT_CONFIG_FILE,
            value_hint = ValueHint::FilePath
        )]
        config: PathBuf,
        #[arg(long)]
        project_name: Option<String>,
        #[arg(long)]
        force: bool,
    },
    ListStages,
}

#[derive(clap::Args)]
struct ReleaseArgs {
    #[arg(short = 'f', long, default_value = DEFAULT_CONFIG_FILE, value_hint = ValueHint::FilePath)]
    config: PathBuf,
    /// Generate an unversioned snapshot release; implies --skip-publish.
    #[arg(long)]
    snapshot: bool,
    #[arg(long)]
    skip_publish: bool,
    #[arg(long)]
    skip_validate: bool,
    /// Concurrent uploads per publisher, 0 for unlimited.
    #[arg(short = 'p', long)]
    parallelism: Option<i64>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    release_notes: Option<PathBuf>,
    #[arg(long)]
    print_metrics: bool,
    #[arg(long = "metrics-json")]
    metrics_json: Option<PathBuf>,
    #[arg(long = "metrics-prometheus")]
    metrics_prometheus: Option<PathBuf>,
}
