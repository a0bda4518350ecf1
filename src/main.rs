//! Catalog Harvester main entry point
//!
//! This is the command-line interface for the resumable catalog harvester.

use anyhow::Context;
use catalog_harvester::config::{clamp, load_config_with_hash, validate, Config};
use catalog_harvester::crawler::run_harvest;
use catalog_harvester::output::{print_statistics, CheckpointStatistics};
use catalog_harvester::state::CheckpointFile;
use catalog_harvester::RunControl;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog Harvester: a resumable, concurrent catalog crawler
///
/// Harvests item details and reviews from a remote store catalog until a
/// target number of valid items is reached, checkpointing progress so an
/// interrupted run picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version)]
#[command(about = "A resumable, concurrent catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Delete checkpoint files and start over
    #[arg(long)]
    reset: bool,

    /// Process items one at a time
    #[arg(long, conflicts_with = "parallel")]
    sequential: bool,

    /// Process items with the worker pool
    #[arg(long, conflicts_with = "sequential")]
    parallel: bool,

    /// Override the worker pool size
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Override the number of items to accept
    #[arg(long, value_name = "N")]
    max_items: Option<u64>,

    /// Override the number of reviews per item
    #[arg(long, value_name = "N")]
    max_reviews: Option<u32>,

    /// Validate config and show the effective settings without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&cli, &mut config)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config);
    } else {
        handle_harvest(&config, cli.reset).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides, then re-runs clamping and validation
fn apply_overrides(cli: &Cli, config: &mut Config) -> anyhow::Result<()> {
    if cli.sequential {
        config.harvest.parallel = false;
    }
    if cli.parallel {
        config.harvest.parallel = true;
    }
    if let Some(workers) = cli.workers {
        config.harvest.workers = workers;
    }
    if let Some(max_items) = cli.max_items {
        config.harvest.max_items = max_items;
    }
    if let Some(max_reviews) = cli.max_reviews {
        config.harvest.max_reviews = max_reviews;
    }

    clamp(config);
    validate(config).context("Invalid command-line override")?;
    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog Harvester Dry Run ===\n");

    println!("Harvest:");
    println!("  Goal: {} items", config.harvest.max_items);
    println!("  Reviews per item: {}", config.harvest.max_reviews);
    if config.harvest.parallel {
        println!(
            "  Mode: parallel ({} workers, batches of {})",
            config.harvest.workers, config.harvest.batch_size
        );
    } else {
        println!("  Mode: sequential");
    }
    println!(
        "  Checkpoint every {} items",
        config.harvest.checkpoint_interval
    );

    println!("\nFilter:");
    println!("  Kind: {}", config.filter.kind);
    println!("  Excluded category: {}", config.filter.excluded_category);

    println!("\nAPI:");
    println!("  Catalog: {}", config.api.catalog_url);
    println!("  Store: {}", config.api.store_url);

    println!("\nOutput:");
    println!("  Details: {}", config.output.details_path);
    println!("  Reviews: {}", config.output.reviews_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!(
        "\nProxies: {}",
        config.proxy.list_path.as_deref().unwrap_or("none (local only)")
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) {
    let file = CheckpointFile::new(&config.output.checkpoint_path);
    let (checkpoint, source) = file.load();

    match source {
        Some(path) => println!("Checkpoint: {}\n", path.display()),
        None => println!("No checkpoint found at {}\n", config.output.checkpoint_path),
    }

    print_statistics(&CheckpointStatistics::from(&checkpoint));
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, reset: bool) -> anyhow::Result<()> {
    if reset {
        tracing::info!("Starting fresh harvest (ignoring previous state)");
    } else {
        tracing::info!("Starting harvest (will resume from checkpoint if present)");
    }

    let control = Arc::new(RunControl::new());
    spawn_signal_handler(Arc::clone(&control));

    let summary = run_harvest(config, control, reset)
        .await
        .context("Harvest failed")?;

    summary.log();
    tracing::info!("Details written to {}", config.output.details_path);
    tracing::info!("Reviews written to {}", config.output.reviews_path);

    Ok(())
}

/// First interrupt winds the run down; a second one exits immediately
fn spawn_signal_handler(control: Arc<RunControl>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::warn!("Interrupt received, finishing in-flight items and saving state");
        tracing::warn!("Press Ctrl+C again to force quit");
        control.interrupt();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nForce quit requested, exiting immediately...");
            std::process::exit(1);
        }
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
