//! Wardscan main entry point
//!
//! This is the command-line interface for the Wardscan crawl-and-audit engine.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wardscan::config::{load_config_with_hash, Config};
use wardscan::output::{generate_markdown_summary, print_report};
use wardscan::ScannerBuilder;

/// Wardscan: crawl and audit a web application
///
/// Wardscan discovers the pages of a target application within the
/// configured scope and audits each of them, retrying unresponsive URLs a
/// bounded number of times.
#[derive(Parser, Debug)]
#[command(name = "wardscan")]
#[command(version)]
#[command(about = "Crawl-and-audit scheduling engine", long_about = None)]
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

    /// Validate config and show what would be scanned without scanning
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_scan(&config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wardscan=info,warn"),
            1 => EnvFilter::new("wardscan=debug,info"),
            2 => EnvFilter::new("wardscan=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be scanned
fn handle_dry_run(config: &Config) {
    println!("=== Wardscan Dry Run ===\n");

    println!("Target: {}", config.scan.url);
    println!("  Crawl: {}", config.scan.crawl);
    match config.scan.page_limit {
        Some(limit) => println!("  Page limit: {}", limit),
        None => println!("  Page limit: none"),
    }
    println!("  Max tries: {}", config.scan.max_tries);
    println!("  Page queue size: {}", config.scan.page_queue_size);

    println!("\nScope:");
    println!("  Domains: {:?}", config.scope.domains);
    println!("  Include: {:?}", config.scope.include);
    println!("  Exclude: {:?}", config.scope.exclude);
    println!("  Exclude content: {:?}", config.scope.exclude_content);
    println!("  Redundant rules: {}", config.scope.redundant.len());
    match config.scope.dom_depth_limit {
        Some(limit) => println!("  DOM depth limit: {}", limit),
        None => println!("  DOM depth limit: none"),
    }

    println!("\nSeeds:");
    for path in &config.scope.extend_paths {
        println!("  + {}", path);
    }
    for path in &config.scope.restrict_paths {
        println!("  ! {} (forced)", path);
    }

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout);

    println!("\n✓ Configuration is valid");
}

/// Handles the main scan operation
async fn handle_scan(config: &Config, config_hash: String) -> anyhow::Result<()> {
    let mut scanner = ScannerBuilder::from_config(config)?
        .config_hash(config_hash)
        .build()?;

    let control = scanner.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting scan");
            control.abort();
        }
    });

    let report = match scanner.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            return Err(e.into());
        }
    };

    print_report(&report);

    if let Some(path) = &config.output.summary_path {
        generate_markdown_summary(&report, Path::new(path))
            .with_context(|| format!("Failed to write summary to {}", path))?;
        println!("✓ Summary written to: {}", path);
    }

    Ok(())
}
