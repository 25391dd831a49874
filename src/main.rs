//! Linkprobe main entry point
//!
//! This is the command-line interface for the Linkprobe URL checker.

use anyhow::Context;
use clap::Parser;
use linkprobe::config::load_config_with_hash;
use linkprobe::storage::{MemoryQueue, MemoryResultCache, ResultCache};
use linkprobe::{CheckResult, CheckTask, Checker, Classification, UrlCheck};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Linkprobe: a polite HTTP link checker
///
/// Linkprobe checks each URL with HEAD (falling back to GET where servers
/// need it), respects robots.txt, follows redirects and reports whether the
/// link is valid, deserves a warning, or is broken.
#[derive(Parser, Debug)]
#[command(name = "linkprobe")]
#[command(version)]
#[command(about = "A polite HTTP link checker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to check
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Page the URLs were found on, sent as Referer
    #[arg(long, value_name = "URL")]
    parent: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let cache = Arc::new(MemoryResultCache::new());
    let queue = Arc::new(MemoryQueue::new());
    let checker = Checker::new(config)?
        .with_result_cache(cache.clone())
        .with_queue(queue.clone());
    tracing::info!("Checking {} URLs as {}", cli.urls.len(), checker.user_agent());

    let mut broken = 0;
    for url in &cli.urls {
        let mut task = CheckTask::new(url.as_str());
        if let Some(parent) = &cli.parent {
            task = task.with_parent(parent.as_str());
        }

        match check_one(&checker, cache.as_ref(), task).await {
            Ok(result) => {
                if result.is_error() {
                    broken += 1;
                }
                print_result(&result);
            }
            Err(e) => {
                broken += 1;
                tracing::error!("Check of {} failed: {}", url, e);
                println!("{}\n  Result: error ({})\n", url, e);
            }
        }
    }

    while let Some(task) = queue.pop() {
        println!("Handed off: {} (not an http(s) URL)", task.url);
    }

    if broken > 0 {
        anyhow::bail!("{} of {} URLs are broken", broken, cli.urls.len());
    }
    Ok(())
}

/// Runs one check and stores the result under every key the session reached
async fn check_one(
    checker: &Checker,
    cache: &dyn ResultCache,
    task: CheckTask,
) -> linkprobe::Result<CheckResult> {
    let mut session = checker.session(task)?;
    let result = session.check().await?;
    if result.classification.is_terminal() {
        for key in session.cache_keys() {
            cache.set(&key, result.clone());
        }
    }
    Ok(result)
}

fn print_result(result: &CheckResult) {
    println!("{}", result.url);
    for info in &result.infos {
        println!("  Info: {}", info);
    }
    for warning in &result.warnings {
        println!("  Warning: {}", warning);
    }
    match (&result.classification, &result.delegated_to) {
        (Classification::Pending, Some(target)) => println!("  Result: delegated to {}", target),
        (classification, _) => println!(
            "  Result: {} {}{}",
            classification,
            result.summary.as_deref().unwrap_or(""),
            if result.cached { " (cached)" } else { "" }
        ),
    }
    println!();
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkprobe=info,warn"),
            1 => EnvFilter::new("linkprobe=debug,info"),
            2 => EnvFilter::new("linkprobe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}
