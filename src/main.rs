//! seo-crawler main entry point
//!
//! This is the command-line interface for the seo-crawler site crawler.

use anyhow::Context;
use clap::Parser;
use seo_crawler::config::{load_config_with_hash, Config};
use seo_crawler::output::{write_markdown_summary, SqliteReportWriter};
use seo_crawler::{CrawlReport, Crawler};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// seo-crawler: A polite site crawler for SEO audits
///
/// Crawls a single site starting from a URL while respecting robots.txt,
/// sitemaps, and a request rate budget, then writes the pages, links, and
/// images it found to SQLite and a markdown summary.
#[derive(Parser, Debug)]
#[command(name = "seo-crawler")]
#[command(version)]
#[command(about = "A polite site crawler for SEO audits", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URL the crawl starts from
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// SQLite database to write the report to (overrides the config)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Markdown summary file to write (overrides the config)
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let database = cli.database.clone().or_else(|| {
        config
            .output
            .as_ref()
            .and_then(|o| o.database_path.as_ref())
            .map(PathBuf::from)
    });
    let summary = cli.summary.clone().or_else(|| {
        config
            .output
            .as_ref()
            .and_then(|o| o.summary_path.as_ref())
            .map(PathBuf::from)
    });

    if cli.dry_run {
        print_dry_run(&config, &cli.start_url, database.as_deref(), summary.as_deref());
        return Ok(());
    }

    let report = handle_crawl(config, &cli.start_url).await?;

    if let Some(path) = &database {
        let mut writer = SqliteReportWriter::create(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let run_id = writer.write_report(&report, Some(&config_hash))?;
        tracing::info!("Report written to {} (run {})", path.display(), run_id);
    }

    if let Some(path) = &summary {
        write_markdown_summary(&report, path)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        tracing::info!("Summary written to {}", path.display());
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
            0 => EnvFilter::new("seo_crawler=info,warn"),
            1 => EnvFilter::new("seo_crawler=debug,info"),
            2 => EnvFilter::new("seo_crawler=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective settings
fn print_dry_run(config: &Config, start_url: &str, database: Option<&Path>, summary: Option<&Path>) {
    println!("=== seo-crawler Dry Run ===\n");

    println!("Start URL: {}\n", start_url);

    println!("Crawler Configuration:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Rate limit: {}",
        if config.crawler.rate_limit.is_empty() {
            "unlimited"
        } else {
            &config.crawler.rate_limit
        }
    );
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Follow sitemaps: {}", config.crawler.follow_sitemaps);

    println!("\nRetry:");
    println!("  Attempts: {}", config.retry.attempts);
    println!("  Delay: {}ms (x{})", config.retry.delay_ms, config.retry.multiplier);
    println!("  Max delay: {}ms", config.retry.max_delay_ms);

    println!("\nCache:");
    println!("  Pages: {}", config.cache.enabled);
    println!("  Page TTL: {}s", config.cache.duration_secs);
    println!("  Robots TTL: {}s", config.cache.robots_ttl_secs);

    println!("\nOutput:");
    println!(
        "  Database: {}",
        database.map_or("-".to_string(), |p| p.display().to_string())
    );
    println!(
        "  Summary: {}",
        summary.map_or("-".to_string(), |p| p.display().to_string())
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation; Ctrl-C cancels it
async fn handle_crawl(config: Config, start_url: &str) -> anyhow::Result<CrawlReport> {
    let crawler = Crawler::new(config)?;
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling crawl");
                cancel.cancel();
            }
        });
    }

    match crawler.crawl_site(&cancel, start_url).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed: {} pages ({} failed, {} blocked by robots.txt) in {:.1}s",
                report.stats.total_pages,
                report.stats.failed_pages,
                report.stats.robots_blocked,
                report.duration.as_secs_f64()
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
