//! Pantry-Harvest main entry point
//!
//! This is the command-line interface for the Pantry-Harvest catalog harvester.

use anyhow::Context;
use clap::Parser;
use pantry_harvest::config::{load_config_with_hash, Config};
use pantry_harvest::crawler::{run_crawl, run_discovery, HarvestContext};
use pantry_harvest::dedup::run_dedup;
use pantry_harvest::output::print_summary;
use pantry_harvest::query::CatalogView;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pantry-Harvest: a retailer catalog harvester
///
/// Pantry-Harvest discovers the retailer's category taxonomy, crawls every
/// category's product listing with a bounded pool of workers, and
/// consolidates the sightings into one record per product.
#[derive(Parser, Debug)]
#[command(name = "pantry-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A retailer catalog harvester", long_about = None)]
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

    /// Discover categories and save the category table
    #[arg(long, group = "mode")]
    discover_only: bool,

    /// Limited crawl: first categories only, few pages each, separate output files
    #[arg(long, group = "mode")]
    test_run: bool,

    /// Deduplicate the full product log into unique products and mappings
    #[arg(long, group = "mode")]
    dedupe: bool,

    /// List chart values of the products in a category
    #[arg(long, value_name = "CATEGORY_ID", group = "mode")]
    query: Option<String>,

    /// Dietary tag filter for --query (case-insensitive substring)
    #[arg(long, requires = "query")]
    dietary: Option<String>,

    /// Print the category hierarchy built from the category mapping
    #[arg(long, group = "mode")]
    hierarchy: bool,

    /// Print every dietary tag found in the unique products
    #[arg(long, group = "mode")]
    tags: bool,

    /// Number of parallel workers (overrides the config)
    #[arg(long, value_name = "N")]
    max_workers: Option<usize>,

    /// Remove existing product logs before crawling instead of appending
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(category_id) = &cli.query {
        return handle_query(&config, category_id, cli.dietary.as_deref());
    }
    if cli.hierarchy {
        return handle_hierarchy(&config);
    }
    if cli.tags {
        return handle_tags(&config);
    }
    if cli.dedupe {
        return handle_dedupe(&config);
    }

    let discover_only = cli.discover_only;
    let ctx = HarvestContext::new(config, cli.test_run, cli.max_workers)
        .context("Failed to build HTTP client")?
        .with_config_hash(config_hash);
    tracing::info!("Using max workers = {}", ctx.max_workers);

    ctx.warm_up().await;

    if discover_only {
        let categories = run_discovery(&ctx).await.context("Category discovery failed")?;
        println!("Discovered {} categories", categories.len());
        return Ok(());
    }

    if cli.fresh {
        tracing::info!("Starting fresh crawl (removing previous product logs)");
    }

    let summary = run_crawl(&ctx, cli.fresh).await.context("Crawl setup failed")?;
    print_summary(&summary);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pantry_harvest=info,warn"),
            1 => EnvFilter::new("pantry_harvest=debug,info"),
            2 => EnvFilter::new("pantry_harvest=trace,debug"),
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

/// Handles the --dedupe mode: consolidates the full-run product log
fn handle_dedupe(config: &Config) -> anyhow::Result<()> {
    let (_, input) = config.output.product_paths(false);
    let report = run_dedup(&config.output, &input).context("Deduplication failed")?;

    println!("=== Deduplication ===\n");
    println!("  Records read: {}", report.records_read);
    println!("  Malformed lines skipped: {}", report.malformed_lines);
    println!("  Records without stockcode: {}", report.missing_stockcode);
    println!("  Unique products: {}", report.unique_products);
    println!("  Category mappings: {}", report.mapping_rows);

    Ok(())
}

/// Handles the --query mode: prints chart points as JSON
fn handle_query(config: &Config, category_id: &str, dietary: Option<&str>) -> anyhow::Result<()> {
    let view = CatalogView::load(&config.output).context("Failed to load catalog")?;
    let points = view.products_for_category(category_id, dietary);
    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}

/// Handles the --hierarchy mode: prints the category outline
fn handle_hierarchy(config: &Config) -> anyhow::Result<()> {
    let view = CatalogView::load(&config.output).context("Failed to load catalog")?;
    let forest = view.forest();

    print!("{}", forest.render_text());

    let orphans = forest.orphans().count();
    if orphans > 0 {
        println!("\n{} categories could not be placed in the hierarchy", orphans);
    }

    Ok(())
}

/// Handles the --tags mode: prints the dietary tags, one per line
fn handle_tags(config: &Config) -> anyhow::Result<()> {
    let view = CatalogView::load(&config.output).context("Failed to load catalog")?;
    for tag in view.dietary_tags() {
        println!("{}", tag);
    }
    Ok(())
}
