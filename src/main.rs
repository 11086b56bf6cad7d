//! Teletekst main entry point
//!
//! This is the command-line interface for loading and decoding a single teletext page.

use clap::Parser;
use std::path::PathBuf;
use teletekst::config::{load_config, Config};
use teletekst::page::{PageEntity, PageId, HOME_PAGE};
use teletekst::{HttpFetcher, LoadPriority, PageLoader};
use tracing_subscriber::EnvFilter;

/// Teletekst: fetch and decode a teletext page
///
/// Loads one page at high priority and prints its decoded markup, or with
/// `--links` the pages it navigates to.
#[derive(Parser, Debug)]
#[command(name = "teletekst")]
#[command(version)]
#[command(about = "Fetch and decode a teletext page", long_about = None)]
struct Cli {
    /// Page to load, e.g. 101, 100/1 or 801-2
    #[arg(value_name = "PAGE", default_value = HOME_PAGE)]
    page: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print navigation and linked page ids instead of markup
    #[arg(long)]
    links: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let mut loader = PageLoader::new(&config, fetcher)?;

    let page_id = PageId::normalize(&cli.page);
    tracing::info!("Loading page {} from {}", page_id, config.fetch.base_url);

    let page = loader.load_async(page_id.as_str(), LoadPriority::High).await;

    if cli.verbose > 0 {
        eprintln!("{}", loader.stats());
        eprintln!(
            "Cache: {}/{} pages",
            loader.cache_len(),
            loader.cache_capacity()
        );
    }
    loader.shutdown();

    match page {
        Some(page) if cli.links => print_links(&page),
        Some(page) => println!("{}", page.html_data()),
        None => return Err(format!("Page {} not found", page_id).into()),
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
            0 => EnvFilter::new("teletekst=info,warn"),
            1 => EnvFilter::new("teletekst=debug,info"),
            2 => EnvFilter::new("teletekst=trace,debug"),
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

/// Prints the navigation and link metadata of a page
fn print_links(page: &PageEntity) {
    fn show(id: Option<&PageId>) -> &str {
        id.map(PageId::as_str).unwrap_or("-")
    }

    println!("=== Page {} ===", page.page_id());
    println!("  Previous: {}", show(page.prev_page_id()));
    println!("  Next: {}", show(page.next_page_id()));
    println!("  Previous subpage: {}", show(page.prev_sub_page_id()));
    println!("  Next subpage: {}", show(page.next_sub_page_id()));

    println!("\nFastext links ({}):", page.fast_link_page_ids().len());
    for id in page.fast_link_page_ids() {
        println!("  - {}", id);
    }

    println!("\nLinked pages ({}):", page.linked_page_ids().len());
    for id in page.linked_page_ids() {
        println!("  - {}", id);
    }

    println!("\nExpires at: {}", page.expires_at());
}
