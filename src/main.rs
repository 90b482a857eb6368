mod config;
mod engine;
mod error;
mod export;
mod models;
mod scrapers;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use config::{PortalConfig, RunConfig};
use engine::{AttributeExtractor, PaginationController, RunOutcome, RunReport};
use scrapers::{BrowserProvider, CardSelectors, HttpProvider, PageSnapshotProvider};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Headless Chrome, renders and scrolls every page
    Browser,
    /// Plain HTTP fetches, no JavaScript
    Http,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape individual property listings from Portal Inmobiliario")]
struct Args {
    /// Comuna to search in, e.g. "las condes" or "providencia"
    #[arg(long)]
    comuna: String,

    /// "departamento" (apartment) or "casa" (house)
    #[arg(long, default_value = "departamento")]
    property_type: String,

    /// Maximum number of result pages to visit
    #[arg(long, default_value_t = 3)]
    max_pages: u32,

    /// Time allowed for loading or advancing one page, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = ProviderKind::Browser)]
    provider: ProviderKind,

    /// Show the browser window
    #[arg(long, default_value_t = false)]
    headed: bool,

    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// Skip the CSV export
    #[arg(long, default_value_t = false)]
    no_csv: bool,

    /// Skip the URL list export
    #[arg(long, default_value_t = false)]
    no_urls: bool,

    /// Also write the full run report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// JSON file overriding the default page selectors
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Save HTML and a screenshot of every rendered page here
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

async fn paginate<P: PageSnapshotProvider>(
    provider: &mut P,
    extractor: &AttributeExtractor,
    run_config: &RunConfig,
    start_url: &Url,
) -> RunReport {
    info!(provider = provider.name(), "Starting pagination");
    PaginationController::new(provider, extractor, run_config)
        .run(start_url)
        .await
}

fn print_summary(report: &RunReport) {
    println!();
    println!("📋 EXTRACTION SUMMARY:");
    println!("   Total properties found: {}", report.records.len());
    println!("   Pages processed: {}", report.pages_visited);
    println!("   Cards skipped: {}", report.rejected);
    match &report.outcome {
        RunOutcome::Done(reason) => println!("   Finished: {reason:?}"),
        RunOutcome::Failed(failure) => {
            println!("   Stopped early: {failure}");
            println!("   Missing from page {} onwards", failure.page());
        }
    }
    println!();

    for (i, record) in report.records.iter().take(5).enumerate() {
        let na = || "N/A".to_string();
        let location: String = record
            .location
            .as_deref()
            .unwrap_or("N/A")
            .chars()
            .take(50)
            .collect();
        println!(
            "{}. {} bedrooms | {} bathrooms | {} | {}",
            i + 1,
            record.bedroom_count.map_or_else(na, |n| n.to_string()),
            record.bathroom_count.map_or_else(na, |n| n.to_string()),
            record.surface_area.as_deref().unwrap_or("N/A"),
            location,
        );
        println!("   URL: {}", record.url);
    }
    if report.records.len() > 5 {
        println!("   ... and {} more", report.records.len() - 5);
    }
    println!();
}

async fn export(args: &Args, report: &RunReport) -> Result<()> {
    let records = report.records.records();
    if records.is_empty() {
        warn!("No properties to export");
    } else {
        if !args.no_csv {
            let path = args.output_dir.join(export::CSV_FILE);
            export::write_csv(&path, records).await?;
            info!("💾 Saved {} properties to {}", records.len(), path.display());
        }
        if !args.no_urls {
            let path = args.output_dir.join(export::URLS_FILE);
            export::write_urls(&path, records).await?;
            info!("💾 Saved URLs to {}", path.display());
        }
    }

    if args.json {
        let path = args.output_dir.join(export::JSON_FILE);
        export::write_json(&path, report).await?;
        info!("💾 Saved run report to {}", path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("🏠 Portal Scout - Portal Inmobiliario Scraper");

    // Everything that can be wrong with the configuration fails here,
    // before Chrome or the HTTP client exists.
    let run_config = RunConfig::new(
        &args.comuna,
        &args.property_type,
        args.max_pages,
        Duration::from_secs(args.timeout_secs),
    )?;
    let mut portal = PortalConfig {
        headless: !args.headed,
        ..PortalConfig::default()
    };
    if let Some(path) = &args.selectors {
        portal.selectors = config::load_selectors(path)?;
    }
    let start_url = run_config.search_url(&portal)?;
    let selectors = CardSelectors::compile(&portal.selectors)?;
    let extractor = AttributeExtractor::new(portal.base_url()?);

    info!(
        url = %start_url,
        comuna = run_config.comuna(),
        property_type = %run_config.property_type(),
        max_pages = run_config.max_pages(),
        "Starting scraper"
    );

    // The provider (and its browser session) is dropped at the end of its arm.
    let report = match args.provider {
        ProviderKind::Browser => {
            let mut provider = BrowserProvider::launch(&portal, selectors, args.debug_dir.clone())?;
            paginate(&mut provider, &extractor, &run_config, &start_url).await
        }
        ProviderKind::Http => {
            let mut provider = HttpProvider::new(&portal, selectors)?;
            paginate(&mut provider, &extractor, &run_config, &start_url).await
        }
    };

    print_summary(&report);
    export(&args, &report).await?;

    if let Some(failure) = report.failure() {
        bail!(
            "pagination stopped at page {}, results are partial: {failure}",
            failure.page()
        );
    }

    Ok(())
}
