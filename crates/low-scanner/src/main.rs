//! low-scanner: list the largest KOSPI/KOSDAQ companies by how close their
//! prior close sits to the trailing 52-week low.
//!
//! Usage:
//!   cargo run -p low-scanner -- --market kospi --num-stocks 30
//!   cargo run -p low-scanner -- -m kosdaq -n 50 --format json --skip-metadata

use std::sync::Arc;

use analysis_core::AnalysisWindow;
use anyhow::{Context, Result};
use clap::Parser;
use naver_client::{HttpPageFetcher, NaverEndpoints};

mod cli;
mod config;
mod pipeline;
mod report;

use cli::Cli;
use config::ScannerConfig;
use pipeline::{run_scan, ScanOutcome, ScanRequest};

const DEFAULT_LOG_FILTER: &str = "low_scanner=info,naver_client=info,low_analysis=info";

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so the report on stdout stays clean
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ScannerConfig::from_env()
        .and_then(|c| c.merge_cli(&cli))
        .context("Invalid scanner configuration")?;

    let fetcher = HttpPageFetcher::from_env().context("Failed to build the page fetcher")?;
    let fetch_config = fetcher.config();
    tracing::info!(
        "Fetch policy: timeout {}s, delay {}-{}ms, {} req/min, {} retries",
        fetch_config.timeout.as_secs(),
        fetch_config.delay_min.as_millis(),
        fetch_config.delay_max.as_millis(),
        fetch_config.rate_limit,
        fetch_config.max_retries
    );

    let today = chrono::Local::now().date_naive();
    let request = ScanRequest {
        market: cli.market,
        num_stocks: usize::try_from(cli.num_stocks).context("--num-stocks is too large")?,
        window: AnalysisWindow::trailing(today, config.lookback_days),
        concurrency: config.concurrency,
        exclude_patterns: config.exclude_patterns.clone(),
        zero_price_policy: config.zero_price_policy(),
        fetch_metadata: config.fetch_metadata,
        endpoints: NaverEndpoints::default(),
    };

    tracing::info!(
        "Scanning top {} {} symbols over {} .. {} ({} workers, zero prices: {:?})",
        request.num_stocks,
        request.market,
        request.window.start,
        request.window.end,
        request.concurrency,
        request.zero_price_policy
    );

    match run_scan(Arc::new(fetcher), &request).await {
        Ok(ScanOutcome::Report(rows)) => {
            let rendered = report::render(&rows, cli.format).context("Failed to render report")?;
            println!("{}", rendered);
            tracing::info!("Reported {} symbols", rows.len());
        }
        Ok(ScanOutcome::NothingToReport) => {
            println!("No results: no symbol had enough price history in the window.");
        }
        Err(e) => {
            tracing::error!("Scan aborted: {}", e);
            eprintln!("Error: {}. Check network access to finance.naver.com and try again.", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
