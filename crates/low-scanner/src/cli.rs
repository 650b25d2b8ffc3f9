use analysis_core::Market;
use clap::Parser;

use crate::report::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "low-scanner")]
#[command(about = "Rank large caps by distance from their 52-week low", long_about = None)]
pub struct Cli {
    /// Market partition to scan (kospi or kosdaq)
    #[arg(short, long, default_value = "kospi")]
    pub market: Market,

    /// Number of top market-cap symbols to analyze
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub num_stocks: u64,

    /// Concurrent history downloads (overrides SCAN_CONCURRENCY)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, env = "SCAN_OUTPUT_FORMAT")]
    pub format: OutputFormat,

    /// Replace zero open/high/low prices with the day's close
    #[arg(long)]
    pub fill_zero_prices: bool,

    /// Do not fetch share count / float ratio
    #[arg(long)]
    pub skip_metadata: bool,
}
