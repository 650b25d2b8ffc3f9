//! Naver Finance collectors
//!
//! Pages through the market-cap ranking, the company overview and the daily
//! price listing, turning unreliable HTML pages into ranked symbols, share
//! metadata and per-symbol price series.

pub mod endpoints;
pub mod fetcher;
pub mod history;
mod markup;
pub mod metadata;
pub mod ranking;

#[cfg(test)]
mod collector_tests;

pub use endpoints::NaverEndpoints;
pub use fetcher::{FetcherConfig, HttpPageFetcher};
pub use history::{HistoricalPriceCollector, DEFAULT_CONCURRENCY};
pub use metadata::SymbolMetadataFetcher;
pub use ranking::{RankedSymbolCollector, DEFAULT_EXCLUSIONS};
