use analysis_core::{AnalysisWindow, Market, PageFetcher, ScanError};
use low_analysis::{LowProximityAnalyzer, SeriesAligner, ZeroPricePolicy};
use naver_client::{HistoricalPriceCollector, NaverEndpoints, RankedSymbolCollector, SymbolMetadataFetcher};
use std::collections::HashMap;
use std::sync::Arc;

use crate::report::ReportRow;

/// Everything one scan needs besides the fetch capability
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub market: Market,
    pub num_stocks: usize,
    pub window: AnalysisWindow,
    pub concurrency: usize,
    pub exclude_patterns: Vec<String>,
    pub zero_price_policy: ZeroPricePolicy,
    pub fetch_metadata: bool,
    pub endpoints: NaverEndpoints,
}

#[derive(Debug)]
pub enum ScanOutcome {
    /// Rows sorted ascending by gap percentage
    Report(Vec<ReportRow>),
    /// Data was collected but no symbol had enough of it
    NothingToReport,
}

/// Ranking -> metadata -> history -> alignment -> analysis.
///
/// Returns `EmptyUpstream` when the ranking or the history stage yields
/// nothing at all; every narrower failure has already been skipped and logged.
pub async fn run_scan(fetcher: Arc<dyn PageFetcher>, request: &ScanRequest) -> Result<ScanOutcome, ScanError> {
    // 1. Ranked symbols
    let ranking = RankedSymbolCollector::new(Arc::clone(&fetcher), request.endpoints.clone())
        .with_exclusions(request.exclude_patterns.iter().cloned());
    let ranked = ranking.collect(request.num_stocks, request.market).await;
    if ranked.is_empty() {
        return Err(ScanError::EmptyUpstream(format!(
            "ranked symbols: no {} listing page could be read",
            request.market
        )));
    }
    let codes = ranked.codes();

    // 2. Share metadata (best effort)
    let metadata = if request.fetch_metadata {
        SymbolMetadataFetcher::new(Arc::clone(&fetcher), request.endpoints.clone())
            .fetch_all(&codes)
            .await
    } else {
        tracing::info!("Skipping share metadata");
        HashMap::new()
    };

    // 3. Daily prices
    let history = HistoricalPriceCollector::new(Arc::clone(&fetcher), request.endpoints.clone())
        .with_concurrency(request.concurrency)
        .collect_many(&codes, request.window)
        .await;
    if history.is_empty() {
        return Err(ScanError::EmptyUpstream(format!(
            "historical prices: none of {} symbols returned rows for {} .. {}",
            codes.len(),
            request.window.start,
            request.window.end
        )));
    }

    // 4-5. Align and analyze
    let table = SeriesAligner::align(&history, request.window)?;
    let rows = LowProximityAnalyzer::new()
        .with_zero_price_policy(request.zero_price_policy)
        .analyze(&table, &ranked);

    if rows.is_empty() {
        return Ok(ScanOutcome::NothingToReport);
    }

    Ok(ScanOutcome::Report(
        rows.into_iter()
            .map(|row| {
                let meta = metadata.get(&row.code).copied();
                ReportRow::new(row, meta)
            })
            .collect(),
    ))
}
