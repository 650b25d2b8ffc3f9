use crate::endpoints::NaverEndpoints;
use crate::markup::{element_text, last_page_href, parse_number, selector};
use analysis_core::{
    AnalysisWindow, OhlcRecord, PageEncoding, PageFetcher, ScanError, SymbolSeries,
};
use chrono::NaiveDate;
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Worker pool size for concurrent history collection
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Numeric cells per date row: close, change, open, high, low
const CELLS_PER_ROW: usize = 5;
const CLOSE_OFFSET: usize = 0;
const OPEN_OFFSET: usize = 2;
const HIGH_OFFSET: usize = 3;
const LOW_OFFSET: usize = 4;

const DATE_FORMAT: &str = "%Y.%m.%d";

/// Raw cells of one daily price listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayPage {
    pub dates: Vec<String>,
    pub cells: Vec<String>,
    pub last_page_href: Option<String>,
}

impl DayPage {
    /// The "last page" control points at the page being read
    pub fn is_last_page(&self, page: u32) -> bool {
        let suffix = format!("page={}", page);
        self.last_page_href
            .as_deref()
            .is_some_and(|href| href.ends_with(&suffix))
    }
}

pub fn parse_day_page(html: &str) -> Result<DayPage, ScanError> {
    let doc = Html::parse_document(html);
    let date_sel = selector("span.tah.p10.gray03")?;
    let num_sel = selector("td.num")?;

    Ok(DayPage {
        dates: doc.select(&date_sel).map(element_text).collect(),
        cells: doc.select(&num_sel).map(element_text).collect(),
        last_page_href: last_page_href(&doc)?,
    })
}

/// Why pagination for a symbol ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A row older than the window start was reached
    BeforeWindow,
    LastPage,
    EmptyPage,
    /// The listing echoed the previous page back
    RepeatedPage,
    FetchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Continue,
    Stop(StopReason),
}

/// Fold one listing page into `series`.
///
/// Rows are newest first. A row dated before the window start ends the symbol
/// immediately; rows after the window end are skipped; malformed rows are
/// skipped one by one.
pub fn absorb_page(
    series: &mut SymbolSeries,
    page: &DayPage,
    page_no: u32,
    window: &AnalysisWindow,
    code: &str,
) -> PageOutcome {
    if page.dates.is_empty() {
        return PageOutcome::Stop(StopReason::EmptyPage);
    }

    for (row, raw_date) in page.dates.iter().enumerate() {
        let date = match NaiveDate::parse_from_str(raw_date, DATE_FORMAT) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(symbol = code, page = page_no, row, field = "date", value = %raw_date, error = %e, "Skipping row");
                continue;
            }
        };

        if date < window.start {
            return PageOutcome::Stop(StopReason::BeforeWindow);
        }
        if date > window.end {
            continue;
        }

        match parse_row(&page.cells, row, date) {
            Ok(record) => {
                series.insert(date, record);
            }
            Err(e) => {
                tracing::warn!(symbol = code, page = page_no, row, %date, error = %e, "Skipping row");
            }
        }
    }

    if page.is_last_page(page_no) {
        PageOutcome::Stop(StopReason::LastPage)
    } else {
        PageOutcome::Continue
    }
}

fn parse_row(cells: &[String], row: usize, date: NaiveDate) -> Result<OhlcRecord, ScanError> {
    let base = row * CELLS_PER_ROW;
    let field = |offset: usize, name: &str| -> Result<f64, ScanError> {
        let raw = cells.get(base + offset).ok_or_else(|| {
            ScanError::ParseFailure(format!("{} cell {} out of range ({} cells)", name, base + offset, cells.len()))
        })?;
        parse_number(raw).ok_or_else(|| ScanError::ParseFailure(format!("{} '{}' is not numeric", name, raw)))
    };

    let record = OhlcRecord {
        date,
        close: field(CLOSE_OFFSET, "close")?,
        open: field(OPEN_OFFSET, "open")?,
        high: field(HIGH_OFFSET, "high")?,
        low: field(LOW_OFFSET, "low")?,
    };

    if !record.is_valid() {
        return Err(ScanError::ParseFailure(format!("negative price in {:?}", record)));
    }
    Ok(record)
}

/// Walks a symbol's daily price listing backwards until the window start.
#[derive(Clone)]
pub struct HistoricalPriceCollector {
    fetcher: Arc<dyn PageFetcher>,
    endpoints: NaverEndpoints,
    concurrency: usize,
}

impl HistoricalPriceCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoints: NaverEndpoints) -> Self {
        Self {
            fetcher,
            endpoints,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Collect one symbol's series inside `window`.
    ///
    /// Fails only when the first page cannot be read. A failure on a later
    /// page keeps the rows gathered so far.
    pub async fn collect(&self, code: &str, window: AnalysisWindow) -> Result<SymbolSeries, ScanError> {
        let mut series = SymbolSeries::new();
        let mut page_no = 1u32;
        let mut previous_first: Option<String> = None;

        let reason = loop {
            let page = match self.fetch_day_page(code, page_no).await {
                Ok(page) => page,
                Err(e) if page_no == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(symbol = code, page = page_no, error = %e, "Keeping rows collected so far");
                    break StopReason::FetchFailed;
                }
            };

            if page.dates.first().is_some() && page.dates.first() == previous_first.as_ref() {
                break StopReason::RepeatedPage;
            }
            previous_first = page.dates.first().cloned();

            match absorb_page(&mut series, &page, page_no, &window, code) {
                PageOutcome::Continue => page_no += 1,
                PageOutcome::Stop(reason) => break reason,
            }
        };

        tracing::debug!(symbol = code, pages = page_no, rows = series.len(), ?reason, "History pagination finished");
        Ok(series)
    }

    async fn fetch_day_page(&self, code: &str, page_no: u32) -> Result<DayPage, ScanError> {
        let url = self.endpoints.day_prices_url(code, page_no);
        let page = self.fetcher.fetch_page(&url, PageEncoding::Utf8).await?;
        parse_day_page(&page.body)
    }

    /// Collect every symbol over a bounded worker pool.
    ///
    /// Results are keyed by code as tasks finish. Symbols whose task failed,
    /// panicked, or produced no rows are left out.
    pub async fn collect_many(&self, codes: &[String], window: AnalysisWindow) -> HashMap<String, SymbolSeries> {
        let total = codes.len();
        tracing::info!(
            "Collecting daily prices {} .. {} for {} symbols ({} workers)",
            window.start,
            window.end,
            total,
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for code in codes {
            let collector = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let code = code.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return (code, Err(ScanError::FetchFailure(format!("worker pool closed: {}", e)))),
                };
                let result = collector.collect(&code, window).await;
                (code, result)
            });
        }

        let mut results = HashMap::with_capacity(total);
        let mut done = 0usize;

        while let Some(joined) = tasks.join_next().await {
            done += 1;
            match joined {
                Ok((code, Ok(series))) if !series.is_empty() => {
                    tracing::info!("[{}/{}] {} => {} rows", done, total, code, series.len());
                    results.insert(code, series);
                }
                Ok((code, Ok(_))) => {
                    tracing::warn!("[{}/{}] {} has no rows inside the window", done, total, code);
                }
                Ok((code, Err(e))) => {
                    tracing::warn!("[{}/{}] {} failed: {}", done, total, code, e);
                }
                Err(e) => {
                    tracing::error!("[{}/{}] History task aborted: {}", done, total, e);
                }
            }
        }

        tracing::info!("Daily prices collected for {}/{} symbols", results.len(), total);
        results
    }
}
