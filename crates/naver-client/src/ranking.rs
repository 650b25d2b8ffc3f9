use crate::endpoints::NaverEndpoints;
use crate::markup::{element_text, last_page_href, page_param, selector};
use analysis_core::{Market, PageEncoding, PageFetcher, RankedSymbols, ScanError};
use scraper::Html;
use std::sync::Arc;

/// Name fragments of listings that are not operating companies
/// (SPACs, ETF and leveraged/inverse fund brands).
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "스팩", "KODEX", "TIGER", "ARIRANG", "HANARO", "KINDEX", "KBSTAR",
];

/// One row link of the ranking table
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingPage {
    pub entries: Vec<RankingEntry>,
    /// Last page number advertised by the pagination control
    pub last_page: Option<u32>,
}

/// Parse one market-cap ranking page.
pub fn parse_ranking_page(html: &str) -> Result<RankingPage, ScanError> {
    let doc = Html::parse_document(html);

    let table_sel = selector("table.type_2")?;
    let link_sel = selector("a.tltle")?;

    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| ScanError::ParseFailure("ranking table (table.type_2) not found".to_string()))?;

    let entries = table
        .select(&link_sel)
        .map(|link| RankingEntry {
            name: element_text(link),
            code: link.value().attr("href").and_then(code_from_href),
        })
        .collect();

    let last_page = last_page_href(&doc)?.as_deref().and_then(page_param);

    Ok(RankingPage { entries, last_page })
}

fn code_from_href(href: &str) -> Option<String> {
    href.split("code=")
        .nth(1)
        .map(|s| s.split('&').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pages through the market-cap ranking until enough equities are found.
pub struct RankedSymbolCollector {
    fetcher: Arc<dyn PageFetcher>,
    endpoints: NaverEndpoints,
    exclusions: Vec<String>,
}

impl RankedSymbolCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoints: NaverEndpoints) -> Self {
        Self {
            fetcher,
            endpoints,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add exclusion substrings on top of [`DEFAULT_EXCLUSIONS`]
    pub fn with_exclusions<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        for pattern in extra {
            let pattern = pattern.trim().to_string();
            if !pattern.is_empty() && !self.exclusions.contains(&pattern) {
                self.exclusions.push(pattern);
            }
        }
        self
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.iter().any(|p| name.contains(p.as_str()))
    }

    /// Collect up to `target_count` distinct equities in ranking order.
    ///
    /// Never fails: a fetch or parse failure ends pagination and whatever was
    /// gathered so far is returned. An empty result means the listing was
    /// unreachable.
    pub async fn collect(&self, target_count: usize, market: Market) -> RankedSymbols {
        let mut ranked = RankedSymbols::new();
        let mut page = 1u32;
        let mut last_page = 1u32;

        tracing::info!("Collecting top {} {} symbols by market cap", target_count, market);

        while ranked.len() < target_count && page <= last_page {
            let url = self.endpoints.ranking_url(market, page);
            let parsed = match self.fetch_ranking_page(&url).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Ranking pagination stopped early");
                    break;
                }
            };

            for entry in &parsed.entries {
                if entry.name.is_empty() || self.is_excluded(&entry.name) {
                    continue;
                }
                match entry.code.as_deref() {
                    Some(code) => {
                        if !ranked.insert(&entry.name, code) {
                            tracing::debug!(page, name = %entry.name, code, "Duplicate ranking entry ignored");
                        }
                    }
                    None => tracing::debug!(page, name = %entry.name, "Ranking link without a code"),
                }
                if ranked.len() >= target_count {
                    break;
                }
            }

            // The pagination control is only read once
            if page == 1 {
                last_page = parsed.last_page.unwrap_or(page);
                tracing::debug!(last_page, "Ranking listing size discovered");
            }

            page += 1;
        }

        tracing::info!("Collected {}/{} ranked symbols", ranked.len(), target_count);
        ranked
    }

    async fn fetch_ranking_page(&self, url: &str) -> Result<RankingPage, ScanError> {
        let page = self.fetcher.fetch_page(url, PageEncoding::EucKr).await?;
        parse_ranking_page(&page.body)
    }
}
