use crate::endpoints::NaverEndpoints;
use crate::markup::{element_text, selector};
use analysis_core::{PageEncoding, PageFetcher, ScanError, SymbolMetadata};
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::Arc;

/// Header label of the "shares outstanding / float ratio" row
const SHARE_FLOAT_HEADER: &str = "발행주식수/유동주식비율";
/// Row of the `#cTB11` overview table holding the same field
const SHARE_FLOAT_ROW: usize = 6;

/// Locate the composite share/float text on a company overview page.
///
/// The header-label lookup is tried first; the fixed row of the overview
/// table is the fallback for older layouts.
pub fn extract_share_float_text(html: &str) -> Result<String, ScanError> {
    let doc = Html::parse_document(html);

    let th_sel = selector("th")?;
    let header_cell = doc.select(&th_sel).find(|th| {
        let label: String = th.text().collect::<String>().split_whitespace().collect();
        label.contains(SHARE_FLOAT_HEADER)
    });
    if let Some(th) = header_cell {
        let value = th
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "td");
        if let Some(td) = value {
            return Ok(element_text(td));
        }
        tracing::debug!("Share/float header found without a value cell");
    }

    let row_sel = selector("#cTB11 tr")?;
    let td_sel = selector("td")?;
    doc.select(&row_sel)
        .nth(SHARE_FLOAT_ROW)
        .and_then(|row| row.select(&td_sel).next())
        .map(element_text)
        .ok_or_else(|| ScanError::ParseFailure("share/float field not found".to_string()))
}

/// Parse text such as `5,969,782,550주 / 75.84%`.
pub fn parse_share_float(text: &str) -> Result<SymbolMetadata, ScanError> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '\r' | '\n' | '\t')).collect();
    let parts: Vec<&str> = cleaned.split('/').collect();
    if parts.len() < 2 {
        return Err(ScanError::ParseFailure(format!(
            "expected 'shares / ratio', got '{}'",
            cleaned.trim()
        )));
    }

    let shares_raw: String = parts[0]
        .chars()
        .filter(|c| !matches!(c, ',' | '주') && !c.is_whitespace())
        .collect();
    let outstanding_shares = shares_raw
        .parse::<u64>()
        .map_err(|e| ScanError::ParseFailure(format!("outstanding shares '{}': {}", parts[0].trim(), e)))?;

    let ratio_raw = parts[1].replace('%', "");
    let floating_ratio = ratio_raw
        .trim()
        .parse::<f64>()
        .map_err(|e| ScanError::ParseFailure(format!("float ratio '{}': {}", parts[1].trim(), e)))?;

    Ok(SymbolMetadata {
        outstanding_shares,
        floating_ratio,
    })
}

/// Best-effort share structure lookup, one request per symbol.
pub struct SymbolMetadataFetcher {
    fetcher: Arc<dyn PageFetcher>,
    endpoints: NaverEndpoints,
}

impl SymbolMetadataFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoints: NaverEndpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Returns `None` on any failure; the reason is logged.
    pub async fn fetch(&self, code: &str) -> Option<SymbolMetadata> {
        match self.try_fetch(code).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(symbol = code, field = "shares/float", error = %e, "Metadata unavailable");
                None
            }
        }
    }

    async fn try_fetch(&self, code: &str) -> Result<SymbolMetadata, ScanError> {
        let url = self.endpoints.company_info_url(code);
        let page = self.fetcher.fetch_page(&url, PageEncoding::Utf8).await?;
        let text = extract_share_float_text(&page.body)?;
        parse_share_float(&text)
    }

    /// Fetch metadata for each code in turn; failed symbols are left out.
    pub async fn fetch_all(&self, codes: &[String]) -> HashMap<String, SymbolMetadata> {
        tracing::info!("Fetching share metadata for {} symbols (sequential)", codes.len());
        let mut results = HashMap::new();
        for code in codes {
            if let Some(metadata) = self.fetch(code).await {
                results.insert(code.clone(), metadata);
            }
        }
        tracing::info!("Share metadata available for {}/{} symbols", results.len(), codes.len());
        results
    }
}
