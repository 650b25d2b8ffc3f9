//! Small extraction helpers shared by the page parsers.

use analysis_core::ScanError;
use scraper::{ElementRef, Html, Selector};

pub(crate) fn selector(css: &str) -> Result<Selector, ScanError> {
    Selector::parse(css).map_err(|e| ScanError::ParseFailure(format!("Invalid selector '{}': {:?}", css, e)))
}

/// Trimmed inner text of an element
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse a listing number such as `73,400` or ` 1,234.5 `
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Value of the `page=` query parameter in a pagination link
pub(crate) fn page_param(href: &str) -> Option<u32> {
    href.split("page=")
        .nth(1)
        .map(|s| s.split('&').next().unwrap_or(s))
        .and_then(|s| s.trim().parse().ok())
}

/// Target of the "last page" pagination control (`td.pgRR a`), if present
pub(crate) fn last_page_href(doc: &Html) -> Result<Option<String>, ScanError> {
    let sel = selector("td.pgRR a")?;
    Ok(doc
        .select(&sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.to_string()))
}
