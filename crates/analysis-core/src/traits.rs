use async_trait::async_trait;
use crate::ScanError;

/// Text encoding of a listing endpoint, chosen by the caller per endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEncoding {
    /// Legacy Korean encoding used by the market-cap ranking listing
    EucKr,
    Utf8,
}

/// A fetched and decoded markup page
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

/// Capability to issue one polite request and return the decoded page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str, encoding: PageEncoding) -> Result<Page, ScanError>;
}
