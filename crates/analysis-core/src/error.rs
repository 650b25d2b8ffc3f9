use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Network, timeout or transport failure for one request
    #[error("Fetch failure: {0}")]
    FetchFailure(String),

    /// Expected markup absent or a field could not be parsed
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A pipeline gate received nothing at all from upstream
    #[error("Empty upstream: {0}")]
    EmptyUpstream(String),
}

impl ScanError {
    /// Only an empty upstream aborts a scan; every other kind degrades to a skip.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::EmptyUpstream(_))
    }
}
