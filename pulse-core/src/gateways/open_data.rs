use std::collections::BTreeMap;
use thiserror::Error;

/// A flat record of an open data feed with all values as text.
pub type Row = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Service responded with status {status}: {excerpt}")]
    Status { status: u16, excerpt: String },
    #[error("Service reported an error: {0}")]
    Service(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// A paginated source of municipal records (Socrata, ArcGIS, ...).
pub trait OpenDataGateway {
    fn fetch_page(&self, page: &PageRequest) -> Result<Vec<Row>, FetchError>;

    /// Whether a page with fewer rows than requested is the last one.
    ///
    /// Services that cap the page size below the requested
    /// limit must be read until an empty page arrives.
    fn stops_at_short_page(&self) -> bool {
        true
    }
}
