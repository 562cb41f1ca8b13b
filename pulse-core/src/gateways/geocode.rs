use thiserror::Error;

/// One submission to the batch geocoding service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// The serialized address table (no header row).
    pub payload: String,
    /// Name of the reference dataset to match against.
    pub benchmark: String,
}

/// The raw answer of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponse {
    pub status: u16,
    pub body: String,
}

impl BatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rate limiting and server side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Could not read response body: {0}")]
    Body(String),
    #[error("Could not build request: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Request(_))
    }
}

pub trait BatchGeocodingGateway {
    /// Submits a single batch.
    ///
    /// The connection must be released before returning,
    /// regardless of the outcome.
    fn submit_batch(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError>;
}

impl<G> BatchGeocodingGateway for &G
where
    G: BatchGeocodingGateway + ?Sized,
{
    fn submit_batch(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError> {
        (**self).submit_batch(request)
    }
}

impl<G> BatchGeocodingGateway for Box<G>
where
    G: BatchGeocodingGateway + ?Sized,
{
    fn submit_batch(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError> {
        (**self).submit_batch(request)
    }
}
