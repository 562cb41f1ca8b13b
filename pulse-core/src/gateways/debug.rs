use crate::gateways::geocode::{BatchRequest, BatchResponse};

/// Receives the raw traffic of the batch geocoder for diagnosis.
pub trait BatchDebugSink {
    fn request_sent(&self, chunk: usize, attempt: u32, request: &BatchRequest);
    fn response_received(&self, chunk: usize, attempt: u32, response: &BatchResponse);
}

impl<S> BatchDebugSink for Box<S>
where
    S: BatchDebugSink + ?Sized,
{
    fn request_sent(&self, chunk: usize, attempt: u32, request: &BatchRequest) {
        (**self).request_sent(chunk, attempt, request)
    }
    fn response_received(&self, chunk: usize, attempt: u32, response: &BatchResponse) {
        (**self).response_received(chunk, attempt, response)
    }
}

/// Forwards the raw traffic to the `trace` log level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDebugSink;

impl BatchDebugSink for LogDebugSink {
    fn request_sent(&self, chunk: usize, attempt: u32, request: &BatchRequest) {
        log::trace!(
            "Chunk {chunk} attempt {attempt}: benchmark={} payload:\n{}",
            request.benchmark,
            request.payload
        );
    }
    fn response_received(&self, chunk: usize, attempt: u32, response: &BatchResponse) {
        log::trace!(
            "Chunk {chunk} attempt {attempt}: status={} body:\n{}",
            response.status,
            response.body
        );
    }
}
