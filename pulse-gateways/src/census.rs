use pulse_core::gateways::geocode::{
    BatchGeocodingGateway, BatchRequest, BatchResponse, TransportError,
};
use reqwest::blocking::{
    multipart::{Form, Part},
    Client,
};
use std::time::Duration;

pub const DEFAULT_API_URL: &str =
    "https://geocoding.geo.census.gov/geocoder/locations/addressbatch";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const FILE_FIELD: &str = "addressFile";
const FILE_NAME: &str = "addrs.csv";
const BENCHMARK_FIELD: &str = "benchmark";

/// Gateway to the US Census Bureau batch geocoder.
#[derive(Debug, Clone)]
pub struct CensusBatchGeocoder {
    client: Client,
    api_url: String,
}

impl CensusBatchGeocoder {
    pub fn try_new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

fn form(request: &BatchRequest) -> Result<Form, reqwest::Error> {
    let file = Part::text(request.payload.clone())
        .file_name(FILE_NAME)
        .mime_str("text/csv")?;
    Ok(Form::new()
        .part(FILE_FIELD, file)
        .text(BENCHMARK_FIELD, request.benchmark.clone()))
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let msg = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout(msg)
    } else if err.is_builder() {
        TransportError::Request(msg)
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(msg)
    } else {
        // connection refused, reset, TLS failures, ...
        TransportError::Connect(msg)
    }
}

impl BatchGeocodingGateway for CensusBatchGeocoder {
    fn submit_batch(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError> {
        let form = form(request).map_err(transport_error)?;
        log::debug!(
            "Posting {} bytes to {}",
            request.payload.len(),
            self.api_url
        );
        let response = self
            .client
            .post(&self.api_url)
            .multipart(form)
            .send()
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        // Reading the body to the end releases the connection.
        let body = response.text().map_err(transport_error)?;
        Ok(BatchResponse { status, body })
    }
}
