use crate::{fetch_error, json::flatten};
use pulse_core::{
    error::excerpt,
    gateways::open_data::{FetchError, OpenDataGateway, PageRequest, Row},
};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// A layer of an ArcGIS FeatureServer, e.g.
/// `https://maps.example.gov/arcgis/rest/services/RPD/Crime/FeatureServer/3`.
#[derive(Debug, Clone)]
pub struct ArcGis {
    client: Client,
    layer_url: String,
    where_clause: String,
    out_fields: Vec<String>,
}

impl ArcGis {
    pub fn try_new(
        layer_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            layer_url: layer_url.into().trim_end_matches('/').to_owned(),
            where_clause: "1=1".to_owned(),
            out_fields: vec![],
        })
    }

    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = clause.into();
        self
    }

    pub fn with_out_fields(mut self, fields: Vec<String>) -> Self {
        self.out_fields = fields;
        self
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.layer_url)
    }

    fn query(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let out_fields = if self.out_fields.is_empty() {
            "*".to_owned()
        } else {
            self.out_fields.join(",")
        };
        vec![
            ("where", self.where_clause.clone()),
            ("outFields", out_fields),
            ("returnGeometry", "false".to_owned()),
            ("resultRecordCount", page.limit.to_string()),
            ("resultOffset", page.offset.to_string()),
            ("f", "json".to_owned()),
        ]
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
    error: Option<ServiceError>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Deserialize)]
struct ServiceError {
    code: i64,
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

impl OpenDataGateway for ArcGis {
    fn fetch_page(&self, page: &PageRequest) -> Result<Vec<Row>, FetchError> {
        let response = self
            .client
            .get(self.query_url())
            .query(&self.query(page))
            .send()
            .map_err(fetch_error)?;
        let status = response.status();
        let body = response.text().map_err(fetch_error)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                excerpt: excerpt(&body),
            });
        }
        decode_page(&body)
    }

    // The server caps pages at its own maximum record count.
    fn stops_at_short_page(&self) -> bool {
        false
    }
}

fn decode_page(body: &str) -> Result<Vec<Row>, FetchError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    if let Some(ServiceError {
        code,
        message,
        details,
    }) = response.error
    {
        let details = details.join("; ");
        return Err(FetchError::Service(format!("{code} {message} {details}").trim().to_owned()));
    }
    Ok(response
        .features
        .into_iter()
        .map(|f| flatten(f.attributes))
        .collect())
}
