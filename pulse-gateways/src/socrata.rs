use crate::{fetch_error, json::flatten};
use pulse_core::{
    error::excerpt,
    gateways::open_data::{FetchError, OpenDataGateway, PageRequest, Row},
};
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::time::Duration;

const APP_TOKEN_HEADER: &str = "X-App-Token";

/// A Socrata (SODA 2) resource, e.g. `https://data.buffalony.gov/resource/3tj7-3tdz.json`.
#[derive(Debug, Clone)]
pub struct Socrata {
    client: Client,
    resource_url: String,
    select: Vec<String>,
    where_clause: Option<String>,
    app_token: Option<String>,
}

impl Socrata {
    pub fn try_new(
        resource_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            resource_url: resource_url.into(),
            select: vec![],
            where_clause: None,
            app_token: None,
        })
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = fields;
        self
    }

    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    /// Requests without a token share the anonymous quota.
    pub fn with_app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token.filter(|t| !t.is_empty());
        self
    }

    fn query(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![];
        if !self.select.is_empty() {
            query.push(("$select", self.select.join(", ")));
        }
        if let Some(clause) = &self.where_clause {
            query.push(("$where", clause.clone()));
        }
        // stable order across pages
        query.push(("$order", ":id".to_owned()));
        query.push(("$limit", page.limit.to_string()));
        query.push(("$offset", page.offset.to_string()));
        query
    }
}

impl OpenDataGateway for Socrata {
    fn fetch_page(&self, page: &PageRequest) -> Result<Vec<Row>, FetchError> {
        let mut request = self.client.get(&self.resource_url).query(&self.query(page));
        if let Some(token) = &self.app_token {
            request = request.header(APP_TOKEN_HEADER, token);
        }
        let response = request.send().map_err(fetch_error)?;
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
}

fn decode_page(body: &str) -> Result<Vec<Row>, FetchError> {
    let records: Vec<Map<String, Value>> =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    Ok(records.into_iter().map(flatten).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_query() {
        let url = "https://example.org/resource/9p2d-f3yt.json";
        let soda = Socrata::try_new(url, Duration::from_secs(1))
            .unwrap()
            .with_select(vec!["apno".into(), "issued".into()])
            .with_where("issued >= '2024-05-01'")
            .with_app_token(Some(String::new()));
        assert!(soda.app_token.is_none());
        let query = soda.query(&PageRequest {
            offset: 50_000,
            limit: 50_000,
        });
        assert_eq!(
            query,
            vec![
                ("$select", "apno, issued".to_string()),
                ("$where", "issued >= '2024-05-01'".to_string()),
                ("$order", ":id".to_string()),
                ("$limit", "50000".to_string()),
                ("$offset", "50000".to_string()),
            ]
        );
    }

    #[test]
    fn decode_records() {
        let body = r#"[{"apno":"B1","value":"1200"},{"apno":"B2","latitude":"42.9"}]"#;
        let rows = decode_page(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["latitude"], "42.9");
    }

    #[test]
    fn reject_unexpected_json() {
        assert!(matches!(
            decode_page(r#"{"error":true,"message":"Unknown column"}"#),
            Err(FetchError::Decode(_))
        ));
    }
}
