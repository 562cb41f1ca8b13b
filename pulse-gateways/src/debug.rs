use jfs::Store;
use pulse_core::gateways::{
    debug::BatchDebugSink,
    geocode::{BatchRequest, BatchResponse},
};
use serde::{Deserialize, Serialize};
use std::{io, path::Path};
use time::OffsetDateTime;

/// Keeps the raw geocoder traffic as JSON files for later inspection.
pub struct PayloadsToJsonFile {
    json_store: Store,
}

impl PayloadsToJsonFile {
    pub fn try_new<P: AsRef<Path>>(directory: P) -> io::Result<Self> {
        let json_store = Store::new(directory)?;
        Ok(Self { json_store })
    }
    pub fn path(&self) -> &Path {
        self.json_store.path()
    }

    fn save(&self, chunk: usize, attempt: u32, traffic: &JsonTraffic) {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let key = format!("{now}-chunk{chunk}-attempt{attempt}-{}", traffic.kind);
        if let Err(err) = self.json_store.save_with_id(traffic, &key) {
            log::warn!("Unable to save geocoder traffic in JSON file: {err}");
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct JsonTraffic {
    kind: String,
    benchmark: Option<String>,
    status: Option<u16>,
    body: String,
}

impl BatchDebugSink for PayloadsToJsonFile {
    fn request_sent(&self, chunk: usize, attempt: u32, request: &BatchRequest) {
        let traffic = JsonTraffic {
            kind: "request".to_owned(),
            benchmark: Some(request.benchmark.clone()),
            status: None,
            body: request.payload.clone(),
        };
        self.save(chunk, attempt, &traffic);
    }
    fn response_received(&self, chunk: usize, attempt: u32, response: &BatchResponse) {
        let traffic = JsonTraffic {
            kind: "response".to_owned(),
            benchmark: None,
            status: Some(response.status),
            body: response.body.clone(),
        };
        self.save(chunk, attempt, &traffic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn save_requests_and_responses() {
        let dir = env::temp_dir().join(format!("pulse-geocoder-traffic-{}", std::process::id()));
        let sink = PayloadsToJsonFile::try_new(&dir).unwrap();
        sink.request_sent(
            0,
            1,
            &BatchRequest {
                payload: "1,65 Niagara Sq,,,\n".into(),
                benchmark: "Public_AR_Current".into(),
            },
        );
        sink.response_received(
            0,
            1,
            &BatchResponse {
                status: 200,
                body: "\"1\",\"x\",\"No_Match\"".into(),
            },
        );
        let saved = sink.json_store.all::<JsonTraffic>().unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.keys().any(|k| k.ends_with("-chunk0-attempt1-request")));
        assert!(saved.values().any(|t| t.status == Some(200)));
        fs::remove_dir_all(&dir).unwrap();
    }
}
