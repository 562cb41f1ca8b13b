use crate::{
    batch::{decode_response, encode_payload},
    entities::{AddressRecord, GeocodeResult, RecordId},
    error::{excerpt, ConfigError, Error},
    gateways::{
        debug::BatchDebugSink,
        geocode::{BatchGeocodingGateway, BatchRequest, BatchResponse},
    },
    retry::{BackoffPolicy, Pause, RetryPolicy, ThreadSleep},
    MAX_BATCH_SIZE,
};
use std::{collections::HashSet, ops::Range, time::Duration};

pub const DEFAULT_CHUNK_SIZE: usize = 2_000;
pub const DEFAULT_BENCHMARK: &str = "Public_AR_Current";
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderSettings {
    /// The reference dataset the service matches against.
    pub benchmark: String,
    /// Rows per request; must not exceed [`MAX_BATCH_SIZE`].
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Pause between two consecutive chunk submissions.
    pub chunk_pause: Duration,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            benchmark: DEFAULT_BENCHMARK.to_owned(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            chunk_pause: DEFAULT_CHUNK_PAUSE,
        }
    }
}

#[derive(Debug)]
pub struct FailedChunk {
    pub rows: Range<usize>,
    pub ids: Vec<RecordId>,
    pub error: Error,
}

/// The outcome of a best-effort geocode.
#[derive(Debug, Default)]
pub struct PartialGeocode {
    pub results: Vec<GeocodeResult>,
    pub failed: Vec<FailedChunk>,
}

impl PartialGeocode {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn missing_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.failed.iter().flat_map(|chunk| chunk.ids.iter())
    }
}

/// Geocodes address tables of any length by splitting them
/// into chunks the batch geocoding service accepts.
///
/// Chunks are submitted sequentially on the calling thread.
/// Ids must be unique within a single invocation.
pub struct BatchGeocoder<G, P = ThreadSleep> {
    gateway: G,
    settings: GeocoderSettings,
    pause: P,
    debug_sink: Option<Box<dyn BatchDebugSink>>,
}

impl<G> BatchGeocoder<G>
where
    G: BatchGeocodingGateway,
{
    pub fn new(gateway: G, settings: GeocoderSettings) -> Self {
        Self {
            gateway,
            settings,
            pause: ThreadSleep,
            debug_sink: None,
        }
    }
}

impl<G, P> BatchGeocoder<G, P>
where
    G: BatchGeocodingGateway,
    P: Pause,
{
    pub fn with_pause<Q: Pause>(self, pause: Q) -> BatchGeocoder<G, Q> {
        let Self {
            gateway,
            settings,
            debug_sink,
            ..
        } = self;
        BatchGeocoder {
            gateway,
            settings,
            pause,
            debug_sink,
        }
    }

    pub fn with_debug_sink<S>(mut self, sink: S) -> Self
    where
        S: BatchDebugSink + 'static,
    {
        self.debug_sink = Some(Box::new(sink));
        self
    }

    /// Returns exactly one result per record or fails as a whole.
    pub fn geocode(&self, records: &[AddressRecord]) -> Result<Vec<GeocodeResult>, Error> {
        self.validate(records)?;
        let mut results = Vec::with_capacity(records.len());
        for (chunk, rows) in self.chunks(records.len()).enumerate() {
            if chunk > 0 {
                self.pause.pause(self.settings.chunk_pause);
            }
            match self.geocode_chunk(chunk, rows.clone(), &records[rows.clone()]) {
                Ok(mut chunk_results) => results.append(&mut chunk_results),
                Err(err) => {
                    log::error!("Failed chunk rows {}:{} - {err}", rows.start, rows.end);
                    return Err(err);
                }
            }
        }
        log::info!(
            "Geocoded {} addresses ({} matched)",
            results.len(),
            results.iter().filter(|r| r.match_ok).count()
        );
        Ok(results)
    }

    /// Continues with the next chunk if a chunk fails.
    ///
    /// Configuration errors are still reported as an error.
    pub fn geocode_best_effort(&self, records: &[AddressRecord]) -> Result<PartialGeocode, Error> {
        self.validate(records)?;
        let mut outcome = PartialGeocode {
            results: Vec::with_capacity(records.len()),
            failed: vec![],
        };
        for (chunk, rows) in self.chunks(records.len()).enumerate() {
            if chunk > 0 {
                self.pause.pause(self.settings.chunk_pause);
            }
            let chunk_records = &records[rows.clone()];
            match self.geocode_chunk(chunk, rows.clone(), chunk_records) {
                Ok(mut chunk_results) => outcome.results.append(&mut chunk_results),
                Err(error) => {
                    log::warn!(
                        "Skipping chunk rows {}:{} - {error}",
                        rows.start,
                        rows.end
                    );
                    outcome.failed.push(FailedChunk {
                        rows,
                        ids: chunk_records.iter().map(|r| r.id.clone()).collect(),
                        error,
                    });
                }
            }
        }
        if !outcome.is_complete() {
            log::warn!(
                "{} of {} chunks failed",
                outcome.failed.len(),
                self.chunks(records.len()).count()
            );
        }
        Ok(outcome)
    }

    fn chunks(&self, len: usize) -> impl Iterator<Item = Range<usize>> {
        let size = self.settings.chunk_size;
        (0..len)
            .step_by(size)
            .map(move |start| start..(start + size).min(len))
    }

    fn validate(&self, records: &[AddressRecord]) -> Result<(), ConfigError> {
        let chunk_size = self.settings.chunk_size;
        if chunk_size == 0 {
            return Err(ConfigError::ChunkSizeZero);
        }
        if chunk_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ChunkSizeTooLarge(chunk_size));
        }
        let shape = records.first().map(|r| r.parts.shape());
        let mut ids = HashSet::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            if !record.id.is_valid() {
                return Err(ConfigError::EmptyId(row));
            }
            if !ids.insert(record.id.as_str()) {
                return Err(ConfigError::DuplicateId(record.id.clone()));
            }
            if Some(record.parts.shape()) != shape {
                return Err(ConfigError::MixedAddressShapes(row));
            }
        }
        Ok(())
    }

    fn geocode_chunk(
        &self,
        chunk: usize,
        rows: Range<usize>,
        records: &[AddressRecord],
    ) -> Result<Vec<GeocodeResult>, Error> {
        log::debug!(
            "Submitting chunk {chunk} (rows {}:{})",
            rows.start,
            rows.end
        );
        let payload = encode_payload(records).map_err(|source| Error::Transport {
            rows: rows.clone(),
            attempts: 0,
            source,
        })?;
        let request = BatchRequest {
            payload,
            benchmark: self.settings.benchmark.clone(),
        };
        let response = self.submit_with_retry(chunk, &rows, &request)?;
        let ids: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
        decode_response(&response.body, &ids).map_err(|source| Error::Parse { rows, source })
    }

    fn submit_with_retry(
        &self,
        chunk: usize,
        rows: &Range<usize>,
        request: &BatchRequest,
    ) -> Result<BatchResponse, Error> {
        let retry = &self.settings.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(sink) = &self.debug_sink {
                sink.request_sent(chunk, attempt, request);
            }
            let reason = match self.gateway.submit_batch(request) {
                Ok(response) => {
                    if let Some(sink) = &self.debug_sink {
                        sink.response_received(chunk, attempt, &response);
                    }
                    if response.is_success() {
                        return Ok(response);
                    }
                    if !(response.is_retryable() && retry.has_attempts_left(attempt)) {
                        return Err(Error::Service {
                            rows: rows.clone(),
                            status: response.status,
                            excerpt: excerpt(&response.body),
                        });
                    }
                    format!("status {}", response.status)
                }
                Err(err) => {
                    if !(err.is_transient() && retry.has_attempts_left(attempt)) {
                        return Err(Error::Transport {
                            rows: rows.clone(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                    err.to_string()
                }
            };
            let delay = retry.delay_after_attempt(attempt);
            log::warn!(
                "{reason} - retrying in {:.1}s (attempt {attempt}/{})",
                delay.as_secs_f64(),
                retry.max_attempts
            );
            self.pause.pause(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entities::AddressParts, error::Stage, gateways::geocode::TransportError};
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
    };

    /// Answers like the real service: blank addresses
    /// are not matched, everything else is.
    #[derive(Default)]
    struct FakeService {
        calls: Cell<usize>,
        requests: RefCell<Vec<BatchRequest>>,
        // scripted outcomes consumed before falling back to echo answers
        script: RefCell<VecDeque<Result<BatchResponse, TransportError>>>,
        reverse_lines: bool,
    }

    impl FakeService {
        fn scripted(script: Vec<Result<BatchResponse, TransportError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                ..Default::default()
            }
        }

        fn answer(&self, request: &BatchRequest) -> BatchResponse {
            let mut lines: Vec<String> = request
                .payload
                .lines()
                .map(|line| {
                    let (id, address) = line.split_once(',').unwrap();
                    let address = address.trim_matches(',');
                    if address.is_empty() {
                        format!("\"{id}\",\"\",\"No_Match\"")
                    } else {
                        let lat = 42.0 + id.parse::<f64>().unwrap_or(0.0) / 1000.0;
                        format!(
                            "\"{id}\",\"{address}\",\"Match\",\"Exact\",\"{address}\",\"-78.85,{lat}\",\"1\",\"L\""
                        )
                    }
                })
                .collect();
            if self.reverse_lines {
                lines.reverse();
            }
            BatchResponse {
                status: 200,
                body: lines.join("\n"),
            }
        }
    }

    impl BatchGeocodingGateway for FakeService {
        fn submit_batch(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError> {
            self.calls.set(self.calls.get() + 1);
            self.requests.borrow_mut().push(request.clone());
            match self.script.borrow_mut().pop_front() {
                Some(outcome) => outcome,
                None => Ok(self.answer(request)),
            }
        }
    }

    #[derive(Default)]
    struct RecordedPauses(RefCell<Vec<Duration>>);

    impl Pause for RecordedPauses {
        fn pause(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn settings(chunk_size: usize) -> GeocoderSettings {
        GeocoderSettings {
            chunk_size,
            retry: RetryPolicy {
                max_attempts: 5,
                base_backoff: Duration::from_millis(100),
            },
            chunk_pause: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn records(n: usize) -> Vec<AddressRecord> {
        (0..n)
            .map(|i| {
                let street = format!("{i} Main St");
                let columns = [street.as_str(), "Buffalo", "NY", "14202"];
                let parts = AddressParts::from_columns(&columns).unwrap();
                AddressRecord::new(i, parts)
            })
            .collect()
    }

    fn timeout() -> TransportError {
        TransportError::Timeout("operation timed out".into())
    }

    #[test]
    fn one_result_per_record() {
        let gw = FakeService::default();
        let pauses = RecordedPauses::default();
        let geocoder = BatchGeocoder::new(&gw, settings(DEFAULT_CHUNK_SIZE)).with_pause(&pauses);
        let input = records(25);
        let results = geocoder.geocode(&input).unwrap();
        assert_eq!(results.len(), 25);
        for (record, result) in input.iter().zip(&results) {
            assert_eq!(record.id, result.id);
            assert!(result.match_ok);
            assert_eq!(result.longitude, Some(-78.85));
        }
        assert_eq!(gw.calls.get(), 1);
        assert!(pauses.0.borrow().is_empty());
    }

    #[test]
    fn padded_ids_round_trip() {
        let gw = FakeService::default();
        let geocoder = BatchGeocoder::new(&gw, settings(10)).with_pause(RecordedPauses::default());
        let input = vec![AddressRecord::free_form(" 7", "65 Niagara Sq Buffalo NY")];
        let results = geocoder.geocode(&input).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), " 7");
        assert!(results[0].match_ok);
    }

    #[test]
    fn results_are_correlated_by_id_not_position() {
        let gw = FakeService {
            reverse_lines: true,
            ..Default::default()
        };
        let geocoder = BatchGeocoder::new(&gw, settings(10)).with_pause(RecordedPauses::default());
        let input = records(7);
        let results = geocoder.geocode(&input).unwrap();
        let lat_of_3 = results.iter().find(|r| r.id.as_str() == "3").unwrap().latitude;
        assert_eq!(lat_of_3, Some(42.0 + 3.0 / 1000.0));
    }

    #[test]
    fn chunking_does_not_alter_results() {
        let input = records(23);

        let single = FakeService::default();
        let expected = BatchGeocoder::new(&single, settings(MAX_BATCH_SIZE))
            .with_pause(RecordedPauses::default())
            .geocode(&input)
            .unwrap();

        let chunked = FakeService::default();
        let pauses = RecordedPauses::default();
        let results = BatchGeocoder::new(&chunked, settings(5))
            .with_pause(&pauses)
            .geocode(&input)
            .unwrap();

        assert_eq!(results, expected);
        assert_eq!(single.calls.get(), 1);
        assert_eq!(chunked.calls.get(), 5);
        let requests = chunked.requests.borrow();
        assert_eq!(requests[0].payload.lines().count(), 5);
        assert_eq!(requests[4].payload.lines().count(), 3);
        assert!(requests[1].payload.starts_with("5,"));
        // only between chunks
        assert_eq!(*pauses.0.borrow(), vec![Duration::from_millis(1); 4]);
    }

    #[test]
    fn reject_oversized_chunks_before_any_request() {
        let gw = FakeService::default();
        let geocoder = BatchGeocoder::new(&gw, settings(10_001));
        let err = geocoder.geocode(&records(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::ChunkSizeTooLarge(10_001))
        ));
        assert_eq!(err.stage(), Stage::Configuration);
        assert_eq!(gw.calls.get(), 0);
    }

    #[test]
    fn reject_zero_chunk_size() {
        let gw = FakeService::default();
        let err = BatchGeocoder::new(&gw, settings(0))
            .geocode(&records(3))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ChunkSizeZero)));
        assert_eq!(gw.calls.get(), 0);
    }

    #[test]
    fn reject_invalid_ids() {
        let gw = FakeService::default();
        let geocoder = BatchGeocoder::new(&gw, settings(10));

        let mut input = records(3);
        input[2].id = "1".into();
        assert!(matches!(
            geocoder.geocode(&input),
            Err(Error::Config(ConfigError::DuplicateId(id))) if id.as_str() == "1"
        ));

        let mut input = records(3);
        input[1].id = "".into();
        assert!(matches!(
            geocoder.geocode(&input),
            Err(Error::Config(ConfigError::EmptyId(1)))
        ));
        assert_eq!(gw.calls.get(), 0);
    }

    #[test]
    fn reject_mixed_address_shapes() {
        let gw = FakeService::default();
        let mut input = records(3);
        input.push(AddressRecord::free_form("x", "65 Niagara Sq"));
        let err = BatchGeocoder::new(&gw, settings(10))
            .geocode(&input)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MixedAddressShapes(3))
        ));
        assert_eq!(gw.calls.get(), 0);
    }

    #[test]
    fn empty_input_makes_no_request() {
        let gw = FakeService::default();
        let results = BatchGeocoder::new(&gw, settings(10)).geocode(&[]).unwrap();
        assert!(results.is_empty());
        assert_eq!(gw.calls.get(), 0);
    }

    #[test]
    fn retry_transient_failures() {
        let gw = FakeService::scripted(vec![
            Err(timeout()),
            Err(TransportError::Connect("refused".into())),
        ]);
        let pauses = RecordedPauses::default();
        let geocoder = BatchGeocoder::new(&gw, settings(10)).with_pause(&pauses);
        let results = geocoder.geocode(&records(4)).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(gw.calls.get(), 3);
        let pauses = pauses.0.borrow();
        assert_eq!(pauses.len(), 2);
        assert!(pauses[0] <= pauses[1]);
        assert!(pauses[0] >= Duration::from_millis(200));
    }

    #[test]
    fn give_up_after_max_attempts() {
        let gw = FakeService::scripted((0..5).map(|_| Err(timeout())).collect());
        let pauses = RecordedPauses::default();
        let geocoder = BatchGeocoder::new(&gw, settings(10)).with_pause(&pauses);
        let err = geocoder.geocode(&records(4)).unwrap_err();
        assert_eq!(err.stage(), Stage::Transport);
        assert!(matches!(err, Error::Transport { attempts: 5, .. }));
        assert_eq!(gw.calls.get(), 5);
        assert_eq!(pauses.0.borrow().len(), 4);
    }

    #[test]
    fn a_failing_chunk_aborts_the_whole_call() {
        let mut script: Vec<_> = vec![Ok(BatchResponse {
            status: 200,
            body: "\"0\",\"x\",\"No_Match\"\n\"1\",\"x\",\"No_Match\"".into(),
        })];
        script.extend((0..5).map(|_| Err(timeout())));
        let gw = FakeService::scripted(script);
        let geocoder = BatchGeocoder::new(&gw, settings(2)).with_pause(RecordedPauses::default());
        let err = geocoder.geocode(&records(5)).unwrap_err();
        assert_eq!(err.rows(), Some(2..4));
        // the third chunk is never submitted
        assert_eq!(gw.calls.get(), 6);
    }

    #[test]
    fn best_effort_separates_failed_chunks() {
        let mut script: Vec<_> = vec![Ok(BatchResponse {
            status: 200,
            body: "\"0\",\"x\",\"No_Match\"\n\"1\",\"x\",\"No_Match\"".into(),
        })];
        script.extend((0..5).map(|_| Err(timeout())));
        let gw = FakeService::scripted(script);
        let geocoder = BatchGeocoder::new(&gw, settings(2)).with_pause(RecordedPauses::default());
        let outcome = geocoder.geocode_best_effort(&records(5)).unwrap();
        assert!(!outcome.is_complete());
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].rows, 2..4);
        let missing: Vec<_> = outcome.missing_ids().map(RecordId::as_str).collect();
        assert_eq!(missing, vec!["2", "3"]);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.id.as_str() != "2" && r.id.as_str() != "3"));
    }

    #[test]
    fn best_effort_still_rejects_bad_configuration() {
        let gw = FakeService::default();
        let err = BatchGeocoder::new(&gw, settings(20_000))
            .geocode_best_effort(&records(1))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Configuration);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let body = format!("Bad request {}", "x".repeat(1000));
        let gw = FakeService::scripted(vec![Ok(BatchResponse { status: 400, body })]);
        let err = BatchGeocoder::new(&gw, settings(10))
            .with_pause(RecordedPauses::default())
            .geocode(&records(2))
            .unwrap_err();
        match err {
            Error::Service {
                status, excerpt, ..
            } => {
                assert_eq!(status, 400);
                assert!(excerpt.starts_with("Bad request"));
                assert!(excerpt.len() < 600);
            }
            err => panic!("unexpected error: {err}"),
        }
        assert_eq!(gw.calls.get(), 1);
    }

    #[test]
    fn server_errors_are_retried() {
        let gw = FakeService::scripted(vec![Ok(BatchResponse {
            status: 503,
            body: "Service Unavailable".into(),
        })]);
        let results = BatchGeocoder::new(&gw, settings(10))
            .with_pause(RecordedPauses::default())
            .geocode(&records(2))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(gw.calls.get(), 2);
    }

    #[test]
    fn server_errors_surface_after_retries() {
        let gw = FakeService::scripted(
            (0..5)
                .map(|_| {
                    Ok(BatchResponse {
                        status: 502,
                        body: "Bad Gateway".into(),
                    })
                })
                .collect(),
        );
        let err = BatchGeocoder::new(&gw, settings(10))
            .with_pause(RecordedPauses::default())
            .geocode(&records(2))
            .unwrap_err();
        assert!(matches!(err, Error::Service { status: 502, .. }));
        assert_eq!(gw.calls.get(), 5);
    }

    #[test]
    fn malformed_responses_are_parse_errors() {
        let gw = FakeService::scripted(vec![Ok(BatchResponse {
            status: 200,
            body: "\"99\",\"x\",\"Match\"".into(),
        })]);
        let err = BatchGeocoder::new(&gw, settings(10))
            .geocode(&records(2))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Parse);
        assert_eq!(gw.calls.get(), 1);
    }

    #[test]
    fn blank_addresses_produce_unmatched_rows() {
        let gw = FakeService::default();
        let blank = AddressParts::from_columns(&["", "", "", ""]).unwrap();
        let mut input = records(2);
        input.push(AddressRecord::new("blank", blank));
        let results = BatchGeocoder::new(&gw, settings(10)).geocode(&input).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[2], GeocodeResult::unmatched("blank".into()));
        assert!(gw.requests.borrow()[0].payload.ends_with("blank,,,,\n"));
    }

    #[test]
    fn submit_benchmark_with_every_request() {
        let gw = FakeService::default();
        let settings = GeocoderSettings {
            benchmark: "Public_AR_Census2020".into(),
            ..settings(1)
        };
        BatchGeocoder::new(&gw, settings)
            .with_pause(RecordedPauses::default())
            .geocode(&records(2))
            .unwrap();
        assert!(gw
            .requests
            .borrow()
            .iter()
            .all(|r| r.benchmark == "Public_AR_Census2020"));
    }

    #[test]
    fn debug_sink_sees_all_attempts() {
        #[derive(Default, Clone)]
        struct Traffic(Rc<RefCell<Vec<(usize, u32, Option<u16>)>>>);

        impl BatchDebugSink for Traffic {
            fn request_sent(&self, chunk: usize, attempt: u32, _: &BatchRequest) {
                self.0.borrow_mut().push((chunk, attempt, None));
            }
            fn response_received(&self, chunk: usize, attempt: u32, res: &BatchResponse) {
                self.0.borrow_mut().push((chunk, attempt, Some(res.status)));
            }
        }

        let traffic = Traffic::default();
        let gw = FakeService::scripted(vec![Err(timeout())]);
        BatchGeocoder::new(&gw, settings(10))
            .with_pause(RecordedPauses::default())
            .with_debug_sink(traffic.clone())
            .geocode(&records(1))
            .unwrap();
        assert_eq!(
            *traffic.0.borrow(),
            vec![(0, 1, None), (0, 2, None), (0, 2, Some(200))]
        );
    }
}
