//! Wire format of the batch geocoding service.
//!
//! Requests are headerless CSV with exactly five columns:
//! `id, street, city, state, zip`. Responses are headerless CSV with
//! up to eight positional fields:
//!
//! | # | field                    |
//! |---|--------------------------|
//! | 0 | id                       |
//! | 1 | input address echo       |
//! | 2 | match flag               |
//! | 3 | match type               |
//! | 4 | matched address          |
//! | 5 | `"lon,lat"`              |
//! | 6 | reference line id        |
//! | 7 | side of street           |
//!
//! Lines of unmatched addresses usually stop after the match flag.

use crate::{
    entities::{AddressRecord, Coordinates, GeocodeResult, MatchIndicator, RecordId},
    error::DecodeError,
    gateways::geocode::TransportError,
};
use std::collections::HashMap;

pub const REQUEST_COLUMNS: usize = 5;
pub const RESPONSE_FIELDS: usize = 8;

const FIELD_ID: usize = 0;
const FIELD_MATCH: usize = 2;
const FIELD_COORDINATES: usize = 5;

pub fn encode_payload(records: &[AddressRecord]) -> Result<String, TransportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        let [street, city, state, zip] = record.parts.columns();
        let row: [&str; REQUEST_COLUMNS] = [record.id.as_str(), street, city, state, zip];
        writer
            .write_record(row)
            .map_err(|err| TransportError::Request(err.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| TransportError::Request(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| TransportError::Request(err.to_string()))
}

/// Decodes a response into exactly one result per expected id.
///
/// The results are returned in the order of `expected`.
/// Ids the service did not echo are reported as unmatched.
pub fn decode_response(
    body: &str,
    expected: &[RecordId],
) -> Result<Vec<GeocodeResult>, DecodeError> {
    let positions: HashMap<&str, usize> = expected
        .iter()
        .enumerate()
        .map(|(pos, id)| (id.as_str(), pos))
        .collect();
    let mut slots: Vec<Option<GeocodeResult>> = vec![None; expected.len()];

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| DecodeError::Csv(err.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() > RESPONSE_FIELDS {
            return Err(DecodeError::TooManyFields {
                line,
                max: RESPONSE_FIELDS,
                found: record.len(),
            });
        }
        let field = |pos: usize| record.get(pos).map(str::trim).unwrap_or_default();

        // ids are echoed verbatim, padding included
        let id = record.get(FIELD_ID).unwrap_or_default();
        if id.trim().is_empty() {
            return Err(DecodeError::MissingId { line });
        }
        let Some(&pos) = positions.get(id).or_else(|| positions.get(id.trim())) else {
            return Err(DecodeError::UnknownId {
                line,
                id: id.into(),
            });
        };
        if slots[pos].is_some() {
            return Err(DecodeError::DuplicateId {
                line,
                id: id.into(),
            });
        }

        let indicator = MatchIndicator::from_wire(field(FIELD_MATCH));
        let coords = match field(FIELD_COORDINATES) {
            "" => None,
            pair => Some(pair.parse::<Coordinates>().map_err(|err| {
                DecodeError::Coordinates {
                    line,
                    reason: err.to_string(),
                }
            })?),
        };
        slots[pos] = Some(GeocodeResult::new(expected[pos].clone(), &indicator, coords));
    }

    let results = slots
        .into_iter()
        .zip(expected)
        .map(|(slot, id)| {
            slot.unwrap_or_else(|| {
                log::warn!("No result line for id '{id}': treating it as unmatched");
                GeocodeResult::unmatched(id.clone())
            })
        })
        .collect();
    Ok(results)
}
