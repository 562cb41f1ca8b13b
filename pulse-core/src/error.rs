use crate::{entities::RecordId, gateways::geocode::TransportError, MAX_BATCH_SIZE};
use std::ops::Range;
use thiserror::Error;

/// Invalid input detected before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk_size must be <= {max}; got {0}", max = MAX_BATCH_SIZE)]
    ChunkSizeTooLarge(usize),
    #[error("chunk_size must be positive")]
    ChunkSizeZero,
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("Invalid address columns: {0}")]
    AddressColumns(String),
    #[error("Row {0} has an empty id")]
    EmptyId(usize),
    #[error("Duplicate id '{0}'")]
    DuplicateId(RecordId),
    #[error("All addresses of a batch must have the same shape (row {0} differs)")]
    MixedAddressShapes(usize),
}

/// Reasons why a service response could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {line}: expected at most {max} fields but found {found}")]
    TooManyFields {
        line: usize,
        max: usize,
        found: usize,
    },
    #[error("line {line}: missing id")]
    MissingId { line: usize },
    #[error("line {line}: unknown id '{id}'")]
    UnknownId { line: usize, id: RecordId },
    #[error("line {line}: duplicate id '{id}'")]
    DuplicateId { line: usize, id: RecordId },
    #[error("line {line}: invalid coordinates: {reason}")]
    Coordinates { line: usize, reason: String },
    #[error("malformed CSV: {0}")]
    Csv(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Chunk rows {start}:{end} failed after {attempts} attempts: {source}", start = .rows.start, end = .rows.end)]
    Transport {
        rows: Range<usize>,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("Chunk rows {start}:{end} failed with status {status}: {excerpt}", start = .rows.start, end = .rows.end)]
    Service {
        rows: Range<usize>,
        status: u16,
        excerpt: String,
    },
    #[error("Chunk rows {start}:{end} returned an invalid response: {source}", start = .rows.start, end = .rows.end)]
    Parse {
        rows: Range<usize>,
        #[source]
        source: DecodeError,
    },
}

/// The processing stage at which a geocode call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Transport,
    Service,
    Parse,
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Configuration,
            Self::Transport { .. } => Stage::Transport,
            Self::Service { .. } => Stage::Service,
            Self::Parse { .. } => Stage::Parse,
        }
    }

    /// The input rows of the failed chunk, if any.
    pub fn rows(&self) -> Option<Range<usize>> {
        match self {
            Self::Config(_) => None,
            Self::Transport { rows, .. }
            | Self::Service { rows, .. }
            | Self::Parse { rows, .. } => Some(rows.clone()),
        }
    }
}

pub const EXCERPT_LEN: usize = 500;

/// The first few hundred characters of a response body.
pub fn excerpt(body: &str) -> String {
    match body.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}
