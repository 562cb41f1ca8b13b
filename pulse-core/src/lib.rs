pub mod batch;
pub mod error;
pub mod gateways;
pub mod retry;
pub mod table;
pub mod usecases;

pub mod entities {
    pub use pulse_entities::{address::*, geocode::*, id::*};
}

pub use self::error::{ConfigError, Error};

/// Hard per-request row limit of the batch geocoding service.
pub const MAX_BATCH_SIZE: usize = 10_000;
