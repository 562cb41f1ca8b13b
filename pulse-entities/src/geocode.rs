use crate::id::RecordId;
use std::{num::ParseFloatError, str::FromStr};
use strum::EnumString;
use thiserror::Error;

/// The verdict of the geocoding service for a single address.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
pub enum MatchIndicator {
    #[strum(serialize = "Match")]
    Match,
    #[strum(serialize = "Tie")]
    Tie,
    #[strum(serialize = "No_Match")]
    NoMatch,
    #[strum(default)]
    Other(String),
}

impl MatchIndicator {
    /// Parses the wire literal. Empty values count as no match.
    pub fn from_wire(literal: &str) -> Self {
        let literal = literal.trim();
        if literal.is_empty() {
            return Self::NoMatch;
        }
        // the default variant makes parsing infallible
        literal
            .parse()
            .unwrap_or_else(|_| Self::Other(literal.to_owned()))
    }

    /// Only an exact match counts as a successful geocode.
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Match)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CoordinatesParseError {
    #[error("Expected 'lon,lat' but got '{0}'")]
    Format(String),
    #[error(transparent)]
    Number(#[from] ParseFloatError),
}

/// A position as reported by the geocoding service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl FromStr for Coordinates {
    type Err = CoordinatesParseError;

    /// The service reports longitude first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lon, lat) = s
            .split_once(',')
            .ok_or_else(|| CoordinatesParseError::Format(s.to_owned()))?;
        if lat.contains(',') {
            return Err(CoordinatesParseError::Format(s.to_owned()));
        }
        let longitude = lon.trim().parse()?;
        let latitude = lat.trim().parse()?;
        Ok(Self {
            longitude,
            latitude,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub id: RecordId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub match_ok: bool,
}

impl GeocodeResult {
    pub fn new(id: RecordId, indicator: &MatchIndicator, coords: Option<Coordinates>) -> Self {
        Self {
            id,
            latitude: coords.map(|c| c.latitude),
            longitude: coords.map(|c| c.longitude),
            match_ok: indicator.is_exact(),
        }
    }

    pub fn unmatched(id: RecordId) -> Self {
        Self {
            id,
            latitude: None,
            longitude: None,
            match_ok: false,
        }
    }
}
