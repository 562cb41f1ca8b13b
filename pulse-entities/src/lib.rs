//#![deny(missing_docs)] // TODO: Complete missing documentation and enable this option
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(test, deny(warnings))]

//! # pulse-entities
//!
//! Reusable, agnostic domain entities for civic-pulse.
//!
//! The entities only describe the rows flowing in and out of the
//! batch geocoder. They contain no knowledge about the geocoding service.

pub mod address;
pub mod geocode;
pub mod id;
