pub mod arcgis;
pub mod census;
pub mod debug;
pub mod socrata;

mod json;

use pulse_core::gateways::open_data::FetchError;

fn fetch_error(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.to_string())
}
