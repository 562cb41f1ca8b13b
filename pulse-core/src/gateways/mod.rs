pub mod debug;
pub mod geocode;
pub mod open_data;
