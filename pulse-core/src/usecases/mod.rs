pub mod fetch;
pub mod geocode;
pub mod repair;

pub use self::{fetch::*, geocode::*, repair::*};
