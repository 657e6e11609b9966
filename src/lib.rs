pub mod api;
pub mod core;
pub mod error;
pub mod market;

pub use error::{Result, ScoutError, SearchPhase};
