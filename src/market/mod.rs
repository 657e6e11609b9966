pub mod active;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod sold;
pub mod token;

pub use active::ActiveListingResolver;
pub use metrics::compute_metrics;
pub use models::*;
pub use orchestrator::Aggregator;
pub use sold::SoldListingResolver;
pub use token::TokenProvider;
