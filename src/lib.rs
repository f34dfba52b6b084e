//! `CommuteSense` - weather and driving comfort along a route
//!
//! Geocodes a start and end address, fetches driving directions, samples the
//! forecast at the time the driver reaches each part of the route, scores
//! comfort and asks a language model for a short narrative.

pub mod api;
pub mod cache;
pub mod comfort;
pub mod config;
pub mod error;
pub mod forecast;
pub mod geocoding;
pub mod llm;
pub mod models;
pub mod narrative;
pub mod pipeline;
pub mod report;
pub mod routing;
pub mod telemetry;
pub mod upstream;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use cache::PersistentCache;
pub use config::CommuteSenseConfig;
pub use error::{CommuteSenseError, UpstreamError, UpstreamFailure};
pub use forecast::DailyForecastService;
pub use pipeline::{Providers, RoutePipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CommuteSenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
