//! Error types and handling for `CommuteSense`

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What went wrong when talking to an external provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamFailure {
    /// The provider had no result for the query
    NotFound,
    /// No drivable route exists between the two points
    NoRoute,
    /// The provider throttled us (HTTP 429)
    RateLimited,
    /// Credentials were rejected (HTTP 401/403)
    Unauthorized,
    /// The provider answered with a server-side error
    Unavailable,
    /// Transport failure: DNS, connect, timeout
    Network,
    /// The body could not be parsed or failed validation
    InvalidResponse,
    /// The provider answered successfully but with nothing usable
    EmptyCompletion,
}

impl UpstreamFailure {
    /// Stable snake-case name used in error bodies
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamFailure::NotFound => "not_found",
            UpstreamFailure::NoRoute => "no_route",
            UpstreamFailure::RateLimited => "rate_limited",
            UpstreamFailure::Unauthorized => "unauthorized",
            UpstreamFailure::Unavailable => "unavailable",
            UpstreamFailure::Network => "network",
            UpstreamFailure::InvalidResponse => "invalid_response",
            UpstreamFailure::EmptyCompletion => "empty_completion",
        }
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub failure: UpstreamFailure,
    pub message: String,
}

impl UpstreamError {
    pub fn new<S: Into<String>>(failure: UpstreamFailure, message: S) -> Self {
        Self {
            failure,
            message: message.into(),
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.failure)
    }
}

/// Main error type for `CommuteSense`
#[derive(Error, Debug)]
pub enum CommuteSenseError {
    /// Malformed or empty request input
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Address could not be resolved, or the geocoder failed
    #[error("Geocoding error: {0}")]
    Geocoding(UpstreamError),

    /// No route found, or the directions provider failed
    #[error("Routing error: {0}")]
    Routing(UpstreamError),

    /// Weather lookups failed
    #[error("Weather provider error: {0}")]
    WeatherProvider(UpstreamError),

    /// The LLM call failed or produced nothing
    #[error("Narrative generation error: {0}")]
    NarrativeGeneration(UpstreamError),

    /// Missing or invalid configuration, fatal at startup
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The whole pipeline ran past its deadline
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CommuteSenseError {
    /// Create a new input error
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Stable error kind exposed to API clients
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CommuteSenseError::Input { .. } => "InputError",
            CommuteSenseError::Geocoding(_) => "GeocodingError",
            CommuteSenseError::Routing(_) => "RoutingError",
            CommuteSenseError::WeatherProvider(_) => "WeatherProviderError",
            CommuteSenseError::NarrativeGeneration(_) => "NarrativeGenerationError",
            CommuteSenseError::Configuration { .. } => "ConfigurationError",
            CommuteSenseError::Timeout { .. } => "TimeoutError",
            CommuteSenseError::Cache { .. } => "CacheError",
            CommuteSenseError::Io { .. } => "IoError",
        }
    }

    /// The provider failure behind this error, if it came from a provider
    #[must_use]
    pub fn upstream_failure(&self) -> Option<UpstreamFailure> {
        match self {
            CommuteSenseError::Geocoding(e)
            | CommuteSenseError::Routing(e)
            | CommuteSenseError::WeatherProvider(e)
            | CommuteSenseError::NarrativeGeneration(e) => Some(e.failure),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CommuteSenseError::Input { message } => format!("Invalid input: {message}"),
            CommuteSenseError::Geocoding(e) => match e.failure {
                UpstreamFailure::NotFound => e.message.clone(),
                UpstreamFailure::RateLimited => {
                    "The geocoding service is busy. Please retry shortly.".to_string()
                }
                _ => "Unable to geocode the address right now.".to_string(),
            },
            CommuteSenseError::Routing(e) => match e.failure {
                UpstreamFailure::NoRoute => e.message.clone(),
                UpstreamFailure::RateLimited => {
                    "The routing service is busy. Please retry shortly.".to_string()
                }
                _ => "Unable to compute a driving route right now.".to_string(),
            },
            CommuteSenseError::WeatherProvider(_) => {
                "Weather data is unavailable for this route right now.".to_string()
            }
            CommuteSenseError::NarrativeGeneration(_) => {
                "The route summary could not be generated.".to_string()
            }
            CommuteSenseError::Configuration { .. } => {
                "Service misconfigured. Please check API keys.".to_string()
            }
            CommuteSenseError::Timeout { seconds } => {
                format!("The report took longer than {seconds}s to produce.")
            }
            CommuteSenseError::Cache { .. } | CommuteSenseError::Io { .. } => {
                "Internal error.".to_string()
            }
        }
    }
}
