//! Shared plumbing for provider HTTP calls
//!
//! Every provider client goes through [`build_client`] (retries on transient
//! failures) and [`send`] (timing, status classification). Failures come back
//! as [`UpstreamError`] and each client wraps them in its own error variant.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{UpstreamError, UpstreamFailure};

/// Calls slower than this are logged at warn level
const SLOW_CALL: Duration = Duration::from_secs(5);

/// Longest provider body excerpt kept in error messages
const BODY_EXCERPT_LEN: usize = 200;

/// Build a provider client that retries transient failures with exponential backoff
pub fn build_client(timeout: Duration, max_retries: u32) -> anyhow::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("commutesense/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
        .build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Map a non-success HTTP status to a failure class
#[must_use]
pub fn classify_status(status: StatusCode) -> UpstreamFailure {
    match status {
        StatusCode::NOT_FOUND => UpstreamFailure::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamFailure::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => UpstreamFailure::RateLimited,
        s if s.is_server_error() => UpstreamFailure::Unavailable,
        StatusCode::REQUEST_TIMEOUT => UpstreamFailure::Network,
        _ => UpstreamFailure::InvalidResponse,
    }
}

/// Send a request and log its timing, without looking at the status
pub async fn send_raw(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    let started = Instant::now();
    let response = request.send().await.map_err(UpstreamError::from)?;
    let elapsed = started.elapsed();

    if elapsed > SLOW_CALL {
        warn!(provider, elapsed_ms = elapsed.as_millis() as u64, "Slow provider call");
    } else {
        debug!(provider, elapsed_ms = elapsed.as_millis() as u64, status = %response.status(), "Provider call finished");
    }
    Ok(response)
}

/// Send a request and reject non-success statuses
pub async fn send(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    let response = send_raw(provider, request).await?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::from_status(provider, status, &body))
}

/// Decode a JSON body
pub async fn read_json<T: DeserializeOwned>(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let bytes = response.bytes().await.map_err(UpstreamError::from)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        UpstreamError::new(
            UpstreamFailure::InvalidResponse,
            format!("{provider} returned an unexpected body: {e}"),
        )
    })
}

impl UpstreamError {
    /// Classify a non-success response
    #[must_use]
    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let excerpt: String = body.trim().chars().take(BODY_EXCERPT_LEN).collect();
        let message = if excerpt.is_empty() {
            format!("{provider} answered HTTP {}", status.as_u16())
        } else {
            format!("{provider} answered HTTP {}: {excerpt}", status.as_u16())
        };
        Self::new(classify_status(status), message)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        // request URLs may carry API keys
        let error = error.without_url();
        let failure = if error.is_decode() {
            UpstreamFailure::InvalidResponse
        } else if let Some(status) = error.status() {
            classify_status(status)
        } else {
            UpstreamFailure::Network
        };
        Self::new(failure, error.to_string())
    }
}

impl From<reqwest_middleware::Error> for UpstreamError {
    fn from(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => {
                Self::new(UpstreamFailure::Network, format!("{e:#}"))
            }
        }
    }
}
