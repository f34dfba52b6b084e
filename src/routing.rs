//! Driving directions
//!
//! Fetches a route from OpenRouteService and turns its polyline into
//! [`RoutePoint`]s carrying cumulative distance and drive time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::config::RoutingConfig;
use crate::error::{UpstreamError, UpstreamFailure};
use crate::models::{Coordinate, RoutePoint};
use crate::{CommuteSenseError, Result, upstream};

const PROVIDER: &str = "OpenRouteService";

/// ORS error codes meaning there is no drivable route between the points
const NO_ROUTE_CODES: [u32; 3] = [2004, 2009, 2010];

/// Computes a driving route between two coordinates
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Non-empty, ordered points from `origin` to `destination`
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<Vec<RoutePoint>>;
}

/// OpenRouteService directions client
pub struct OpenRouteServiceClient {
    client: ClientWithMiddleware,
    base_url: String,
    profile: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lon, lat]` pairs
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    segments: Vec<Segment>,
    summary: Option<Summary>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<Step>,
}

/// One maneuver, spanning polyline indices `way_points[0]..=way_points[1]`
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    pub way_points: [usize; 2],
}

/// Route totals
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<u32>,
    message: Option<String>,
}

impl OpenRouteServiceClient {
    pub fn new(config: &RoutingConfig, max_retries: u32) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| CommuteSenseError::config("Missing routing API key"))?;
        let client = upstream::build_client(
            Duration::from_secs(u64::from(config.timeout_seconds)),
            max_retries,
        )
        .map_err(|e| CommuteSenseError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
            api_key,
        })
    }
}

fn no_route(message: impl Into<String>) -> CommuteSenseError {
    CommuteSenseError::Routing(UpstreamError::new(UpstreamFailure::NoRoute, message))
}

/// Classify a failed directions response, spotting the no-route cases
fn classify_failure(status: reqwest::StatusCode, body: &str) -> CommuteSenseError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
    let code = detail.as_ref().and_then(|d| d.code);

    if status == reqwest::StatusCode::NOT_FOUND
        || code.is_some_and(|c| NO_ROUTE_CODES.contains(&c))
    {
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| "No drivable route between origin and destination".to_string());
        return no_route(message);
    }

    CommuteSenseError::Routing(UpstreamError::from_status(PROVIDER, status, body))
}

#[async_trait]
impl DirectionsProvider for OpenRouteServiceClient {
    #[instrument(name = "directions", skip(self))]
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<Vec<RoutePoint>> {
        let url = format!("{}/v2/directions/{}/geojson", self.base_url, self.profile);
        let body = json!({
            "coordinates": [
                [origin.longitude, origin.latitude],
                [destination.longitude, destination.latitude],
            ]
        });
        let body = serde_json::to_vec(&body).map_err(|e| {
            CommuteSenseError::Routing(UpstreamError::new(
                UpstreamFailure::InvalidResponse,
                format!("Failed to encode request: {e}"),
            ))
        })?;

        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/geo+json, application/json")
            .body(body);

        let response = upstream::send_raw(PROVIDER, request)
            .await
            .map_err(CommuteSenseError::Routing)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let directions: DirectionsResponse = upstream::read_json(PROVIDER, response)
            .await
            .map_err(CommuteSenseError::Routing)?;

        let feature = directions
            .features
            .into_iter()
            .next()
            .ok_or_else(|| no_route("No drivable route between origin and destination"))?;

        let polyline = feature
            .geometry
            .coordinates
            .iter()
            .map(|[lon, lat]| Coordinate::new(*lat, *lon))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                CommuteSenseError::Routing(UpstreamError::new(
                    UpstreamFailure::InvalidResponse,
                    format!("{PROVIDER} returned an invalid coordinate: {e}"),
                ))
            })?;

        if polyline.is_empty() {
            return Err(CommuteSenseError::Routing(UpstreamError::new(
                UpstreamFailure::InvalidResponse,
                format!("{PROVIDER} returned an empty route geometry"),
            )));
        }

        let steps: Vec<Step> = feature
            .properties
            .segments
            .into_iter()
            .flat_map(|segment| segment.steps)
            .collect();
        let points = build_route_points(&polyline, &steps, feature.properties.summary);

        if let Some(last) = points.last() {
            info!(
                points = points.len(),
                distance_km = last.distance_m / 1000.0,
                duration_min = last.duration_s / 60.0,
                "Route computed"
            );
        }
        Ok(points)
    }
}

/// Distribute step distances and durations over the polyline.
///
/// Each step's totals are split across the polyline segments it covers in
/// proportion to their great-circle length. Segments no step covers are
/// scaled by the route summary. Increments are clamped at zero, so the
/// cumulative sequence never decreases.
#[must_use]
pub fn build_route_points(
    polyline: &[Coordinate],
    steps: &[Step],
    summary: Option<Summary>,
) -> Vec<RoutePoint> {
    if polyline.is_empty() {
        return Vec::new();
    }

    let lengths: Vec<f64> = polyline.windows(2).map(|w| w[0].distance_m(&w[1])).collect();
    let mut increments: Vec<Option<(f64, f64)>> = vec![None; lengths.len()];

    for step in steps {
        let [start, end] = step.way_points;
        if start >= end || end > lengths.len() {
            continue;
        }

        let span = &lengths[start..end];
        let step_length: f64 = span.iter().sum();
        let segments = (end - start) as f64;

        for (offset, length) in span.iter().enumerate() {
            let share = if step_length > 0.0 {
                length / step_length
            } else {
                1.0 / segments
            };
            let slot = &mut increments[start + offset];
            if slot.is_none() {
                *slot = Some((step.distance * share, step.duration * share));
            }
        }
    }

    // segments no step covered
    let total_length: f64 = lengths.iter().sum();
    let summary = summary.unwrap_or_default();
    let distance_scale = if total_length > 0.0 && summary.distance > 0.0 {
        summary.distance / total_length
    } else {
        1.0
    };
    let pace = if summary.distance > 0.0 {
        summary.duration / summary.distance
    } else {
        0.0
    };

    let mut points = Vec::with_capacity(polyline.len());
    let (mut distance_m, mut duration_s) = (0.0_f64, 0.0_f64);

    for (ordinal, coordinate) in polyline.iter().enumerate() {
        if ordinal > 0 {
            let index = ordinal - 1;
            let (distance, duration) = increments[index].unwrap_or_else(|| {
                let distance = lengths[index] * distance_scale;
                (distance, distance * pace)
            });
            distance_m += non_negative(distance);
            duration_s += non_negative(duration);
        }
        points.push(RoutePoint {
            ordinal,
            coordinate: *coordinate,
            distance_m,
            duration_s,
        });
    }

    points
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
