//! HTTP API: route handlers, error mapping and the OpenAPI document

use std::sync::Arc;

use aide::{
    OperationOutput,
    axum::{ApiRouter, routing::get_with},
    openapi::OpenApi,
    transform::{TransformOpenApi, TransformOperation},
};
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamFailure;
use crate::forecast::{DailyForecastService, MAX_FORECAST_DAYS};
use crate::models::{DailyWeatherReport, RouteReport};
use crate::pipeline::RoutePipeline;
use crate::{CommuteSenseError, VERSION};

pub mod docs;

/// Shared, read-only per-process state
pub struct AppState {
    pub pipeline: Arc<RoutePipeline>,
    pub forecasts: Arc<DailyForecastService>,
}

/// Structured error body returned for every failed request
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDetail {
    /// Stable error kind, e.g. `GeocodingError`
    pub kind: String,
    /// Provider failure class, when a provider was involved
    pub reason: Option<String>,
    pub message: String,
}

/// A [`CommuteSenseError`] on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub CommuteSenseError);

impl From<CommuteSenseError> for ApiError {
    fn from(error: CommuteSenseError) -> Self {
        Self(error)
    }
}

/// HTTP status for an error
#[must_use]
pub fn status_for(error: &CommuteSenseError) -> StatusCode {
    if error.upstream_failure() == Some(UpstreamFailure::RateLimited) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match error {
        CommuteSenseError::Input { .. } => StatusCode::BAD_REQUEST,
        CommuteSenseError::Geocoding(e) if e.failure == UpstreamFailure::NotFound => {
            StatusCode::BAD_REQUEST
        }
        CommuteSenseError::Routing(e) if e.failure == UpstreamFailure::NoRoute => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CommuteSenseError::Geocoding(_)
        | CommuteSenseError::Routing(_)
        | CommuteSenseError::WeatherProvider(_)
        | CommuteSenseError::NarrativeGeneration(_) => StatusCode::BAD_GATEWAY,
        CommuteSenseError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CommuteSenseError::Configuration { .. }
        | CommuteSenseError::Cache { .. }
        | CommuteSenseError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::info!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.0.kind().to_string(),
                reason: self.0.upstream_failure().map(|f| f.as_str().to_string()),
                message: self.0.user_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl OperationOutput for ApiError {
    type Inner = ErrorBody;
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RouteReportQuery {
    /// Start address, or `lat,lon`
    pub origin: Option<String>,
    /// End address, or `lat,lon`
    pub destination: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DailyWeatherQuery {
    /// Address, or `lat,lon`
    pub address: Option<String>,
    /// Number of days, 1 to 7 (default 7)
    #[schemars(with = "Option<u8>")]
    pub days: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TodayWeatherQuery {
    /// Address, or `lat,lon`
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

fn required(value: Option<String>, name: &str) -> Result<String, CommuteSenseError> {
    value.ok_or_else(|| CommuteSenseError::input(format!("Query parameter '{name}' is required")))
}

fn parse_days(days: Option<String>) -> Result<u8, CommuteSenseError> {
    let Some(days) = days else {
        return Ok(MAX_FORECAST_DAYS);
    };
    days.trim().parse::<u8>().map_err(|_| {
        CommuteSenseError::input(format!(
            "Days must be a number between 1 and {MAX_FORECAST_DAYS}, got: {days}"
        ))
    })
}

async fn route_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteReportQuery>,
) -> Result<Json<RouteReport>, ApiError> {
    let origin = required(query.origin, "origin")?;
    let destination = required(query.destination, "destination")?;
    let report = state.pipeline.run(&origin, &destination).await?;
    Ok(Json(report))
}

async fn daily_weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyWeatherQuery>,
) -> Result<Json<DailyWeatherReport>, ApiError> {
    let address = required(query.address, "address")?;
    let days = parse_days(query.days)?;
    let report = state.forecasts.report(&address, days).await?;
    Ok(Json(report))
}

async fn today_weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TodayWeatherQuery>,
) -> Result<Json<DailyWeatherReport>, ApiError> {
    let address = required(query.address, "address")?;
    let report = state.forecasts.report(&address, 1).await?;
    Ok(Json(report))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
    })
}

fn error_responses(op: TransformOperation) -> TransformOperation {
    op.response_with::<400, Json<ErrorBody>, _>(|r| {
        r.description("Invalid input, or an address that could not be geocoded")
    })
    .response_with::<502, Json<ErrorBody>, _>(|r| r.description("A provider failed"))
    .response_with::<503, Json<ErrorBody>, _>(|r| r.description("A provider is rate limiting"))
    .response_with::<504, Json<ErrorBody>, _>(|r| r.description("The request timed out"))
}

fn route_report_docs(op: TransformOperation) -> TransformOperation {
    error_responses(
        op.summary("Route weather report")
            .description(
                "Geocodes both locations, fetches driving directions, samples weather along \
                 the route at projected arrival times, scores comfort and adds a narrative.",
            )
            .response::<200, Json<RouteReport>>(),
    )
    .response_with::<422, Json<ErrorBody>, _>(|r| r.description("No drivable route"))
}

fn daily_weather_docs(op: TransformOperation) -> TransformOperation {
    error_responses(
        op.summary("Daily forecast")
            .description("Day-by-day forecast for one location with a narrative summary.")
            .response::<200, Json<DailyWeatherReport>>(),
    )
}

fn today_weather_docs(op: TransformOperation) -> TransformOperation {
    error_responses(
        op.summary("Today's forecast")
            .description("Forecast for the current day at one location.")
            .response::<200, Json<DailyWeatherReport>>(),
    )
}

fn api_routes() -> ApiRouter<Arc<AppState>> {
    aide::generate::infer_responses(true);
    let router = ApiRouter::new()
        .api_route("/route-report", get_with(route_report, route_report_docs))
        .api_route("/weather/daily", get_with(daily_weather, daily_weather_docs))
        .api_route("/weather/today", get_with(today_weather, today_weather_docs))
        .api_route(
            "/health",
            get_with(health, |op| op.summary("Liveness probe")),
        )
        .nest_api_service("/docs", docs::docs_routes());
    aide::generate::infer_responses(false);
    router
}

fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("CommuteSense API")
        .version(VERSION)
        .description("Weather and driving comfort along a route")
}

/// The OpenAPI document describing every route
#[must_use]
pub fn openapi_document() -> OpenApi {
    let mut api = OpenApi::default();
    let _ = api_routes().finish_api_with(&mut api, api_docs);
    api
}

/// The complete application router
pub fn app(state: Arc<AppState>) -> Router {
    let mut api = OpenApi::default();
    api_routes()
        .finish_api_with(&mut api, api_docs)
        .layer(Extension(Arc::new(api)))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;

    fn upstream(failure: UpstreamFailure) -> UpstreamError {
        UpstreamError::new(failure, "test")
    }

    #[test]
    fn test_status_mapping() {
        use CommuteSenseError as E;
        use UpstreamFailure as F;

        let cases = [
            (E::input("x"), StatusCode::BAD_REQUEST),
            (E::Geocoding(upstream(F::NotFound)), StatusCode::BAD_REQUEST),
            (E::Geocoding(upstream(F::InvalidResponse)), StatusCode::BAD_GATEWAY),
            (E::Geocoding(upstream(F::RateLimited)), StatusCode::SERVICE_UNAVAILABLE),
            (E::Routing(upstream(F::NoRoute)), StatusCode::UNPROCESSABLE_ENTITY),
            (E::Routing(upstream(F::Unavailable)), StatusCode::BAD_GATEWAY),
            (E::WeatherProvider(upstream(F::Network)), StatusCode::BAD_GATEWAY),
            (E::NarrativeGeneration(upstream(F::EmptyCompletion)), StatusCode::BAD_GATEWAY),
            (E::NarrativeGeneration(upstream(F::RateLimited)), StatusCode::SERVICE_UNAVAILABLE),
            (E::Timeout { seconds: 90 }, StatusCode::GATEWAY_TIMEOUT),
            (E::config("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (E::cache("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(status_for(&error), expected, "{error}");
        }
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(None).unwrap(), 7);
        assert_eq!(parse_days(Some("3".to_string())).unwrap(), 3);
        assert!(parse_days(Some("three".to_string())).is_err());
        assert!(parse_days(Some("-1".to_string())).is_err());
    }

    #[test]
    fn test_openapi_document_lists_routes() {
        let api = openapi_document();
        let json = serde_json::to_value(&api).unwrap();
        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/route-report"));
        assert!(paths.contains_key("/weather/daily"));
        assert!(paths.contains_key("/weather/today"));
        assert!(paths.contains_key("/health"));
    }
}
