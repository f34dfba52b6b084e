//! End-to-end tests of the HTTP surface with in-process fake providers

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use commutesense::geocoding::Geocoder;
use commutesense::models::{
    Coordinate, DailyWeather, Place, Projection, RouteAssessment, RoutePoint, WeatherSample,
};
use commutesense::narrative::NarrativeGenerator;
use commutesense::routing::DirectionsProvider;
use commutesense::weather::{SamplingSettings, WeatherSampler, WeatherSource};
use commutesense::{
    AppState, CommuteSenseConfig, CommuteSenseError, DailyForecastService, Providers, Result,
    RoutePipeline, UpstreamError, UpstreamFailure, web,
};

#[derive(Default)]
struct Calls {
    geocode: AtomicUsize,
    route: AtomicUsize,
    weather: AtomicUsize,
    narrative: AtomicUsize,
}

struct FakeGeocoder {
    calls: Arc<Calls>,
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Place> {
        self.calls.geocode.fetch_add(1, Ordering::SeqCst);
        let (city, lat, lon) = match address {
            "1600 Amphitheatre Parkway, Mountain View, CA" => ("Mountain View", 37.4220, -122.0841),
            "1 Infinite Loop, Cupertino, CA" => ("Cupertino", 37.3318, -122.0312),
            "Sacramento, CA" => ("Sacramento", 38.5816, -121.4944),
            _ => {
                return Err(CommuteSenseError::Geocoding(UpstreamError::new(
                    UpstreamFailure::NotFound,
                    format!("Address not found: {address}"),
                )));
            }
        };
        Ok(Place {
            coordinate: Coordinate::new(lat, lon)?,
            display_name: format!("{address}, USA"),
            city: Some(city.to_string()),
            state: Some("California".to_string()),
        })
    }
}

/// Straight line split into `segments` pieces of 30 km / 20 min each
struct FakeDirections {
    calls: Arc<Calls>,
    segments: usize,
}

#[async_trait]
impl DirectionsProvider for FakeDirections {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<Vec<RoutePoint>> {
        self.calls.route.fetch_add(1, Ordering::SeqCst);
        let n = self.segments as f64;
        (0..=self.segments)
            .map(|i| {
                let t = i as f64 / n;
                Ok(RoutePoint {
                    ordinal: i,
                    coordinate: Coordinate::new(
                        origin.latitude + (destination.latitude - origin.latitude) * t,
                        origin.longitude + (destination.longitude - origin.longitude) * t,
                    )?,
                    distance_m: i as f64 * 30_000.0,
                    duration_s: i as f64 * 1_200.0,
                })
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
enum WeatherMode {
    Clear,
    /// Every other lookup fails
    Flaky,
    Down,
}

struct FakeWeather {
    calls: Arc<Calls>,
    mode: WeatherMode,
}

#[async_trait]
impl WeatherSource for FakeWeather {
    async fn observe(&self, coordinate: Coordinate, at: DateTime<Utc>) -> Result<WeatherSample> {
        let call = self.calls.weather.fetch_add(1, Ordering::SeqCst);
        let fail = match self.mode {
            WeatherMode::Clear => false,
            WeatherMode::Flaky => call % 2 == 1,
            WeatherMode::Down => true,
        };
        if fail {
            return Err(CommuteSenseError::WeatherProvider(UpstreamError::new(
                UpstreamFailure::Unavailable,
                "Open-Meteo answered HTTP 503",
            )));
        }
        Ok(WeatherSample {
            coordinate,
            valid_at: at,
            projection: Projection::Arrival,
            temperature_c: Some(22.0),
            apparent_temperature_c: 22.0,
            precipitation_mm: 0.0,
            precipitation_probability: Some(5.0),
            wind_speed_kmh: Some(6.0),
            wind_gusts_kmh: 9.0,
            visibility_m: Some(24_000.0),
            is_day: true,
            weather_code: Some(0),
            description: "Clear sky".to_string(),
        })
    }

    async fn daily(&self, coordinate: Coordinate, days: u8) -> Result<Vec<DailyWeather>> {
        self.calls.weather.fetch_add(1, Ordering::SeqCst);
        let start = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        Ok((0..days)
            .map(|d| DailyWeather {
                date: start + chrono::Days::new(u64::from(d)),
                coordinate,
                description: "Partly cloudy".to_string(),
                temperature_max_c: 24.0,
                temperature_min_c: 12.0,
                apparent_temperature_max_c: 23.0,
                apparent_temperature_min_c: 11.0,
                sunrise: None,
                sunset: None,
                precipitation_sum_mm: 0.0,
                wind_speed_max_kmh: 12.0,
            })
            .collect())
    }
}

#[derive(Clone, Copy)]
enum NarratorMode {
    Working,
    Failing,
    Slow,
}

struct FakeNarrator {
    calls: Arc<Calls>,
    mode: NarratorMode,
}

#[async_trait]
impl NarrativeGenerator for FakeNarrator {
    async fn route_narrative(&self, assessment: &RouteAssessment) -> Result<String> {
        self.calls.narrative.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            NarratorMode::Working => Ok(format!(
                "Expect {} conditions from {} to {}.",
                assessment.summary.to_lowercase(),
                assessment.origin.label(),
                assessment.destination.label()
            )),
            NarratorMode::Failing => Err(CommuteSenseError::NarrativeGeneration(
                UpstreamError::new(UpstreamFailure::EmptyCompletion, "Completion content was empty"),
            )),
            NarratorMode::Slow => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            }
        }
    }

    async fn daily_narrative(&self, place: &Place, days: &[DailyWeather]) -> Result<String> {
        self.calls.narrative.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} days of sunshine in {}.", days.len(), place.label()))
    }
}

struct Harness {
    app: axum::Router,
    calls: Arc<Calls>,
}

fn harness(weather: WeatherMode, narrator: NarratorMode, timeout: Duration) -> Harness {
    let calls = Arc::new(Calls::default());
    let source = Arc::new(FakeWeather {
        calls: calls.clone(),
        mode: weather,
    });
    let providers = Providers {
        geocoder: Arc::new(FakeGeocoder {
            calls: calls.clone(),
        }),
        directions: Arc::new(FakeDirections {
            calls: calls.clone(),
            segments: 10,
        }),
        weather: Arc::new(WeatherSampler::new(source, None, SamplingSettings::default())),
        narrator: Arc::new(FakeNarrator {
            calls: calls.clone(),
            mode: narrator,
        }),
    };
    let state = Arc::new(AppState {
        pipeline: Arc::new(RoutePipeline::new(providers.clone(), timeout)),
        forecasts: Arc::new(DailyForecastService::new(providers, timeout)),
    });
    Harness {
        app: web::router(state),
        calls,
    }
}

fn working() -> Harness {
    harness(WeatherMode::Clear, NarratorMode::Working, Duration::from_secs(30))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

const REPORT_URI: &str = "/route-report?origin=1600%20Amphitheatre%20Parkway%2C%20Mountain%20View%2C%20CA&destination=1%20Infinite%20Loop%2C%20Cupertino%2C%20CA";

#[tokio::test]
async fn test_route_report_success() {
    let Harness { app, calls } = working();
    let (status, body) = get(app, REPORT_URI).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["origin"]["city"], "Mountain View");
    assert_eq!(body["destination"]["city"], "Cupertino");
    assert!(body["total_distance_m"].as_f64().unwrap() > 0.0);
    assert!(!body["points"].as_array().unwrap().is_empty());
    assert!(!body["narrative"].as_str().unwrap().is_empty());
    assert_eq!(body["overall_comfort"]["status"], "scored");
    assert_eq!(body["overall_comfort"]["rating"], "perfect");

    assert_eq!(calls.geocode.load(Ordering::SeqCst), 2);
    assert_eq!(calls.route.load(Ordering::SeqCst), 1);
    assert_eq!(calls.narrative.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_route_points_are_ordered_and_monotone() {
    let (_, body) = get(working().app, REPORT_URI).await;
    let points = body["points"].as_array().unwrap();

    // 300 km route sampled every 48 km plus the end point
    let ordinals: Vec<u64> = points.iter().map(|p| p["ordinal"].as_u64().unwrap()).collect();
    assert_eq!(ordinals, vec![0, 2, 4, 6, 8, 10]);

    let distances: Vec<f64> = points
        .iter()
        .map(|p| p["distance_m"].as_f64().unwrap())
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_literal_coordinates_skip_geocoding() {
    let Harness { app, calls } = working();
    let (status, body) = get(
        app,
        "/route-report?origin=37.4220,-122.0841&destination=1%20Infinite%20Loop%2C%20Cupertino%2C%20CA",
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(calls.geocode.load(Ordering::SeqCst), 1);
    assert_eq!(body["origin"]["display_name"], "37.4220, -122.0841");
}

#[tokio::test]
async fn test_unresolvable_origin_is_bad_request() {
    let Harness { app, calls } = working();
    let (status, body) = get(
        app,
        "/route-report?origin=Nowhere%20Special&destination=1%20Infinite%20Loop%2C%20Cupertino%2C%20CA",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "GeocodingError");
    assert_eq!(body["error"]["reason"], "not_found");
    assert!(body["error"]["message"].as_str().unwrap().contains("Nowhere Special"));

    assert_eq!(calls.route.load(Ordering::SeqCst), 0);
    assert_eq!(calls.weather.load(Ordering::SeqCst), 0);
    assert_eq!(calls.narrative.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_or_empty_input() {
    let (status, body) = get(working().app, "/route-report?origin=Sacramento%2C%20CA").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "InputError");

    let (status, body) = get(
        working().app,
        "/route-report?origin=%20%20&destination=Sacramento%2C%20CA",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "InputError");
    assert!(body["error"]["reason"].is_null());
}

#[tokio::test]
async fn test_narrative_failure_returns_no_partial_report() {
    let harness = harness(WeatherMode::Clear, NarratorMode::Failing, Duration::from_secs(30));
    let (status, body) = get(harness.app, REPORT_URI).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "NarrativeGenerationError");
    assert_eq!(body["error"]["reason"], "empty_completion");
    assert!(body.get("points").is_none());
    assert!(body.get("narrative").is_none());
}

#[tokio::test]
async fn test_pipeline_timeout() {
    let harness = harness(WeatherMode::Clear, NarratorMode::Slow, Duration::from_millis(100));
    let (status, body) = get(harness.app, REPORT_URI).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], "TimeoutError");
}

#[tokio::test]
async fn test_partial_weather_failure_marks_points_unknown() {
    let harness = harness(WeatherMode::Flaky, NarratorMode::Working, Duration::from_secs(30));
    let (status, body) = get(harness.app, REPORT_URI).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let points = body["points"].as_array().unwrap();
    let unknown = points
        .iter()
        .filter(|p| p["weather"]["status"] == "unknown")
        .count();
    assert!(unknown > 0 && unknown < points.len());
    assert!(
        points
            .iter()
            .filter(|p| p["weather"]["status"] == "unknown")
            .all(|p| p["comfort"]["status"] == "unknown")
    );
    assert_eq!(body["conditions"]["unknown_points"].as_u64(), Some(unknown as u64));
}

#[tokio::test]
async fn test_total_weather_failure_is_bad_gateway() {
    let harness = harness(WeatherMode::Down, NarratorMode::Working, Duration::from_secs(30));
    let (status, body) = get(harness.app, REPORT_URI).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "WeatherProviderError");
    assert_eq!(harness.calls.narrative.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_daily_weather() {
    let Harness { app, calls } = working();
    let (status, body) = get(app, "/weather/daily?address=Sacramento%2C%20CA&days=3").await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["location"]["city"], "Sacramento");
    assert_eq!(body["days"].as_array().unwrap().len(), 3);
    assert_eq!(body["description"], "3 days of sunshine in Sacramento, California.");
    assert_eq!(calls.narrative.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_today_weather() {
    let (status, body) = get(working().app, "/weather/today?address=Sacramento%2C%20CA").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["days"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_daily_weather_rejects_bad_day_counts() {
    for days in ["0", "8", "many"] {
        let uri = format!("/weather/daily?address=Sacramento%2C%20CA&days={days}");
        let (status, body) = get(working().app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "days={days}");
        assert_eq!(body["error"]["kind"], "InputError");
    }
}

#[tokio::test]
async fn test_health_and_docs() {
    let (status, body) = get(working().app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(working().app, "/docs/api.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/route-report"].is_object());
}

#[test]
fn test_missing_llm_key_fails_startup() {
    let mut config = CommuteSenseConfig::default();
    config.geocoding.api_key = Some("pk.test_geocoding_key".to_string());
    config.routing.api_key = Some("test_routing_key_123".to_string());

    let error = Providers::from_config(&config, None)
        .err()
        .expect("startup must fail without an LLM key");
    assert_eq!(error.kind(), "ConfigurationError");
}
