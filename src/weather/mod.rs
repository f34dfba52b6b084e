//! Weather along a route
//!
//! [`WeatherSampler`] picks a handful of route points, projects each to the
//! time the driver reaches it and looks up the forecast for that hour. Lookups
//! run with bounded concurrency and are memoised in the persistent cache.
//! A point whose lookup fails is reported as unknown; only when every point
//! fails does sampling fail as a whole.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::cache::{self, PersistentCache};
use crate::config::CommuteSenseConfig;
use crate::error::{UpstreamError, UpstreamFailure};
use crate::models::{Coordinate, DailyWeather, RoutePoint, SampledPoint, WeatherObservation, WeatherSample};
use crate::{CommuteSenseError, Result};

pub mod open_meteo;

pub use open_meteo::OpenMeteoClient;

/// A forecast provider
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Conditions at `coordinate` for the forecast hour nearest `at`
    async fn observe(&self, coordinate: Coordinate, at: DateTime<Utc>) -> Result<WeatherSample>;

    /// Day-by-day forecast starting today
    async fn daily(&self, coordinate: Coordinate, days: u8) -> Result<Vec<DailyWeather>>;
}

/// Sampling knobs, taken from the `weather` and `cache` config sections
#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub interval_m: f64,
    pub max_samples: usize,
    pub max_concurrency: usize,
    pub hourly_ttl: Duration,
    pub daily_ttl: Duration,
}

impl SamplingSettings {
    #[must_use]
    pub fn from_config(config: &CommuteSenseConfig) -> Self {
        Self {
            interval_m: config.weather.sample_interval_m,
            max_samples: config.weather.max_samples,
            max_concurrency: config.weather.max_concurrency,
            hourly_ttl: Duration::from_secs(u64::from(config.cache.weather_ttl_minutes) * 60),
            daily_ttl: Duration::from_secs(u64::from(config.cache.daily_ttl_hours) * 3600),
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self::from_config(&CommuteSenseConfig::default())
    }
}

pub struct WeatherSampler {
    source: Arc<dyn WeatherSource>,
    cache: Option<PersistentCache>,
    settings: SamplingSettings,
}

/// Pick the route points to look weather up for.
///
/// Always the first point, then every point at least `interval_m` further
/// along than the previous pick, then the last point. More than
/// `max_samples` picks are thinned evenly, keeping both ends.
#[must_use]
pub fn select_points(route: &[RoutePoint], interval_m: f64, max_samples: usize) -> Vec<RoutePoint> {
    let (Some(first), Some(last)) = (route.first(), route.last()) else {
        return Vec::new();
    };

    let mut picked = vec![*first];
    for point in &route[1..] {
        let previous = picked[picked.len() - 1];
        if point.distance_m - previous.distance_m >= interval_m {
            picked.push(*point);
        }
    }
    if route.len() > 1 && picked[picked.len() - 1].ordinal != last.ordinal {
        picked.push(*last);
    }

    let max_samples = max_samples.max(2);
    if picked.len() <= max_samples {
        return picked;
    }

    let span = picked.len() - 1;
    (0..max_samples)
        .map(|i| {
            let index = (i * span + (max_samples - 1) / 2) / (max_samples - 1);
            picked[index]
        })
        .collect()
}

/// Target hour for a point reached `duration_s` after departure
fn projected_time(departure: DateTime<Utc>, point: &RoutePoint) -> DateTime<Utc> {
    let offset = TimeDelta::try_milliseconds((point.duration_s * 1000.0) as i64).unwrap_or_default();
    departure + offset
}

/// Start of the forecast hour nearest `at`. Half past rounds down, matching
/// the first-minimum pick over an hourly series.
pub(crate) fn nearest_hour_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let hour = (at.timestamp() + 1799).div_euclid(3600) * 3600;
    DateTime::from_timestamp(hour, 0).unwrap_or(at)
}

fn hourly_key(coordinate: Coordinate, at: DateTime<Utc>) -> String {
    format!(
        "weather:{}:{}",
        coordinate.cache_key(),
        nearest_hour_start(at).timestamp()
    )
}

fn daily_key(coordinate: Coordinate, days: u8, today: DateTime<Utc>) -> String {
    format!(
        "daily:{}:{}:{}",
        coordinate.cache_key(),
        days,
        today.date_naive()
    )
}

fn as_upstream(error: &CommuteSenseError) -> UpstreamError {
    match error {
        CommuteSenseError::WeatherProvider(e) => e.clone(),
        other => UpstreamError::new(UpstreamFailure::Unavailable, other.to_string()),
    }
}

impl WeatherSampler {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        cache: Option<PersistentCache>,
        settings: SamplingSettings,
    ) -> Self {
        Self {
            source,
            cache,
            settings,
        }
    }

    /// Weather for the sampled points of `route`, in route order
    #[instrument(skip(self, route), fields(route_points = route.len()))]
    pub async fn sample(
        &self,
        route: &[RoutePoint],
        departure: DateTime<Utc>,
    ) -> Result<Vec<SampledPoint>> {
        let started = Instant::now();
        let points = select_points(route, self.settings.interval_m, self.settings.max_samples);
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<(RoutePoint, Result<WeatherSample>)> = futures::stream::iter(points)
            .map(|point| async move {
                let at = projected_time(departure, &point);
                (point, self.observe_cached(point.coordinate, at).await)
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut first_failure = None;
        let sampled: Vec<SampledPoint> = results
            .into_iter()
            .map(|(point, result)| {
                let weather = match result {
                    Ok(sample) => WeatherObservation::Observed(sample),
                    Err(e) => {
                        warn!(ordinal = point.ordinal, error = %e, "Weather unavailable for route point");
                        let reason = e.to_string();
                        first_failure.get_or_insert(e);
                        WeatherObservation::Unknown { reason }
                    }
                };
                SampledPoint { point, weather }
            })
            .collect();

        let observed = sampled.iter().filter(|s| s.weather.sample().is_some()).count();
        if observed == 0 {
            if let Some(error) = first_failure {
                return Err(CommuteSenseError::WeatherProvider(as_upstream(&error)));
            }
        }

        info!(
            samples = sampled.len(),
            observed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Weather sampled along route"
        );
        Ok(sampled)
    }

    /// Multi-day forecast for a single place
    #[instrument(skip(self))]
    pub async fn daily(&self, coordinate: Coordinate, days: u8) -> Result<Vec<DailyWeather>> {
        let key = daily_key(coordinate, days, Utc::now());
        if let Some(cached) = self.cache_get::<Vec<DailyWeather>>(&key).await {
            return Ok(cached);
        }

        let forecast = self.source.daily(coordinate, days).await?;
        self.cache_put(&key, forecast.clone(), self.settings.daily_ttl).await;
        Ok(forecast)
    }

    async fn observe_cached(&self, coordinate: Coordinate, at: DateTime<Utc>) -> Result<WeatherSample> {
        let key = hourly_key(coordinate, at);
        if let Some(mut cached) = self.cache_get::<WeatherSample>(&key).await {
            cached.coordinate = coordinate;
            return Ok(cached);
        }

        let sample = self.source.observe(coordinate, at).await?;
        self.cache_put(&key, sample.clone(), self.settings.hourly_ttl).await;
        Ok(sample)
    }

    async fn cache_get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let cache = self.cache.as_ref()?;
        match cache.get::<T>(key).await {
            Ok(hit) => {
                if hit.is_some() {
                    debug!(key, "Weather cache hit");
                }
                hit
            }
            Err(e) => {
                warn!(key, error = %e, "Weather cache read failed");
                None
            }
        }
    }

    async fn cache_put<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: serde::Serialize + Send + 'static,
    {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.put(key, value, cache::jittered(ttl)).await {
            warn!(key, error = %e, "Weather cache write failed");
        }
    }
}
