//! Open-Meteo forecast API client

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{WeatherSource, nearest_hour_start};
use crate::config::WeatherConfig;
use crate::error::{UpstreamError, UpstreamFailure};
use crate::models::{Coordinate, DailyWeather, Projection, WeatherSample, describe_weather_code};
use crate::{CommuteSenseError, Result, upstream};

const PROVIDER: &str = "Open-Meteo";

const HOURLY_VARIABLES: &str = "temperature_2m,apparent_temperature,precipitation,precipitation_probability,weather_code,wind_speed_10m,wind_gusts_10m,visibility,is_day";

const DAILY_VARIABLES: &str = "weather_code,temperature_2m_max,temperature_2m_min,apparent_temperature_max,apparent_temperature_min,sunrise,sunset,precipitation_sum,wind_speed_10m_max";

/// Open-Meteo serves at most 16 days of hourly data
const MAX_FORECAST_HOURS: i64 = 384;

pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    time: Vec<i64>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    is_day: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailySeries,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<i64>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_max: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_min: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<Option<i64>>,
    #[serde(default)]
    sunset: Vec<Option<i64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

fn value_at<T: Copy>(series: &[Option<T>], index: usize) -> Option<T> {
    series.get(index).copied().flatten()
}

fn invalid(message: impl Into<String>) -> CommuteSenseError {
    CommuteSenseError::WeatherProvider(UpstreamError::new(
        UpstreamFailure::InvalidResponse,
        message,
    ))
}

fn required<T: Copy>(series: &[Option<T>], index: usize, name: &str) -> Result<T> {
    value_at(series, index).ok_or_else(|| invalid(format!("{PROVIDER} omitted {name}")))
}

fn weather_code(raw: Option<f64>) -> Option<u8> {
    raw.filter(|c| (0.0..=99.0).contains(c)).map(|c| c as u8)
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig, max_retries: u32) -> Result<Self> {
        let client = upstream::build_client(
            Duration::from_secs(u64::from(config.timeout_seconds)),
            max_retries,
        )
        .map_err(|e| CommuteSenseError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn forecast_url(&self, coordinate: Coordinate, extra: &[(&str, String)]) -> Result<Url> {
        let mut params = vec![
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("timezone", "UTC".to_string()),
            ("timeformat", "unixtime".to_string()),
        ];
        params.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        Url::parse_with_params(&format!("{}/v1/forecast", self.base_url), &params)
            .map_err(|e| CommuteSenseError::config(format!("Invalid weather base URL: {e}")))
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(provider = PROVIDER, %url, "Requesting forecast");
        let response = upstream::send(PROVIDER, self.client.get(url))
            .await
            .map_err(CommuteSenseError::WeatherProvider)?;
        upstream::read_json(PROVIDER, response)
            .await
            .map_err(CommuteSenseError::WeatherProvider)
    }
}

/// Index of the hourly entry closest to `target`
fn nearest_hour(times: &[i64], target: i64) -> Option<usize> {
    times
        .iter()
        .enumerate()
        .min_by_key(|(_, t)| (**t - target).abs())
        .map(|(index, _)| index)
}

/// Hours to request so the series, which starts at the top of the current
/// hour, includes the hour nearest `at` plus one of margin
fn forecast_hours(now: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let current_hour = now.timestamp().div_euclid(3600) * 3600;
    let target_hour = nearest_hour_start(at).timestamp();
    ((target_hour - current_hour) / 3600 + 2).clamp(1, MAX_FORECAST_HOURS)
}

fn sample_from_series(
    series: &HourlySeries,
    coordinate: Coordinate,
    at: DateTime<Utc>,
) -> Result<WeatherSample> {
    let index = nearest_hour(&series.time, at.timestamp())
        .ok_or_else(|| invalid(format!("{PROVIDER} returned no hourly data")))?;
    let valid_at = DateTime::from_timestamp(series.time[index], 0)
        .ok_or_else(|| invalid(format!("{PROVIDER} returned an invalid timestamp")))?;

    let code = weather_code(value_at(&series.weather_code, index));
    Ok(WeatherSample {
        coordinate,
        valid_at,
        projection: Projection::Arrival,
        temperature_c: value_at(&series.temperature_2m, index),
        apparent_temperature_c: required(&series.apparent_temperature, index, "apparent_temperature")?,
        precipitation_mm: required(&series.precipitation, index, "precipitation")?,
        precipitation_probability: value_at(&series.precipitation_probability, index),
        wind_speed_kmh: value_at(&series.wind_speed_10m, index),
        wind_gusts_kmh: required(&series.wind_gusts_10m, index, "wind_gusts_10m")?,
        visibility_m: value_at(&series.visibility, index),
        is_day: required(&series.is_day, index, "is_day")? >= 0.5,
        weather_code: code,
        description: code.map_or("Unknown conditions", describe_weather_code).to_string(),
    })
}

fn days_from_series(series: &DailySeries, coordinate: Coordinate) -> Result<Vec<DailyWeather>> {
    let timestamp = |t: i64| DateTime::from_timestamp(t, 0);

    series
        .time
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let date = timestamp(t)
                .ok_or_else(|| invalid(format!("{PROVIDER} returned an invalid date")))?
                .date_naive();
            let code = weather_code(value_at(&series.weather_code, i));
            Ok(DailyWeather {
                date,
                coordinate,
                description: code.map_or("Unknown conditions", describe_weather_code).to_string(),
                temperature_max_c: required(&series.temperature_2m_max, i, "temperature_2m_max")?,
                temperature_min_c: required(&series.temperature_2m_min, i, "temperature_2m_min")?,
                apparent_temperature_max_c: required(
                    &series.apparent_temperature_max,
                    i,
                    "apparent_temperature_max",
                )?,
                apparent_temperature_min_c: required(
                    &series.apparent_temperature_min,
                    i,
                    "apparent_temperature_min",
                )?,
                sunrise: value_at(&series.sunrise, i).and_then(timestamp),
                sunset: value_at(&series.sunset, i).and_then(timestamp),
                precipitation_sum_mm: value_at(&series.precipitation_sum, i).unwrap_or(0.0),
                wind_speed_max_kmh: value_at(&series.wind_speed_10m_max, i).unwrap_or(0.0),
            })
        })
        .collect()
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    #[instrument(name = "hourly_forecast", skip(self))]
    async fn observe(&self, coordinate: Coordinate, at: DateTime<Utc>) -> Result<WeatherSample> {
        let hours = forecast_hours(Utc::now(), at);

        let url = self.forecast_url(
            coordinate,
            &[
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("forecast_hours", hours.to_string()),
            ],
        )?;
        let body: HourlyResponse = self.fetch(url).await?;
        sample_from_series(&body.hourly, coordinate, at)
    }

    #[instrument(name = "daily_forecast", skip(self))]
    async fn daily(&self, coordinate: Coordinate, days: u8) -> Result<Vec<DailyWeather>> {
        let url = self.forecast_url(
            coordinate,
            &[
                ("daily", DAILY_VARIABLES.to_string()),
                ("forecast_days", days.to_string()),
            ],
        )?;
        let body: DailyResponse = self.fetch(url).await?;
        let mut forecast = days_from_series(&body.daily, coordinate)?;
        forecast.truncate(usize::from(days));
        Ok(forecast)
    }
}
