//! Weather data model

use super::location::Coordinate;
use super::route::RoutePoint;
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which forecast hour a sample was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Forecast for the hour the driver is expected to reach the point
    Arrival,
}

/// Conditions at one point and hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeatherSample {
    pub coordinate: Coordinate,
    /// Hour the forecast applies to
    pub valid_at: DateTime<Utc>,
    pub projection: Projection,
    pub temperature_c: Option<f64>,
    /// Feels-like temperature in Celsius
    pub apparent_temperature_c: f64,
    /// Precipitation in mm over the hour
    pub precipitation_mm: f64,
    /// Probability of precipitation, percent
    pub precipitation_probability: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_gusts_kmh: f64,
    pub visibility_m: Option<f64>,
    pub is_day: bool,
    /// WMO weather interpretation code
    pub weather_code: Option<u8>,
    /// Human-readable description of weather conditions
    pub description: String,
}

/// Outcome of a weather lookup for one route point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherObservation {
    Observed(WeatherSample),
    Unknown { reason: String },
}

impl WeatherObservation {
    #[must_use]
    pub fn sample(&self) -> Option<&WeatherSample> {
        match self {
            WeatherObservation::Observed(sample) => Some(sample),
            WeatherObservation::Unknown { .. } => None,
        }
    }
}

/// A sampled route point with its weather
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampledPoint {
    pub point: RoutePoint,
    pub weather: WeatherObservation,
}

/// Forecast summary for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub coordinate: Coordinate,
    pub description: String,
    pub temperature_max_c: f64,
    pub temperature_min_c: f64,
    pub apparent_temperature_max_c: f64,
    pub apparent_temperature_min_c: f64,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub precipitation_sum_mm: f64,
    pub wind_speed_max_kmh: f64,
}

/// Describe a WMO weather interpretation code
#[must_use]
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snowfall",
        73 => "Moderate snowfall",
        75 => "Heavy snowfall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown conditions",
    }
}
