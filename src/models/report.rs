//! Comfort scores and the reports returned to API clients

use super::location::Place;
use super::route::RoutePoint;
use super::weather::{DailyWeather, WeatherObservation};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse bucket for a comfort score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComfortRating {
    Perfect,
    Good,
    Fair,
    Poor,
}

impl ComfortRating {
    #[must_use]
    pub fn from_value(value: u8) -> Self {
        match value {
            80.. => ComfortRating::Perfect,
            50..=79 => ComfortRating::Good,
            20..=49 => ComfortRating::Fair,
            _ => ComfortRating::Poor,
        }
    }

    /// Capitalised name used at the start of summary sentences
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ComfortRating::Perfect => "Perfect",
            ComfortRating::Good => "Good",
            ComfortRating::Fair => "Fair",
            ComfortRating::Poor => "Poor",
        }
    }
}

impl fmt::Display for ComfortRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

/// Comfort score, 0 (miserable) to 100 (ideal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComfortScore {
    pub value: u8,
    pub rating: ComfortRating,
}

impl ComfortScore {
    /// Build a score, clamping to 100
    #[must_use]
    pub fn new(value: u8) -> Self {
        let value = value.min(100);
        Self {
            value,
            rating: ComfortRating::from_value(value),
        }
    }
}

/// Comfort at a point or over the whole route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comfort {
    Scored(ComfortScore),
    /// No weather was available to score
    Unknown,
}

impl Comfort {
    #[must_use]
    pub fn score(&self) -> Option<ComfortScore> {
        match self {
            Comfort::Scored(score) => Some(*score),
            Comfort::Unknown => None,
        }
    }
}

/// Aggregate conditions over every observed sample on the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteConditions {
    pub max_precipitation_mm: f64,
    pub mean_apparent_temperature_c: f64,
    pub max_wind_gusts_kmh: f64,
    /// Lowest reported visibility; absent when no sample reported one
    pub min_visibility_m: Option<f64>,
    /// Whether every observed sample falls in daylight
    pub all_daytime: bool,
    pub observed_points: usize,
    pub unknown_points: usize,
}

/// One sampled route point in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportPoint {
    #[serde(flatten)]
    pub point: RoutePoint,
    pub weather: WeatherObservation,
    pub comfort: Comfort,
}

/// Everything about the trip except the narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteAssessment {
    pub origin: Place,
    pub destination: Place,
    pub departure_time: DateTime<Utc>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub overall_comfort: Comfort,
    pub conditions: Option<RouteConditions>,
    /// Rule-based one-sentence summary
    pub summary: String,
    pub points: Vec<ReportPoint>,
}

/// Response body of `GET /route-report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteReport {
    #[serde(flatten)]
    pub assessment: RouteAssessment,
    /// Natural-language comfort summary written by the language model
    pub narrative: String,
}

/// Response body of the daily forecast endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyWeatherReport {
    pub location: Place,
    pub days: Vec<DailyWeather>,
    /// Forecast in the words of a television weatherman
    pub description: String,
}
