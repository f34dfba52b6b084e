//! Driving comfort scoring
//!
//! Each weather factor is scored 0-100 on its own and the results are
//! combined with fixed weights. The same function scores a single sample and
//! the aggregate conditions of a whole route.

use crate::models::{ComfortScore, RouteConditions, WeatherSample};

const PRECIPITATION_WEIGHT: f64 = 0.25;
const APPARENT_TEMPERATURE_WEIGHT: f64 = 0.20;
const WIND_WEIGHT: f64 = 0.10;
const VISIBILITY_WEIGHT: f64 = 0.30;
const DAYLIGHT_WEIGHT: f64 = 0.15;

/// Ideal feels-like band, inclusive
const IDEAL_TEMPERATURE_C: (f64, f64) = (20.0, 25.0);

/// The weather a score is computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortInputs {
    pub precipitation_mm: f64,
    pub apparent_temperature_c: f64,
    pub wind_gusts_kmh: f64,
    pub visibility_m: Option<f64>,
    pub is_day: bool,
}

impl From<&WeatherSample> for ComfortInputs {
    fn from(sample: &WeatherSample) -> Self {
        Self {
            precipitation_mm: sample.precipitation_mm,
            apparent_temperature_c: sample.apparent_temperature_c,
            wind_gusts_kmh: sample.wind_gusts_kmh,
            visibility_m: sample.visibility_m,
            is_day: sample.is_day,
        }
    }
}

impl From<&RouteConditions> for ComfortInputs {
    fn from(conditions: &RouteConditions) -> Self {
        Self {
            precipitation_mm: conditions.max_precipitation_mm,
            apparent_temperature_c: conditions.mean_apparent_temperature_c,
            wind_gusts_kmh: conditions.max_wind_gusts_kmh,
            visibility_m: conditions.min_visibility_m,
            is_day: conditions.all_daytime,
        }
    }
}

/// Precipitation in mm over an hour
#[must_use]
pub fn precipitation_score(mm: f64) -> f64 {
    if mm <= 0.0 {
        100.0
    } else if mm < 3.0 {
        50.0
    } else {
        0.0
    }
}

#[must_use]
pub fn temperature_score(apparent_c: f64) -> f64 {
    let (low, high) = IDEAL_TEMPERATURE_C;
    if (low..=high).contains(&apparent_c) {
        100.0
    } else if (apparent_c > 5.0 && apparent_c < low) || (apparent_c > high && apparent_c < 28.0) {
        50.0
    } else {
        0.0
    }
}

#[must_use]
pub fn wind_score(gusts_kmh: f64) -> f64 {
    if gusts_kmh < 10.0 {
        100.0
    } else if gusts_kmh < 20.0 {
        50.0
    } else {
        0.0
    }
}

/// Missing visibility counts as clear
#[must_use]
pub fn visibility_score(visibility_m: Option<f64>) -> f64 {
    match visibility_m {
        None => 100.0,
        Some(v) if v > 5_000.0 => 100.0,
        Some(v) if v > 3_000.0 => 80.0,
        Some(v) if v > 1_000.0 => 50.0,
        Some(v) if v > 500.0 => 20.0,
        Some(_) => 0.0,
    }
}

#[must_use]
pub fn daylight_score(is_day: bool) -> f64 {
    if is_day { 100.0 } else { 0.0 }
}

/// Weighted comfort score
#[must_use]
pub fn score(inputs: &ComfortInputs) -> ComfortScore {
    let total = precipitation_score(inputs.precipitation_mm) * PRECIPITATION_WEIGHT
        + temperature_score(inputs.apparent_temperature_c) * APPARENT_TEMPERATURE_WEIGHT
        + wind_score(inputs.wind_gusts_kmh) * WIND_WEIGHT
        + visibility_score(inputs.visibility_m) * VISIBILITY_WEIGHT
        + daylight_score(inputs.is_day) * DAYLIGHT_WEIGHT;

    let value = if total.is_finite() {
        total.round().clamp(0.0, 100.0) as u8
    } else {
        0
    };
    ComfortScore::new(value)
}
