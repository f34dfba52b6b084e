//! Data models for `CommuteSense`
//!
//! This module contains the core domain models organized by concern:
//! - Location: coordinates, geocoded places and raw location input
//! - Route: points along a driving route
//! - Weather: per-point samples and daily forecasts
//! - Report: comfort scores and the response-facing reports

pub mod location;
pub mod report;
pub mod route;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{Coordinate, LocationInput, Place};
pub use report::{
    Comfort, ComfortRating, ComfortScore, DailyWeatherReport, ReportPoint, RouteAssessment,
    RouteConditions, RouteReport,
};
pub use route::RoutePoint;
pub use weather::{
    DailyWeather, Projection, SampledPoint, WeatherObservation, WeatherSample, describe_weather_code,
};
