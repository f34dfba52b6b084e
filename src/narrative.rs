//! Natural-language summaries from a language model
//!
//! Prompts only ever contain our own structured summaries, never raw
//! provider payloads.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::llm::ChatClient;
use crate::models::{Comfort, DailyWeather, Place, RouteAssessment};
use crate::Result;

/// Writes narratives for reports
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// A few sentences on driving comfort along the route
    async fn route_narrative(&self, assessment: &RouteAssessment) -> Result<String>;

    /// A weatherman-style forecast for one place over several days
    async fn daily_narrative(&self, place: &Place, days: &[DailyWeather]) -> Result<String>;
}

/// [`NarrativeGenerator`] backed by a chat-completions model
pub struct LlmNarrator {
    chat: ChatClient,
}

impl LlmNarrator {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl NarrativeGenerator for LlmNarrator {
    #[instrument(name = "route_narrative", skip_all)]
    async fn route_narrative(&self, assessment: &RouteAssessment) -> Result<String> {
        let narrative = self.chat.complete(&route_prompt(assessment)).await?;
        info!(chars = narrative.len(), "Route narrative generated");
        Ok(narrative)
    }

    #[instrument(name = "daily_narrative", skip_all, fields(location = %place.label()))]
    async fn daily_narrative(&self, place: &Place, days: &[DailyWeather]) -> Result<String> {
        let narrative = self.chat.complete(&daily_prompt(place, days)).await?;
        info!(chars = narrative.len(), "Daily narrative generated");
        Ok(narrative)
    }
}

#[derive(Serialize)]
struct PointSummary<'a> {
    km: f64,
    minutes: f64,
    conditions: &'a str,
    apparent_temperature_c: Option<f64>,
    precipitation_mm: Option<f64>,
    wind_gusts_kmh: Option<f64>,
    visibility_m: Option<f64>,
    daytime: Option<bool>,
    comfort: Option<u8>,
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn comfort_text(comfort: Comfort) -> String {
    match comfort {
        Comfort::Scored(score) => format!("{} out of 100 ({})", score.value, score.rating),
        Comfort::Unknown => "unknown".to_string(),
    }
}

/// Prompt for the route narrative
#[must_use]
pub fn route_prompt(assessment: &RouteAssessment) -> String {
    let points: Vec<PointSummary<'_>> = assessment
        .points
        .iter()
        .map(|p| {
            let sample = p.weather.sample();
            PointSummary {
                km: one_decimal(p.point.distance_m / 1000.0),
                minutes: one_decimal(p.point.duration_s / 60.0),
                conditions: sample.map_or("unknown", |s| s.description.as_str()),
                apparent_temperature_c: sample.map(|s| s.apparent_temperature_c),
                precipitation_mm: sample.map(|s| s.precipitation_mm),
                wind_gusts_kmh: sample.map(|s| s.wind_gusts_kmh),
                visibility_m: sample.and_then(|s| s.visibility_m),
                daytime: sample.map(|s| s.is_day),
                comfort: p.comfort.score().map(|s| s.value),
            }
        })
        .collect();
    let weather = serde_json::to_string(&points).unwrap_or_default();

    format!(
        "Generate a human readable text description of the weather along a driving route. \
There should only be a few sentences to summarize the weather and it should be easily \
understood by the average user. Mention anything a driver should prepare for. \
Do not output JSON or structured data, only a natural language summary.\n\n\
Starting location is {origin} and ending location is {destination}. \
The drive is {km:.0} km and takes about {minutes:.0} minutes. \
Overall comfort score is {comfort}. Summary: {summary}.\n\
Units for temperature are celsius, wind speed is in kilometers per hour, \
visibility in meters, and precipitation in mm. Points are ordered from start to end; \
km and minutes are measured from the start.\n\
The weather data is: {weather}",
        origin = assessment.origin.label(),
        destination = assessment.destination.label(),
        km = assessment.total_distance_m / 1000.0,
        minutes = assessment.total_duration_s / 60.0,
        comfort = comfort_text(assessment.overall_comfort),
        summary = assessment.summary,
    )
}

/// Prompt for the daily forecast narrative
#[must_use]
pub fn daily_prompt(place: &Place, days: &[DailyWeather]) -> String {
    let weather = serde_json::to_string(days).unwrap_or_default();
    format!(
        "YOUR PERSONA:\n\
A clear, and concise expert weatherman on TV or radio who is adept at telling the user \
or audience what to expect for weather.\n\n\
TASK:\n\
Produce a human-readable narrative that summarizes the daily weather over a number of days, \
for a single location. Mention trends in temperature, precipitation, and wind. \
Highlight notable events (storms, heavy rain, unusual heat/cold). \
If only a single day is provided, the description should be for the current weather only. \
Do not repeat raw numbers unless they are important for context. \
Do not output JSON or structured data, only a natural language summary. \
Do not include new lines as part of the output. \
Do not add pleasantries like \"Good morning\". \
Do not convert units. Temps are in celsius, precipitation in millimeters, wind in km/h.\n\n\
LOCATION:\n{location}\n\n\
WEATHER DATA:\n{weather}\n",
        location = place.label(),
    )
}
