//! The route report pipeline
//!
//! geocode both ends (concurrently) -> route -> sample weather -> assemble
//! -> narrative. The whole run is bounded by the request timeout; when it
//! expires the in-flight provider calls are dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument};

use crate::cache::PersistentCache;
use crate::config::CommuteSenseConfig;
use crate::geocoding::{Geocoder, LocationIqGeocoder, resolve_location};
use crate::llm::ChatClient;
use crate::models::{LocationInput, RouteReport};
use crate::narrative::{LlmNarrator, NarrativeGenerator};
use crate::routing::{DirectionsProvider, OpenRouteServiceClient};
use crate::weather::{OpenMeteoClient, SamplingSettings, WeatherSampler};
use crate::{CommuteSenseError, Result, report};

/// The external collaborators, shared by every request
#[derive(Clone)]
pub struct Providers {
    pub geocoder: Arc<dyn Geocoder>,
    pub directions: Arc<dyn DirectionsProvider>,
    pub weather: Arc<WeatherSampler>,
    pub narrator: Arc<dyn NarrativeGenerator>,
}

impl Providers {
    /// Build the real provider clients; fails when a credential is missing
    pub fn from_config(config: &CommuteSenseConfig, cache: Option<PersistentCache>) -> Result<Self> {
        config.validate_api_keys()?;
        let retries = config.pipeline.max_retries;

        let weather_source = Arc::new(OpenMeteoClient::new(&config.weather, retries)?);
        Ok(Self {
            geocoder: Arc::new(LocationIqGeocoder::new(&config.geocoding, retries)?),
            directions: Arc::new(OpenRouteServiceClient::new(&config.routing, retries)?),
            weather: Arc::new(WeatherSampler::new(
                weather_source,
                cache,
                SamplingSettings::from_config(config),
            )),
            narrator: Arc::new(LlmNarrator::new(ChatClient::new(&config.llm, retries)?)),
        })
    }
}

/// Run `future` under `limit`, mapping expiry to a timeout error
pub(crate) async fn with_deadline<T>(
    limit: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(CommuteSenseError::Timeout {
            seconds: limit.as_secs().max(1),
        }),
    }
}

pub struct RoutePipeline {
    providers: Providers,
    request_timeout: Duration,
}

impl RoutePipeline {
    pub fn new(providers: Providers, request_timeout: Duration) -> Self {
        Self {
            providers,
            request_timeout,
        }
    }

    pub fn from_config(config: &CommuteSenseConfig, cache: Option<PersistentCache>) -> Result<Self> {
        Ok(Self::new(
            Providers::from_config(config, cache)?,
            Duration::from_secs(u64::from(config.pipeline.request_timeout_seconds)),
        ))
    }

    /// Produce a full route report for two user-supplied locations
    #[instrument(skip(self))]
    pub async fn run(&self, origin: &str, destination: &str) -> Result<RouteReport> {
        let origin = LocationInput::parse(origin)?;
        let destination = LocationInput::parse(destination)?;

        with_deadline(self.request_timeout, self.execute(origin, destination)).await
    }

    async fn execute(&self, origin: LocationInput, destination: LocationInput) -> Result<RouteReport> {
        let started = Instant::now();
        let departure = Utc::now();
        let Providers {
            geocoder,
            directions,
            weather,
            narrator,
        } = &self.providers;

        let (origin, destination) = tokio::try_join!(
            resolve_location(geocoder.as_ref(), &origin),
            resolve_location(geocoder.as_ref(), &destination),
        )?;
        info!(
            origin = %origin.label(),
            destination = %destination.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Locations resolved"
        );

        let route = directions
            .route(origin.coordinate, destination.coordinate)
            .await?;

        let samples = weather.sample(&route, departure).await?;

        let assessment = report::assemble(origin, destination, departure, &route, &samples);
        let narrative = narrator.route_narrative(&assessment).await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            points = assessment.points.len(),
            "Route report ready"
        );
        Ok(report::finalize(assessment, narrative))
    }
}
