//! Geocoding: free-text addresses to coordinates
//!
//! [`LocationIqGeocoder`] talks to the LocationIQ search API.
//! [`resolve_location`] is what the rest of the crate calls; it skips the
//! provider entirely when the caller already typed coordinates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::GeocodingConfig;
use crate::error::{UpstreamError, UpstreamFailure};
use crate::models::{Coordinate, LocationInput, Place};
use crate::{CommuteSenseError, Result, upstream};

const PROVIDER: &str = "LocationIQ";

/// Turns an address into a single best-match place
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Place>;
}

/// Resolve what the user typed into a place, geocoding only when needed
#[instrument(skip(geocoder))]
pub async fn resolve_location(geocoder: &dyn Geocoder, input: &LocationInput) -> Result<Place> {
    match input {
        LocationInput::Coordinates(coordinate) => {
            debug!("Using literal coordinates, skipping geocoder");
            Ok(Place::from_coordinate(*coordinate))
        }
        LocationInput::Address(address) => geocoder.geocode(address).await,
    }
}

/// LocationIQ search API client
pub struct LocationIqGeocoder {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<AddressDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressDetails {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
}

impl LocationIqGeocoder {
    pub fn new(config: &GeocodingConfig, max_retries: u32) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| CommuteSenseError::config("Missing geocoding API key"))?;
        let client = upstream::build_client(
            Duration::from_secs(u64::from(config.timeout_seconds)),
            max_retries,
        )
        .map_err(|e| CommuteSenseError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn search_url(&self, address: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/v1/search", self.base_url),
            &[
                ("q", address),
                ("key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", "1"),
                ("normalizeaddress", "1"),
                ("addressdetails", "1"),
            ],
        )
        .map_err(|e| CommuteSenseError::config(format!("Invalid geocoding base URL: {e}")))
    }
}

fn not_found(address: &str) -> CommuteSenseError {
    CommuteSenseError::Geocoding(UpstreamError::new(
        UpstreamFailure::NotFound,
        format!("Address not found: {address}"),
    ))
}

fn into_place(result: SearchResult) -> std::result::Result<Place, UpstreamError> {
    let invalid = |what: &str| {
        UpstreamError::new(
            UpstreamFailure::InvalidResponse,
            format!("{PROVIDER} returned {what}"),
        )
    };

    let latitude: f64 = result.lat.trim().parse().map_err(|_| invalid("a non-numeric latitude"))?;
    let longitude: f64 = result.lon.trim().parse().map_err(|_| invalid("a non-numeric longitude"))?;
    let coordinate =
        Coordinate::new(latitude, longitude).map_err(|_| invalid("an out-of-range coordinate"))?;

    let address = result.address.unwrap_or_default();
    Ok(Place {
        coordinate,
        display_name: result.display_name,
        city: address.city.or(address.town).or(address.village),
        state: address.state,
    })
}

#[async_trait]
impl Geocoder for LocationIqGeocoder {
    #[instrument(name = "geocode", skip(self))]
    async fn geocode(&self, address: &str) -> Result<Place> {
        let url = self.search_url(address)?;
        debug!(provider = PROVIDER, "Geocoding address");

        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");

        let response = match upstream::send(PROVIDER, request).await {
            Ok(response) => response,
            Err(e) if e.failure == UpstreamFailure::NotFound => return Err(not_found(address)),
            Err(e) => return Err(CommuteSenseError::Geocoding(e)),
        };

        let results: Vec<SearchResult> = upstream::read_json(PROVIDER, response)
            .await
            .map_err(CommuteSenseError::Geocoding)?;

        let best = results.into_iter().next().ok_or_else(|| not_found(address))?;
        let place = into_place(best).map_err(CommuteSenseError::Geocoding)?;

        debug!(
            "Found location: {} ({:.4}, {:.4})",
            place.display_name, place.coordinate.latitude, place.coordinate.longitude
        );
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(lat: &str, lon: &str) -> SearchResult {
        SearchResult {
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: "Googleplex, Mountain View, California, USA".to_string(),
            address: Some(AddressDetails {
                city: None,
                town: Some("Mountain View".to_string()),
                village: None,
                state: Some("California".to_string()),
            }),
        }
    }

    #[test]
    fn test_into_place() {
        let place = into_place(result("37.4220", "-122.0841")).unwrap();
        assert_eq!(place.coordinate.latitude, 37.4220);
        assert_eq!(place.label(), "Mountain View, California");
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let error = into_place(result("123.0", "-122.0841")).unwrap_err();
        assert_eq!(error.failure, UpstreamFailure::InvalidResponse);

        let error = into_place(result("north", "-122.0841")).unwrap_err();
        assert_eq!(error.failure, UpstreamFailure::InvalidResponse);
    }

    struct Unreachable;

    #[async_trait]
    impl Geocoder for Unreachable {
        async fn geocode(&self, _address: &str) -> Result<Place> {
            panic!("coordinates must not reach the geocoder");
        }
    }

    #[tokio::test]
    async fn test_literal_coordinates_skip_the_geocoder() {
        let input = LocationInput::parse("37.42,-122.08").unwrap();
        let place = resolve_location(&Unreachable, &input).await.unwrap();
        assert_eq!(place.coordinate.longitude, -122.08);
    }
}
