//! Location models: coordinates, geocoded places and request input

use crate::{CommuteSenseError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Longest address we forward to the geocoder
pub const MAX_ADDRESS_LEN: usize = 512;

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinate {
    /// Latitude in decimal degrees, -90..=90
    pub latitude: f64,
    /// Longitude in decimal degrees, -180..=180
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CommuteSenseError::input(format!(
                "Latitude must be between -90 and 90, got: {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CommuteSenseError::input(format!(
                "Longitude must be between -180 and 180, got: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Cache key fragment, roughly a 1 km cell
    #[must_use]
    pub fn cache_key(&self) -> String {
        let (lat, lon) = self.rounded(2);
        format!("{lat:.2}:{lon:.2}")
    }

    /// Great-circle distance in meters
    #[must_use]
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let from = haversine::Location {
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let to = haversine::Location {
            latitude: other.latitude,
            longitude: other.longitude,
        };
        haversine::distance(from, to, haversine::Units::Kilometers) * 1000.0
    }
}

/// A resolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Place {
    pub coordinate: Coordinate,
    /// Full name as returned by the geocoder
    pub display_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Place {
    /// Place with no address details, named after its coordinates
    #[must_use]
    pub fn from_coordinate(coordinate: Coordinate) -> Self {
        Self {
            display_name: coordinate.format(),
            coordinate,
            city: None,
            state: None,
        }
    }

    /// Short "city, state" label, falling back to the display name
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(city), None) => city.clone(),
            _ => self.display_name.clone(),
        }
    }
}

/// What the caller typed for a location
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Already a coordinate, e.g. "37.42,-122.08"
    Coordinates(Coordinate),
    /// Free-text address for the geocoder
    Address(String),
}

impl LocationInput {
    /// Parse location input (coordinates or a free-text address)
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(CommuteSenseError::input("Location cannot be empty"));
        }
        if input.chars().count() > MAX_ADDRESS_LEN {
            return Err(CommuteSenseError::input(format!(
                "Location is longer than {MAX_ADDRESS_LEN} characters"
            )));
        }

        if let Some(coordinate) = Self::parse_coordinates(input) {
            return Ok(LocationInput::Coordinates(coordinate));
        }

        Ok(LocationInput::Address(input.to_string()))
    }

    /// Parse coordinates from string like "46.8182,8.2275" or "46.8182 8.2275"
    fn parse_coordinates(input: &str) -> Option<Coordinate> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return None;
        }

        let lat = parts[0].parse::<f64>().ok()?;
        let lon = parts[1].parse::<f64>().ok()?;
        Coordinate::new(lat, lon).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_ranges() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_cache_key() {
        let coordinate = Coordinate::new(46.818_234, 8.227_456).unwrap();
        assert_eq!(coordinate.cache_key(), "46.82:8.23");
    }

    #[test]
    fn test_distance() {
        let mountain_view = Coordinate::new(37.4220, -122.0841).unwrap();
        let cupertino = Coordinate::new(37.3318, -122.0312).unwrap();
        let meters = mountain_view.distance_m(&cupertino);
        assert!(meters > 10_000.0 && meters < 12_000.0, "got {meters}");
        assert_eq!(mountain_view.distance_m(&mountain_view), 0.0);
    }

    #[test]
    fn test_location_input_coordinates() {
        assert!(matches!(
            LocationInput::parse("46.8182,8.2275").unwrap(),
            LocationInput::Coordinates(c) if c.latitude == 46.8182 && c.longitude == 8.2275
        ));
        assert!(matches!(
            LocationInput::parse(" -46.8182, -8.2275 ").unwrap(),
            LocationInput::Coordinates(_)
        ));
    }

    #[test]
    fn test_location_input_addresses() {
        // out of range or malformed coordinates fall through to the geocoder
        assert!(matches!(
            LocationInput::parse("91.0,8.0").unwrap(),
            LocationInput::Address(_)
        ));
        assert!(matches!(
            LocationInput::parse("1 Infinite Loop, Cupertino, CA").unwrap(),
            LocationInput::Address(a) if a == "1 Infinite Loop, Cupertino, CA"
        ));
    }

    #[test]
    fn test_location_input_rejects_empty_and_huge() {
        assert!(matches!(
            LocationInput::parse("   "),
            Err(CommuteSenseError::Input { .. })
        ));
        let huge = "a".repeat(MAX_ADDRESS_LEN + 1);
        assert!(LocationInput::parse(&huge).is_err());
    }

    #[test]
    fn test_place_label() {
        let coordinate = Coordinate::new(37.33, -122.03).unwrap();
        let mut place = Place::from_coordinate(coordinate);
        assert_eq!(place.label(), "37.3300, -122.0300");

        place.city = Some("Cupertino".to_string());
        place.state = Some("California".to_string());
        assert_eq!(place.label(), "Cupertino, California");
    }
}
