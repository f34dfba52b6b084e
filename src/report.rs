//! Report assembly
//!
//! Pure functions: the same route and samples always give the same
//! assessment. No I/O happens here.

use chrono::{DateTime, Utc};

use crate::comfort::{self, ComfortInputs};
use crate::models::{
    Comfort, Place, ReportPoint, RouteAssessment, RouteConditions, RoutePoint, RouteReport,
    SampledPoint,
};

/// Aggregate conditions over the observed samples, `None` when nothing was observed
#[must_use]
pub fn aggregate(samples: &[SampledPoint]) -> Option<RouteConditions> {
    let observed: Vec<_> = samples.iter().filter_map(|s| s.weather.sample()).collect();
    if observed.is_empty() {
        return None;
    }

    let count = observed.len() as f64;
    Some(RouteConditions {
        max_precipitation_mm: observed.iter().map(|s| s.precipitation_mm).fold(0.0, f64::max),
        mean_apparent_temperature_c: observed.iter().map(|s| s.apparent_temperature_c).sum::<f64>()
            / count,
        max_wind_gusts_kmh: observed.iter().map(|s| s.wind_gusts_kmh).fold(0.0, f64::max),
        min_visibility_m: observed
            .iter()
            .filter_map(|s| s.visibility_m)
            .reduce(f64::min),
        all_daytime: observed.iter().all(|s| s.is_day),
        observed_points: observed.len(),
        unknown_points: samples.len() - observed.len(),
    })
}

/// Rule-based one-sentence description of the drive
#[must_use]
pub fn summarize(overall: Comfort, conditions: Option<&RouteConditions>) -> String {
    let (Comfort::Scored(score), Some(conditions)) = (overall, conditions) else {
        return "Weather is unavailable along this route".to_string();
    };

    let mut parts = Vec::new();
    if conditions.max_precipitation_mm > 0.0 {
        parts.push("some precipitation");
    }
    parts.push(if comfort::temperature_score(conditions.mean_apparent_temperature_c) >= 50.0 {
        "mild temperatures"
    } else {
        "uncomfortable temperatures"
    });
    parts.push(if conditions.max_wind_gusts_kmh > 10.0 {
        "strong winds"
    } else {
        "light winds"
    });
    parts.push(match conditions.min_visibility_m {
        Some(v) if v < 5_000.0 => "low visibility",
        _ => "good visibility",
    });

    let daylight = if conditions.all_daytime {
        "all daytime driving"
    } else {
        "some nighttime driving"
    };

    format!(
        "{} weather with {}, and {daylight}",
        score.rating.label(),
        parts.join(", ")
    )
}

/// Build the report skeleton from a route and its weather samples
#[must_use]
pub fn assemble(
    origin: Place,
    destination: Place,
    departure: DateTime<Utc>,
    route: &[RoutePoint],
    samples: &[SampledPoint],
) -> RouteAssessment {
    let (total_distance_m, total_duration_s) = route
        .last()
        .map_or((0.0, 0.0), |last| (last.distance_m, last.duration_s));

    let points = samples
        .iter()
        .map(|sampled| ReportPoint {
            point: sampled.point,
            weather: sampled.weather.clone(),
            comfort: sampled.weather.sample().map_or(Comfort::Unknown, |sample| {
                Comfort::Scored(comfort::score(&ComfortInputs::from(sample)))
            }),
        })
        .collect();

    let conditions = aggregate(samples);
    let overall_comfort = conditions.as_ref().map_or(Comfort::Unknown, |c| {
        Comfort::Scored(comfort::score(&ComfortInputs::from(c)))
    });
    let summary = summarize(overall_comfort, conditions.as_ref());

    RouteAssessment {
        origin,
        destination,
        departure_time: departure,
        total_distance_m,
        total_duration_s,
        overall_comfort,
        conditions,
        summary,
        points,
    }
}

/// Attach the narrative to a finished assessment
#[must_use]
pub fn finalize(assessment: RouteAssessment, narrative: String) -> RouteReport {
    RouteReport {
        assessment,
        narrative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ComfortRating, Coordinate, Projection, WeatherObservation, WeatherSample,
    };

    fn place(name: &str, lat: f64, lon: f64) -> Place {
        Place {
            coordinate: Coordinate::new(lat, lon).unwrap(),
            display_name: name.to_string(),
            city: Some(name.to_string()),
            state: Some("California".to_string()),
        }
    }

    fn point(ordinal: usize, distance_m: f64) -> RoutePoint {
        RoutePoint {
            ordinal,
            coordinate: Coordinate::new(37.0 + ordinal as f64 * 0.1, -122.0).unwrap(),
            distance_m,
            duration_s: distance_m / 25.0,
        }
    }

    fn observed(point: RoutePoint, precipitation_mm: f64, is_day: bool) -> SampledPoint {
        SampledPoint {
            point,
            weather: WeatherObservation::Observed(WeatherSample {
                coordinate: point.coordinate,
                valid_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                projection: Projection::Arrival,
                temperature_c: Some(23.0),
                apparent_temperature_c: 22.0,
                precipitation_mm,
                precipitation_probability: Some(10.0),
                wind_speed_kmh: Some(4.0),
                wind_gusts_kmh: 6.0,
                visibility_m: Some(20_000.0),
                is_day,
                weather_code: Some(1),
                description: "Mainly clear".to_string(),
            }),
        }
    }

    fn unknown(point: RoutePoint) -> SampledPoint {
        SampledPoint {
            point,
            weather: WeatherObservation::Unknown {
                reason: "Open-Meteo answered HTTP 503".to_string(),
            },
        }
    }

    fn departure() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_assemble_totals_and_scores() {
        let route = vec![point(0, 0.0), point(1, 30_000.0), point(2, 60_000.0)];
        let samples = vec![
            observed(route[0], 0.0, true),
            unknown(route[1]),
            observed(route[2], 0.0, true),
        ];

        let assessment = assemble(
            place("Mountain View", 37.42, -122.08),
            place("San Francisco", 37.77, -122.42),
            departure(),
            &route,
            &samples,
        );

        assert_eq!(assessment.total_distance_m, 60_000.0);
        assert_eq!(assessment.total_duration_s, 2_400.0);
        assert_eq!(assessment.points.len(), 3);
        assert_eq!(assessment.points[1].comfort, Comfort::Unknown);
        assert!(matches!(assessment.points[0].comfort, Comfort::Scored(s) if s.value == 100));

        let conditions = assessment.conditions.as_ref().unwrap();
        assert_eq!(conditions.observed_points, 2);
        assert_eq!(conditions.unknown_points, 1);
        assert_eq!(
            assessment.summary,
            "Perfect weather with mild temperatures, light winds, good visibility, and all daytime driving"
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let route = vec![point(0, 0.0), point(1, 48_000.0)];
        let samples = vec![observed(route[0], 1.2, true), observed(route[1], 0.0, false)];
        let build = || {
            assemble(
                place("A", 37.0, -122.0),
                place("B", 37.1, -122.0),
                departure(),
                &route,
                &samples,
            )
        };
        assert_eq!(build(), build());

        let assessment = build();
        assert!(assessment.summary.contains("some precipitation"));
        assert!(assessment.summary.ends_with("some nighttime driving"));
        // 50*0.25 + 100*0.2 + 100*0.1 + 100*0.3 + 0 = 72.5
        assert_eq!(
            assessment.overall_comfort.score().map(|s| s.rating),
            Some(ComfortRating::Good)
        );
    }

    #[test]
    fn test_no_observations_means_unknown_comfort() {
        let route = vec![point(0, 0.0), point(1, 10_000.0)];
        let samples = vec![unknown(route[0]), unknown(route[1])];
        let assessment = assemble(
            place("A", 37.0, -122.0),
            place("B", 37.1, -122.0),
            departure(),
            &route,
            &samples,
        );

        assert_eq!(assessment.overall_comfort, Comfort::Unknown);
        assert!(assessment.conditions.is_none());
        assert!(assessment.points.iter().all(|p| p.comfort == Comfort::Unknown));
    }

    #[test]
    fn test_empty_route_has_zero_totals() {
        let assessment = assemble(
            place("A", 37.0, -122.0),
            place("A", 37.0, -122.0),
            departure(),
            &[],
            &[],
        );
        assert_eq!(assessment.total_distance_m, 0.0);
        assert_eq!(assessment.total_duration_s, 0.0);
    }

    #[test]
    fn test_report_flattens_assessment() {
        let route = vec![point(0, 0.0)];
        let samples = vec![observed(route[0], 0.0, true)];
        let assessment = assemble(
            place("A", 37.0, -122.0),
            place("B", 37.1, -122.0),
            departure(),
            &route,
            &samples,
        );
        let json = serde_json::to_value(finalize(assessment, "Smooth drive.".to_string())).unwrap();
        assert_eq!(json["narrative"], "Smooth drive.");
        assert_eq!(json["overall_comfort"]["status"], "scored");
        assert!(json["points"][0]["ordinal"].is_number());
    }
}
