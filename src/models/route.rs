use super::location::Coordinate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A position along the driving path, with cumulative totals from the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoutePoint {
    pub ordinal: usize,
    pub coordinate: Coordinate,
    /// Meters driven from the origin
    pub distance_m: f64,
    /// Seconds driven from the origin
    pub duration_s: f64,
}
