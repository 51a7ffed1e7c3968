//! Common wire types shared between the engine and its environment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One resampled, fixed-interval position along the recorded trajectory.
///
/// Distances between points are computed in raw coordinate space (plain
/// Euclidean over lat/lon), matching the proximity semantics of the map
/// frontend this engine drives. No geodesic correction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub lat: f64,
    pub lon: f64,
}

impl TracePoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Euclidean distance in coordinate space (not meters).
    pub fn coord_dist(&self, other: &TracePoint) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        (dlat * dlat + dlon * dlon).sqrt()
    }
}

impl std::fmt::Display for TracePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// A waypoint annotation as served by `GET /api/waypoints`.
///
/// The visit latch is added locally by the engine; it is not part of the
/// wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Map extent as served by `GET /api/bbox`.
///
/// The server answers before the world build completes, in which case the
/// fields are null. The engine retries until `min_lat` is populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lon: Option<f64>,
}

impl BoundingBox {
    /// True once the server has published a usable extent.
    pub fn is_ready(&self) -> bool {
        self.min_lat.is_some()
    }
}

/// Payload of `GET /api/start_location`.
///
/// Fields are optional because the server may answer with a partial record
/// for an unknown drone; the engine treats a missing coordinate as a
/// malformed start location and aborts map init for the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartLocation {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StartLocation {
    /// Returns the start point if both coordinates are present.
    pub fn into_point(self) -> Option<TracePoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(TracePoint::new(lat, lon)),
            _ => None,
        }
    }
}

/// Remote playback state, the single source of truth for whether motion
/// should continue. Served by `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub paused: bool,
}

/// Unique identifier for a callout rendered on the map canvas.
///
/// Uses UUID v4 so the canvas can address individual callouts for the
/// dismiss/remove transitions without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalloutId(pub Uuid);

impl CalloutId {
    /// Creates a new random CalloutId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CalloutId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CalloutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}
