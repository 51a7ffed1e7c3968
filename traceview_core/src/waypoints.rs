//! Waypoint proximity detection with per-session visit latching.

use serde::{Deserialize, Serialize};
use traceview_env::{TracePoint, WaypointRecord};

/// One-way visit latch for a waypoint.
///
/// `Unvisited -> Visited` only. Playback resets do NOT re-arm a waypoint;
/// only a full session reload produces fresh `Unvisited` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitState {
    Unvisited,
    Visited,
}

/// A waypoint annotation with its local visit latch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: TracePoint,
    pub description: Option<String>,
    pub state: VisitState,
}

impl From<WaypointRecord> for Waypoint {
    fn from(rec: WaypointRecord) -> Self {
        Self {
            position: TracePoint::new(rec.lat, rec.lon),
            description: rec.description,
            state: VisitState::Unvisited,
        }
    }
}

/// Event raised when the animated marker first comes within threshold of a
/// waypoint. `index` is 1-based in the original load order.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointHit {
    pub index: usize,
    pub position: TracePoint,
    pub description: Option<String>,
}

/// The fixed set of waypoints for a session, evaluated against every
/// animated position.
#[derive(Debug, Clone)]
pub struct WaypointField {
    waypoints: Vec<Waypoint>,
    threshold: f64,
}

impl WaypointField {
    pub fn new(records: Vec<WaypointRecord>, threshold: f64) -> Self {
        Self {
            waypoints: records.into_iter().map(Waypoint::from).collect(),
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Waypoint by 1-based index.
    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        index.checked_sub(1).and_then(|i| self.waypoints.get(i))
    }

    /// Evaluates `pos` against every unvisited waypoint, latching and
    /// reporting each one within the threshold.
    ///
    /// Iteration is load order; several waypoints inside the threshold in
    /// the same step all fire in that step, independently. A visited
    /// waypoint never fires again, no matter how often the marker re-enters
    /// its radius.
    pub fn check(&mut self, pos: TracePoint) -> Vec<WaypointHit> {
        let mut hits = Vec::new();
        for (i, wp) in self.waypoints.iter_mut().enumerate() {
            if wp.state == VisitState::Visited {
                continue;
            }
            if pos.coord_dist(&wp.position) < self.threshold {
                wp.state = VisitState::Visited;
                hits.push(WaypointHit {
                    index: i + 1,
                    position: wp.position,
                    description: wp.description.clone(),
                });
            }
        }
        hits
    }

    /// Waypoints far enough from the start position to deserve a permanent
    /// low-opacity marker, as `(1-based index, waypoint)` pairs.
    ///
    /// Waypoints within `min_dist` of the start are skipped so the start
    /// marker is not visually buried.
    pub fn distant_from(&self, start: TracePoint, min_dist: f64) -> Vec<(usize, &Waypoint)> {
        self.waypoints
            .iter()
            .enumerate()
            .filter(|(_, wp)| wp.position.coord_dist(&start) >= min_dist)
            .map(|(i, wp)| (i + 1, wp))
            .collect()
    }
}
