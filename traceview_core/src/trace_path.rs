//! Trace path - the resampled trajectory and the segment interpolator.

use serde::{Deserialize, Serialize};
use traceview_env::TracePoint;

/// The resampled, time-ordered trajectory loaded once per session.
///
/// Consecutive points bound a *segment*; the interpolator subdivides each
/// segment into fixed sub-steps for smooth marker motion. A path with fewer
/// than two points has no segments and the marker stays static.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePath {
    points: Vec<TracePoint>,
}

impl TracePath {
    pub fn new(points: Vec<TracePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The first trace point, if any. Playback resets reposition here.
    pub fn first(&self) -> Option<TracePoint> {
        self.points.first().copied()
    }

    /// Number of segments (0 when fewer than two points).
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Endpoints of segment `index`, or None past the end.
    pub fn segment(&self, index: usize) -> Option<(TracePoint, TracePoint)> {
        if index + 1 < self.points.len() {
            Some((self.points[index], self.points[index + 1]))
        } else {
            None
        }
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }
}

/// Uniform linear interpolation between two endpoints.
///
/// Returns exactly `steps` positions, interpolated per-axis in lat/lon with
/// no great-circle correction, ordered from the position nearest `start`
/// (start itself excluded) up to and including `end`. `steps == 0` yields an
/// empty sequence.
///
/// Pure and infallible: NaN coordinates propagate as NaN positions rather
/// than being rejected.
pub fn interpolate(start: TracePoint, end: TracePoint, steps: usize) -> Vec<TracePoint> {
    let mut out = Vec::with_capacity(steps);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        out.push(TracePoint::new(
            start.lat + (end.lat - start.lat) * t,
            start.lon + (end.lon - start.lon) * t,
        ));
    }
    out
}
