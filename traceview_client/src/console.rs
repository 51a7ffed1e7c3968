//! Console canvas - renders engine output as log lines.

use traceview_env::{BoundingBox, CalloutId, MapCanvas, TracePoint};
use tracing::{error, info};

/// Headless canvas for terminal sessions. Marker motion is logged at a
/// reduced rate so a 90ms tick does not flood the terminal.
pub struct ConsoleCanvas {
    /// Log every n-th marker move (callouts and state changes always log).
    log_every: u64,
    moves: std::sync::atomic::AtomicU64,
}

impl ConsoleCanvas {
    pub fn new(log_every: u64) -> Self {
        Self {
            log_every: log_every.max(1),
            moves: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Default for ConsoleCanvas {
    fn default() -> Self {
        // Roughly one line per second at the default tick delay.
        Self::new(11)
    }
}

impl MapCanvas for ConsoleCanvas {
    fn set_loading(&self, visible: bool) {
        if visible {
            info!("loading session data...");
        } else {
            info!("session ready");
        }
    }

    fn fit_bounds(&self, bounds: &BoundingBox) {
        info!(
            min_lat = ?bounds.min_lat,
            min_lon = ?bounds.min_lon,
            max_lat = ?bounds.max_lat,
            max_lon = ?bounds.max_lon,
            "world bounds"
        );
    }

    fn move_marker(&self, pos: TracePoint) {
        let n = self
            .moves
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if n % self.log_every == 0 {
            info!("marker at {pos}");
        }
    }

    fn set_trail(&self, _polyline: &[TracePoint]) {
        // Trail state is visible through the `status` command instead.
    }

    fn add_waypoint_marker(&self, index: usize, pos: TracePoint) {
        info!("waypoint {index} at {pos}");
    }

    fn show_callout(&self, id: CalloutId, _anchor: TracePoint, body: &str) {
        for line in body.lines() {
            info!("[{id}] {line}");
        }
    }

    fn begin_dismiss(&self, _id: CalloutId) {}

    fn remove_callout(&self, _id: CalloutId) {}

    fn show_error(&self, message: &str) {
        error!("{message}");
    }
}
