//! Trail buffer - bounded render history behind the marker.

use std::collections::VecDeque;
use traceview_env::TracePoint;

/// Capacity-bounded, FIFO-evicting sequence of rendered positions.
///
/// Mutated only by the playback controller after each rendered step. The
/// entire contents are republished to the canvas as one polyline per append,
/// so the renderer always observes a consistent window of the most recent
/// positions.
#[derive(Debug, Clone)]
pub struct Trail {
    positions: VecDeque<TracePoint>,
    cap: usize,
}

impl Trail {
    /// Creates a trail seeded with the start position.
    pub fn new(cap: usize, seed: TracePoint) -> Self {
        let mut positions = VecDeque::with_capacity(cap.min(1024));
        positions.push_back(seed);
        Self { positions, cap }
    }

    /// Appends at the tail, evicting the head once the cap is exceeded.
    pub fn append(&mut self, pos: TracePoint) {
        self.positions.push_back(pos);
        if self.positions.len() > self.cap {
            self.positions.pop_front();
        }
    }

    /// Clears back to a single seed position.
    pub fn reset(&mut self, seed: TracePoint) {
        self.positions.clear();
        self.positions.push_back(seed);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The oldest surviving position.
    pub fn head(&self) -> Option<TracePoint> {
        self.positions.front().copied()
    }

    /// Snapshot of the full polyline, oldest first.
    pub fn snapshot(&self) -> Vec<TracePoint> {
        self.positions.iter().copied().collect()
    }
}
