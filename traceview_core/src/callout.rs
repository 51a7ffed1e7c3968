//! Annotation presenter - lifecycle of waypoint callouts.

use std::collections::HashMap;
use std::time::Duration;

use traceview_env::{CalloutId, TracePoint};

use crate::waypoints::{Waypoint, WaypointHit};

/// Delay before a transient callout starts its dismissal transition.
pub const CALLOUT_LINGER: Duration = Duration::from_millis(1500);

/// Further delay before a dismissing callout is removed from the render tree.
pub const CALLOUT_FADE: Duration = Duration::from_millis(800);

/// Lifecycle phase of a rendered callout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutPhase {
    /// Fully visible.
    Visible,
    /// Dismissal transition in progress.
    Dismissing,
}

/// Whether a callout auto-dismisses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutKind {
    /// Proximity-triggered; dismissal timers start on show.
    Transient,
    /// Click-triggered from a permanent waypoint marker; stays until
    /// explicitly closed, reopenable any number of times.
    Persistent,
}

/// A callout currently in the render tree.
#[derive(Debug, Clone)]
pub struct Callout {
    pub id: CalloutId,
    pub anchor: TracePoint,
    pub body: String,
    pub kind: CalloutKind,
    pub phase: CalloutPhase,
}

/// Tracks every open callout and formats their bodies.
///
/// The presenter owns lifecycle *state*; the engine owns lifecycle *timing*
/// (it schedules the linger/fade waits through the playback context so the
/// simulation harness controls the clock).
#[derive(Debug, Default)]
pub struct CalloutPresenter {
    open: HashMap<CalloutId, Callout>,
}

impl CalloutPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body text: 1-based index, coordinates at 4 decimal places, then the
    /// description when one exists.
    pub fn format_body(index: usize, pos: TracePoint, description: Option<&str>) -> String {
        match description {
            Some(desc) => format!("Waypoint {index}\n{:.4}, {:.4}\n{desc}", pos.lat, pos.lon),
            None => format!("Waypoint {index}\n{:.4}, {:.4}", pos.lat, pos.lon),
        }
    }

    /// Opens a transient callout for a proximity hit.
    pub fn open_transient(&mut self, hit: &WaypointHit) -> Callout {
        let callout = Callout {
            id: CalloutId::new(),
            anchor: hit.position,
            body: Self::format_body(hit.index, hit.position, hit.description.as_deref()),
            kind: CalloutKind::Transient,
            phase: CalloutPhase::Visible,
        };
        self.open.insert(callout.id, callout.clone());
        callout
    }

    /// Opens a persistent callout for a clicked waypoint marker.
    pub fn open_persistent(&mut self, index: usize, waypoint: &Waypoint) -> Callout {
        let callout = Callout {
            id: CalloutId::new(),
            anchor: waypoint.position,
            body: Self::format_body(index, waypoint.position, waypoint.description.as_deref()),
            kind: CalloutKind::Persistent,
            phase: CalloutPhase::Visible,
        };
        self.open.insert(callout.id, callout.clone());
        callout
    }

    /// Marks a callout as dismissing. False if it is already gone.
    pub fn begin_dismiss(&mut self, id: CalloutId) -> bool {
        match self.open.get_mut(&id) {
            Some(c) => {
                c.phase = CalloutPhase::Dismissing;
                true
            }
            None => false,
        }
    }

    /// Drops a callout. False if it was already removed.
    pub fn remove(&mut self, id: CalloutId) -> bool {
        self.open.remove(&id).is_some()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn get(&self, id: CalloutId) -> Option<&Callout> {
        self.open.get(&id)
    }
}
