//! Scripted control plane - a deterministic stand-in for the remote service.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use traceview_env::{
    ApiError, BoundingBox, ControlPlane, PlaybackStatus, StartLocation, TracePoint, WaypointRecord,
};

/// One scripted intervention, consumed by a single status poll.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// Overrides the pause authority, as if another client issued a command.
    SetPaused(bool),
    /// The poll fails at the transport level.
    Error(String),
}

/// Static world data plus the scripted intervention plan.
#[derive(Debug, Clone, Default)]
pub struct ControlScript {
    /// Readiness probes that fail before the first success.
    pub ready_failures: u32,
    /// Bounding-box responses served with null fields before the real one.
    pub bbox_pending: u32,
    pub start: Option<StartLocation>,
    pub trace: Vec<TracePoint>,
    pub waypoints: Vec<WaypointRecord>,
    /// Interventions, one per status poll; when drained the poll reflects
    /// the command-driven pause state.
    pub status_events: VecDeque<StatusEvent>,
}

/// In-memory control plane driven by a [`ControlScript`].
///
/// Commands mutate the pause authority exactly like the real service:
/// `play` clears it, `pause` and `reset` set it. Scripted status events can
/// override it mid-run to model an out-of-band operator.
pub struct ScriptedControl {
    script: Mutex<ControlScript>,
    paused: Mutex<bool>,
    ready_calls: AtomicU32,
    status_calls: AtomicU32,
    play_calls: AtomicU32,
    pause_calls: AtomicU32,
    reset_calls: AtomicU32,
}

impl ScriptedControl {
    pub fn new(script: ControlScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            paused: Mutex::new(true),
            ready_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            play_calls: AtomicU32::new(0),
            pause_calls: AtomicU32::new(0),
            reset_calls: AtomicU32::new(0),
        })
    }

    pub fn ready_calls(&self) -> u32 {
        self.ready_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn play_calls(&self) -> u32 {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn pause_calls(&self) -> u32 {
        self.pause_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> u32 {
        self.reset_calls.load(Ordering::SeqCst)
    }

    /// Remaining scripted interventions.
    pub fn pending_events(&self) -> usize {
        self.script.lock().unwrap().status_events.len()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }
}

#[async_trait]
impl ControlPlane for ScriptedControl {
    async fn ready(&self) -> Result<(), ApiError> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        let mut s = self.script.lock().unwrap();
        if s.ready_failures > 0 {
            s.ready_failures -= 1;
            return Err(ApiError::transport("connection refused"));
        }
        Ok(())
    }

    async fn bounding_box(&self) -> Result<BoundingBox, ApiError> {
        let mut s = self.script.lock().unwrap();
        if s.bbox_pending > 0 {
            s.bbox_pending -= 1;
            return Ok(BoundingBox {
                min_lat: None,
                min_lon: None,
                max_lat: None,
                max_lon: None,
            });
        }
        let (mut min_lat, mut min_lon) = (f64::INFINITY, f64::INFINITY);
        let (mut max_lat, mut max_lon) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &s.trace {
            min_lat = min_lat.min(p.lat);
            min_lon = min_lon.min(p.lon);
            max_lat = max_lat.max(p.lat);
            max_lon = max_lon.max(p.lon);
        }
        if s.trace.is_empty() {
            return Err(ApiError::Malformed("no trace loaded".into()));
        }
        Ok(BoundingBox {
            min_lat: Some(min_lat),
            min_lon: Some(min_lon),
            max_lat: Some(max_lat),
            max_lon: Some(max_lon),
        })
    }

    async fn start_location(&self, _drone_id: &str) -> Result<StartLocation, ApiError> {
        let s = self.script.lock().unwrap();
        match s.start {
            Some(loc) => Ok(loc),
            None => Err(ApiError::Malformed("unknown drone".into())),
        }
    }

    async fn resampled_trace(
        &self,
        _drone_id: &str,
        _interval: &str,
    ) -> Result<Vec<TracePoint>, ApiError> {
        Ok(self.script.lock().unwrap().trace.clone())
    }

    async fn waypoints(&self) -> Result<Vec<WaypointRecord>, ApiError> {
        Ok(self.script.lock().unwrap().waypoints.clone())
    }

    async fn status(&self) -> Result<PlaybackStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let event = self.script.lock().unwrap().status_events.pop_front();
        match event {
            Some(StatusEvent::SetPaused(paused)) => {
                *self.paused.lock().unwrap() = paused;
                Ok(PlaybackStatus { paused })
            }
            Some(StatusEvent::Error(msg)) => Err(ApiError::Transport(msg)),
            None => Ok(PlaybackStatus {
                paused: *self.paused.lock().unwrap(),
            }),
        }
    }

    async fn play(&self) -> Result<(), ApiError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        *self.paused.lock().unwrap() = false;
        Ok(())
    }

    async fn pause(&self) -> Result<(), ApiError> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        *self.paused.lock().unwrap() = true;
        Ok(())
    }

    async fn reset(&self) -> Result<(), ApiError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        *self.paused.lock().unwrap() = true;
        Ok(())
    }
}
