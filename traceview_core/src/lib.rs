//! Traceview Core - Trace Playback & Waypoint-Proximity Engine
//!
//! This library turns a sparse, server-resampled trajectory into continuous,
//! cancellable, remotely-controlled animation:
//! 1. **Interpolation**: fixed sub-step linear interpolation between trace points
//! 2. **Bounded Trail**: FIFO-evicting render history behind the marker
//! 3. **Proximity Latching**: each waypoint annotation fires at most once per session

pub mod callout;
pub mod engine;
pub mod playback;
pub mod trace_path;
pub mod trail;
pub mod waypoints;

// Re-export key types for convenience
pub use callout::{Callout, CalloutPresenter};
pub use engine::{EngineConfig, EngineError, ReplayEngine, SessionOptions};
pub use playback::{PlaybackController, PlaybackPhase, StepOutcome};
pub use trace_path::{interpolate, TracePath};
pub use trail::Trail;
pub use waypoints::{VisitState, Waypoint, WaypointField, WaypointHit};
