//! Remote control-plane abstraction for the playback engine.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{BoundingBox, PlaybackStatus, StartLocation, TracePoint, WaypointRecord};

/// Abstraction over the remote trace/status/command service.
///
/// # Implementations
///
/// - **Production**: HTTP client against the timeseries API
/// - **Simulation**: scripted responses with fault injection
///
/// # Contract
///
/// ```text
/// Engine                        Control Plane
///   |-- ready() --------------->|  GET /readyz
///   |-- bounding_box() -------->|  GET /api/bbox
///   |-- start_location(id) ---->|  GET /api/start_location
///   |-- resampled_trace(..) --->|  GET /api/resample
///   |-- waypoints() ----------->|  GET /api/waypoints
///   |-- status() -------------->|  GET /status        (every tick)
///   |-- play()/pause()/reset()->|  POST /api/...
/// ```
///
/// The command endpoints have no required response body; their effect is
/// observed indirectly through subsequent `status()` polls.
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    /// Liveness probe. `Ok(())` once the remote has finished startup.
    async fn ready(&self) -> Result<(), ApiError>;

    /// Fetches the map extent. May answer with null fields while the
    /// remote's world build is still in progress.
    async fn bounding_box(&self) -> Result<BoundingBox, ApiError>;

    /// Fetches the first recorded position for a drone.
    async fn start_location(&self, drone_id: &str) -> Result<StartLocation, ApiError>;

    /// Fetches the resampled, time-ordered trace for a drone.
    ///
    /// Implementations must defeat response caching so a fresh sequence is
    /// observed on every call (the remote re-ingests between sessions).
    async fn resampled_trace(
        &self,
        drone_id: &str,
        interval: &str,
    ) -> Result<Vec<TracePoint>, ApiError>;

    /// Fetches the waypoint annotations for the current flight plan.
    async fn waypoints(&self) -> Result<Vec<WaypointRecord>, ApiError>;

    /// Polls the remote playback state.
    ///
    /// The engine calls this before every animation step; a failure here is
    /// a liveness signal, not a transactional gate.
    async fn status(&self) -> Result<PlaybackStatus, ApiError>;

    /// Requests playback start.
    async fn play(&self) -> Result<(), ApiError>;

    /// Requests playback pause.
    async fn pause(&self) -> Result<(), ApiError>;

    /// Requests a playback reset.
    async fn reset(&self) -> Result<(), ApiError>;
}
