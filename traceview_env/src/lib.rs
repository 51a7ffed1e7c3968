//! Traceview Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Traceview
//! playback engine to run in both **Production** (tokio + HTTP) and
//! **Simulation** (virtual clock + scripted remote) environments.
//!
//! # Core Concept
//!
//! The playback engine never touches a socket or a system clock directly.
//! All I/O goes through three seams:
//! - Time (`now()`, `sleep()`, `spawn()`) — [`PlaybackContext`]
//! - The remote trace/control service — [`ControlPlane`]
//! - The map surface the engine renders onto — [`MapCanvas`]
//!
//! Production wires these to tokio, reqwest and a real map surface; the
//! simulation harness wires them to a virtual clock, a scripted control
//! plane and a recording canvas, making every playback run reproducible.
//!
//! # Example
//!
//! ```ignore
//! use traceview_env::{PlaybackContext, ControlPlane};
//!
//! async fn tick_loop<Ctx: PlaybackContext, Api: ControlPlane>(
//!     ctx: &Ctx,
//!     api: &Api,
//! ) {
//!     loop {
//!         let status = api.status().await;
//!         // advance one step, then:
//!         ctx.sleep(Duration::from_millis(90)).await;
//!     }
//! }
//! ```

mod canvas;
mod context;
mod error;
mod remote;
mod tokio_impl;
mod types;

pub use canvas::MapCanvas;
pub use context::PlaybackContext;
pub use error::ApiError;
pub use remote::ControlPlane;
pub use tokio_impl::TokioContext;
pub use types::{BoundingBox, CalloutId, PlaybackStatus, StartLocation, TracePoint, WaypointRecord};
