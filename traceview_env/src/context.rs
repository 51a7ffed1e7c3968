//! Core environment context trait for the playback engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for time and task scheduling.
///
/// This trait abstracts the clock and the scheduler so that the playback
/// engine can run in both production (tokio) and simulation (virtual clock)
/// environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `tokio::spawn`
/// - **Simulation**: `SimContext` - a manually advanced virtual clock
///
/// # Determinism
///
/// The engine schedules every tick through `sleep()`, so an implementation
/// that advances a virtual clock instead of waiting makes an entire playback
/// session reproducible and instantaneous in tests.
#[async_trait]
pub trait PlaybackContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used to timestamp callouts and periodic progress logs.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// The engine uses this for the tick loop and for callout dismissal
    /// timers; the name is a scheduling hint for tracing.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
