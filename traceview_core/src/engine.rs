//! Replay engine - orchestrates playback against the environment seams.
//!
//! This is the integration layer between the pure state machine
//! ([`PlaybackController`]) and the environment abstraction: the remote
//! control plane supplies the trace and the pause authority, the map canvas
//! receives render instructions, and the playback context supplies time and
//! task scheduling.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       ReplayEngine                        │
//! │  ┌────────────────────────────────────────────────────┐   │
//! │  │             Ctx: PlaybackContext                   │   │
//! │  │  • sleep() → tick pacing, probe backoff            │   │
//! │  │  • spawn() → tick loop, callout dismissal timers   │   │
//! │  └────────────────────────────────────────────────────┘   │
//! │                            │                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐   │
//! │  │ ControlPlane │  │  Controller  │  │   MapCanvas    │   │
//! │  │ (remote API) │  │ (state mach.)│  │ (render sink)  │   │
//! │  └──────────────┘  └──────────────┘  └────────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The tick loop is one cooperative task owning a generation token from
//! [`TickGate`]; pause and reset cancel by bumping the generation, and the
//! next play arms a fresh one, so a stale tick never mutates state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use traceview_env::{ApiError, CalloutId, ControlPlane, MapCanvas, PlaybackContext};

use crate::callout::{CalloutPresenter, CALLOUT_FADE, CALLOUT_LINGER};
use crate::playback::{PlaybackController, PlaybackPhase, StepOutcome};
use crate::trace_path::TracePath;
use crate::waypoints::{WaypointField, WaypointHit};

/// Engine tuning knobs. Defaults match the recorded deployment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum rendered trail length before FIFO eviction.
    pub trail_cap: usize,
    /// Coordinate-space distance below which a waypoint fires.
    pub proximity_threshold: f64,
    /// Waypoints closer than this to the start get no permanent marker.
    pub start_marker_min_dist: f64,
    /// Interpolated sub-steps per trace segment.
    pub substeps: usize,
    /// Delay between animation ticks.
    pub step_delay: Duration,
    /// Transient callout linger before dismissal starts.
    pub callout_linger: Duration,
    /// Dismissal transition length before removal.
    pub callout_fade: Duration,
    /// Readiness probe budget.
    pub ready_attempts: u32,
    pub ready_delay: Duration,
    /// Bounding-box probe budget.
    pub bbox_attempts: u32,
    pub bbox_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trail_cap: 1000,
            proximity_threshold: 0.00025,
            start_marker_min_dist: 0.00005,
            substeps: 25,
            step_delay: Duration::from_millis(90),
            callout_linger: CALLOUT_LINGER,
            callout_fade: CALLOUT_FADE,
            ready_attempts: 15,
            ready_delay: Duration::from_secs(1),
            bbox_attempts: 10,
            bbox_delay: Duration::from_secs(3),
        }
    }
}

/// Per-session identity of the trace being replayed.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub drone_id: String,
    /// Resample interval passed through to the remote, e.g. "1 second".
    pub interval: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            drone_id: "drone_1".to_string(),
            interval: "1 second".to_string(),
        }
    }
}

/// Terminal startup failures. Transient probe errors are retried inside the
/// attempt budget and never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Readiness budget exhausted; the engine never initializes.
    #[error("remote not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    /// Bounding-box budget exhausted; no map extent to fit.
    #[error("bounding box unavailable after {attempts} attempts")]
    BoundsUnavailable { attempts: u32 },

    /// Start location absent or missing coordinates; map playback init
    /// aborts without taking the host down.
    #[error("start location missing or malformed for drone {drone_id}")]
    StartLocationMissing { drone_id: String },
}

/// Generation-counter cancellation for the tick loop.
///
/// `arm()` hands out the current generation; `cancel()` invalidates it.
/// A tick task checks its token against the gate before every mutation, so
/// a loop superseded by pause/reset/replay unwinds without side effects.
#[derive(Debug, Default)]
pub struct TickGate {
    epoch: AtomicU64,
}

impl TickGate {
    /// Invalidates outstanding tokens and returns a fresh one.
    pub fn arm(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidates outstanding tokens.
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == token
    }
}

/// The playback engine: startup probing, command dispatch, tick loop.
///
/// Generic over the context, control plane and canvas implementations,
/// allowing the same engine code to run in production (tokio + HTTP) or
/// simulation (virtual clock + scripted remote).
pub struct ReplayEngine<Ctx, Api, Canvas>
where
    Ctx: PlaybackContext,
    Api: ControlPlane,
    Canvas: MapCanvas,
{
    ctx: Arc<Ctx>,
    api: Arc<Api>,
    canvas: Arc<Canvas>,
    controller: Arc<Mutex<PlaybackController>>,
    presenter: Arc<Mutex<CalloutPresenter>>,
    gate: Arc<TickGate>,
    config: EngineConfig,
}

impl<Ctx, Api, Canvas> Clone for ReplayEngine<Ctx, Api, Canvas>
where
    Ctx: PlaybackContext,
    Api: ControlPlane,
    Canvas: MapCanvas,
{
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            api: Arc::clone(&self.api),
            canvas: Arc::clone(&self.canvas),
            controller: Arc::clone(&self.controller),
            presenter: Arc::clone(&self.presenter),
            gate: Arc::clone(&self.gate),
            config: self.config.clone(),
        }
    }
}

impl<Ctx, Api, Canvas> ReplayEngine<Ctx, Api, Canvas>
where
    Ctx: PlaybackContext,
    Api: ControlPlane,
    Canvas: MapCanvas,
{
    /// Probes the remote, loads the session data and prepares the canvas.
    ///
    /// Probe order matches the remote's own dependency order: readiness,
    /// bounding box (retried until `min_lat` is populated), start location,
    /// trace, waypoints. Trace/waypoint failures after the canvas is
    /// interactive are logged and leave that feature empty; everything
    /// earlier is terminal.
    pub async fn start(
        ctx: Arc<Ctx>,
        api: Arc<Api>,
        canvas: Arc<Canvas>,
        session: SessionOptions,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        canvas.set_loading(true);

        if !Self::probe_ready(&ctx, &api, &config).await {
            canvas.set_loading(false);
            canvas.show_error("backend never became ready");
            return Err(EngineError::NotReady {
                attempts: config.ready_attempts,
            });
        }

        let Some(bounds) = Self::probe_bounds(&ctx, &api, &config).await else {
            canvas.set_loading(false);
            canvas.show_error("world bounds unavailable");
            return Err(EngineError::BoundsUnavailable {
                attempts: config.bbox_attempts,
            });
        };
        canvas.fit_bounds(&bounds);

        let start = match api.start_location(&session.drone_id).await {
            Ok(loc) => loc.into_point(),
            Err(e) => {
                warn!(error = %e, drone_id = %session.drone_id, "start location fetch failed");
                None
            }
        };
        let Some(start) = start else {
            canvas.set_loading(false);
            canvas.show_error("start location missing");
            return Err(EngineError::StartLocationMissing {
                drone_id: session.drone_id,
            });
        };

        let trace = match api.resampled_trace(&session.drone_id, &session.interval).await {
            Ok(points) => {
                info!(points = points.len(), "resampled trace loaded");
                points
            }
            Err(e) => {
                // Map is already interactive at this point: degrade to a
                // static marker instead of rolling back.
                warn!(error = %e, "trace load failed, marker stays at start");
                Vec::new()
            }
        };
        let path = if trace.is_empty() {
            TracePath::new(vec![start])
        } else {
            TracePath::new(trace)
        };

        let records = match api.waypoints().await {
            Ok(w) => {
                info!(waypoints = w.len(), "waypoints loaded");
                w
            }
            Err(e) => {
                warn!(error = %e, "waypoint load failed, continuing without annotations");
                Vec::new()
            }
        };
        let field = WaypointField::new(records, config.proximity_threshold);
        for (index, wp) in field.distant_from(start, config.start_marker_min_dist) {
            canvas.add_waypoint_marker(index, wp.position);
        }

        let seed = path.first().unwrap_or(start);
        canvas.move_marker(seed);
        canvas.set_trail(&[seed]);
        canvas.set_loading(false);
        info!("playback engine ready");

        let controller =
            PlaybackController::new(path, field, config.trail_cap, config.substeps);
        Ok(Self {
            ctx,
            api,
            canvas,
            controller: Arc::new(Mutex::new(controller)),
            presenter: Arc::new(Mutex::new(CalloutPresenter::new())),
            gate: Arc::new(TickGate::default()),
            config,
        })
    }

    async fn probe_ready(ctx: &Arc<Ctx>, api: &Arc<Api>, config: &EngineConfig) -> bool {
        for attempt in 1..=config.ready_attempts {
            match api.ready().await {
                Ok(()) => return true,
                Err(e) => debug!(attempt, error = %e, "readiness probe failed"),
            }
            if attempt < config.ready_attempts {
                ctx.sleep(config.ready_delay).await;
            }
        }
        false
    }

    async fn probe_bounds(
        ctx: &Arc<Ctx>,
        api: &Arc<Api>,
        config: &EngineConfig,
    ) -> Option<traceview_env::BoundingBox> {
        for attempt in 1..=config.bbox_attempts {
            match api.bounding_box().await {
                Ok(b) if b.is_ready() => return Some(b),
                Ok(_) => debug!(attempt, "bounding box not populated yet"),
                Err(e) => debug!(attempt, error = %e, "bounding box probe failed"),
            }
            if attempt < config.bbox_attempts {
                ctx.sleep(config.bbox_delay).await;
            }
        }
        None
    }

    /// Play command: POST to the remote, re-poll the pause authority, and
    /// only then (re)start the tick loop.
    pub async fn play(&self) -> Result<(), ApiError> {
        self.api.play().await?;
        self.controller.lock().unwrap().mark_remote_paused(false);

        let status = self.api.status().await?;
        self.controller
            .lock()
            .unwrap()
            .mark_remote_paused(status.paused);
        if status.paused {
            info!("remote still reports paused, tick loop not started");
            return Ok(());
        }

        {
            let mut c = self.controller.lock().unwrap();
            if c.phase() == PlaybackPhase::Finished {
                info!("playback already finished, reset to replay");
                return Ok(());
            }
            c.begin();
        }

        let token = self.gate.arm();
        let engine = self.clone();
        info!("starting tick loop");
        self.ctx
            .spawn("tick-loop", async move { engine.tick_loop(token).await });
        Ok(())
    }

    /// Pause command: cancel the pending tick, keep all progress.
    pub async fn pause(&self) -> Result<(), ApiError> {
        self.api.pause().await?;
        self.gate.cancel();
        let mut c = self.controller.lock().unwrap();
        c.mark_remote_paused(true);
        c.halt();
        info!(segment = c.segment_index(), "playback paused");
        Ok(())
    }

    /// Reset command: cancel the pending tick, restore the initial render
    /// state, reposition the marker at the exact first trace point.
    pub async fn reset(&self) -> Result<(), ApiError> {
        self.api.reset().await?;
        self.gate.cancel();
        let seed = {
            let mut c = self.controller.lock().unwrap();
            c.mark_remote_paused(true);
            c.reset()
        };
        if let Some(seed) = seed {
            self.canvas.move_marker(seed);
            self.canvas.set_trail(&[seed]);
        }
        info!("playback reset");
        Ok(())
    }

    /// Opens the descriptive callout for a waypoint marker click.
    ///
    /// Unlike proximity callouts this has no auto-dismiss and no latch:
    /// it can be reopened any number of times.
    pub fn open_waypoint_callout(&self, index: usize) -> Option<CalloutId> {
        let callout = {
            let c = self.controller.lock().unwrap();
            let wp = c.waypoints().get(index)?.clone();
            self.presenter.lock().unwrap().open_persistent(index, &wp)
        };
        self.canvas
            .show_callout(callout.id, callout.anchor, &callout.body);
        Some(callout.id)
    }

    /// Closes a callout opened by [`open_waypoint_callout`](Self::open_waypoint_callout).
    pub fn close_callout(&self, id: CalloutId) -> bool {
        let removed = self.presenter.lock().unwrap().remove(id);
        if removed {
            self.canvas.remove_callout(id);
        }
        removed
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.controller.lock().unwrap().phase()
    }

    pub fn segment_index(&self) -> usize {
        self.controller.lock().unwrap().segment_index()
    }

    pub fn trail_len(&self) -> usize {
        self.controller.lock().unwrap().trail().len()
    }

    pub fn open_callouts(&self) -> usize {
        self.presenter.lock().unwrap().open_count()
    }

    /// Waits for the run to finish, polling at the tick cadence.
    pub async fn wait_until_finished(&self) {
        while self.phase() != PlaybackPhase::Finished {
            self.ctx.sleep(self.config.step_delay).await;
        }
    }

    /// One cooperative tick loop. Each iteration re-polls the remote pause
    /// authority, advances one sub-step, renders it, then sleeps the fixed
    /// delay. The loop unwinds as soon as its token goes stale.
    async fn tick_loop(&self, token: u64) {
        loop {
            if !self.gate.is_current(token) {
                debug!("tick loop superseded, unwinding");
                return;
            }

            let status = self.api.status().await;
            // The poll awaited; a newer loop may own playback now. A stale
            // tick must not touch the controller, not even to halt it --
            // its response belongs to a superseded command sequence.
            if !self.gate.is_current(token) {
                return;
            }
            let status = match status {
                Ok(s) => s,
                Err(e) => {
                    // Liveness signal, not a transactional gate: stop quietly
                    // and wait for the next play command.
                    warn!(error = %e, "status poll failed, halting until next play");
                    self.controller.lock().unwrap().halt();
                    return;
                }
            };
            {
                let mut c = self.controller.lock().unwrap();
                c.mark_remote_paused(status.paused);
                if status.paused {
                    c.halt();
                    info!(segment = c.segment_index(), "remote paused, tick loop stopped");
                    return;
                }
            }

            let outcome = self.controller.lock().unwrap().step();
            match outcome {
                StepOutcome::Advanced { position, hits } => {
                    self.canvas.move_marker(position);
                    let polyline = self.controller.lock().unwrap().trail().snapshot();
                    self.canvas.set_trail(&polyline);
                    for hit in &hits {
                        self.present_hit(hit);
                    }
                    if self.controller.lock().unwrap().phase() == PlaybackPhase::Finished {
                        info!("playback finished");
                        return;
                    }
                }
                StepOutcome::Finished => {
                    info!("playback finished");
                    return;
                }
                StepOutcome::Halted => return,
            }

            self.ctx.sleep(self.config.step_delay).await;
        }
    }

    /// Shows a proximity callout and schedules its independent,
    /// non-cancellable dismissal timer.
    fn present_hit(&self, hit: &WaypointHit) {
        let callout = self.presenter.lock().unwrap().open_transient(hit);
        info!(index = hit.index, "waypoint reached");
        self.canvas
            .show_callout(callout.id, callout.anchor, &callout.body);

        let engine = self.clone();
        let id = callout.id;
        self.ctx.spawn("callout-dismiss", async move {
            engine.ctx.sleep(engine.config.callout_linger).await;
            if engine.presenter.lock().unwrap().begin_dismiss(id) {
                engine.canvas.begin_dismiss(id);
            }
            engine.ctx.sleep(engine.config.callout_fade).await;
            if engine.presenter.lock().unwrap().remove(id) {
                engine.canvas.remove_callout(id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use traceview_env::{BoundingBox, PlaybackStatus, StartLocation, TracePoint, WaypointRecord};

    /// Virtual-clock context: sleeping advances time and yields so spawned
    /// tasks make progress on a current-thread runtime.
    struct InstantContext {
        now: Mutex<Duration>,
    }

    impl InstantContext {
        fn shared() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Duration::ZERO),
            })
        }
    }

    #[async_trait]
    impl PlaybackContext for InstantContext {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
            tokio::task::yield_now().await;
        }

        fn spawn<F>(&self, _name: &str, future: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tokio::spawn(future);
        }
    }

    #[derive(Default)]
    struct Script {
        ready_failures: u32,
        bbox_unpopulated: u32,
        start: Option<StartLocation>,
        trace: Vec<TracePoint>,
        fail_trace: bool,
        waypoints: Vec<WaypointRecord>,
        /// Scripted status polls; when exhausted, `Ok(paused = false)`.
        statuses: VecDeque<Result<bool, String>>,
        /// The next status poll parks in flight until released, then
        /// reports `paused = true`.
        park_next_status: bool,
    }

    struct ScriptedApi {
        script: Mutex<Script>,
        ready_calls: AtomicU32,
        status_calls: AtomicU32,
        commands: Mutex<Vec<&'static str>>,
        park_release: tokio::sync::Notify,
        parked: std::sync::atomic::AtomicBool,
    }

    impl ScriptedApi {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                ready_calls: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
                commands: Mutex::new(Vec::new()),
                park_release: tokio::sync::Notify::new(),
                parked: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl ControlPlane for ScriptedApi {
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
            if s.bbox_unpopulated > 0 {
                s.bbox_unpopulated -= 1;
                return Ok(BoundingBox {
                    min_lat: None,
                    min_lon: None,
                    max_lat: None,
                    max_lon: None,
                });
            }
            Ok(BoundingBox {
                min_lat: Some(-1.0),
                min_lon: Some(-1.0),
                max_lat: Some(3.0),
                max_lon: Some(3.0),
            })
        }

        async fn start_location(&self, _drone_id: &str) -> Result<StartLocation, ApiError> {
            let s = self.script.lock().unwrap();
            s.start
                .ok_or_else(|| ApiError::transport("no start location"))
        }

        async fn resampled_trace(
            &self,
            _drone_id: &str,
            _interval: &str,
        ) -> Result<Vec<TracePoint>, ApiError> {
            let s = self.script.lock().unwrap();
            if s.fail_trace {
                return Err(ApiError::Status(500));
            }
            Ok(s.trace.clone())
        }

        async fn waypoints(&self) -> Result<Vec<WaypointRecord>, ApiError> {
            Ok(self.script.lock().unwrap().waypoints.clone())
        }

        async fn status(&self) -> Result<PlaybackStatus, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let park = {
                let mut s = self.script.lock().unwrap();
                std::mem::take(&mut s.park_next_status)
            };
            if park {
                self.parked.store(true, Ordering::SeqCst);
                self.park_release.notified().await;
                return Ok(PlaybackStatus { paused: true });
            }
            let next = self.script.lock().unwrap().statuses.pop_front();
            match next {
                Some(Ok(paused)) => Ok(PlaybackStatus { paused }),
                Some(Err(msg)) => Err(ApiError::Transport(msg)),
                None => Ok(PlaybackStatus { paused: false }),
            }
        }

        async fn play(&self) -> Result<(), ApiError> {
            self.commands.lock().unwrap().push("play");
            Ok(())
        }

        async fn pause(&self) -> Result<(), ApiError> {
            self.commands.lock().unwrap().push("pause");
            Ok(())
        }

        async fn reset(&self) -> Result<(), ApiError> {
            self.commands.lock().unwrap().push("reset");
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingCanvas {
        marker_moves: AtomicU32,
        trail_updates: AtomicU32,
        waypoint_markers: AtomicU32,
        callouts_shown: AtomicU32,
        errors: Mutex<Vec<String>>,
        loading: Mutex<Vec<bool>>,
    }

    impl MapCanvas for CountingCanvas {
        fn set_loading(&self, visible: bool) {
            self.loading.lock().unwrap().push(visible);
        }
        fn fit_bounds(&self, _bounds: &BoundingBox) {}
        fn move_marker(&self, _pos: TracePoint) {
            self.marker_moves.fetch_add(1, Ordering::SeqCst);
        }
        fn set_trail(&self, _polyline: &[TracePoint]) {
            self.trail_updates.fetch_add(1, Ordering::SeqCst);
        }
        fn add_waypoint_marker(&self, _index: usize, _pos: TracePoint) {
            self.waypoint_markers.fetch_add(1, Ordering::SeqCst);
        }
        fn show_callout(&self, _id: CalloutId, _anchor: TracePoint, _body: &str) {
            self.callouts_shown.fetch_add(1, Ordering::SeqCst);
        }
        fn begin_dismiss(&self, _id: CalloutId) {}
        fn remove_callout(&self, _id: CalloutId) {}
        fn show_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            step_delay: Duration::from_millis(1),
            ready_delay: Duration::from_millis(1),
            bbox_delay: Duration::from_millis(1),
            callout_linger: Duration::from_millis(1),
            callout_fade: Duration::from_millis(1),
            ..EngineConfig::default()
        }
    }

    fn three_point_script() -> Script {
        Script {
            start: Some(StartLocation {
                lat: Some(0.0),
                lon: Some(0.0),
            }),
            trace: vec![
                TracePoint::new(0.0, 0.0),
                TracePoint::new(0.0, 1.0),
                TracePoint::new(0.0, 2.0),
            ],
            ..Script::default()
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100_000 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn test_startup_exhausts_readiness_budget() {
        let api = ScriptedApi::new(Script {
            ready_failures: u32::MAX,
            ..Script::default()
        });
        let canvas = Arc::new(CountingCanvas::default());

        let result = ReplayEngine::start(
            InstantContext::shared(),
            api.clone(),
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await;

        assert!(matches!(result, Err(EngineError::NotReady { attempts: 15 })));
        assert_eq!(api.ready_calls.load(Ordering::SeqCst), 15);
        assert_eq!(canvas.errors.lock().unwrap().len(), 1);
        // Loading indicator toggled on, then off on failure.
        assert_eq!(*canvas.loading.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_startup_retries_unpopulated_bbox() {
        let mut script = three_point_script();
        script.bbox_unpopulated = 3;
        script.waypoints = vec![
            WaypointRecord {
                lat: 0.0,
                lon: 0.00001, // hugs the start: no permanent marker
                description: None,
            },
            WaypointRecord {
                lat: 0.0,
                lon: 1.5,
                description: Some("far".into()),
            },
        ];
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .expect("startup should succeed after bbox retries");

        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert_eq!(canvas.waypoint_markers.load(Ordering::SeqCst), 1);
        // Initial marker placement at the seed.
        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst), 1);
        assert_eq!(*canvas.loading.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_malformed_start_location_aborts() {
        let api = ScriptedApi::new(Script {
            start: Some(StartLocation {
                lat: Some(1.0),
                lon: None,
            }),
            ..Script::default()
        });
        let canvas = Arc::new(CountingCanvas::default());

        let result = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas,
            SessionOptions::default(),
            fast_config(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EngineError::StartLocationMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_trace_load_failure_degrades_to_static_marker() {
        let mut script = three_point_script();
        script.fail_trace = true;
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas,
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .expect("trace failure is not terminal");

        engine.play().await.unwrap();
        wait_for(|| engine.phase() == PlaybackPhase::Finished).await;
        // Single-point path: no motion beyond the seed.
        assert_eq!(engine.trail_len(), 1);
    }

    #[tokio::test]
    async fn test_play_runs_three_point_trace_in_fifty_ticks() {
        let api = ScriptedApi::new(three_point_script());
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        let baseline = canvas.marker_moves.load(Ordering::SeqCst);
        engine.play().await.unwrap();
        engine.wait_until_finished().await;

        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst) - baseline, 50);
        assert_eq!(canvas.trail_updates.load(Ordering::SeqCst), 50 + 1);
    }

    #[tokio::test]
    async fn test_remote_pause_halts_without_losing_progress() {
        let mut script = three_point_script();
        // 1 poll consumed by play(), 10 non-paused ticks, then paused.
        script.statuses = std::iter::once(Ok(false))
            .chain((0..10).map(|_| Ok(false)))
            .chain(std::iter::once(Ok(true)))
            .collect();
        // After the pause entry the default resumes as not-paused, but the
        // loop has already unwound by then.
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        let baseline = canvas.marker_moves.load(Ordering::SeqCst);
        engine.play().await.unwrap();
        wait_for(|| engine.phase() == PlaybackPhase::Paused).await;

        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst) - baseline, 10);
        assert_eq!(engine.segment_index(), 1);

        // Resume picks up from the exact sub-step.
        engine.play().await.unwrap();
        engine.wait_until_finished().await;
        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst) - baseline, 50);
    }

    #[tokio::test]
    async fn test_status_poll_failure_halts_silently() {
        let mut script = three_point_script();
        script.statuses = std::iter::once(Ok(false))
            .chain((0..5).map(|_| Ok(false)))
            .chain(std::iter::once(Err("socket closed".to_string())))
            .collect();
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        let baseline = canvas.marker_moves.load(Ordering::SeqCst);
        engine.play().await.unwrap();
        wait_for(|| engine.phase() == PlaybackPhase::Paused).await;
        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst) - baseline, 5);

        // A later play resumes and completes the run.
        engine.play().await.unwrap();
        engine.wait_until_finished().await;
        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst) - baseline, 50);
    }

    #[tokio::test]
    async fn test_inflight_poll_from_cancelled_loop_is_ignored() {
        let api = ScriptedApi::new(three_point_script());
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api.clone(),
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        engine.play().await.unwrap();
        // Park the running loop's first poll in flight.
        api.script.lock().unwrap().park_next_status = true;
        wait_for(|| api.parked.load(Ordering::SeqCst)).await;

        // Supersede the parked loop while its poll is still outstanding.
        engine.pause().await.unwrap();
        engine.play().await.unwrap();
        assert_eq!(engine.phase(), PlaybackPhase::Stepping);

        // The stale response reports paused; it belongs to the cancelled
        // loop and must not halt the replacement.
        api.park_release.notify_one();
        engine.wait_until_finished().await;
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(canvas.marker_moves.load(Ordering::SeqCst), 1 + 50);
    }

    #[tokio::test]
    async fn test_reset_restores_initial_render_state() {
        let mut script = three_point_script();
        script.statuses = std::iter::once(Ok(false))
            .chain((0..20).map(|_| Ok(false)))
            .chain(std::iter::once(Ok(true)))
            .collect();
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api.clone(),
            canvas,
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        engine.play().await.unwrap();
        wait_for(|| engine.phase() == PlaybackPhase::Paused).await;

        engine.reset().await.unwrap();
        assert_eq!(engine.trail_len(), 1);
        assert_eq!(engine.segment_index(), 0);
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(api.commands.lock().unwrap().contains(&"reset"));
    }

    #[tokio::test]
    async fn test_waypoint_fires_once_per_session() {
        let mut script = three_point_script();
        // 0.52 sits exactly on an interpolated sub-step (13/25).
        script.waypoints = vec![WaypointRecord {
            lat: 0.0,
            lon: 0.52,
            description: None,
        }];
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        engine.play().await.unwrap();
        engine.wait_until_finished().await;
        assert_eq!(canvas.callouts_shown.load(Ordering::SeqCst), 1);

        // Replay after reset: latch survives, no second callout.
        engine.reset().await.unwrap();
        engine.play().await.unwrap();
        engine.wait_until_finished().await;
        assert_eq!(canvas.callouts_shown.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clicked_waypoint_callout_is_repeatable() {
        let mut script = three_point_script();
        script.waypoints = vec![WaypointRecord {
            lat: 0.0,
            lon: 1.5,
            description: Some("relay mast".into()),
        }];
        let api = ScriptedApi::new(script);
        let canvas = Arc::new(CountingCanvas::default());

        let engine = ReplayEngine::start(
            InstantContext::shared(),
            api,
            canvas.clone(),
            SessionOptions::default(),
            fast_config(),
        )
        .await
        .unwrap();

        let first = engine.open_waypoint_callout(1).expect("waypoint exists");
        assert!(engine.close_callout(first));
        let second = engine.open_waypoint_callout(1).expect("reopenable");
        assert_ne!(first, second);
        assert_eq!(canvas.callouts_shown.load(Ordering::SeqCst), 2);

        assert!(engine.open_waypoint_callout(7).is_none());
    }

    #[test]
    fn test_tick_gate_generations() {
        let gate = TickGate::default();
        let t1 = gate.arm();
        assert!(gate.is_current(t1));

        gate.cancel();
        assert!(!gate.is_current(t1));

        let t2 = gate.arm();
        assert!(gate.is_current(t2));
        assert!(!gate.is_current(t1));
    }
}
