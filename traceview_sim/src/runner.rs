//! Scenario runner - executes deterministic playback scenarios.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use traceview_core::{EngineConfig, PlaybackPhase, ReplayEngine, SessionOptions};
use traceview_env::{StartLocation, TracePoint, WaypointRecord};

use crate::canvas::RecordingCanvas;
use crate::context::SimContext;
use crate::control::{ControlScript, ScriptedControl, StatusEvent};
use crate::scenarios::ScenarioId;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Animation ticks the full replay takes
    pub total_ticks: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(format!($($arg)+));
        }
    };
}

type Engine = ReplayEngine<SimContext, ScriptedControl, RecordingCanvas>;

/// Runs playback scenarios against the full engine with a virtual clock.
pub struct ScenarioRunner {
    seed: u64,

    /// Trace points per generated trajectory
    trace_len: usize,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self { seed, trace_len: 4 }
    }

    /// Sets the generated trace length (min 4, the waypoint scenarios plant
    /// annotations on the later segments).
    pub fn with_trace_len(mut self, len: usize) -> Self {
        self.trace_len = len.max(4);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("simulation runtime");

        let outcome = rt.block_on(async {
            match scenario {
                ScenarioId::FullRun => self.run_full_run().await,
                ScenarioId::PauseResume => self.run_pause_resume().await,
                ScenarioId::WaypointSweep => self.run_waypoint_sweep().await,
                ScenarioId::StatusFlap => self.run_status_flap().await,
                ScenarioId::ResetStorm => self.run_reset_storm().await,
            }
        });

        match outcome {
            Ok(ticks) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                total_ticks: ticks,
                failure_reason: None,
            },
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_ticks: 0,
                failure_reason: Some(reason),
            },
        }
    }

    /// Eastward-drifting random walk. Longitude strictly increases, so the
    /// path never returns near the start, and step magnitudes keep every
    /// sub-step gap below the proximity threshold.
    fn generate_trace(&self, ctx: &SimContext) -> Vec<TracePoint> {
        let mut points = Vec::with_capacity(self.trace_len);
        let (mut lat, mut lon) = (37.7749, -122.4194);
        points.push(TracePoint::new(lat, lon));
        for _ in 1..self.trace_len {
            let (dlat, dlon) = ctx.with_rng(|rng| {
                (
                    rng.gen_range(-1.0..=1.0) * 1e-3,
                    rng.gen_range(0.4..=1.0) * 1e-3,
                )
            });
            lat += dlat;
            lon += dlon;
            points.push(TracePoint::new(lat, lon));
        }
        points
    }

    fn script_for(&self, trace: &[TracePoint]) -> ControlScript {
        ControlScript {
            start: Some(StartLocation {
                lat: Some(trace[0].lat),
                lon: Some(trace[0].lon),
            }),
            trace: trace.to_vec(),
            ..ControlScript::default()
        }
    }

    fn expected_ticks(&self, trace: &[TracePoint]) -> u64 {
        ((trace.len() - 1) * EngineConfig::default().substeps) as u64
    }

    async fn start_engine(
        ctx: &Arc<SimContext>,
        api: &Arc<ScriptedControl>,
        canvas: &Arc<RecordingCanvas>,
    ) -> Result<Engine, String> {
        ReplayEngine::start(
            Arc::clone(ctx),
            Arc::clone(api),
            Arc::clone(canvas),
            SessionOptions::default(),
            EngineConfig::default(),
        )
        .await
        .map_err(|e| format!("startup failed: {e}"))
    }

    /// SIM-001: uninterrupted replay, exact tick count and trail shape.
    async fn run_full_run(&self) -> Result<u64, String> {
        let ctx = SimContext::shared(self.seed);
        let trace = self.generate_trace(&ctx);
        let expected = self.expected_ticks(&trace);

        let mut script = self.script_for(&trace);
        script.ready_failures = 2;
        script.bbox_pending = 1;
        let api = ScriptedControl::new(script);
        let canvas = Arc::new(RecordingCanvas::new());

        let engine = Self::start_engine(&ctx, &api, &canvas).await?;
        ensure!(
            api.ready_calls() == 3,
            "expected 3 readiness probes, saw {}",
            api.ready_calls()
        );

        engine.play().await.map_err(|e| e.to_string())?;
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "replay never finished"
        );

        let moves = canvas.marker_moves() as u64;
        ensure!(
            moves == expected + 1,
            "expected {} marker moves (incl. seed), saw {moves}",
            expected + 1
        );
        ensure!(
            canvas.last_marker() == trace.last().copied(),
            "marker did not end on the final trace point"
        );
        let trail = canvas.last_trail().unwrap_or_default();
        ensure!(
            trail.len() as u64 == expected + 1,
            "final trail length {} != {}",
            trail.len(),
            expected + 1
        );
        ensure!(
            canvas.errors().is_empty(),
            "unexpected canvas errors: {:?}",
            canvas.errors()
        );

        debug!(ticks = expected, "full_run complete");
        Ok(expected)
    }

    /// SIM-002: a scripted pause lands mid-segment; resume continues from
    /// the exact sub-step with no repeats.
    async fn run_pause_resume(&self) -> Result<u64, String> {
        let ctx = SimContext::shared(self.seed);
        let trace = self.generate_trace(&ctx);
        let expected = self.expected_ticks(&trace);

        // Event 0 is consumed by the play command's own poll; the pause
        // lands on the k-th tick poll, so k-1 ticks advance first.
        let k = 10 + (self.seed % 10) as usize;
        let mut script = self.script_for(&trace);
        script.status_events = std::iter::repeat_with(|| StatusEvent::SetPaused(false))
            .take(k)
            .chain(std::iter::once(StatusEvent::SetPaused(true)))
            .collect();
        let api = ScriptedControl::new(script);
        let canvas = Arc::new(RecordingCanvas::new());

        let engine = Self::start_engine(&ctx, &api, &canvas).await?;
        engine.play().await.map_err(|e| e.to_string())?;

        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Paused).await,
            "scripted pause never took effect"
        );
        let at_pause = canvas.marker_moves() as u64;
        ensure!(
            at_pause == k as u64,
            "expected {} marker moves before pause (incl. seed), saw {at_pause}",
            k
        );

        engine.play().await.map_err(|e| e.to_string())?;
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "resume never finished"
        );
        let total = canvas.marker_moves() as u64;
        ensure!(
            total == expected + 1,
            "expected {} total marker moves, saw {total} (sub-steps skipped or repeated)",
            expected + 1
        );

        Ok(expected)
    }

    /// SIM-003: planted waypoints fire exactly once per session; a replay
    /// after reset stays silent.
    async fn run_waypoint_sweep(&self) -> Result<u64, String> {
        let ctx = SimContext::shared(self.seed);
        let trace = self.generate_trace(&ctx);
        let expected = self.expected_ticks(&trace);
        let substeps = EngineConfig::default().substeps;

        // Two waypoints exactly on interpolated sub-steps, one on the start
        // itself (marker suppressed, still fires), one far decoy.
        let on_path_a = substep(trace[0], trace[1], 7, substeps);
        let on_path_b = substep(trace[2], trace[3], 19, substeps);
        let mut script = self.script_for(&trace);
        script.waypoints = vec![
            record(trace[0], Some("launch pad")),
            record(on_path_a, Some("survey point A")),
            record(on_path_b, None),
            record(TracePoint::new(trace[0].lat + 0.5, trace[0].lon), Some("off route")),
        ];
        let api = ScriptedControl::new(script);
        let canvas = Arc::new(RecordingCanvas::new());

        let engine = Self::start_engine(&ctx, &api, &canvas).await?;
        ensure!(
            canvas.waypoint_markers() == 3,
            "start-adjacent waypoint should have no marker, saw {} markers",
            canvas.waypoint_markers()
        );

        engine.play().await.map_err(|e| e.to_string())?;
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "replay never finished"
        );
        ensure!(
            canvas.callouts_shown() == 3,
            "expected 3 proximity callouts, saw {}",
            canvas.callouts_shown()
        );

        // Dismissal timers drain on the virtual clock.
        ensure!(
            wait_until(200_000, || engine.open_callouts() == 0).await,
            "transient callouts never dismissed"
        );

        // Replay: latches survive the reset, nothing fires again.
        engine.reset().await.map_err(|e| e.to_string())?;
        engine.play().await.map_err(|e| e.to_string())?;
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "replay after reset never finished"
        );
        ensure!(
            canvas.callouts_shown() == 3,
            "visited waypoint fired again on replay, total {}",
            canvas.callouts_shown()
        );

        Ok(expected * 2)
    }

    /// SIM-004: the pause authority flaps and polls fail mid-run; the
    /// driver keeps re-issuing play and every sub-step still renders
    /// exactly once.
    async fn run_status_flap(&self) -> Result<u64, String> {
        let ctx = SimContext::shared(self.seed);
        let trace = self.generate_trace(&ctx);
        let expected = self.expected_ticks(&trace);

        let mut script = self.script_for(&trace);
        script.status_events = (0..24)
            .map(|_| {
                ctx.with_rng(|rng| {
                    let roll: f64 = rng.gen();
                    if roll < 0.2 {
                        StatusEvent::SetPaused(true)
                    } else if roll < 0.3 {
                        StatusEvent::Error("status poll dropped".to_string())
                    } else {
                        StatusEvent::SetPaused(false)
                    }
                })
            })
            .collect::<VecDeque<_>>();
        let api = ScriptedControl::new(script);
        let canvas = Arc::new(RecordingCanvas::new());

        let engine = Self::start_engine(&ctx, &api, &canvas).await?;

        // Keep kicking the run until it survives the whole event plan.
        for round in 0..64 {
            if engine.phase() == PlaybackPhase::Finished {
                break;
            }
            // Play may itself eat a scripted error; that is part of the test.
            let _ = engine.play().await;
            settle(5_000).await;
            debug!(round, phase = ?engine.phase(), "status_flap round");
        }
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "run never finished, {} events left",
            api.pending_events()
        );

        let moves = canvas.marker_moves() as u64;
        ensure!(
            moves == expected + 1,
            "expected {} marker moves despite flapping, saw {moves}",
            expected + 1
        );
        ensure!(
            canvas.last_marker() == trace.last().copied(),
            "marker did not end on the final trace point"
        );

        Ok(expected)
    }

    /// SIM-005: repeated play/reset cycles always restore the seed state;
    /// the final uninterrupted run completes and the planted waypoint has
    /// fired exactly once across the whole session.
    async fn run_reset_storm(&self) -> Result<u64, String> {
        let ctx = SimContext::shared(self.seed);
        let trace = self.generate_trace(&ctx);
        let expected = self.expected_ticks(&trace);
        let substeps = EngineConfig::default().substeps;

        let mut script = self.script_for(&trace);
        script.waypoints = vec![record(substep(trace[1], trace[2], 13, substeps), None)];
        let api = ScriptedControl::new(script);
        let canvas = Arc::new(RecordingCanvas::new());

        let engine = Self::start_engine(&ctx, &api, &canvas).await?;

        let cycles = 4;
        for cycle in 0..cycles {
            engine.play().await.map_err(|e| e.to_string())?;
            let yields = ctx.with_rng(|rng| rng.gen_range(20..200));
            settle(yields).await;

            engine.pause().await.map_err(|e| e.to_string())?;
            engine.reset().await.map_err(|e| e.to_string())?;

            ensure!(
                engine.phase() == PlaybackPhase::Idle,
                "cycle {cycle}: phase {:?} after reset",
                engine.phase()
            );
            ensure!(
                engine.segment_index() == 0 && engine.trail_len() == 1,
                "cycle {cycle}: reset did not restore seed state"
            );
            ensure!(
                canvas.last_marker() == Some(trace[0]),
                "cycle {cycle}: marker not back on the first trace point"
            );
        }
        ensure!(
            api.reset_calls() == cycles,
            "expected {cycles} reset commands, saw {}",
            api.reset_calls()
        );

        engine.play().await.map_err(|e| e.to_string())?;
        ensure!(
            wait_until(200_000, || engine.phase() == PlaybackPhase::Finished).await,
            "final run never finished"
        );
        let trail = canvas.last_trail().unwrap_or_default();
        ensure!(
            trail.len() as u64 == expected + 1,
            "final trail length {} != {}",
            trail.len(),
            expected + 1
        );
        ensure!(
            canvas.callouts_shown() == 1,
            "waypoint should fire exactly once across all cycles, saw {}",
            canvas.callouts_shown()
        );

        Ok(expected)
    }
}

fn record(pos: TracePoint, description: Option<&str>) -> WaypointRecord {
    WaypointRecord {
        lat: pos.lat,
        lon: pos.lon,
        description: description.map(str::to_string),
    }
}

/// Interpolated sub-step `j` of `steps`, bit-identical to the engine's own
/// interpolation so planted waypoints sit exactly on the path.
fn substep(a: TracePoint, b: TracePoint, j: usize, steps: usize) -> TracePoint {
    let t = j as f64 / steps as f64;
    TracePoint::new(a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
}

/// Yields up to `limit` times waiting for `cond`.
async fn wait_until(limit: usize, cond: impl Fn() -> bool) -> bool {
    for _ in 0..limit {
        if cond() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    cond()
}

/// Lets the scheduler run sibling tasks for `rounds` yields.
async fn settle(rounds: usize) {
    for _ in 0..rounds {
        tokio::task::yield_now().await;
    }
}
