//! Playback controller - the state machine that owns animation progress.

use std::collections::VecDeque;

use traceview_env::TracePoint;

use crate::trace_path::{interpolate, TracePath};
use crate::trail::Trail;
use crate::waypoints::{WaypointField, WaypointHit};

/// Playback state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Initial state, before the first play command.
    Idle,
    /// Actively advancing one sub-step per tick.
    Stepping,
    /// Suspended; progress intact, resumable by a new play command.
    Paused,
    /// Reached the final trace point.
    Finished,
}

/// Result of driving the controller one tick forward.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// One sub-step was rendered.
    Advanced {
        position: TracePoint,
        hits: Vec<WaypointHit>,
    },
    /// No sub-steps and no segments remain.
    Finished,
    /// The controller is not in `Stepping`; nothing happened.
    Halted,
}

/// Owns segment progress, the trail, and the waypoint field.
///
/// Purely synchronous: the async driver polls the remote authority and
/// schedules ticks, then calls [`step`](Self::step) for the actual
/// advancement. All invariants live here so they can be tested without a
/// runtime.
#[derive(Debug)]
pub struct PlaybackController {
    path: TracePath,
    /// Next segment to hand to the interpolator.
    segment_index: usize,
    /// Interpolated positions not yet rendered for the segment in progress.
    pending: VecDeque<TracePoint>,
    trail: Trail,
    waypoints: WaypointField,
    phase: PlaybackPhase,
    /// Locally mirrored remote pause flag; eventually consistent, updated by
    /// both status polls and command acknowledgments.
    remote_paused: bool,
    substeps: usize,
}

impl PlaybackController {
    /// Creates a controller positioned at the start of the path.
    ///
    /// The trail is seeded with the first trace point (or a NaN sentinel for
    /// an empty path, which the engine never constructs).
    pub fn new(path: TracePath, waypoints: WaypointField, trail_cap: usize, substeps: usize) -> Self {
        let seed = path
            .first()
            .unwrap_or(TracePoint::new(f64::NAN, f64::NAN));
        Self {
            path,
            segment_index: 0,
            pending: VecDeque::new(),
            trail: Trail::new(trail_cap, seed),
            waypoints,
            phase: PlaybackPhase::Idle,
            remote_paused: true,
            substeps,
        }
    }

    /// Enters `Stepping` from `Idle` or `Paused`. No-op when `Finished`.
    pub fn begin(&mut self) {
        if self.phase != PlaybackPhase::Finished {
            self.phase = PlaybackPhase::Stepping;
        }
    }

    /// Suspends stepping, keeping segment progress intact. Idempotent.
    pub fn halt(&mut self) {
        if self.phase == PlaybackPhase::Stepping {
            self.phase = PlaybackPhase::Paused;
        }
    }

    /// Advances one sub-step: refills the pending buffer from the next
    /// segment when empty, pops one position, appends it to the trail and
    /// evaluates waypoint proximity.
    ///
    /// Transitions to `Finished` as soon as the buffer empties with no
    /// segments remaining, so the final trace point is rendered on the last
    /// advancing tick.
    pub fn step(&mut self) -> StepOutcome {
        match self.phase {
            PlaybackPhase::Stepping => {}
            PlaybackPhase::Finished => return StepOutcome::Finished,
            PlaybackPhase::Idle | PlaybackPhase::Paused => return StepOutcome::Halted,
        }

        if self.pending.is_empty() {
            match self.path.segment(self.segment_index) {
                Some((a, b)) => {
                    self.pending = interpolate(a, b, self.substeps).into();
                    self.segment_index += 1;
                }
                None => {
                    self.phase = PlaybackPhase::Finished;
                    return StepOutcome::Finished;
                }
            }
        }

        let Some(position) = self.pending.pop_front() else {
            // Degenerate substeps == 0 configuration: the refill produced
            // nothing, treat the segment as already traversed.
            self.phase = PlaybackPhase::Finished;
            return StepOutcome::Finished;
        };

        self.trail.append(position);
        let hits = self.waypoints.check(position);

        if self.pending.is_empty() && self.path.segment(self.segment_index).is_none() {
            self.phase = PlaybackPhase::Finished;
        }

        StepOutcome::Advanced { position, hits }
    }

    /// Full playback reset: zero the segment index, drop pending sub-steps,
    /// reseed the trail, return the marker's new (start) position.
    ///
    /// Waypoint visit latches are deliberately untouched: only a fresh
    /// session re-arms them.
    pub fn reset(&mut self) -> Option<TracePoint> {
        self.segment_index = 0;
        self.pending.clear();
        self.phase = PlaybackPhase::Idle;
        let seed = self.path.first()?;
        self.trail.reset(seed);
        Some(seed)
    }

    /// Updates the locally mirrored remote pause flag.
    pub fn mark_remote_paused(&mut self, paused: bool) {
        self.remote_paused = paused;
    }

    pub fn remote_paused(&self) -> bool {
        self.remote_paused
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn waypoints(&self) -> &WaypointField {
        &self.waypoints
    }

    pub fn path(&self) -> &TracePath {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traceview_env::WaypointRecord;

    fn controller(points: Vec<(f64, f64)>, waypoints: Vec<(f64, f64)>) -> PlaybackController {
        let path = TracePath::new(
            points
                .into_iter()
                .map(|(lat, lon)| TracePoint::new(lat, lon))
                .collect(),
        );
        let field = WaypointField::new(
            waypoints
                .into_iter()
                .map(|(lat, lon)| WaypointRecord {
                    lat,
                    lon,
                    description: None,
                })
                .collect(),
            0.00025,
        );
        PlaybackController::new(path, field, 1000, 25)
    }

    #[test]
    fn test_three_point_trace_takes_fifty_ticks() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)], vec![]);
        c.begin();

        let mut advanced = 0;
        loop {
            match c.step() {
                StepOutcome::Advanced { .. } => advanced += 1,
                StepOutcome::Finished => break,
                StepOutcome::Halted => panic!("unexpected halt"),
            }
            if c.phase() == PlaybackPhase::Finished {
                break;
            }
        }
        assert_eq!(advanced, 50);
        assert_eq!(c.phase(), PlaybackPhase::Finished);
    }

    #[test]
    fn test_final_position_is_last_trace_point() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 2.0)], vec![]);
        c.begin();
        let mut last = None;
        while let StepOutcome::Advanced { position, .. } = c.step() {
            last = Some(position);
        }
        assert_eq!(last, Some(TracePoint::new(0.0, 2.0)));
    }

    #[test]
    fn test_step_requires_begin() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![]);
        assert_eq!(c.step(), StepOutcome::Halted);
        c.begin();
        assert!(matches!(c.step(), StepOutcome::Advanced { .. }));
    }

    #[test]
    fn test_halt_is_idempotent() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![]);
        c.begin();
        c.step();
        c.step();

        c.halt();
        let seg = c.segment_index();
        let pending = c.pending_len();
        c.halt();
        assert_eq!(c.segment_index(), seg);
        assert_eq!(c.pending_len(), pending);
        assert_eq!(c.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_resume_continues_exact_progress() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)], vec![]);
        c.begin();
        for _ in 0..7 {
            c.step();
        }
        c.halt();
        let seg = c.segment_index();
        let pending = c.pending_len();

        c.begin();
        assert_eq!(c.segment_index(), seg);
        assert_eq!(c.pending_len(), pending);

        // Remaining ticks complete the run: 50 total.
        let mut advanced = 7;
        while let StepOutcome::Advanced { .. } = c.step() {
            advanced += 1;
        }
        assert_eq!(advanced, 50);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)], vec![]);
        c.begin();
        for _ in 0..33 {
            c.step();
        }
        c.halt();

        let seed = c.reset().unwrap();
        assert_eq!(seed, TracePoint::new(0.0, 0.0));
        assert_eq!(c.segment_index(), 0);
        assert_eq!(c.pending_len(), 0);
        assert_eq!(c.trail().len(), 1);
        assert_eq!(c.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_reset_does_not_rearm_waypoints() {
        // 0.52 sits exactly on an interpolated sub-step (13/25).
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![(0.0, 0.52)]);
        c.begin();
        let mut fired = 0;
        while let StepOutcome::Advanced { hits, .. } = c.step() {
            fired += hits.len();
        }
        assert_eq!(fired, 1);

        c.reset();
        c.begin();
        let mut refired = 0;
        while let StepOutcome::Advanced { hits, .. } = c.step() {
            refired += hits.len();
        }
        assert_eq!(refired, 0);
    }

    #[test]
    fn test_single_point_trace_finishes_without_motion() {
        let mut c = controller(vec![(3.0, 4.0)], vec![]);
        c.begin();
        assert_eq!(c.step(), StepOutcome::Finished);
        assert_eq!(c.trail().len(), 1);
        assert_eq!(c.trail().head(), Some(TracePoint::new(3.0, 4.0)));
    }

    #[test]
    fn test_step_after_finished_stays_finished() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![]);
        c.begin();
        while !matches!(c.step(), StepOutcome::Finished) {
            if c.phase() == PlaybackPhase::Finished {
                break;
            }
        }
        assert_eq!(c.step(), StepOutcome::Finished);
        assert_eq!(c.phase(), PlaybackPhase::Finished);
    }

    #[test]
    fn test_begin_does_not_revive_finished_run() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![]);
        c.begin();
        while let StepOutcome::Advanced { .. } = c.step() {}
        c.begin();
        assert_eq!(c.phase(), PlaybackPhase::Finished);
    }

    #[test]
    fn test_remote_pause_mirror() {
        let mut c = controller(vec![(0.0, 0.0), (0.0, 1.0)], vec![]);
        assert!(c.remote_paused());
        c.mark_remote_paused(false);
        assert!(!c.remote_paused());
    }
}
