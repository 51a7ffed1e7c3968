//! Recording canvas - captures the engine's render op stream for assertions.

use std::sync::Mutex;

use traceview_env::{BoundingBox, CalloutId, MapCanvas, TracePoint};

/// One recorded render instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Loading(bool),
    FitBounds(BoundingBox),
    MoveMarker(TracePoint),
    SetTrail(Vec<TracePoint>),
    WaypointMarker { index: usize, pos: TracePoint },
    ShowCallout { id: CalloutId, body: String },
    BeginDismiss(CalloutId),
    RemoveCallout(CalloutId),
    Error(String),
}

/// Canvas that records every op in order. Scenarios assert on the stream.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Mutex<Vec<CanvasOp>>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<CanvasOp> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: CanvasOp) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn marker_moves(&self) -> usize {
        self.count(|op| matches!(op, CanvasOp::MoveMarker(_)))
    }

    pub fn callouts_shown(&self) -> usize {
        self.count(|op| matches!(op, CanvasOp::ShowCallout { .. }))
    }

    pub fn waypoint_markers(&self) -> usize {
        self.count(|op| matches!(op, CanvasOp::WaypointMarker { .. }))
    }

    pub fn errors(&self) -> Vec<String> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                CanvasOp::Error(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recently rendered trail polyline.
    pub fn last_trail(&self) -> Option<Vec<TracePoint>> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|op| match op {
                CanvasOp::SetTrail(polyline) => Some(polyline.clone()),
                _ => None,
            })
    }

    /// The marker's most recent position.
    pub fn last_marker(&self) -> Option<TracePoint> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|op| match op {
                CanvasOp::MoveMarker(pos) => Some(*pos),
                _ => None,
            })
    }

    /// Longest trail polyline ever rendered.
    pub fn max_trail_len(&self) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                CanvasOp::SetTrail(polyline) => Some(polyline.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn count(&self, pred: impl Fn(&CanvasOp) -> bool) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| pred(op)).count()
    }
}

impl MapCanvas for RecordingCanvas {
    fn set_loading(&self, visible: bool) {
        self.record(CanvasOp::Loading(visible));
    }

    fn fit_bounds(&self, bounds: &BoundingBox) {
        self.record(CanvasOp::FitBounds(*bounds));
    }

    fn move_marker(&self, pos: TracePoint) {
        self.record(CanvasOp::MoveMarker(pos));
    }

    fn set_trail(&self, polyline: &[TracePoint]) {
        self.record(CanvasOp::SetTrail(polyline.to_vec()));
    }

    fn add_waypoint_marker(&self, index: usize, pos: TracePoint) {
        self.record(CanvasOp::WaypointMarker { index, pos });
    }

    fn show_callout(&self, id: CalloutId, _anchor: TracePoint, body: &str) {
        self.record(CanvasOp::ShowCallout {
            id,
            body: body.to_string(),
        });
    }

    fn begin_dismiss(&self, id: CalloutId) {
        self.record(CanvasOp::BeginDismiss(id));
    }

    fn remove_callout(&self, id: CalloutId) {
        self.record(CanvasOp::RemoveCallout(id));
    }

    fn show_error(&self, message: &str) {
        self.record(CanvasOp::Error(message.to_string()));
    }
}
