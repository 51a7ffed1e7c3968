//! Map canvas abstraction - the render boundary of the engine.

use crate::types::{BoundingBox, CalloutId, TracePoint};

/// Abstraction over the map surface the engine renders onto.
///
/// The engine owns all playback state; the canvas is write-only. Every
/// operation is a complete instruction (the trail is republished in full on
/// each step rather than patched incrementally), so a canvas never has to
/// reconstruct engine state to stay consistent.
///
/// # Implementations
///
/// - **Production**: console/log renderer, or a bridge to a real map widget
/// - **Simulation**: recording canvas capturing the op stream for assertions
pub trait MapCanvas: Send + Sync + 'static {
    /// Toggles the startup loading indicator.
    fn set_loading(&self, visible: bool);

    /// Fits the viewport to the world extent. Called once at startup.
    fn fit_bounds(&self, bounds: &BoundingBox);

    /// Moves the vehicle marker to a new position.
    fn move_marker(&self, pos: TracePoint);

    /// Replaces the rendered trail with the given polyline.
    ///
    /// The slice is the trail buffer's entire contents, most recent last.
    fn set_trail(&self, polyline: &[TracePoint]);

    /// Places a permanent low-opacity marker for a waypoint.
    ///
    /// `index` is the waypoint's 1-based position in load order; clicking
    /// the marker is expected to be routed back to the engine's
    /// `open_waypoint_callout`.
    fn add_waypoint_marker(&self, index: usize, pos: TracePoint);

    /// Shows a callout anchored at `anchor` with the given body text.
    fn show_callout(&self, id: CalloutId, anchor: TracePoint, body: &str);

    /// Starts the visual dismissal transition for a callout.
    fn begin_dismiss(&self, id: CalloutId);

    /// Removes a callout from the render tree.
    fn remove_callout(&self, id: CalloutId);

    /// Surfaces a terminal startup failure to the user.
    fn show_error(&self, message: &str);
}
