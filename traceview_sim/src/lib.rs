//! Traceview deterministic scenario harness.
//!
//! Runs the full playback engine against a scripted control plane, a
//! recording canvas, and a virtual clock, so every scenario is
//! reproducible from a single 64-bit seed.
//!
//! All sources of non-determinism are intercepted:
//! - **Time**: the context's virtual clock advances only through `sleep`
//! - **Remote**: the control plane replays a scripted status/response plan
//! - **Randomness**: trace shapes and status flaps derive from the seed
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   ScenarioRunner                     │
//! │  ┌────────────┐  ┌─────────────────┐  ┌───────────┐  │
//! │  │ SimContext │  │ ScriptedControl │  │ Recording │  │
//! │  │ (virtual   │  │ (remote pause   │  │ Canvas    │  │
//! │  │  clock)    │  │  authority)     │  │ (op log)  │  │
//! │  └─────┬──────┘  └────────┬────────┘  └─────┬─────┘  │
//! │        └─────────── ReplayEngine ───────────┘        │
//! └──────────────────────────────────────────────────────┘
//! ```

mod canvas;
mod context;
mod control;
mod runner;
pub mod scenarios;

pub use canvas::{CanvasOp, RecordingCanvas};
pub use context::SimContext;
pub use control::{ControlScript, ScriptedControl, StatusEvent};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
