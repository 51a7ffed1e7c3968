//! Deterministic playback scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: uninterrupted replay start to finish
    FullRun,

    /// SIM-002: mid-run pause, then resume from the exact sub-step
    PauseResume,

    /// SIM-003: waypoints planted on the path, latch-once verification
    WaypointSweep,

    /// SIM-004: remote pause authority flapping plus transient poll errors
    StatusFlap,

    /// SIM-005: repeated play/reset cycles, then a clean final run
    ResetStorm,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FullRun,
            ScenarioId::PauseResume,
            ScenarioId::WaypointSweep,
            ScenarioId::StatusFlap,
            ScenarioId::ResetStorm,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FullRun => "full_run",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::WaypointSweep => "waypoint_sweep",
            ScenarioId::StatusFlap => "status_flap",
            ScenarioId::ResetStorm => "reset_storm",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FullRun => "Uninterrupted replay, exact tick count and trail shape",
            ScenarioId::PauseResume => "Pause mid-segment, resume, no skipped or repeated sub-steps",
            ScenarioId::WaypointSweep => "Proximity callouts fire once per session, replay stays silent",
            ScenarioId::StatusFlap => "Flapping pause authority and poll failures, playback stays exact",
            ScenarioId::ResetStorm => "Repeated resets restore the seed state, final run completes",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_run" | "fullrun" | "sim-001" => Ok(ScenarioId::FullRun),
            "pause_resume" | "pauseresume" | "sim-002" => Ok(ScenarioId::PauseResume),
            "waypoint_sweep" | "waypointsweep" | "sim-003" => Ok(ScenarioId::WaypointSweep),
            "status_flap" | "statusflap" | "sim-004" => Ok(ScenarioId::StatusFlap),
            "reset_storm" | "resetstorm" | "sim-005" => Ok(ScenarioId::ResetStorm),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

impl serde::Serialize for ScenarioId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
