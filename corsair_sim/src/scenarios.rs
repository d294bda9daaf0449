//! Fault scenarios for the harness.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Steady fleet, no faults
    CalmSeas,

    /// Ships sink and new ones spawn while steering runs
    Shipwreck,

    /// The fabric sends a fatal log mid-run
    Mutiny,

    /// Slow sends racing heavy log traffic
    Storm,

    /// Disconnect arrives early; the worker must shut down within bounds
    PortCall,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CalmSeas,
            ScenarioId::Shipwreck,
            ScenarioId::Mutiny,
            ScenarioId::Storm,
            ScenarioId::PortCall,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CalmSeas => "calm_seas",
            ScenarioId::Shipwreck => "shipwreck",
            ScenarioId::Mutiny => "mutiny",
            ScenarioId::Storm => "storm",
            ScenarioId::PortCall => "port_call",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CalmSeas => "Steady fleet, every ship steered every pass",
            ScenarioId::Shipwreck => "Ships sink and spawn between passes",
            ScenarioId::Mutiny => "Fatal log from the fabric terminates the worker",
            ScenarioId::Storm => "Slow sends interleaved with chatty logs, no overlaps allowed",
            ScenarioId::PortCall => "Early disconnect, no sends after the flag flips",
        }
    }

    /// Whether the worker is expected to end with a remote fatal.
    pub fn expects_fatal(&self) -> bool {
        matches!(self, ScenarioId::Mutiny)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario '{0}' (try: calm_seas, shipwreck, mutiny, storm, port_call, all)")]
pub struct UnknownScenario(pub String);

impl FromStr for ScenarioId {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ScenarioId::all()
            .into_iter()
            .find(|id| id.name() == normalized)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}
