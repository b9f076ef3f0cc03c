//! JSON exporter for external visualization.
//!
//! Dumps per-tick phase and leg progress so a renderer (globe, timeline,
//! plotting script) can replay a run without re-simulating it.

use crate::events::TimelineEvent;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use thiserror::Error;

/// Errors produced while writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progress of one animated leg at capture time.
#[derive(Debug, Clone, Serialize)]
pub struct LegProgress {
    /// What the leg represents, e.g. "client→primary"
    pub label: String,

    /// Progress in [0, 1]
    pub progress: f64,
}

/// A single captured frame.
#[derive(Debug, Clone, Serialize)]
pub struct SimFrame {
    /// Animation time in seconds
    pub time_sec: f64,

    /// Session phase at capture time
    pub phase: String,

    /// Per-leg progress values
    pub legs: Vec<LegProgress>,
}

/// Complete export of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All captured frames
    pub frames: Vec<SimFrame>,

    /// The session's narrated timeline
    pub events: Vec<TimelineEvent>,

    /// Whether the run reached its terminal phase cleanly
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            events: Vec::new(),
            passed: false,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export with the run outcome and timeline.
    pub fn finalize(&mut self, passed: bool, events: Vec<TimelineEvent>) {
        self.passed = passed;
        self.events = events;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_frame_tracks_duration() {
        let mut export = SimExport::new("write_flow", 42);
        export.add_frame(SimFrame {
            time_sec: 0.5,
            phase: "to-primary".to_string(),
            legs: vec![],
        });
        export.add_frame(SimFrame {
            time_sec: 1.0,
            phase: "replicating".to_string(),
            legs: vec![],
        });

        assert_eq!(export.duration_sec, 1.0);
        assert_eq!(export.frames.len(), 2);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut export = SimExport::new("failover", 7);
        export.finalize(true, Vec::new());

        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"scenario\":\"failover\""));
        assert!(json.contains("\"passed\":true"));
    }
}
