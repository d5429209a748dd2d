//! JSON exporter for run diagnostics.
//!
//! Writes one frame per simulated fix so a run can be replayed on a map:
//! true position, reported fix, the waypoint the tracker emitted and the
//! running distance.

use distrack_core::{SignalStrength, TrackingState, Waypoint};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new((latitude, longitude): (f64, f64)) -> Self {
        Self { latitude, longitude }
    }
}

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Ground truth device position
    pub truth: GeoPosition,

    /// Position the receiver reported
    pub fix: GeoPosition,

    /// Accuracy the receiver reported
    pub reported_accuracy_m: f64,

    /// Waypoint emitted for this fix (none while paused or stopped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waypoint: Option<Waypoint>,

    pub total_distance_m: f64,
    pub signal: SignalStrength,
    pub state: TrackingState,

    /// Events (pause, resume, revocation)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_distance_m: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth_distance_m: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            tracked_distance_m: None,
            truth_distance_m: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, tracked_distance_m: f64, truth_distance_m: f64) {
        self.passed = passed;
        self.tracked_distance_m = Some(tracked_distance_m);
        self.truth_distance_m = Some(truth_distance_m);
    }

    /// Tracked waypoints in order, as a map's route polyline would draw them.
    pub fn route(&self) -> Vec<GeoPosition> {
        self.frames
            .iter()
            .filter_map(|f| f.waypoint.as_ref())
            .filter(|w| w.should_be_tracked)
            .map(|w| GeoPosition {
                latitude: w.latitude,
                longitude: w.longitude,
            })
            .collect()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
