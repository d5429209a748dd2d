//! Tracker configuration.
//!
//! Every tunable policy constant of the filter lives here so hosts can
//! override it from code or from a JSON file. All fields are optional in the
//! file form; missing ones take the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Accuracy cut-offs used by the signal classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// Largest accuracy radius still classified Strong (default: 10 m)
    pub strong_max_m: f64,

    /// Largest accuracy radius still classified Medium (default: 50 m)
    pub medium_max_m: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_max_m: 10.0,
            medium_max_m: 50.0,
        }
    }
}

/// Configuration for the LocationTracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Signal classification cut-offs
    pub signal: SignalThresholds,

    /// Multiplier on the summed accuracy radii of two fixes below which a
    /// displacement is treated as jitter (default: 1.0)
    pub jitter_factor: f64,

    /// Fixes older than this are classified Invalid (default: 15 s, None disables)
    #[serde(with = "optional_secs")]
    pub max_fix_age: Option<Duration>,

    /// Reject displacements implying a faster speed, in m/s (default: None)
    pub max_speed_mps: Option<f64>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            signal: SignalThresholds::default(),
            jitter_factor: 1.0,
            max_fix_age: Some(Duration::from_secs(15)),
            max_speed_mps: None,
        }
    }
}

impl TrackingConfig {
    /// Disables the stale-fix check. Useful when replaying recorded fixes.
    pub fn without_fix_age_limit(mut self) -> Self {
        self.max_fix_age = None;
        self
    }

    /// Enables the implausible-speed gate.
    pub fn with_max_speed(mut self, mps: f64) -> Self {
        self.max_speed_mps = Some(mps);
        self
    }

    /// Checks that the thresholds describe a usable policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let SignalThresholds { strong_max_m, medium_max_m } = self.signal;
        if !(strong_max_m.is_finite() && strong_max_m > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "signal.strong_max_m must be positive, got {}",
                strong_max_m
            )));
        }
        if !(medium_max_m.is_finite() && medium_max_m >= strong_max_m) {
            return Err(ConfigError::Invalid(format!(
                "signal.medium_max_m ({}) must be >= strong_max_m ({})",
                medium_max_m, strong_max_m
            )));
        }
        if !(self.jitter_factor.is_finite() && self.jitter_factor >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "jitter_factor must be non-negative, got {}",
                self.jitter_factor
            )));
        }
        if let Some(speed) = self.max_speed_mps {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "max_speed_mps must be positive, got {}",
                    speed
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TrackingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

/// Serializes `Option<Duration>` as fractional seconds.
mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        match secs {
            Some(s) => Duration::try_from_secs_f64(s).map(Some).map_err(|e| {
                serde::de::Error::custom(format!(
                    "max_fix_age must be a non-negative number of seconds, got {} ({})",
                    s, e
                ))
            }),
            None => Ok(None),
        }
    }
}

/// Errors raised while building a configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Malformed configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
