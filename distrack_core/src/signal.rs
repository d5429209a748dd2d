//! Signal strength classification from fix accuracy.

use crate::config::{SignalThresholds, TrackingConfig};
use distrack_env::RawFix;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Qualitative GPS signal level.
///
/// Ordered from worst to best so that `Invalid < Weak < Medium < Strong`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalStrength {
    /// No usable accuracy (unavailable, non-positive or stale)
    Invalid,
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    /// Returns true for every level except `Invalid`.
    pub fn is_valid(&self) -> bool {
        !matches!(self, SignalStrength::Invalid)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalStrength::Invalid => "invalid",
            SignalStrength::Weak => "weak",
            SignalStrength::Medium => "medium",
            SignalStrength::Strong => "strong",
        }
    }
}

impl Default for SignalStrength {
    fn default() -> Self {
        SignalStrength::Invalid
    }
}

impl std::fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Maps a horizontal accuracy radius in meters to a signal level.
///
/// Smaller radii are better. Non-positive and non-finite values mean the
/// platform had no accuracy estimate and classify as `Invalid`.
pub fn classify(accuracy: f64, thresholds: &SignalThresholds) -> SignalStrength {
    if !accuracy.is_finite() || accuracy <= 0.0 {
        SignalStrength::Invalid
    } else if accuracy <= thresholds.strong_max_m {
        SignalStrength::Strong
    } else if accuracy <= thresholds.medium_max_m {
        SignalStrength::Medium
    } else {
        SignalStrength::Weak
    }
}

/// Classifies a fix, treating fixes older than `max_fix_age` or with
/// out-of-range coordinates as `Invalid`.
pub fn classify_fix(fix: &RawFix, now: SystemTime, config: &TrackingConfig) -> SignalStrength {
    if !fix.has_valid_coordinates() {
        return SignalStrength::Invalid;
    }
    if let Some(max_age) = config.max_fix_age {
        if fix.age_at(now) > max_age {
            return SignalStrength::Invalid;
        }
    }
    classify(fix.horizontal_accuracy, &config.signal)
}
