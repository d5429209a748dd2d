//! Common types exchanged between fix sources and the tracking core.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// A single raw position reading from the platform location service.
///
/// Fixes are immutable values. The tracking core only looks at the
/// coordinate, the horizontal accuracy and the timestamp; the optional
/// fields are carried through for sinks that want them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    /// Latitude in WGS84 degrees
    pub latitude: f64,

    /// Longitude in WGS84 degrees
    pub longitude: f64,

    /// Horizontal accuracy radius in meters (larger = worse, <= 0 = unavailable)
    pub horizontal_accuracy: f64,

    /// When the platform produced the reading
    pub timestamp: SystemTime,

    /// Altitude above the WGS84 ellipsoid in meters
    pub altitude: Option<f64>,

    /// Ground speed in m/s
    pub speed: Option<f64>,

    /// Course over ground in degrees from true north
    pub course: Option<f64>,
}

impl RawFix {
    /// Creates a fix with only the fields the tracking core uses.
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy: f64, timestamp: SystemTime) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            timestamp,
            altitude: None,
            speed: None,
            course: None,
        }
    }

    /// Attaches an altitude reading.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Attaches speed and course readings.
    pub fn with_motion(mut self, speed: f64, course: f64) -> Self {
        self.speed = Some(speed);
        self.course = Some(course);
        self
    }

    /// Returns true if the coordinate is finite and inside WGS84 bounds.
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    /// Returns how old this fix is relative to `now`.
    ///
    /// Fixes stamped in the future are treated as brand new.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.timestamp).unwrap_or(Duration::ZERO)
    }
}

/// Location permission state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    NotDetermined,

    /// The user refused location access
    Denied,

    /// Access is blocked by policy (parental controls, MDM)
    Restricted,

    /// Access granted while the app is in use
    AuthorizedWhenInUse,

    /// Access granted at all times
    AuthorizedAlways,
}

impl AuthorizationStatus {
    /// Returns true if fixes may be collected under this status.
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }
}

impl Default for AuthorizationStatus {
    fn default() -> Self {
        AuthorizationStatus::NotDetermined
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Restricted => "restricted",
            AuthorizationStatus::AuthorizedWhenInUse => "authorized_when_in_use",
            AuthorizationStatus::AuthorizedAlways => "authorized_always",
        };
        write!(f, "{}", name)
    }
}

/// An event delivered by a fix source, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceEvent {
    /// A new position reading
    Fix(RawFix),

    /// The platform permission changed
    AuthorizationChanged(AuthorizationStatus),
}
