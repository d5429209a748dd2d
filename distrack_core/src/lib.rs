//! distrack Core - GPS fix filtering and distance accumulation
//!
//! This library turns a noisy stream of location fixes into a route length:
//! 1. **Signal Classifier**: accuracy radius (and fix age) to a signal level
//! 2. **Tracking Engine**: accepts fixes as waypoints, rejects jitter, sums distance
//! 3. **Observer Fan-out**: typed events to weakly held listeners

pub mod config;
pub mod geodesy;
pub mod observer;
pub mod service;
pub mod signal;
pub mod tracking;

// Re-export key types for convenience
pub use config::{ConfigError, SignalThresholds, TrackingConfig};
pub use observer::{
    ChannelListener, EventKind, EventLog, ListenerId, ObserverRegistry, TrackingEvent,
    TrackingListener,
};
pub use service::TrackingService;
pub use signal::{classify, classify_fix, SignalStrength};
pub use tracking::{
    LocationTracker, SessionStats, SessionSummary, TrackingError, TrackingSession,
    TrackingState, Waypoint, WaypointVerdict,
};
