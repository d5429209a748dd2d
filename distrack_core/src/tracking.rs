//! The "TRACKING" Engine - fix filtering and distance accumulation
//!
//! Turns a stream of raw GPS fixes into a route length by:
//! - Classifying each fix's signal strength from its accuracy radius
//! - Rejecting fixes with no usable accuracy
//! - Rejecting displacements that fit inside the combined accuracy
//!   envelope of the two fixes (sensor jitter on a stationary device)
//! - Summing great-circle distance between accepted waypoints
//!
//! Every handled fix is reported to observers as a [`Waypoint`], tracked or
//! not, so a map can show rejected readings alongside the route.

use crate::config::TrackingConfig;
use crate::geodesy::fix_distance_m;
use crate::observer::{EventKind, ListenerId, ObserverRegistry, TrackingEvent, TrackingListener};
use crate::signal::{classify, classify_fix, SignalStrength};
use distrack_env::{AuthorizationStatus, FixSource, RawFix, SourceError, SourceEvent, TrackerContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

// ============================================================================
// OUTPUT RECORDS
// ============================================================================

/// Why a fix was or was not added to the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaypointVerdict {
    /// First valid fix of the session; starts the route
    Origin,

    /// Real movement; distance was added
    Accepted,

    /// Accuracy unavailable or coordinates out of range
    InvalidSignal,

    /// Older than the configured maximum fix age
    Stale,

    /// Displacement within the combined accuracy envelope
    Jitter,

    /// Displacement implies a speed above the configured limit
    ImplausibleSpeed,
}

impl WaypointVerdict {
    /// Returns true if the fix became part of the route.
    pub fn is_tracked(&self) -> bool {
        matches!(self, WaypointVerdict::Origin | WaypointVerdict::Accepted)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            WaypointVerdict::Origin => "route start",
            WaypointVerdict::Accepted => "accepted",
            WaypointVerdict::InvalidSignal => "invalid signal",
            WaypointVerdict::Stale => "stale fix",
            WaypointVerdict::Jitter => "jitter",
            WaypointVerdict::ImplausibleSpeed => "implausible speed",
        }
    }
}

/// A fix as reported to observers, ready for a map annotation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub subtitle: String,

    /// True if the fix was accepted into the route
    pub should_be_tracked: bool,

    /// Accuracy radius of the underlying fix in meters
    pub horizontal_accuracy: f64,

    /// Timestamp of the underlying fix
    pub timestamp: SystemTime,

    pub verdict: WaypointVerdict,
}

impl Waypoint {
    fn from_fix(fix: &RawFix, verdict: WaypointVerdict, accepted_index: usize, total_distance: f64) -> Self {
        let (title, subtitle) = match verdict {
            WaypointVerdict::Origin => (
                "Start".to_string(),
                format!("±{:.0} m, {:.1} m total", fix.horizontal_accuracy, total_distance),
            ),
            WaypointVerdict::Accepted => (
                format!("Waypoint {}", accepted_index),
                format!("±{:.0} m, {:.1} m total", fix.horizontal_accuracy, total_distance),
            ),
            rejected => (
                "Rejected fix".to_string(),
                format!("±{:.0} m, {}", fix.horizontal_accuracy, rejected.reason()),
            ),
        };

        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            title,
            subtitle,
            should_be_tracked: verdict.is_tracked(),
            horizontal_accuracy: fix.horizontal_accuracy,
            timestamp: fix.timestamp,
            verdict,
        }
    }
}

// ============================================================================
// SESSION STATE
// ============================================================================

/// Lifecycle state of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingState {
    Stopped,
    Running,
    Paused,
}

/// Per-session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Fixes added to the route, including the origin
    pub accepted: u64,

    pub rejected_invalid: u64,
    pub rejected_stale: u64,
    pub rejected_jitter: u64,
    pub rejected_speed: u64,

    /// Fixes dropped unseen because the session was paused
    pub discarded_while_paused: u64,

    pub signal_changes: u64,
}

impl SessionStats {
    /// Total fixes reported with `should_be_tracked = false`.
    pub fn rejected(&self) -> u64 {
        self.rejected_invalid + self.rejected_stale + self.rejected_jitter + self.rejected_speed
    }

    fn record(&mut self, verdict: WaypointVerdict) {
        match verdict {
            WaypointVerdict::Origin | WaypointVerdict::Accepted => self.accepted += 1,
            WaypointVerdict::InvalidSignal => self.rejected_invalid += 1,
            WaypointVerdict::Stale => self.rejected_stale += 1,
            WaypointVerdict::Jitter => self.rejected_jitter += 1,
            WaypointVerdict::ImplausibleSpeed => self.rejected_speed += 1,
        }
    }
}

/// Mutable state of one start-to-stop cycle.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    /// Last fix accepted into the route
    pub previous_accepted_fix: Option<RawFix>,

    /// Accumulated route length in meters (never decreases within a session)
    pub total_distance: f64,

    pub signal_strength: SignalStrength,

    pub state: TrackingState,

    pub stats: SessionStats,

    /// Context clock reading at `start()`
    pub started_at: Duration,
}

impl TrackingSession {
    fn fresh(state: TrackingState, started_at: Duration) -> Self {
        Self {
            previous_accepted_fix: None,
            total_distance: 0.0,
            signal_strength: SignalStrength::Invalid,
            state,
            stats: SessionStats::default(),
            started_at,
        }
    }
}

/// What a finished session amounted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_distance_m: f64,
    pub accepted_waypoints: u64,
    pub rejected_fixes: u64,
    pub signal_changes: u64,
    pub duration: Duration,
}

// ============================================================================
// LOCATION TRACKER (The Engine)
// ============================================================================

/// Filters fixes from a source and accumulates the distance traveled.
///
/// Generic over the source and the clock so the same tracker runs on a
/// platform location service or a simulated one. All methods take
/// `&mut self`; see [`crate::service::TrackingService`] for a shared,
/// serialized handle.
pub struct LocationTracker<S, C>
where
    S: FixSource,
    C: TrackerContext,
{
    source: Arc<S>,
    context: Arc<C>,
    config: TrackingConfig,
    session: TrackingSession,
    observers: ObserverRegistry,

    /// Latest permission state seen from the source
    authorization: AuthorizationStatus,
}

impl<S, C> LocationTracker<S, C>
where
    S: FixSource,
    C: TrackerContext,
{
    /// Create a new tracker in the `Stopped` state.
    pub fn new(source: Arc<S>, context: Arc<C>, config: TrackingConfig) -> Self {
        let authorization = source.authorization_status();
        let started_at = context.now();
        Self {
            source,
            context,
            config,
            session: TrackingSession::fresh(TrackingState::Stopped, started_at),
            observers: ObserverRegistry::new(),
            authorization,
        }
    }

    /// Create a new tracker with default configuration.
    pub fn with_defaults(source: Arc<S>, context: Arc<C>) -> Self {
        Self::new(source, context, TrackingConfig::default())
    }

    // ========================================================================
    // OBSERVERS
    // ========================================================================

    /// Subscribe a listener to some event kinds. The tracker holds it weakly.
    pub fn subscribe<L>(&mut self, listener: &Arc<L>, kinds: &[EventKind]) -> ListenerId
    where
        L: TrackingListener + 'static,
    {
        self.observers.subscribe(listener, kinds)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Begin a fresh session: `Stopped -> Running`.
    ///
    /// Resets distance, previous fix, signal strength and counters, then
    /// asks the source to start emitting.
    pub fn start(&mut self) -> Result<(), TrackingError> {
        if self.session.state != TrackingState::Stopped {
            return Err(TrackingError::AlreadyRunning);
        }

        self.authorization = self.source.authorization_status();
        if !self.authorization.is_authorized() {
            warn!("Refusing to start tracking: authorization is {}", self.authorization);
            return Err(TrackingError::AuthorizationDenied(self.authorization));
        }

        self.source.start_updates()?;
        self.session = TrackingSession::fresh(TrackingState::Running, self.context.now());
        info!("Tracking session started");
        Ok(())
    }

    /// Suspend fix handling: `Running -> Paused`. All state is kept.
    pub fn pause(&mut self) -> Result<(), TrackingError> {
        if self.session.state != TrackingState::Running {
            return Err(TrackingError::NotRunning);
        }
        self.source.pause_updates();
        self.session.state = TrackingState::Paused;
        info!(
            "Tracking paused at {:.1} m",
            self.session.total_distance
        );
        Ok(())
    }

    /// Continue a paused session: `Paused -> Running`.
    pub fn resume(&mut self) -> Result<(), TrackingError> {
        if self.session.state != TrackingState::Paused {
            return Err(TrackingError::NotPaused);
        }
        self.source.resume_updates();
        self.session.state = TrackingState::Running;
        info!("Tracking resumed");
        Ok(())
    }

    /// End the session: `Running | Paused -> Stopped`.
    ///
    /// Distance and previous fix stay readable until the next `start()`.
    pub fn stop(&mut self) -> Result<SessionSummary, TrackingError> {
        if self.session.state == TrackingState::Stopped {
            return Err(TrackingError::NotRunning);
        }
        self.source.stop_updates();
        self.session.state = TrackingState::Stopped;

        let summary = self.summary();
        info!(
            "Tracking session stopped: {:.1} m over {} waypoints ({} rejected)",
            summary.total_distance_m, summary.accepted_waypoints, summary.rejected_fixes
        );
        Ok(summary)
    }

    // ========================================================================
    // INBOUND EVENTS
    // ========================================================================

    /// Dispatch one event from the source.
    pub fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Fix(fix) => {
                self.handle_fix(&fix);
            }
            SourceEvent::AuthorizationChanged(status) => {
                self.on_authorization_change(status);
            }
        }
    }

    /// Record a permission change.
    ///
    /// If access is revoked during a session the session is stopped and its
    /// summary returned.
    pub fn on_authorization_change(&mut self, status: AuthorizationStatus) -> Option<SessionSummary> {
        debug!("Authorization changed: {} -> {}", self.authorization, status);
        self.authorization = status;

        if status.is_authorized() || self.session.state == TrackingState::Stopped {
            return None;
        }

        warn!("Location access revoked ({}); stopping tracking session", status);
        self.stop().ok()
    }

    /// Run one fix through the filter.
    ///
    /// Returns the verdict, or `None` if the fix was discarded because the
    /// session is not running.
    pub fn handle_fix(&mut self, fix: &RawFix) -> Option<WaypointVerdict> {
        match self.session.state {
            TrackingState::Running => {}
            TrackingState::Paused => {
                self.session.stats.discarded_while_paused += 1;
                return None;
            }
            TrackingState::Stopped => return None,
        }

        // Step 1: signal classification (independent of acceptance)
        let now = self.context.system_time();
        let strength = classify_fix(fix, now, &self.config);
        if strength != self.session.signal_strength {
            debug!("Signal strength {} -> {}", self.session.signal_strength, strength);
            self.session.signal_strength = strength;
            self.session.stats.signal_changes += 1;
            self.observers
                .notify(&TrackingEvent::SignalStrengthChanged(strength));
        }

        // Step 2: unusable fixes are shown but never tracked
        if !strength.is_valid() {
            let verdict = if fix.has_valid_coordinates()
                && classify(fix.horizontal_accuracy, &self.config.signal).is_valid()
            {
                WaypointVerdict::Stale
            } else {
                WaypointVerdict::InvalidSignal
            };
            return Some(self.report(fix, verdict));
        }

        // Step 3: first valid fix starts the route
        let previous = match self.session.previous_accepted_fix {
            Some(previous) => previous,
            None => {
                self.session.previous_accepted_fix = Some(*fix);
                return Some(self.report(fix, WaypointVerdict::Origin));
            }
        };

        // Step 4: jitter and plausibility gates
        let distance = fix_distance_m(&previous, fix);
        let envelope =
            self.config.jitter_factor * (previous.horizontal_accuracy + fix.horizontal_accuracy);
        if distance < envelope {
            debug!(
                "Jitter: moved {:.1} m inside {:.1} m accuracy envelope",
                distance, envelope
            );
            return Some(self.report(fix, WaypointVerdict::Jitter));
        }

        if let Some(max_speed) = self.config.max_speed_mps {
            let implausible = match fix.timestamp.duration_since(previous.timestamp) {
                Ok(dt) if !dt.is_zero() => distance / dt.as_secs_f64() > max_speed,
                _ => true,
            };
            if implausible {
                debug!("Implausible jump of {:.1} m rejected", distance);
                return Some(self.report(fix, WaypointVerdict::ImplausibleSpeed));
            }
        }

        self.session.previous_accepted_fix = Some(*fix);
        self.session.total_distance += distance;
        let verdict = self.report(fix, WaypointVerdict::Accepted);
        self.observers
            .notify(&TrackingEvent::DistanceUpdated(self.session.total_distance));
        Some(verdict)
    }

    /// Count the verdict and emit the waypoint.
    fn report(&mut self, fix: &RawFix, verdict: WaypointVerdict) -> WaypointVerdict {
        self.session.stats.record(verdict);
        // Accepted waypoints are numbered after the origin
        let accepted_index = self.session.stats.accepted.saturating_sub(1) as usize;
        let waypoint = Waypoint::from_fix(fix, verdict, accepted_index, self.session.total_distance);

        debug!(
            "Fix ({:.6}, {:.6}) ±{:.1} m: {}",
            fix.latitude,
            fix.longitude,
            fix.horizontal_accuracy,
            verdict.reason()
        );
        self.observers.notify(&TrackingEvent::WaypointReported(waypoint));
        verdict
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn total_distance(&self) -> f64 {
        self.session.total_distance
    }

    pub fn signal_strength(&self) -> SignalStrength {
        self.session.signal_strength
    }

    /// True while a session is active, paused or not.
    pub fn is_running(&self) -> bool {
        self.session.state != TrackingState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.session.state == TrackingState::Paused
    }

    pub fn state(&self) -> TrackingState {
        self.session.state
    }

    pub fn previous_accepted_fix(&self) -> Option<&RawFix> {
        self.session.previous_accepted_fix.as_ref()
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }

    pub fn stats(&self) -> &SessionStats {
        &self.session.stats
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Summary of the current (or last) session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_distance_m: self.session.total_distance,
            accepted_waypoints: self.session.stats.accepted,
            rejected_fixes: self.session.stats.rejected(),
            signal_changes: self.session.stats.signal_changes,
            duration: self.context.now().saturating_sub(self.session.started_at),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors returned by tracker state transitions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingError {
    #[error("Location access not authorized (status: {0})")]
    AuthorizationDenied(AuthorizationStatus),

    #[error("Tracking session already running")]
    AlreadyRunning,

    #[error("Tracking session is not running")]
    NotRunning,

    #[error("Tracking session is not paused")]
    NotPaused,

    #[error("Fix source error: {0}")]
    Source(#[from] SourceError),
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::EventLog;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use distrack_env::{ChannelFixSource, TokioContext};

    type TestTracker = LocationTracker<ChannelFixSource, TokioContext>;

    fn tracker_with(status: AuthorizationStatus) -> (TestTracker, Arc<EventLog>) {
        let (source, _feeder) = ChannelFixSource::new(status);
        let mut tracker = LocationTracker::with_defaults(Arc::new(source), TokioContext::shared());
        let log = EventLog::shared();
        tracker.subscribe(&log, &EventKind::ALL);
        (tracker, log)
    }

    fn running_tracker() -> (TestTracker, Arc<EventLog>) {
        let (mut tracker, log) = tracker_with(AuthorizationStatus::AuthorizedWhenInUse);
        tracker.start().unwrap();
        (tracker, log)
    }

    fn fix(lat: f64, lon: f64, accuracy: f64) -> RawFix {
        RawFix::new(lat, lon, accuracy, SystemTime::now())
    }

    #[test]
    fn test_tracker_creation() {
        let (tracker, log) = tracker_with(AuthorizationStatus::AuthorizedAlways);
        assert_eq!(tracker.state(), TrackingState::Stopped);
        assert!(!tracker.is_running());
        assert_eq!(tracker.total_distance(), 0.0);
        assert_eq!(tracker.signal_strength(), SignalStrength::Invalid);
        assert!(log.is_empty());
    }

    #[test]
    fn test_start_requires_authorization() {
        for status in [
            AuthorizationStatus::NotDetermined,
            AuthorizationStatus::Denied,
            AuthorizationStatus::Restricted,
        ] {
            let (mut tracker, _log) = tracker_with(status);
            assert_eq!(tracker.start(), Err(TrackingError::AuthorizationDenied(status)));
            assert_eq!(tracker.state(), TrackingState::Stopped);
            assert_eq!(tracker.authorization_status(), status);
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let (mut tracker, _log) = running_tracker();
        assert_eq!(tracker.start(), Err(TrackingError::AlreadyRunning));

        tracker.pause().unwrap();
        assert_eq!(tracker.start(), Err(TrackingError::AlreadyRunning));
        assert!(tracker.is_paused());
    }

    #[test]
    fn test_start_surfaces_source_failure() {
        struct BrokenSource;

        #[async_trait]
        impl FixSource for BrokenSource {
            fn authorization_status(&self) -> AuthorizationStatus {
                AuthorizationStatus::AuthorizedAlways
            }
            fn start_updates(&self) -> Result<(), SourceError> {
                Err(SourceError::unavailable("no GPS hardware"))
            }
            fn pause_updates(&self) {}
            fn resume_updates(&self) {}
            fn stop_updates(&self) {}
            async fn recv(&self) -> Option<SourceEvent> {
                None
            }
        }

        let mut tracker = LocationTracker::with_defaults(Arc::new(BrokenSource), TokioContext::shared());
        assert!(matches!(tracker.start(), Err(TrackingError::Source(_))));
        assert_eq!(tracker.state(), TrackingState::Stopped);
    }

    #[test]
    fn test_first_fix_is_origin() {
        let (mut tracker, log) = running_tracker();

        let verdict = tracker.handle_fix(&fix(40.0, -74.0, 120.0));
        assert_eq!(verdict, Some(WaypointVerdict::Origin));
        assert_eq!(tracker.total_distance(), 0.0);
        assert!(tracker.previous_accepted_fix().is_some());

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TrackingEvent::SignalStrengthChanged(SignalStrength::Weak));
        match &events[1] {
            TrackingEvent::WaypointReported(w) => {
                assert!(w.should_be_tracked);
                assert_eq!(w.title, "Start");
            }
            other => panic!("expected waypoint, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_fix_is_reported_untracked() {
        let (mut tracker, log) = running_tracker();

        let verdict = tracker.handle_fix(&fix(40.0, -74.0, -1.0));
        assert_eq!(verdict, Some(WaypointVerdict::InvalidSignal));
        assert!(tracker.previous_accepted_fix().is_none());
        assert_eq!(tracker.total_distance(), 0.0);

        // Signal stays Invalid (the session default), so no change event
        let waypoints = log.waypoints();
        assert_eq!(log.len(), 1);
        assert!(!waypoints[0].should_be_tracked);
        assert_eq!(waypoints[0].title, "Rejected fix");
    }

    #[test]
    fn test_jitter_rejected() {
        let (mut tracker, log) = running_tracker();

        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        let origin = *tracker.previous_accepted_fix().unwrap();
        log.drain();

        // ~4 m apart with 5 m accuracy on both
        let verdict = tracker.handle_fix(&fix(40.00003, -74.00003, 5.0));
        assert_eq!(verdict, Some(WaypointVerdict::Jitter));
        assert_eq!(tracker.total_distance(), 0.0);
        assert_eq!(tracker.previous_accepted_fix(), Some(&origin));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TrackingEvent::WaypointReported(w) if !w.should_be_tracked && w.verdict == WaypointVerdict::Jitter
        ));
    }

    #[test]
    fn test_real_movement_accumulates() {
        let (mut tracker, log) = running_tracker();

        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        log.drain();

        let verdict = tracker.handle_fix(&fix(40.0018, -74.0, 5.0));
        assert_eq!(verdict, Some(WaypointVerdict::Accepted));
        assert_relative_eq!(tracker.total_distance(), 200.0, max_relative = 0.01);
        assert_eq!(tracker.previous_accepted_fix().unwrap().latitude, 40.0018);

        // Waypoint before distance; no signal change (still Strong)
        let events = log.events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            TrackingEvent::WaypointReported(w) => {
                assert!(w.should_be_tracked);
                assert_eq!(w.title, "Waypoint 1");
            }
            other => panic!("expected waypoint, got {:?}", other),
        }
        match events[1] {
            TrackingEvent::DistanceUpdated(d) => assert_relative_eq!(d, tracker.total_distance()),
            ref other => panic!("expected distance update, got {:?}", other),
        }
    }

    #[test]
    fn test_signal_change_precedes_waypoint_even_when_rejected() {
        let (mut tracker, log) = running_tracker();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        log.drain();

        // Accuracy degrades to Medium and the move is inside the envelope
        let verdict = tracker.handle_fix(&fix(40.0001, -74.0, 30.0));
        assert_eq!(verdict, Some(WaypointVerdict::Jitter));

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TrackingEvent::SignalStrengthChanged(SignalStrength::Medium));
        assert!(matches!(events[1], TrackingEvent::WaypointReported(_)));
        assert_eq!(tracker.signal_strength(), SignalStrength::Medium);
    }

    #[test]
    fn test_pause_discards_fixes_silently() {
        let (mut tracker, log) = running_tracker();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        tracker.handle_fix(&fix(40.0018, -74.0, 5.0));

        let distance = tracker.total_distance();
        let previous = *tracker.previous_accepted_fix().unwrap();
        let strength = tracker.signal_strength();
        log.drain();

        tracker.pause().unwrap();
        assert!(tracker.is_running());
        assert!(tracker.is_paused());

        assert_eq!(tracker.handle_fix(&fix(41.0, -74.0, 80.0)), None);
        assert_eq!(tracker.handle_fix(&fix(40.0, -74.0, -1.0)), None);

        tracker.resume().unwrap();
        assert!(log.is_empty());
        assert_eq!(tracker.total_distance(), distance);
        assert_eq!(tracker.previous_accepted_fix(), Some(&previous));
        assert_eq!(tracker.signal_strength(), strength);
        assert_eq!(tracker.stats().discarded_while_paused, 2);
    }

    #[test]
    fn test_pause_and_resume_errors() {
        let (mut tracker, _log) = tracker_with(AuthorizationStatus::AuthorizedAlways);
        assert_eq!(tracker.pause(), Err(TrackingError::NotRunning));
        assert_eq!(tracker.resume(), Err(TrackingError::NotPaused));

        tracker.start().unwrap();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        let distance = tracker.total_distance();

        assert_eq!(tracker.resume(), Err(TrackingError::NotPaused));
        assert_eq!(tracker.state(), TrackingState::Running);
        assert_eq!(tracker.total_distance(), distance);

        tracker.pause().unwrap();
        assert_eq!(tracker.pause(), Err(TrackingError::NotRunning));
    }

    #[test]
    fn test_stop_then_start_resets_session() {
        let (mut tracker, _log) = running_tracker();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        tracker.handle_fix(&fix(40.0018, -74.0, 5.0));

        let summary = tracker.stop().unwrap();
        assert_relative_eq!(summary.total_distance_m, 200.0, max_relative = 0.01);
        assert_eq!(summary.accepted_waypoints, 2);
        assert!(!tracker.is_running());

        // Stopped sessions ignore fixes and reject a second stop
        assert_eq!(tracker.handle_fix(&fix(41.0, -74.0, 5.0)), None);
        assert_eq!(tracker.stop(), Err(TrackingError::NotRunning));

        tracker.start().unwrap();
        assert_eq!(tracker.total_distance(), 0.0);
        assert!(tracker.previous_accepted_fix().is_none());
        assert_eq!(tracker.signal_strength(), SignalStrength::Invalid);
        assert_eq!(tracker.stats(), &SessionStats::default());
    }

    #[test]
    fn test_stale_fix_rejected() {
        let (mut tracker, _log) = running_tracker();
        let old = RawFix::new(40.0, -74.0, 5.0, SystemTime::now() - Duration::from_secs(120));

        assert_eq!(tracker.handle_fix(&old), Some(WaypointVerdict::Stale));
        assert!(tracker.previous_accepted_fix().is_none());
        assert_eq!(tracker.stats().rejected_stale, 1);
    }

    #[test]
    fn test_speed_gate() {
        let (source, _feeder) = ChannelFixSource::new(AuthorizationStatus::AuthorizedAlways);
        let config = TrackingConfig::default().with_max_speed(50.0);
        let mut tracker = LocationTracker::new(Arc::new(source), TokioContext::shared(), config);
        tracker.start().unwrap();

        let t0 = SystemTime::now() - Duration::from_secs(10);
        tracker.handle_fix(&RawFix::new(40.0, -74.0, 5.0, t0));

        // ~2 km in one second
        let jump = RawFix::new(40.018, -74.0, 5.0, t0 + Duration::from_secs(1));
        assert_eq!(tracker.handle_fix(&jump), Some(WaypointVerdict::ImplausibleSpeed));
        assert_eq!(tracker.total_distance(), 0.0);

        // 200 m in ten seconds is fine
        let walk = RawFix::new(40.0018, -74.0, 5.0, t0 + Duration::from_secs(10));
        assert_eq!(tracker.handle_fix(&walk), Some(WaypointVerdict::Accepted));
    }

    #[test]
    fn test_authorization_revoked_stops_session() {
        let (mut tracker, _log) = running_tracker();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));

        assert!(tracker
            .on_authorization_change(AuthorizationStatus::AuthorizedAlways)
            .is_none());
        assert!(tracker.is_running());

        let summary = tracker.on_authorization_change(AuthorizationStatus::Denied);
        assert!(summary.is_some());
        assert!(!tracker.is_running());
        assert_eq!(tracker.authorization_status(), AuthorizationStatus::Denied);

        // Revocation while stopped is just recorded
        assert!(tracker
            .on_authorization_change(AuthorizationStatus::Restricted)
            .is_none());
    }

    #[test]
    fn test_handle_event_dispatch() {
        let (mut tracker, log) = running_tracker();
        tracker.handle_event(SourceEvent::Fix(fix(40.0, -74.0, 5.0)));
        assert_eq!(log.waypoints().len(), 1);

        tracker.handle_event(SourceEvent::AuthorizationChanged(AuthorizationStatus::Denied));
        assert_eq!(tracker.state(), TrackingState::Stopped);
    }

    #[test]
    fn test_kind_filtered_subscription() {
        let (mut tracker, _all) = running_tracker();
        let distances = EventLog::shared();
        tracker.subscribe(&distances, &[EventKind::DistanceUpdated]);

        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        tracker.handle_fix(&fix(40.0018, -74.0, 5.0));

        let events = distances.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TrackingEvent::DistanceUpdated(_)));
    }

    #[test]
    fn test_waypoint_numbering() {
        let (mut tracker, log) = running_tracker();
        tracker.handle_fix(&fix(40.0, -74.0, 5.0));
        tracker.handle_fix(&fix(40.0018, -74.0, 5.0));
        tracker.handle_fix(&fix(40.0018, -74.0, -1.0));
        tracker.handle_fix(&fix(40.0036, -74.0, 5.0));

        let titles: Vec<String> = log.waypoints().into_iter().map(|w| w.title).collect();
        assert_eq!(titles, vec!["Start", "Waypoint 1", "Rejected fix", "Waypoint 2"]);
    }
}
