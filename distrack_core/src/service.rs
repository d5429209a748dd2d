//! Tracking Service - drives a LocationTracker from a fix source.
//!
//! The tracker itself is a plain `&mut self` state machine. This module
//! wraps it in a shared handle so that:
//! - fixes arriving on the source's task are handled one at a time, in
//!   arrival order
//! - control calls (`pause()`, `stop()`, ...) from other threads take the
//!   same lock and never interleave with a half-handled fix
//! - listeners are called after the lock is released, so a listener may
//!   read `total_distance()` or call `stop()` from its callback
//!
//! Listeners that do real work (UI updates, storage) should prefer a
//! [`ChannelListener`](crate::observer::ChannelListener) and consume events
//! on their own task; the pump waits for every callback to return.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   recv()    ┌──────────────────────────────┐
//! │  FixSource   │────────────►│        TrackingService       │
//! │ (platform or │             │  Arc<Mutex<LocationTracker>> │──► listeners
//! │  simulated)  │◄────────────│                              │
//! └──────────────┘  start/stop └──────────────────────────────┘
//!                                        ▲
//!                                        │ start/pause/resume/stop
//!                                     UI thread
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let (source, feeder) = ChannelFixSource::new(status);
//! let service = TrackingService::new(Arc::new(source), TokioContext::shared(), config);
//! service.start()?;
//! service.spawn_pump();
//! ```

use crate::config::TrackingConfig;
use crate::observer::{
    EventKind, EventLog, ListenerId, ObserverRegistry, TrackingEvent, TrackingListener,
};
use crate::signal::SignalStrength;
use crate::tracking::{LocationTracker, SessionSummary, TrackingError, TrackingState};
use distrack_env::{FixSource, TrackerContext};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Shared, serialized handle to a LocationTracker.
///
/// Cloning the service clones the handle; all clones drive the same session.
pub struct TrackingService<S, C>
where
    S: FixSource,
    C: TrackerContext,
{
    source: Arc<S>,
    context: Arc<C>,
    tracker: Arc<Mutex<LocationTracker<S, C>>>,

    /// Events raised under the lock, waiting to be delivered
    outbox: Arc<EventLog>,

    observers: Arc<Mutex<ObserverRegistry>>,
}

impl<S, C> Clone for TrackingService<S, C>
where
    S: FixSource,
    C: TrackerContext,
{
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            context: Arc::clone(&self.context),
            tracker: Arc::clone(&self.tracker),
            outbox: Arc::clone(&self.outbox),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<S, C> TrackingService<S, C>
where
    S: FixSource,
    C: TrackerContext,
{
    /// Creates a service around a new tracker.
    pub fn new(source: Arc<S>, context: Arc<C>, config: TrackingConfig) -> Self {
        let mut tracker = LocationTracker::new(Arc::clone(&source), Arc::clone(&context), config);
        let outbox = EventLog::shared();
        tracker.subscribe(&outbox, &EventKind::ALL);
        Self {
            source,
            context,
            tracker: Arc::new(Mutex::new(tracker)),
            outbox,
            observers: Arc::new(Mutex::new(ObserverRegistry::new())),
        }
    }

    /// The serialization point. A panicking listener does not wedge the
    /// tracker; the state it left behind is still consistent per fix.
    fn lock(&self) -> MutexGuard<'_, LocationTracker<S, C>> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a closure with exclusive access to the tracker, then delivers
    /// whatever events it raised.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&mut LocationTracker<S, C>) -> R) -> R {
        let (result, events) = {
            let mut tracker = self.lock();
            let result = f(&mut tracker);
            (result, self.outbox.drain())
        };
        self.deliver(&events);
        result
    }

    /// Hands events to service listeners. Must be called without the
    /// tracker lock held.
    fn deliver(&self, events: &[TrackingEvent]) {
        for event in events {
            let listeners = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners_for(event.kind());
            for listener in listeners {
                listener.on_event(event);
            }
        }
    }

    pub fn start(&self) -> Result<(), TrackingError> {
        self.with_tracker(|tracker| tracker.start())
    }

    pub fn pause(&self) -> Result<(), TrackingError> {
        self.with_tracker(|tracker| tracker.pause())
    }

    pub fn resume(&self) -> Result<(), TrackingError> {
        self.with_tracker(|tracker| tracker.resume())
    }

    pub fn stop(&self) -> Result<SessionSummary, TrackingError> {
        self.with_tracker(|tracker| tracker.stop())
    }

    pub fn subscribe<L>(&self, listener: &Arc<L>, kinds: &[EventKind]) -> ListenerId
    where
        L: TrackingListener + 'static,
    {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(listener, kinds)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe(id)
    }

    pub fn total_distance(&self) -> f64 {
        self.lock().total_distance()
    }

    pub fn signal_strength(&self) -> SignalStrength {
        self.lock().signal_strength()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn state(&self) -> TrackingState {
        self.lock().state()
    }

    /// Pumps source events into the tracker until the source shuts down.
    ///
    /// Returns the number of events handled.
    pub async fn run(&self) -> u64 {
        let mut handled = 0;
        while let Some(event) = self.source.recv().await {
            self.with_tracker(|tracker| tracker.handle_event(event));
            handled += 1;
        }
        debug!("Fix source closed after {} events", handled);
        handled
    }

    /// Runs [`Self::run`] as a background task on the context.
    pub fn spawn_pump(&self) {
        let service = self.clone();
        self.context.spawn("fix-pump", async move {
            service.run().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChannelListener, EventLog, TrackingEvent};
    use approx::assert_relative_eq;
    use distrack_env::{AuthorizationStatus, ChannelFixSource, RawFix, TokioContext};
    use std::time::SystemTime;

    fn service_with_feeder() -> (
        TrackingService<ChannelFixSource, TokioContext>,
        distrack_env::FixFeeder,
    ) {
        let (source, feeder) = ChannelFixSource::new(AuthorizationStatus::AuthorizedWhenInUse);
        let service = TrackingService::new(
            Arc::new(source),
            TokioContext::shared(),
            TrackingConfig::default(),
        );
        (service, feeder)
    }

    fn fix(lat: f64) -> RawFix {
        RawFix::new(lat, -74.0, 5.0, SystemTime::now())
    }

    #[tokio::test]
    async fn test_run_pumps_events_in_order() {
        let (service, feeder) = service_with_feeder();
        let log = EventLog::shared();
        service.subscribe(&log, &[EventKind::DistanceUpdated]);
        service.start().unwrap();

        for i in 0..5 {
            assert!(feeder.push_fix(fix(40.0 + i as f64 * 0.0018)).unwrap());
        }
        drop(feeder);

        assert_eq!(service.run().await, 5);
        assert_relative_eq!(service.total_distance(), 800.0, max_relative = 0.01);

        // Distance updates arrive non-decreasing, in fix order
        let distances: Vec<f64> = log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TrackingEvent::DistanceUpdated(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(distances.len(), 4);
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_restart_ignores_fix_queued_before_stop() {
        let (service, feeder) = service_with_feeder();
        service.start().unwrap();
        feeder.push_fix(fix(41.0)).unwrap();

        // Stopped before the pump ever saw the fix
        service.stop().unwrap();
        service.start().unwrap();
        feeder.push_fix(fix(40.0)).unwrap();
        drop(feeder);

        assert_eq!(service.run().await, 1);
        assert_eq!(service.total_distance(), 0.0);
        let previous = service.with_tracker(|t| t.session().previous_accepted_fix);
        assert_eq!(previous.map(|f| f.latitude), Some(40.0));
    }

    #[tokio::test]
    async fn test_listener_may_query_service_from_callback() {
        let (service, feeder) = service_with_feeder();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let listener = {
            let service = service.clone();
            let seen = Arc::clone(&seen);
            Arc::new(move |event: &TrackingEvent| {
                if let TrackingEvent::DistanceUpdated(d) = event {
                    // Re-enters the service; must not deadlock
                    seen.lock().unwrap().push((*d, service.total_distance()));
                }
            })
        };
        service.subscribe(&listener, &[EventKind::DistanceUpdated]);
        service.start().unwrap();

        feeder.push_fix(fix(40.0)).unwrap();
        feeder.push_fix(fix(40.0018)).unwrap();
        drop(feeder);
        service.run().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, seen[0].1);
    }

    #[tokio::test]
    async fn test_fixes_dropped_while_paused() {
        let (service, feeder) = service_with_feeder();
        service.start().unwrap();
        feeder.push_fix(fix(40.0)).unwrap();

        service.pause().unwrap();
        assert!(!feeder.push_fix(fix(40.0018)).unwrap());

        service.resume().unwrap();
        feeder.push_fix(fix(40.0036)).unwrap();
        drop(feeder);

        assert_eq!(service.run().await, 2);
        assert_relative_eq!(service.total_distance(), 400.0, max_relative = 0.01);
    }

    #[tokio::test]
    async fn test_revocation_through_source_stops_session() {
        let (service, feeder) = service_with_feeder();
        service.start().unwrap();
        feeder.push_fix(fix(40.0)).unwrap();
        feeder.set_authorization(AuthorizationStatus::Denied).unwrap();
        drop(feeder);

        service.run().await;
        assert_eq!(service.state(), TrackingState::Stopped);
        assert_eq!(
            service.start(),
            Err(TrackingError::AuthorizationDenied(AuthorizationStatus::Denied))
        );
    }

    #[tokio::test]
    async fn test_background_pump_with_channel_listener() {
        let (service, feeder) = service_with_feeder();
        let (listener, mut rx) = ChannelListener::new();
        service.subscribe(&listener, &[EventKind::DistanceUpdated]);
        service.start().unwrap();
        service.spawn_pump();

        // Platform callbacks on another thread
        let producer = std::thread::spawn(move || {
            feeder.push_fix(fix(40.0)).unwrap();
            feeder.push_fix(fix(40.0018)).unwrap();
        });
        producer.join().unwrap();

        match rx.recv().await {
            Some(TrackingEvent::DistanceUpdated(d)) => assert_relative_eq!(d, 200.0, max_relative = 0.01),
            other => panic!("expected distance update, got {:?}", other),
        }

        let summary = service.stop().unwrap();
        assert_eq!(summary.accepted_waypoints, 2);
    }
}
