//! Listener registry that fans tracking events out to observers.
//!
//! Listeners subscribe to the event kinds they care about and are held
//! weakly: dropping the last strong reference to a listener unsubscribes it
//! on the next delivery. Events reach listeners synchronously, in
//! registration order.

use crate::signal::SignalStrength;
use crate::tracking::Waypoint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// EVENTS
// ============================================================================

/// The kinds of notification a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    DistanceUpdated,
    SignalStrengthChanged,
    WaypointReported,
}

impl EventKind {
    /// Every event kind, for listeners that want everything.
    pub const ALL: [EventKind; 3] = [
        EventKind::DistanceUpdated,
        EventKind::SignalStrengthChanged,
        EventKind::WaypointReported,
    ];
}

/// A notification raised by the tracker while handling a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackingEvent {
    /// Total session distance in meters after an accepted waypoint
    DistanceUpdated(f64),

    /// The classified signal level changed
    SignalStrengthChanged(SignalStrength),

    /// A fix was reported, tracked or not
    WaypointReported(Waypoint),
}

impl TrackingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackingEvent::DistanceUpdated(_) => EventKind::DistanceUpdated,
            TrackingEvent::SignalStrengthChanged(_) => EventKind::SignalStrengthChanged,
            TrackingEvent::WaypointReported(_) => EventKind::WaypointReported,
        }
    }
}

/// Something that wants to hear about tracking events.
///
/// Listeners subscribed directly on a `LocationTracker` run while it is
/// mutably borrowed and must not call back into it. Listeners subscribed
/// through `TrackingService` run after its lock is released and may query
/// or control the service.
pub trait TrackingListener: Send + Sync {
    fn on_event(&self, event: &TrackingEvent);
}

impl<F> TrackingListener for F
where
    F: Fn(&TrackingEvent) + Send + Sync,
{
    fn on_event(&self, event: &TrackingEvent) {
        self(event)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

struct Registration {
    id: ListenerId,
    kinds: HashSet<EventKind>,
    listener: Weak<dyn TrackingListener>,
}

/// Ordered set of weakly held listeners.
#[derive(Default)]
pub struct ObserverRegistry {
    registrations: Vec<Registration>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to the given event kinds.
    ///
    /// The registry keeps only a weak reference; the caller owns the
    /// listener's lifetime.
    pub fn subscribe<L>(&mut self, listener: &Arc<L>, kinds: &[EventKind]) -> ListenerId
    where
        L: TrackingListener + 'static,
    {
        let strong: Arc<dyn TrackingListener> = listener.clone();
        let id = ListenerId::new();
        self.registrations.push(Registration {
            id,
            kinds: kinds.iter().copied().collect(),
            listener: Arc::downgrade(&strong),
        });
        id
    }

    /// Removes a subscription. Returns false if it was not registered
    /// (already removed, or pruned after the listener was dropped).
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    /// Number of subscriptions whose listener is still alive.
    pub fn listener_count(&self) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.listener.strong_count() > 0)
            .count()
    }

    /// Delivers an event to every live listener subscribed to its kind.
    ///
    /// Dead listeners are pruned. Returns the number of listeners reached.
    pub fn notify(&mut self, event: &TrackingEvent) -> usize {
        let listeners = self.listeners_for(event.kind());
        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }

    /// Live listeners subscribed to `kind`, in registration order.
    ///
    /// Dead listeners are pruned. The returned handles keep the listeners
    /// alive until dropped, so a caller can deliver without holding the
    /// registry.
    pub fn listeners_for(&mut self, kind: EventKind) -> Vec<Arc<dyn TrackingListener>> {
        let mut live = Vec::new();
        self.registrations
            .retain(|registration| match registration.listener.upgrade() {
                Some(listener) => {
                    if registration.kinds.contains(&kind) {
                        live.push(listener);
                    }
                    true
                }
                None => false,
            });
        live
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

// ============================================================================
// STOCK LISTENERS
// ============================================================================

/// Listener that records every event it receives.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TrackingEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<TrackingEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded waypoints, in order.
    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TrackingEvent::WaypointReported(w) => Some(w),
                _ => None,
            })
            .collect()
    }
}

impl TrackingListener for EventLog {
    fn on_event(&self, event: &TrackingEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Listener that forwards events into a Tokio channel.
///
/// Lets an observer consume events on its own task instead of inside the
/// tracker's lock. Send failures (receiver gone) are ignored.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<TrackingEvent>,
}

impl ChannelListener {
    /// Creates the listener and the receiving end of its channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TrackingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl TrackingListener for ChannelListener {
    fn on_event(&self, event: &TrackingEvent) {
        let _ = self.tx.send(event.clone());
    }
}
