//! Production implementations backed by Tokio.

use crate::error::SourceError;
use crate::source::FixSource;
use crate::types::{AuthorizationStatus, RawFix, SourceEvent};
use crate::TrackerContext;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;

/// Production context backed by Tokio and the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackerContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

// ============================================================================
// CHANNEL FIX SOURCE
// ============================================================================

const EMISSION_STOPPED: u8 = 0;
const EMISSION_ACTIVE: u8 = 1;
const EMISSION_PAUSED: u8 = 2;

/// Emission state shared between the source and its feeders.
struct SourceShared {
    emission: AtomicU8,

    /// Bumped on every stop; fixes queued under an older value are stale
    generation: AtomicU64,

    authorization: Mutex<AuthorizationStatus>,
}

/// An event as it sits in the channel.
struct Queued {
    /// Emission generation a fix was pushed under (None for permission changes)
    generation: Option<u64>,
    event: SourceEvent,
}

/// A fix source fed through a Tokio channel.
///
/// Platform glue holds a [`FixFeeder`] and pushes fixes from whatever
/// callback thread the platform uses; the tracker side calls `recv()`.
/// Fixes pushed while emission is stopped or paused are dropped at the
/// feeder, and fixes still queued when the source is stopped are never
/// delivered, so a restarted session only sees its own fixes.
/// Authorization changes always pass through.
pub struct ChannelFixSource {
    shared: Arc<SourceShared>,

    /// Receiver for incoming events (behind tokio mutex for async)
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Queued>>,
}

/// The sending half of a [`ChannelFixSource`].
#[derive(Clone)]
pub struct FixFeeder {
    shared: Arc<SourceShared>,
    tx: mpsc::UnboundedSender<Queued>,
}

impl ChannelFixSource {
    /// Creates a source and its feeder with the given initial permission.
    pub fn new(authorization: AuthorizationStatus) -> (Self, FixFeeder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SourceShared {
            emission: AtomicU8::new(EMISSION_STOPPED),
            generation: AtomicU64::new(0),
            authorization: Mutex::new(authorization),
        });

        let source = Self {
            shared: Arc::clone(&shared),
            rx: tokio::sync::Mutex::new(rx),
        };
        (source, FixFeeder { shared, tx })
    }

    /// Returns true while the source is emitting (started and not paused).
    pub fn is_emitting(&self) -> bool {
        self.shared.emission.load(Ordering::SeqCst) == EMISSION_ACTIVE
    }
}

#[async_trait]
impl FixSource for ChannelFixSource {
    fn authorization_status(&self) -> AuthorizationStatus {
        *self
            .shared
            .authorization
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn start_updates(&self) -> Result<(), SourceError> {
        self.shared.emission.store(EMISSION_ACTIVE, Ordering::SeqCst);
        Ok(())
    }

    fn pause_updates(&self) {
        let _ = self.shared.emission.compare_exchange(
            EMISSION_ACTIVE,
            EMISSION_PAUSED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn resume_updates(&self) {
        let _ = self.shared.emission.compare_exchange(
            EMISSION_PAUSED,
            EMISSION_ACTIVE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn stop_updates(&self) {
        // Order matters: a feeder that saw the old generation must also see
        // emission stopped, or its fix is discarded by recv()
        self.shared.emission.store(EMISSION_STOPPED, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn recv(&self) -> Option<SourceEvent> {
        let mut rx = self.rx.lock().await;
        loop {
            let queued = rx.recv().await?;
            match queued.generation {
                Some(g) if g != self.shared.generation.load(Ordering::SeqCst) => continue,
                _ => return Some(queued.event),
            }
        }
    }
}

impl FixFeeder {
    /// Pushes a fix from the platform.
    ///
    /// # Returns
    /// * `Ok(true)` - The fix was queued
    /// * `Ok(false)` - Dropped because emission is stopped or paused
    /// * `Err(SourceError::ChannelClosed)` - The source was dropped
    pub fn push_fix(&self, fix: RawFix) -> Result<bool, SourceError> {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        if self.shared.emission.load(Ordering::SeqCst) != EMISSION_ACTIVE {
            return Ok(false);
        }
        self.tx
            .send(Queued {
                generation: Some(generation),
                event: SourceEvent::Fix(fix),
            })
            .map_err(|_| SourceError::ChannelClosed)?;
        Ok(true)
    }

    /// Records a permission change and forwards it to the tracker.
    pub fn set_authorization(&self, status: AuthorizationStatus) -> Result<(), SourceError> {
        *self
            .shared
            .authorization
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
        self.tx
            .send(Queued {
                generation: None,
                event: SourceEvent::AuthorizationChanged(status),
            })
            .map_err(|_| SourceError::ChannelClosed)
    }
}
