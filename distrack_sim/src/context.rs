//! Virtual clock implementing TrackerContext for deterministic runs.

use async_trait::async_trait;
use distrack_env::TrackerContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::trace;

/// 2024-01-01 00:00:00 UTC, where every simulated session begins.
const DEFAULT_EPOCH_SECS: u64 = 1_704_067_200;

/// A tracker context whose clock only moves when the harness says so.
///
/// Fix timestamps, fix ages and session durations are therefore a pure
/// function of the seed and the scenario script. Clones share one clock.
#[derive(Clone)]
pub struct SimContext {
    seed: u64,

    /// Elapsed virtual nanoseconds, shared between clones
    elapsed_ns: Arc<AtomicU64>,

    /// Wall-clock reading at elapsed zero
    epoch: SystemTime,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(DEFAULT_EPOCH_SECS),
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Moves the wall-clock origin, e.g. to replay a recorded trace.
    pub fn with_epoch(mut self, epoch: SystemTime) -> Self {
        self.epoch = epoch;
        self
    }

    /// Moves the clock forward.
    pub fn advance_time(&self, by: Duration) {
        let ns = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(ns, Ordering::SeqCst);
    }

    /// Elapsed virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.elapsed_ns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackerContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Nobody else moves the clock, so waiting is just advancing it
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        trace!("sim spawn: {}", name);
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero_and_accumulates() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        ctx.advance_time(Duration::from_millis(250));
        assert_eq!(ctx.now(), Duration::from_millis(1250));
        assert_eq!(ctx.time_ns(), 1_250_000_000);
    }

    #[test]
    fn test_wall_clock_tracks_virtual_clock() {
        let ctx = SimContext::new(7);
        let t0 = ctx.system_time();
        assert_eq!(t0, UNIX_EPOCH + Duration::from_secs(DEFAULT_EPOCH_SECS));

        ctx.advance_time(Duration::from_secs(30));
        assert_eq!(ctx.system_time().duration_since(t0).unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_epoch() {
        let epoch = UNIX_EPOCH + Duration::from_secs(1_000);
        let ctx = SimContext::new(1).with_epoch(epoch);
        assert_eq!(ctx.system_time(), epoch);
        assert_eq!(ctx.seed(), 1);
    }

    #[tokio::test]
    async fn test_sleep_moves_clock() {
        let ctx = SimContext::new(1);
        ctx.sleep(Duration::from_secs(2)).await;
        assert_eq!(ctx.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_clones_share_one_clock() {
        let a = SimContext::new(9);
        let b = a.clone();
        a.advance_time(Duration::from_secs(5));
        assert_eq!(b.now(), Duration::from_secs(5));
    }
}
