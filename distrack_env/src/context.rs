//! Clock and task access for distrack trackers.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Where a tracker gets its time from and runs its background work.
///
/// The tracking core never reads the system clock directly, so the same
/// session logic runs on a device and under a scripted virtual clock.
///
/// Implementations:
/// - `TokioContext`: `tokio::time` plus `SystemTime::now`
/// - `SimContext` (in `distrack_sim`): a clock moved by the harness
#[async_trait]
pub trait TrackerContext: Send + Sync + 'static {
    /// Monotonic time since the context was created. Session durations
    /// are measured on this clock.
    fn now(&self) -> Duration;

    /// Wall-clock time. Fix ages are measured against this, since platform
    /// fixes carry wall-clock timestamps.
    fn system_time(&self) -> SystemTime;

    /// Waits for `duration` (or, on a virtual clock, moves it forward).
    async fn sleep(&self, duration: Duration);

    /// Runs `future` in the background; `name` is for diagnostics only.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Seed behind any randomness in this context, 0 if unseeded.
    fn seed(&self) -> u64;
}
