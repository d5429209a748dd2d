//! Fix source abstraction wrapping the platform location service.

use async_trait::async_trait;
use crate::error::SourceError;
use crate::types::{AuthorizationStatus, SourceEvent};

/// Abstraction over a platform location service.
///
/// # Implementations
///
/// - **Production**: `ChannelFixSource`, fed from platform callbacks
/// - **Simulation**: the same channel source, fed by a ground-truth oracle
///
/// # Event Flow
///
/// ```text
/// Platform                  FixSource                  Tracker
///   |                          |                          |
///   |-- callback(fix) -------->|                          |
///   |                          |-- recv() -> Fix -------->|
///   |-- auth changed --------->|                          |
///   |                          |-- recv() -> Auth ------->|
/// ```
///
/// Emission control is synchronous; only `recv()` waits.
#[async_trait]
pub trait FixSource: Send + Sync + 'static {
    /// Returns the latest permission state known to the platform.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Begins emitting fixes.
    ///
    /// # Returns
    /// * `Ok(())` - The source is emitting
    /// * `Err(SourceError::Unavailable)` - The platform refused to start
    fn start_updates(&self) -> Result<(), SourceError>;

    /// Temporarily suspends emission. Sources may keep emitting; the
    /// tracker discards fixes while paused either way.
    fn pause_updates(&self);

    /// Restarts emission after `pause_updates`.
    fn resume_updates(&self);

    /// Stops emitting fixes. Idempotent.
    fn stop_updates(&self);

    /// Receives the next event from the source.
    ///
    /// # Returns
    /// * `Some(event)` - A fix or authorization change, in arrival order
    /// * `None` - The source was shut down
    async fn recv(&self) -> Option<SourceEvent>;
}
