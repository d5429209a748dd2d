//! distrack Environment Abstraction Layer
//!
//! This crate provides the boundary between the tracking core and the
//! outside world, so the same core runs in **Production** (platform location
//! service, wall clock) and **Simulation** (synthetic fixes, virtual clock).
//!
//! We intercept everything the core would otherwise reach for directly:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Location fixes and permission changes (`FixSource::recv()`)
//! - Emission control (`start_updates()`, `pause_updates()`, ...)
//!
//! # Example
//!
//! ```ignore
//! use distrack_env::{AuthorizationStatus, ChannelFixSource, FixSource};
//!
//! let (source, feeder) = ChannelFixSource::new(AuthorizationStatus::AuthorizedWhenInUse);
//!
//! // Platform callback thread
//! feeder.push_fix(fix)?;
//!
//! // Tracker task
//! while let Some(event) = source.recv().await {
//!     tracker.handle_event(event);
//! }
//! ```

mod context;
mod source;
mod types;
mod error;
mod tokio_impl;

pub use context::TrackerContext;
pub use source::FixSource;
pub use types::{AuthorizationStatus, RawFix, SourceEvent};
pub use error::SourceError;
pub use tokio_impl::{ChannelFixSource, FixFeeder, TokioContext};
