//! distrack Deterministic Simulation Harness
//!
//! Runs the real `LocationTracker` against synthetic GPS conditions where
//! the ground truth is known.
//!
//! # Core Principle: Everything From One Seed
//!
//! All sources of non-determinism are controlled:
//! - **Time**: Virtual clock advances only when the harness steps it
//! - **Sensor**: Fix noise and reported accuracy drawn from a seeded RNG
//! - **Platform**: Permission changes scripted per scenario
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ScenarioRunner                │
//! │  ┌────────────┐   fixes   ┌───────────────┐  │
//! │  │   Oracle   │──────────►│LocationTracker│  │
//! │  │ (truth +   │           │ (SimContext)  │  │
//! │  │   noise)   │           └───────┬───────┘  │
//! │  └────────────┘                   │ events   │
//! │                            ┌──────▼──────┐   │
//! │                            │  EventLog   │   │
//! │                            └─────────────┘   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use distrack_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Walk);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{GeoPosition, SimEvent, SimExport, SimFrame};
pub use oracle::{GroundTruthDevice, NoiseProfile, Oracle};
pub use runner::{ScenarioFailure, ScenarioResult, ScenarioRunner};
