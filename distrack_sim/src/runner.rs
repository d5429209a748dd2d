//! Scenario runner - drives a tracker through scripted GPS conditions.

use crate::context::SimContext;
use crate::exporter::{GeoPosition, SimEvent, SimExport, SimFrame};
use crate::oracle::{NoiseProfile, Oracle};
use crate::scenarios::ScenarioId;

use distrack_core::{
    EventKind, EventLog, LocationTracker, SessionStats, TrackingConfig, TrackingError,
    TrackingEvent, TrackingState,
};
use distrack_env::{AuthorizationStatus, ChannelFixSource, FixFeeder, SourceEvent, TrackerContext};
use nalgebra::Vector2;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// WGS84 origin of every scenario's local frame.
const ORIGIN: (f64, f64) = (40.7128, -74.0060);

const WALK_SPEED_MPS: f64 = 1.4;
const DRIVE_SPEED_MPS: f64 = 15.0;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Fixes generated by the oracle (delivered or not)
    pub fixes_sent: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Distance the tracker accumulated
    pub tracked_distance_m: f64,

    /// Distance the tracker should have accumulated
    pub truth_distance_m: f64,

    pub final_state: TrackingState,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Tracker counters at the end of the run
    pub stats: SessionStats,
}

impl ScenarioResult {
    /// Relative distance error, in percent of the true distance.
    pub fn distance_error_pct(&self) -> f64 {
        if self.truth_distance_m <= f64::EPSILON {
            return 0.0;
        }
        (self.tracked_distance_m - self.truth_distance_m).abs() / self.truth_distance_m * 100.0
    }
}

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioFailure {
    #[error("tracker refused to start: {0}")]
    Start(#[from] TrackingError),

    #[error("tracked {tracked:.1} m vs truth {truth:.1} m, beyond {tolerance:.1} m tolerance")]
    Distance {
        tracked: f64,
        truth: f64,
        tolerance: f64,
    },

    #[error("{0}")]
    Assertion(String),
}

/// Checks the tracked distance against truth within `rel * truth + slack_m`.
///
/// The slack covers the tail of the route after the last accepted waypoint,
/// which is at most one accuracy envelope long.
fn check_distance(tracked: f64, truth: f64, rel: f64, slack_m: f64) -> Result<(), ScenarioFailure> {
    let tolerance = rel * truth + slack_m;
    if (tracked - truth).abs() <= tolerance {
        Ok(())
    } else {
        Err(ScenarioFailure::Distance {
            tracked,
            truth,
            tolerance,
        })
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioFailure> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioFailure::Assertion(message()))
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// One tracker wired to an oracle on a virtual clock.
struct Harness {
    context: Arc<SimContext>,
    feeder: FixFeeder,
    tracker: LocationTracker<ChannelFixSource, SimContext>,
    log: Arc<EventLog>,
    oracle: Oracle,
    dt: f64,
    fixes_sent: u64,
    export: Option<SimExport>,
    pending_events: Vec<SimEvent>,
}

impl Harness {
    fn start(
        runner: &ScenarioRunner,
        scenario: ScenarioId,
        record: bool,
    ) -> Result<Self, ScenarioFailure> {
        let context = SimContext::shared(runner.seed);
        let physics_seed = runner.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let (source, feeder) = ChannelFixSource::new(AuthorizationStatus::AuthorizedWhenInUse);
        let mut tracker = LocationTracker::new(Arc::new(source), context.clone(), runner.config.clone());
        let log = EventLog::shared();
        tracker.subscribe(&log, &EventKind::ALL);
        tracker.start()?;

        Ok(Self {
            context,
            feeder,
            tracker,
            log,
            oracle: Oracle::new(physics_seed, ORIGIN.0, ORIGIN.1),
            dt: 1.0 / runner.fix_rate_hz.max(1) as f64,
            fixes_sent: 0,
            export: record.then(|| SimExport::new(scenario.name(), runner.seed)),
            pending_events: Vec::new(),
        })
    }

    /// Advances one fix interval and feeds the resulting fix to the tracker.
    ///
    /// Returns the events the tracker emitted for that fix.
    fn tick(&mut self) -> Vec<TrackingEvent> {
        self.oracle.step(self.dt);
        self.context.advance_time(Duration::from_secs_f64(self.dt));

        let fix = self.oracle.generate_fix(self.context.system_time());
        self.fixes_sent += 1;
        let verdict = self.tracker.handle_fix(&fix);
        let events = self.log.drain();

        if let Some(verdict) = verdict {
            debug!(
                "  t={:.0}s | ±{:.1} m | {} | {:.1} m",
                self.oracle.time(),
                fix.horizontal_accuracy,
                verdict.reason(),
                self.tracker.total_distance()
            );
        }

        if let Some(export) = self.export.as_mut() {
            let waypoint = events.iter().find_map(|e| match e {
                TrackingEvent::WaypointReported(w) => Some(w.clone()),
                _ => None,
            });
            export.add_frame(SimFrame {
                time_sec: self.oracle.time(),
                truth: GeoPosition::new(self.oracle.truth_latlon()),
                fix: GeoPosition {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                },
                reported_accuracy_m: fix.horizontal_accuracy,
                waypoint,
                total_distance_m: self.tracker.total_distance(),
                signal: self.tracker.signal_strength(),
                state: self.tracker.state(),
                events: std::mem::take(&mut self.pending_events),
            });
        }

        events
    }

    fn note(&mut self, event: SimEvent) {
        if self.export.is_some() {
            self.pending_events.push(event);
        }
    }

    /// Delivers a permission change the way the platform would.
    fn change_authorization(&mut self, status: AuthorizationStatus) {
        if let Err(e) = self.feeder.set_authorization(status) {
            warn!("Source rejected authorization change: {}", e);
        }
        self.tracker
            .handle_event(SourceEvent::AuthorizationChanged(status));
        self.note(SimEvent::warn(format!("authorization changed to {}", status)));
    }

    fn tracked(&self) -> f64 {
        self.tracker.total_distance()
    }
}

/// Splits `ticks` into the boundaries of its middle third.
fn middle_third(ticks: u64) -> std::ops::Range<u64> {
    ticks / 3..(2 * ticks) / 3
}

// ============================================================================
// RUNNER
// ============================================================================

/// Runs tracking scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Fix rate in Hz
    fix_rate_hz: u32,

    /// Duration in seconds
    duration_secs: f64,

    /// Tracker configuration under test
    config: TrackingConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fix_rate_hz: 1,
            duration_secs: 120.0,
            config: TrackingConfig::default(),
        }
    }

    /// Sets the fix rate.
    pub fn with_fix_rate(mut self, hz: u32) -> Self {
        self.fix_rate_hz = hz;
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Sets the tracker configuration.
    pub fn with_config(mut self, config: TrackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn total_ticks(&self) -> u64 {
        ((self.duration_secs * self.fix_rate_hz as f64) as u64).max(1)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).0
    }

    /// Runs a scenario and also returns every frame for export.
    pub fn run_recorded(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true);
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.tracked_distance_m, result.truth_distance_m);
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut harness = match Harness::start(self, scenario, record) {
            Ok(harness) => harness,
            Err(failure) => {
                warn!("✗ {} could not start: {}", scenario.name(), failure);
                let result = ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    fixes_sent: 0,
                    final_time_secs: 0.0,
                    tracked_distance_m: 0.0,
                    truth_distance_m: 0.0,
                    final_state: TrackingState::Stopped,
                    failure_reason: Some(failure.to_string()),
                    stats: SessionStats::default(),
                };
                return (result, None);
            }
        };

        let ticks = self.total_ticks();
        let (truth, outcome) = match scenario {
            ScenarioId::Stationary => self.run_stationary(&mut harness, ticks),
            ScenarioId::Walk => self.run_walk(&mut harness, ticks),
            ScenarioId::Drive => self.run_drive(&mut harness, ticks),
            ScenarioId::UrbanCanyon => self.run_urban_canyon(&mut harness, ticks),
            ScenarioId::Tunnel => self.run_tunnel(&mut harness, ticks),
            ScenarioId::PauseResume => self.run_pause_resume(&mut harness, ticks),
            ScenarioId::PermissionRevoked => self.run_permission_revoked(&mut harness, ticks),
        };

        let passed = outcome.is_ok();
        let tracked = harness.tracked();
        if passed {
            info!(
                "✓ {} complete: tracked {:.1} m, truth {:.1} m, {} accepted, {} rejected",
                scenario.name(),
                tracked,
                truth,
                harness.tracker.stats().accepted,
                harness.tracker.stats().rejected()
            );
        } else if let Err(failure) = &outcome {
            warn!("✗ {} failed: {}", scenario.name(), failure);
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            fixes_sent: harness.fixes_sent,
            final_time_secs: harness.oracle.time(),
            tracked_distance_m: tracked,
            truth_distance_m: truth,
            final_state: harness.tracker.state(),
            failure_reason: outcome.err().map(|f| f.to_string()),
            stats: harness.tracker.stats().clone(),
        };
        (result, harness.export)
    }

    /// SIM-001: Stationary device, open sky then an urban canyon.
    ///
    /// Every displacement is receiver noise inside the accuracy envelope,
    /// so the route must stay essentially empty.
    fn run_stationary(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-001: Stationary - jitter suppression");
        h.oracle.set_velocity(Vector2::zeros());

        for tick in 0..ticks {
            let noise = if tick < ticks / 2 {
                NoiseProfile::OPEN_SKY
            } else {
                NoiseProfile::URBAN_CANYON
            };
            h.oracle.set_noise(noise);
            h.tick();
        }

        let tracked = h.tracked();
        let outcome = ensure(tracked <= 10.0, || {
            format!("stationary device accumulated {:.1} m", tracked)
        })
        .and_then(|_| {
            ensure(h.tracker.stats().accepted >= 1, || "no origin fix accepted".to_string())
        });
        (0.0, outcome)
    }

    /// SIM-002: Straight walk under open sky.
    fn run_walk(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-002: Walk - pedestrian distance");
        let heading = Vector2::new(1.0, 1.0).normalize();
        h.oracle.set_velocity(heading * WALK_SPEED_MPS);
        h.oracle.set_noise(NoiseProfile::OPEN_SKY);

        for _ in 0..ticks {
            h.tick();
        }

        let truth = h.oracle.truth_distance();
        (truth, check_distance(h.tracked(), truth, 0.15, 15.0))
    }

    /// SIM-003: Straight drive under open sky.
    fn run_drive(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-003: Drive - vehicle distance");
        h.oracle.set_velocity(Vector2::new(DRIVE_SPEED_MPS, 0.0));
        h.oracle.set_noise(NoiseProfile::HIGHWAY);

        for _ in 0..ticks {
            h.tick();
        }

        let truth = h.oracle.truth_distance();
        (truth, check_distance(h.tracked(), truth, 0.05, 35.0))
    }

    /// SIM-004: Walk whose middle third is degraded to Medium signal.
    fn run_urban_canyon(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-004: UrbanCanyon - degraded accuracy mid-route");
        h.oracle.set_velocity(Vector2::new(0.0, WALK_SPEED_MPS));
        let canyon = middle_third(ticks);

        for tick in 0..ticks {
            let noise = if canyon.contains(&tick) {
                NoiseProfile::URBAN_CANYON
            } else {
                NoiseProfile::OPEN_SKY
            };
            if noise != h.oracle.noise() {
                h.note(SimEvent::info(format!(
                    "receiver now reports ±{:.0} m",
                    noise.reported_accuracy_m
                )));
            }
            h.oracle.set_noise(noise);
            h.tick();
        }

        let truth = h.oracle.truth_distance();
        let changes = h.tracker.stats().signal_changes;
        let outcome = ensure(changes >= 2, || {
            format!("expected signal to change at least twice, saw {}", changes)
        })
        .and_then(|_| check_distance(h.tracked(), truth, 0.15, 30.0));
        (truth, outcome)
    }

    /// SIM-005: Drive losing the fix entirely for its middle third.
    fn run_tunnel(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-005: Tunnel - total signal loss");
        h.oracle.set_velocity(Vector2::new(DRIVE_SPEED_MPS, 0.0));
        let tunnel = middle_third(ticks);
        let mut saw_invalid_signal = false;

        for tick in 0..ticks {
            let noise = if tunnel.contains(&tick) {
                NoiseProfile::NO_FIX
            } else {
                NoiseProfile::HIGHWAY
            };
            h.oracle.set_noise(noise);
            let events = h.tick();
            saw_invalid_signal |= events.iter().any(|e| {
                matches!(e, TrackingEvent::SignalStrengthChanged(s) if !s.is_valid())
            });
        }

        let truth = h.oracle.truth_distance();
        let rejected_invalid = h.tracker.stats().rejected_invalid;
        let outcome = ensure(tunnel.is_empty() || rejected_invalid > 0, || {
            "no fixes rejected inside the tunnel".to_string()
        })
        .and_then(|_| {
            ensure(tunnel.is_empty() || saw_invalid_signal, || {
                "signal never reported invalid inside the tunnel".to_string()
            })
        })
        .and_then(|_| check_distance(h.tracked(), truth, 0.05, 35.0));
        (truth, outcome)
    }

    /// SIM-006: Walk paused for its middle third.
    ///
    /// Paused fixes are discarded unseen; the route bridges the pause with
    /// one straight segment, which on a straight walk equals the truth.
    fn run_pause_resume(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-006: PauseResume - paused fixes are discarded");
        h.oracle.set_velocity(Vector2::new(WALK_SPEED_MPS, 0.0));
        h.oracle.set_noise(NoiseProfile::OPEN_SKY);
        let paused = middle_third(ticks);
        let mut events_while_paused = 0usize;
        let mut transition_error = None;

        for tick in 0..ticks {
            if tick == paused.start && !paused.is_empty() {
                if let Err(e) = h.tracker.pause() {
                    transition_error.get_or_insert(e);
                }
                h.note(SimEvent::info("paused"));
            } else if tick == paused.end && !paused.is_empty() {
                if let Err(e) = h.tracker.resume() {
                    transition_error.get_or_insert(e);
                }
                h.note(SimEvent::info("resumed"));
            }

            let events = h.tick();
            if paused.contains(&tick) {
                events_while_paused += events.len();
            }
        }

        let truth = h.oracle.truth_distance();
        let expected_discards = paused.end - paused.start;
        let discarded = h.tracker.stats().discarded_while_paused;
        let outcome = match transition_error {
            Some(e) => Err(ScenarioFailure::Assertion(format!("pause/resume failed: {}", e))),
            None => Ok(()),
        }
        .and_then(|_| {
            ensure(events_while_paused == 0, || {
                format!("{} events emitted while paused", events_while_paused)
            })
        })
        .and_then(|_| {
            ensure(discarded == expected_discards, || {
                format!("discarded {} paused fixes, expected {}", discarded, expected_discards)
            })
        })
        .and_then(|_| check_distance(h.tracked(), truth, 0.15, 15.0));
        (truth, outcome)
    }

    /// SIM-007: Location permission revoked halfway through a walk.
    ///
    /// The session stops itself; the route keeps what was walked before
    /// revocation and nothing after.
    fn run_permission_revoked(&self, h: &mut Harness, ticks: u64) -> (f64, Result<(), ScenarioFailure>) {
        info!("SIM-007: PermissionRevoked - session stops on revocation");
        h.oracle.set_velocity(Vector2::new(0.0, -WALK_SPEED_MPS));
        h.oracle.set_noise(NoiseProfile::OPEN_SKY);
        let revoke_at = ticks / 2;
        let mut truth_at_revocation = None;
        let mut events_after_revocation = 0usize;

        for tick in 0..ticks {
            if tick == revoke_at {
                truth_at_revocation = Some(h.oracle.truth_distance());
                h.change_authorization(AuthorizationStatus::Denied);
            }
            let events = h.tick();
            if truth_at_revocation.is_some() {
                events_after_revocation += events.len();
            }
        }

        let truth = truth_at_revocation.unwrap_or_else(|| h.oracle.truth_distance());
        let state = h.tracker.state();
        let outcome = ensure(state == TrackingState::Stopped, || {
            format!("tracker still {:?} after revocation", state)
        })
        .and_then(|_| {
            ensure(events_after_revocation == 0, || {
                format!("{} events emitted after revocation", events_after_revocation)
            })
        })
        .and_then(|_| check_distance(h.tracked(), truth, 0.15, 15.0));
        (truth, outcome)
    }
}
