//! End-to-end scenario runs across several seeds.

use distrack_core::{TrackingConfig, TrackingState};
use distrack_sim::scenarios::ScenarioId;
use distrack_sim::ScenarioRunner;
use proptest::prelude::*;

#[test]
fn all_scenarios_pass_for_fixed_seeds() {
    for seed in [1u64, 42, 1337, 0xdead_beef] {
        let runner = ScenarioRunner::new(seed);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} seed={} failed: {:?}",
                scenario,
                seed,
                result.failure_reason
            );
        }
    }
}

#[test]
fn tunnel_rejects_invalid_fixes_and_recovers() {
    let result = ScenarioRunner::new(5).run(ScenarioId::Tunnel);

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.stats.rejected_invalid, 40);
    // Invalid -> Strong -> Invalid -> Strong
    assert_eq!(result.stats.signal_changes, 3);
}

#[test]
fn urban_canyon_reports_medium_signal() {
    let result = ScenarioRunner::new(11).run(ScenarioId::UrbanCanyon);

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.stats.signal_changes, 3);
    assert_eq!(result.stats.rejected_invalid, 0);
}

#[test]
fn revoked_session_keeps_distance_walked_before() {
    let result = ScenarioRunner::new(21).run(ScenarioId::PermissionRevoked);

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.final_state, TrackingState::Stopped);
    // Truth is measured at revocation, halfway through the walk
    assert!(result.truth_distance_m < 90.0);
    assert!(result.tracked_distance_m <= result.truth_distance_m + 5.0);
}

#[test]
fn speed_gate_does_not_reject_a_drive() {
    let config = TrackingConfig::default().with_max_speed(50.0);
    let result = ScenarioRunner::new(8).with_config(config).run(ScenarioId::Drive);

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.stats.rejected_speed, 0);
}

#[test]
fn faster_fix_rate_still_tracks_walk() {
    let result = ScenarioRunner::new(4).with_fix_rate(5).run(ScenarioId::Walk);

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.fixes_sent, 600);
}

#[test]
fn recorded_route_matches_accepted_count() {
    let (result, export) = ScenarioRunner::new(2).run_recorded(ScenarioId::Walk);

    assert_eq!(export.route().len() as u64, result.stats.accepted);
    assert_eq!(export.tracked_distance_m, Some(result.tracked_distance_m));
    assert!(export.frames.iter().all(|f| f.state == TrackingState::Running));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn stationary_never_drifts(seed in any::<u64>()) {
        let result = ScenarioRunner::new(seed).run(ScenarioId::Stationary);
        prop_assert!(result.passed, "{:?}", result.failure_reason);
        prop_assert!(result.tracked_distance_m <= 10.0);
    }

    #[test]
    fn walk_is_deterministic(seed in any::<u64>()) {
        let runner = ScenarioRunner::new(seed).with_duration(30.0);
        let a = runner.run(ScenarioId::Walk);
        let b = runner.run(ScenarioId::Walk);
        prop_assert_eq!(a.tracked_distance_m, b.tracked_distance_m);
        prop_assert_eq!(a.stats, b.stats);
    }
}
