//! Ground truth oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of one simulated device:
//! - True position in local east/north meters around a WGS84 origin
//! - Constant-velocity kinematics with scripted velocity changes
//! - Fix generation with Gaussian position noise and a reported accuracy

use distrack_core::geodesy::offset_latlon;
use distrack_env::RawFix;
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// How the simulated receiver degrades its fixes.
///
/// Receivers report a conservative accuracy radius; the real per-axis
/// error is about a fifth of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Accuracy radius the receiver reports (<= 0 means no fix)
    pub reported_accuracy_m: f64,

    /// Actual per-axis position error standard deviation
    pub noise_std_m: f64,
}

impl NoiseProfile {
    /// Clear view of the sky.
    pub const OPEN_SKY: NoiseProfile = NoiseProfile {
        reported_accuracy_m: 5.0,
        noise_std_m: 1.0,
    };

    /// Vehicle-mounted receiver at speed.
    pub const HIGHWAY: NoiseProfile = NoiseProfile {
        reported_accuracy_m: 8.0,
        noise_std_m: 1.6,
    };

    /// Between tall buildings: Medium signal, larger real error.
    pub const URBAN_CANYON: NoiseProfile = NoiseProfile {
        reported_accuracy_m: 40.0,
        noise_std_m: 8.0,
    };

    /// Receiver lost lock; reports no accuracy.
    pub const NO_FIX: NoiseProfile = NoiseProfile {
        reported_accuracy_m: -1.0,
        noise_std_m: 0.0,
    };
}

/// The simulated device's true state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthDevice {
    /// Position [east, north] in meters from the origin
    pub position: Vector2<f64>,

    /// Velocity [east, north] in m/s
    pub velocity: Vector2<f64>,

    /// Path length actually traveled, in meters
    pub distance_traveled: f64,
}

/// The Oracle - maintains ground truth and generates fixes.
pub struct Oracle {
    /// RNG for noise
    physics_rng: ChaCha8Rng,

    device: GroundTruthDevice,

    /// WGS84 origin of the local frame (latitude, longitude)
    origin: (f64, f64),

    /// Current simulation time (seconds)
    current_time: f64,

    noise: NoiseProfile,
}

impl Oracle {
    /// Creates a new Oracle with a stationary device at the origin.
    pub fn new(physics_seed: u64, origin_lat: f64, origin_lon: f64) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            device: GroundTruthDevice {
                position: Vector2::zeros(),
                velocity: Vector2::zeros(),
                distance_traveled: 0.0,
            },
            origin: (origin_lat, origin_lon),
            current_time: 0.0,
            noise: NoiseProfile::OPEN_SKY,
        }
    }

    /// Sets the device velocity [east, north] in m/s.
    pub fn set_velocity(&mut self, velocity: Vector2<f64>) {
        self.device.velocity = velocity;
    }

    /// Sets how fixes are degraded from now on.
    pub fn set_noise(&mut self, noise: NoiseProfile) {
        self.noise = noise;
    }

    pub fn noise(&self) -> NoiseProfile {
        self.noise
    }

    /// Advances physics by dt seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;

        // Simple constant-velocity model
        let displacement = self.device.velocity * dt;
        self.device.position += displacement;
        self.device.distance_traveled += displacement.norm();
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn device(&self) -> &GroundTruthDevice {
        &self.device
    }

    /// Path length traveled so far, in meters.
    pub fn truth_distance(&self) -> f64 {
        self.device.distance_traveled
    }

    /// True position as (latitude, longitude).
    pub fn truth_latlon(&self) -> (f64, f64) {
        offset_latlon(
            self.origin.0,
            self.origin.1,
            self.device.position.x,
            self.device.position.y,
        )
    }

    /// Generates a noisy fix for the device, stamped with `timestamp`.
    pub fn generate_fix(&mut self, timestamp: SystemTime) -> RawFix {
        let noise = match Normal::new(0.0, self.noise.noise_std_m) {
            Ok(normal) if self.noise.noise_std_m > 0.0 => Vector2::new(
                normal.sample(&mut self.physics_rng),
                normal.sample(&mut self.physics_rng),
            ),
            _ => Vector2::zeros(),
        };
        let measured = self.device.position + noise;

        // Receivers wobble their own accuracy estimate a little
        let accuracy = if self.noise.reported_accuracy_m > 0.0 {
            self.noise.reported_accuracy_m * self.physics_rng.gen_range(0.8..1.2)
        } else {
            self.noise.reported_accuracy_m
        };

        let (lat, lon) = offset_latlon(self.origin.0, self.origin.1, measured.x, measured.y);
        let speed = self.device.velocity.norm();
        let course = self.device.velocity.x.atan2(self.device.velocity.y).to_degrees().rem_euclid(360.0);
        RawFix::new(lat, lon, accuracy, timestamp).with_motion(speed, course)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use distrack_core::geodesy::haversine_m;

    #[test]
    fn test_constant_velocity_step() {
        let mut oracle = Oracle::new(1, 40.0, -74.0);
        oracle.set_velocity(Vector2::new(3.0, 4.0));
        for _ in 0..10 {
            oracle.step(1.0);
        }
        assert_relative_eq!(oracle.truth_distance(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(oracle.device().position.x, 30.0, epsilon = 1e-9);
        assert_relative_eq!(oracle.time(), 10.0, epsilon = 1e-9);

        let (lat, lon) = oracle.truth_latlon();
        assert_relative_eq!(haversine_m(40.0, -74.0, lat, lon), 50.0, max_relative = 1e-6);
    }

    #[test]
    fn test_same_seed_same_fixes() {
        let t = SystemTime::UNIX_EPOCH;
        let mut a = Oracle::new(99, 40.0, -74.0);
        let mut b = Oracle::new(99, 40.0, -74.0);
        for _ in 0..5 {
            assert_eq!(a.generate_fix(t), b.generate_fix(t));
        }
    }

    #[test]
    fn test_no_fix_profile_reports_invalid_accuracy() {
        let mut oracle = Oracle::new(3, 40.0, -74.0);
        oracle.set_noise(NoiseProfile::NO_FIX);
        let fix = oracle.generate_fix(SystemTime::UNIX_EPOCH);
        assert!(fix.horizontal_accuracy <= 0.0);
        assert_eq!((fix.latitude, fix.longitude), (40.0, -74.0));
    }

    #[test]
    fn test_reported_accuracy_near_profile() {
        let mut oracle = Oracle::new(5, 40.0, -74.0);
        for _ in 0..100 {
            let fix = oracle.generate_fix(SystemTime::UNIX_EPOCH);
            assert!(fix.horizontal_accuracy >= 4.0 && fix.horizontal_accuracy < 6.0);
        }
    }
}
