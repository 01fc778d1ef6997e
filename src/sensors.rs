//! Sensor measurement models.
//!
//! Measurements are the true state plus seeded Gaussian noise, so two
//! runs with the same configuration and inbound traffic produce
//! identical replay logs. The gyro additionally carries an optional
//! bias random walk, stepped once per emitted sample.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::math::Vec3;
use crate::state::OrbitalState;

/// Deterministic noise source shared by all sensor models in a run.
#[derive(Debug)]
pub struct SensorRng {
    rng: StdRng,
}

impl SensorRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Zero-mean Gaussian sample via the Box–Muller transform.
    pub fn normal(&mut self, sigma: f64) -> f64 {
        if sigma == 0.0 {
            return 0.0;
        }
        let u1: f64 = self.rng.gen::<f64>().max(f64::EPSILON);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        z * sigma
    }

    fn normal3(&mut self, sigma: f64) -> Vec3 {
        [self.normal(sigma), self.normal(sigma), self.normal(sigma)]
    }
}

/// GPS receiver model: independent position and velocity noise.
#[derive(Debug, Clone, Copy)]
pub struct GpsModel {
    pub sigma_pos_m: f64,
    pub sigma_vel_mps: f64,
}

impl GpsModel {
    pub fn measure(&self, truth: &OrbitalState, rng: &mut SensorRng) -> (Vec3, Vec3) {
        let np = rng.normal3(self.sigma_pos_m);
        let nv = rng.normal3(self.sigma_vel_mps);
        (
            [
                truth.r_eci[0] + np[0],
                truth.r_eci[1] + np[1],
                truth.r_eci[2] + np[2],
            ],
            [
                truth.v_eci[0] + nv[0],
                truth.v_eci[1] + nv[1],
                truth.v_eci[2] + nv[2],
            ],
        )
    }
}

/// Rate gyro model: white noise plus an optional bias random walk.
#[derive(Debug, Clone, Copy)]
pub struct GyroModel {
    pub sigma_radps: f64,
    pub bias_rw_sigma: Option<f64>,
    bias: Vec3,
}

impl GyroModel {
    pub fn new(sigma_radps: f64, bias_rw_sigma: Option<f64>) -> Self {
        Self {
            sigma_radps,
            bias_rw_sigma,
            bias: [0.0; 3],
        }
    }

    pub fn bias(&self) -> &Vec3 {
        &self.bias
    }

    /// Step the bias walk, then return the corrupted rate measurement.
    pub fn measure(&mut self, omega_true: &Vec3, rng: &mut SensorRng) -> Vec3 {
        if let Some(sigma) = self.bias_rw_sigma {
            if sigma > 0.0 {
                let walk = rng.normal3(sigma);
                self.bias = [
                    self.bias[0] + walk[0],
                    self.bias[1] + walk[1],
                    self.bias[2] + walk[2],
                ];
            }
        }
        let noise = rng.normal3(self.sigma_radps);
        [
            omega_true[0] + self.bias[0] + noise[0],
            omega_true[1] + self.bias[1] + noise[1],
            omega_true[2] + self.bias[2] + noise[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sigma_is_exact_passthrough() {
        let mut rng = SensorRng::from_seed(7);
        let mut gyro = GyroModel::new(0.0, None);
        let omega = [0.1, -0.2, 0.3];
        assert_eq!(gyro.measure(&omega, &mut rng), omega);

        let gps = GpsModel {
            sigma_pos_m: 0.0,
            sigma_vel_mps: 0.0,
        };
        let truth = OrbitalState {
            r_eci: [7.0e6, 0.0, 0.0],
            v_eci: [0.0, 7.5e3, 0.0],
        };
        let (r, v) = gps.measure(&truth, &mut rng);
        assert_eq!(r, truth.r_eci);
        assert_eq!(v, truth.v_eci);
    }

    #[test]
    fn same_seed_reproduces_measurements() {
        let truth = OrbitalState {
            r_eci: [7.0e6, 1.0e5, -2.0e5],
            v_eci: [10.0, 7.4e3, 5.0],
        };
        let gps = GpsModel {
            sigma_pos_m: 5.0,
            sigma_vel_mps: 0.1,
        };
        let mut rng_a = SensorRng::from_seed(42);
        let mut rng_b = SensorRng::from_seed(42);
        assert_eq!(gps.measure(&truth, &mut rng_a), gps.measure(&truth, &mut rng_b));
    }

    #[test]
    fn bias_walk_accumulates() {
        let mut rng = SensorRng::from_seed(3);
        let mut gyro = GyroModel::new(0.0, Some(0.01));
        let before = *gyro.bias();
        gyro.measure(&[0.0; 3], &mut rng);
        gyro.measure(&[0.0; 3], &mut rng);
        assert_ne!(before, *gyro.bias());
    }
}
