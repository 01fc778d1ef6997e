//! Physical state of the simulated spacecraft and the simulation clock.
//!
//! `SpacecraftState` is owned and mutated exclusively by the plant's
//! dynamics path; every other component works on `StateSnapshot` value
//! copies so that simulation truth can never be modified downstream.

use serde::{Deserialize, Serialize};

use crate::math::{quat_normalize, Quat, Vec3};
use crate::orbit::Epoch;

/// Inertial position/velocity pair (ECI, meters and meters/second).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalState {
    pub r_eci: Vec3,
    pub v_eci: Vec3,
}

/// True physical state: attitude, body rate, and (when orbit propagation
/// is enabled) inertial position and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacecraftState {
    /// Body-to-inertial attitude quaternion, scalar-last, unit norm.
    pub q_bi: Quat,
    /// Body angular velocity \[rad/s\].
    pub omega_b: Vec3,
    pub orbit: Option<OrbitalState>,
}

impl SpacecraftState {
    pub fn new(q_bi: Quat, omega_b: Vec3) -> Self {
        Self {
            q_bi: quat_normalize(&q_bi),
            omega_b,
            orbit: None,
        }
    }

    /// Read-only value copy handed to the scheduler and protocol layers.
    pub fn snapshot(&self, t_sim: f64) -> StateSnapshot {
        StateSnapshot {
            t_sim,
            q_bi: self.q_bi,
            omega_b: self.omega_b,
            orbit: self.orbit,
        }
    }
}

/// Immutable copy of the state at a single simulation instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub t_sim: f64,
    pub q_bi: Quat,
    pub omega_b: Vec3,
    pub orbit: Option<OrbitalState>,
}

/// Mass properties. The inertia tensor is diagonal (principal axes),
/// strictly positive, and fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacecraftProperties {
    pub inertia: Vec3,
}

impl SpacecraftProperties {
    pub fn new(inertia: Vec3) -> Self {
        Self { inertia }
    }

    /// `J ω` for a diagonal inertia tensor.
    #[inline]
    pub fn angular_momentum(&self, omega_b: &Vec3) -> Vec3 {
        [
            self.inertia[0] * omega_b[0],
            self.inertia[1] * omega_b[1],
            self.inertia[2] * omega_b[2],
        ]
    }

    /// `J⁻¹ v` for a diagonal inertia tensor.
    #[inline]
    pub fn inv_inertia_mul(&self, v: &Vec3) -> Vec3 {
        [
            v[0] / self.inertia[0],
            v[1] / self.inertia[1],
            v[2] / self.inertia[2],
        ]
    }
}

/// Commanded attitude and tracking gains for the closed-loop control law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlTarget {
    /// Commanded attitude quaternion, scalar-last.
    pub q_c: Quat,
    pub kp: f64,
    pub kd: f64,
}

/// Authoritative simulation time.
///
/// `t_sim` is derived from an integer step count so that sample instants
/// land exactly on the simulation-time grid; the clock never consults
/// wall time (real-time pacing belongs to the server binary).
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    dt_sim: f64,
    step: u64,
    epoch: Epoch,
}

impl SimulationClock {
    pub fn new(dt_sim: f64, epoch: Epoch) -> Self {
        Self {
            dt_sim,
            step: 0,
            epoch,
        }
    }

    /// Seconds since the simulation epoch.
    #[inline]
    pub fn t_sim(&self) -> f64 {
        self.step as f64 * self.dt_sim
    }

    /// Completed integration steps.
    #[inline]
    pub fn step_index(&self) -> u64 {
        self.step
    }

    #[inline]
    pub fn dt_sim(&self) -> f64 {
        self.dt_sim
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Advance by one integration step. Only the plant's tick path calls this.
    pub fn advance(&mut self) {
        self.step += 1;
    }
}
