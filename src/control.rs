//! Closed-loop attitude control laws.
//!
//! The plant evaluates one of these whenever no externally supplied
//! actuator command applies to the step; they are the reference
//! implementations a flight controller under test is compared against.

use serde::{Deserialize, Serialize};

use crate::math::{cross3, quat_error, Quat, Vec3};
use crate::state::{ControlTarget, SpacecraftProperties};

/// Control policy, fixed at configuration and changeable mid-run only
/// through an explicit reconfigure command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Zero torque: free rigid-body motion.
    #[default]
    None,
    /// PD tracking on the quaternion vector-part error and body rate.
    Linear,
    /// PD tracking plus the gyroscopic feedforward term, removing the
    /// steady-state bias the linear law carries under nonzero momentum.
    Nonlinear,
}

#[derive(Debug, Clone, Copy)]
pub struct ControlLaw {
    mode: ControlMode,
    target: ControlTarget,
}

impl ControlLaw {
    pub fn new(mode: ControlMode, target: ControlTarget) -> Self {
        Self { mode, target }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn target(&self) -> &ControlTarget {
        &self.target
    }

    /// Explicit reconfigure path (driven by an accepted `ctrl-v1` frame).
    pub fn reconfigure(&mut self, mode: ControlMode, target: ControlTarget) {
        self.mode = mode;
        self.target = target;
    }

    /// Commanded body torque \[N·m\] for the current attitude and rate.
    pub fn torque(
        &self,
        q_bi: &Quat,
        omega_b: &Vec3,
        props: &SpacecraftProperties,
    ) -> Vec3 {
        match self.mode {
            ControlMode::None => [0.0; 3],
            ControlMode::Linear => self.tracking_torque(q_bi, omega_b),
            ControlMode::Nonlinear => {
                let linear = self.tracking_torque(q_bi, omega_b);
                // Feedforward ω × Jω cancels the gyroscopic coupling so the
                // closed loop sees pure double-integrator error dynamics.
                let gyro = cross3(omega_b, &props.angular_momentum(omega_b));
                [linear[0] + gyro[0], linear[1] + gyro[1], linear[2] + gyro[2]]
            }
        }
    }

    fn tracking_torque(&self, q_bi: &Quat, omega_b: &Vec3) -> Vec3 {
        let q_e = quat_error(&self.target.q_c, q_bi);
        // sign(q_e.w) picks the short rotation of the quaternion double
        // cover, avoiding unwinding through the long way round.
        let sign = if q_e[3] < 0.0 { -1.0 } else { 1.0 };
        let (kp, kd) = (self.target.kp, self.target.kd);
        [
            -kp * sign * q_e[0] - kd * omega_b[0],
            -kp * sign * q_e[1] - kd * omega_b[1],
            -kp * sign * q_e[2] - kd * omega_b[2],
        ]
    }
}
