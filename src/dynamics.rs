//! Rigid-body attitude dynamics with adaptive step control.
//!
//! One logical step advances the 7-component state `[ω_b, q_bi]` over
//! exactly the scheduler's tick interval using an embedded
//! Runge–Kutta–Fehlberg 4(5) pair. Local error is held within the
//! configured `rtol`/`atol` by sub-step rejection; a step that cannot
//! meet tolerance within the attempt budget fails loudly instead of
//! emitting out-of-tolerance state.
//!
//! Dynamics:
//!   `J ω̇ = τ − ω × Jω`   (Euler's rigid-body equation, diagonal J)
//!   `q̇ = ½ q ⊗ [ω, 0]`   (Markley scalar-last kinematics)

use thiserror::Error;

use crate::math::{cross3, quat_derivative, quat_normalize, Quat, Vec3};
use crate::state::SpacecraftProperties;

/// Sub-step attempt budget for one logical step.
const MAX_STEP_ATTEMPTS: u32 = 10_000;
/// Step controller safety factor and clamps (standard embedded-RK values).
const SAFETY: f64 = 0.9;
const GROW_LIMIT: f64 = 5.0;
const SHRINK_LIMIT: f64 = 0.1;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DynamicsError {
    #[error(
        "adaptive integration failed to meet tolerances (rtol={rtol:.3e}, atol={atol:.3e}) \
         over dt={dt} s after {attempts} sub-step attempts"
    )]
    ToleranceNotMet {
        rtol: f64,
        atol: f64,
        dt: f64,
        attempts: u32,
    },
}

/// Result of one accepted logical step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationStep {
    pub q_bi: Quat,
    pub omega_b: Vec3,
    /// Derivative evaluations consumed, for run metrics.
    pub evals: u32,
}

/// Adaptive attitude integrator. Stateless apart from its tolerances;
/// identical inputs always produce identical outputs.
#[derive(Debug, Clone, Copy)]
pub struct AttitudeIntegrator {
    rtol: f64,
    atol: f64,
}

type State7 = [f64; 7];

impl AttitudeIntegrator {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    pub fn atol(&self) -> f64 {
        self.atol
    }

    /// Advance attitude and rate by exactly `dt` seconds under the given
    /// applied torque. The quaternion component of the result is unit
    /// norm; drift accumulated inside the sub-steps is corrected, never
    /// surfaced.
    pub fn step(
        &self,
        q_bi: &Quat,
        omega_b: &Vec3,
        props: &SpacecraftProperties,
        torque: &Vec3,
        dt: f64,
    ) -> Result<IntegrationStep, DynamicsError> {
        let mut y = pack(omega_b, q_bi);
        let mut t = 0.0;
        let mut h = dt;
        let mut evals = 0u32;
        let mut attempts = 0u32;

        while t < dt * (1.0 - 1e-12) {
            h = h.min(dt - t);
            if h < dt * f64::EPSILON {
                return Err(self.failure(dt, attempts));
            }

            let (y_next, err_norm) = self.try_sub_step(&y, props, torque, h);
            evals += 6;
            attempts += 1;
            if attempts > MAX_STEP_ATTEMPTS {
                return Err(self.failure(dt, attempts));
            }

            if err_norm <= 1.0 {
                t += h;
                y = y_next;
                normalize_quat_part(&mut y);
                let grow = if err_norm > 0.0 {
                    (SAFETY * err_norm.powf(-0.2)).min(GROW_LIMIT)
                } else {
                    GROW_LIMIT
                };
                h *= grow;
            } else {
                h *= (SAFETY * err_norm.powf(-0.2)).max(SHRINK_LIMIT);
            }
        }

        let (omega_next, q_next) = unpack(&y);
        Ok(IntegrationStep {
            q_bi: quat_normalize(&q_next),
            omega_b: omega_next,
            evals,
        })
    }

    /// One embedded RKF45 attempt: returns the 5th-order candidate and
    /// the scaled RMS error norm against the 4th-order solution.
    fn try_sub_step(
        &self,
        y: &State7,
        props: &SpacecraftProperties,
        torque: &Vec3,
        h: f64,
    ) -> (State7, f64) {
        let k1 = deriv(y, props, torque);
        let k2 = deriv(&offset(y, &[(0.25, &k1)], h), props, torque);
        let k3 = deriv(
            &offset(y, &[(3.0 / 32.0, &k1), (9.0 / 32.0, &k2)], h),
            props,
            torque,
        );
        let k4 = deriv(
            &offset(
                y,
                &[
                    (1932.0 / 2197.0, &k1),
                    (-7200.0 / 2197.0, &k2),
                    (7296.0 / 2197.0, &k3),
                ],
                h,
            ),
            props,
            torque,
        );
        let k5 = deriv(
            &offset(
                y,
                &[
                    (439.0 / 216.0, &k1),
                    (-8.0, &k2),
                    (3680.0 / 513.0, &k3),
                    (-845.0 / 4104.0, &k4),
                ],
                h,
            ),
            props,
            torque,
        );
        let k6 = deriv(
            &offset(
                y,
                &[
                    (-8.0 / 27.0, &k1),
                    (2.0, &k2),
                    (-3544.0 / 2565.0, &k3),
                    (1859.0 / 4104.0, &k4),
                    (-11.0 / 40.0, &k5),
                ],
                h,
            ),
            props,
            torque,
        );

        let mut y4 = [0.0; 7];
        let mut y5 = [0.0; 7];
        for i in 0..7 {
            y4[i] = y[i]
                + h * (25.0 / 216.0 * k1[i]
                    + 1408.0 / 2565.0 * k3[i]
                    + 2197.0 / 4104.0 * k4[i]
                    - 0.2 * k5[i]);
            y5[i] = y[i]
                + h * (16.0 / 135.0 * k1[i]
                    + 6656.0 / 12825.0 * k3[i]
                    + 28561.0 / 56430.0 * k4[i]
                    - 9.0 / 50.0 * k5[i]
                    + 2.0 / 55.0 * k6[i]);
        }

        let mut acc = 0.0;
        for i in 0..7 {
            let scale = self.atol + self.rtol * y[i].abs().max(y5[i].abs());
            let e = (y5[i] - y4[i]) / scale;
            acc += e * e;
        }
        (y5, (acc / 7.0).sqrt())
    }

    fn failure(&self, dt: f64, attempts: u32) -> DynamicsError {
        DynamicsError::ToleranceNotMet {
            rtol: self.rtol,
            atol: self.atol,
            dt,
            attempts,
        }
    }
}

fn deriv(y: &State7, props: &SpacecraftProperties, torque: &Vec3) -> State7 {
    let (omega, q) = unpack(y);
    let h_body = props.angular_momentum(&omega);
    let gyro = cross3(&omega, &h_body);
    let omega_dot = props.inv_inertia_mul(&[
        torque[0] - gyro[0],
        torque[1] - gyro[1],
        torque[2] - gyro[2],
    ]);
    let q_dot = quat_derivative(&q, &omega);
    [
        omega_dot[0],
        omega_dot[1],
        omega_dot[2],
        q_dot[0],
        q_dot[1],
        q_dot[2],
        q_dot[3],
    ]
}

#[inline]
fn pack(omega: &Vec3, q: &Quat) -> State7 {
    [omega[0], omega[1], omega[2], q[0], q[1], q[2], q[3]]
}

#[inline]
fn unpack(y: &State7) -> (Vec3, Quat) {
    ([y[0], y[1], y[2]], [y[3], y[4], y[5], y[6]])
}

#[inline]
fn offset(y: &State7, terms: &[(f64, &State7)], h: f64) -> State7 {
    let mut out = *y;
    for (coeff, k) in terms {
        for i in 0..7 {
            out[i] += h * coeff * k[i];
        }
    }
    out
}

fn normalize_quat_part(y: &mut State7) {
    let q = quat_normalize(&[y[3], y[4], y[5], y[6]]);
    y[3] = q[0];
    y[4] = q[1];
    y[5] = q[2];
    y[6] = q[3];
}
