//! Vector and quaternion helpers for attitude dynamics.
//!
//! Quaternions are scalar-last `[x, y, z, w]` and compose with the
//! Markley cross (`⊗`) convention: rotating by `q_a` then `q_b` is
//! `quat_multiply(q_a, q_b)`.

/// 3-component column vector, plain array to keep the hot path allocation-free.
pub type Vec3 = [f64; 3];

/// Attitude quaternion, scalar-last `[x, y, z, w]`.
pub type Quat = [f64; 4];

/// Identity quaternion (no rotation).
pub const QUAT_IDENTITY: Quat = [0.0, 0.0, 0.0, 1.0];

#[inline]
pub fn add3(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub3(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale3(v: &Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
pub fn dot3(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross3(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm3(v: &Vec3) -> f64 {
    dot3(v, v).sqrt()
}

/// Quaternion norm (4-component Euclidean).
#[inline]
pub fn quat_norm(q: &Quat) -> f64 {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt()
}

/// Return a unit-norm copy. A zero quaternion maps to identity; valid
/// configurations never produce one (rejected at config time).
#[inline]
pub fn quat_normalize(q: &Quat) -> Quat {
    let n = quat_norm(q);
    if n == 0.0 {
        return QUAT_IDENTITY;
    }
    [q[0] / n, q[1] / n, q[2] / n, q[3] / n]
}

#[inline]
pub fn quat_conj(q: &Quat) -> Quat {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Markley `⊗` product (Eq. 2.85): `quat_multiply(a, b)` composes the
/// rotation `a` followed by `b`.
#[inline]
pub fn quat_multiply(a: &Quat, b: &Quat) -> Quat {
    let (a1, a2, a3, a4) = (a[0], a[1], a[2], a[3]);
    let (b1, b2, b3, b4) = (b[0], b[1], b[2], b[3]);
    [
        a4 * b1 + a3 * b2 - a2 * b3 + a1 * b4,
        -a3 * b1 + a4 * b2 + a1 * b3 + a2 * b4,
        a2 * b1 - a1 * b2 + a4 * b3 + a3 * b4,
        -a1 * b1 - a2 * b2 - a3 * b3 + a4 * b4,
    ]
}

/// Attitude kinematics: `q̇ = ½ q ⊗ [ω, 0]`.
#[inline]
pub fn quat_derivative(q: &Quat, omega: &Vec3) -> Quat {
    let omega_quat = [omega[0], omega[1], omega[2], 0.0];
    let dq = quat_multiply(q, &omega_quat);
    [0.5 * dq[0], 0.5 * dq[1], 0.5 * dq[2], 0.5 * dq[3]]
}

/// Rotation error from `q_target` to `q`: `q_e = q_target⁻¹ ⊗ q`.
#[inline]
pub fn quat_error(q_target: &Quat, q: &Quat) -> Quat {
    quat_multiply(&quat_conj(q_target), q)
}

/// Spherical linear interpolation, shortest path. `t` in `[0, 1]`.
pub fn slerp(q0: &Quat, q1: &Quat, t: f64) -> Quat {
    let a = quat_normalize(q0);
    let mut b = quat_normalize(q1);
    let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    // Double cover: flip one endpoint so we interpolate the short way round.
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        dot = -dot;
    }
    if dot > 0.9995 {
        // Nearly parallel: linear blend avoids division by a tiny sin.
        let q = [
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
            a[3] + t * (b[3] - a[3]),
        ];
        return quat_normalize(&q);
    }
    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let w0 = ((1.0 - t) * theta).sin() / sin_theta;
    let w1 = (t * theta).sin() / sin_theta;
    [
        w0 * a[0] + w1 * b[0],
        w0 * a[1] + w1 * b[1],
        w0 * a[2] + w1 * b[2],
        w0 * a[3] + w1 * b[3],
    ]
}

/// Quaternion for a rotation of `angle` radians about `axis` (normalized here).
pub fn quat_from_axis_angle(axis: &Vec3, angle: f64) -> Quat {
    let n = norm3(axis);
    if n == 0.0 {
        return QUAT_IDENTITY;
    }
    let half = 0.5 * angle;
    let s = half.sin() / n;
    [axis[0] * s, axis[1] * s, axis[2] * s, half.cos()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_identity_is_noop() {
        let q = quat_normalize(&[0.1, -0.2, 0.3, 0.9]);
        let p = quat_multiply(&q, &QUAT_IDENTITY);
        for i in 0..4 {
            assert!((p[i] - q[i]).abs() < 1e-15);
        }
    }

    #[test]
    fn conjugate_inverts_unit_quaternion() {
        let q = quat_normalize(&[0.3, 0.1, -0.4, 0.8]);
        let e = quat_multiply(&quat_conj(&q), &q);
        assert!((e[3] - 1.0).abs() < 1e-12);
        assert!(e[0].abs() < 1e-12 && e[1].abs() < 1e-12 && e[2].abs() < 1e-12);
    }

    #[test]
    fn axis_angle_round_trip() {
        let q = quat_from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        assert!((q[2] - std::f64::consts::FRAC_PI_4.sin()).abs() < 1e-12);
        assert!((quat_norm(&q) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn slerp_endpoints() {
        let q0 = QUAT_IDENTITY;
        let q1 = quat_from_axis_angle(&[1.0, 0.0, 0.0], 1.0);
        let s0 = slerp(&q0, &q1, 0.0);
        let s1 = slerp(&q0, &q1, 1.0);
        for i in 0..4 {
            assert!((s0[i] - q0[i]).abs() < 1e-12);
            assert!((s1[i] - q1[i]).abs() < 1e-12);
        }
    }
}
