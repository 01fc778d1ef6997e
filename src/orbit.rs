//! Two-body orbit propagation from Keplerian elements.
//!
//! The propagator converts elements + epoch into an initial ECI state
//! once, then advances it in closed form: mean anomaly march plus a
//! Newton solve of Kepler's equation. No perturbation forces are
//! modeled; that matches the system roadmap, not an oversight.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Vec3;
use crate::state::OrbitalState;

/// Earth gravitational parameter \[m³/s²\].
pub const MU_EARTH: f64 = 3.986004418e14;

/// Newton iteration tolerance on eccentric anomaly \[rad\].
const KEPLER_TOL: f64 = 1e-12;
const KEPLER_MAX_ITER: usize = 50;

/// Stated precision of the fractional day-of-year encoding.
const EPOCH_QUANTUM: f64 = 1e-4;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum OrbitError {
    #[error("epoch {0} is not a valid YYDDD.DDDD day-of-year encoding")]
    InvalidEpoch(f64),
    #[error("eccentricity {0} is outside the closed-orbit range [0, 1)")]
    UnboundedOrbit(f64),
    #[error("semi-major axis {0} m must be positive")]
    NonPositiveSma(f64),
}

/// Calendar epoch decoded from the `YYDDD.DDDD` fractional day-of-year
/// encoding (UTC). Two-digit years follow the TLE windowing convention:
/// `YY < 57` maps to `20YY`, otherwise `19YY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub year: i32,
    /// Fractional day of year, `1.0 ≤ d < days_in_year + 1`.
    pub day_of_year: f64,
}

impl Epoch {
    pub fn decode(code: f64) -> Result<Self, OrbitError> {
        if !code.is_finite() || code < 0.0 {
            return Err(OrbitError::InvalidEpoch(code));
        }
        let yy = (code / 1000.0).floor();
        let day_of_year = code - yy * 1000.0;
        if yy > 99.0 {
            return Err(OrbitError::InvalidEpoch(code));
        }
        let year = if (yy as i32) < 57 {
            2000 + yy as i32
        } else {
            1900 + yy as i32
        };
        if day_of_year < 1.0 || day_of_year >= days_in_year(year) as f64 + 1.0 {
            return Err(OrbitError::InvalidEpoch(code));
        }
        Ok(Self { year, day_of_year })
    }

    /// Re-encode to `YYDDD.DDDD`, quantized to the stated 1e-4 precision.
    pub fn encode(&self) -> f64 {
        let yy = (self.year % 100) as f64;
        let code = yy * 1000.0 + self.day_of_year;
        (code / EPOCH_QUANTUM).round() * EPOCH_QUANTUM
    }

    /// Calendar components `(year, month, day, hour, minute, second)`, UTC.
    pub fn calendar(&self) -> (i32, u32, u32, u32, u32, f64) {
        let ordinal = self.day_of_year.floor() as u32; // 1-based
        let day_fraction = self.day_of_year - ordinal as f64;

        let lengths = month_lengths(self.year);
        let mut month = 1u32;
        let mut day = ordinal;
        for (i, len) in lengths.iter().enumerate() {
            if day <= *len {
                month = i as u32 + 1;
                break;
            }
            day -= len;
        }

        let seconds_of_day = day_fraction * 86_400.0;
        let hour = (seconds_of_day / 3600.0).floor() as u32;
        let minute = ((seconds_of_day - hour as f64 * 3600.0) / 60.0).floor() as u32;
        let second = seconds_of_day - hour as f64 * 3600.0 - minute as f64 * 60.0;
        (self.year, month, day, hour, minute, second)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

fn month_lengths(year: i32) -> [u32; 12] {
    let feb = if is_leap_year(year) { 29 } else { 28 };
    [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
}

/// Classical Keplerian element set, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeplerianElements {
    /// Semi-major axis \[m\].
    pub sma_m: f64,
    pub ecc: f64,
    pub inc_rad: f64,
    pub raan_rad: f64,
    pub argp_rad: f64,
    pub true_anomaly_rad: f64,
}

/// Closed-form two-body propagator. Construction fixes the orbit shape;
/// `propagate` is a pure function of `t_sim` thereafter.
#[derive(Debug, Clone, Copy)]
pub struct OrbitPropagator {
    elements: KeplerianElements,
    mu: f64,
    /// Mean motion \[rad/s\].
    n: f64,
    /// Mean anomaly at t_sim = 0.
    m0: f64,
}

impl OrbitPropagator {
    pub fn new(elements: KeplerianElements) -> Result<Self, OrbitError> {
        Self::with_mu(elements, MU_EARTH)
    }

    pub fn with_mu(elements: KeplerianElements, mu: f64) -> Result<Self, OrbitError> {
        if elements.sma_m <= 0.0 {
            return Err(OrbitError::NonPositiveSma(elements.sma_m));
        }
        if !(0.0..1.0).contains(&elements.ecc) {
            return Err(OrbitError::UnboundedOrbit(elements.ecc));
        }
        let n = (mu / elements.sma_m.powi(3)).sqrt();
        let e0 = eccentric_from_true(elements.true_anomaly_rad, elements.ecc);
        let m0 = e0 - elements.ecc * e0.sin();
        Ok(Self {
            elements,
            mu,
            n,
            m0,
        })
    }

    /// Orbital period \[s\].
    pub fn period(&self) -> f64 {
        std::f64::consts::TAU / self.n
    }

    /// ECI state at `t_sim = 0`.
    pub fn initial_state(&self) -> OrbitalState {
        self.state_at_true_anomaly(self.elements.true_anomaly_rad)
    }

    /// ECI state at simulation time `t_sim` seconds past the epoch.
    pub fn propagate(&self, t_sim: f64) -> OrbitalState {
        let m = (self.m0 + self.n * t_sim).rem_euclid(std::f64::consts::TAU);
        let e_anom = solve_kepler(m, self.elements.ecc);
        let nu = true_from_eccentric(e_anom, self.elements.ecc);
        self.state_at_true_anomaly(nu)
    }

    fn state_at_true_anomaly(&self, nu: f64) -> OrbitalState {
        let el = &self.elements;
        let p = el.sma_m * (1.0 - el.ecc * el.ecc);
        let r_mag = p / (1.0 + el.ecc * nu.cos());

        // Perifocal frame: x toward perigee, z along orbit normal.
        let r_pf = [r_mag * nu.cos(), r_mag * nu.sin(), 0.0];
        let v_scale = (self.mu / p).sqrt();
        let v_pf = [-v_scale * nu.sin(), v_scale * (el.ecc + nu.cos()), 0.0];

        OrbitalState {
            r_eci: perifocal_to_eci(&r_pf, el),
            v_eci: perifocal_to_eci(&v_pf, el),
        }
    }
}

/// 3-1-3 rotation from the perifocal frame into ECI.
fn perifocal_to_eci(v: &Vec3, el: &KeplerianElements) -> Vec3 {
    let (so, co) = el.raan_rad.sin_cos();
    let (si, ci) = el.inc_rad.sin_cos();
    let (sw, cw) = el.argp_rad.sin_cos();

    let r11 = co * cw - so * sw * ci;
    let r12 = -co * sw - so * cw * ci;
    let r21 = so * cw + co * sw * ci;
    let r22 = -so * sw + co * cw * ci;
    let r31 = sw * si;
    let r32 = cw * si;

    [
        r11 * v[0] + r12 * v[1],
        r21 * v[0] + r22 * v[1],
        r31 * v[0] + r32 * v[1],
    ]
}

fn eccentric_from_true(nu: f64, ecc: f64) -> f64 {
    let half = 0.5 * nu;
    2.0 * ((1.0 - ecc).sqrt() * half.sin()).atan2((1.0 + ecc).sqrt() * half.cos())
}

fn true_from_eccentric(e_anom: f64, ecc: f64) -> f64 {
    let half = 0.5 * e_anom;
    2.0 * ((1.0 + ecc).sqrt() * half.sin()).atan2((1.0 - ecc).sqrt() * half.cos())
}

/// Newton iteration on `E - e·sin E = M`. Converges well inside the
/// iteration cap for every eccentricity the config accepts.
fn solve_kepler(m: f64, ecc: f64) -> f64 {
    let mut e_anom = if ecc > 0.8 { std::f64::consts::PI } else { m };
    for _ in 0..KEPLER_MAX_ITER {
        let f = e_anom - ecc * e_anom.sin() - m;
        let fp = 1.0 - ecc * e_anom.cos();
        let delta = f / fp;
        e_anom -= delta;
        if delta.abs() < KEPLER_TOL {
            break;
        }
    }
    e_anom
}
