//! Plant configuration.
//!
//! The library consumes a parsed `PlantConfig`; how the struct is
//! produced (file, HTTP body, test literal) is the caller's concern.
//! Every section carries serde defaults so partial configurations
//! deserialize cleanly, and `validate()` rejects non-physical input
//! before any state is created or frame emitted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::ControlMode;
use crate::math::{quat_norm, Quat, Vec3};
use crate::orbit::{Epoch, KeplerianElements, OrbitError};
use crate::protocol::CommandPolicy;

/// Tolerance for a sample period landing on the integration grid.
const CADENCE_GRID_TOL: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("inertia component {0} must be positive and finite")]
    NonPositiveInertia(f64),
    #[error("{0} quaternion has zero norm and cannot be normalized")]
    ZeroNormQuaternion(&'static str),
    #[error("dt_sim {0} must be positive and finite")]
    NonPositiveTimeStep(f64),
    #[error("t_max {0} must be positive")]
    NonPositiveHorizon(f64),
    #[error("integration tolerance {0} must be positive")]
    NonPositiveTolerance(f64),
    #[error("time_scale {0} must be positive")]
    NonPositiveTimeScale(f64),
    #[error("{channel} sample rate {rate_hz} Hz must be non-negative and finite")]
    InvalidSampleRate { channel: &'static str, rate_hz: f64 },
    #[error(
        "{channel} period at {rate_hz} Hz is not an integer multiple of dt_sim={dt_sim}"
    )]
    CadenceOffGrid {
        channel: &'static str,
        rate_hz: f64,
        dt_sim: f64,
    },
    #[error("{0} noise sigma must be non-negative and finite")]
    NegativeNoise(&'static str),
    #[error("GPS channel enabled but no orbital elements configured")]
    GpsWithoutOrbit,
    #[error(transparent)]
    Orbit(#[from] OrbitError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlantConfig {
    pub simulation: SimulationConfig,
    pub spacecraft: SpacecraftConfig,
    pub initial_conditions: InitialConditions,
    pub control: ControlConfig,
    pub sensors: SensorsConfig,
    pub command: CommandConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Internal integration step \[s\].
    pub dt_sim: f64,
    /// Simulation horizon \[s\].
    pub t_max: f64,
    pub rtol: f64,
    pub atol: f64,
    /// Simulation seconds per wall-clock second; `inf` runs unpaced.
    pub time_scale: f64,
    /// Simulation epoch, `YYDDD.DDDD` fractional day-of-year (UTC).
    pub epoch_yyddd: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_sim: 0.1,
            t_max: 60.0,
            rtol: 1e-9,
            atol: 1e-9,
            time_scale: 1.0,
            epoch_yyddd: 25001.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacecraftConfig {
    /// Principal inertia diagonal \[kg·m²\].
    pub inertia: Vec3,
}

impl Default for SpacecraftConfig {
    fn default() -> Self {
        Self {
            inertia: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConditions {
    /// Body-to-inertial quaternion, scalar-last.
    pub q_bi: Quat,
    pub omega_b_radps: Vec3,
    pub orbit: Option<OrbitConfig>,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            q_bi: [0.0, 0.0, 0.0, 1.0],
            omega_b_radps: [0.0; 3],
            orbit: None,
        }
    }
}

/// Orbital elements as configured (angles in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub sma_m: f64,
    pub ecc: f64,
    pub inc_deg: f64,
    pub raan_deg: f64,
    pub argp_deg: f64,
    pub true_anomaly_deg: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            sma_m: 6_778_137.0,
            ecc: 0.0,
            inc_deg: 51.6,
            raan_deg: 0.0,
            argp_deg: 0.0,
            true_anomaly_deg: 0.0,
        }
    }
}

impl OrbitConfig {
    pub fn elements(&self) -> KeplerianElements {
        KeplerianElements {
            sma_m: self.sma_m,
            ecc: self.ecc,
            inc_rad: self.inc_deg.to_radians(),
            raan_rad: self.raan_deg.to_radians(),
            argp_rad: self.argp_deg.to_radians(),
            true_anomaly_rad: self.true_anomaly_deg.to_radians(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub control_type: ControlMode,
    pub kp: f64,
    pub kd: f64,
    /// Commanded quaternion, scalar-last.
    pub qc: Quat,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_type: ControlMode::None,
            kp: 0.0,
            kd: 0.0,
            qc: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub rng_seed: u64,
    pub gps: GpsChannelConfig,
    pub gyro: GyroChannelConfig,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0,
            gps: GpsChannelConfig::default(),
            gyro: GyroChannelConfig::default(),
        }
    }
}

/// GPS channel: `rate_hz = 0` disables the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsChannelConfig {
    pub rate_hz: f64,
    pub sigma_pos_m: f64,
    pub sigma_vel_mps: f64,
}

impl Default for GpsChannelConfig {
    fn default() -> Self {
        Self {
            rate_hz: 0.0,
            sigma_pos_m: 0.0,
            sigma_vel_mps: 0.0,
        }
    }
}

/// Gyro channel: `rate_hz = 0` disables the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GyroChannelConfig {
    pub rate_hz: f64,
    pub sigma_radps: f64,
    pub bias_rw_sigma: Option<f64>,
}

impl Default for GyroChannelConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            sigma_radps: 0.0,
            bias_rw_sigma: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CommandConfig {
    pub policy: CommandPolicy,
    /// Freshness window for `fallback_to_control_law`; `None` means a
    /// command is fresh only for the step after it arrives.
    pub stale_after_s: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Replay log path; `None` disables logging.
    pub replay_file: Option<PathBuf>,
}

/// Sample period of `rate_hz` expressed in whole integration steps.
/// Errors unless the period lands exactly on the `dt_sim` grid.
pub fn period_steps(
    channel: &'static str,
    rate_hz: f64,
    dt_sim: f64,
) -> Result<u64, ConfigError> {
    if !(rate_hz > 0.0) || !rate_hz.is_finite() {
        return Err(ConfigError::InvalidSampleRate { channel, rate_hz });
    }
    let period = 1.0 / rate_hz;
    let steps = (period / dt_sim).round();
    if steps < 1.0 || (steps * dt_sim - period).abs() > CADENCE_GRID_TOL {
        return Err(ConfigError::CadenceOffGrid {
            channel,
            rate_hz,
            dt_sim,
        });
    }
    Ok(steps as u64)
}

impl PlantConfig {
    /// Reject non-physical input before any frame is emitted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &j in &self.spacecraft.inertia {
            if !(j > 0.0) || !j.is_finite() {
                return Err(ConfigError::NonPositiveInertia(j));
            }
        }
        if quat_norm(&self.initial_conditions.q_bi) == 0.0 {
            return Err(ConfigError::ZeroNormQuaternion("initial"));
        }
        if quat_norm(&self.control.qc) == 0.0 {
            return Err(ConfigError::ZeroNormQuaternion("target"));
        }

        let sim = &self.simulation;
        if !(sim.dt_sim > 0.0) || !sim.dt_sim.is_finite() {
            return Err(ConfigError::NonPositiveTimeStep(sim.dt_sim));
        }
        if !(sim.t_max > 0.0) {
            return Err(ConfigError::NonPositiveHorizon(sim.t_max));
        }
        for &tol in &[sim.rtol, sim.atol] {
            if !(tol > 0.0) {
                return Err(ConfigError::NonPositiveTolerance(tol));
            }
        }
        if !(sim.time_scale > 0.0) {
            return Err(ConfigError::NonPositiveTimeScale(sim.time_scale));
        }
        Epoch::decode(sim.epoch_yyddd)?;

        let gps = &self.sensors.gps;
        if gps.rate_hz < 0.0 || !gps.rate_hz.is_finite() {
            return Err(ConfigError::InvalidSampleRate {
                channel: "gps",
                rate_hz: gps.rate_hz,
            });
        }
        if gps.rate_hz > 0.0 {
            period_steps("gps", gps.rate_hz, sim.dt_sim)?;
            if self.initial_conditions.orbit.is_none() {
                return Err(ConfigError::GpsWithoutOrbit);
            }
        }
        for (name, sigma) in [
            ("gps position", gps.sigma_pos_m),
            ("gps velocity", gps.sigma_vel_mps),
        ] {
            if sigma < 0.0 || !sigma.is_finite() {
                return Err(ConfigError::NegativeNoise(name));
            }
        }

        let gyro = &self.sensors.gyro;
        if gyro.rate_hz < 0.0 || !gyro.rate_hz.is_finite() {
            return Err(ConfigError::InvalidSampleRate {
                channel: "gyro",
                rate_hz: gyro.rate_hz,
            });
        }
        if gyro.rate_hz > 0.0 {
            period_steps("gyro", gyro.rate_hz, sim.dt_sim)?;
        }
        if gyro.sigma_radps < 0.0 || !gyro.sigma_radps.is_finite() {
            return Err(ConfigError::NegativeNoise("gyro rate"));
        }
        if let Some(sigma) = gyro.bias_rw_sigma {
            if sigma < 0.0 || !sigma.is_finite() {
                return Err(ConfigError::NegativeNoise("gyro bias walk"));
            }
        }

        if let Some(orbit) = &self.initial_conditions.orbit {
            let el = orbit.elements();
            if el.sma_m <= 0.0 {
                return Err(OrbitError::NonPositiveSma(el.sma_m).into());
            }
            if !(0.0..1.0).contains(&el.ecc) {
                return Err(OrbitError::UnboundedOrbit(el.ecc).into());
            }
        }

        Ok(())
    }
}
