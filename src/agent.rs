//! Plant orchestrator.
//!
//! `PlantAgent` owns the authoritative simulation state and wires the
//! components together: one `step()` call advances the clock by a
//! single internal tick — emit due frames, pick the applied torque
//! (last-known command per policy, else the control law), integrate,
//! propagate the orbit. Inbound actuator lines enter through
//! `ingest_line`, which never fails the simulation itself: protocol
//! errors are returned for logging and the frame is dropped.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PlantConfig};
use crate::control::ControlLaw;
use crate::dynamics::{AttitudeIntegrator, DynamicsError};
use crate::math::{quat_normalize, slerp, Quat, Vec3};
use crate::orbit::{Epoch, OrbitPropagator};
use crate::protocol::{ActuatorPayload, ProtocolError, ProtocolHandler, ProtocolStats, SensorKind};
use crate::replay::ReplayLog;
use crate::scheduler::{FrameScheduler, SchedulerStats};
use crate::sensors::{GpsModel, GyroModel, SensorRng};
use crate::state::{
    ControlTarget, SimulationClock, SpacecraftProperties, SpacecraftState, StateSnapshot,
};

#[derive(Debug, Error)]
pub enum PlantError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("dynamics failure at t_sim={t_sim}: {source}")]
    Dynamics {
        t_sim: f64,
        #[source]
        source: DynamicsError,
    },
    #[error("outbound frame error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("replay log error: {0}")]
    ReplayIo(#[from] std::io::Error),
}

/// Run performance summary for the consumer-facing metrics surface.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct RunMetrics {
    pub compute_time_s: f64,
    pub steps: u64,
    pub derivative_evals: u64,
    pub time_per_eval_s: f64,
    pub trajectory_bytes: usize,
}

/// Attitude/rate time series resampled onto a uniform playback grid.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSeries {
    pub t: Vec<f64>,
    pub q_bi: Vec<Quat>,
    pub omega_b: Vec<Vec3>,
}

pub struct PlantAgent {
    config: PlantConfig,
    props: SpacecraftProperties,
    state: SpacecraftState,
    clock: SimulationClock,
    integrator: AttitudeIntegrator,
    orbit: Option<OrbitPropagator>,
    control: ControlLaw,
    scheduler: FrameScheduler,
    protocol: ProtocolHandler,
    gps_model: GpsModel,
    gyro_model: GyroModel,
    rng: SensorRng,
    replay: Option<ReplayLog>,

    running: bool,
    paused: bool,
    trajectory: Vec<StateSnapshot>,
    compute_time: Duration,
    derivative_evals: u64,
}

impl PlantAgent {
    /// Build an agent from a validated configuration. All configuration
    /// errors surface here, before any state exists or frame is emitted.
    pub fn new(config: PlantConfig) -> Result<Self, PlantError> {
        config.validate()?;

        let props = SpacecraftProperties::new(config.spacecraft.inertia);
        let mut state = SpacecraftState::new(
            config.initial_conditions.q_bi,
            config.initial_conditions.omega_b_radps,
        );

        let orbit = match &config.initial_conditions.orbit {
            Some(orbit_cfg) => {
                let propagator = OrbitPropagator::new(orbit_cfg.elements())
                    .map_err(ConfigError::from)?;
                state.orbit = Some(propagator.initial_state());
                Some(propagator)
            }
            None => None,
        };

        let epoch = Epoch::decode(config.simulation.epoch_yyddd)
            .map_err(ConfigError::from)?;
        let clock = SimulationClock::new(config.simulation.dt_sim, epoch);

        let control = ControlLaw::new(
            config.control.control_type,
            ControlTarget {
                q_c: quat_normalize(&config.control.qc),
                kp: config.control.kp,
                kd: config.control.kd,
            },
        );

        let mut scheduler = FrameScheduler::new();
        if config.sensors.gps.rate_hz > 0.0 {
            scheduler.arm(SensorKind::Gps, config.sensors.gps.rate_hz, config.simulation.dt_sim)?;
        }
        if config.sensors.gyro.rate_hz > 0.0 {
            scheduler.arm(SensorKind::Gyro, config.sensors.gyro.rate_hz, config.simulation.dt_sim)?;
        }

        let replay = match &config.logging.replay_file {
            Some(path) => Some(ReplayLog::create(path)?),
            None => None,
        };

        let protocol = ProtocolHandler::new(
            config.command.policy,
            config.command.stale_after_s,
        );

        Ok(Self {
            props,
            state,
            clock,
            integrator: AttitudeIntegrator::new(config.simulation.rtol, config.simulation.atol),
            orbit,
            control,
            scheduler,
            protocol,
            gps_model: GpsModel {
                sigma_pos_m: config.sensors.gps.sigma_pos_m,
                sigma_vel_mps: config.sensors.gps.sigma_vel_mps,
            },
            gyro_model: GyroModel::new(
                config.sensors.gyro.sigma_radps,
                config.sensors.gyro.bias_rw_sigma,
            ),
            rng: SensorRng::from_seed(config.sensors.rng_seed),
            replay,
            running: false,
            paused: false,
            trajectory: Vec::new(),
            compute_time: Duration::ZERO,
            derivative_evals: 0,
            config,
        })
    }

    pub fn start(&mut self) {
        self.running = true;
        self.paused = false;
        self.scheduler.start();
        info!(
            t_max = self.config.simulation.t_max,
            dt_sim = self.config.simulation.dt_sim,
            control = ?self.control.mode(),
            "plant started"
        );
    }

    /// Cooperative pause: the in-flight tick completes before the caller
    /// stops driving `step()`; channel phase and sequence numbers keep.
    pub fn pause(&mut self) {
        self.paused = true;
        info!(t_sim = self.clock.t_sim(), "plant paused");
    }

    pub fn resume(&mut self) {
        self.paused = false;
        info!(t_sim = self.clock.t_sim(), "plant resumed");
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.scheduler.stop();
        if let Some(log) = self.replay.as_mut() {
            if let Err(e) = log.flush() {
                warn!("replay log flush failed: {}", e);
            }
        }
        info!(t_sim = self.clock.t_sim(), "plant stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn run_complete(&self) -> bool {
        // Half-open grid tolerance: a tick landing on t_max (up to float
        // rounding of step * dt_sim) still belongs to the run.
        self.clock.t_sim() > self.config.simulation.t_max + 1e-6 * self.clock.dt_sim()
    }

    /// Advance the simulation by one internal tick. Returns the encoded
    /// sensor frames that became due this tick, ready for transmission
    /// (the replay log has already recorded them).
    pub fn step(&mut self) -> Result<Vec<String>, PlantError> {
        if !self.running || self.paused || self.run_complete() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let t_sim = self.clock.t_sim();

        let snapshot = self.state.snapshot(t_sim);
        self.trajectory.push(snapshot);

        let due = self.scheduler.collect_due(
            self.clock.step_index(),
            &snapshot,
            &self.gps_model,
            &mut self.gyro_model,
            &mut self.rng,
        );
        let mut outbound = Vec::with_capacity(due.len());
        for frame in due.iter() {
            let encoded = self.protocol.encode_sensor(frame)?;
            if let Some(log) = self.replay.as_mut() {
                log.record_out(encoded)?;
            }
            outbound.push(encoded.to_string());
        }

        let fallback = self
            .control
            .torque(&self.state.q_bi, &self.state.omega_b, &self.props);
        let torque = self.protocol.torque_for_step(t_sim, fallback);

        let step = self
            .integrator
            .step(
                &self.state.q_bi,
                &self.state.omega_b,
                &self.props,
                &torque,
                self.clock.dt_sim(),
            )
            .map_err(|source| PlantError::Dynamics { t_sim, source })?;
        self.state.q_bi = step.q_bi;
        self.state.omega_b = step.omega_b;
        self.derivative_evals += u64::from(step.evals);

        self.clock.advance();
        if let Some(orbit) = &self.orbit {
            self.state.orbit = Some(orbit.propagate(self.clock.t_sim()));
        }

        self.compute_time += started.elapsed();
        debug!(
            t_sim,
            frames = outbound.len(),
            evals = step.evals,
            "tick complete"
        );
        Ok(outbound)
    }

    /// Drive the run to its horizon, collecting every emitted frame.
    /// Useful for headless runs and tests; the server binary drives
    /// `step()` itself to interleave transmission and pacing.
    pub fn run_to_completion(&mut self) -> Result<Vec<String>, PlantError> {
        let mut all = Vec::new();
        while self.running && !self.paused && !self.run_complete() {
            all.extend(self.step()?);
        }
        Ok(all)
    }

    /// Feed one inbound NDJSON line through decode → validate → apply.
    /// A returned error means the frame was dropped; the simulation is
    /// unaffected and the caller decides how loudly to log it.
    pub fn ingest_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let frame = self.protocol.decode_actuator(line)?;
        let t_sim = self.clock.t_sim();
        match frame.payload {
            ActuatorPayload::Torque { torque_body_nm } => {
                self.protocol.accept_torque(torque_body_nm, t_sim);
                debug!(t_sim, ?torque_body_nm, "torque command accepted");
            }
            ActuatorPayload::ControlMode {
                control_mode,
                kp,
                kd,
                qc,
            } => {
                let current = *self.control.target();
                let target = ControlTarget {
                    q_c: qc.map(|q| quat_normalize(&q)).unwrap_or(current.q_c),
                    kp: kp.unwrap_or(current.kp),
                    kd: kd.unwrap_or(current.kd),
                };
                self.control.reconfigure(control_mode, target);
                info!(t_sim, mode = ?control_mode, "control law reconfigured");
            }
        }
        if let Some(log) = self.replay.as_mut() {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if let Err(e) = log.record_in(&json, t_sim) {
                        warn!("replay log write failed: {}", e);
                    }
                }
                Err(e) => warn!("inbound frame re-serialization failed: {}", e),
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot(self.clock.t_sim())
    }

    pub fn trajectory(&self) -> &[StateSnapshot] {
        &self.trajectory
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn control(&self) -> &ControlLaw {
        &self.control
    }

    pub fn protocol_stats(&self) -> &ProtocolStats {
        self.protocol.stats()
    }

    pub fn scheduler_stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    pub fn metrics(&self) -> RunMetrics {
        let compute_time_s = self.compute_time.as_secs_f64();
        let steps = self.clock.step_index();
        let evals = self.derivative_evals;
        RunMetrics {
            compute_time_s,
            steps,
            derivative_evals: evals,
            time_per_eval_s: if evals > 0 {
                compute_time_s / evals as f64
            } else {
                0.0
            },
            trajectory_bytes: self.trajectory.len() * std::mem::size_of::<StateSnapshot>(),
        }
    }

    /// Resample the recorded trajectory onto a uniform playback grid:
    /// linear interpolation for rates, slerp for attitude. The grid
    /// spacing is `playback_speed / sample_rate` simulation seconds, the
    /// convention the visualization client expects.
    pub fn resample(&self, sample_rate: f64, playback_speed: f64) -> PlaybackSeries {
        let mut series = PlaybackSeries::default();
        let Some(last) = self.trajectory.last() else {
            return series;
        };
        if !(sample_rate > 0.0) || !(playback_speed > 0.0) {
            return series;
        }
        let dt_grid = playback_speed / sample_rate;
        let dt_sim = self.clock.dt_sim();

        let mut t = 0.0;
        while t <= last.t_sim + 1e-12 {
            let idx = ((t / dt_sim).floor() as usize).min(self.trajectory.len() - 1);
            let a = &self.trajectory[idx];
            let sample = if idx + 1 < self.trajectory.len() {
                let b = &self.trajectory[idx + 1];
                let alpha = ((t - a.t_sim) / dt_sim).clamp(0.0, 1.0);
                (
                    slerp(&a.q_bi, &b.q_bi, alpha),
                    [
                        a.omega_b[0] + alpha * (b.omega_b[0] - a.omega_b[0]),
                        a.omega_b[1] + alpha * (b.omega_b[1] - a.omega_b[1]),
                        a.omega_b[2] + alpha * (b.omega_b[2] - a.omega_b[2]),
                    ],
                )
            } else {
                (a.q_bi, a.omega_b)
            };
            series.t.push(t);
            series.q_bi.push(sample.0);
            series.omega_b.push(sample.1);
            t += dt_grid;
        }
        series
    }
}
