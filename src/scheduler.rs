//! Multi-rate sensor frame scheduling.
//!
//! Each sensor channel runs `Idle → Armed → Emitting → Stopped` and
//! emits on its own cadence, multiplexed onto the single simulation
//! clock. Due times are integer step counts — exact multiples of the
//! channel period on the simulation-time grid — never accumulated
//! wall-clock deltas, so channels cannot drift relative to each other
//! or to `t_sim`. Pausing simply stops ticks from arriving; phase and
//! sequence numbering survive untouched.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::config::{period_steps, ConfigError};
use crate::protocol::{SensorFrame, SensorKind};
use crate::sensors::{GpsModel, GyroModel, SensorRng};
use crate::state::StateSnapshot;

pub const MAX_CHANNELS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Idle,
    Armed,
    Emitting,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorChannel {
    kind: SensorKind,
    period_steps: u64,
    next_due_step: u64,
    seq: u64,
    state: ChannelState,
}

impl SensorChannel {
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Last assigned sequence number (0 before the first emission).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn period_steps(&self) -> u64 {
        self.period_steps
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub frames_emitted: u64,
    pub ticks_seen: u64,
}

#[derive(Debug)]
pub struct FrameScheduler {
    channels: Vec<SensorChannel, MAX_CHANNELS>,
    stats: SchedulerStats,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Register a channel at a fixed cadence. The period must land
    /// exactly on the `dt_sim` grid; the first emission is due at
    /// `t_sim = 0`.
    pub fn arm(
        &mut self,
        kind: SensorKind,
        rate_hz: f64,
        dt_sim: f64,
    ) -> Result<(), ConfigError> {
        let steps = period_steps(kind.as_str(), rate_hz, dt_sim)?;
        let channel = SensorChannel {
            kind,
            period_steps: steps,
            next_due_step: 0,
            seq: 0,
            state: ChannelState::Armed,
        };
        // Capacity is fixed at compile time; the config only knows two kinds.
        let _ = self.channels.push(channel);
        Ok(())
    }

    /// Armed channels begin emitting.
    pub fn start(&mut self) {
        for ch in self.channels.iter_mut() {
            if ch.state == ChannelState::Armed {
                ch.state = ChannelState::Emitting;
            }
        }
    }

    /// Permanently stop all channels (end of run).
    pub fn stop(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.state = ChannelState::Stopped;
        }
    }

    pub fn channel(&self, kind: SensorKind) -> Option<&SensorChannel> {
        self.channels.iter().find(|c| c.kind == kind)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Build the frames due at this tick from a read-only state
    /// snapshot. Sequence numbers advance by exactly one per emitted
    /// frame, per channel.
    pub fn collect_due(
        &mut self,
        step_index: u64,
        snapshot: &StateSnapshot,
        gps_model: &GpsModel,
        gyro_model: &mut GyroModel,
        rng: &mut SensorRng,
    ) -> Vec<SensorFrame, MAX_CHANNELS> {
        self.stats.ticks_seen += 1;
        let mut due: Vec<SensorFrame, MAX_CHANNELS> = Vec::new();
        for ch in self.channels.iter_mut() {
            if ch.state != ChannelState::Emitting || step_index < ch.next_due_step {
                continue;
            }
            let frame = match ch.kind {
                SensorKind::Gps => {
                    // Config guarantees an orbit exists when GPS is armed.
                    let Some(orbit) = snapshot.orbit.as_ref() else {
                        continue;
                    };
                    let (r_meas, v_meas) = gps_model.measure(orbit, rng);
                    SensorFrame::gps(snapshot.t_sim, ch.seq + 1, r_meas, v_meas)
                }
                SensorKind::Gyro => {
                    let omega_meas = gyro_model.measure(&snapshot.omega_b, rng);
                    SensorFrame::gyro(snapshot.t_sim, ch.seq + 1, omega_meas)
                }
            };
            ch.seq += 1;
            ch.next_due_step += ch.period_steps;
            self.stats.frames_emitted += 1;
            let _ = due.push(frame);
        }
        due
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::QUAT_IDENTITY;
    use crate::state::OrbitalState;

    fn snapshot(t_sim: f64) -> StateSnapshot {
        StateSnapshot {
            t_sim,
            q_bi: QUAT_IDENTITY,
            omega_b: [0.1, 0.0, 0.0],
            orbit: Some(OrbitalState {
                r_eci: [7.0e6, 0.0, 0.0],
                v_eci: [0.0, 7.5e3, 0.0],
            }),
        }
    }

    fn quiet_models() -> (GpsModel, GyroModel, SensorRng) {
        (
            GpsModel {
                sigma_pos_m: 0.0,
                sigma_vel_mps: 0.0,
            },
            GyroModel::new(0.0, None),
            SensorRng::from_seed(0),
        )
    }

    #[test]
    fn armed_channels_emit_only_after_start() {
        let mut sched = FrameScheduler::new();
        sched.arm(SensorKind::Gyro, 1.0, 0.1).unwrap();
        assert_eq!(
            sched.channel(SensorKind::Gyro).unwrap().state(),
            ChannelState::Armed
        );

        let (gps, mut gyro, mut rng) = quiet_models();
        let none = sched.collect_due(0, &snapshot(0.0), &gps, &mut gyro, &mut rng);
        assert!(none.is_empty());

        sched.start();
        let due = sched.collect_due(0, &snapshot(0.0), &gps, &mut gyro, &mut rng);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].seq, 1);
    }

    #[test]
    fn cadence_lands_on_exact_step_multiples() {
        let mut sched = FrameScheduler::new();
        sched.arm(SensorKind::Gyro, 1.0, 0.1).unwrap(); // every 10 steps
        sched.start();
        let (gps, mut gyro, mut rng) = quiet_models();

        let mut emitted_at = std::vec::Vec::new();
        for step in 0..=30 {
            let due = sched.collect_due(step, &snapshot(step as f64 * 0.1), &gps, &mut gyro, &mut rng);
            if !due.is_empty() {
                emitted_at.push(step);
            }
        }
        assert_eq!(emitted_at, vec![0, 10, 20, 30]);
    }

    #[test]
    fn sequence_numbers_increase_by_one() {
        let mut sched = FrameScheduler::new();
        sched.arm(SensorKind::Gyro, 10.0, 0.1).unwrap(); // every step
        sched.start();
        let (gps, mut gyro, mut rng) = quiet_models();

        for step in 0..5 {
            let due = sched.collect_due(step, &snapshot(step as f64 * 0.1), &gps, &mut gyro, &mut rng);
            assert_eq!(due.len(), 1);
            assert_eq!(due[0].seq, step + 1);
        }
    }

    #[test]
    fn gap_in_ticks_preserves_phase_and_sequence() {
        let mut sched = FrameScheduler::new();
        sched.arm(SensorKind::Gyro, 1.0, 0.1).unwrap();
        sched.start();
        let (gps, mut gyro, mut rng) = quiet_models();

        let first = sched.collect_due(0, &snapshot(0.0), &gps, &mut gyro, &mut rng);
        assert_eq!(first[0].seq, 1);

        // A pause means the tick counter simply does not advance; the
        // next tick the scheduler sees continues where the run left off.
        let second = sched.collect_due(10, &snapshot(1.0), &gps, &mut gyro, &mut rng);
        assert_eq!(second[0].seq, 2);
        assert!((second[0].t_sim - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stopped_channels_never_emit() {
        let mut sched = FrameScheduler::new();
        sched.arm(SensorKind::Gyro, 1.0, 0.1).unwrap();
        sched.start();
        sched.stop();
        let (gps, mut gyro, mut rng) = quiet_models();
        let due = sched.collect_due(0, &snapshot(0.0), &gps, &mut gyro, &mut rng);
        assert!(due.is_empty());
    }

    #[test]
    fn off_grid_rate_is_rejected() {
        let mut sched = FrameScheduler::new();
        assert!(sched.arm(SensorKind::Gyro, 3.0, 0.1).is_err());
    }
}
