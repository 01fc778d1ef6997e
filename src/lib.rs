//! # Satellite Plant Simulator
//!
//! A hardware/software-in-the-loop "plant" for attitude control
//! development: it owns the authoritative simulation clock, propagates
//! true rotational (and two-body orbital) state, and serves that state
//! as multi-rate sensor telemetry while asynchronously accepting
//! actuator commands — exactly as if the flight software under test
//! were talking to real hardware.
//!
//! ## Features
//!
//! - **Adaptive attitude dynamics**: embedded RK4(5) integration of
//!   Euler's rigid-body equations with caller-set `rtol`/`atol` and
//!   per-step quaternion renormalization
//! - **Two-body orbit propagation**: Keplerian elements + fractional
//!   day-of-year epoch, advanced in closed form via Kepler's equation
//! - **Closed-loop control reference**: none / linear / nonlinear
//!   quaternion tracking laws, overridable by external torque commands
//! - **Multi-rate telemetry**: independently clocked GPS and gyro
//!   channels with exact on-grid cadences and gapless sequence numbers
//! - **Versioned NDJSON protocol**: schema-checked envelopes that
//!   degrade gracefully under malformed or stale input
//! - **Replay logging**: every boundary-crossing frame, append-only
//!
//! ## Quick Start
//!
//! ```rust
//! use satplant::{PlantAgent, PlantConfig};
//!
//! let mut agent = PlantAgent::new(PlantConfig::default()).unwrap();
//! agent.start();
//!
//! // Drive one internal tick; due sensor frames come back encoded.
//! let frames = agent.step().unwrap();
//! for frame in &frames {
//!     println!("{}", frame);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`agent`] - plant orchestrator and public API
//! - [`dynamics`] - adaptive rigid-body attitude integration
//! - [`orbit`] - Keplerian elements, epoch codec, two-body propagation
//! - [`control`] - closed-loop attitude control laws
//! - [`scheduler`] - per-channel frame cadence state machine
//! - [`protocol`] - frame envelopes, versioning, command cache
//! - [`sensors`] - GPS/gyro measurement models
//! - [`replay`] - append-only NDJSON replay log

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod control;
pub mod dynamics;
pub mod math;
pub mod orbit;
pub mod protocol;
pub mod replay;
pub mod scheduler;
pub mod sensors;
pub mod state;

// Re-export main public types for convenience
pub use agent::{PlantAgent, PlantError, RunMetrics};
pub use config::{ConfigError, PlantConfig};
pub use control::ControlMode;
pub use protocol::{ActuatorFrame, CommandPolicy, ProtocolError, SensorFrame};
pub use state::{SpacecraftProperties, SpacecraftState, StateSnapshot};
