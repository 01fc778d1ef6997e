//! Wire-level telemetry/command protocol.
//!
//! Frames travel as newline-delimited JSON envelopes, schema-versioned
//! independently of the protocol version. Inbound decoding is strict:
//! anything malformed, unknown, or non-finite is rejected with a typed
//! error for the caller to log and drop — a bad peer can never halt the
//! simulation. Outbound serialization reuses a preallocated buffer and
//! refuses frames over `MAX_FRAME_SIZE`.

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::ControlMode;
use crate::math::{Quat, Vec3};

pub const PROTOCOL_VERSION: &str = "1.0";
pub const SCHEMA_GPS: &str = "gps-v1";
pub const SCHEMA_GYRO: &str = "gyro-v1";
pub const SCHEMA_TORQUE: &str = "torque-v1";
pub const SCHEMA_CONTROL: &str = "ctrl-v1";

pub const MAX_FRAME_SIZE: usize = 1024;

pub type FrameBuffer = ArrayString<MAX_FRAME_SIZE>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("invalid JSON envelope")]
    InvalidJson,
    #[error("frame exceeds the wire size limit")]
    FrameTooLarge,
    #[error("envelope is not an actuator frame")]
    NotAnActuatorFrame,
    #[error("unsupported protocol version '{0}'")]
    ProtocolVersionMismatch(String),
    #[error("unknown schema version '{0}'")]
    UnknownSchema(String),
    #[error("payload does not satisfy schema '{0}'")]
    SchemaViolation(String),
    #[error("payload contains non-finite values")]
    NonFiniteValue,
    #[error("frame serialization failed")]
    SerializationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sensor,
    Actuator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Gps,
    Gyro,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Gps => "gps",
            SensorKind::Gyro => "gyro",
        }
    }

    pub fn schema_version(&self) -> &'static str {
        match self {
            SensorKind::Gps => SCHEMA_GPS,
            SensorKind::Gyro => SCHEMA_GYRO,
        }
    }
}

/// Sensor-specific payload. A closed sum: adding a sensor type forces
/// every serialization and validation site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorPayload {
    Gps { r_eci: Vec3, v_eci: Vec3 },
    Gyro { omega_body: Vec3 },
}

/// Outbound telemetry envelope. Immutable once built; destroyed after
/// serialization and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub protocol_version: String,
    pub schema_version: String,
    pub sensor: SensorKind,
    pub t_sim: f64,
    /// Wall-clock send stamp; omitted by default so replay logs stay
    /// deterministic.
    pub t_sent: Option<f64>,
    pub seq: u64,
    pub payload: SensorPayload,
}

impl SensorFrame {
    pub fn gps(t_sim: f64, seq: u64, r_eci: Vec3, v_eci: Vec3) -> Self {
        Self::new(SensorKind::Gps, t_sim, seq, SensorPayload::Gps { r_eci, v_eci })
    }

    pub fn gyro(t_sim: f64, seq: u64, omega_body: Vec3) -> Self {
        Self::new(SensorKind::Gyro, t_sim, seq, SensorPayload::Gyro { omega_body })
    }

    fn new(sensor: SensorKind, t_sim: f64, seq: u64, payload: SensorPayload) -> Self {
        Self {
            kind: MessageKind::Sensor,
            protocol_version: PROTOCOL_VERSION.to_string(),
            schema_version: sensor.schema_version().to_string(),
            sensor,
            t_sim,
            t_sent: None,
            seq,
            payload,
        }
    }
}

/// Inbound command payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActuatorPayload {
    Torque {
        torque_body_nm: Vec3,
    },
    ControlMode {
        control_mode: ControlMode,
        #[serde(default)]
        kp: Option<f64>,
        #[serde(default)]
        kd: Option<f64>,
        #[serde(default)]
        qc: Option<Quat>,
    },
}

/// Inbound command envelope after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub protocol_version: String,
    pub schema_version: String,
    pub actuator: String,
    pub t_sim: Option<f64>,
    pub t_sent: Option<f64>,
    pub seq: u64,
    pub payload: ActuatorPayload,
}

/// Raw envelope used to stage schema validation: the payload stays a
/// JSON value until the schema version says what shape it must take.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: MessageKind,
    protocol_version: String,
    schema_version: String,
    #[serde(default)]
    actuator: Option<String>,
    #[serde(default)]
    t_sim: Option<f64>,
    #[serde(default)]
    t_sent: Option<f64>,
    seq: u64,
    payload: serde_json::Value,
}

/// What happens when no fresh command covers an integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    /// Re-apply the most recent accepted torque indefinitely.
    HoldLastCommand,
    /// Use a cached torque only while fresh; otherwise the control law.
    #[default]
    FallbackToControlLaw,
}

#[derive(Debug, Clone, Copy)]
struct CachedCommand {
    torque: Vec3,
    received_t_sim: f64,
    fresh: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_rejected: u64,
}

/// Encode/decode endpoint plus the last-known-command cache.
#[derive(Debug)]
pub struct ProtocolHandler {
    policy: CommandPolicy,
    stale_after_s: Option<f64>,
    encode_buffer: FrameBuffer,
    last_command: Option<CachedCommand>,
    stats: ProtocolStats,
}

impl ProtocolHandler {
    pub fn new(policy: CommandPolicy, stale_after_s: Option<f64>) -> Self {
        Self {
            policy,
            stale_after_s,
            encode_buffer: ArrayString::new(),
            last_command: None,
            stats: ProtocolStats::default(),
        }
    }

    pub fn policy(&self) -> CommandPolicy {
        self.policy
    }

    pub fn stats(&self) -> &ProtocolStats {
        &self.stats
    }

    /// Serialize a sensor frame into the reusable wire buffer (newline
    /// not included; the transport appends it).
    pub fn encode_sensor(&mut self, frame: &SensorFrame) -> Result<&str, ProtocolError> {
        self.encode_buffer.clear();
        let json =
            serde_json::to_string(frame).map_err(|_| ProtocolError::SerializationError)?;
        if json.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge);
        }
        self.encode_buffer.push_str(&json);
        self.stats.frames_sent += 1;
        Ok(&self.encode_buffer)
    }

    /// Decode and validate one inbound actuator line. Any error means
    /// the frame must be dropped (and logged) without touching the
    /// command cache.
    pub fn decode_actuator(&mut self, line: &str) -> Result<ActuatorFrame, ProtocolError> {
        match decode_actuator_inner(line) {
            Ok(frame) => {
                self.stats.frames_received += 1;
                Ok(frame)
            }
            Err(e) => {
                self.stats.frames_rejected += 1;
                Err(e)
            }
        }
    }

    /// Record an accepted torque command in the last-known-command cache.
    pub fn accept_torque(&mut self, torque_body_nm: Vec3, t_sim: f64) {
        self.last_command = Some(CachedCommand {
            torque: torque_body_nm,
            received_t_sim: t_sim,
            fresh: true,
        });
    }

    /// Torque to apply for the step starting at `t_sim`, given the
    /// control law's own output as the fallback.
    pub fn torque_for_step(&mut self, t_sim: f64, fallback: Vec3) -> Vec3 {
        let Some(cached) = self.last_command.as_mut() else {
            return fallback;
        };
        match self.policy {
            CommandPolicy::HoldLastCommand => cached.torque,
            CommandPolicy::FallbackToControlLaw => {
                let usable = match self.stale_after_s {
                    Some(window) => t_sim - cached.received_t_sim <= window,
                    None => cached.fresh,
                };
                cached.fresh = false;
                if usable {
                    cached.torque
                } else {
                    fallback
                }
            }
        }
    }

    /// Most recent accepted torque, if any (diagnostics).
    pub fn last_command_torque(&self) -> Option<(Vec3, f64)> {
        self.last_command.map(|c| (c.torque, c.received_t_sim))
    }
}

fn decode_actuator_inner(line: &str) -> Result<ActuatorFrame, ProtocolError> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge);
    }
    let raw: RawEnvelope =
        serde_json::from_str(line.trim()).map_err(|_| ProtocolError::InvalidJson)?;
    if raw.kind != MessageKind::Actuator {
        return Err(ProtocolError::NotAnActuatorFrame);
    }
    if raw.protocol_version != PROTOCOL_VERSION {
        return Err(ProtocolError::ProtocolVersionMismatch(raw.protocol_version));
    }

    let payload = match raw.schema_version.as_str() {
        SCHEMA_TORQUE => {
            let payload: ActuatorPayload = serde_json::from_value(raw.payload)
                .map_err(|_| ProtocolError::SchemaViolation(raw.schema_version.clone()))?;
            match payload {
                ActuatorPayload::Torque { torque_body_nm } => {
                    if torque_body_nm.iter().any(|v| !v.is_finite()) {
                        return Err(ProtocolError::NonFiniteValue);
                    }
                    payload
                }
                ActuatorPayload::ControlMode { .. } => {
                    return Err(ProtocolError::SchemaViolation(raw.schema_version))
                }
            }
        }
        SCHEMA_CONTROL => {
            let payload: ActuatorPayload = serde_json::from_value(raw.payload)
                .map_err(|_| ProtocolError::SchemaViolation(raw.schema_version.clone()))?;
            match payload {
                ActuatorPayload::ControlMode { kp, kd, qc, .. } => {
                    let finite = kp.map_or(true, f64::is_finite)
                        && kd.map_or(true, f64::is_finite)
                        && qc.map_or(true, |q| q.iter().all(|v| v.is_finite()));
                    if !finite {
                        return Err(ProtocolError::NonFiniteValue);
                    }
                    payload
                }
                ActuatorPayload::Torque { .. } => {
                    return Err(ProtocolError::SchemaViolation(raw.schema_version))
                }
            }
        }
        other => return Err(ProtocolError::UnknownSchema(other.to_string())),
    };

    Ok(ActuatorFrame {
        kind: raw.kind,
        protocol_version: raw.protocol_version,
        schema_version: raw.schema_version,
        actuator: raw.actuator.unwrap_or_else(|| "unknown".to_string()),
        t_sim: raw.t_sim,
        t_sent: raw.t_sent,
        seq: raw.seq,
        payload,
    })
}

/// Decode a sensor frame line (consumer side: monitor CLI, replay tools,
/// round-trip tests). Applies the same version and schema gates as the
/// actuator path.
pub fn decode_sensor(line: &str) -> Result<SensorFrame, ProtocolError> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge);
    }
    let frame: SensorFrame =
        serde_json::from_str(line.trim()).map_err(|_| ProtocolError::InvalidJson)?;
    if frame.protocol_version != PROTOCOL_VERSION {
        return Err(ProtocolError::ProtocolVersionMismatch(frame.protocol_version));
    }
    if frame.schema_version != frame.sensor.schema_version() {
        return Err(ProtocolError::UnknownSchema(frame.schema_version));
    }
    let schema_ok = matches!(
        (frame.sensor, &frame.payload),
        (SensorKind::Gps, SensorPayload::Gps { .. })
            | (SensorKind::Gyro, SensorPayload::Gyro { .. })
    );
    if !schema_ok {
        return Err(ProtocolError::SchemaViolation(frame.schema_version));
    }
    Ok(frame)
}
