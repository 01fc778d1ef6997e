use satplant::protocol::*;

fn torque_line(torque: [f64; 3]) -> String {
    serde_json::json!({
        "type": "actuator",
        "protocol_version": PROTOCOL_VERSION,
        "schema_version": "torque-v1",
        "actuator": "fsw",
        "t_sim": 1.5,
        "seq": 7,
        "payload": { "torque_body_nm": torque }
    })
    .to_string()
}

#[test]
fn test_sensor_frame_round_trip() {
    let frame = SensorFrame::gps(
        12.5,
        42,
        [6.9e6, -1.0e5, 3.2e4],
        [12.0, 7.4e3, -5.5],
    );
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let encoded = handler.encode_sensor(&frame).unwrap().to_string();
    let decoded = decode_sensor(&encoded).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn test_gyro_frame_round_trip() {
    let frame = SensorFrame::gyro(0.0, 1, [0.1, 0.0, -0.02]);
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let encoded = handler.encode_sensor(&frame).unwrap().to_string();
    let decoded = decode_sensor(&encoded).unwrap();
    assert_eq!(decoded, frame);
    assert_eq!(decoded.schema_version, SCHEMA_GYRO);
    assert!(decoded.t_sent.is_none());
}

#[test]
fn test_actuator_decode_valid_torque() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let frame = handler.decode_actuator(&torque_line([0.01, 0.0, -0.02])).unwrap();
    assert_eq!(frame.actuator, "fsw");
    assert_eq!(frame.seq, 7);
    assert_eq!(
        frame.payload,
        ActuatorPayload::Torque {
            torque_body_nm: [0.01, 0.0, -0.02]
        }
    );
    assert_eq!(handler.stats().frames_received, 1);
    assert_eq!(handler.stats().frames_rejected, 0);
}

#[test]
fn test_actuator_decode_control_mode() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let line = serde_json::json!({
        "type": "actuator",
        "protocol_version": "1.0",
        "schema_version": "ctrl-v1",
        "actuator": "fsw",
        "seq": 1,
        "payload": { "control_mode": "nonlinear", "kp": 2.0, "kd": 4.0 }
    })
    .to_string();
    let frame = handler.decode_actuator(&line).unwrap();
    match frame.payload {
        ActuatorPayload::ControlMode { kp, kd, qc, .. } => {
            assert_eq!(kp, Some(2.0));
            assert_eq!(kd, Some(4.0));
            assert_eq!(qc, None);
        }
        other => panic!("expected control mode payload, got {:?}", other),
    }
}

#[test]
fn test_rejects_invalid_json() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    assert_eq!(
        handler.decode_actuator("{not json"),
        Err(ProtocolError::InvalidJson)
    );
    assert_eq!(handler.stats().frames_rejected, 1);
}

#[test]
fn test_rejects_protocol_version_mismatch() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let line = torque_line([0.0; 3]).replace("\"1.0\"", "\"2.0\"");
    assert_eq!(
        handler.decode_actuator(&line),
        Err(ProtocolError::ProtocolVersionMismatch("2.0".to_string()))
    );
}

#[test]
fn test_rejects_unknown_schema() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let line = torque_line([0.0; 3]).replace("torque-v1", "torque-v9");
    assert_eq!(
        handler.decode_actuator(&line),
        Err(ProtocolError::UnknownSchema("torque-v9".to_string()))
    );
}

#[test]
fn test_rejects_payload_schema_mismatch() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    // Torque schema with a control-mode payload shape.
    let line = serde_json::json!({
        "type": "actuator",
        "protocol_version": "1.0",
        "schema_version": "torque-v1",
        "seq": 1,
        "payload": { "control_mode": "none" }
    })
    .to_string();
    assert_eq!(
        handler.decode_actuator(&line),
        Err(ProtocolError::SchemaViolation("torque-v1".to_string()))
    );
}

#[test]
fn test_rejects_non_finite_torque() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let line = torque_line([0.0; 3]).replace("[0.0,0.0,0.0]", "[1.0,null,0.0]");
    // A null component fails payload deserialization outright.
    assert!(handler.decode_actuator(&line).is_err());

    let inf_line = serde_json::json!({
        "type": "actuator",
        "protocol_version": "1.0",
        "schema_version": "torque-v1",
        "seq": 2,
        "payload": { "torque_body_nm": [f64::INFINITY, 0.0, 0.0] }
    })
    .to_string();
    assert!(handler.decode_actuator(&inf_line).is_err());
}

#[test]
fn test_rejects_sensor_frame_on_actuator_channel() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let frame = SensorFrame::gyro(0.0, 1, [0.0; 3]);
    let line = serde_json::to_string(&frame).unwrap();
    assert_eq!(
        handler.decode_actuator(&line),
        Err(ProtocolError::NotAnActuatorFrame)
    );
}

#[test]
fn test_rejects_oversized_frame() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    let line = format!(
        r#"{{"type":"actuator","padding":"{}"}}"#,
        "x".repeat(MAX_FRAME_SIZE)
    );
    assert_eq!(
        handler.decode_actuator(&line),
        Err(ProtocolError::FrameTooLarge)
    );
}

#[test]
fn test_hold_last_command_policy() {
    let mut handler = ProtocolHandler::new(CommandPolicy::HoldLastCommand, None);
    let fallback = [9.0, 9.0, 9.0];

    // No command yet: fallback applies.
    assert_eq!(handler.torque_for_step(0.0, fallback), fallback);

    handler.accept_torque([0.5, 0.0, 0.0], 0.0);
    // Held indefinitely across steps.
    for step in 1..50 {
        assert_eq!(
            handler.torque_for_step(step as f64 * 0.1, fallback),
            [0.5, 0.0, 0.0]
        );
    }
}

#[test]
fn test_fallback_policy_uses_command_once() {
    let mut handler = ProtocolHandler::new(CommandPolicy::FallbackToControlLaw, None);
    let fallback = [9.0, 9.0, 9.0];

    handler.accept_torque([0.5, 0.0, 0.0], 0.0);
    // Fresh for exactly the next step, then the control law takes over.
    assert_eq!(handler.torque_for_step(0.1, fallback), [0.5, 0.0, 0.0]);
    assert_eq!(handler.torque_for_step(0.2, fallback), fallback);

    // A new command re-arms freshness.
    handler.accept_torque([0.7, 0.0, 0.0], 0.3);
    assert_eq!(handler.torque_for_step(0.4, fallback), [0.7, 0.0, 0.0]);
}

#[test]
fn test_fallback_policy_staleness_window() {
    let mut handler = ProtocolHandler::new(CommandPolicy::FallbackToControlLaw, Some(1.0));
    let fallback = [0.0; 3];

    handler.accept_torque([0.5, 0.0, 0.0], 0.0);
    // Inside the window the cached command keeps applying.
    assert_eq!(handler.torque_for_step(0.5, fallback), [0.5, 0.0, 0.0]);
    assert_eq!(handler.torque_for_step(1.0, fallback), [0.5, 0.0, 0.0]);
    // Past the window it is stale.
    assert_eq!(handler.torque_for_step(1.5, fallback), fallback);
}

#[test]
fn test_rejected_frames_do_not_touch_command_cache() {
    let mut handler = ProtocolHandler::new(CommandPolicy::HoldLastCommand, None);
    handler.accept_torque([0.5, 0.0, 0.0], 0.0);
    let _ = handler.decode_actuator("{broken");
    let _ = handler.decode_actuator(&torque_line([1.0; 3]).replace("torque-v1", "bogus"));
    assert_eq!(handler.last_command_torque().unwrap().0, [0.5, 0.0, 0.0]);
    assert_eq!(handler.stats().frames_rejected, 2);
}

#[test]
fn test_encode_counts_frames_sent() {
    let mut handler = ProtocolHandler::new(CommandPolicy::default(), None);
    for seq in 1..=5 {
        let frame = SensorFrame::gyro(seq as f64, seq, [0.0; 3]);
        handler.encode_sensor(&frame).unwrap();
    }
    assert_eq!(handler.stats().frames_sent, 5);
}
