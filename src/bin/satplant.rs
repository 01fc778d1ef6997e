use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use satplant::protocol::{decode_sensor, SensorPayload, PROTOCOL_VERSION};
use satplant::replay::{read_log, Direction};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::net::UdpSocket;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_SENSOR_PORT: &str = "10001";
const DEFAULT_ACTUATOR_PORT: &str = "10002";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("satplant")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  Satellite Plant Simulator - operator console")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Plant simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Monitor the live sensor frame stream")
                .arg(
                    Arg::with_name("port")
                        .short("p")
                        .long("port")
                        .value_name("PORT")
                        .help("Sensor stream UDP port")
                        .takes_value(true)
                        .default_value(DEFAULT_SENSOR_PORT),
                ),
        )
        .subcommand(
            SubCommand::with_name("torque")
                .about("🔧 Send a body torque command to the plant")
                .arg(Arg::with_name("x").help("Torque about body x [N·m]").required(true))
                .arg(Arg::with_name("y").help("Torque about body y [N·m]").required(true))
                .arg(Arg::with_name("z").help("Torque about body z [N·m]").required(true))
                .arg(
                    Arg::with_name("port")
                        .short("p")
                        .long("port")
                        .value_name("PORT")
                        .help("Actuator command UDP port")
                        .takes_value(true)
                        .default_value(DEFAULT_ACTUATOR_PORT),
                ),
        )
        .subcommand(
            SubCommand::with_name("mode")
                .about("🎛️  Reconfigure the plant's control law")
                .arg(
                    Arg::with_name("mode")
                        .help("Control mode")
                        .required(true)
                        .possible_values(&["none", "linear", "nonlinear"]),
                )
                .arg(
                    Arg::with_name("kp")
                        .long("kp")
                        .value_name("KP")
                        .help("Proportional gain")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("kd")
                        .long("kd")
                        .value_name("KD")
                        .help("Derivative gain")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("qc")
                        .long("qc")
                        .value_name("X,Y,Z,W")
                        .help("Target quaternion, scalar-last, comma separated")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("port")
                        .short("p")
                        .long("port")
                        .value_name("PORT")
                        .help("Actuator command UDP port")
                        .takes_value(true)
                        .default_value(DEFAULT_ACTUATOR_PORT),
                ),
        )
        .subcommand(
            SubCommand::with_name("replay")
                .about("🗂️  Summarize a replay log")
                .arg(
                    Arg::with_name("file")
                        .help("Path to the replay log")
                        .required(true),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap().to_string();
    let format = matches.value_of("format").unwrap().to_string();

    match matches.subcommand() {
        ("monitor", Some(sub_matches)) => {
            handle_monitor(sub_matches, &format).await?;
        }
        ("torque", Some(sub_matches)) => {
            handle_torque(sub_matches, &host, &format).await?;
        }
        ("mode", Some(sub_matches)) => {
            handle_mode(sub_matches, &host, &format).await?;
        }
        ("replay", Some(sub_matches)) => {
            handle_replay(sub_matches, &format)?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the simulator", "satplant-simulator".bright_cyan());
            println!("  {} Watch live telemetry", "satplant monitor".bright_cyan());
            println!("  {} Command a torque", "satplant torque 0.01 0 0".bright_cyan());
        }
    }

    Ok(())
}

async fn handle_monitor(
    matches: &ArgMatches<'_>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let port: u16 = matches.value_of("port").unwrap().parse()?;
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    println!(
        "{}",
        format!("📡 Monitoring sensor frames on UDP port {} (Ctrl+C to stop)...", port)
            .bright_blue()
            .bold()
    );

    let mut buf = vec![0u8; 65535];
    loop {
        let (n, _) = socket.recv_from(&mut buf).await?;
        let text = String::from_utf8_lossy(&buf[..n]);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match format {
                "json" => println!("{}", line),
                _ => print_frame_line(line, format),
            }
        }
    }
}

fn print_frame_line(line: &str, format: &str) {
    match decode_sensor(line) {
        Ok(frame) => {
            let payload = match frame.payload {
                SensorPayload::Gyro { omega_body } => format!(
                    "ω = [{:+.5} {:+.5} {:+.5}] rad/s",
                    omega_body[0], omega_body[1], omega_body[2]
                ),
                SensorPayload::Gps { r_eci, v_eci } => format!(
                    "|r| = {:.1} km  |v| = {:.1} m/s",
                    (r_eci[0].powi(2) + r_eci[1].powi(2) + r_eci[2].powi(2)).sqrt() / 1e3,
                    (v_eci[0].powi(2) + v_eci[1].powi(2) + v_eci[2].powi(2)).sqrt()
                ),
            };
            if format == "compact" {
                println!(
                    "[{:>9.3}] {} #{} {}",
                    frame.t_sim,
                    frame.sensor.as_str(),
                    frame.seq,
                    payload
                );
            } else {
                println!(
                    "│ {:>9.3} │ {:>4} │ {:>6} │ {} │",
                    frame.t_sim,
                    frame.sensor.as_str().bright_cyan(),
                    frame.seq,
                    payload.bright_white()
                );
            }
        }
        Err(e) => {
            println!("{} {}", "⚠️  undecodable frame:".yellow(), e.to_string().bright_red());
        }
    }
}

async fn handle_torque(
    matches: &ArgMatches<'_>,
    host: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let torque: Vec<f64> = ["x", "y", "z"]
        .iter()
        .map(|axis| matches.value_of(axis).unwrap().parse::<f64>())
        .collect::<Result<_, _>>()?;
    let port: u16 = matches.value_of("port").unwrap().parse()?;

    let frame = serde_json::json!({
        "type": "actuator",
        "protocol_version": PROTOCOL_VERSION,
        "schema_version": "torque-v1",
        "actuator": "console",
        "seq": 1,
        "payload": { "torque_body_nm": torque }
    });
    send_actuator_frame(host, port, &frame.to_string()).await?;

    match format {
        "json" => println!("{}", frame),
        "compact" => println!("{}", "OK".bright_green()),
        _ => println!(
            "{} {} set to [{} {} {}] N·m",
            "✅".green(),
            "Commanded torque".bright_white(),
            torque[0],
            torque[1],
            torque[2]
        ),
    }
    Ok(())
}

async fn handle_mode(
    matches: &ArgMatches<'_>,
    host: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = matches.value_of("mode").unwrap();
    let port: u16 = matches.value_of("port").unwrap().parse()?;

    let mut payload = serde_json::json!({ "control_mode": mode });
    if let Some(kp) = matches.value_of("kp") {
        payload["kp"] = serde_json::json!(kp.parse::<f64>()?);
    }
    if let Some(kd) = matches.value_of("kd") {
        payload["kd"] = serde_json::json!(kd.parse::<f64>()?);
    }
    if let Some(qc) = matches.value_of("qc") {
        let components: Vec<f64> = qc
            .split(',')
            .map(|c| c.trim().parse::<f64>())
            .collect::<Result<_, _>>()?;
        if components.len() != 4 {
            return Err("target quaternion needs exactly 4 components".into());
        }
        payload["qc"] = serde_json::json!(components);
    }

    let frame = serde_json::json!({
        "type": "actuator",
        "protocol_version": PROTOCOL_VERSION,
        "schema_version": "ctrl-v1",
        "actuator": "console",
        "seq": 1,
        "payload": payload
    });
    send_actuator_frame(host, port, &frame.to_string()).await?;

    match format {
        "json" => println!("{}", frame),
        "compact" => println!("{}", "OK".bright_green()),
        _ => println!(
            "{} {} set to {}",
            "✅".green(),
            "Control mode".bright_white(),
            mode.bright_cyan()
        ),
    }
    Ok(())
}

async fn send_actuator_frame(
    host: &str,
    port: u16,
    frame: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((host, port)).await?;
    socket.send(format!("{}\n", frame).as_bytes()).await?;
    Ok(())
}

fn handle_replay(
    matches: &ArgMatches<'_>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = matches.value_of("file").unwrap();
    let entries = read_log(Path::new(path))?;

    // Per-sensor frame counts and sequence continuity.
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut last_seq: BTreeMap<String, u64> = BTreeMap::new();
    let mut gaps = 0u64;
    let mut inbound = 0u64;
    let mut t_last = 0.0f64;

    for entry in &entries {
        match entry.direction {
            Direction::In => inbound += 1,
            Direction::Out => {
                let sensor = entry.frame["sensor"].as_str().unwrap_or("?").to_string();
                let seq = entry.frame["seq"].as_u64().unwrap_or(0);
                if let Some(prev) = last_seq.get(&sensor) {
                    if seq != prev + 1 {
                        gaps += 1;
                    }
                }
                last_seq.insert(sensor.clone(), seq);
                *counts.entry(sensor).or_insert(0) += 1;
                if let Some(t) = entry.frame["t_sim"].as_f64() {
                    t_last = t_last.max(t);
                }
            }
        }
    }

    if format == "json" {
        let summary = serde_json::json!({
            "entries": entries.len(),
            "inbound": inbound,
            "outbound_per_sensor": counts,
            "sequence_gaps": gaps,
            "t_sim_end": t_last,
        });
        println!("{}", summary);
        return Ok(());
    }

    println!("{}", "🗂️  Replay Log Summary".bright_blue().bold());
    println!("{}", "═════════════════════".bright_blue());
    println!("Entries: {}", entries.len().to_string().bright_cyan());
    println!("Inbound commands: {}", inbound.to_string().bright_cyan());
    for (sensor, count) in &counts {
        println!(
            "Outbound {}: {} frames (last seq {})",
            sensor.bright_white(),
            count.to_string().bright_cyan(),
            last_seq.get(sensor).copied().unwrap_or(0)
        );
    }
    let gaps_str = if gaps == 0 {
        "none".bright_green()
    } else {
        gaps.to_string().bright_red()
    };
    println!("Sequence gaps: {}", gaps_str);
    println!("Simulation span: 0.0 – {:.3} s", t_last);
    Ok(())
}
