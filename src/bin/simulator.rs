use satplant::agent::PlantAgent;
use satplant::config::PlantConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{error, info, warn};

const SENSOR_PORT: u16 = 10001; // plant -> flight software
const ACTUATOR_PORT: u16 = 10002; // flight software -> plant

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("🛰️  Satellite Plant Simulator");
    println!("=============================");

    // Configuration: optional JSON file path as the only argument. The
    // library itself only ever sees the parsed struct.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            let config: PlantConfig = serde_json::from_str(&text)?;
            info!("loaded configuration from {}", path);
            config
        }
        None => PlantConfig::default(),
    };

    let dt_sim = config.simulation.dt_sim;
    let time_scale = config.simulation.time_scale;

    let agent = Arc::new(Mutex::new(PlantAgent::new(config)?));
    {
        let mut agent_guard = agent.lock().await;
        agent_guard.start();
    }

    // Outbound sensor channel: fire-and-forget datagrams to the flight
    // software port.
    let sensor_socket = UdpSocket::bind("0.0.0.0:0").await?;
    sensor_socket
        .connect(("127.0.0.1", SENSOR_PORT))
        .await?;

    // Inbound actuator channel runs on its own task so a receive in
    // progress can never stall a due emission.
    let actuator_agent = Arc::clone(&agent);
    let actuator_task = tokio::spawn(async move {
        if let Err(e) = receive_actuator_frames(actuator_agent).await {
            error!("actuator receiver error: {}", e);
        }
    });

    // Main simulation loop, paced so that dt_sim simulation seconds take
    // dt_sim / time_scale wall seconds. An infinite time_scale runs the
    // clock flat-out.
    let mut interval = if time_scale.is_finite() {
        let tick = time::interval(Duration::from_secs_f64(dt_sim / time_scale));
        Some(tick)
    } else {
        None
    };

    loop {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        } else {
            tokio::task::yield_now().await;
        }

        let (frames, complete) = {
            let mut agent_guard = agent.lock().await;
            match agent_guard.step() {
                Ok(frames) => (frames, agent_guard.run_complete()),
                Err(e) => {
                    // Numerical failure invalidates the physical model;
                    // halt cleanly rather than emit undefined state.
                    error!("❌ plant error: {}", e);
                    break;
                }
            }
        };

        for frame in &frames {
            // Transport errors are logged and implicitly retried next
            // tick; they never touch the simulation clock.
            if let Err(e) = sensor_socket.send(format!("{}\n", frame).as_bytes()).await {
                warn!("sensor frame send failed: {}", e);
            }
        }

        if complete {
            info!("simulation horizon reached");
            break;
        }
    }

    let metrics = {
        let mut agent_guard = agent.lock().await;
        agent_guard.stop();
        agent_guard.metrics()
    };

    actuator_task.abort();

    println!("🚀 Plant simulator stopped");
    println!(
        "   steps: {}, derivative evals: {}, compute: {:.3} s ({:.2} µs/eval)",
        metrics.steps,
        metrics.derivative_evals,
        metrics.compute_time_s,
        metrics.time_per_eval_s * 1e6
    );

    Ok(())
}

async fn receive_actuator_frames(
    agent: Arc<Mutex<PlantAgent>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let socket = UdpSocket::bind(("0.0.0.0", ACTUATOR_PORT)).await?;
    info!("📡 listening for actuator frames on UDP port {}", ACTUATOR_PORT);

    let mut buf = vec![0u8; 65535];
    loop {
        let (n, addr) = socket.recv_from(&mut buf).await?;
        let Ok(text) = std::str::from_utf8(&buf[..n]) else {
            warn!("dropping non-UTF8 datagram from {}", addr);
            continue;
        };
        // A datagram may batch several newline-delimited envelopes.
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut agent_guard = agent.lock().await;
            if let Err(e) = agent_guard.ingest_line(line) {
                warn!("dropping actuator frame from {}: {}", addr, e);
            }
        }
    }
}
