//! Append-only replay log.
//!
//! Every frame that crosses the protocol boundary is recorded as one
//! NDJSON line, in emission/receipt order, and never rewritten. The log
//! alone is enough to reconstruct a run's telemetry without the live
//! network path.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// One recorded boundary crossing. Inbound records carry the simulation
/// time of receipt; outbound frames already stamp their own `t_sim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_sim: Option<f64>,
    pub frame: serde_json::Value,
}

#[derive(Debug)]
pub struct ReplayLog {
    writer: BufWriter<File>,
}

impl ReplayLog {
    /// Create (truncate) the log file for a new run.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Record an emitted sensor frame (already serialized to its wire form).
    pub fn record_out(&mut self, frame_json: &str) -> std::io::Result<()> {
        writeln!(
            self.writer,
            r#"{{"direction":"out","frame":{}}}"#,
            frame_json
        )
    }

    /// Record an accepted inbound frame with its receipt time.
    pub fn record_in(&mut self, frame_json: &str, t_sim: f64) -> std::io::Result<()> {
        writeln!(
            self.writer,
            r#"{{"direction":"in","t_sim":{},"frame":{}}}"#,
            t_sim, frame_json
        )
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Read a replay log back into entries, skipping blank lines. A
/// malformed line is an error: the log is written by this process and
/// is append-only, so corruption means the file is not a replay log.
pub fn read_log(path: &Path) -> std::io::Result<Vec<ReplayEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ReplayEntry = serde_json::from_str(&line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        entries.push(entry);
    }
    Ok(entries)
}
