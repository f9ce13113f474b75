//! Append-only latency CSV sink shared by the proxy and the bridge's
//! diagnostic mode (spec §4.11).

use std::{
    fs::OpenOptions,
    io,
    path::Path,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LatencyRecorderError {
    #[error("failed to open latency CSV {path}: {source}")]
    Open { path: String, #[source] source: io::Error },
    #[error("failed to write latency row: {0}")]
    Write(#[from] csv::Error),
}

/// One observed telemetry or valve-state message, timed at receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub now_ns: u64,
    pub msg_ns: u64,
    pub board: &'static str,
}

impl LatencySample {
    pub fn diff_ns(&self) -> i64 {
        self.now_ns as i64 - self.msg_ns as i64
    }
}

/// Append-only CSV sink with columns `now_ns, msg_ns, diff_ns, board`. The
/// file is opened in append mode; a header row is written only when the
/// file is empty or did not previously exist, so repeated process restarts
/// accumulate one continuous log (spec §4.11, grounded in
/// `proxy.py::_init_output`/`_parse_and_record`).
pub struct LatencyRecorder {
    writer: csv::Writer<std::fs::File>,
}

impl LatencyRecorder {
    pub fn open(path: &Path) -> Result<Self, LatencyRecorderError> {
        let needs_header = !path.exists() || path.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LatencyRecorderError::Open { path: path.display().to_string(), source })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(["now_ns", "msg_ns", "diff_ns", "board"])?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    pub fn record(&mut self, sample: LatencySample) -> Result<(), LatencyRecorderError> {
        self.writer.write_record([
            sample.now_ns.to_string(),
            sample.msg_ns.to_string(),
            sample.diff_ns().to_string(),
            sample.board.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}
