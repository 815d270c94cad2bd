//! # Status snapshots.
//!
//! [`ProcessSnapshot`] is an immutable, self-contained projection of one record:
//! its command, run status and settings, captured under a single lock acquisition.
//! It owns all of its data and can be handed to a serializer or UI without further
//! synchronization.
//!
//! ## Wire shape
//! ```text
//! {
//!   "cmd": "echo hello",        "PID": 0,            "complete": false,
//!   "exitCode": 0,              "error": null,       "runTime": 0.0,
//!   "startTime": "1970-01-01T00:00:00Z",
//!   "env": [],                  "dir": "",
//!   "delayStart": 25,           "retryTimes": 3
//! }
//! ```
//! The environment is written under `env`. Older producers wrote it under `end`;
//! that key is still accepted when reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Settings, Status};

/// Point-in-time view of a child process record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    /// Program followed by its space-joined arguments.
    pub cmd: String,
    /// OS process id, `0` if never spawned.
    #[serde(rename = "PID")]
    pub pid: u32,
    /// `false` if stopped, signalled or not started.
    pub complete: bool,
    /// Exit code, meaningful only when `complete`.
    pub exit_code: i32,
    /// Process-level failure message.
    pub error: Option<String>,
    /// Seconds spent running, `0.0` if never started.
    pub run_time: f64,
    /// Spawn time; the Unix epoch if never started.
    pub start_time: DateTime<Utc>,
    /// `KEY=VALUE` environment entries.
    #[serde(alias = "end")]
    pub env: Vec<String>,
    /// Working directory.
    pub dir: String,
    /// Delay-before-start in milliseconds.
    pub delay_start: u64,
    /// Maximum number of restart attempts.
    pub retry_times: u32,
}

impl ProcessSnapshot {
    pub(crate) fn capture(cmd: String, settings: &Settings, status: &Status) -> Self {
        let start_time = status
            .started_at
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            cmd,
            pid: status.pid,
            complete: status.complete,
            exit_code: status.exit_code,
            error: status.error.clone(),
            run_time: status.runtime.as_secs_f64(),
            start_time,
            env: settings.env.clone(),
            dir: settings.dir.clone(),
            delay_start: settings.delay_start,
            retry_times: settings.retry_times,
        }
    }

    /// Returns `true` if the snapshot shows a spawned process.
    pub fn is_started(&self) -> bool {
        self.pid != 0 || self.start_time != DateTime::<Utc>::UNIX_EPOCH
    }

    /// Serializes the snapshot to a JSON string.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
