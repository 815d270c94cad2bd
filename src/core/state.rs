//! # Per-record shared state.
//!
//! Every [`ChildProcess`](crate::ChildProcess) owns exactly one [`Guarded`] value holding
//! both its launch configuration and the run status written by its process handle.
//! Keeping them behind one lock means a snapshot never pairs config from one moment
//! with status from another, and there is no lock ordering to get wrong.
//!
//! ```text
//! ChildProcess ──┐                        ┌── StatusCell (handle side, status only)
//!                ▼                        ▼
//!           Arc<Guarded<Shared { settings, run }>>
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::guarded::Guarded;

/// Lifecycle phase of one record instance.
///
/// ```text
/// Created ──► Started ──► Running ──► Succeeded
///                │                ├─► Failed
///                └─► Failed       └─► Stopped
/// ```
/// Terminal phases are final for the record; a new run needs a clone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Constructed (or cloned), nothing launched yet.
    #[default]
    Created,
    /// Launch claimed; the handle is spawning the command.
    Started,
    /// The OS process exists.
    Running,
    /// Exited on its own with code 0.
    Succeeded,
    /// Spawn failed, or exited on its own with a non-zero code.
    Failed,
    /// Terminated by `stop` or a signal.
    Stopped,
}

impl Phase {
    /// Returns `true` once launch has been claimed.
    pub fn is_started(self) -> bool {
        !matches!(self, Phase::Created)
    }

    /// Returns `true` for `Succeeded`, `Failed` and `Stopped`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed | Phase::Stopped)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Started => "started",
            Phase::Running => "running",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
            Phase::Stopped => "stopped",
        }
    }
}

/// Mutable launch and restart settings of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settings {
    pub dir: String,
    pub env: Vec<String>,
    pub delay_start: u64,
    pub retry_times: u32,
}

/// Run status fields, written only through a [`StatusCell`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    /// OS process id, `0` until spawned.
    pub pid: u32,
    /// Current lifecycle phase.
    pub phase: Phase,
    /// `true` only when the process exited on its own.
    pub complete: bool,
    /// Exit code; `-1` when stopped or signalled.
    pub exit_code: i32,
    /// Process-level failure message.
    pub error: Option<String>,
    /// Wall-clock time the process was spawned.
    pub started_at: Option<SystemTime>,
    /// Wall-clock time the process reached a terminal phase.
    pub stopped_at: Option<SystemTime>,
}

impl RunState {
    /// Projects the status as seen at `now`.
    pub fn status_at(&self, now: SystemTime) -> Status {
        let runtime = match self.started_at {
            Some(start) => self
                .stopped_at
                .unwrap_or(now)
                .duration_since(start)
                .unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        };
        Status {
            pid: self.pid,
            complete: self.complete,
            exit_code: self.exit_code,
            error: self.error.clone(),
            started_at: self.started_at,
            runtime,
        }
    }
}

/// Point-in-time status of a child process.
///
/// Before start every field is zero/false/`None`; after termination the values are final.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// OS process id, `0` if never spawned.
    pub pid: u32,
    /// `false` if never started, still running, stopped or signalled.
    pub complete: bool,
    /// Exit code, meaningful only when `complete`.
    pub exit_code: i32,
    /// Process-level failure (spawn or wait error).
    pub error: Option<String>,
    /// Spawn time, `None` if never spawned.
    pub started_at: Option<SystemTime>,
    /// Time spent running so far (or in total, once terminal).
    pub runtime: Duration,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub settings: Settings,
    pub run: RunState,
}

pub(crate) type SharedRef = Arc<Guarded<Shared>>;

/// Status-only view of a record's lock, handed to its process handle.
///
/// Handles write run status through this type and can never touch the record's
/// configuration, yet every write lands in the same lock domain the record reads from.
#[derive(Clone, Debug)]
pub struct StatusCell {
    shared: SharedRef,
}

impl StatusCell {
    pub(crate) fn new(shared: SharedRef) -> Self {
        Self { shared }
    }

    /// Creates a cell not attached to any record (for handles used on their own).
    pub fn detached() -> Self {
        Self::new(Arc::new(Guarded::new(Shared {
            settings: Settings {
                dir: String::new(),
                env: Vec::new(),
                delay_start: 0,
                retry_times: 0,
            },
            run: RunState::default(),
        })))
    }

    /// Returns the current status.
    pub fn status(&self) -> Status {
        let now = SystemTime::now();
        self.shared.read(|s| s.run.status_at(now))
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.shared.read(|s| s.run.phase)
    }

    /// Runs `f` with shared access to the run state.
    pub fn read<R>(&self, f: impl FnOnce(&RunState) -> R) -> R {
        self.shared.read(|s| f(&s.run))
    }

    /// Runs `f` with exclusive access to the run state.
    pub fn update<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        self.shared.write(|s| f(&mut s.run))
    }
}
