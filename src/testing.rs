//! # In-memory process handles.
//!
//! [`FakeLauncher`] hands out [`FakeHandle`]s that never touch the OS. Tests (and dry
//! runs of restart loops) drive them explicitly: `start` moves a handle to `Running`
//! with a made-up pid, then [`FakeHandle::exit`], [`FakeHandle::crash`] or `stop`
//! settle it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::core::{Config, Phase, Status, StatusCell};
use crate::error::ProcessError;
use crate::process::{
    BufferedOutput, HandleRef, Launch, Launcher, OutputBus, OutputLine, OutputStream,
    ProcessHandle, SIGNALED_EXIT_CODE,
};

/// First pid handed out by a [`FakeLauncher`].
const FIRST_FAKE_PID: u32 = 10_000;

/// Launcher producing [`FakeHandle`]s and remembering every one of them.
#[derive(Debug)]
pub struct FakeLauncher {
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    next_pid: Arc<AtomicU32>,
}

impl FakeLauncher {
    /// Creates an empty launcher.
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            next_pid: Arc::new(AtomicU32::new(FIRST_FAKE_PID)),
        }
    }

    /// Creates the launcher behind an `Arc`, ready to pass to a builder.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of handles created so far.
    pub fn created(&self) -> usize {
        self.handles.lock().len()
    }

    /// Number of handles that were started.
    pub fn launches(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|h| h.launch().is_some())
            .count()
    }

    /// Returns the `n`-th handle created (0-based).
    pub fn handle_at(&self, n: usize) -> Option<Arc<FakeHandle>> {
        self.handles.lock().get(n).cloned()
    }

    /// Returns the launch received by the most recently started handle.
    pub fn last_launch(&self) -> Option<Launch> {
        self.handles.lock().iter().rev().find_map(|h| h.launch())
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for FakeLauncher {
    fn handle(&self, cell: StatusCell, cfg: &Config) -> HandleRef {
        let handle = Arc::new(FakeHandle {
            cell,
            bus: OutputBus::new(cfg.output_capacity_clamped()),
            buffer: Mutex::new(BufferedOutput::default()),
            launch: Mutex::new(None),
            next_pid: Arc::clone(&self.next_pid),
            done: watch::channel(false).0,
        });
        self.handles.lock().push(Arc::clone(&handle));
        handle
    }
}

/// Handle whose "process" is driven by the test.
#[derive(Debug)]
pub struct FakeHandle {
    cell: StatusCell,
    bus: OutputBus,
    buffer: Mutex<BufferedOutput>,
    launch: Mutex<Option<Launch>>,
    next_pid: Arc<AtomicU32>,
    done: watch::Sender<bool>,
}

impl FakeHandle {
    /// Returns the launch this handle was started with.
    pub fn launch(&self) -> Option<Launch> {
        self.launch.lock().clone()
    }

    /// Emits a line as if the process had printed it.
    pub fn emit(&self, stream: OutputStream, text: &str) {
        self.buffer.lock().push(stream, text.to_string());
        self.bus.publish(stream, text);
    }

    /// Ends the run with `code`, as if the process exited on its own.
    pub fn exit(&self, code: i32) {
        self.settle(|r| {
            r.complete = true;
            r.exit_code = code;
            r.phase = if code == 0 {
                Phase::Succeeded
            } else {
                Phase::Failed
            };
        });
    }

    /// Ends the run with a process-level error.
    pub fn crash(&self, error: &str) {
        self.settle(|r| {
            r.complete = false;
            r.exit_code = SIGNALED_EXIT_CODE;
            r.error = Some(error.to_string());
            r.phase = Phase::Failed;
        });
    }

    fn settle(&self, f: impl FnOnce(&mut crate::core::RunState)) {
        let now = SystemTime::now();
        let settled = self.cell.update(|r| {
            if r.phase != Phase::Running {
                return false;
            }
            f(r);
            r.stopped_at = Some(now);
            true
        });
        if settled {
            self.done.send_replace(true);
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn start(&self, launch: Launch) -> Result<(), ProcessError> {
        let mut slot = self.launch.lock();
        if slot.is_some() {
            return Err(ProcessError::AlreadyStarted { id: launch.id });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now();
        self.cell.update(|r| {
            r.pid = pid;
            r.phase = Phase::Running;
            r.started_at = Some(now);
        });
        *slot = Some(launch);
        Ok(())
    }

    fn stop(&self) -> Result<(), ProcessError> {
        match self.cell.phase() {
            Phase::Created => Err(ProcessError::NotStarted),
            _ => {
                self.settle(|r| {
                    r.complete = false;
                    r.exit_code = SIGNALED_EXIT_CODE;
                    r.phase = Phase::Stopped;
                });
                Ok(())
            }
        }
    }

    fn signal(&self, _signo: i32) -> Result<(), ProcessError> {
        match self.cell.phase() {
            Phase::Created => Err(ProcessError::NotStarted),
            Phase::Running => Ok(()),
            phase => Err(ProcessError::Signal {
                error: format!("process is {}", phase.as_label()),
            }),
        }
    }

    fn status(&self) -> Status {
        self.cell.status()
    }

    async fn wait(&self) -> Status {
        if self.cell.phase() != Phase::Created {
            let mut rx = self.done.subscribe();
            let _ = rx.wait_for(|done| *done).await;
        }
        self.status()
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.bus.subscribe()
    }

    fn buffered(&self) -> BufferedOutput {
        self.buffer.lock().clone()
    }
}
