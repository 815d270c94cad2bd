//! # Tokio-backed process handle.
//!
//! [`CommandHandle`] runs a command with [`tokio::process`] and records its status in the
//! owning record's [`StatusCell`]. [`CommandLauncher`] is the default [`Launcher`].
//!
//! ## Flow
//! ```text
//! start(launch)
//!   ├─► spawn Command (dir, env, piped stdout/stderr, kill_on_drop)
//!   │     └─ Err ─► phase=Failed, error=..., return Err(Spawn)
//!   ├─► phase=Running, pid, started_at
//!   ├─► reader task per pipe ─► raw lines (lossy UTF-8) ─► OutputBus / BufferedOutput
//!   └─► monitor task:
//!         select {
//!           child.wait()      ─► Succeeded / Failed (complete=true, exit_code)
//!           stop.cancelled()  ─► SIGTERM, grace, SIGKILL ─► Stopped (complete=false)
//!         }
//!         record status + stopped_at ─► join readers (bounded) ─► done=true
//! ```
//!
//! ## Rules
//! - No status lock is held across an `.await`.
//! - The terminal phase is recorded as soon as the direct child exits, even if a
//!   grandchild still holds its pipes.
//! - Readers never stop on malformed output; they drain each pipe until EOF.
//! - `wait()` resolves once output is drained, or after `OUTPUT_DRAIN_TIMEOUT`.
//! - A process killed by a signal it did not get from `stop()` is reported as `Stopped`.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Config, Phase, RunState, Status, StatusCell};
use crate::error::ProcessError;
use crate::process::handle::{HandleRef, Launch, Launcher, ProcessHandle};
use crate::process::output::{BufferedOutput, OutputBus, OutputLine, OutputMode, OutputStream};

/// Exit code reported for stopped or signalled processes.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// How long output readers may keep running once the process has exited.
///
/// A grandchild that inherited the pipes can hold them open indefinitely; after this
/// bound `wait()` resolves and the readers keep draining in the background.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Consecutive read errors tolerated on one pipe before its reader stops.
const MAX_READ_ERRORS: u32 = 8;

/// Default [`Launcher`] producing [`CommandHandle`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn handle(&self, cell: StatusCell, cfg: &Config) -> HandleRef {
        Arc::new(CommandHandle::new(cell, cfg))
    }
}

/// Handle running one command on the current Tokio runtime.
pub struct CommandHandle {
    cell: StatusCell,
    output: OutputMode,
    grace: Option<Duration>,
    bus: OutputBus,
    buffer: Arc<Mutex<BufferedOutput>>,
    launched: AtomicBool,
    stop: CancellationToken,
    done: Arc<watch::Sender<bool>>,
}

impl CommandHandle {
    /// Creates an unstarted handle writing status through `cell`.
    pub fn new(cell: StatusCell, cfg: &Config) -> Self {
        Self {
            cell,
            output: cfg.output,
            grace: cfg.grace_period(),
            bus: OutputBus::new(cfg.output_capacity_clamped()),
            buffer: Arc::new(Mutex::new(BufferedOutput::default())),
            launched: AtomicBool::new(false),
            stop: CancellationToken::new(),
            done: Arc::new(watch::channel(false).0),
        }
    }

    fn command(&self, launch: &Launch) -> Command {
        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &launch.dir {
            cmd.current_dir(dir);
        }
        if launch.env.is_some() {
            cmd.env_clear();
            cmd.envs(launch.env_pairs());
        }
        if self.output.captures() {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }

    /// Records a launch that never produced a process.
    fn fail(&self, error: &ProcessError) {
        let now = SystemTime::now();
        self.cell.update(|r| {
            r.phase = Phase::Failed;
            r.complete = false;
            r.error = Some(error.to_string());
            r.started_at = Some(now);
            r.stopped_at = Some(now);
        });
        self.done.send_replace(true);
    }

    fn pump<R>(&self, reader: Option<R>, stream: OutputStream) -> Option<JoinHandle<()>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let reader = reader?;
        let sink = LineSink {
            stream,
            bus: self.output.streaming.then(|| self.bus.clone()),
            buffer: self.output.buffered.then(|| Arc::clone(&self.buffer)),
        };
        Some(tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            let mut errors = 0;
            loop {
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        errors = 0;
                        if buf.last() == Some(&b'\n') {
                            sink.emit(&buf);
                            buf.clear();
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        errors += 1;
                        if errors >= MAX_READ_ERRORS {
                            warn!(?stream, error = %e, "giving up on child output");
                            break;
                        }
                    }
                }
            }
            // last line without a trailing newline
            if !buf.is_empty() {
                sink.emit(&buf);
            }
        }))
    }
}

/// Destination of the lines read from one pipe.
struct LineSink {
    stream: OutputStream,
    bus: Option<OutputBus>,
    buffer: Option<Arc<Mutex<BufferedOutput>>>,
}

impl LineSink {
    /// Publishes one raw line; invalid UTF-8 is replaced, never rejected.
    fn emit(&self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw).into_owned();
        if let Some(buffer) = &self.buffer {
            buffer.lock().push(self.stream, line.clone());
        }
        if let Some(bus) = &self.bus {
            bus.publish(self.stream, line);
        }
    }
}

#[async_trait]
impl ProcessHandle for CommandHandle {
    fn start(&self, launch: Launch) -> Result<(), ProcessError> {
        if self.launched.swap(true, Ordering::SeqCst) {
            return Err(ProcessError::AlreadyStarted { id: launch.id });
        }
        if tokio::runtime::Handle::try_current().is_err() {
            let err = ProcessError::Unsupported {
                what: "start outside a tokio runtime",
            };
            self.fail(&err);
            return Err(err);
        }
        self.cell.update(|r| r.phase = Phase::Started);

        let mut child = match self.command(&launch).spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = ProcessError::Spawn {
                    error: e.to_string(),
                };
                warn!(child_id = %launch.id, program = %launch.program, error = %e, "spawn failed");
                self.fail(&err);
                return Err(err);
            }
        };

        let pid = child.id().unwrap_or(0);
        let now = SystemTime::now();
        self.cell.update(|r| {
            r.pid = pid;
            r.phase = Phase::Running;
            r.started_at = Some(now);
        });
        debug!(child_id = %launch.id, pid, program = %launch.program, "process spawned");

        let mut readers: Vec<JoinHandle<()>> = [
            self.pump(child.stdout.take(), OutputStream::Stdout),
            self.pump(child.stderr.take(), OutputStream::Stderr),
        ]
        .into_iter()
        .flatten()
        .collect();

        let cell = self.cell.clone();
        let stop = self.stop.clone();
        let done = Arc::clone(&self.done);
        let grace = self.grace;
        let id = launch.id;
        tokio::spawn(async move {
            let (res, stopped) = tokio::select! {
                res = child.wait() => (res, false),
                _ = stop.cancelled() => (terminate(&mut child, grace).await, true),
            };
            let now = SystemTime::now();
            let final_state = cell.update(|r| {
                settle(r, res, stopped);
                r.stopped_at = Some(now);
                r.clone()
            });
            info!(
                child_id = %id,
                pid,
                phase = final_state.phase.as_label(),
                exit_code = final_state.exit_code,
                "process finished"
            );

            let drain = async {
                for reader in readers.iter_mut() {
                    let _ = reader.await;
                }
            };
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain).await.is_err() {
                debug!(child_id = %id, pid, "output pipes still open after exit, detaching readers");
            }
            done.send_replace(true);
        });
        Ok(())
    }

    fn stop(&self) -> Result<(), ProcessError> {
        match self.cell.phase() {
            Phase::Created => Err(ProcessError::NotStarted),
            phase if phase.is_terminal() => Ok(()),
            _ => {
                self.stop.cancel();
                Ok(())
            }
        }
    }

    fn signal(&self, signo: i32) -> Result<(), ProcessError> {
        let (phase, pid) = self.cell.read(|r| (r.phase, r.pid));
        match phase {
            Phase::Created => Err(ProcessError::NotStarted),
            Phase::Running if pid != 0 => send_signal(pid, signo),
            _ => Err(ProcessError::Signal {
                error: format!("process is {}", phase.as_label()),
            }),
        }
    }

    fn status(&self) -> Status {
        self.cell.status()
    }

    async fn wait(&self) -> Status {
        if self.cell.phase() == Phase::Created {
            return self.status();
        }
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
        self.status()
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.bus.subscribe()
    }

    fn buffered(&self) -> BufferedOutput {
        self.buffer.lock().clone()
    }
}

/// Applies the outcome of `wait` to the run state.
fn settle(r: &mut RunState, res: std::io::Result<ExitStatus>, stopped: bool) {
    match res {
        Ok(exit) => match exit.code() {
            Some(code) if !stopped => {
                r.complete = true;
                r.exit_code = code;
                r.phase = if code == 0 {
                    Phase::Succeeded
                } else {
                    Phase::Failed
                };
            }
            code => {
                r.complete = false;
                r.exit_code = code.unwrap_or(SIGNALED_EXIT_CODE);
                r.phase = Phase::Stopped;
            }
        },
        Err(e) => {
            r.complete = false;
            r.exit_code = SIGNALED_EXIT_CODE;
            r.error = Some(e.to_string());
            r.phase = Phase::Failed;
        }
    }
}

/// Terminates `child`: SIGTERM first when a grace period is set, SIGKILL after it.
async fn terminate(child: &mut Child, grace: Option<Duration>) -> std::io::Result<ExitStatus> {
    if let Some(grace) = grace {
        if let Some(res) = terminate_politely(child, grace).await {
            return res;
        }
    }
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
async fn terminate_politely(
    child: &mut Child,
    grace: Duration,
) -> Option<std::io::Result<ExitStatus>> {
    let pid = child.id()?;
    send_signal(pid, nix::sys::signal::Signal::SIGTERM as i32).ok()?;
    tokio::time::timeout(grace, child.wait()).await.ok()
}

#[cfg(not(unix))]
async fn terminate_politely(
    _child: &mut Child,
    _grace: Duration,
) -> Option<std::io::Result<ExitStatus>> {
    None
}

#[cfg(unix)]
fn send_signal(pid: u32, signo: i32) -> Result<(), ProcessError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let signal = Signal::try_from(signo).map_err(|e| ProcessError::Signal {
        error: e.to_string(),
    })?;
    let pid = i32::try_from(pid).map_err(|e| ProcessError::Signal {
        error: e.to_string(),
    })?;
    kill(Pid::from_raw(pid), signal).map_err(|e| ProcessError::Signal {
        error: e.to_string(),
    })
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signo: i32) -> Result<(), ProcessError> {
    Err(ProcessError::Unsupported {
        what: "signals on this platform",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_stop_before_start_is_rejected() {
        let handle = CommandHandle::new(StatusCell::detached(), &Config::default());
        assert_eq!(handle.stop(), Err(ProcessError::NotStarted));
        assert_eq!(handle.signal(15), Err(ProcessError::NotStarted));
    }

    #[test]
    fn test_start_outside_runtime_records_failure() {
        let handle = CommandHandle::new(StatusCell::detached(), &Config::default());
        let err = handle.start(Launch::new("id", "true")).unwrap_err();
        assert_eq!(err.as_label(), "process_unsupported");

        let status = handle.status();
        assert!(!status.complete);
        assert!(status.error.is_some());
        assert_eq!(status.runtime, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let cell = StatusCell::detached();
        let handle = CommandHandle::new(cell.clone(), &Config::default());
        let err = handle
            .start(Launch::new("id", "/definitely/not/a/binary"))
            .unwrap_err();
        assert_eq!(err.as_label(), "process_spawn_failed");
        assert_eq!(cell.phase(), Phase::Failed);

        let status = handle.wait().await;
        assert_eq!(status.pid, 0);
        assert!(!status.complete);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let handle = CommandHandle::new(StatusCell::detached(), &Config::default());
        let _ = handle.start(Launch::new("id", "/definitely/not/a/binary"));
        let err = handle.start(Launch::new("id", "true")).unwrap_err();
        assert_eq!(err, ProcessError::AlreadyStarted { id: "id".into() });
    }

    #[test]
    fn test_settle_wait_error_is_failure() {
        let mut r = RunState::default();
        settle(&mut r, Err(std::io::Error::other("wait failed")), false);
        assert_eq!(r.phase, Phase::Failed);
        assert!(!r.complete);
        assert_eq!(r.error.as_deref(), Some("wait failed"));
    }

    #[test]
    fn test_line_sink_strips_terminators_and_replaces_invalid_utf8() {
        let buffer = Arc::new(Mutex::new(BufferedOutput::default()));
        let sink = LineSink {
            stream: OutputStream::Stdout,
            bus: None,
            buffer: Some(Arc::clone(&buffer)),
        };
        sink.emit(b"plain\n");
        sink.emit(b"crlf\r\n");
        sink.emit(b"\xff\n");
        sink.emit(b"tail");

        let out = buffer.lock().clone();
        assert_eq!(out.stdout, vec!["plain", "crlf", "\u{fffd}", "tail"]);
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_reader_keeps_going_after_invalid_utf8() {
        let cfg = Config {
            output: OutputMode::buffered(),
            ..Config::default()
        };
        let handle = CommandHandle::new(StatusCell::detached(), &cfg);
        let (mut tx, rx) = tokio::io::duplex(64);
        let reader = handle.pump(Some(rx), OutputStream::Stderr).unwrap();

        tx.write_all(b"\xfe\xffbad\nok\nlast").await.unwrap();
        drop(tx);
        reader.await.unwrap();

        assert_eq!(handle.buffered().stderr, vec!["\u{fffd}\u{fffd}bad", "ok", "last"]);
    }
}
