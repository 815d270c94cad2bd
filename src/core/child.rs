//! # ChildProcess: the supervised process record.
//!
//! Combines an immutable identity (`id`, `name`, `args`), mutable launch and restart
//! settings, and one owned [`ProcessHandle`](crate::ProcessHandle).
//!
//! ## Lock domain
//! ```text
//! set_dir / set_env ─────────┐
//! set_delay_start / retries ─┤
//! start (claim)  ────────────┼──► Arc<Guarded<Shared>> ◄──── handle (StatusCell)
//! to_json / start_policy ────┘      settings + run
//! ```
//! One lock per record. Mutators hold it only for the write; `to_json` only for the copy.
//!
//! ## Rules
//! - `id` is generated once; [`clone_child`](ChildProcess::clone_child) generates a new one.
//! - `dir`/`env` are frozen once the record is started (`ProcessError::AlreadyStarted`).
//! - `delay_start`/`retry_times` may change at any time; they are read by an external
//!   restart loop, never acted on by the record itself.
//! - Terminal records are never revived; clone them to run again.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::core::builder::ChildBuilder;
use crate::core::config::Config;
use crate::core::guarded::Guarded;
use crate::core::policy::StartPolicy;
use crate::core::state::{Phase, RunState, Settings, Shared, SharedRef, Status, StatusCell};
use crate::error::ProcessError;
use crate::ident::IdRef;
use crate::process::{BufferedOutput, HandleRef, Launch, LauncherRef, OutputLine};
use crate::snapshot::ProcessSnapshot;

/// A supervised child process record.
///
/// ## Example
/// ```rust
/// use childvisor::ChildProcess;
///
/// let child = ChildProcess::new("echo", ["hello"]);
/// child.set_delay_start(100);
/// child.set_retry_times(5);
///
/// let twin = child.clone_child();
/// assert_ne!(twin.id(), child.id());
///
/// let snap = twin.to_json();
/// assert_eq!(snap.delay_start, 100);
/// assert_eq!(snap.retry_times, 5);
/// assert_eq!(snap.pid, 0);
/// ```
pub struct ChildProcess {
    id: String,
    name: String,
    args: Vec<String>,
    shared: SharedRef,
    handle: HandleRef,
    config: Config,
    ids: IdRef,
    launcher: LauncherRef,
}

impl ChildProcess {
    /// Creates a record for `name args...` with default config, random ids and
    /// the tokio-backed launcher. Nothing is spawned.
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChildBuilder::new(name).args(args).build()
    }

    /// Starts a builder for `name` with custom config or collaborators.
    pub fn builder(name: impl Into<String>) -> ChildBuilder {
        ChildBuilder::new(name)
    }

    pub(crate) fn assemble(
        name: String,
        args: Vec<String>,
        settings: Settings,
        config: Config,
        ids: IdRef,
        launcher: LauncherRef,
    ) -> Self {
        let id = ids.generate(config.id_length);
        let shared: SharedRef = Arc::new(Guarded::new(Shared {
            settings,
            run: RunState::default(),
        }));
        let handle = launcher.handle(StatusCell::new(Arc::clone(&shared)), &config);
        debug!(child_id = %id, program = %name, "child record created");
        Self {
            id,
            name,
            args,
            shared,
            handle,
            config,
            ids,
            launcher,
        }
    }

    /// Returns the record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the argument list.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the command line: name followed by the space-joined arguments.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.args.join(" "))
        }
    }

    /// Returns the working directory (empty = inherit).
    pub fn dir(&self) -> String {
        self.shared.read(|s| s.settings.dir.clone())
    }

    /// Returns the environment list (empty = inherit).
    pub fn env(&self) -> Vec<String> {
        self.shared.read(|s| s.settings.env.clone())
    }

    /// Returns the delay-before-start in milliseconds.
    pub fn delay_start(&self) -> u64 {
        self.shared.read(|s| s.settings.delay_start)
    }

    /// Returns the maximum number of restart attempts.
    pub fn retry_times(&self) -> u32 {
        self.shared.read(|s| s.settings.retry_times)
    }

    /// Sets the working directory of the command.
    ///
    /// Fails with [`ProcessError::AlreadyStarted`] once the record has been started.
    pub fn set_dir(&self, dir: impl Into<String>) -> Result<(), ProcessError> {
        let dir = dir.into();
        self.update_launch_settings("dir", |s| s.dir = dir)
    }

    /// Replaces the environment (`KEY=VALUE` entries) of the command.
    ///
    /// Fails with [`ProcessError::AlreadyStarted`] once the record has been started.
    pub fn set_env<I, S>(&self, env: I) -> Result<(), ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let env: Vec<String> = env.into_iter().map(Into::into).collect();
        self.update_launch_settings("env", |s| s.env = env)
    }

    fn update_launch_settings(
        &self,
        field: &'static str,
        apply: impl FnOnce(&mut Settings),
    ) -> Result<(), ProcessError> {
        self.shared
            .write(|s| {
                if s.run.phase.is_started() {
                    return Err(ProcessError::AlreadyStarted {
                        id: self.id.clone(),
                    });
                }
                apply(&mut s.settings);
                Ok(())
            })
            .inspect_err(|e| warn!(child_id = %self.id, field, error = %e, "rejected reconfiguration"))
    }

    /// Sets the delay-before-start in milliseconds.
    pub fn set_delay_start(&self, ms: u64) {
        self.shared.write(|s| s.settings.delay_start = ms);
    }

    /// Sets the maximum number of restart attempts after a failure.
    pub fn set_retry_times(&self, n: u32) {
        self.shared.write(|s| s.settings.retry_times = n);
    }

    /// Returns delay and retry settings read together.
    pub fn start_policy(&self) -> StartPolicy {
        self.shared
            .read(|s| StartPolicy::new(s.settings.delay_start, s.settings.retry_times))
    }

    /// Returns a fresh record with a new id, the same command and a copy of the
    /// current settings. The clone is always unstarted, whatever state `self` is in.
    pub fn clone_child(&self) -> ChildProcess {
        let settings = self.shared.read(|s| s.settings.clone());
        let clone = Self::assemble(
            self.name.clone(),
            self.args.clone(),
            settings,
            self.config.clone(),
            Arc::clone(&self.ids),
            Arc::clone(&self.launcher),
        );
        debug!(child_id = %clone.id, source_id = %self.id, "child record cloned");
        clone
    }

    /// Launches the command through the owned handle.
    ///
    /// Freezes `dir`/`env` first; a second call fails with [`ProcessError::AlreadyStarted`].
    /// Spawn failures are recorded in the status as well as returned.
    pub fn start(&self) -> Result<(), ProcessError> {
        let launch = self.shared.write(|s| {
            if s.run.phase.is_started() {
                return Err(ProcessError::AlreadyStarted {
                    id: self.id.clone(),
                });
            }
            s.run.phase = Phase::Started;
            let mut launch = Launch::new(&self.id, &self.name).with_args(self.args.iter().cloned());
            if !s.settings.dir.is_empty() {
                launch = launch.with_dir(&s.settings.dir);
            }
            if !s.settings.env.is_empty() {
                launch = launch.with_env(s.settings.env.clone());
            }
            Ok(launch)
        })?;
        debug!(child_id = %self.id, command = %self.command_line(), "starting child");
        self.handle.start(launch)
    }

    /// Asks the owned handle to stop the process.
    pub fn stop(&self) -> Result<(), ProcessError> {
        self.handle.stop()
    }

    /// Sends signal number `signo` to the running process.
    pub fn signal(&self, signo: i32) -> Result<(), ProcessError> {
        self.handle.signal(signo)
    }

    /// Waits for the process to finish and returns its final status.
    pub async fn wait(&self) -> Status {
        self.handle.wait().await
    }

    /// Subscribes to streamed output lines.
    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputLine> {
        self.handle.subscribe()
    }

    /// Returns output kept in buffered mode.
    pub fn buffered_output(&self) -> BufferedOutput {
        self.handle.buffered()
    }

    /// Returns the run status reported by the owned handle.
    pub fn status(&self) -> Status {
        self.handle.status()
    }

    /// Returns the lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.read(|s| s.run.phase)
    }

    /// Builds a snapshot of settings and status from one lock acquisition.
    pub fn to_json(&self) -> ProcessSnapshot {
        let cmd = self.command_line();
        let now = SystemTime::now();
        self.shared
            .read(|s| ProcessSnapshot::capture(cmd, &s.settings, &s.run.status_at(now)))
    }
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::testing::FakeLauncher;

    fn counting_ids() -> IdRef {
        let next = AtomicU64::new(0);
        Arc::new(move |len: usize| {
            let n = next.fetch_add(1, Ordering::Relaxed);
            format!("{n:0>len$}")
        })
    }

    fn child(launcher: &Arc<FakeLauncher>) -> ChildProcess {
        ChildProcess::builder("echo")
            .args(["hello"])
            .ids(counting_ids())
            .launcher(Arc::clone(launcher) as LauncherRef)
            .build()
    }

    #[test]
    fn test_defaults_and_identity() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        assert_eq!(c.id(), "0000000000000000");
        assert_eq!(c.delay_start(), 25);
        assert_eq!(c.retry_times(), 3);
        assert_eq!(c.command_line(), "echo hello");
        assert_eq!(c.phase(), Phase::Created);
        assert_eq!(launcher.created(), 1);
    }

    #[test]
    fn test_clone_uses_injected_generator() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        let twin = c.clone_child();
        assert_eq!(twin.id(), "0000000000000001");
        assert_eq!(launcher.created(), 2);
    }

    #[test]
    fn test_dir_env_frozen_after_start() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        c.set_dir("/tmp").unwrap();
        c.set_env(["A=1"]).unwrap();
        c.start().unwrap();

        let err = c.set_dir("/var").unwrap_err();
        assert_eq!(
            err,
            ProcessError::AlreadyStarted {
                id: c.id().to_string()
            }
        );
        assert!(c.set_env(["B=2"]).is_err());
        assert_eq!(c.dir(), "/tmp");
        assert_eq!(c.env(), vec!["A=1".to_string()]);

        // restart settings stay writable
        c.set_delay_start(7);
        c.set_retry_times(0);
        assert_eq!(c.start_policy(), StartPolicy::new(7, 0));
    }

    #[test]
    fn test_start_passes_settings_to_handle() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        c.set_dir("/srv").unwrap();
        c.set_env(["A=1", "B=2"]).unwrap();
        c.start().unwrap();

        let launch = launcher.last_launch().unwrap();
        assert_eq!(launch.id, c.id());
        assert_eq!(launch.program, "echo");
        assert_eq!(launch.args, vec!["hello".to_string()]);
        assert_eq!(launch.dir.as_deref(), Some(std::path::Path::new("/srv")));
        assert_eq!(launch.env, Some(vec!["A=1".to_string(), "B=2".to_string()]));
    }

    #[test]
    fn test_empty_dir_env_inherit() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        c.start().unwrap();
        let launch = launcher.last_launch().unwrap();
        assert!(launch.dir.is_none());
        assert!(launch.env.is_none());
    }

    #[test]
    fn test_double_start_rejected() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        c.start().unwrap();
        assert!(matches!(
            c.start(),
            Err(ProcessError::AlreadyStarted { .. })
        ));
        assert_eq!(launcher.launches(), 1);
    }

    #[test]
    fn test_command_line_without_args() {
        let c = ChildProcess::builder("true")
            .launcher(FakeLauncher::arc() as LauncherRef)
            .build();
        assert_eq!(c.command_line(), "true");
        assert_eq!(c.to_json().cmd, "true");
    }

    #[test]
    fn test_debug_shows_identity() {
        let launcher = FakeLauncher::arc();
        let c = child(&launcher);
        let dbg = format!("{c:?}");
        assert!(dbg.contains("ChildProcess"));
        assert!(dbg.contains(c.id()));
        assert!(dbg.contains("Created"));
    }
}
