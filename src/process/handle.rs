//! # Process handle abstraction.
//!
//! A [`ProcessHandle`] owns the OS-level life of one command: spawning it, signalling it,
//! streaming its output and recording its status. Records compose with a handle through
//! [`HandleRef`] and forward only the operations they choose to expose.
//!
//! Handles are produced by a [`Launcher`], which binds each new handle to the
//! [`StatusCell`] of the record that owns it. All status the handle writes goes through
//! that cell, so it lands in the record's single lock domain.
//!
//! ## Contract
//! ```text
//! status()  ─► callable at any time; zero/false before start, final values after exit
//! start()   ─► at most once per handle; spawn failures are recorded AND returned
//! stop()    ─► NotStarted before start, no-op once terminal
//! wait()    ─► resolves with the final status (immediately if never started)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::{Config, Status, StatusCell};
use crate::error::ProcessError;
use crate::process::output::{BufferedOutput, OutputLine};

/// Everything a handle needs to spawn a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Launch {
    /// Id of the owning record (used in logs and errors).
    pub id: String,
    /// Program to execute.
    pub program: String,
    /// Arguments, not including the program.
    pub args: Vec<String>,
    /// Working directory; `None` inherits the caller's.
    pub dir: Option<PathBuf>,
    /// `KEY=VALUE` entries replacing the environment; `None` inherits the caller's.
    pub env: Option<Vec<String>>,
}

impl Launch {
    /// Creates a launch for `program` with no args, inheriting dir and environment.
    pub fn new(id: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: None,
        }
    }

    /// Returns the launch with `args` appended.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the launch with a working directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Returns the launch with a replacement environment.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Splits the environment entries into `(key, value)` pairs.
    ///
    /// Entries without `=` are skipped; only the first `=` separates key from value.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .flatten()
            .filter_map(|entry| entry.split_once('='))
    }
}

/// OS-level process owned by a record.
#[async_trait]
pub trait ProcessHandle: Send + Sync + 'static {
    /// Spawns the command described by `launch`.
    ///
    /// Returns once the process exists (or failed to spawn). Execution continues
    /// in the background; observe it via [`status`](Self::status) or [`wait`](Self::wait).
    fn start(&self, launch: Launch) -> Result<(), ProcessError>;

    /// Requests termination of the running process.
    fn stop(&self) -> Result<(), ProcessError>;

    /// Delivers signal number `signo` to the running process.
    fn signal(&self, signo: i32) -> Result<(), ProcessError>;

    /// Returns the current status.
    fn status(&self) -> Status;

    /// Waits until the process reaches a terminal phase and returns its final status.
    async fn wait(&self) -> Status;

    /// Subscribes to streamed output lines.
    fn subscribe(&self) -> broadcast::Receiver<OutputLine>;

    /// Returns the lines kept so far in buffered mode (empty otherwise).
    fn buffered(&self) -> BufferedOutput;
}

/// Shared handle reference.
pub type HandleRef = Arc<dyn ProcessHandle>;

/// Factory binding new handles to a record's status cell.
pub trait Launcher: Send + Sync + 'static {
    /// Creates an unstarted handle writing its status through `cell`.
    fn handle(&self, cell: StatusCell, cfg: &Config) -> HandleRef;
}

/// Shared launcher reference.
pub type LauncherRef = Arc<dyn Launcher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_pairs_skip_malformed() {
        let launch = Launch::new("id", "env").with_env(vec![
            "A=1".into(),
            "broken".into(),
            "B=x=y".into(),
            "EMPTY=".into(),
        ]);
        let pairs: Vec<_> = launch.env_pairs().collect();
        assert_eq!(pairs, vec![("A", "1"), ("B", "x=y"), ("EMPTY", "")]);
    }

    #[test]
    fn test_inherited_env_has_no_pairs() {
        let launch = Launch::new("id", "true").with_args(["-v"]);
        assert_eq!(launch.env_pairs().count(), 0);
        assert_eq!(launch.args, vec!["-v".to_string()]);
        assert!(launch.dir.is_none());
    }
}
