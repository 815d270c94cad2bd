//! Error types used by supervised child processes.
//!
//! [`ProcessError`] covers failures of record operations (reconfiguring a running child)
//! and of the process handle (spawn, signal delivery).
//!
//! Failures of the child program itself (non-zero exit, crash) are **not** errors here:
//! they are recorded as data in [`Status`](crate::Status) and surfaced by snapshots.

use thiserror::Error;

/// # Errors produced by child process records and handles.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The child has already been started; launch configuration is frozen.
    #[error("process {id} already started")]
    AlreadyStarted {
        /// Identifier of the record that rejected the call.
        id: String,
    },

    /// The operation needs a running (or finished) process, but none was started.
    #[error("process not started")]
    NotStarted,

    /// The OS refused to spawn the command.
    #[error("spawn failed: {error}")]
    Spawn {
        /// The underlying error message.
        error: String,
    },

    /// Delivering a signal to the child failed.
    #[error("signal failed: {error}")]
    Signal {
        /// The underlying error message.
        error: String,
    },

    /// The operation is not available on this platform or handle.
    #[error("unsupported: {what}")]
    Unsupported {
        /// What was attempted.
        what: &'static str,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use childvisor::ProcessError;
    ///
    /// let err = ProcessError::AlreadyStarted { id: "abc".into() };
    /// assert_eq!(err.as_label(), "process_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::AlreadyStarted { .. } => "process_already_started",
            ProcessError::NotStarted => "process_not_started",
            ProcessError::Spawn { .. } => "process_spawn_failed",
            ProcessError::Signal { .. } => "process_signal_failed",
            ProcessError::Unsupported { .. } => "process_unsupported",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcessError::AlreadyStarted { id } => format!("already started: {id}"),
            ProcessError::NotStarted => "not started".to_string(),
            ProcessError::Spawn { error } => format!("spawn: {error}"),
            ProcessError::Signal { error } => format!("signal: {error}"),
            ProcessError::Unsupported { what } => format!("unsupported: {what}"),
        }
    }
}
