//! # Process handles and output capture.
//!
//! This module provides the execution side of a record:
//! - [`ProcessHandle`] - trait for the OS process owned by a record
//! - [`Launcher`] - factory binding new handles to a record's status cell
//! - [`CommandHandle`] / [`CommandLauncher`] - tokio-backed implementation
//! - [`OutputBus`] / [`OutputMode`] - streamed and buffered stdout/stderr

mod command;
mod handle;
mod output;

pub use command::{CommandHandle, CommandLauncher, SIGNALED_EXIT_CODE};
pub use handle::{HandleRef, Launch, Launcher, LauncherRef, ProcessHandle};
pub use output::{BufferedOutput, OutputBus, OutputLine, OutputMode, OutputStream};
