//! # childvisor
//!
//! **childvisor** models supervised child processes: an OS command wrapped with an
//! identity, a restart policy (delay-before-start, retry count) and a thread-safe,
//! point-in-time status snapshot.
//!
//! It is the bookkeeping core of a process supervisor. The restart loop that decides
//! when to relaunch is left to the caller; this crate stores the settings such a loop
//! consumes and guarantees that concurrent readers and writers never see torn state.
//!
//! ## Architecture
//! ```text
//!  ChildBuilder ──► ChildProcess ──────────────────────────────┐
//!    (Config,        │ id (IdGenerator, once)                  │ clone_child()
//!     IdRef,         │ name, args (immutable)                  ▼
//!     LauncherRef)   │                                  new ChildProcess
//!                    │ Arc<Guarded<Shared>>             (new id, copied settings,
//!                    │   ├─ settings: dir env delay retry   fresh handle)
//!                    │   └─ run: pid phase exit error times
//!                    │          ▲
//!                    │          │ StatusCell (status-only view)
//!                    ▼          │
//!               HandleRef ──────┘  (CommandHandle: tokio::process,
//!                    │                 output streaming, stop/signal)
//!                    ▼
//!               to_json() ──► ProcessSnapshot (serde, immutable)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Created ──start()──► Started ──spawn──► Running ──► Succeeded | Failed | Stopped
//!    ▲                    └──spawn error──► Failed
//!    └──────────── clone_child() (new id, same settings) ◄──── any state
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                 |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Records**       | Identity, settings, single lock domain, clone semantics.     | [`ChildProcess`], [`ChildBuilder`]        |
//! | **Snapshots**     | Immutable, serializable status projection.                   | [`ProcessSnapshot`], [`Status`]           |
//! | **Handles**       | Spawn, stop, signal, stream output.                          | [`ProcessHandle`], [`CommandHandle`]      |
//! | **Identity**      | Injectable random id generation.                             | [`IdGenerator`], [`RandomIds`]            |
//! | **Restart data**  | Settings contract for external restart loops.                | [`StartPolicy`]                           |
//! | **Errors**        | Typed errors for record and handle operations.               | [`ProcessError`]                          |
//! | **Configuration** | Centralized defaults.                                        | [`Config`]                                |
//!
//! ## Example
//! ```rust
//! use childvisor::ChildProcess;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let child = ChildProcess::new("echo", ["hello"]);
//!     child.set_retry_times(5);
//!
//!     let snap = child.to_json();
//!     assert_eq!(snap.delay_start, 25);
//!     assert!(!snap.complete);
//!
//!     # #[cfg(unix)]
//!     # {
//!     child.start()?;
//!     let status = child.wait().await;
//!     assert!(status.complete);
//!     assert_eq!(status.exit_code, 0);
//!     # }
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod ident;
mod process;
mod snapshot;

pub mod testing;

// ---- Public re-exports ----

pub use core::{
    ChildBuilder, ChildProcess, Config, Guarded, Phase, RunState, StartPolicy, Status, StatusCell,
};
pub use error::ProcessError;
pub use ident::{ALPHABET, IdGenerator, IdRef, RandomIds};
pub use process::{
    BufferedOutput, CommandHandle, CommandLauncher, HandleRef, Launch, Launcher, LauncherRef,
    OutputBus, OutputLine, OutputMode, OutputStream, ProcessHandle, SIGNALED_EXIT_CODE,
};
pub use snapshot::ProcessSnapshot;
