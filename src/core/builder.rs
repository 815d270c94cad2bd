use std::sync::Arc;

use crate::core::child::ChildProcess;
use crate::core::config::Config;
use crate::core::state::Settings;
use crate::ident::{IdRef, RandomIds};
use crate::process::{CommandLauncher, LauncherRef};

/// Builder for constructing a [`ChildProcess`] with custom config or collaborators.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use childvisor::{ChildProcess, Config, IdRef};
///
/// let ids: IdRef = Arc::new(|len: usize| "a".repeat(len));
/// let child = ChildProcess::builder("sleep")
///     .args(["1"])
///     .config(Config { retry_times: 10, ..Config::default() })
///     .ids(ids)
///     .build();
///
/// assert_eq!(child.id(), "aaaaaaaaaaaaaaaa");
/// assert_eq!(child.retry_times(), 10);
/// ```
pub struct ChildBuilder {
    name: String,
    args: Vec<String>,
    cfg: Config,
    ids: IdRef,
    launcher: LauncherRef,
}

impl ChildBuilder {
    /// Creates a builder for `name` with defaults for everything else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            cfg: Config::default(),
            ids: Arc::new(RandomIds),
            launcher: Arc::new(CommandLauncher),
        }
    }

    /// Appends command arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the defaults the record (and its clones) start from.
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the identifier generator used for this record and its clones.
    pub fn ids(mut self, ids: IdRef) -> Self {
        self.ids = ids;
        self
    }

    /// Sets the launcher producing the owned process handle.
    pub fn launcher(mut self, launcher: LauncherRef) -> Self {
        self.launcher = launcher;
        self
    }

    /// Builds the record. Nothing is spawned.
    pub fn build(self) -> ChildProcess {
        let settings = Settings {
            dir: String::new(),
            env: Vec::new(),
            delay_start: self.cfg.delay_start,
            retry_times: self.cfg.retry_times,
        };
        ChildProcess::assemble(
            self.name,
            self.args,
            settings,
            self.cfg,
            self.ids,
            self.launcher,
        )
    }
}
