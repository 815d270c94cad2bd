//! Record core: identity, settings, lock domain and lifecycle.
//!
//! Internal modules:
//! - [`child`]: the [`ChildProcess`] record (construction, clone, mutators, snapshot);
//! - [`builder`]: wires config, id generator and launcher into a record;
//! - [`config`]: defaults for new records and their handles;
//! - [`guarded`]: scoped reader/writer lock wrapper;
//! - [`policy`]: delay/retry contract read by restart loops;
//! - [`state`]: shared settings + run status behind one lock, and the handle-side view.

mod builder;
mod child;
mod config;
mod guarded;
mod policy;
mod state;

pub use builder::ChildBuilder;
pub use child::ChildProcess;
pub use config::Config;
pub use guarded::Guarded;
pub use policy::StartPolicy;
pub use state::{Phase, RunState, Status, StatusCell};

pub(crate) use state::Settings;
