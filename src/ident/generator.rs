//! # Random opaque identifiers.
//!
//! [`IdGenerator`] is the seam records use to obtain their id. Production code uses
//! [`RandomIds`]; tests may pass any `Fn(usize) -> String` closure to get predictable ids.
//!
//! ## Example
//! ```rust
//! use childvisor::{IdGenerator, RandomIds};
//!
//! let id = RandomIds.generate(16);
//! assert_eq!(id.len(), 16);
//! assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
//! ```

use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Symbols an id is drawn from.
pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Produces opaque identifiers of a requested length.
///
/// Implementations must return exactly `len` characters and keep no state that
/// couples one call to the next.
pub trait IdGenerator: Send + Sync + 'static {
    /// Returns a fresh identifier of exactly `len` characters.
    fn generate(&self, len: usize) -> String;
}

/// Shared generator handle.
pub type IdRef = Arc<dyn IdGenerator>;

/// Uniform random ids over [`ALPHABET`], using the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self, len: usize) -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

impl<F> IdGenerator for F
where
    F: Fn(usize) -> String + Send + Sync + 'static,
{
    fn generate(&self, len: usize) -> String {
        (self)(len)
    }
}
