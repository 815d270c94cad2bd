//! Identifier generation for child process records.
//!
//! ## Contents
//! - [`IdGenerator`] the injectable generator seam (trait object, stateless)
//! - [`RandomIds`]   production generator drawing from `[A-Za-z0-9]`
//! - [`IdRef`]       shared handle (`Arc<dyn IdGenerator>`) stored by records
//!
//! ## Collisions
//! There is no registry of issued ids. With the default length (16) and a 62-symbol
//! alphabet a collision is astronomically unlikely, but it is not impossible.

mod generator;

pub use generator::{ALPHABET, IdGenerator, IdRef, RandomIds};
