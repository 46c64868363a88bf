//! Shared utilities used across the crate.

mod error;

pub use error::ChatError;
