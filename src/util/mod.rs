//! Small helpers shared across the crate.

pub mod id;

pub use id::IdCounter;
