//! CLI command implementations.

pub mod paper;
pub mod validate;
