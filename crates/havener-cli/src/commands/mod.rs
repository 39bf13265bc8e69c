//! CLI command implementations

pub mod deploy;
pub mod purge;
pub mod render;
