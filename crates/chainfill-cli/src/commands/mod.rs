//! CLI command implementations

pub mod fill;
pub mod forks;
