//! # chainfill-forks
//!
//! Fork capabilities for chainfill.
//!
//! - [`Fork`] - the capability interface the filler drives
//! - [`NamedFork`] - Frontier through Cancun
//! - [`TransitionFork`] - chains that switch forks at a block or timestamp
//! - [`fork_by_name`] / [`all_forks`] - the catalog

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fork;
mod named;

pub use error::{ForkError, ForkResult};
pub use fork::{Activation, Fork, TransitionFork};
pub use named::{NamedFork, BEACON_ROOTS_ADDRESS, BEACON_ROOTS_CODE};

/// Transition forks known to the catalog
pub const TRANSITION_FORKS: [TransitionFork; 3] = [
    TransitionFork::new(NamedFork::Berlin, NamedFork::London, Activation::Block(5)),
    TransitionFork::new(NamedFork::Paris, NamedFork::Shanghai, Activation::Timestamp(15_000)),
    TransitionFork::new(NamedFork::Shanghai, NamedFork::Cancun, Activation::Timestamp(15_000)),
];

/// Every fork in the catalog: named forks first, then transitions
pub fn all_forks() -> Vec<Box<dyn Fork>> {
    let named = NamedFork::ALL
        .into_iter()
        .map(|f| Box::new(f) as Box<dyn Fork>);
    let transitions = TRANSITION_FORKS
        .into_iter()
        .map(|f| Box::new(f) as Box<dyn Fork>);
    named.chain(transitions).collect()
}

/// Look a fork up by name (case-insensitive; `Merge` is accepted for Paris)
pub fn fork_by_name(name: &str) -> ForkResult<Box<dyn Fork>> {
    if let Ok(named) = name.parse::<NamedFork>() {
        return Ok(Box::new(named));
    }
    TRANSITION_FORKS
        .into_iter()
        .find(|f| f.name().eq_ignore_ascii_case(name))
        .map(|f| Box::new(f) as Box<dyn Fork>)
        .ok_or_else(|| ForkError::UnknownFork(name.to_string()))
}
