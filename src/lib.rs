//! Polls streaming channels and notifies chat channels when they go live or
//! offline. Watches are toggled per destination and survive restarts.

pub mod config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod model;
pub mod provider;
pub mod recovery;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use manager::{ToggleOutcome, ToggleRequest, WatchManager, WatchSettings};
