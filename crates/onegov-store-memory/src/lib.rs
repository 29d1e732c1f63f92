//! Process-local in-memory engine for the ONEGOV storage port.
//!
//! Nothing here survives a restart: every process starts with zero users.
//! It exists for stateless deployments where no file system or managed
//! database is available.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::MemoryStore;

#[cfg(test)]
mod tests;
