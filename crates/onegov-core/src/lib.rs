//! Core types and trait definitions for the ONEGOV assistant backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage engines and the HTTP layer depend on it; it depends on nothing
//! but serialisation and time handling.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assistant;
pub mod domain;
pub mod error;
pub mod query;
pub mod repository;
pub mod store;

pub use error::{Error, Result};
pub use repository::Repository;
pub use store::{Statement, StorageEngine, StoreError};
