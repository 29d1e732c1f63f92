//! Managed-remote engine for the ONEGOV storage port.
//!
//! Talks to a Supabase project through its PostgREST endpoint
//! (`/rest/v1/<table>`). Every statement is one or more awaited HTTPS
//! requests; uniqueness is enforced by the remote schema.

mod encode;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::RemoteStore;

#[cfg(test)]
mod tests;
