//! Error types for `onegov-core`.

use thiserror::Error;

use crate::query::{Call, QueryKind};

#[derive(Debug, Error)]
pub enum Error {
  /// A statement was executed through the wrong call, e.g. `get()` on an
  /// insert.
  #[error("{call}() cannot execute the {kind} query {query}")]
  Unsupported {
    call:  Call,
    kind:  QueryKind,
    query: &'static str,
  },

  /// An engine answered a query with a record of the wrong shape.
  #[error("{query} returned a {found} record where a {expected} was expected")]
  UnexpectedRecord {
    query:    &'static str,
    expected: &'static str,
    found:    &'static str,
  },

  /// An insert completed but the engine reported no row id.
  #[error("{0} did not report an inserted id")]
  MissingInsertId(&'static str),

  /// A unique constraint rejected an insert.
  #[error("{0} already exists")]
  Conflict(String),

  #[error("unknown chat role: {0:?}")]
  InvalidRole(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
