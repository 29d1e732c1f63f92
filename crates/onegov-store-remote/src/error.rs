//! Error type for `onegov-store-remote`.

use onegov_core::StoreError;
use thiserror::Error;

/// Postgres `unique_violation`, as relayed by PostgREST.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] onegov_core::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The service answered with a non-success status.
  #[error("remote returned {status}: {message}")]
  Status {
    status:  u16,
    /// PostgREST / Postgres error code, when the body carried one.
    code:    Option<String>,
    message: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn is_conflict(&self) -> bool {
    match self {
      Error::Core(e) => matches!(e, onegov_core::Error::Conflict(_)),
      Error::Status { status, code, .. } => {
        *status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION)
      }
      Error::Http(_) => false,
    }
  }
}
