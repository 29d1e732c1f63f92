//! Error type for `onegov-store-sqlite`.

use onegov_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] onegov_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("cannot prepare data directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn is_conflict(&self) -> bool {
    match self {
      Error::Core(e) => matches!(e, onegov_core::Error::Conflict(_)),
      Error::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(f, _),
      )) => f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
      _ => false,
    }
  }
}
