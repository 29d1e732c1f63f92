//! Error type for `onegov-store-memory`.

use onegov_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] onegov_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn is_conflict(&self) -> bool {
    matches!(self, Error::Core(onegov_core::Error::Conflict(_)))
  }
}
