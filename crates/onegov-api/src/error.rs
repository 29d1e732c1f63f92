//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const INVALID_BODY: &str = "Request body must be a JSON object with valid fields.";

/// An error returned by an API handler.
///
/// Client errors carry the message shown to the caller. Server errors carry
/// the underlying cause, which is logged but never sent.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("assistant error: {0}")]
  Assistant(#[source] BoxError),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Store(Box::new(e))
  }

  pub fn assistant(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Assistant(Box::new(e))
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    tracing::debug!(
      status = %rejection.status(),
      reason = %rejection.body_text(),
      "request body rejected"
    );
    ApiError::BadRequest(INVALID_BODY.into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Store(_) | ApiError::Internal(_) => {
        tracing::error!(error = %self, "request failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "Something went wrong. Please try again.".to_owned(),
        )
      }
      ApiError::Assistant(_) => {
        tracing::error!(error = %self, "assistant call failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "AI processing failed.".to_owned(),
        )
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
