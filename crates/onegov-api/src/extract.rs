//! Extractors whose rejections answer in the API's `{error}` shape.

use axum::extract::FromRequest;

use crate::ApiError;

/// [`axum::Json`] for request bodies. A missing content type, malformed JSON
/// or a field of the wrong type is a 400 `{error}` rather than axum's
/// plain-text 415 or 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
