//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Recipient field validation failed; the wire body carries the full list.
  #[error("validation failed: {0:?}")]
  Validation(Vec<String>),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Validation(errors) => (
        StatusCode::BAD_REQUEST,
        json!({ "error": "Validation failed", "errors": errors }),
      ),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, json!({ "error": m })),
      ApiError::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": e.to_string() }),
      ),
    };
    (status, Json(body)).into_response()
  }
}
