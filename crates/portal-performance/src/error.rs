//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Failures are reported in the same envelope as successes, with
//! `success: false` and an `error` message.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use portal_core::performance::PerformanceResponse;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid auth token")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "performance query failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(PerformanceResponse::failure(self.to_string()))).into_response()
  }
}
