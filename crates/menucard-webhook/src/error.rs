//! Error type for the admin routes and its axum `IntoResponse` mapping.
//!
//! The webhook route never returns this type: its outcomes are mapped to
//! responses by [`crate::handlers::webhook`].

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("not found: {0}")]
  NotFound(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
      Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Error::Store(e) => {
        tracing::error!(error = %e, "admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, Error::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"menucard-admin\""),
      );
    }
    res
  }
}
