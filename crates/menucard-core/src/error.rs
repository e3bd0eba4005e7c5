//! Error types for `menucard-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entitlement status: {0:?}")]
  UnknownStatus(String),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
