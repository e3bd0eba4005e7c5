//! Error type for `menucard-identity-http`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}: {body}")]
  Status {
    method: &'static str,
    path:   &'static str,
    status: u16,
    body:   String,
  },

  #[error("identity provider returned a user without a usable email")]
  MissingEmail,

  #[error("core error: {0}")]
  Core(#[from] menucard_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
