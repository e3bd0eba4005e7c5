//! Error type for `menucard-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] menucard_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An upsert reported success but the row could not be read back.
  #[error("entitlement for order {0:?} vanished after upsert")]
  MissingAfterUpsert(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
