//! The `EntitlementStore` trait.
//!
//! Implemented by storage backends (e.g. `menucard-store-sqlite`). The
//! resolver and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  account::EmailAddress,
  entitlement::{Entitlement, NewEntitlement, UpsertOutcome},
};

/// Abstraction over an entitlement store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EntitlementStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve the entitlement for an upstream order. Returns `None` if the
  /// order has never been provisioned.
  fn get_by_order_id<'a>(
    &'a self,
    order_id: &'a str,
  ) -> impl Future<Output = Result<Option<Entitlement>, Self::Error>> + Send + 'a;

  /// Atomically insert an entitlement keyed on `order_id`.
  ///
  /// If a row for the same order already exists it is returned unchanged
  /// with `inserted == false`; concurrent callers can never produce two rows.
  fn upsert_entitlement(
    &self,
    input: NewEntitlement,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  /// All entitlements for `email`, any status, newest first.
  fn list_for_email<'a>(
    &'a self,
    email: &'a EmailAddress,
  ) -> impl Future<Output = Result<Vec<Entitlement>, Self::Error>> + Send + 'a;

  /// Entitlements for `email` that grant access at instant `at`.
  fn active_for_email<'a>(
    &'a self,
    email: &'a EmailAddress,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Entitlement>, Self::Error>> + Send + 'a;

  /// Mark every active entitlement whose `expires_at <= at` as expired.
  /// Returns the number of entitlements changed.
  fn expire_lapsed(
    &self,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
