//! The `IdentityProvider` trait.
//!
//! The identity provider owns user accounts. The resolver consumes exactly
//! two capabilities: look an account up by email, and create one whose email
//! is already confirmed (a purchase implies a verified contact).

use std::future::Future;

use crate::account::{Account, AccountCreation, EmailAddress};

pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Find the account registered under `email`, if any.
  fn find_by_email<'a>(
    &'a self,
    email: &'a EmailAddress,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// Create an account for `email` with the address marked as confirmed.
  ///
  /// Must report [`AccountCreation::AlreadyExists`] rather than an error
  /// when another account already holds the address.
  fn create_confirmed<'a>(
    &'a self,
    email: &'a EmailAddress,
  ) -> impl Future<Output = Result<AccountCreation, Self::Error>> + Send + 'a;
}
