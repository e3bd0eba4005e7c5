//! Accounts and email addresses.
//!
//! Accounts are owned by the identity provider. The entitlement service only
//! ever looks one up by email or creates one with a pre-confirmed address.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Email ───────────────────────────────────────────────────────────────────

/// A normalised (trimmed, lower-cased) email address.
///
/// Normalisation is the only identity rule: two addresses that differ in case
/// or surrounding whitespace name the same customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
  /// Normalise `raw` and check it has the rough shape `local@domain`.
  pub fn parse(raw: &str) -> Result<Self> {
    let normalised = raw.trim().to_lowercase();
    match normalised.split_once('@') {
      Some((local, domain))
        if !local.is_empty()
          && !domain.is_empty()
          && !domain.contains('@')
          && !normalised.chars().any(char::is_whitespace) =>
      {
        Ok(Self(normalised))
      }
      _ => Err(Error::InvalidEmail(raw.to_owned())),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EmailAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for EmailAddress {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<EmailAddress> for String {
  fn from(value: EmailAddress) -> Self { value.0 }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// An identity-provider account as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:         Uuid,
  pub email:              EmailAddress,
  /// Set when the address is known to be verified. Accounts created by the
  /// resolver are always confirmed at creation.
  pub email_confirmed_at: Option<DateTime<Utc>>,
  pub created_at:         DateTime<Utc>,
}

/// Result of asking the identity provider to create an account.
///
/// An existing account for the same email is a normal outcome, not an error:
/// two deliveries for the same customer may race to create it.
#[derive(Debug, Clone)]
pub enum AccountCreation {
  Created(Account),
  AlreadyExists,
}
