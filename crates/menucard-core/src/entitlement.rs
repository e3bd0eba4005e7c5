//! Entitlements: the access grant derived from a qualifying purchase.
//!
//! At most one entitlement exists per upstream order id. Entitlements are
//! written once by the resolver; the only later mutation is the transition
//! from `active` to `expired`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, account::EmailAddress};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
  Active,
  Expired,
}

impl EntitlementStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Expired => "expired",
    }
  }
}

impl fmt::Display for EntitlementStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for EntitlementStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "active" => Ok(Self::Active),
      "expired" => Ok(Self::Expired),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

// ─── Entitlement ─────────────────────────────────────────────────────────────

/// A persisted grant of admin-panel access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
  pub entitlement_id: Uuid,
  /// Upstream order identifier; unique across all entitlements.
  pub order_id:       String,
  pub email:          EmailAddress,
  /// The identity-provider account resolved for `email`.
  pub account_id:     Uuid,
  /// Tag of the purchased product.
  pub product:        String,
  pub status:         EntitlementStatus,
  pub created_at:     DateTime<Utc>,
  pub expires_at:     Option<DateTime<Utc>>,
}

impl Entitlement {
  /// Whether this entitlement grants access at instant `at`.
  pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
    self.status == EntitlementStatus::Active
      && self.expires_at.is_none_or(|exp| exp > at)
  }
}

/// Input to [`crate::store::EntitlementStore::upsert_entitlement`].
///
/// Status always starts as `active`.
#[derive(Debug, Clone)]
pub struct NewEntitlement {
  /// Chosen by the caller, so a retried upsert can recognise its own row.
  pub entitlement_id: Uuid,
  pub order_id:       String,
  pub email:          EmailAddress,
  pub account_id:     Uuid,
  pub product:        String,
  pub created_at:     DateTime<Utc>,
  pub expires_at:     Option<DateTime<Utc>>,
}

/// What an upsert did. `inserted == false` means a row for the same order id
/// already existed and was returned unchanged.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
  pub entitlement: Entitlement,
  pub inserted:    bool,
}
