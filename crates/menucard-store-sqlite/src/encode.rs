//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexicographic comparison in SQL matches chronological
//! order. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use menucard_core::{
  account::{Account, EmailAddress},
  entitlement::{Entitlement, EntitlementStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Raw rows ─────────────────────────────────────────────────────────────────

pub const ENTITLEMENT_COLUMNS: &str = "entitlement_id, order_id, email, account_id, \
                                       product, status, created_at, expires_at";

/// Raw column values read from an `entitlements` row.
pub struct RawEntitlement {
  pub entitlement_id: String,
  pub order_id:       String,
  pub email:          String,
  pub account_id:     String,
  pub product:        String,
  pub status:         String,
  pub created_at:     String,
  pub expires_at:     Option<String>,
}

impl RawEntitlement {
  /// Row mapper for queries selecting [`ENTITLEMENT_COLUMNS`] in order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entitlement_id: row.get(0)?,
      order_id:       row.get(1)?,
      email:          row.get(2)?,
      account_id:     row.get(3)?,
      product:        row.get(4)?,
      status:         row.get(5)?,
      created_at:     row.get(6)?,
      expires_at:     row.get(7)?,
    })
  }

  pub fn into_entitlement(self) -> Result<Entitlement> {
    Ok(Entitlement {
      entitlement_id: decode_uuid(&self.entitlement_id)?,
      order_id:       self.order_id,
      email:          EmailAddress::parse(&self.email)?,
      account_id:     decode_uuid(&self.account_id)?,
      product:        self.product,
      status:         self.status.parse::<EntitlementStatus>()?,
      created_at:     decode_dt(&self.created_at)?,
      expires_at:     decode_opt_dt(self.expires_at)?,
    })
  }
}

pub const ACCOUNT_COLUMNS: &str = "account_id, email, email_confirmed_at, created_at";

/// Raw column values read from an `accounts` row.
pub struct RawAccount {
  pub account_id:         String,
  pub email:              String,
  pub email_confirmed_at: Option<String>,
  pub created_at:         String,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:         row.get(0)?,
      email:              row.get(1)?,
      email_confirmed_at: row.get(2)?,
      created_at:         row.get(3)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:         decode_uuid(&self.account_id)?,
      email:              EmailAddress::parse(&self.email)?,
      email_confirmed_at: decode_opt_dt(self.email_confirmed_at)?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}
