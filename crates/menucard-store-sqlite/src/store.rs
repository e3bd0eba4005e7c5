//! [`SqliteStore`], the SQLite implementation of [`EntitlementStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use menucard_core::{
  account::EmailAddress,
  entitlement::{Entitlement, EntitlementStatus, NewEntitlement, UpsertOutcome},
  store::EntitlementStore,
};

use crate::{
  encode::{ENTITLEMENT_COLUMNS, RawEntitlement, encode_dt, encode_uuid},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An entitlement store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query selecting [`ENTITLEMENT_COLUMNS`] and decode every row.
  async fn query_entitlements(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<Entitlement>> {
    let raws: Vec<RawEntitlement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawEntitlement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntitlement::into_entitlement).collect()
  }
}

// ─── EntitlementStore impl ───────────────────────────────────────────────────

impl EntitlementStore for SqliteStore {
  type Error = Error;

  async fn get_by_order_id<'a>(&'a self, order_id: &'a str) -> Result<Option<Entitlement>> {
    let order_id = order_id.to_owned();

    let raw: Option<RawEntitlement> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ENTITLEMENT_COLUMNS} FROM entitlements WHERE order_id = ?1"),
              rusqlite::params![order_id],
              RawEntitlement::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntitlement::into_entitlement).transpose()
  }

  async fn upsert_entitlement(&self, input: NewEntitlement) -> Result<UpsertOutcome> {
    let id_str         = encode_uuid(input.entitlement_id);
    let order_id       = input.order_id.clone();
    let email          = input.email.as_str().to_owned();
    let account_id_str = encode_uuid(input.account_id);
    let product        = input.product;
    let status         = EntitlementStatus::Active.as_str();
    let created_at_str = encode_dt(input.created_at);
    let expires_at_str = input.expires_at.map(encode_dt);

    // Insert and read back inside one `call` so no other statement on this
    // connection can interleave between the two.
    let (changed, raw): (usize, Option<RawEntitlement>) = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO entitlements (
             entitlement_id, order_id, email, account_id,
             product, status, created_at, expires_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(order_id) DO NOTHING",
          rusqlite::params![
            id_str,
            order_id,
            email,
            account_id_str,
            product,
            status,
            created_at_str,
            expires_at_str,
          ],
        )?;

        let raw = conn
          .query_row(
            &format!("SELECT {ENTITLEMENT_COLUMNS} FROM entitlements WHERE order_id = ?1"),
            rusqlite::params![order_id],
            RawEntitlement::from_row,
          )
          .optional()?;

        Ok((changed, raw))
      })
      .await?;

    let entitlement = raw
      .ok_or_else(|| Error::MissingAfterUpsert(input.order_id.clone()))?
      .into_entitlement()?;
    let inserted = changed == 1;

    if !inserted {
      tracing::debug!(order_id = %input.order_id, "entitlement already present; upsert was a no-op");
    }

    Ok(UpsertOutcome { entitlement, inserted })
  }

  async fn list_for_email<'a>(&'a self, email: &'a EmailAddress) -> Result<Vec<Entitlement>> {
    self
      .query_entitlements(
        format!(
          "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements
           WHERE email = ?1
           ORDER BY created_at DESC"
        ),
        vec![email.as_str().to_owned()],
      )
      .await
  }

  async fn active_for_email<'a>(
    &'a self,
    email: &'a EmailAddress,
    at: DateTime<Utc>,
  ) -> Result<Vec<Entitlement>> {
    self
      .query_entitlements(
        format!(
          "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements
           WHERE email = ?1
             AND status = 'active'
             AND (expires_at IS NULL OR expires_at > ?2)
           ORDER BY created_at DESC"
        ),
        vec![email.as_str().to_owned(), encode_dt(at)],
      )
      .await
  }

  async fn expire_lapsed(&self, at: DateTime<Utc>) -> Result<u64> {
    let at_str = encode_dt(at);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE entitlements
              SET status = 'expired'
            WHERE status = 'active'
              AND expires_at IS NOT NULL
              AND expires_at <= ?1",
          rusqlite::params![at_str],
        )?)
      })
      .await?;

    Ok(changed as u64)
  }
}
