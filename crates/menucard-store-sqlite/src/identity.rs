//! Local identity provider backed by the `accounts` table.
//!
//! Used for single-node deployments and tests; hosted deployments point the
//! server at a remote provider instead.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use menucard_core::{
  account::{Account, AccountCreation, EmailAddress},
  identity::IdentityProvider,
};

use crate::{
  encode::{ACCOUNT_COLUMNS, RawAccount, encode_dt, encode_uuid},
  Error, Result, SqliteStore,
};

impl IdentityProvider for SqliteStore {
  type Error = Error;

  async fn find_by_email<'a>(&'a self, email: &'a EmailAddress) -> Result<Option<Account>> {
    let email = email.as_str().to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
              rusqlite::params![email],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn create_confirmed<'a>(&'a self, email: &'a EmailAddress) -> Result<AccountCreation> {
    let now = Utc::now();
    let account = Account {
      account_id:         Uuid::new_v4(),
      email:              email.clone(),
      email_confirmed_at: Some(now),
      created_at:         now,
    };

    let id_str    = encode_uuid(account.account_id);
    let email_str = account.email.as_str().to_owned();
    let at_str    = encode_dt(now);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO accounts (account_id, email, email_confirmed_at, created_at)
           VALUES (?1, ?2, ?3, ?3)
           ON CONFLICT(email) DO NOTHING",
          rusqlite::params![id_str, email_str, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(AccountCreation::AlreadyExists);
    }
    Ok(AccountCreation::Created(account))
  }
}
