//! Async HTTP client for the auth service's admin API.

use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use menucard_core::{
  account::{Account, AccountCreation, EmailAddress},
  identity::IdentityProvider,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{Error, Result};

/// Connection settings for the admin API, deserialised from the `[identity]`
/// table of the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpIdentityConfig {
  /// Base URL of the admin API, e.g. `https://auth.example.com/auth/v1`.
  pub base_url:     String,
  /// Service-role key; sent as both `apikey` and bearer token.
  pub service_key:  String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Users requested per page when listing.
  #[serde(default = "default_page_size")]
  pub page_size:    u32,
  /// Upper bound on pages walked by one lookup.
  #[serde(default = "default_max_pages")]
  pub max_pages:    u32,
}

fn default_timeout_secs() -> u64 { 30 }

fn default_page_size() -> u32 { 50 }

fn default_max_pages() -> u32 { 200 }

/// A user object as returned by the admin API.
#[derive(Debug, Deserialize)]
struct RemoteUser {
  id:                 Uuid,
  email:              Option<String>,
  email_confirmed_at: Option<DateTime<Utc>>,
  created_at:         DateTime<Utc>,
}

impl RemoteUser {
  fn into_account(self) -> Result<Account> {
    let email = self.email.ok_or(Error::MissingEmail)?;
    Ok(Account {
      account_id:         self.id,
      email:              EmailAddress::parse(&email)?,
      email_confirmed_at: self.email_confirmed_at,
      created_at:         self.created_at,
    })
  }
}

#[derive(Debug, Deserialize)]
struct UserList {
  #[serde(default)]
  users: Vec<RemoteUser>,
}

/// Identity provider talking to a remote admin API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpIdentity {
  client: Client,
  config: HttpIdentityConfig,
}

impl HttpIdentity {
  pub fn new(config: HttpIdentityConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("apikey", &self.config.service_key)
      .bearer_auth(&self.config.service_key)
  }

  async fn list_page(&self, email: &EmailAddress, page: u32, per_page: u32) -> Result<UserList> {
    let resp = self
      .auth(self.client.get(self.url("/admin/users")))
      .query(&[
        ("email", email.as_str().to_owned()),
        ("page", page.to_string()),
        ("per_page", per_page.to_string()),
      ])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Self::status_error("GET", "/admin/users", resp).await);
    }
    Ok(resp.json().await?)
  }

  async fn status_error(
    method: &'static str,
    path: &'static str,
    resp: reqwest::Response,
  ) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Error::Status { method, path, status, body }
  }
}

impl IdentityProvider for HttpIdentity {
  type Error = Error;

  /// `GET /admin/users?email=<email>&page=<n>&per_page=<n>`
  ///
  /// The service may treat the filter as a substring match or ignore it, so
  /// pages are walked until the exact address turns up, a short page ends
  /// the listing, or a page brings no unseen users.
  async fn find_by_email<'a>(&'a self, email: &'a EmailAddress) -> Result<Option<Account>> {
    let per_page = self.config.page_size.max(1);
    let mut seen = HashSet::new();

    for page in 1..=self.config.max_pages.max(1) {
      let list = self.list_page(email, page, per_page).await?;
      let returned = list.users.len();
      let mut fresh = 0;

      for user in list.users {
        if !seen.insert(user.id) {
          continue;
        }
        fresh += 1;
        let matches = user
          .email
          .as_deref()
          .and_then(|e| EmailAddress::parse(e).ok())
          .is_some_and(|e| &e == email);
        if matches {
          return user.into_account().map(Some);
        }
      }

      if returned < per_page as usize || fresh == 0 {
        return Ok(None);
      }
    }

    tracing::warn!(%email, max_pages = self.config.max_pages, "user listing not exhausted");
    Ok(None)
  }

  /// `POST /admin/users` with the address pre-confirmed.
  async fn create_confirmed<'a>(&'a self, email: &'a EmailAddress) -> Result<AccountCreation> {
    let resp = self
      .auth(self.client.post(self.url("/admin/users")))
      .json(&json!({ "email": email.as_str(), "email_confirm": true }))
      .send()
      .await?;

    match resp.status() {
      StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
        tracing::debug!(%email, status = %resp.status(), "account already registered upstream");
        Ok(AccountCreation::AlreadyExists)
      }
      s if s.is_success() => {
        let user: RemoteUser = resp.json().await?;
        Ok(AccountCreation::Created(user.into_account()?))
      }
      _ => Err(Self::status_error("POST", "/admin/users", resp).await),
    }
  }
}
