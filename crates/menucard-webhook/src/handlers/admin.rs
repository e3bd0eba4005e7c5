//! Admin routes, all behind Basic auth.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/access?email=<email>` | Effective entitlements now; gating check |
//! | `GET`  | `/admin/entitlements?email=<email>` | All entitlements for the email |
//! | `GET`  | `/admin/entitlements/{order_id}` | 404 if the order was never provisioned |
//! | `POST` | `/admin/entitlements/expire` | Expire lapsed entitlements now |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::Utc;
use menucard_core::{
  account::EmailAddress,
  entitlement::Entitlement,
  identity::IdentityProvider,
  store::EntitlementStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Authenticated, error::Error};

#[derive(Debug, Deserialize)]
pub struct EmailParams {
  pub email: String,
}

impl EmailParams {
  fn parse(&self) -> Result<EmailAddress, Error> {
    EmailAddress::parse(&self.email).map_err(|e| Error::BadRequest(e.to_string()))
  }
}

#[derive(Debug, Serialize)]
pub struct AccessView {
  pub email:        EmailAddress,
  pub active:       bool,
  pub entitlements: Vec<Entitlement>,
}

/// `GET /admin/access?email=<email>`
pub async fn access<S, I>(
  _: Authenticated,
  State(state): State<AppState<S, I>>,
  Query(params): Query<EmailParams>,
) -> Result<Json<AccessView>, Error>
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  let email = params.parse()?;
  let entitlements = state
    .store
    .active_for_email(&email, Utc::now())
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;

  Ok(Json(AccessView {
    active: !entitlements.is_empty(),
    email,
    entitlements,
  }))
}

/// `GET /admin/entitlements?email=<email>`
pub async fn list<S, I>(
  _: Authenticated,
  State(state): State<AppState<S, I>>,
  Query(params): Query<EmailParams>,
) -> Result<Json<Vec<Entitlement>>, Error>
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  let email = params.parse()?;
  let entitlements = state
    .store
    .list_for_email(&email)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  Ok(Json(entitlements))
}

/// `GET /admin/entitlements/{order_id}`
pub async fn get_one<S, I>(
  _: Authenticated,
  State(state): State<AppState<S, I>>,
  Path(order_id): Path<String>,
) -> Result<Json<Entitlement>, Error>
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  let entitlement = state
    .store
    .get_by_order_id(&order_id)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?
    .ok_or_else(|| Error::NotFound(format!("no entitlement for order {order_id}")))?;
  Ok(Json(entitlement))
}

#[derive(Debug, Serialize)]
pub struct ExpireSummary {
  pub expired: u64,
}

/// `POST /admin/entitlements/expire`
pub async fn expire<S, I>(
  _: Authenticated,
  State(state): State<AppState<S, I>>,
) -> Result<Json<ExpireSummary>, Error>
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  let expired = state
    .store
    .expire_lapsed(Utc::now())
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  tracing::info!(expired, "expired lapsed entitlements on request");
  Ok(Json(ExpireSummary { expired }))
}
