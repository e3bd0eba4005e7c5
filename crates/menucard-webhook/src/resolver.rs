//! Order intake and entitlement resolution.
//!
//! [`Resolver::resolve`] turns one webhook delivery into exactly one
//! [`Outcome`], or a [`ResolveError`] when a collaborator (identity provider
//! or entitlement store) fails. Benign problems with the payload are outcomes,
//! never errors: the storefront retries anything that is not acknowledged,
//! and retrying a payload that can never be processed helps nobody.

use std::{error::Error as StdError, fmt, future::Future, sync::Arc, time::Duration};

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use menucard_core::{
  account::{Account, AccountCreation, EmailAddress},
  entitlement::NewEntitlement,
  identity::IdentityProvider,
  order::OrderEvent,
  policy::QualificationPolicy,
  store::EntitlementStore,
};
use thiserror::Error;
use uuid::Uuid;

use crate::verify::{AcceptAll, EventVerifier, VerifyError};

/// Default bound on each identity-provider and store call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Why a well-formed delivery was deliberately not acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
  /// Declared content type is not JSON; the storefront's handshake ping.
  NotJson,
  StatusNotQualifying(Option<String>),
  ProductNotQualifying,
  /// An entitlement for this order already exists.
  AlreadyProcessed,
}

/// Why a delivery could not be interpreted as an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
  MalformedJson,
  UnexpectedShape,
  MissingOrderId,
  MissingEmail,
  InvalidEmail,
}

/// A freshly provisioned entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
  pub order_id:        String,
  pub email:           EmailAddress,
  pub account_id:      Uuid,
  pub account_created: bool,
  pub expires_at:      Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Ignored(IgnoreReason),
  Rejected(RejectReason),
  Provisioned(Provisioned),
}

impl Outcome {
  /// Short label reported in the `x-webhook-outcome` response header.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Ignored(_) => "ignored",
      Self::Rejected(_) => "rejected",
      Self::Provisioned(_) => "provisioned",
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a single collaborator call gave up after its retry.
#[derive(Debug, Error)]
pub enum CallFailure {
  #[error("{0}")]
  Failed(#[source] Box<dyn StdError + Send + Sync>),
  #[error("timed out after {0:?}")]
  TimedOut(Duration),
}

/// Failures the storefront should retry, plus authenticity failures.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("delivery failed verification: {0}")]
  Verification(#[from] VerifyError),

  #[error("identity provider {op} failed: {source}")]
  Identity {
    op:     &'static str,
    #[source]
    source: CallFailure,
  },

  #[error("entitlement store {op} failed: {source}")]
  Store {
    op:     &'static str,
    #[source]
    source: CallFailure,
  },

  /// The provider refused to create an account because it exists, but then
  /// could not find it.
  #[error("account for {0} reported as existing but not found")]
  AccountVanished(EmailAddress),
}

impl ResolveError {
  /// Label reported in the `x-webhook-outcome` response header.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Verification(_) => "unauthorized",
      _ => "failed",
    }
  }
}

#[derive(Clone, Copy)]
enum Collaborator {
  Identity,
  Store,
}

impl fmt::Display for Collaborator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Identity => "identity",
      Self::Store => "store",
    })
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Stateless decision function over injected collaborators.
pub struct Resolver<S, I> {
  store:        Arc<S>,
  identity:     Arc<I>,
  policy:       QualificationPolicy,
  verifier:     Arc<dyn EventVerifier>,
  call_timeout: Duration,
}

impl<S, I> Resolver<S, I>
where
  S: EntitlementStore,
  I: IdentityProvider,
{
  /// A resolver that accepts unsigned deliveries.
  pub fn new(store: Arc<S>, identity: Arc<I>, policy: QualificationPolicy) -> Self {
    Self {
      store,
      identity,
      policy,
      verifier: Arc::new(AcceptAll),
      call_timeout: DEFAULT_CALL_TIMEOUT,
    }
  }

  pub fn with_verifier(mut self, verifier: Arc<dyn EventVerifier>) -> Self {
    self.verifier = verifier;
    self
  }

  pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = timeout;
    self
  }

  pub fn policy(&self) -> &QualificationPolicy { &self.policy }

  /// Process one delivery.
  pub async fn resolve(&self, headers: &HeaderMap, body: &[u8]) -> Result<Outcome, ResolveError> {
    if !declares_json(headers) {
      tracing::info!("non-JSON delivery acknowledged as handshake");
      return Ok(Outcome::Ignored(IgnoreReason::NotJson));
    }

    self.verifier.verify(headers, body)?;

    let document: serde_json::Value = match serde_json::from_slice(body) {
      Ok(v) => v,
      Err(e) => {
        tracing::warn!(error = %e, "webhook body is not valid JSON");
        return Ok(Outcome::Rejected(RejectReason::MalformedJson));
      }
    };
    let event: OrderEvent = match serde_json::from_value(document) {
      Ok(ev) => ev,
      Err(e) => {
        tracing::warn!(error = %e, "webhook body is not an order");
        return Ok(Outcome::Rejected(RejectReason::UnexpectedShape));
      }
    };

    let status = event.normalised_status();
    if !status.as_deref().is_some_and(|s| self.policy.status_qualifies(s)) {
      tracing::info!(order_id = ?event.order_key(), status = ?status, "order status does not qualify");
      return Ok(Outcome::Ignored(IgnoreReason::StatusNotQualifying(status)));
    }

    let Some(raw_email) = event.billing_email() else {
      tracing::warn!(order_id = ?event.order_key(), "order has no billing email");
      return Ok(Outcome::Rejected(RejectReason::MissingEmail));
    };
    let Some(order_id) = event.order_key() else {
      tracing::warn!("order has no id");
      return Ok(Outcome::Rejected(RejectReason::MissingOrderId));
    };
    let Ok(email) = EmailAddress::parse(raw_email) else {
      tracing::warn!(%order_id, "order billing email is malformed");
      return Ok(Outcome::Rejected(RejectReason::InvalidEmail));
    };

    if !self.policy.order_qualifies(&event) {
      tracing::info!(%order_id, "order has no digital menu card line item");
      return Ok(Outcome::Ignored(IgnoreReason::ProductNotQualifying));
    }

    self.provision(order_id, email).await
  }

  /// Steps after qualification: dedup, identity, upsert.
  async fn provision(&self, order_id: String, email: EmailAddress) -> Result<Outcome, ResolveError> {
    let store = &*self.store;
    let order_ref = order_id.as_str();

    let existing = self
      .call(Collaborator::Store, "get_by_order_id", move || store.get_by_order_id(order_ref))
      .await
      .map_err(|source| self.failed_store("get_by_order_id", &order_id, &email, source))?;
    if existing.is_some() {
      tracing::info!(%order_id, "order already provisioned");
      return Ok(Outcome::Ignored(IgnoreReason::AlreadyProcessed));
    }

    let (account, account_created) = self.resolve_account(&order_id, &email).await?;

    let now = Utc::now();
    let entitlement_id = Uuid::new_v4();
    let input = NewEntitlement {
      entitlement_id,
      order_id:   order_id.clone(),
      email:      email.clone(),
      account_id: account.account_id,
      product:    self.policy.product_sku.clone(),
      created_at: now,
      expires_at: self.policy.validity().map(|v| now + v),
    };

    let upserted = self
      .call(Collaborator::Store, "upsert_entitlement", move || store.upsert_entitlement(input.clone()))
      .await
      .map_err(|source| self.failed_store("upsert_entitlement", &order_id, &email, source))?;

    // A timed-out first attempt may still have committed before the retry.
    let ours = upserted.entitlement.entitlement_id == entitlement_id;
    if !upserted.inserted && !ours {
      tracing::info!(%order_id, "concurrent delivery provisioned this order first");
      return Ok(Outcome::Ignored(IgnoreReason::AlreadyProcessed));
    }

    tracing::info!(
      %order_id,
      %email,
      account_id = %account.account_id,
      account_created,
      "entitlement provisioned"
    );
    Ok(Outcome::Provisioned(Provisioned {
      order_id,
      email,
      account_id: account.account_id,
      account_created,
      expires_at: upserted.entitlement.expires_at,
    }))
  }

  /// Look the account up, creating it pre-confirmed when absent. A create
  /// that loses a race to another delivery falls back to a second lookup.
  async fn resolve_account(
    &self,
    order_id: &str,
    email: &EmailAddress,
  ) -> Result<(Account, bool), ResolveError> {
    let identity = &*self.identity;

    let found = self
      .call(Collaborator::Identity, "find_by_email", move || identity.find_by_email(email))
      .await
      .map_err(|source| self.failed_identity("find_by_email", order_id, email, source))?;
    if let Some(account) = found {
      return Ok((account, false));
    }

    let created = self
      .call(Collaborator::Identity, "create_confirmed", move || identity.create_confirmed(email))
      .await
      .map_err(|source| self.failed_identity("create_confirmed", order_id, email, source))?;

    match created {
      AccountCreation::Created(account) => Ok((account, true)),
      AccountCreation::AlreadyExists => {
        tracing::debug!(%order_id, %email, "account created concurrently; re-resolving");
        self
          .call(Collaborator::Identity, "find_by_email", move || identity.find_by_email(email))
          .await
          .map_err(|source| self.failed_identity("find_by_email", order_id, email, source))?
          .map(|account| (account, false))
          .ok_or_else(|| {
            tracing::error!(%order_id, %email, "account reported existing but not found");
            ResolveError::AccountVanished(email.clone())
          })
      }
    }
  }

  /// Run `op` with the call timeout, retrying once on error or timeout.
  async fn call<T, E, F, Fut>(
    &self,
    who: Collaborator,
    op: &'static str,
    mut op_fn: F,
  ) -> Result<T, CallFailure>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + Send + Sync + 'static,
  {
    let mut attempt = 1;
    loop {
      let failure = match tokio::time::timeout(self.call_timeout, op_fn()).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => CallFailure::Failed(Box::new(e)),
        Err(_) => CallFailure::TimedOut(self.call_timeout),
      };
      if attempt >= 2 {
        return Err(failure);
      }
      tracing::warn!(collaborator = %who, op, attempt, error = %failure, "call failed; retrying once");
      attempt += 1;
    }
  }

  fn failed_identity(
    &self,
    op: &'static str,
    order_id: &str,
    email: &EmailAddress,
    source: CallFailure,
  ) -> ResolveError {
    tracing::error!(%order_id, %email, op, error = %source, "identity provider failure");
    ResolveError::Identity { op, source }
  }

  fn failed_store(
    &self,
    op: &'static str,
    order_id: &str,
    email: &EmailAddress,
    source: CallFailure,
  ) -> ResolveError {
    tracing::error!(%order_id, %email, op, error = %source, "entitlement store failure");
    ResolveError::Store { op, source }
  }
}

/// Whether the declared content type is a JSON media type.
fn declares_json(headers: &HeaderMap) -> bool {
  headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(|v| {
      let essence = v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
      essence == "application/json" || essence.ends_with("+json")
    })
    .unwrap_or(false)
}
