//! `POST /webhooks/order`: order intake.
//!
//! Every delivery the resolver handles without a collaborator failure is
//! answered `200 OK`, including ones it ignores or rejects: the storefront
//! retries anything else, and a payload that cannot be processed now never
//! will be. The `x-webhook-outcome` header tells the outcomes apart.

use axum::{
  extract::State,
  http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use menucard_core::{identity::IdentityProvider, store::EntitlementStore};

use crate::{
  AppState,
  resolver::{Outcome, ResolveError},
};

pub const OUTCOME_HEADER: HeaderName = HeaderName::from_static("x-webhook-outcome");

pub async fn handler<S, I>(
  State(state): State<AppState<S, I>>,
  headers: HeaderMap,
  body: Bytes,
) -> Response
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  match state.resolver.resolve(&headers, &body).await {
    Ok(outcome) => {
      log_outcome(&outcome);
      respond(StatusCode::OK, "OK", outcome.label())
    }
    Err(err @ ResolveError::Verification(_)) => {
      tracing::warn!(error = %err, "webhook delivery rejected");
      respond(StatusCode::UNAUTHORIZED, "Unauthorized", err.label())
    }
    Err(err) => {
      // Details were logged with order context where the failure happened.
      respond(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", err.label())
    }
  }
}

fn log_outcome(outcome: &Outcome) {
  match outcome {
    Outcome::Ignored(reason) => tracing::debug!(?reason, "webhook ignored"),
    Outcome::Rejected(reason) => tracing::debug!(?reason, "webhook rejected"),
    Outcome::Provisioned(p) => tracing::debug!(order_id = %p.order_id, "webhook provisioned"),
  }
}

fn respond(status: StatusCode, body: &'static str, label: &'static str) -> Response {
  (status, [(OUTCOME_HEADER, HeaderValue::from_static(label))], body).into_response()
}
