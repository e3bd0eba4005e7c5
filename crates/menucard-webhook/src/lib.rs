//! HTTP layer of the menucard entitlement service.
//!
//! Exposes an axum [`Router`] with the order webhook and the admin routes,
//! backed by any [`EntitlementStore`] and [`IdentityProvider`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod resolver;
pub mod sweep;
pub mod verify;

pub use config::{IdentitySettings, ServerConfig};
pub use error::Error;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use menucard_core::{identity::IdentityProvider, store::EntitlementStore};
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use handlers::{admin, webhook};
use resolver::Resolver;

/// Largest webhook body accepted; storefront orders are a few KiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers. Collaborators are built
/// by the process bootstrap and injected here.
pub struct AppState<S, I> {
  pub store:    Arc<S>,
  pub resolver: Arc<Resolver<S, I>>,
  pub auth:     Arc<AuthConfig>,
}

impl<S, I> Clone for AppState<S, I> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      resolver: self.resolver.clone(),
      auth:     self.auth.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the service [`Router`].
pub fn router<S, I>(state: AppState<S, I>) -> Router
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  Router::new()
    .route("/webhooks/order",                 post(webhook::handler::<S, I>))
    .route("/healthz",                        get(handlers::health))
    .route("/admin/access",                   get(admin::access::<S, I>))
    .route("/admin/entitlements",             get(admin::list::<S, I>))
    .route("/admin/entitlements/expire",      post(admin::expire::<S, I>))
    .route("/admin/entitlements/{order_id}",  get(admin::get_one::<S, I>))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use menucard_core::{
    account::EmailAddress,
    entitlement::EntitlementStatus,
    identity::IdentityProvider,
    policy::QualificationPolicy,
  };
  use menucard_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use crate::handlers::webhook::OUTCOME_HEADER;

  async fn make_state(password: &str) -> AppState<SqliteStore, SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store:    store.clone(),
      resolver: Arc::new(Resolver::new(store.clone(), store, QualificationPolicy::default())),
      auth:     Arc::new(AuthConfig {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore, SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    Vec<u8>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body)).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn deliver(
    state:        AppState<SqliteStore, SqliteStore>,
    content_type: &str,
    body:         Vec<u8>,
  ) -> axum::response::Response {
    oneshot_raw(
      state,
      "POST",
      "/webhooks/order",
      vec![(header::CONTENT_TYPE, content_type)],
      body,
    )
    .await
  }

  fn order_body(id: u64, status: &str, email: Option<&str>, sku: &str, name: &str) -> Vec<u8> {
    let mut billing = json!({ "first_name": "Ana" });
    if let Some(e) = email {
      billing["email"] = json!(e);
    }
    serde_json::to_vec(&json!({
      "id": id,
      "status": status,
      "billing": billing,
      "line_items": [{ "sku": sku, "name": name, "meta_data": [] }]
    }))
    .unwrap()
  }

  fn outcome(resp: &axum::response::Response) -> &str {
    resp.headers().get(OUTCOME_HEADER).unwrap().to_str().unwrap()
  }

  async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(resp).await).unwrap()
  }

  fn email(s: &str) -> EmailAddress { EmailAddress::parse(s).unwrap() }

  // ── Webhook ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn non_post_returns_405() {
    let state = make_state("secret").await;
    let resp  = oneshot_raw(state, "GET", "/webhooks/order", vec![], Vec::new()).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
  }

  #[tokio::test]
  async fn handshake_ping_returns_ok() {
    let state = make_state("secret").await;
    let resp  = deliver(
      state.clone(),
      "application/x-www-form-urlencoded",
      b"webhook_id=42".to_vec(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(outcome(&resp), "ignored");
    assert_eq!(body_text(resp).await, "OK");
  }

  #[tokio::test]
  async fn unparsable_json_returns_ok_without_entitlement() {
    let state = make_state("secret").await;
    let resp  = deliver(state.clone(), "application/json", b"{not json".to_vec()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(outcome(&resp), "rejected");
  }

  #[tokio::test]
  async fn pending_order_returns_ok_without_entitlement() {
    let state = make_state("secret").await;
    let body  = order_body(5, "pending", Some("a@example.com"), "carta_digital", "Carta");
    let resp  = deliver(state.clone(), "application/json", body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(outcome(&resp), "ignored");
    assert!(state.store.get_by_order_id("5").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn missing_email_returns_ok_and_creates_nothing() {
    let state = make_state("secret").await;
    let body  = order_body(6, "completed", None, "carta_digital", "Carta");
    let resp  = deliver(state.clone(), "application/json", body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(outcome(&resp), "rejected");
    assert!(state.store.get_by_order_id("6").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn qualifying_order_provisions_once() {
    let state = make_state("secret").await;
    let body  = order_body(1001, "completed", Some("new@example.com"), "carta_digital", "Cartel");

    let first = deliver(state.clone(), "application/json; charset=utf-8", body.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(outcome(&first), "provisioned");

    let second = deliver(state.clone(), "application/json", body).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(outcome(&second), "ignored");

    let rows = state.store.list_for_email(&email("new@example.com")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, EntitlementStatus::Active);

    let account = state.store.find_by_email(&email("new@example.com")).await.unwrap().unwrap();
    assert!(account.email_confirmed_at.is_some());
    assert_eq!(rows[0].account_id, account.account_id);
  }

  #[tokio::test]
  async fn oversized_body_returns_413() {
    let state = make_state("secret").await;
    let resp  = deliver(state, "application/json", vec![b' '; MAX_BODY_BYTES + 1]).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }

  #[tokio::test]
  async fn healthz_is_open() {
    let state = make_state("secret").await;
    let resp  = oneshot_raw(state, "GET", "/healthz", vec![], Vec::new()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  // ── Admin ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_routes_require_credentials() {
    let state = make_state("secret").await;
    let resp  = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/access?email=a@example.com",
      vec![],
      Vec::new(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let bad = auth_header("admin", "wrong");
    let resp = oneshot_raw(
      state,
      "POST",
      "/admin/entitlements/expire",
      vec![(header::AUTHORIZATION, bad.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn access_check_reflects_provisioning() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "secret");

    let before = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/access?email=Owner@Example.com",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(before.status(), StatusCode::OK);
    let json = body_json(before).await;
    assert_eq!(json["active"], json!(false));
    assert_eq!(json["email"], json!("owner@example.com"));

    let body = order_body(77, "processing", Some("owner@example.com"), "x", "Carta Digital Deluxe");
    deliver(state.clone(), "application/json", body).await;

    let after = oneshot_raw(
      state,
      "GET",
      "/admin/access?email=owner@example.com",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    let json = body_json(after).await;
    assert_eq!(json["active"], json!(true));
    assert_eq!(json["entitlements"][0]["order_id"], json!("77"));
    assert_eq!(json["entitlements"][0]["status"], json!("active"));
  }

  #[tokio::test]
  async fn access_check_rejects_malformed_email() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "secret");
    let resp  = oneshot_raw(
      state,
      "GET",
      "/admin/access?email=nope",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn get_entitlement_by_order() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "secret");

    let missing = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/entitlements/9999",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let body = order_body(9999, "completed", Some("b@example.com"), "carta_digital", "Cartel");
    deliver(state.clone(), "application/json", body).await;

    let found = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/entitlements/9999",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(found.status(), StatusCode::OK);
    let json = body_json(found).await;
    assert_eq!(json["email"], json!("b@example.com"));
    assert_eq!(json["product"], json!("carta_digital"));

    let listed = oneshot_raw(
      state,
      "GET",
      "/admin/entitlements?email=b@example.com",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(body_json(listed).await.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn expire_endpoint_reports_count() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "secret");
    let resp  = oneshot_raw(
      state,
      "POST",
      "/admin/entitlements/expire",
      vec![(header::AUTHORIZATION, auth.as_str())],
      Vec::new(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "expired": 0 }));
  }
}
