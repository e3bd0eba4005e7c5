pub mod admin;
pub mod webhook;

/// `GET /healthz`
pub async fn health() -> &'static str { "OK" }
