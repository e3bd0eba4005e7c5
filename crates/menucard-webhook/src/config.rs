//! Runtime server configuration, deserialised from `config.toml` layered with
//! `MENUCARD_*` environment variables.

use std::{path::PathBuf, time::Duration};

use menucard_core::policy::QualificationPolicy;
use menucard_identity_http::HttpIdentityConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
  /// Shared secret for delivery signatures. Unset means deliveries are not
  /// verified.
  #[serde(default)]
  pub webhook_secret:      Option<String>,
  /// Bound on each identity-provider and store call made while resolving.
  #[serde(default = "default_upstream_timeout_ms")]
  pub upstream_timeout_ms: u64,
  /// Period of the background expiry sweep; unset disables it.
  #[serde(default)]
  pub sweep_interval_secs: Option<u64>,
  #[serde(default)]
  pub policy:              QualificationPolicy,
  #[serde(default)]
  pub identity:            IdentitySettings,
}

fn default_upstream_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  pub fn upstream_timeout(&self) -> Duration { Duration::from_millis(self.upstream_timeout_ms) }

  pub fn sweep_interval(&self) -> Option<Duration> {
    self
      .sweep_interval_secs
      .filter(|s| *s > 0)
      .map(Duration::from_secs)
  }
}

/// Which identity provider accounts are resolved against.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum IdentitySettings {
  /// The `accounts` table of the local SQLite store.
  #[default]
  Local,
  /// A hosted auth service's admin API.
  Http(HttpIdentityConfig),
}
