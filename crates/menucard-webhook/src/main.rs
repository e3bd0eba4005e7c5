//! menucard server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `MENUCARD_*` environment variables, opens the SQLite entitlement store,
//! wires the configured identity provider and serves the order webhook plus
//! the admin routes over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```
//! cargo run -p menucard-webhook --bin menucard-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use menucard_core::{identity::IdentityProvider, store::EntitlementStore};
use menucard_identity_http::HttpIdentity;
use menucard_store_sqlite::SqliteStore;
use menucard_webhook::{
  AppState,
  IdentitySettings,
  ServerConfig,
  auth::AuthConfig,
  resolver::Resolver,
  sweep::spawn_expiry_sweep,
  verify::HmacSha256Verifier,
};
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "menucard order webhook and entitlement server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MENUCARD").separator("__"))
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match server_cfg.identity.clone() {
    IdentitySettings::Local => {
      tracing::info!("resolving accounts against the local store");
      serve(server_cfg, store.clone(), store).await
    }
    IdentitySettings::Http(http_cfg) => {
      tracing::info!(base_url = %http_cfg.base_url, "resolving accounts against hosted auth");
      let identity = HttpIdentity::new(http_cfg).context("failed to build identity client")?;
      serve(server_cfg, store, Arc::new(identity)).await
    }
  }
}

async fn serve<S, I>(cfg: ServerConfig, store: Arc<S>, identity: Arc<I>) -> anyhow::Result<()>
where
  S: EntitlementStore + 'static,
  I: IdentityProvider + 'static,
{
  let mut resolver = Resolver::new(store.clone(), identity, cfg.policy.clone())
    .with_call_timeout(cfg.upstream_timeout());
  match &cfg.webhook_secret {
    Some(secret) => {
      let verifier = HmacSha256Verifier::new(secret)
        .map_err(|e| anyhow::anyhow!("invalid webhook_secret: {e}"))?;
      resolver = resolver.with_verifier(Arc::new(verifier));
    }
    None => tracing::warn!("no webhook_secret configured; deliveries are not verified"),
  }

  if let Some(every) = cfg.sweep_interval() {
    tracing::info!(?every, "starting expiry sweep");
    spawn_expiry_sweep(store.clone(), every);
  }

  let state = AppState {
    store,
    resolver: Arc::new(resolver),
    auth: Arc::new(AuthConfig {
      username:      cfg.admin_username.clone(),
      password_hash: cfg.admin_password_hash.clone(),
    }),
  };

  let app = menucard_webhook::router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
