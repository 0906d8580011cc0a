//! HTTP server assembly for Muster.
//!
//! Holds the deserialised [`ServerConfig`], turns it into the API state and
//! wraps the API router with a liveness check and request tracing.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Json, Router, routing::get};
use muster_api::{AdminAccount, ApiOptions, ApiState, AuthConfig};
use muster_core::{
  recorder::ScanPolicy,
  store::AttendanceStore,
  window::{LocalClock, WindowPolicy},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `muster.toml` layered
/// under `MUSTER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "default_public_base_url")]
  pub public_base_url:     String,
  #[serde(default)]
  pub window_policy:       WindowPolicy,
  /// Offset of the events' local wall clock from UTC.
  #[serde(default)]
  pub utc_offset_minutes:  i32,
  #[serde(default)]
  pub uniform_not_found:   bool,
  #[serde(default = "default_true")]
  pub trust_forwarded_for: bool,
  #[serde(default)]
  pub admins:              Vec<AdminAccount>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("muster.db") }
fn default_public_base_url() -> String { "http://localhost:8080".to_owned() }
fn default_true() -> bool { true }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                default_host(),
      port:                default_port(),
      store_path:          default_store_path(),
      public_base_url:     default_public_base_url(),
      window_policy:       WindowPolicy::default(),
      utc_offset_minutes:  0,
      uniform_not_found:   false,
      trust_forwarded_for: true,
      admins:              Vec::new(),
    }
  }
}

impl ServerConfig {
  /// Read the TOML file at `path` with `MUSTER_*` environment variables
  /// layered on top. A missing file leaves every key at its default.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MUSTER"))
      .build()?
      .try_deserialize()
  }

  /// `host:port` to bind.
  pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The store path with a leading `~/` expanded to `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    let raw = self.store_path.to_string_lossy();
    if let Some(rest) = raw.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }

  pub fn scan_policy(&self) -> ScanPolicy {
    ScanPolicy {
      window:            self.window_policy,
      clock:             LocalClock::from_offset_minutes(self.utc_offset_minutes),
      uniform_not_found: self.uniform_not_found,
    }
  }

  pub fn api_options(&self) -> ApiOptions {
    ApiOptions {
      public_base_url:     self.public_base_url.clone(),
      trust_forwarded_for: self.trust_forwarded_for,
    }
  }

  pub fn auth_config(&self) -> AuthConfig { AuthConfig { admins: self.admins.clone() } }
}

/// Build the shared handler state for `store` under `config`.
pub fn app_state<S: AttendanceStore>(store: Arc<S>, config: &ServerConfig) -> ApiState<S> {
  ApiState::new(store, config.scan_policy(), config.auth_config(), config.api_options())
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete axum [`Router`] for the server.
pub fn router<S>(state: ApiState<S>) -> Router
where
  S: AttendanceStore + 'static,
{
  Router::new()
    .route("/healthz", get(healthz))
    .merge(muster_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ────────────────────────────────────────────────────────
