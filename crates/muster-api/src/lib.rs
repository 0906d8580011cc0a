//! JSON REST API for Muster.
//!
//! Exposes an axum [`Router`] backed by any
//! [`muster_core::store::AttendanceStore`]: the public scan and check-in
//! endpoints, the Basic-auth protected directory under `/admin`, and ledger
//! reads. TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new().merge(muster_api::api_router(state))
//! ```
//!
//! Serve with `into_make_service_with_connect_info::<SocketAddr>()` so peer
//! addresses reach the ledger when no trusted proxy header is present.

pub mod attendees;
pub mod auth;
pub mod checkpoints;
pub mod error;
pub mod events;
pub mod ledger;
pub mod meta;
pub mod scan;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use muster_core::{
  directory::Directory,
  recorder::{Recorder, ScanPolicy},
  store::AttendanceStore,
};

pub use auth::{AdminAccount, AuthConfig};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Deployment-specific knobs that are not part of the scan policy.
#[derive(Debug, Clone)]
pub struct ApiOptions {
  /// Externally visible origin, used to build each event's `scan_url`.
  pub public_base_url:     String,
  /// Take the client address from the first `X-Forwarded-For` entry.
  pub trust_forwarded_for: bool,
}

impl ApiOptions {
  /// The URL an event's QR code should encode.
  pub fn scan_url(&self, token: &str) -> String {
    format!("{}/scan/{token}", self.public_base_url.trim_end_matches('/'))
  }

  /// The URL a checkpoint's QR code should encode.
  pub fn checkpoint_url(&self, code: &str) -> String {
    format!("{}/checkpoint/{code}", self.public_base_url.trim_end_matches('/'))
  }
}

impl Default for ApiOptions {
  fn default() -> Self {
    Self {
      public_base_url:     "http://localhost:8080".to_owned(),
      trust_forwarded_for: true,
    }
  }
}

/// Shared state threaded through all axum handlers.
pub struct ApiState<S> {
  pub recorder:  Recorder<S>,
  pub directory: Directory<S>,
  pub auth:      Arc<AuthConfig>,
  pub options:   Arc<ApiOptions>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      recorder:  self.recorder.clone(),
      directory: self.directory.clone(),
      auth:      Arc::clone(&self.auth),
      options:   Arc::clone(&self.options),
    }
  }
}

impl<S: AttendanceStore> ApiState<S> {
  pub fn new(
    store: Arc<S>,
    policy: ScanPolicy,
    auth: AuthConfig,
    options: ApiOptions,
  ) -> Self {
    Self {
      recorder:  Recorder::new(Arc::clone(&store), policy),
      directory: Directory::new(store),
      auth:      Arc::new(auth),
      options:   Arc::new(options),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Public scan flow
    .route("/scan/validate-id", post(scan::validate_id::<S>))
    .route("/scan/{token}", get(scan::summary::<S>).post(scan::record::<S>))
    .route(
      "/checkpoint/{code}",
      get(checkpoints::summary::<S>).post(checkpoints::record::<S>),
    )
    // Events
    .route("/admin/events", get(events::list::<S>).post(events::create::<S>))
    .route("/admin/events/{id}", get(events::get_one::<S>).patch(events::update::<S>))
    .route("/admin/events/{id}/activate", post(events::activate::<S>))
    .route("/admin/events/{id}/deactivate", post(events::deactivate::<S>))
    .route("/admin/events/{id}/attendance", get(events::attendance::<S>))
    // Checkpoints
    .route(
      "/admin/events/{id}/checkpoints",
      get(checkpoints::list::<S>).post(checkpoints::create::<S>),
    )
    .route("/admin/checkpoints/{id}", get(checkpoints::get_one::<S>))
    .route("/admin/checkpoints/{id}/activate", post(checkpoints::activate::<S>))
    .route("/admin/checkpoints/{id}/deactivate", post(checkpoints::deactivate::<S>))
    .route("/admin/checkpoints/{id}/attendance", get(checkpoints::attendance::<S>))
    // Attendees
    .route("/admin/attendees", get(attendees::list::<S>).post(attendees::create::<S>))
    .route("/admin/attendees/import", post(attendees::import::<S>))
    .route(
      "/admin/attendees/{attendee_id}",
      get(attendees::get_one::<S>).patch(attendees::update::<S>),
    )
    .route("/admin/attendees/{attendee_id}/activate", post(attendees::activate::<S>))
    .route("/admin/attendees/{attendee_id}/deactivate", post(attendees::deactivate::<S>))
    // Ledger
    .route("/admin/attendance", get(ledger::list::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scan_url_joins_cleanly() {
    let opts = ApiOptions { public_base_url: "https://muster.example.org/".into(), ..Default::default() };
    assert_eq!(opts.scan_url("AB12CD34EF56"), "https://muster.example.org/scan/AB12CD34EF56");
    assert_eq!(
      opts.checkpoint_url("AB12CD34EF56GH78"),
      "https://muster.example.org/checkpoint/AB12CD34EF56GH78"
    );
  }
}
