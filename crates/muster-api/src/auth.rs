//! HTTP Basic-auth extractor and standalone verifier.
//!
//! Administrators are listed in configuration with an argon2 PHC hash and a
//! [`Role`]; a verified request yields the matching [`Actor`].

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use muster_core::{
  directory::{Actor, Role},
  store::AttendanceStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

/// One administrator account, as written in the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminAccount {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub admins: Vec<AdminAccount>,
}

/// Present in a handler's arguments means the request carried valid
/// credentials; the wrapped [`Actor`] says who and with which role.
pub struct Authenticated(pub Actor);

/// Verify credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Actor, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let account = config
    .admins
    .iter()
    .find(|a| a.username == username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| {
      tracing::debug!(username, "rejected credentials");
      ApiError::Unauthorized
    })?;

  Ok(Actor { username: account.username.clone(), role: account.role })
}

impl<S> FromRequestParts<ApiState<S>> for Authenticated
where
  S: AttendanceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Authenticated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use axum::http::{Request, header};
  use muster_core::{
    attendance::{InsertOutcome, LedgerEntry, LedgerQuery, NewAttendance},
    attendee::{Attendee, AttendeeId, ImportSummary, NewAttendee},
    checkpoint::{
      Checkpoint, CheckpointEntry, CheckpointInsertOutcome, CheckpointQuery, NewCheckpoint,
      NewCheckpointAttendance,
    },
    event::{Event, NewEvent},
    recorder::ScanPolicy,
  };
  use crate::ApiOptions;

  // A minimal no-op store for testing auth only.
  struct NoopStore;

  impl AttendanceStore for NoopStore {
    type Error = std::convert::Infallible;
    async fn create_event(&self, _: NewEvent, _: String) -> Result<Event, Self::Error> { unimplemented!() }
    async fn get_event(&self, _: uuid::Uuid) -> Result<Option<Event>, Self::Error> { unimplemented!() }
    async fn find_event_by_token(&self, _: &str) -> Result<Option<Event>, Self::Error> { unimplemented!() }
    async fn list_events(&self, _: bool) -> Result<Vec<Event>, Self::Error> { unimplemented!() }
    async fn update_event(&self, _: &Event) -> Result<bool, Self::Error> { unimplemented!() }
    async fn set_event_active(&self, _: uuid::Uuid, _: bool) -> Result<Option<Event>, Self::Error> { unimplemented!() }
    async fn create_attendee(&self, _: NewAttendee, _: String) -> Result<Option<Attendee>, Self::Error> { unimplemented!() }
    async fn find_attendee(&self, _: &AttendeeId) -> Result<Option<Attendee>, Self::Error> { unimplemented!() }
    async fn list_attendees(&self, _: bool) -> Result<Vec<Attendee>, Self::Error> { unimplemented!() }
    async fn update_attendee(&self, _: &Attendee) -> Result<bool, Self::Error> { unimplemented!() }
    async fn set_attendee_active(&self, _: AttendeeId, _: bool) -> Result<Option<Attendee>, Self::Error> { unimplemented!() }
    async fn import_attendees(&self, _: Vec<NewAttendee>, _: String) -> Result<ImportSummary, Self::Error> { unimplemented!() }
    async fn insert_attendance(&self, _: NewAttendance) -> Result<InsertOutcome, Self::Error> { unimplemented!() }
    async fn create_checkpoint(&self, _: uuid::Uuid, _: NewCheckpoint, _: String) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn get_checkpoint(&self, _: uuid::Uuid) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn find_checkpoint_by_code(&self, _: &str) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn list_checkpoints(&self, _: uuid::Uuid, _: bool) -> Result<Vec<Checkpoint>, Self::Error> { unimplemented!() }
    async fn set_checkpoint_active(&self, _: uuid::Uuid, _: bool) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn list_attendance(&self, _: &LedgerQuery) -> Result<Vec<LedgerEntry>, Self::Error> { unimplemented!() }
    async fn insert_checkpoint_attendance(&self, _: NewCheckpointAttendance) -> Result<CheckpointInsertOutcome, Self::Error> { unimplemented!() }
    async fn list_checkpoint_attendance(&self, _: &CheckpointQuery) -> Result<Vec<CheckpointEntry>, Self::Error> { unimplemented!() }
  }

  fn hash(password: &str) -> String {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn make_state() -> ApiState<NoopStore> {
    ApiState::new(
      Arc::new(NoopStore),
      ScanPolicy::default(),
      AuthConfig {
        admins: vec![
          AdminAccount { username: "root".into(), password_hash: hash("secret"), role: Role::Admin },
          AdminAccount { username: "guest".into(), password_hash: hash("visitor"), role: Role::Viewer },
        ],
      },
      ApiOptions::default(),
    )
  }

  async fn extract(req: Request<axum::body::Body>, state: &ApiState<NoopStore>) -> Result<Actor, ApiError> {
    let (mut parts, _) = req.into_parts();
    Authenticated::from_request_parts(&mut parts, state).await.map(|Authenticated(a)| a)
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn request(auth: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder();
    if let Some(value) = auth {
      builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(axum::body::Body::empty()).unwrap()
  }

  #[tokio::test]
  async fn correct_credentials_yield_actor_with_role() {
    let state = make_state();
    let actor = extract(request(Some(&basic("root", "secret"))), &state).await.unwrap();
    assert_eq!(actor, Actor { username: "root".into(), role: Role::Admin });

    let actor = extract(request(Some(&basic("guest", "visitor"))), &state).await.unwrap();
    assert_eq!(actor.role, Role::Viewer);
  }

  #[tokio::test]
  async fn wrong_password() {
    let state = make_state();
    let res = extract(request(Some(&basic("root", "visitor"))), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn unknown_user() {
    let state = make_state();
    let res = extract(request(Some(&basic("mallory", "secret"))), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn missing_header() {
    let state = make_state();
    assert!(matches!(extract(request(None), &state).await, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn invalid_base64() {
    let state = make_state();
    let res = extract(request(Some("Basic !!!not-base64!!!")), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }
}
