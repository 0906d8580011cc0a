//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"error": <kind>, "message": <text>}`,
//! where `kind` is a stable machine-readable name.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use muster_core::error::{DirectoryError, ScanError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  /// A caller-correctable refusal.
  #[error("{message}")]
  Rejected {
    status:  StatusCode,
    kind:    &'static str,
    message: String,
  },

  /// Storage failed while handling a scan. The attendee only learns to retry.
  #[error("attendance could not be recorded, please try again")]
  Unavailable,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn bad_request(kind: &'static str, message: impl Into<String>) -> Self {
    Self::Rejected { status: StatusCode::BAD_REQUEST, kind, message: message.into() }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Unauthorized => "unauthorized",
      Self::Rejected { kind, .. } => *kind,
      Self::Unavailable => "unavailable",
      Self::Store(_) => "internal",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::Rejected { status, .. } => *status,
      Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(json!({ "error": self.kind(), "message": self.to_string() }));
    let mut res = (status, body).into_response();
    if matches!(self, Self::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"muster\""),
      );
    }
    res
  }
}

impl<E> From<ScanError<E>> for ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(err: ScanError<E>) -> Self {
    let status = match &err {
      ScanError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
      ScanError::EventNotFound
      | ScanError::AttendeeNotFound
      | ScanError::CheckpointNotFound => StatusCode::NOT_FOUND,
      ScanError::EventInactive
      | ScanError::AttendeeInactive
      | ScanError::CheckpointInactive
      | ScanError::CheckpointUnavailable(_) => StatusCode::FORBIDDEN,
      ScanError::Store(e) => {
        tracing::error!(error = %e, "store fault while handling scan");
        return Self::Unavailable;
      }
    };
    tracing::debug!(kind = err.kind(), "scan refused");
    Self::Rejected { status, kind: err.kind(), message: err.to_string() }
  }
}

/// Malformed or mistyped request bodies get the same JSON error shape as
/// every other refusal.
impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    tracing::debug!(error = %rejection, "request body rejected");
    Self::bad_request("invalid_body", rejection.body_text())
  }
}

impl<E> From<DirectoryError<E>> for ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(err: DirectoryError<E>) -> Self {
    let (status, kind) = match &err {
      DirectoryError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, "permission_denied"),
      DirectoryError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
      DirectoryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
      DirectoryError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
      DirectoryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    match err {
      DirectoryError::Store(e) => {
        tracing::error!(error = %e, "store fault in directory operation");
        Self::Store(Box::new(e))
      }
      other => {
        tracing::debug!(kind, error = %other, "directory request refused");
        Self::Rejected { status, kind, message: other.to_string() }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("disk on fire")]
  struct Boom;

  #[test]
  fn scan_errors_map_to_statuses() {
    let day = chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let cases: [(ScanError<Boom>, StatusCode); 9] = [
      (ScanError::InvalidFormat("42".into()), StatusCode::BAD_REQUEST),
      (ScanError::EventNotFound, StatusCode::NOT_FOUND),
      (ScanError::EventInactive, StatusCode::FORBIDDEN),
      (ScanError::AttendeeNotFound, StatusCode::NOT_FOUND),
      (ScanError::AttendeeInactive, StatusCode::FORBIDDEN),
      (ScanError::CheckpointNotFound, StatusCode::NOT_FOUND),
      (ScanError::CheckpointInactive, StatusCode::FORBIDDEN),
      (ScanError::CheckpointUnavailable(day), StatusCode::FORBIDDEN),
      (ScanError::Store(Boom), StatusCode::SERVICE_UNAVAILABLE),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), status);
    }
  }

  #[test]
  fn store_fault_on_scan_hides_detail() {
    let err = ApiError::from(ScanError::Store(Boom));
    assert!(matches!(err, ApiError::Unavailable));
    assert!(!err.to_string().contains("disk"));
  }

  #[test]
  fn unauthorized_sets_challenge() {
    let res = ApiError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[test]
  fn directory_errors_keep_kind() {
    let err = ApiError::from(DirectoryError::<Boom>::Conflict("attendee 00042 already exists".into()));
    assert_eq!(err.kind(), "conflict");
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn json_rejection_keeps_error_shape() {
    use axum::{body::Body, extract::FromRequest, http::Request};

    let request = Request::builder()
      .method("POST")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let rejection = Json::<serde_json::Value>::from_request(request, &()).await.unwrap_err();

    let err = ApiError::from(rejection);
    assert_eq!(err.kind(), "invalid_body");
    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
  }
}
