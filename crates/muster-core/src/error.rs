//! Error types for `muster-core`.

use thiserror::Error;

/// Input errors that can be detected without touching storage.
#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid attendee identifier {0:?}: expected 5 digits")]
  InvalidFormat(String),

  #[error("invalid input: {0}")]
  Validation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a scan could not be recorded.
///
/// Every variant except [`ScanError::Store`] is caller-correctable and is
/// surfaced to the attendee's device as-is. `AlreadyRecorded` is not an error;
/// see [`crate::recorder::RecordOutcome`].
#[derive(Debug, Error)]
pub enum ScanError<E>
where
  E: std::error::Error + 'static,
{
  #[error("invalid attendee identifier {0:?}: expected 5 digits")]
  InvalidFormat(String),

  #[error("event not found")]
  EventNotFound,

  #[error("event is not accepting attendance")]
  EventInactive,

  #[error("attendee not found")]
  AttendeeNotFound,

  #[error("attendee is inactive")]
  AttendeeInactive,

  #[error("checkpoint not found")]
  CheckpointNotFound,

  #[error("checkpoint is not accepting check-ins")]
  CheckpointInactive,

  /// The checkpoint is not held on today's date.
  #[error("checkpoint is not held on {0}")]
  CheckpointUnavailable(chrono::NaiveDate),

  #[error("store error: {0}")]
  Store(#[source] E),
}

impl<E> ScanError<E>
where
  E: std::error::Error + 'static,
{
  /// Stable machine-readable name, used in API responses.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InvalidFormat(_) => "invalid_format",
      Self::EventNotFound => "event_not_found",
      Self::EventInactive => "event_inactive",
      Self::AttendeeNotFound => "attendee_not_found",
      Self::AttendeeInactive => "attendee_inactive",
      Self::CheckpointNotFound => "checkpoint_not_found",
      Self::CheckpointInactive => "checkpoint_inactive",
      Self::CheckpointUnavailable(_) => "checkpoint_unavailable",
      Self::Store(_) => "unavailable",
    }
  }
}

/// Errors from permission-gated directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError<E>
where
  E: std::error::Error + 'static,
{
  #[error("{actor} is not permitted to {action}")]
  PermissionDenied {
    actor:  String,
    action: &'static str,
  },

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] E),
}

impl<E> From<Error> for DirectoryError<E>
where
  E: std::error::Error + 'static,
{
  fn from(e: Error) -> Self {
    match e {
      Error::InvalidFormat(raw) => Self::Validation(format!(
        "invalid attendee identifier {raw:?}: expected 5 digits"
      )),
      Error::Validation(msg) => Self::Validation(msg),
    }
  }
}
