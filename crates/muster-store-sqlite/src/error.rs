//! Error type for `muster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] muster_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("malformed column value: {0}")]
  Decode(String),

  /// Every generated candidate collided with an existing row.
  #[error("could not allocate a unique {0}")]
  IdentifierExhausted(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
