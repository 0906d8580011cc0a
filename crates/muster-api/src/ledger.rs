//! Read-only ledger endpoint.
//!
//! `GET /admin/attendance[?event_id=&attendee_id=&session_date=&limit=&offset=]`,
//! newest first. This is the interface report and export tooling builds on.

use axum::{
  Json,
  extract::{Query, State},
};
use muster_core::{
  attendance::{LedgerEntry, LedgerQuery},
  attendee::AttendeeId,
  store::AttendanceStore,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, auth::Authenticated, error::ApiError};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl PageParams {
  pub fn limit(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
  }
}

#[derive(Debug, Deserialize)]
pub struct LedgerParams {
  pub event_id:    Option<Uuid>,
  pub attendee_id: Option<String>,
  pub session_date: Option<NaiveDate>,
  // not flattened: serde_urlencoded cannot parse numbers through flatten
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// `GET /admin/attendance`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let attendee_id = params
    .attendee_id
    .as_deref()
    .map(AttendeeId::parse)
    .transpose()
    .map_err(|e| ApiError::bad_request("invalid_format", e.to_string()))?;

  let page = PageParams { limit: params.limit, offset: params.offset };
  let query = LedgerQuery {
    event_id: params.event_id,
    attendee_id,
    session_date: params.session_date,
    limit: Some(page.limit()),
    offset: page.offset,
  };
  Ok(Json(state.directory.list_attendance(&query).await?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_size_is_capped() {
    assert_eq!(PageParams::default().limit(), DEFAULT_PAGE_SIZE);
    assert_eq!(PageParams { limit: Some(5), offset: None }.limit(), 5);
    assert_eq!(PageParams { limit: Some(1_000_000), offset: None }.limit(), MAX_PAGE_SIZE);
  }
}
