//! Handlers for `/admin/attendees` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/admin/attendees` | Optional `?include_inactive=true` |
//! | `POST`  | `/admin/attendees` | Body: [`NewAttendee`]; `attendee_id` optional |
//! | `POST`  | `/admin/attendees/import` | Body: JSON array of [`NewAttendee`] |
//! | `GET`   | `/admin/attendees/{attendee_id}` | 404 if not found |
//! | `PATCH` | `/admin/attendees/{attendee_id}` | Body: [`AttendeePatch`] |
//! | `POST`  | `/admin/attendees/{attendee_id}/activate`, `/deactivate` | |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  attendee::{Attendee, AttendeeId, AttendeePatch, ImportSummary, NewAttendee},
  directory::Actor,
  store::AttendanceStore,
};

use crate::{ApiState, auth::Authenticated, error::ApiError, events::ListParams};

fn parse_id(raw: &str) -> Result<AttendeeId, ApiError> {
  AttendeeId::parse(raw).map_err(|e| ApiError::bad_request("invalid_format", e.to_string()))
}

/// `GET /admin/attendees[?include_inactive=true]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Attendee>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  Ok(Json(state.directory.list_attendees(params.include_inactive).await?))
}

/// `POST /admin/attendees`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  payload: Result<Json<NewAttendee>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let attendee = state.directory.create_attendee(&actor, body).await?;
  tracing::info!(attendee_id = %attendee.attendee_id, by = %actor.username, "attendee registered");
  Ok((StatusCode::CREATED, Json(attendee)))
}

/// `POST /admin/attendees/import`
pub async fn import<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  payload: Result<Json<Vec<NewAttendee>>, JsonRejection>,
) -> Result<Json<ImportSummary>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(rows) = payload?;
  Ok(Json(state.directory.import_attendees(&actor, rows).await?))
}

/// `GET /admin/attendees/{attendee_id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(raw): Path<String>,
) -> Result<Json<Attendee>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let id = parse_id(&raw)?;
  Ok(Json(state.directory.get_attendee(&id).await?))
}

/// `PATCH /admin/attendees/{attendee_id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(raw): Path<String>,
  payload: Result<Json<AttendeePatch>, JsonRejection>,
) -> Result<Json<Attendee>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(patch) = payload?;
  let id = parse_id(&raw)?;
  Ok(Json(state.directory.update_attendee(&actor, &id, patch).await?))
}

async fn set_active<S>(
  state: ApiState<S>,
  actor: Actor,
  raw: &str,
  active: bool,
) -> Result<Json<Attendee>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let id = parse_id(raw)?;
  let attendee = state.directory.set_attendee_active(&actor, id, active).await?;
  tracing::info!(
    attendee_id = %attendee.attendee_id,
    active,
    by = %actor.username,
    "attendee activation changed"
  );
  Ok(Json(attendee))
}

/// `POST /admin/attendees/{attendee_id}/activate`
pub async fn activate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(raw): Path<String>,
) -> Result<Json<Attendee>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, &raw, true).await
}

/// `POST /admin/attendees/{attendee_id}/deactivate`
pub async fn deactivate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(raw): Path<String>,
) -> Result<Json<Attendee>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, &raw, false).await
}
