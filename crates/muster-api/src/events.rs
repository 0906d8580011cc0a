//! Handlers for `/admin/events` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/admin/events` | Optional `?include_inactive=true` |
//! | `POST`  | `/admin/events` | Body: [`NewEvent`]; admin only |
//! | `GET`   | `/admin/events/{id}` | 404 if not found |
//! | `PATCH` | `/admin/events/{id}` | Body: [`EventPatch`]; admin only |
//! | `POST`  | `/admin/events/{id}/activate`, `/deactivate` | admin only |
//! | `GET`   | `/admin/events/{id}/attendance` | Ledger rows for the event |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  attendance::{LedgerEntry, LedgerQuery},
  event::{Event, EventPatch, NewEvent},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, auth::Authenticated, error::ApiError, ledger::PageParams};

/// An event as returned to administrators, with the URL a QR code should
/// encode.
#[derive(Debug, Serialize)]
pub struct EventView {
  #[serde(flatten)]
  pub event:    Event,
  pub scan_url: String,
}

fn view<S>(state: &ApiState<S>, event: Event) -> EventView {
  let scan_url = state.options.scan_url(event.scan_token.as_str());
  EventView { event, scan_url }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub include_inactive: bool,
}

/// `GET /admin/events[?include_inactive=true]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EventView>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let events = state.directory.list_events(params.include_inactive).await?;
  Ok(Json(events.into_iter().map(|e| view(&state, e)).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /admin/events`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let event = state.directory.create_event(&actor, body).await?;
  tracing::info!(event_id = %event.event_id, by = %actor.username, "event created");
  Ok((StatusCode::CREATED, Json(view(&state, event))))
}

// ─── Get / update ─────────────────────────────────────────────────────────────

/// `GET /admin/events/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<EventView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let event = state.directory.get_event(id).await?;
  Ok(Json(view(&state, event)))
}

/// `PATCH /admin/events/{id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
  payload: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Json<EventView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(patch) = payload?;
  let event = state.directory.update_event(&actor, id, patch).await?;
  Ok(Json(view(&state, event)))
}

// ─── Activation ───────────────────────────────────────────────────────────────

async fn set_active<S>(
  state: ApiState<S>,
  actor: muster_core::directory::Actor,
  id: Uuid,
  active: bool,
) -> Result<Json<EventView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let event = state.directory.set_event_active(&actor, id, active).await?;
  tracing::info!(event_id = %id, active, by = %actor.username, "event activation changed");
  Ok(Json(view(&state, event)))
}

/// `POST /admin/events/{id}/activate`
pub async fn activate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<EventView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, id, true).await
}

/// `POST /admin/events/{id}/deactivate`
pub async fn deactivate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<EventView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, id, false).await
}

// ─── Attendance ───────────────────────────────────────────────────────────────

/// `GET /admin/events/{id}/attendance[?limit=&offset=]`
pub async fn attendance<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(id): Path<Uuid>,
  Query(page): Query<PageParams>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  // 404 for unknown events rather than an empty list
  state.directory.get_event(id).await?;
  let query = LedgerQuery {
    event_id: Some(id),
    limit: Some(page.limit()),
    offset: page.offset,
    ..Default::default()
  };
  Ok(Json(state.directory.list_attendance(&query).await?))
}
