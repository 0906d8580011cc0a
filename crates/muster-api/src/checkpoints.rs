//! Checkpoint handlers: the public check-in page and its admin management.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/checkpoint/{code}` | Checkpoint summary; 404/403 for unknown or closed checkpoints |
//! | `POST` | `/checkpoint/{code}` | Body as for `/scan/{token}`; 201 recorded, 200 already recorded |
//! | `GET`  | `/admin/events/{id}/checkpoints` | Position order; optional `?include_inactive=true` |
//! | `POST` | `/admin/events/{id}/checkpoints` | Body: [`NewCheckpoint`]; admin only |
//! | `GET`  | `/admin/checkpoints/{id}` | 404 if not found |
//! | `POST` | `/admin/checkpoints/{id}/activate`, `/deactivate` | admin only |
//! | `GET`  | `/admin/checkpoints/{id}/attendance` | Check-ins, newest first |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use muster_core::{
  checkpoint::{Checkpoint, CheckpointEntry, CheckpointKind, CheckpointQuery, CheckpointStatus, NewCheckpoint},
  directory::Actor,
  recorder::{CheckpointScanRequest, RecordOutcome, ScanWarning},
  store::AttendanceStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  ApiState,
  auth::Authenticated,
  error::ApiError,
  events::ListParams,
  ledger::PageParams,
  meta::ClientMeta,
  scan::{AttendeeRef, EventRef, ScanBody},
};

/// A checkpoint as returned to administrators.
#[derive(Debug, Serialize)]
pub struct CheckpointView {
  #[serde(flatten)]
  pub checkpoint: Checkpoint,
  pub scan_url:   String,
}

fn view<S>(state: &ApiState<S>, checkpoint: Checkpoint) -> CheckpointView {
  let scan_url = state.options.checkpoint_url(checkpoint.code.as_str());
  CheckpointView { checkpoint, scan_url }
}

// ─── Public ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CheckpointSummary {
  pub name:          String,
  pub description:   String,
  pub kind:          CheckpointKind,
  pub required_time: NaiveTime,
  pub grace_minutes: u32,
  pub event:         EventRef,
  pub location:      String,
  /// Whether check-ins are accepted today.
  pub held_today:    bool,
}

/// `GET /checkpoint/{code}`
pub async fn summary<S>(
  State(state): State<ApiState<S>>,
  Path(code): Path<String>,
) -> Result<Json<CheckpointSummary>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let (checkpoint, event) = state.recorder.resolve_checkpoint(&code).await?;
  let held_today = state.recorder.is_held_now(&checkpoint, &event, Utc::now());
  Ok(Json(CheckpointSummary {
    name: checkpoint.name,
    description: checkpoint.description,
    kind: checkpoint.kind,
    required_time: checkpoint.required_time,
    grace_minutes: checkpoint.grace_minutes,
    event: EventRef { event_id: event.event_id, name: event.name },
    location: event.location,
    held_today,
  }))
}

#[derive(Debug, Serialize)]
pub struct CheckpointRef {
  pub checkpoint_id: Uuid,
  pub name:          String,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
  #[serde(flatten)]
  pub outcome:           RecordOutcome,
  pub message:           String,
  /// Early, on time or late against the required time.
  pub timing:            CheckpointStatus,
  pub checkpoint:        CheckpointRef,
  pub event:             EventRef,
  pub attendee:          AttendeeRef,
  pub session_date:      NaiveDate,
  pub warnings:          Vec<ScanWarning>,
  pub location_captured: bool,
}

fn timing_label(status: CheckpointStatus) -> &'static str {
  match status {
    CheckpointStatus::Early => "early",
    CheckpointStatus::OnTime => "on time",
    CheckpointStatus::Late => "late",
  }
}

/// `POST /checkpoint/{code}`
pub async fn record<S>(
  State(state): State<ApiState<S>>,
  Path(code): Path<String>,
  ClientMeta(meta): ClientMeta,
  payload: Result<Json<ScanBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let receipt = state
    .recorder
    .record_checkpoint(CheckpointScanRequest {
      code,
      attendee_id: body.attendee_id,
      context: body.client_context,
      meta,
    })
    .await?;

  let name = receipt.attendee.full_name();
  let timing = timing_label(receipt.status);
  let (status, message) = match receipt.outcome {
    RecordOutcome::Recorded { .. } => (
      StatusCode::CREATED,
      format!("{name} checked in at {} ({timing}).", receipt.checkpoint.name),
    ),
    RecordOutcome::AlreadyRecorded { recorded_at } => (
      StatusCode::OK,
      format!(
        "{name} already checked in at {} at {} ({timing}).",
        receipt.checkpoint.name,
        recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
      ),
    ),
  };

  tracing::info!(
    checkpoint_id = %receipt.checkpoint.checkpoint_id,
    attendee_id = %receipt.attendee.attendee_id,
    session_date = %receipt.session_date,
    timing,
    recorded = receipt.outcome.is_new(),
    "check-in accepted"
  );

  let response = CheckInResponse {
    outcome: receipt.outcome,
    message,
    timing: receipt.status,
    checkpoint: CheckpointRef {
      checkpoint_id: receipt.checkpoint.checkpoint_id,
      name:          receipt.checkpoint.name,
    },
    event: EventRef { event_id: receipt.event.event_id, name: receipt.event.name },
    attendee: AttendeeRef { attendee_id: receipt.attendee.attendee_id, name },
    session_date: receipt.session_date,
    warnings: receipt.warnings,
    location_captured: receipt.location_captured,
  };
  Ok((status, Json(response)))
}

// ─── Admin ────────────────────────────────────────────────────────────────────

/// `GET /admin/events/{id}/checkpoints[?include_inactive=true]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(event_id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CheckpointView>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let checkpoints = state
    .directory
    .list_checkpoints(event_id, params.include_inactive)
    .await?;
  Ok(Json(checkpoints.into_iter().map(|c| view(&state, c)).collect()))
}

/// `POST /admin/events/{id}/checkpoints`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(event_id): Path<Uuid>,
  payload: Result<Json<NewCheckpoint>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let checkpoint = state.directory.create_checkpoint(&actor, event_id, body).await?;
  tracing::info!(
    checkpoint_id = %checkpoint.checkpoint_id,
    %event_id,
    by = %actor.username,
    "checkpoint created"
  );
  Ok((StatusCode::CREATED, Json(view(&state, checkpoint))))
}

/// `GET /admin/checkpoints/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<CheckpointView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let checkpoint = state.directory.get_checkpoint(id).await?;
  Ok(Json(view(&state, checkpoint)))
}

async fn set_active<S>(
  state: ApiState<S>,
  actor: Actor,
  id: Uuid,
  active: bool,
) -> Result<Json<CheckpointView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let checkpoint = state.directory.set_checkpoint_active(&actor, id, active).await?;
  tracing::info!(checkpoint_id = %id, active, by = %actor.username, "checkpoint activation changed");
  Ok(Json(view(&state, checkpoint)))
}

/// `POST /admin/checkpoints/{id}/activate`
pub async fn activate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<CheckpointView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, id, true).await
}

/// `POST /admin/checkpoints/{id}/deactivate`
pub async fn deactivate<S>(
  State(state): State<ApiState<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<CheckpointView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  set_active(state, actor, id, false).await
}

/// `GET /admin/checkpoints/{id}/attendance[?limit=&offset=]`
pub async fn attendance<S>(
  State(state): State<ApiState<S>>,
  Authenticated(_): Authenticated,
  Path(id): Path<Uuid>,
  Query(page): Query<PageParams>,
) -> Result<Json<Vec<CheckpointEntry>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  state.directory.get_checkpoint(id).await?;
  let query = CheckpointQuery {
    checkpoint_id: Some(id),
    limit: Some(page.limit()),
    offset: page.offset,
    ..Default::default()
  };
  Ok(Json(state.directory.list_checkpoint_attendance(&query).await?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timing_labels_read_naturally() {
    assert_eq!(timing_label(CheckpointStatus::OnTime), "on time");
    assert_eq!(timing_label(CheckpointStatus::Late), "late");
  }
}
