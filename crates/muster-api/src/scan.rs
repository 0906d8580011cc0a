//! Public handlers for the attendee-facing scan page.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/scan/{token}` | Event summary; 404/403 for unknown or closed events |
//! | `POST` | `/scan/{token}` | Body: `{"attendee_id":"00042","client_context":{…}}`; 201 recorded, 200 already recorded |
//! | `POST` | `/scan/validate-id` | Body: `{"attendee_id":"00042"}`; display name for confirmation |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use muster_core::{
  attendance::ClientContext,
  attendee::AttendeeId,
  recorder::{RecordOutcome, ScanRequest, ScanWarning},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError, meta::ClientMeta};

// ─── Summary ──────────────────────────────────────────────────────────────────

/// What the scan page shows before the attendee types their ID.
#[derive(Debug, Serialize)]
pub struct EventSummary {
  pub name:            String,
  pub description:     String,
  pub date:            NaiveDate,
  pub end_date:        Option<NaiveDate>,
  pub start_time:      NaiveTime,
  pub end_time:        NaiveTime,
  pub location:        String,
  /// Every day the event runs; one attendance per attendee per day.
  pub available_dates: Vec<NaiveDate>,
  pub within_window:   bool,
}

/// `GET /scan/{token}`
pub async fn summary<S>(
  State(state): State<ApiState<S>>,
  Path(token): Path<String>,
) -> Result<Json<EventSummary>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let event = state.recorder.resolve(&token).await?;
  let within_window = state.recorder.is_within_window(&event, Utc::now());
  let available_dates = event.available_dates().collect();
  Ok(Json(EventSummary {
    name: event.name,
    description: event.description,
    date: event.date,
    end_date: event.end_date,
    start_time: event.start_time,
    end_time: event.end_time,
    location: event.location,
    available_dates,
    within_window,
  }))
}

// ─── Record ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScanBody {
  pub attendee_id:    String,
  #[serde(default)]
  pub client_context: ClientContext,
}

#[derive(Debug, Serialize)]
pub struct EventRef {
  pub event_id: Uuid,
  pub name:     String,
}

#[derive(Debug, Serialize)]
pub struct AttendeeRef {
  pub attendee_id: AttendeeId,
  pub name:        String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
  #[serde(flatten)]
  pub outcome:           RecordOutcome,
  pub message:           String,
  pub event:             EventRef,
  pub attendee:          AttendeeRef,
  pub session_date:      NaiveDate,
  pub warnings:          Vec<ScanWarning>,
  pub location_captured: bool,
}

/// `POST /scan/{token}`
pub async fn record<S>(
  State(state): State<ApiState<S>>,
  Path(token): Path<String>,
  ClientMeta(meta): ClientMeta,
  payload: Result<Json<ScanBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let receipt = state
    .recorder
    .record(ScanRequest {
      scan_token: token,
      attendee_id: body.attendee_id,
      context: body.client_context,
      meta,
    })
    .await?;

  let name = receipt.attendee.full_name();
  let (status, message) = match receipt.outcome {
    RecordOutcome::Recorded { .. } => {
      (StatusCode::CREATED, format!("Attendance recorded for {name}."))
    }
    RecordOutcome::AlreadyRecorded { recorded_at } => (
      StatusCode::OK,
      format!("{name} was already recorded at {}.", recorded_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ),
  };

  tracing::info!(
    event_id = %receipt.event.event_id,
    attendee_id = %receipt.attendee.attendee_id,
    session_date = %receipt.session_date,
    recorded = receipt.outcome.is_new(),
    warnings = receipt.warnings.len(),
    "scan accepted"
  );

  let response = ScanResponse {
    outcome: receipt.outcome,
    message,
    event: EventRef { event_id: receipt.event.event_id, name: receipt.event.name },
    attendee: AttendeeRef { attendee_id: receipt.attendee.attendee_id, name },
    session_date: receipt.session_date,
    warnings: receipt.warnings,
    location_captured: receipt.location_captured,
  };
  Ok((status, Json(response)))
}

// ─── Validate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub attendee_id: String,
}

/// `POST /scan/validate-id`
pub async fn validate_id<S>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<ValidateBody>, JsonRejection>,
) -> Result<Json<AttendeeRef>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let attendee = state.recorder.lookup_attendee(&body.attendee_id).await?;
  Ok(Json(AttendeeRef {
    name:        attendee.full_name(),
    attendee_id: attendee.attendee_id,
  }))
}
