//! The attendance recorder: scan token + attendee ID → one ledger row.
//!
//! Checks run in a fixed order and short-circuit:
//!
//! 1. identifier format (no storage access),
//! 2. event lookup, active flag, scheduled window,
//! 3. attendee lookup and active flag,
//! 4. the atomic ledger insert, which decides `Recorded` vs
//!    `AlreadyRecorded`.
//!
//! Checkpoint scans follow the same order, with the checkpoint (and its
//! parent event) resolved in step 2 and the day check replacing the window
//! check.
//!
//! Nothing is written until every check has passed, and the recorder holds no
//! mutable state of its own; concurrent scans are arbitrated by the store.

use std::{net::IpAddr, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
  attendance::{
    ClientContext, DeviceFootprint, GeoPoint, InsertOutcome, NewAttendance, RequestMeta,
  },
  attendee::{Attendee, AttendeeId},
  checkpoint::{Checkpoint, CheckpointInsertOutcome, CheckpointStatus, NewCheckpointAttendance},
  error::ScanError,
  event::Event,
  store::AttendanceStore,
  window::{LocalClock, WindowPolicy, within_window},
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for scan handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanPolicy {
  pub window:            WindowPolicy,
  /// Wall clock used to compare `now` against event schedules.
  pub clock:             LocalClock,
  /// Report deactivated events and checkpoints as not found, so a caller
  /// cannot tell a retired code from a wrong one.
  pub uniform_not_found: bool,
}

// ─── Request / result ────────────────────────────────────────────────────────

/// Everything the HTTP layer hands over for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
  pub scan_token:  String,
  /// Unvalidated, exactly as typed by the attendee.
  pub attendee_id: String,
  pub context:     ClientContext,
  pub meta:        RequestMeta,
}

/// A scan of a checkpoint's QR code.
#[derive(Debug, Clone, Default)]
pub struct CheckpointScanRequest {
  pub code:        String,
  pub attendee_id: String,
  pub context:     ClientContext,
  pub meta:        RequestMeta,
}

/// The two successful outcomes of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
  /// This scan created the ledger row.
  Recorded { recorded_at: DateTime<Utc> },
  /// The attendee was already recorded for this session; `recorded_at` is
  /// the original timestamp.
  AlreadyRecorded { recorded_at: DateTime<Utc> },
}

impl RecordOutcome {
  pub fn recorded_at(&self) -> DateTime<Utc> {
    match self {
      Self::Recorded { recorded_at } | Self::AlreadyRecorded { recorded_at } => {
        *recorded_at
      }
    }
  }

  pub fn is_new(&self) -> bool { matches!(self, Self::Recorded { .. }) }
}

/// Non-fatal observations attached to a successful scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanWarning {
  /// Accepted outside the event's scheduled date/time window.
  OutsideWindow,
  /// The reported location was discarded.
  InvalidLocation { reason: String },
}

/// What a successful scan returns to the caller.
#[derive(Debug, Clone)]
pub struct ScanReceipt {
  pub event:             Event,
  pub attendee:          Attendee,
  pub session_date:      NaiveDate,
  pub outcome:           RecordOutcome,
  pub warnings:          Vec<ScanWarning>,
  pub location_captured: bool,
}

/// What a successful checkpoint scan returns to the caller.
#[derive(Debug, Clone)]
pub struct CheckpointReceipt {
  pub checkpoint:        Checkpoint,
  pub event:             Event,
  pub attendee:          Attendee,
  pub session_date:      NaiveDate,
  pub outcome:           RecordOutcome,
  /// Status of the stored row; the original one for a repeat scan.
  pub status:            CheckpointStatus,
  pub warnings:          Vec<ScanWarning>,
  pub location_captured: bool,
}

/// The device facts stored with a ledger row.
struct Capture {
  ip_address: Option<IpAddr>,
  user_agent: String,
  location:   Option<GeoPoint>,
  footprint:  DeviceFootprint,
}

impl Capture {
  /// Out-of-range locations are dropped with a warning. The user agent is
  /// the request header, else the one the page reported.
  fn new(context: ClientContext, meta: RequestMeta, warnings: &mut Vec<ScanWarning>) -> Self {
    let location = match context.location {
      Some(point) => match point.check() {
        Ok(()) => Some(point),
        Err(reason) => {
          warnings.push(ScanWarning::InvalidLocation { reason });
          None
        }
      },
      None => None,
    };

    let user_agent = meta
      .user_agent
      .filter(|ua| !ua.is_empty())
      .or_else(|| context.user_agent.clone())
      .unwrap_or_default();

    Self {
      ip_address: meta.address,
      user_agent,
      location,
      footprint: DeviceFootprint::from_context(&context),
    }
  }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

/// Stateless scan handler over a shared store.
pub struct Recorder<S> {
  store:  Arc<S>,
  policy: ScanPolicy,
}

impl<S> Clone for Recorder<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy }
  }
}

impl<S: AttendanceStore> Recorder<S> {
  pub fn new(store: Arc<S>, policy: ScanPolicy) -> Self { Self { store, policy } }

  pub fn policy(&self) -> &ScanPolicy { &self.policy }

  /// Resolve a scan token to an active event.
  pub async fn resolve(&self, token: &str) -> Result<Event, ScanError<S::Error>> {
    let event = self
      .store
      .find_event_by_token(token)
      .await
      .map_err(ScanError::Store)?
      .ok_or(ScanError::EventNotFound)?;
    self.require_active_event(event)
  }

  /// Resolve a checkpoint code to an active checkpoint and its active event.
  pub async fn resolve_checkpoint(
    &self,
    code: &str,
  ) -> Result<(Checkpoint, Event), ScanError<S::Error>> {
    let checkpoint = self
      .store
      .find_checkpoint_by_code(code)
      .await
      .map_err(ScanError::Store)?
      .ok_or(ScanError::CheckpointNotFound)?;

    if !checkpoint.is_active {
      return Err(if self.policy.uniform_not_found {
        ScanError::CheckpointNotFound
      } else {
        ScanError::CheckpointInactive
      });
    }

    let event = self
      .store
      .get_event(checkpoint.event_id)
      .await
      .map_err(ScanError::Store)?
      .ok_or(ScanError::CheckpointNotFound)?;
    Ok((checkpoint, self.require_active_event(event)?))
  }

  fn require_active_event(&self, event: Event) -> Result<Event, ScanError<S::Error>> {
    if !event.is_active {
      return Err(if self.policy.uniform_not_found {
        ScanError::EventNotFound
      } else {
        ScanError::EventInactive
      });
    }
    Ok(event)
  }

  /// Validate and look up an attendee identifier typed on the scan page.
  pub async fn lookup_attendee(
    &self,
    raw: &str,
  ) -> Result<Attendee, ScanError<S::Error>> {
    let id = parse_id(raw)?;
    self.find_active_attendee(&id).await
  }

  /// Whether `event` is inside its scheduled window at `now`.
  pub fn is_within_window(&self, event: &Event, now: DateTime<Utc>) -> bool {
    within_window(event, self.policy.clock.local(now))
  }

  /// The session of `event` a scan at `now` counts toward.
  pub fn session_for(&self, event: &Event, now: DateTime<Utc>) -> NaiveDate {
    event.session_for(self.policy.clock.local(now).date())
  }

  /// Whether `checkpoint` is held on the local date at `now`.
  pub fn is_held_now(&self, checkpoint: &Checkpoint, event: &Event, now: DateTime<Utc>) -> bool {
    checkpoint.held_on(event, self.policy.clock.local(now).date())
  }

  /// Record a scan using the current time for the window check.
  pub async fn record(
    &self,
    request: ScanRequest,
  ) -> Result<ScanReceipt, ScanError<S::Error>> {
    self.record_as_of(request, Utc::now()).await
  }

  /// Record a scan; `now` drives the schedule-window check and the session
  /// date. The ledger timestamp is always assigned by the store.
  pub async fn record_as_of(
    &self,
    request: ScanRequest,
    now: DateTime<Utc>,
  ) -> Result<ScanReceipt, ScanError<S::Error>> {
    let ScanRequest { scan_token, attendee_id, context, meta } = request;

    let attendee_id = parse_id(&attendee_id)?;
    let event = self.resolve(&scan_token).await?;

    let mut warnings = Vec::new();
    let outside_window = match self.policy.window {
      WindowPolicy::Ignore => false,
      WindowPolicy::Warn | WindowPolicy::Reject => {
        !self.is_within_window(&event, now)
      }
    };
    if outside_window {
      if self.policy.window == WindowPolicy::Reject {
        return Err(ScanError::EventInactive);
      }
      warnings.push(ScanWarning::OutsideWindow);
    }

    let attendee = self.find_active_attendee(&attendee_id).await?;
    let session_date = self.session_for(&event, now);
    let capture = Capture::new(context, meta, &mut warnings);
    let location = capture.location;

    let input = NewAttendance {
      event_id: event.event_id,
      attendee_id,
      session_date,
      ip_address: capture.ip_address,
      user_agent: capture.user_agent,
      location,
      outside_window,
      footprint: capture.footprint,
    };

    let outcome = match self
      .store
      .insert_attendance(input)
      .await
      .map_err(ScanError::Store)?
    {
      InsertOutcome::Inserted(record) => {
        RecordOutcome::Recorded { recorded_at: record.recorded_at }
      }
      InsertOutcome::Existing { recorded_at } => {
        // Nothing was written, so nothing about this scan is worth flagging.
        warnings.clear();
        RecordOutcome::AlreadyRecorded { recorded_at }
      }
    };

    Ok(ScanReceipt {
      event,
      attendee,
      session_date,
      outcome,
      location_captured: outcome.is_new() && location.is_some(),
      warnings,
    })
  }

  pub async fn record_checkpoint(
    &self,
    request: CheckpointScanRequest,
  ) -> Result<CheckpointReceipt, ScanError<S::Error>> {
    self.record_checkpoint_as_of(request, Utc::now()).await
  }

  /// Record a checkpoint check-in; `now` decides the day and the
  /// early/on-time/late status.
  pub async fn record_checkpoint_as_of(
    &self,
    request: CheckpointScanRequest,
    now: DateTime<Utc>,
  ) -> Result<CheckpointReceipt, ScanError<S::Error>> {
    let CheckpointScanRequest { code, attendee_id, context, meta } = request;

    let attendee_id = parse_id(&attendee_id)?;
    let (checkpoint, event) = self.resolve_checkpoint(&code).await?;

    let local = self.policy.clock.local(now);
    let session_date = local.date();
    if !checkpoint.held_on(&event, session_date) {
      return Err(ScanError::CheckpointUnavailable(session_date));
    }

    let attendee = self.find_active_attendee(&attendee_id).await?;
    let mut warnings = Vec::new();
    let capture = Capture::new(context, meta, &mut warnings);
    let location = capture.location;

    let input = NewCheckpointAttendance {
      checkpoint_id: checkpoint.checkpoint_id,
      event_id: event.event_id,
      attendee_id,
      session_date,
      status: checkpoint.status_at(local),
      ip_address: capture.ip_address,
      user_agent: capture.user_agent,
      location,
      footprint: capture.footprint,
    };

    let (outcome, status) = match self
      .store
      .insert_checkpoint_attendance(input)
      .await
      .map_err(ScanError::Store)?
    {
      CheckpointInsertOutcome::Inserted(record) => {
        (RecordOutcome::Recorded { recorded_at: record.recorded_at }, record.status)
      }
      CheckpointInsertOutcome::Existing { recorded_at, status } => {
        warnings.clear();
        (RecordOutcome::AlreadyRecorded { recorded_at }, status)
      }
    };

    Ok(CheckpointReceipt {
      checkpoint,
      event,
      attendee,
      session_date,
      outcome,
      status,
      location_captured: outcome.is_new() && location.is_some(),
      warnings,
    })
  }

  async fn find_active_attendee(
    &self,
    id: &AttendeeId,
  ) -> Result<Attendee, ScanError<S::Error>> {
    let attendee = self
      .store
      .find_attendee(id)
      .await
      .map_err(ScanError::Store)?
      .ok_or(ScanError::AttendeeNotFound)?;
    if !attendee.is_active {
      return Err(ScanError::AttendeeInactive);
    }
    Ok(attendee)
  }
}

fn parse_id<E>(raw: &str) -> Result<AttendeeId, ScanError<E>>
where
  E: std::error::Error + 'static,
{
  AttendeeId::parse(raw).map_err(|_| ScanError::InvalidFormat(raw.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    attendance::{LedgerEntry, LedgerQuery},
    attendee::{ImportSummary, NewAttendee},
    checkpoint::{CheckpointEntry, CheckpointQuery, NewCheckpoint},
    event::NewEvent,
  };

  // A store that panics on any access: proves a code path never reaches
  // storage.
  struct UnreachableStore;

  impl AttendanceStore for UnreachableStore {
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
    async fn create_checkpoint(&self, _: uuid::Uuid, _: NewCheckpoint, _: String) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn get_checkpoint(&self, _: uuid::Uuid) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn find_checkpoint_by_code(&self, _: &str) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn list_checkpoints(&self, _: uuid::Uuid, _: bool) -> Result<Vec<Checkpoint>, Self::Error> { unimplemented!() }
    async fn set_checkpoint_active(&self, _: uuid::Uuid, _: bool) -> Result<Option<Checkpoint>, Self::Error> { unimplemented!() }
    async fn insert_attendance(&self, _: NewAttendance) -> Result<InsertOutcome, Self::Error> { unimplemented!() }
    async fn list_attendance(&self, _: &LedgerQuery) -> Result<Vec<LedgerEntry>, Self::Error> { unimplemented!() }
    async fn insert_checkpoint_attendance(&self, _: NewCheckpointAttendance) -> Result<CheckpointInsertOutcome, Self::Error> { unimplemented!() }
    async fn list_checkpoint_attendance(&self, _: &CheckpointQuery) -> Result<Vec<CheckpointEntry>, Self::Error> { unimplemented!() }
  }

  fn recorder() -> Recorder<UnreachableStore> {
    Recorder::new(Arc::new(UnreachableStore), ScanPolicy::default())
  }

  #[tokio::test]
  async fn invalid_format_never_touches_storage() {
    for raw in ["42", "123456", "abcde", "", "0004 2", " 00042 "] {
      let err = recorder()
        .record(ScanRequest {
          scan_token: "EVT123".into(),
          attendee_id: raw.into(),
          ..Default::default()
        })
        .await
        .unwrap_err();
      assert!(matches!(err, ScanError::InvalidFormat(ref r) if r == raw), "{raw:?}");
    }
  }

  #[tokio::test]
  async fn checkpoint_scan_checks_format_first() {
    let err = recorder()
      .record_checkpoint(CheckpointScanRequest {
        code: "CODE".into(),
        attendee_id: "4242".into(),
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert_eq!(err.kind(), "invalid_format");
  }

  #[tokio::test]
  async fn lookup_attendee_rejects_format_before_lookup() {
    let err = recorder().lookup_attendee("42").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_format");
  }

  #[test]
  fn outcome_serialises_with_status_tag() {
    let at = Utc::now();
    let json = serde_json::to_value(RecordOutcome::AlreadyRecorded { recorded_at: at }).unwrap();
    assert_eq!(json["status"], "already_recorded");
  }
}
