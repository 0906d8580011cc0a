//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `muster-store-sqlite`).
//! Higher layers ([`crate::recorder`], [`crate::directory`], `muster-api`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attendance::{InsertOutcome, LedgerEntry, LedgerQuery, NewAttendance},
  attendee::{Attendee, AttendeeId, ImportSummary, NewAttendee},
  checkpoint::{
    Checkpoint, CheckpointEntry, CheckpointInsertOutcome, CheckpointQuery, NewCheckpoint,
    NewCheckpointAttendance,
  },
  event::{Event, NewEvent},
};

/// Abstraction over a Muster storage backend.
///
/// Directory writes (events, attendees, checkpoints) come only from
/// administrators. The ledgers are written exclusively through
/// [`AttendanceStore::insert_attendance`] and
/// [`AttendanceStore::insert_checkpoint_attendance`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Events ────────────────────────────────────────────────────────────

  /// Persist a new event, issuing it a fresh unique scan token.
  fn create_event(
    &self,
    input: NewEvent,
    created_by: String,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Resolve a scan token. Inactive events are returned too; the caller
  /// decides how to treat them.
  fn find_event_by_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + 'a;

  /// List events, most recent date first.
  fn list_events(
    &self,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Overwrite the editable columns of an event. The scan token, active flag
  /// and creation metadata are never touched. Returns `false` if the event
  /// does not exist.
  fn update_event<'a>(
    &'a self,
    event: &'a Event,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Set the active flag. Returns the updated event, or `None` if absent.
  fn set_event_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  // ── Attendees ─────────────────────────────────────────────────────────

  /// Persist a new attendee. Generates an identifier when the input carries
  /// none. Returns `None` if an explicit identifier is already taken.
  fn create_attendee(
    &self,
    input: NewAttendee,
    created_by: String,
  ) -> impl Future<Output = Result<Option<Attendee>, Self::Error>> + Send + '_;

  fn find_attendee<'a>(
    &'a self,
    id: &'a AttendeeId,
  ) -> impl Future<Output = Result<Option<Attendee>, Self::Error>> + Send + 'a;

  /// List attendees ordered by identifier.
  fn list_attendees(
    &self,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Attendee>, Self::Error>> + Send + '_;

  /// Overwrite names and contact details. Returns `false` if absent.
  fn update_attendee<'a>(
    &'a self,
    attendee: &'a Attendee,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn set_attendee_active(
    &self,
    id: AttendeeId,
    active: bool,
  ) -> impl Future<Output = Result<Option<Attendee>, Self::Error>> + Send + '_;

  /// Create many attendees in one transaction. Rows whose email or explicit
  /// identifier is already registered are skipped, not failed.
  fn import_attendees(
    &self,
    rows: Vec<NewAttendee>,
    created_by: String,
  ) -> impl Future<Output = Result<ImportSummary, Self::Error>> + Send + '_;

  // ── Checkpoints ───────────────────────────────────────────────────────

  /// Persist a checkpoint for `event_id`, issuing it a fresh unique code.
  /// Returns `None` if the event already has a checkpoint at that position.
  fn create_checkpoint(
    &self,
    event_id: Uuid,
    input: NewCheckpoint,
    created_by: String,
  ) -> impl Future<Output = Result<Option<Checkpoint>, Self::Error>> + Send + '_;

  fn get_checkpoint(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Checkpoint>, Self::Error>> + Send + '_;

  /// Resolve a checkpoint code. Inactive checkpoints are returned too.
  fn find_checkpoint_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Checkpoint>, Self::Error>> + Send + 'a;

  /// List an event's checkpoints by position.
  fn list_checkpoints(
    &self,
    event_id: Uuid,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Checkpoint>, Self::Error>> + Send + '_;

  fn set_checkpoint_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Option<Checkpoint>, Self::Error>> + Send + '_;

  // ── Ledgers ───────────────────────────────────────────────────────────

  /// Atomically insert a record and its footprint, unless a record for the
  /// same `(event, attendee, session_date)` exists.
  ///
  /// The existence check and the insert must be one storage-level operation:
  /// concurrent calls for the same key yield exactly one
  /// [`InsertOutcome::Inserted`]. A storage fault is an `Err`, never
  /// [`InsertOutcome::Existing`].
  fn insert_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Read ledger rows, newest first.
  fn list_attendance<'a>(
    &'a self,
    query: &'a LedgerQuery,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + 'a;

  /// The checkpoint counterpart of
  /// [`AttendanceStore::insert_attendance`], keyed by
  /// `(checkpoint, attendee, session_date)`.
  fn insert_checkpoint_attendance(
    &self,
    input: NewCheckpointAttendance,
  ) -> impl Future<Output = Result<CheckpointInsertOutcome, Self::Error>> + Send + '_;

  /// Read check-ins, newest first.
  fn list_checkpoint_attendance<'a>(
    &'a self,
    query: &'a CheckpointQuery,
  ) -> impl Future<Output = Result<Vec<CheckpointEntry>, Self::Error>> + Send + 'a;
}
