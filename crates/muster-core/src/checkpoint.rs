//! Attendance checkpoints: timed check-ins within an event.
//!
//! A checkpoint carries its own code (and so its own QR payload), a required
//! time of day and a grace period either side of it. Early and late scans are
//! still recorded; the ledger row carries a [`CheckpointStatus`] instead.

use std::{fmt, net::IpAddr};

use chrono::{DateTime, Datelike as _, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{DeviceFootprint, GeoPoint},
  attendee::AttendeeId,
  event::Event,
  token::{CHECKPOINT_CODE_LEN, SCAN_TOKEN_ALPHABET, random_string},
};

pub const DEFAULT_GRACE_MINUTES: u32 = 15;
pub const MAX_GRACE_MINUTES: u32 = 12 * 60;

// ─── Code ────────────────────────────────────────────────────────────────────

/// Opaque code embedded in a checkpoint's QR payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointCode(String);

impl CheckpointCode {
  /// Propose a random code. The store decides whether it is free.
  pub fn generate(rng: &mut impl Rng) -> Self {
    Self(random_string(rng, SCAN_TOKEN_ALPHABET, CHECKPOINT_CODE_LEN))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for CheckpointCode {
  fn from(s: String) -> Self { Self(s) }
}

impl fmt::Display for CheckpointCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
  Entrance,
  Hourly,
  Break,
  Lunch,
  Activity,
  Exit,
  #[default]
  Custom,
}

/// Which of the event's days a checkpoint is held on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaySelector {
  #[default]
  AllDays,
  SpecificDay { date: NaiveDate },
  Weekdays,
  Weekends,
}

impl DaySelector {
  pub fn matches(&self, day: NaiveDate) -> bool {
    let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
    match self {
      Self::AllDays => true,
      Self::SpecificDay { date } => *date == day,
      Self::Weekdays => !weekend,
      Self::Weekends => weekend,
    }
  }
}

/// How a check-in compares to the checkpoint's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
  Early,
  OnTime,
  Late,
}

// ─── Checkpoint ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
  pub checkpoint_id: Uuid,
  pub event_id:      Uuid,
  pub name:          String,
  pub description:   String,
  pub kind:          CheckpointKind,
  pub applies_to:    DaySelector,
  /// Local time of day the check-in is due.
  pub required_time: NaiveTime,
  /// Minutes either side of `required_time` that still count as on time.
  pub grace_minutes: u32,
  pub is_required:   bool,
  /// 1-based order within the event; unique per event.
  pub position:      u32,
  pub code:          CheckpointCode,
  pub is_active:     bool,
  pub created_at:    DateTime<Utc>,
  pub created_by:    String,
}

impl Checkpoint {
  /// The inclusive on-time window around the required time on `day`.
  pub fn window_on(&self, day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let required = day.and_time(self.required_time);
    let grace = Duration::minutes(i64::from(self.grace_minutes));
    (required - grace, required + grace)
  }

  pub fn status_at(&self, local: NaiveDateTime) -> CheckpointStatus {
    let (start, end) = self.window_on(local.date());
    if local < start {
      CheckpointStatus::Early
    } else if local > end {
      CheckpointStatus::Late
    } else {
      CheckpointStatus::OnTime
    }
  }

  /// Whether the checkpoint is held on `day` of `event`.
  pub fn held_on(&self, event: &Event, day: NaiveDate) -> bool {
    event.runs_on(day) && self.applies_to.matches(day)
  }
}

fn default_grace() -> u32 { DEFAULT_GRACE_MINUTES }
fn default_true() -> bool { true }
fn default_position() -> u32 { 1 }

/// Input to [`crate::store::AttendanceStore::create_checkpoint`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCheckpoint {
  pub name:          String,
  #[serde(default)]
  pub description:   String,
  #[serde(default)]
  pub kind:          CheckpointKind,
  #[serde(default)]
  pub applies_to:    DaySelector,
  pub required_time: NaiveTime,
  #[serde(default = "default_grace")]
  pub grace_minutes: u32,
  #[serde(default = "default_true")]
  pub is_required:   bool,
  #[serde(default = "default_position")]
  pub position:      u32,
}

impl NewCheckpoint {
  /// Trim text fields and check the checkpoint fits `event`.
  pub fn normalized(self, event: &Event) -> Result<Self> {
    let out = Self {
      name: self.name.trim().to_owned(),
      description: self.description.trim().to_owned(),
      ..self
    };
    if out.name.is_empty() {
      return Err(Error::Validation("checkpoint name is required".into()));
    }
    if out.grace_minutes > MAX_GRACE_MINUTES {
      return Err(Error::Validation(format!(
        "grace period must be at most {MAX_GRACE_MINUTES} minutes"
      )));
    }
    if out.position == 0 {
      return Err(Error::Validation("checkpoint position starts at 1".into()));
    }
    if let DaySelector::SpecificDay { date } = out.applies_to
      && !event.runs_on(date)
    {
      return Err(Error::Validation(format!(
        "{date} is not one of the event's days"
      )));
    }
    Ok(out)
  }
}

// ─── Checkpoint ledger ───────────────────────────────────────────────────────

/// One check-in. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
  pub record_id:          Uuid,
  pub checkpoint_id:      Uuid,
  pub event_id:           Uuid,
  pub attendee_id:        AttendeeId,
  pub session_date:       NaiveDate,
  pub recorded_at:        DateTime<Utc>,
  pub status:             CheckpointStatus,
  pub ip_address:         Option<IpAddr>,
  pub user_agent:         String,
  pub fingerprint_digest: String,
  pub location:           Option<GeoPoint>,
}

/// Input to [`crate::store::AttendanceStore::insert_checkpoint_attendance`].
#[derive(Debug, Clone)]
pub struct NewCheckpointAttendance {
  pub checkpoint_id: Uuid,
  pub event_id:      Uuid,
  pub attendee_id:   AttendeeId,
  pub session_date:  NaiveDate,
  pub status:        CheckpointStatus,
  pub ip_address:    Option<IpAddr>,
  pub user_agent:    String,
  pub location:      Option<GeoPoint>,
  pub footprint:     DeviceFootprint,
}

/// Result of the atomic check-in insert.
#[derive(Debug, Clone)]
pub enum CheckpointInsertOutcome {
  Inserted(CheckpointRecord),
  /// The attendee already checked in here for this session; nothing was
  /// written. Carries the original row's timestamp and status.
  Existing {
    recorded_at: DateTime<Utc>,
    status:      CheckpointStatus,
  },
}

/// A check-in together with its footprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEntry {
  pub record:    CheckpointRecord,
  pub footprint: DeviceFootprint,
}

/// Parameters for [`crate::store::AttendanceStore::list_checkpoint_attendance`].
#[derive(Debug, Clone, Default)]
pub struct CheckpointQuery {
  pub checkpoint_id: Option<Uuid>,
  pub event_id:      Option<Uuid>,
  pub attendee_id:   Option<AttendeeId>,
  pub session_date:  Option<NaiveDate>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::ScanToken;

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2026, 3, d).unwrap() }

  fn at(d: u32, h: u32, m: u32) -> NaiveDateTime { day(d).and_hms_opt(h, m, 0).unwrap() }

  fn event() -> Event {
    Event {
      event_id:    Uuid::new_v4(),
      name:        "Summit".into(),
      description: String::new(),
      date:        day(13),
      end_date:    Some(day(16)),
      start_time:  NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
      end_time:    NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
      location:    "Hall".into(),
      scan_token:  ScanToken::from("ABC".to_string()),
      is_active:   true,
      created_at:  Utc::now(),
      created_by:  "admin".into(),
    }
  }

  fn checkpoint(applies_to: DaySelector) -> Checkpoint {
    Checkpoint {
      checkpoint_id: Uuid::new_v4(),
      event_id:      Uuid::new_v4(),
      name:          "Morning check".into(),
      description:   String::new(),
      kind:          CheckpointKind::Entrance,
      applies_to,
      required_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
      grace_minutes: 15,
      is_required:   true,
      position:      1,
      code:          CheckpointCode::from("CODE".to_string()),
      is_active:     true,
      created_at:    Utc::now(),
      created_by:    "admin".into(),
    }
  }

  fn new_checkpoint() -> NewCheckpoint {
    serde_json::from_str(r#"{"name":" Lunch ","required_time":"12:30:00"}"#).unwrap()
  }

  #[test]
  fn status_boundaries_are_inclusive() {
    let c = checkpoint(DaySelector::AllDays);
    assert_eq!(c.status_at(at(14, 9, 44)), CheckpointStatus::Early);
    assert_eq!(c.status_at(at(14, 9, 45)), CheckpointStatus::OnTime);
    assert_eq!(c.status_at(at(14, 10, 15)), CheckpointStatus::OnTime);
    assert_eq!(c.status_at(at(14, 10, 16)), CheckpointStatus::Late);
  }

  #[test]
  fn day_selectors() {
    // 2026-03-14 is a Saturday, 03-16 a Monday.
    let e = event();
    assert!(checkpoint(DaySelector::Weekends).held_on(&e, day(14)));
    assert!(!checkpoint(DaySelector::Weekends).held_on(&e, day(16)));
    assert!(checkpoint(DaySelector::Weekdays).held_on(&e, day(16)));
    assert!(checkpoint(DaySelector::SpecificDay { date: day(15) }).held_on(&e, day(15)));
    assert!(!checkpoint(DaySelector::SpecificDay { date: day(15) }).held_on(&e, day(14)));
    // outside the event's span
    assert!(!checkpoint(DaySelector::AllDays).held_on(&e, day(17)));
  }

  #[test]
  fn new_checkpoint_defaults_and_trims() {
    let n = new_checkpoint().normalized(&event()).unwrap();
    assert_eq!(n.name, "Lunch");
    assert_eq!(n.grace_minutes, DEFAULT_GRACE_MINUTES);
    assert_eq!(n.applies_to, DaySelector::AllDays);
    assert!(n.is_required);
    assert_eq!(n.position, 1);
  }

  #[test]
  fn new_checkpoint_validation() {
    let e = event();
    let bad = [
      NewCheckpoint { name: "  ".into(), ..new_checkpoint() },
      NewCheckpoint { grace_minutes: MAX_GRACE_MINUTES + 1, ..new_checkpoint() },
      NewCheckpoint { position: 0, ..new_checkpoint() },
      NewCheckpoint { applies_to: DaySelector::SpecificDay { date: day(20) }, ..new_checkpoint() },
    ];
    for input in bad {
      assert!(matches!(input.normalized(&e), Err(Error::Validation(_))));
    }
  }

  #[test]
  fn day_selector_json_shape() {
    let s: DaySelector =
      serde_json::from_str(r#"{"kind":"specific_day","date":"2026-03-15"}"#).unwrap();
    assert_eq!(s, DaySelector::SpecificDay { date: day(15) });
  }

  #[test]
  fn generated_codes_are_sixteen_chars() {
    assert_eq!(CheckpointCode::generate(&mut rand::thread_rng()).as_str().len(), 16);
  }
}
