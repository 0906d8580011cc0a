//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so they
//! sort lexically. Calendar dates are `YYYY-MM-DD`, times `HH:MM:SS`. UUIDs are
//! hyphenated lowercase strings.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound as _, Utc};
use muster_core::{
  attendance::{AttendanceRecord, DeviceFootprint, GeoPoint, LedgerEntry},
  attendee::{Attendee, AttendeeId},
  checkpoint::{
    Checkpoint, CheckpointCode, CheckpointEntry, CheckpointKind, CheckpointRecord,
    CheckpointStatus, DaySelector,
  },
  event::{Event, ScanToken},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Current time at the precision the database keeps, so values handed back
/// to callers compare equal to values read later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Calendar date / wall time ───────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M:%S").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Misc ────────────────────────────────────────────────────────────────────

pub fn decode_attendee_id(s: &str) -> Result<AttendeeId> { Ok(AttendeeId::parse(s)?) }

pub fn decode_ip(s: &str) -> Result<IpAddr> {
  s.parse()
    .map_err(|_| Error::Decode(format!("ip address {s:?}")))
}

// ─── Checkpoint enums ────────────────────────────────────────────────────────

pub fn encode_checkpoint_kind(kind: CheckpointKind) -> &'static str {
  match kind {
    CheckpointKind::Entrance => "entrance",
    CheckpointKind::Hourly => "hourly",
    CheckpointKind::Break => "break",
    CheckpointKind::Lunch => "lunch",
    CheckpointKind::Activity => "activity",
    CheckpointKind::Exit => "exit",
    CheckpointKind::Custom => "custom",
  }
}

pub fn decode_checkpoint_kind(s: &str) -> Result<CheckpointKind> {
  match s {
    "entrance" => Ok(CheckpointKind::Entrance),
    "hourly" => Ok(CheckpointKind::Hourly),
    "break" => Ok(CheckpointKind::Break),
    "lunch" => Ok(CheckpointKind::Lunch),
    "activity" => Ok(CheckpointKind::Activity),
    "exit" => Ok(CheckpointKind::Exit),
    "custom" => Ok(CheckpointKind::Custom),
    other => Err(Error::Decode(format!("checkpoint kind {other:?}"))),
  }
}

/// Split a selector into its `applies_to` and `specific_date` columns.
pub fn encode_day_selector(selector: DaySelector) -> (&'static str, Option<String>) {
  match selector {
    DaySelector::AllDays => ("all_days", None),
    DaySelector::SpecificDay { date } => ("specific_day", Some(encode_date(date))),
    DaySelector::Weekdays => ("weekdays", None),
    DaySelector::Weekends => ("weekends", None),
  }
}

pub fn decode_day_selector(applies_to: &str, date: Option<&str>) -> Result<DaySelector> {
  match (applies_to, date) {
    ("all_days", _) => Ok(DaySelector::AllDays),
    ("specific_day", Some(date)) => Ok(DaySelector::SpecificDay { date: decode_date(date)? }),
    ("weekdays", _) => Ok(DaySelector::Weekdays),
    ("weekends", _) => Ok(DaySelector::Weekends),
    (other, _) => Err(Error::Decode(format!("day selector {other:?}"))),
  }
}

pub fn encode_checkpoint_status(status: CheckpointStatus) -> &'static str {
  match status {
    CheckpointStatus::Early => "early",
    CheckpointStatus::OnTime => "on_time",
    CheckpointStatus::Late => "late",
  }
}

pub fn decode_checkpoint_status(s: &str) -> Result<CheckpointStatus> {
  match s {
    "early" => Ok(CheckpointStatus::Early),
    "on_time" => Ok(CheckpointStatus::OnTime),
    "late" => Ok(CheckpointStatus::Late),
    other => Err(Error::Decode(format!("checkpoint status {other:?}"))),
  }
}

fn decode_location(
  latitude: Option<f64>,
  longitude: Option<f64>,
  accuracy: Option<f64>,
  captured_at: Option<&str>,
) -> Result<Option<GeoPoint>> {
  Ok(match (latitude, longitude) {
    (Some(latitude), Some(longitude)) => Some(GeoPoint {
      latitude,
      longitude,
      accuracy,
      captured_at: captured_at.map(decode_dt).transpose()?,
    }),
    _ => None,
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "event_id, name, description, date, end_date, start_time, \
   end_time, location, scan_token, is_active, created_at, created_by";

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub event_id:    String,
  pub name:        String,
  pub description: String,
  pub date:        String,
  pub end_date:    Option<String>,
  pub start_time:  String,
  pub end_time:    String,
  pub location:    String,
  pub scan_token:  String,
  pub is_active:   bool,
  pub created_at:  String,
  pub created_by:  String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      date:        row.get(3)?,
      end_date:    row.get(4)?,
      start_time:  row.get(5)?,
      end_time:    row.get(6)?,
      location:    row.get(7)?,
      scan_token:  row.get(8)?,
      is_active:   row.get(9)?,
      created_at:  row.get(10)?,
      created_by:  row.get(11)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:    decode_uuid(&self.event_id)?,
      name:        self.name,
      description: self.description,
      date:        decode_date(&self.date)?,
      end_date:    self.end_date.as_deref().map(decode_date).transpose()?,
      start_time:  decode_time(&self.start_time)?,
      end_time:    decode_time(&self.end_time)?,
      location:    self.location,
      scan_token:  ScanToken::from(self.scan_token),
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
      created_by:  self.created_by,
    })
  }
}

/// Column list matching [`RawAttendee::from_row`].
pub const ATTENDEE_COLUMNS: &str =
  "attendee_id, first_name, last_name, email, phone, is_active, created_at, created_by";

/// Raw values read directly from an `attendees` row.
pub struct RawAttendee {
  pub attendee_id: String,
  pub first_name:  String,
  pub last_name:   String,
  pub email:       Option<String>,
  pub phone:       Option<String>,
  pub is_active:   bool,
  pub created_at:  String,
  pub created_by:  String,
}

impl RawAttendee {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attendee_id: row.get(0)?,
      first_name:  row.get(1)?,
      last_name:   row.get(2)?,
      email:       row.get(3)?,
      phone:       row.get(4)?,
      is_active:   row.get(5)?,
      created_at:  row.get(6)?,
      created_by:  row.get(7)?,
    })
  }

  pub fn into_attendee(self) -> Result<Attendee> {
    Ok(Attendee {
      attendee_id: decode_attendee_id(&self.attendee_id)?,
      first_name:  self.first_name,
      last_name:   self.last_name,
      email:       self.email,
      phone:       self.phone,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
      created_by:  self.created_by,
    })
  }
}

/// Raw values from an `attendance_records` row joined with its footprint.
pub struct RawLedgerEntry {
  // attendance_records columns
  pub record_id:            String,
  pub event_id:             String,
  pub attendee_id:          String,
  pub session_date:         String,
  pub recorded_at:          String,
  pub ip_address:           Option<String>,
  pub user_agent:           String,
  pub fingerprint_digest:   String,
  pub latitude:             Option<f64>,
  pub longitude:            Option<f64>,
  pub location_accuracy:    Option<f64>,
  pub location_captured_at: Option<String>,
  pub outside_window:       bool,
  // device_footprints join
  pub screen_resolution:    Option<String>,
  pub timezone:             Option<String>,
  pub language:             Option<String>,
  pub platform:             Option<String>,
  pub browser_fingerprint:  Option<String>,
}

impl RawLedgerEntry {
  pub fn into_entry(self) -> Result<LedgerEntry> {
    let location = decode_location(
      self.latitude,
      self.longitude,
      self.location_accuracy,
      self.location_captured_at.as_deref(),
    )?;

    let record = AttendanceRecord {
      record_id: decode_uuid(&self.record_id)?,
      event_id: decode_uuid(&self.event_id)?,
      attendee_id: decode_attendee_id(&self.attendee_id)?,
      session_date: decode_date(&self.session_date)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      ip_address: self.ip_address.as_deref().map(decode_ip).transpose()?,
      user_agent: self.user_agent,
      fingerprint_digest: self.fingerprint_digest,
      location,
      outside_window: self.outside_window,
    };

    let footprint = DeviceFootprint {
      screen_resolution:   self.screen_resolution.unwrap_or_default(),
      timezone:            self.timezone.unwrap_or_default(),
      language:            self.language.unwrap_or_default(),
      platform:            self.platform.unwrap_or_default(),
      browser_fingerprint: self.browser_fingerprint.unwrap_or_default(),
    };

    Ok(LedgerEntry { record, footprint })
  }
}

/// Column list matching [`RawCheckpoint::from_row`].
pub const CHECKPOINT_COLUMNS: &str = "checkpoint_id, event_id, name, description, kind, \
   applies_to, specific_date, required_time, grace_minutes, is_required, position, code, \
   is_active, created_at, created_by";

/// Raw values read directly from a `checkpoints` row.
pub struct RawCheckpoint {
  pub checkpoint_id: String,
  pub event_id:      String,
  pub name:          String,
  pub description:   String,
  pub kind:          String,
  pub applies_to:    String,
  pub specific_date: Option<String>,
  pub required_time: String,
  pub grace_minutes: u32,
  pub is_required:   bool,
  pub position:      u32,
  pub code:          String,
  pub is_active:     bool,
  pub created_at:    String,
  pub created_by:    String,
}

impl RawCheckpoint {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      checkpoint_id: row.get(0)?,
      event_id:      row.get(1)?,
      name:          row.get(2)?,
      description:   row.get(3)?,
      kind:          row.get(4)?,
      applies_to:    row.get(5)?,
      specific_date: row.get(6)?,
      required_time: row.get(7)?,
      grace_minutes: row.get(8)?,
      is_required:   row.get(9)?,
      position:      row.get(10)?,
      code:          row.get(11)?,
      is_active:     row.get(12)?,
      created_at:    row.get(13)?,
      created_by:    row.get(14)?,
    })
  }

  pub fn into_checkpoint(self) -> Result<Checkpoint> {
    Ok(Checkpoint {
      checkpoint_id: decode_uuid(&self.checkpoint_id)?,
      event_id:      decode_uuid(&self.event_id)?,
      name:          self.name,
      description:   self.description,
      kind:          decode_checkpoint_kind(&self.kind)?,
      applies_to:    decode_day_selector(&self.applies_to, self.specific_date.as_deref())?,
      required_time: decode_time(&self.required_time)?,
      grace_minutes: self.grace_minutes,
      is_required:   self.is_required,
      position:      self.position,
      code:          CheckpointCode::from(self.code),
      is_active:     self.is_active,
      created_at:    decode_dt(&self.created_at)?,
      created_by:    self.created_by,
    })
  }
}

/// Raw values from a `checkpoint_records` row joined with its footprint.
pub struct RawCheckpointEntry {
  pub record_id:            String,
  pub checkpoint_id:        String,
  pub event_id:             String,
  pub attendee_id:          String,
  pub session_date:         String,
  pub recorded_at:          String,
  pub status:               String,
  pub ip_address:           Option<String>,
  pub user_agent:           String,
  pub fingerprint_digest:   String,
  pub latitude:             Option<f64>,
  pub longitude:            Option<f64>,
  pub location_accuracy:    Option<f64>,
  pub location_captured_at: Option<String>,
  pub screen_resolution:    Option<String>,
  pub timezone:             Option<String>,
  pub language:             Option<String>,
  pub platform:             Option<String>,
  pub browser_fingerprint:  Option<String>,
}

impl RawCheckpointEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:            row.get(0)?,
      checkpoint_id:        row.get(1)?,
      event_id:             row.get(2)?,
      attendee_id:          row.get(3)?,
      session_date:         row.get(4)?,
      recorded_at:          row.get(5)?,
      status:               row.get(6)?,
      ip_address:           row.get(7)?,
      user_agent:           row.get(8)?,
      fingerprint_digest:   row.get(9)?,
      latitude:             row.get(10)?,
      longitude:            row.get(11)?,
      location_accuracy:    row.get(12)?,
      location_captured_at: row.get(13)?,
      screen_resolution:    row.get(14)?,
      timezone:             row.get(15)?,
      language:             row.get(16)?,
      platform:             row.get(17)?,
      browser_fingerprint:  row.get(18)?,
    })
  }

  pub fn into_entry(self) -> Result<CheckpointEntry> {
    let location = decode_location(
      self.latitude,
      self.longitude,
      self.location_accuracy,
      self.location_captured_at.as_deref(),
    )?;

    let record = CheckpointRecord {
      record_id: decode_uuid(&self.record_id)?,
      checkpoint_id: decode_uuid(&self.checkpoint_id)?,
      event_id: decode_uuid(&self.event_id)?,
      attendee_id: decode_attendee_id(&self.attendee_id)?,
      session_date: decode_date(&self.session_date)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      status: decode_checkpoint_status(&self.status)?,
      ip_address: self.ip_address.as_deref().map(decode_ip).transpose()?,
      user_agent: self.user_agent,
      fingerprint_digest: self.fingerprint_digest,
      location,
    };

    let footprint = DeviceFootprint {
      screen_resolution:   self.screen_resolution.unwrap_or_default(),
      timezone:            self.timezone.unwrap_or_default(),
      language:            self.language.unwrap_or_default(),
      platform:            self.platform.unwrap_or_default(),
      browser_fingerprint: self.browser_fingerprint.unwrap_or_default(),
    };

    Ok(CheckpointEntry { record, footprint })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = DateTime::parse_from_rfc3339("2026-01-01T09:00:00.5Z").unwrap().with_timezone(&Utc);
    let b = DateTime::parse_from_rfc3339("2026-01-01T09:00:00.123456Z").unwrap().with_timezone(&Utc);
    assert!(encode_dt(b) < encode_dt(a));
    assert_eq!(decode_dt(&encode_dt(a)).unwrap(), a);
  }

  #[test]
  fn now_survives_a_round_trip() {
    let t = now();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);
  }

  #[test]
  fn day_selector_columns_decode_back() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    for selector in [
      DaySelector::AllDays,
      DaySelector::SpecificDay { date },
      DaySelector::Weekdays,
      DaySelector::Weekends,
    ] {
      let (applies_to, specific) = encode_day_selector(selector);
      assert_eq!(decode_day_selector(applies_to, specific.as_deref()).unwrap(), selector);
    }
    assert!(decode_day_selector("specific_day", None).is_err());
  }

  #[test]
  fn unknown_status_is_a_decode_error() {
    assert!(matches!(decode_checkpoint_status("tardy"), Err(Error::Decode(_))));
    assert_eq!(encode_checkpoint_status(CheckpointStatus::OnTime), "on_time");
  }
}
