//! Scheduled-window checks for scans.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset as _, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// What to do with a scan that arrives outside the event's scheduled window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
  /// Accept without checking the schedule.
  Ignore,
  /// Accept, but flag the record and warn the caller.
  #[default]
  Warn,
  /// Refuse with `EventInactive`.
  Reject,
}

/// The wall clock events are scheduled in.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
  offset: FixedOffset,
}

impl LocalClock {
  /// Build from a UTC offset in minutes. Out-of-range offsets (beyond ±24h)
  /// fall back to UTC.
  pub fn from_offset_minutes(minutes: i32) -> Self {
    let offset = minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .unwrap_or_else(|| Utc.fix());
    Self { offset }
  }

  pub fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&self.offset).naive_local()
  }
}

impl Default for LocalClock {
  fn default() -> Self { Self { offset: Utc.fix() } }
}

/// Whether `local` falls on one of the event's days and within its daily
/// start/end times (both inclusive).
pub fn within_window(event: &Event, local: NaiveDateTime) -> bool {
  let time = local.time();
  event.runs_on(local.date()) && time >= event.start_time && time <= event.end_time
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, NaiveTime, TimeZone};
  use uuid::Uuid;

  use super::*;
  use crate::event::ScanToken;

  fn event(end_date: Option<NaiveDate>) -> Event {
    Event {
      event_id:    Uuid::new_v4(),
      name:        "Workshop".into(),
      description: String::new(),
      date:        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
      end_date,
      start_time:  NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time:    NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
      location:    "Lab".into(),
      scan_token:  ScanToken::from("ABC".to_string()),
      is_active:   true,
      created_at:  Utc::now(),
      created_by:  "admin".into(),
    }
  }

  fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
      .and_hms_opt(h, min, 0)
      .unwrap()
  }

  #[test]
  fn single_day_window() {
    let e = event(None);
    assert!(within_window(&e, at(2026, 5, 4, 9, 0)));
    assert!(within_window(&e, at(2026, 5, 4, 17, 0)));
    assert!(!within_window(&e, at(2026, 5, 4, 8, 59)));
    assert!(!within_window(&e, at(2026, 5, 5, 10, 0)));
  }

  #[test]
  fn multi_day_window() {
    let e = event(NaiveDate::from_ymd_opt(2026, 5, 6));
    assert!(within_window(&e, at(2026, 5, 6, 12, 0)));
    assert!(!within_window(&e, at(2026, 5, 7, 12, 0)));
    assert!(!within_window(&e, at(2026, 5, 3, 12, 0)));
  }

  #[test]
  fn clock_applies_offset() {
    let clock = LocalClock::from_offset_minutes(120);
    let utc = Utc.with_ymd_and_hms(2026, 5, 4, 7, 30, 0).unwrap();
    assert_eq!(clock.local(utc), at(2026, 5, 4, 9, 30));
  }

  #[test]
  fn absurd_offset_falls_back_to_utc() {
    let clock = LocalClock::from_offset_minutes(i32::MAX);
    let utc = Utc.with_ymd_and_hms(2026, 5, 4, 7, 30, 0).unwrap();
    assert_eq!(clock.local(utc), at(2026, 5, 4, 7, 30));
  }
}
