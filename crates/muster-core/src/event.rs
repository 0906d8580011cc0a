//! Events and their scan tokens.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  token::{SCAN_TOKEN_ALPHABET, SCAN_TOKEN_LEN, random_string},
};

// ─── Scan token ──────────────────────────────────────────────────────────────

/// Opaque token embedded in an event's QR payload.
///
/// Issued once by the store and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanToken(String);

impl ScanToken {
  /// Propose a random token. The store decides whether it is free.
  pub fn generate(rng: &mut impl Rng) -> Self {
    Self(random_string(rng, SCAN_TOKEN_ALPHABET, SCAN_TOKEN_LEN))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for ScanToken {
  fn from(s: String) -> Self { Self(s) }
}

impl fmt::Display for ScanToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A scheduled event attendees can scan into.
///
/// Events are soft-deactivated rather than deleted so existing ledger rows
/// keep a valid reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub event_id:    Uuid,
  pub name:        String,
  pub description: String,
  /// First (or only) day of the event.
  pub date:        NaiveDate,
  /// Last day of a multi-date event; `None` for single-day events.
  pub end_date:    Option<NaiveDate>,
  /// Daily start time, in the configured local offset.
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  pub location:    String,
  pub scan_token:  ScanToken,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
  /// Username of the administrator who created the event.
  pub created_by:  String,
}

impl Event {
  pub fn last_date(&self) -> NaiveDate { self.end_date.unwrap_or(self.date) }

  /// Whether `day` is one of the event's days.
  pub fn runs_on(&self, day: NaiveDate) -> bool {
    day >= self.date && day <= self.last_date()
  }

  /// Every day the event runs, in order.
  pub fn available_dates(&self) -> impl Iterator<Item = NaiveDate> {
    let last = self.last_date();
    self.date.iter_days().take_while(move |d| *d <= last)
  }

  /// The session a scan on local day `day` counts toward.
  ///
  /// A single-date event has one session, so the ledger holds at most one
  /// row per attendee. A multi-date event has one session per day; a scan
  /// before or after the span (accepted under a lenient window policy) counts
  /// toward the nearest day.
  pub fn session_for(&self, day: NaiveDate) -> NaiveDate {
    match self.end_date {
      None => self.date,
      Some(_) => day.max(self.date).min(self.last_date()),
    }
  }
}

/// Input to [`crate::store::AttendanceStore::create_event`]. The scan token
/// and creation metadata are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub date:        NaiveDate,
  #[serde(default)]
  pub end_date:    Option<NaiveDate>,
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  pub location:    String,
}

impl NewEvent {
  /// Trim text fields and check the schedule is coherent.
  pub fn normalized(self) -> Result<Self> {
    let out = Self {
      name: self.name.trim().to_owned(),
      description: self.description.trim().to_owned(),
      location: self.location.trim().to_owned(),
      ..self
    };
    check_event_fields(
      &out.name,
      &out.location,
      out.date,
      out.end_date,
      out.start_time,
      out.end_time,
    )?;
    Ok(out)
  }
}

/// Partial update for an event. The scan token is not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
  pub name:        Option<String>,
  pub description: Option<String>,
  pub date:        Option<NaiveDate>,
  /// `Some(None)` clears the end date; absent leaves it untouched.
  #[serde(default, with = "double_option")]
  pub end_date:    Option<Option<NaiveDate>>,
  pub start_time:  Option<NaiveTime>,
  pub end_time:    Option<NaiveTime>,
  pub location:    Option<String>,
}

impl EventPatch {
  /// Apply the patch to `event` in place and re-validate the result.
  pub fn apply(self, event: &mut Event) -> Result<()> {
    if let Some(v) = self.name {
      event.name = v.trim().to_owned();
    }
    if let Some(v) = self.description {
      event.description = v.trim().to_owned();
    }
    if let Some(v) = self.date {
      event.date = v;
    }
    if let Some(v) = self.end_date {
      event.end_date = v;
    }
    if let Some(v) = self.start_time {
      event.start_time = v;
    }
    if let Some(v) = self.end_time {
      event.end_time = v;
    }
    if let Some(v) = self.location {
      event.location = v.trim().to_owned();
    }
    check_event_fields(
      &event.name,
      &event.location,
      event.date,
      event.end_date,
      event.start_time,
      event.end_time,
    )
  }
}

fn check_event_fields(
  name: &str,
  location: &str,
  date: NaiveDate,
  end_date: Option<NaiveDate>,
  start_time: NaiveTime,
  end_time: NaiveTime,
) -> Result<()> {
  if name.is_empty() {
    return Err(Error::Validation("event name is required".into()));
  }
  if location.is_empty() {
    return Err(Error::Validation("event location is required".into()));
  }
  if end_time <= start_time {
    return Err(Error::Validation("end time must be after start time".into()));
  }
  if end_date.is_some_and(|end| end < date) {
    return Err(Error::Validation(
      "end date must not be before the start date".into(),
    ));
  }
  Ok(())
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
  use serde::{Deserialize, Deserializer};

  pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(de).map(Some)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_event() -> NewEvent {
    NewEvent {
      name:        " Town hall ".into(),
      description: String::new(),
      date:        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
      end_date:    None,
      start_time:  NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time:    NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
      location:    "Main hall".into(),
    }
  }

  #[test]
  fn generated_tokens_are_twelve_chars() {
    let t = ScanToken::generate(&mut rand::thread_rng());
    assert_eq!(t.as_str().len(), 12);
  }

  #[test]
  fn normalized_trims_name() {
    assert_eq!(new_event().normalized().unwrap().name, "Town hall");
  }

  #[test]
  fn rejects_inverted_times_and_dates() {
    let mut e = new_event();
    e.end_time = e.start_time;
    assert!(matches!(e.normalized(), Err(Error::Validation(_))));

    let mut e = new_event();
    e.end_date = NaiveDate::from_ymd_opt(2026, 2, 28);
    assert!(matches!(e.normalized(), Err(Error::Validation(_))));
  }

  fn stored(end_date: Option<NaiveDate>) -> Event {
    let input = new_event();
    Event {
      event_id:    Uuid::new_v4(),
      name:        input.name,
      description: input.description,
      date:        input.date,
      end_date,
      start_time:  input.start_time,
      end_time:    input.end_time,
      location:    input.location,
      scan_token:  ScanToken::from("ABC".to_string()),
      is_active:   true,
      created_at:  Utc::now(),
      created_by:  "admin".into(),
    }
  }

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2026, 3, d).unwrap() }

  #[test]
  fn single_date_event_has_one_session() {
    let e = stored(None);
    assert_eq!(e.available_dates().collect::<Vec<_>>(), vec![day(1)]);
    assert_eq!(e.session_for(day(1)), day(1));
    assert_eq!(e.session_for(day(9)), day(1));
  }

  #[test]
  fn span_event_has_a_session_per_day() {
    let e = stored(Some(day(3)));
    assert_eq!(e.available_dates().collect::<Vec<_>>(), vec![day(1), day(2), day(3)]);
    assert!(e.runs_on(day(2)));
    assert!(!e.runs_on(day(4)));
    assert_eq!(e.session_for(day(2)), day(2));
    assert_eq!(e.session_for(day(7)), day(3));
    assert_eq!(
      e.session_for(NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()),
      day(1)
    );
  }

  #[test]
  fn patch_distinguishes_null_from_absent() {
    let absent: EventPatch = serde_json::from_str("{}").unwrap();
    assert!(absent.end_date.is_none());

    let cleared: EventPatch = serde_json::from_str(r#"{"end_date":null}"#).unwrap();
    assert_eq!(cleared.end_date, Some(None));
  }
}
