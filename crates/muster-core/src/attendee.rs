//! Attendees and the fixed-width attendee identifier.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, token::random_string};

/// Number of digits in an attendee identifier.
pub const ATTENDEE_ID_WIDTH: usize = 5;

// ─── Identifier ──────────────────────────────────────────────────────────────

/// A syntactically valid attendee identifier: exactly five ASCII digits.
///
/// Leading zeros are significant (`"00042"` and `"42"` are different inputs,
/// and only the former is valid), so the value is kept as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttendeeId(String);

impl AttendeeId {
  /// Validate `raw` and wrap it. The input must be exactly the digits, with
  /// no surrounding whitespace.
  ///
  /// This is the only check performed before a directory lookup, and it never
  /// touches storage.
  pub fn parse(raw: &str) -> Result<Self> {
    if raw.len() == ATTENDEE_ID_WIDTH && raw.bytes().all(|b| b.is_ascii_digit()) {
      Ok(Self(raw.to_owned()))
    } else {
      Err(Error::InvalidFormat(raw.to_owned()))
    }
  }

  /// Propose a random identifier. The store decides whether it is free.
  pub fn generate(rng: &mut impl Rng) -> Self {
    Self(random_string(rng, b"0123456789", ATTENDEE_ID_WIDTH))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for AttendeeId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<AttendeeId> for String {
  fn from(id: AttendeeId) -> Self { id.0 }
}

impl fmt::Display for AttendeeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Attendee ────────────────────────────────────────────────────────────────

/// A registered person. Attendees are deactivated, never deleted, so ledger
/// rows always resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
  pub attendee_id: AttendeeId,
  pub first_name:  String,
  pub last_name:   String,
  pub email:       Option<String>,
  pub phone:       Option<String>,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
  /// Username of the administrator who registered the attendee.
  pub created_by:  String,
}

impl Attendee {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Input to [`crate::store::AttendanceStore::create_attendee`].
///
/// When `attendee_id` is `None` the store generates one.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendee {
  #[serde(default)]
  pub attendee_id: Option<AttendeeId>,
  pub first_name:  String,
  pub last_name:   String,
  #[serde(default)]
  pub email:       Option<String>,
  #[serde(default)]
  pub phone:       Option<String>,
}

impl NewAttendee {
  pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
    Self {
      attendee_id: None,
      first_name:  first_name.into(),
      last_name:   last_name.into(),
      email:       None,
      phone:       None,
    }
  }

  /// Trim every field and drop empty optionals, then check required names.
  pub fn normalized(self) -> Result<Self> {
    let out = Self {
      attendee_id: self.attendee_id,
      first_name:  self.first_name.trim().to_owned(),
      last_name:   self.last_name.trim().to_owned(),
      email:       non_empty(self.email),
      phone:       non_empty(self.phone),
    };
    if out.first_name.is_empty() || out.last_name.is_empty() {
      return Err(Error::Validation(
        "first and last name are required".into(),
      ));
    }
    Ok(out)
  }
}

/// Partial update for an attendee. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendeePatch {
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
}

impl AttendeePatch {
  /// Apply the patch to `attendee` in place and re-validate names.
  pub fn apply(self, attendee: &mut Attendee) -> Result<()> {
    if let Some(v) = self.first_name {
      attendee.first_name = v.trim().to_owned();
    }
    if let Some(v) = self.last_name {
      attendee.last_name = v.trim().to_owned();
    }
    if let Some(v) = self.email {
      attendee.email = non_empty(Some(v));
    }
    if let Some(v) = self.phone {
      attendee.phone = non_empty(Some(v));
    }
    if attendee.first_name.is_empty() || attendee.last_name.is_empty() {
      return Err(Error::Validation(
        "first and last name are required".into(),
      ));
    }
    Ok(())
  }
}

/// Result of a bulk import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
  /// Attendees that were created, in input order.
  pub imported: Vec<Attendee>,
  /// Rows skipped because their email or explicit ID was already registered.
  pub skipped:  usize,
}

fn non_empty(v: Option<String>) -> Option<String> {
  v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_accepts_five_digits() {
    assert_eq!(AttendeeId::parse("00042").unwrap().as_str(), "00042");
    assert_eq!(AttendeeId::parse("99999").unwrap().as_str(), "99999");
  }

  #[test]
  fn parse_rejects_padding() {
    for raw in [" 00042", "00042 ", "  12345\n", "\t00042"] {
      assert!(
        matches!(AttendeeId::parse(raw), Err(Error::InvalidFormat(ref r)) if r == raw),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn parse_rejects_wrong_width_and_non_digits() {
    for raw in ["42", "000042", "", "0004a", "12 45", "１２３４５", "-1234"] {
      assert!(
        matches!(AttendeeId::parse(raw), Err(Error::InvalidFormat(_))),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn deserialize_validates() {
    let ok: AttendeeId = serde_json::from_str("\"00007\"").unwrap();
    assert_eq!(ok.as_str(), "00007");
    assert!(serde_json::from_str::<AttendeeId>("\"7\"").is_err());
  }

  #[test]
  fn normalized_trims_and_drops_empty_optionals() {
    let mut input = NewAttendee::new("  Ada ", "Lovelace");
    input.email = Some("   ".into());
    input.phone = Some(" 555 ".into());
    let n = input.normalized().unwrap();
    assert_eq!(n.first_name, "Ada");
    assert_eq!(n.email, None);
    assert_eq!(n.phone.as_deref(), Some("555"));

    assert!(NewAttendee::new("", "x").normalized().is_err());
  }
}
