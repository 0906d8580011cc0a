//! Ledger records and the client context captured with them.
//!
//! Everything the attendee's browser sends is untrusted. It is stored for
//! later review and never consulted for authorization decisions.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::attendee::AttendeeId;

// ─── Client-supplied context ─────────────────────────────────────────────────

/// A geolocation fix reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:    f64,
  pub longitude:   f64,
  /// Reported accuracy radius in metres.
  #[serde(default)]
  pub accuracy:    Option<f64>,
  /// When the device captured the fix.
  #[serde(default)]
  pub captured_at: Option<DateTime<Utc>>,
}

impl GeoPoint {
  /// Range-check the coordinates. Returns a human-readable reason on failure.
  pub fn check(&self) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&self.latitude) {
      return Err(format!("latitude {} out of range", self.latitude));
    }
    if !(-180.0..=180.0).contains(&self.longitude) {
      return Err(format!("longitude {} out of range", self.longitude));
    }
    if let Some(acc) = self.accuracy
      && !(acc >= 0.0 && acc.is_finite())
    {
      return Err(format!("accuracy {acc} must be a non-negative number"));
    }
    Ok(())
  }
}

/// Descriptive payload posted by the scan page alongside the attendee ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
  #[serde(default)]
  pub screen:      Option<String>,
  #[serde(default)]
  pub timezone:    Option<String>,
  #[serde(default)]
  pub language:    Option<String>,
  #[serde(default)]
  pub platform:    Option<String>,
  #[serde(default)]
  pub user_agent:  Option<String>,
  /// Freeform browser fingerprint; stored verbatim.
  #[serde(default)]
  pub fingerprint: Option<String>,
  #[serde(default)]
  pub location:    Option<GeoPoint>,
}

/// Transport-level facts about the request, supplied by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
  pub address:    Option<IpAddr>,
  /// The raw `User-Agent` header.
  pub user_agent: Option<String>,
}

// ─── Device footprint ────────────────────────────────────────────────────────

/// Device description stored one-to-one with an attendance record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFootprint {
  pub screen_resolution:   String,
  pub timezone:            String,
  pub language:            String,
  pub platform:            String,
  pub browser_fingerprint: String,
}

impl DeviceFootprint {
  pub fn from_context(ctx: &ClientContext) -> Self {
    let field = |v: &Option<String>| v.as_deref().unwrap_or_default().to_owned();
    Self {
      screen_resolution:   field(&ctx.screen),
      timezone:            field(&ctx.timezone),
      language:            field(&ctx.language),
      platform:            field(&ctx.platform),
      browser_fingerprint: field(&ctx.fingerprint),
    }
  }

  /// SHA-256 hex digest of the fingerprint payload. Lets reports group
  /// records by device without comparing large blobs.
  pub fn digest(&self) -> String {
    hex::encode(Sha256::digest(self.browser_fingerprint.as_bytes()))
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// One row of the attendance ledger. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:          Uuid,
  pub event_id:           Uuid,
  pub attendee_id:        AttendeeId,
  /// The event day this record counts toward. Always the event's `date` for
  /// single-date events.
  pub session_date:       NaiveDate,
  /// Server-assigned timestamp.
  pub recorded_at:        DateTime<Utc>,
  pub ip_address:         Option<IpAddr>,
  pub user_agent:         String,
  pub fingerprint_digest: String,
  pub location:           Option<GeoPoint>,
  /// Accepted outside the event's scheduled window under the warn policy.
  pub outside_window:     bool,
}

/// Input to [`crate::store::AttendanceStore::insert_attendance`].
/// `recorded_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub event_id:       Uuid,
  pub attendee_id:    AttendeeId,
  pub session_date:   NaiveDate,
  pub ip_address:     Option<IpAddr>,
  pub user_agent:     String,
  pub location:       Option<GeoPoint>,
  pub outside_window: bool,
  pub footprint:      DeviceFootprint,
}

/// Result of the atomic ledger insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
  /// A new row (and its footprint) was written.
  Inserted(AttendanceRecord),
  /// A row for this `(event, attendee, session)` already existed; nothing
  /// was written.
  Existing { recorded_at: DateTime<Utc> },
}

/// A ledger row together with its footprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub record:    AttendanceRecord,
  pub footprint: DeviceFootprint,
}

/// Parameters for [`crate::store::AttendanceStore::list_attendance`].
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
  pub event_id:     Option<Uuid>,
  pub attendee_id:  Option<AttendeeId>,
  pub session_date: Option<NaiveDate>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn point(latitude: f64, longitude: f64, accuracy: Option<f64>) -> GeoPoint {
    GeoPoint { latitude, longitude, accuracy, captured_at: None }
  }

  #[test]
  fn geo_point_ranges() {
    assert!(point(45.0, -120.0, Some(12.5)).check().is_ok());
    assert!(point(90.5, 0.0, None).check().is_err());
    assert!(point(0.0, 181.0, None).check().is_err());
    assert!(point(0.0, 0.0, Some(-1.0)).check().is_err());
    assert!(point(f64::NAN, 0.0, None).check().is_err());
  }

  #[test]
  fn footprint_from_partial_context() {
    let ctx = ClientContext {
      screen: Some("1920x1080".into()),
      language: Some("en-GB".into()),
      ..Default::default()
    };
    let fp = DeviceFootprint::from_context(&ctx);
    assert_eq!(fp.screen_resolution, "1920x1080");
    assert_eq!(fp.timezone, "");
    assert_eq!(fp.language, "en-GB");
  }

  #[test]
  fn digest_is_stable_hex() {
    let fp = DeviceFootprint {
      browser_fingerprint: "canvas:abc".into(),
      ..Default::default()
    };
    assert_eq!(fp.digest(), fp.clone().digest());
    assert_eq!(fp.digest().len(), 64);
  }
}
