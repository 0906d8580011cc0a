//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use rand::rngs::OsRng;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use muster_core::{
  attendance::{AttendanceRecord, InsertOutcome, LedgerEntry, LedgerQuery, NewAttendance},
  attendee::{Attendee, AttendeeId, ImportSummary, NewAttendee},
  checkpoint::{
    Checkpoint, CheckpointCode, CheckpointEntry, CheckpointInsertOutcome, CheckpointQuery,
    CheckpointRecord, NewCheckpoint, NewCheckpointAttendance,
  },
  event::{Event, NewEvent, ScanToken},
  store::AttendanceStore,
  token::MAX_GENERATION_ATTEMPTS,
};

use crate::{
  encode::{
    ATTENDEE_COLUMNS, CHECKPOINT_COLUMNS, EVENT_COLUMNS, RawAttendee, RawCheckpoint,
    RawCheckpointEntry, RawEvent, RawLedgerEntry, decode_checkpoint_status, decode_dt,
    encode_checkpoint_kind, encode_checkpoint_status, encode_date, encode_day_selector,
    encode_dt, encode_time, encode_uuid, now,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted, and every
/// clone funnels its statements through the same database thread.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn event_by_id(&self, id: Uuid) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
            rusqlite::params![id_str],
            RawEvent::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn checkpoint_where(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Checkpoint>> {
    let raw: Option<RawCheckpoint> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CHECKPOINT_COLUMNS} FROM checkpoints WHERE {column} = ?1"),
            rusqlite::params![value],
            RawCheckpoint::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCheckpoint::into_checkpoint).transpose()
  }
}

// ─── Identifier allocation ───────────────────────────────────────────────────

/// Result of trying to insert a row under a unique identifier.
enum Claim<T> {
  Claimed(T),
  /// The requested identifier or slot is in use.
  Taken,
  /// Every generated candidate was in use.
  Exhausted,
}

/// Insert an attendee under its requested identifier, or under the first
/// free generated one. Must run on the database thread.
fn insert_attendee(
  conn: &rusqlite::Connection,
  input: &NewAttendee,
  created_at: &str,
  created_by: &str,
) -> rusqlite::Result<Claim<AttendeeId>> {
  let try_insert = |id: &AttendeeId| -> rusqlite::Result<bool> {
    let changed = conn.execute(
      "INSERT INTO attendees (
         attendee_id, first_name, last_name, email, phone,
         is_active, created_at, created_by
       ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
       ON CONFLICT(attendee_id) DO NOTHING",
      rusqlite::params![
        id.as_str(),
        input.first_name,
        input.last_name,
        input.email,
        input.phone,
        created_at,
        created_by,
      ],
    )?;
    Ok(changed == 1)
  };

  if let Some(id) = &input.attendee_id {
    return Ok(if try_insert(id)? {
      Claim::Claimed(id.clone())
    } else {
      Claim::Taken
    });
  }

  for _ in 0..MAX_GENERATION_ATTEMPTS {
    let id = AttendeeId::generate(&mut OsRng);
    if try_insert(&id)? {
      return Ok(Claim::Claimed(id));
    }
  }
  Ok(Claim::Exhausted)
}

fn email_registered(conn: &rusqlite::Connection, email: &str) -> rusqlite::Result<bool> {
  Ok(conn
    .query_row(
      "SELECT 1 FROM attendees WHERE lower(email) = lower(?1) LIMIT 1",
      rusqlite::params![email],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false))
}

fn build_attendee(
  input: NewAttendee,
  attendee_id: AttendeeId,
  created_at: chrono::DateTime<chrono::Utc>,
  created_by: String,
) -> Attendee {
  Attendee {
    attendee_id,
    first_name: input.first_name,
    last_name: input.last_name,
    email: input.email,
    phone: input.phone,
    is_active: true,
    created_at,
    created_by,
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn create_event(&self, input: NewEvent, created_by: String) -> Result<Event> {
    let event_id   = Uuid::new_v4();
    let created_at = now();

    let id_str      = encode_uuid(event_id);
    let at_str      = encode_dt(created_at);
    let date_str    = encode_date(input.date);
    let end_str     = input.end_date.map(encode_date);
    let start_str   = encode_time(input.start_time);
    let finish_str  = encode_time(input.end_time);
    let name        = input.name.clone();
    let description = input.description.clone();
    let location    = input.location.clone();
    let by          = created_by.clone();

    let token: Option<ScanToken> = self
      .conn
      .call(move |conn| {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
          let token = ScanToken::generate(&mut OsRng);
          let changed = conn.execute(
            "INSERT INTO events (
               event_id, name, description, date, end_date, start_time,
               end_time, location, scan_token, is_active, created_at, created_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)
             ON CONFLICT(scan_token) DO NOTHING",
            rusqlite::params![
              id_str,
              name,
              description,
              date_str,
              end_str,
              start_str,
              finish_str,
              location,
              token.as_str(),
              at_str,
              by,
            ],
          )?;
          if changed == 1 {
            return Ok(Some(token));
          }
        }
        Ok(None)
      })
      .await?;

    let Some(scan_token) = token else {
      tracing::warn!("scan token generation exhausted");
      return Err(Error::IdentifierExhausted("scan token"));
    };

    Ok(Event {
      event_id,
      name: input.name,
      description: input.description,
      date: input.date,
      end_date: input.end_date,
      start_time: input.start_time,
      end_time: input.end_time,
      location: input.location,
      scan_token,
      is_active: true,
      created_at,
      created_by,
    })
  }

  async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
    self.event_by_id(id).await
  }

  async fn find_event_by_token(&self, token: &str) -> Result<Option<Event>> {
    let token = token.to_owned();

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE scan_token = ?1"),
            rusqlite::params![token],
            RawEvent::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn list_events(&self, include_inactive: bool) -> Result<Vec<Event>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events
           WHERE ?1 OR is_active = 1
           ORDER BY date DESC, start_time DESC, name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![include_inactive], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn update_event(&self, event: &Event) -> Result<bool> {
    let id_str      = encode_uuid(event.event_id);
    let name        = event.name.clone();
    let description = event.description.clone();
    let date_str    = encode_date(event.date);
    let end_str     = event.end_date.map(encode_date);
    let start_str   = encode_time(event.start_time);
    let finish_str  = encode_time(event.end_time);
    let location    = event.location.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE events
           SET name = ?2, description = ?3, date = ?4, end_date = ?5,
               start_time = ?6, end_time = ?7, location = ?8
           WHERE event_id = ?1",
          rusqlite::params![
            id_str,
            name,
            description,
            date_str,
            end_str,
            start_str,
            finish_str,
            location,
          ],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn set_event_active(&self, id: Uuid, active: bool) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE events SET is_active = ?2 WHERE event_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.event_by_id(id).await
  }

  // ── Attendees ─────────────────────────────────────────────────────────────

  async fn create_attendee(
    &self,
    input: NewAttendee,
    created_by: String,
  ) -> Result<Option<Attendee>> {
    let created_at = now();
    let at_str     = encode_dt(created_at);
    let by         = created_by.clone();
    let row        = input.clone();

    let claim = self
      .conn
      .call(move |conn| Ok(insert_attendee(conn, &row, &at_str, &by)?))
      .await?;

    match claim {
      Claim::Claimed(id) => Ok(Some(build_attendee(input, id, created_at, created_by))),
      Claim::Taken => Ok(None),
      Claim::Exhausted => {
        tracing::warn!("attendee identifier generation exhausted");
        Err(Error::IdentifierExhausted("attendee identifier"))
      }
    }
  }

  async fn find_attendee(&self, id: &AttendeeId) -> Result<Option<Attendee>> {
    let id_str = id.as_str().to_owned();

    let raw: Option<RawAttendee> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE attendee_id = ?1"),
            rusqlite::params![id_str],
            RawAttendee::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAttendee::into_attendee).transpose()
  }

  async fn list_attendees(&self, include_inactive: bool) -> Result<Vec<Attendee>> {
    let raws: Vec<RawAttendee> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ATTENDEE_COLUMNS} FROM attendees
           WHERE ?1 OR is_active = 1
           ORDER BY attendee_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![include_inactive], RawAttendee::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendee::into_attendee).collect()
  }

  async fn update_attendee(&self, attendee: &Attendee) -> Result<bool> {
    let id_str     = attendee.attendee_id.as_str().to_owned();
    let first_name = attendee.first_name.clone();
    let last_name  = attendee.last_name.clone();
    let email      = attendee.email.clone();
    let phone      = attendee.phone.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE attendees
           SET first_name = ?2, last_name = ?3, email = ?4, phone = ?5
           WHERE attendee_id = ?1",
          rusqlite::params![id_str, first_name, last_name, email, phone],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn set_attendee_active(
    &self,
    id: AttendeeId,
    active: bool,
  ) -> Result<Option<Attendee>> {
    let id_str = id.as_str().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE attendees SET is_active = ?2 WHERE attendee_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.find_attendee(&id).await
  }

  async fn import_attendees(
    &self,
    rows: Vec<NewAttendee>,
    created_by: String,
  ) -> Result<ImportSummary> {
    let created_at = now();
    let at_str     = encode_dt(created_at);

    // `None` means generation ran dry; the transaction is rolled back.
    let outcome: Option<ImportSummary> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut summary = ImportSummary::default();

        for row in rows {
          if let Some(email) = &row.email
            && email_registered(&tx, email)?
          {
            summary.skipped += 1;
            continue;
          }
          match insert_attendee(&tx, &row, &at_str, &created_by)? {
            Claim::Claimed(id) => summary.imported.push(build_attendee(
              row,
              id,
              created_at,
              created_by.clone(),
            )),
            Claim::Taken => summary.skipped += 1,
            Claim::Exhausted => return Ok(None),
          }
        }

        tx.commit()?;
        Ok(Some(summary))
      })
      .await?;

    let summary = outcome.ok_or(Error::IdentifierExhausted("attendee identifier"))?;
    tracing::info!(
      imported = summary.imported.len(),
      skipped = summary.skipped,
      "attendee import committed"
    );
    Ok(summary)
  }

  // ── Checkpoints ───────────────────────────────────────────────────────────

  async fn create_checkpoint(
    &self,
    event_id: Uuid,
    input: NewCheckpoint,
    created_by: String,
  ) -> Result<Option<Checkpoint>> {
    let checkpoint_id = Uuid::new_v4();
    let created_at    = now();

    let id_str          = encode_uuid(checkpoint_id);
    let event_str       = encode_uuid(event_id);
    let at_str          = encode_dt(created_at);
    let name            = input.name.clone();
    let description     = input.description.clone();
    let kind            = encode_checkpoint_kind(input.kind);
    let (applies, date) = encode_day_selector(input.applies_to);
    let required_str    = encode_time(input.required_time);
    let grace           = input.grace_minutes;
    let is_required     = input.is_required;
    let position        = input.position;
    let by              = created_by.clone();

    // The position check and the code loop share one IMMEDIATE transaction,
    // so a concurrent create cannot slip into the same position.
    let claim: Claim<CheckpointCode> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken = tx
          .query_row(
            "SELECT 1 FROM checkpoints WHERE event_id = ?1 AND position = ?2",
            rusqlite::params![event_str, position],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Claim::Taken);
        }

        for _ in 0..MAX_GENERATION_ATTEMPTS {
          let code = CheckpointCode::generate(&mut OsRng);
          let changed = tx.execute(
            "INSERT INTO checkpoints (
               checkpoint_id, event_id, name, description, kind, applies_to,
               specific_date, required_time, grace_minutes, is_required,
               position, code, is_active, created_at, created_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13, ?14)
             ON CONFLICT(code) DO NOTHING",
            rusqlite::params![
              id_str,
              event_str,
              name,
              description,
              kind,
              applies,
              date,
              required_str,
              grace,
              is_required,
              position,
              code.as_str(),
              at_str,
              by,
            ],
          )?;
          if changed == 1 {
            tx.commit()?;
            return Ok(Claim::Claimed(code));
          }
        }
        Ok(Claim::Exhausted)
      })
      .await?;

    let code = match claim {
      Claim::Claimed(code) => code,
      Claim::Taken => return Ok(None),
      Claim::Exhausted => {
        tracing::warn!("checkpoint code generation exhausted");
        return Err(Error::IdentifierExhausted("checkpoint code"));
      }
    };

    Ok(Some(Checkpoint {
      checkpoint_id,
      event_id,
      name: input.name,
      description: input.description,
      kind: input.kind,
      applies_to: input.applies_to,
      required_time: input.required_time,
      grace_minutes: input.grace_minutes,
      is_required: input.is_required,
      position: input.position,
      code,
      is_active: true,
      created_at,
      created_by,
    }))
  }

  async fn get_checkpoint(&self, id: Uuid) -> Result<Option<Checkpoint>> {
    self.checkpoint_where("checkpoint_id", encode_uuid(id)).await
  }

  async fn find_checkpoint_by_code(&self, code: &str) -> Result<Option<Checkpoint>> {
    self.checkpoint_where("code", code.to_owned()).await
  }

  async fn list_checkpoints(
    &self,
    event_id: Uuid,
    include_inactive: bool,
  ) -> Result<Vec<Checkpoint>> {
    let event_str = encode_uuid(event_id);

    let raws: Vec<RawCheckpoint> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHECKPOINT_COLUMNS} FROM checkpoints
           WHERE event_id = ?1 AND (?2 OR is_active = 1)
           ORDER BY position"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![event_str, include_inactive], RawCheckpoint::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCheckpoint::into_checkpoint).collect()
  }

  async fn set_checkpoint_active(&self, id: Uuid, active: bool) -> Result<Option<Checkpoint>> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE checkpoints SET is_active = ?2 WHERE checkpoint_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_checkpoint(id).await
  }

  // ── Ledgers ───────────────────────────────────────────────────────────────────

  async fn insert_attendance(&self, input: NewAttendance) -> Result<InsertOutcome> {
    let record = AttendanceRecord {
      record_id:          Uuid::new_v4(),
      event_id:           input.event_id,
      attendee_id:        input.attendee_id,
      session_date:       input.session_date,
      recorded_at:        now(),
      ip_address:         input.ip_address,
      user_agent:         input.user_agent,
      fingerprint_digest: input.footprint.digest(),
      location:           input.location,
      outside_window:     input.outside_window,
    };
    let footprint = input.footprint;

    let record_id_str   = encode_uuid(record.record_id);
    let event_id_str    = encode_uuid(record.event_id);
    let attendee_id_str = record.attendee_id.as_str().to_owned();
    let session_str     = encode_date(record.session_date);
    let at_str          = encode_dt(record.recorded_at);
    let ip_str          = record.ip_address.map(|ip| ip.to_string());
    let user_agent      = record.user_agent.clone();
    let digest          = record.fingerprint_digest.clone();
    let latitude        = record.location.map(|p| p.latitude);
    let longitude       = record.location.map(|p| p.longitude);
    let accuracy        = record.location.and_then(|p| p.accuracy);
    let captured_at     = record.location.and_then(|p| p.captured_at).map(encode_dt);
    let outside_window  = record.outside_window;

    // The conflict guard and the footprint write share one transaction: either
    // both rows land, or neither does and the original timestamp is returned.
    let existing: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
          "INSERT INTO attendance_records (
             record_id, event_id, attendee_id, session_date, recorded_at,
             ip_address, user_agent, fingerprint_digest, latitude, longitude,
             location_accuracy, location_captured_at, outside_window
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT(event_id, attendee_id, session_date) DO NOTHING",
          rusqlite::params![
            record_id_str,
            event_id_str,
            attendee_id_str,
            session_str,
            at_str,
            ip_str,
            user_agent,
            digest,
            latitude,
            longitude,
            accuracy,
            captured_at,
            outside_window,
          ],
        )?;

        if inserted == 0 {
          let recorded_at: String = tx.query_row(
            "SELECT recorded_at FROM attendance_records
             WHERE event_id = ?1 AND attendee_id = ?2 AND session_date = ?3",
            rusqlite::params![event_id_str, attendee_id_str, session_str],
            |r| r.get(0),
          )?;
          return Ok(Some(recorded_at));
        }

        tx.execute(
          "INSERT INTO device_footprints (
             record_id, screen_resolution, timezone, language, platform,
             browser_fingerprint
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            record_id_str,
            footprint.screen_resolution,
            footprint.timezone,
            footprint.language,
            footprint.platform,
            footprint.browser_fingerprint,
          ],
        )?;

        tx.commit()?;
        Ok(None)
      })
      .await?;

    match existing {
      Some(at) => Ok(InsertOutcome::Existing { recorded_at: decode_dt(&at)? }),
      None => Ok(InsertOutcome::Inserted(record)),
    }
  }

  async fn list_attendance(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>> {
    let event_str    = query.event_id.map(encode_uuid);
    let attendee_str = query.attendee_id.as_ref().map(|id| id.as_str().to_owned());
    let session_str  = query.session_date.map(encode_date);
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val    = query.limit.map_or(-1, |l| l as i64);
    let offset_val   = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawLedgerEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             r.record_id, r.event_id, r.attendee_id, r.session_date,
             r.recorded_at, r.ip_address, r.user_agent, r.fingerprint_digest,
             r.latitude, r.longitude, r.location_accuracy,
             r.location_captured_at, r.outside_window,
             d.screen_resolution, d.timezone, d.language, d.platform,
             d.browser_fingerprint
           FROM attendance_records r
           LEFT JOIN device_footprints d ON d.record_id = r.record_id
           WHERE (?1 IS NULL OR r.event_id = ?1)
             AND (?2 IS NULL OR r.attendee_id = ?2)
             AND (?3 IS NULL OR r.session_date = ?3)
           ORDER BY r.recorded_at DESC, r.record_id
           LIMIT ?4 OFFSET ?5",
        )?;

        let rows = stmt
          .query_map(
            rusqlite::params![event_str, attendee_str, session_str, limit_val, offset_val],
            |row| {
              Ok(RawLedgerEntry {
                record_id:            row.get(0)?,
                event_id:             row.get(1)?,
                attendee_id:          row.get(2)?,
                session_date:         row.get(3)?,
                recorded_at:          row.get(4)?,
                ip_address:           row.get(5)?,
                user_agent:           row.get(6)?,
                fingerprint_digest:   row.get(7)?,
                latitude:             row.get(8)?,
                longitude:            row.get(9)?,
                location_accuracy:    row.get(10)?,
                location_captured_at: row.get(11)?,
                outside_window:       row.get(12)?,
                screen_resolution:    row.get(13)?,
                timezone:             row.get(14)?,
                language:             row.get(15)?,
                platform:             row.get(16)?,
                browser_fingerprint:  row.get(17)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLedgerEntry::into_entry).collect()
  }

  async fn insert_checkpoint_attendance(
    &self,
    input: NewCheckpointAttendance,
  ) -> Result<CheckpointInsertOutcome> {
    let record = CheckpointRecord {
      record_id:          Uuid::new_v4(),
      checkpoint_id:      input.checkpoint_id,
      event_id:           input.event_id,
      attendee_id:        input.attendee_id,
      session_date:       input.session_date,
      recorded_at:        now(),
      status:             input.status,
      ip_address:         input.ip_address,
      user_agent:         input.user_agent,
      fingerprint_digest: input.footprint.digest(),
      location:           input.location,
    };
    let footprint = input.footprint;

    let record_id_str     = encode_uuid(record.record_id);
    let checkpoint_id_str = encode_uuid(record.checkpoint_id);
    let event_id_str      = encode_uuid(record.event_id);
    let attendee_id_str   = record.attendee_id.as_str().to_owned();
    let session_str       = encode_date(record.session_date);
    let at_str            = encode_dt(record.recorded_at);
    let status            = encode_checkpoint_status(record.status);
    let ip_str            = record.ip_address.map(|ip| ip.to_string());
    let user_agent        = record.user_agent.clone();
    let digest            = record.fingerprint_digest.clone();
    let latitude          = record.location.map(|p| p.latitude);
    let longitude         = record.location.map(|p| p.longitude);
    let accuracy          = record.location.and_then(|p| p.accuracy);
    let captured_at       = record.location.and_then(|p| p.captured_at).map(encode_dt);

    let existing: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
          "INSERT INTO checkpoint_records (
             record_id, checkpoint_id, event_id, attendee_id, session_date,
             recorded_at, status, ip_address, user_agent, fingerprint_digest,
             latitude, longitude, location_accuracy, location_captured_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT(checkpoint_id, attendee_id, session_date) DO NOTHING",
          rusqlite::params![
            record_id_str,
            checkpoint_id_str,
            event_id_str,
            attendee_id_str,
            session_str,
            at_str,
            status,
            ip_str,
            user_agent,
            digest,
            latitude,
            longitude,
            accuracy,
            captured_at,
          ],
        )?;

        if inserted == 0 {
          let original = tx.query_row(
            "SELECT recorded_at, status FROM checkpoint_records
             WHERE checkpoint_id = ?1 AND attendee_id = ?2 AND session_date = ?3",
            rusqlite::params![checkpoint_id_str, attendee_id_str, session_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )?;
          return Ok(Some(original));
        }

        tx.execute(
          "INSERT INTO checkpoint_footprints (
             record_id, screen_resolution, timezone, language, platform,
             browser_fingerprint
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            record_id_str,
            footprint.screen_resolution,
            footprint.timezone,
            footprint.language,
            footprint.platform,
            footprint.browser_fingerprint,
          ],
        )?;

        tx.commit()?;
        Ok(None)
      })
      .await?;

    match existing {
      Some((at, status)) => Ok(CheckpointInsertOutcome::Existing {
        recorded_at: decode_dt(&at)?,
        status:      decode_checkpoint_status(&status)?,
      }),
      None => Ok(CheckpointInsertOutcome::Inserted(record)),
    }
  }

  async fn list_checkpoint_attendance(
    &self,
    query: &CheckpointQuery,
  ) -> Result<Vec<CheckpointEntry>> {
    let checkpoint_str = query.checkpoint_id.map(encode_uuid);
    let event_str      = query.event_id.map(encode_uuid);
    let attendee_str   = query.attendee_id.as_ref().map(|id| id.as_str().to_owned());
    let session_str    = query.session_date.map(encode_date);
    let limit_val      = query.limit.map_or(-1, |l| l as i64);
    let offset_val     = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawCheckpointEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             r.record_id, r.checkpoint_id, r.event_id, r.attendee_id,
             r.session_date, r.recorded_at, r.status, r.ip_address,
             r.user_agent, r.fingerprint_digest, r.latitude, r.longitude,
             r.location_accuracy, r.location_captured_at,
             d.screen_resolution, d.timezone, d.language, d.platform,
             d.browser_fingerprint
           FROM checkpoint_records r
           LEFT JOIN checkpoint_footprints d ON d.record_id = r.record_id
           WHERE (?1 IS NULL OR r.checkpoint_id = ?1)
             AND (?2 IS NULL OR r.event_id = ?2)
             AND (?3 IS NULL OR r.attendee_id = ?3)
             AND (?4 IS NULL OR r.session_date = ?4)
           ORDER BY r.recorded_at DESC, r.record_id
           LIMIT ?5 OFFSET ?6",
        )?;

        let rows = stmt
          .query_map(
            rusqlite::params![
              checkpoint_str,
              event_str,
              attendee_str,
              session_str,
              limit_val,
              offset_val
            ],
            RawCheckpointEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCheckpointEntry::into_entry).collect()
  }
}
