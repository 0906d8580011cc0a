//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Events are deactivated, never deleted.
CREATE TABLE IF NOT EXISTS events (
    event_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    date        TEXT NOT NULL,          -- YYYY-MM-DD
    end_date    TEXT,                   -- YYYY-MM-DD or NULL
    start_time  TEXT NOT NULL,          -- HH:MM:SS
    end_time    TEXT NOT NULL,          -- HH:MM:SS
    location    TEXT NOT NULL,
    scan_token  TEXT NOT NULL UNIQUE,   -- issued once, never updated
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,          -- RFC 3339 UTC
    created_by  TEXT NOT NULL
);

-- Attendees are deactivated, never deleted.
CREATE TABLE IF NOT EXISTS attendees (
    attendee_id TEXT PRIMARY KEY
                CHECK (length(attendee_id) = 5 AND attendee_id NOT GLOB '*[^0-9]*'),
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT,
    phone       TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    created_by  TEXT NOT NULL
);

-- The ledger. No UPDATE is ever issued against this table. A multi-day
-- event has one session per calendar day.
CREATE TABLE IF NOT EXISTS attendance_records (
    record_id            TEXT PRIMARY KEY,
    event_id             TEXT NOT NULL REFERENCES events(event_id),
    attendee_id          TEXT NOT NULL REFERENCES attendees(attendee_id),
    session_date         TEXT NOT NULL,   -- YYYY-MM-DD
    recorded_at          TEXT NOT NULL,   -- RFC 3339 UTC, microsecond precision
    ip_address           TEXT,
    user_agent           TEXT NOT NULL DEFAULT '',
    fingerprint_digest   TEXT NOT NULL,
    latitude             REAL,
    longitude            REAL,
    location_accuracy    REAL,
    location_captured_at TEXT,
    outside_window       INTEGER NOT NULL DEFAULT 0,
    UNIQUE (event_id, attendee_id, session_date)
);

-- One footprint per record, removed with it.
CREATE TABLE IF NOT EXISTS device_footprints (
    record_id           TEXT PRIMARY KEY
                        REFERENCES attendance_records(record_id) ON DELETE CASCADE,
    screen_resolution   TEXT NOT NULL DEFAULT '',
    timezone            TEXT NOT NULL DEFAULT '',
    language            TEXT NOT NULL DEFAULT '',
    platform            TEXT NOT NULL DEFAULT '',
    browser_fingerprint TEXT NOT NULL DEFAULT ''
);

-- Timed check-ins within an event. Deactivated, never deleted.
CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id TEXT PRIMARY KEY,
    event_id      TEXT NOT NULL REFERENCES events(event_id),
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    kind          TEXT NOT NULL,
    applies_to    TEXT NOT NULL
                  CHECK (applies_to IN ('all_days', 'specific_day', 'weekdays', 'weekends')),
    specific_date TEXT,                   -- set only for 'specific_day'
    required_time TEXT NOT NULL,          -- HH:MM:SS
    grace_minutes INTEGER NOT NULL DEFAULT 15,
    is_required   INTEGER NOT NULL DEFAULT 1,
    position      INTEGER NOT NULL,
    code          TEXT NOT NULL UNIQUE,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    created_by    TEXT NOT NULL,
    UNIQUE (event_id, position)
);

-- The checkpoint ledger: one row per (checkpoint, attendee, day).
CREATE TABLE IF NOT EXISTS checkpoint_records (
    record_id            TEXT PRIMARY KEY,
    checkpoint_id        TEXT NOT NULL REFERENCES checkpoints(checkpoint_id),
    event_id             TEXT NOT NULL REFERENCES events(event_id),
    attendee_id          TEXT NOT NULL REFERENCES attendees(attendee_id),
    session_date         TEXT NOT NULL,
    recorded_at          TEXT NOT NULL,
    status               TEXT NOT NULL CHECK (status IN ('early', 'on_time', 'late')),
    ip_address           TEXT,
    user_agent           TEXT NOT NULL DEFAULT '',
    fingerprint_digest   TEXT NOT NULL,
    latitude             REAL,
    longitude            REAL,
    location_accuracy    REAL,
    location_captured_at TEXT,
    UNIQUE (checkpoint_id, attendee_id, session_date)
);

CREATE TABLE IF NOT EXISTS checkpoint_footprints (
    record_id           TEXT PRIMARY KEY
                        REFERENCES checkpoint_records(record_id) ON DELETE CASCADE,
    screen_resolution   TEXT NOT NULL DEFAULT '',
    timezone            TEXT NOT NULL DEFAULT '',
    language            TEXT NOT NULL DEFAULT '',
    platform            TEXT NOT NULL DEFAULT '',
    browser_fingerprint TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS events_date_idx        ON events(date, is_active);
CREATE INDEX IF NOT EXISTS attendees_email_idx    ON attendees(email);
CREATE INDEX IF NOT EXISTS attendance_recorded_idx ON attendance_records(recorded_at);
CREATE INDEX IF NOT EXISTS attendance_attendee_idx ON attendance_records(attendee_id);
CREATE INDEX IF NOT EXISTS checkpoints_event_idx   ON checkpoints(event_id, position);
CREATE INDEX IF NOT EXISTS checkpoint_recorded_idx ON checkpoint_records(recorded_at);

PRAGMA user_version = 2;
";
