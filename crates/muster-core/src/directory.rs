//! Permission-gated access to the event registry and attendee directory.
//!
//! Every write goes through [`Directory`], which checks the acting user's
//! [`Role`] before touching the store. How the actor was authenticated is the
//! caller's business.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  attendance::{LedgerEntry, LedgerQuery},
  attendee::{Attendee, AttendeeId, AttendeePatch, ImportSummary, NewAttendee},
  checkpoint::{Checkpoint, CheckpointEntry, CheckpointQuery, NewCheckpoint},
  error::DirectoryError,
  event::{Event, EventPatch, NewEvent},
  store::AttendanceStore,
};

/// What an authenticated user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Read and write the directory.
  Admin,
  /// Read the directory and the ledger.
  Viewer,
}

/// An authenticated user acting on the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
  pub username: String,
  pub role:     Role,
}

impl Actor {
  pub fn can_manage(&self) -> bool { self.role == Role::Admin }

  fn require_manage<E>(&self, action: &'static str) -> Result<(), DirectoryError<E>>
  where
    E: std::error::Error + 'static,
  {
    if self.can_manage() {
      Ok(())
    } else {
      Err(DirectoryError::PermissionDenied {
        actor: self.username.clone(),
        action,
      })
    }
  }
}

type DirResult<T, S> = Result<T, DirectoryError<<S as AttendanceStore>::Error>>;

/// Administrative front door to a store.
pub struct Directory<S> {
  store: Arc<S>,
}

impl<S> Clone for Directory<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: AttendanceStore> Directory<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  // ── Events ────────────────────────────────────────────────────────────

  pub async fn create_event(&self, actor: &Actor, input: NewEvent) -> DirResult<Event, S> {
    actor.require_manage("create events")?;
    let input = input.normalized()?;
    self
      .store
      .create_event(input, actor.username.clone())
      .await
      .map_err(DirectoryError::Store)
  }

  pub async fn update_event(
    &self,
    actor: &Actor,
    id: Uuid,
    patch: EventPatch,
  ) -> DirResult<Event, S> {
    actor.require_manage("edit events")?;
    let mut event = self.get_event(id).await?;
    patch.apply(&mut event)?;
    let found = self
      .store
      .update_event(&event)
      .await
      .map_err(DirectoryError::Store)?;
    if !found {
      return Err(DirectoryError::NotFound(format!("event {id}")));
    }
    Ok(event)
  }

  pub async fn set_event_active(
    &self,
    actor: &Actor,
    id: Uuid,
    active: bool,
  ) -> DirResult<Event, S> {
    actor.require_manage(if active { "activate events" } else { "deactivate events" })?;
    self
      .store
      .set_event_active(id, active)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| DirectoryError::NotFound(format!("event {id}")))
  }

  pub async fn get_event(&self, id: Uuid) -> DirResult<Event, S> {
    self
      .store
      .get_event(id)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| DirectoryError::NotFound(format!("event {id}")))
  }

  pub async fn list_events(&self, include_inactive: bool) -> DirResult<Vec<Event>, S> {
    self
      .store
      .list_events(include_inactive)
      .await
      .map_err(DirectoryError::Store)
  }

  // ── Attendees ─────────────────────────────────────────────────────────

  pub async fn create_attendee(
    &self,
    actor: &Actor,
    input: NewAttendee,
  ) -> DirResult<Attendee, S> {
    actor.require_manage("register attendees")?;
    let input = input.normalized()?;
    let requested = input.attendee_id.clone();
    self
      .store
      .create_attendee(input, actor.username.clone())
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| {
        DirectoryError::Conflict(match requested {
          Some(id) => format!("attendee {id} already exists"),
          None => "attendee identifier already exists".to_owned(),
        })
      })
  }

  pub async fn update_attendee(
    &self,
    actor: &Actor,
    id: &AttendeeId,
    patch: AttendeePatch,
  ) -> DirResult<Attendee, S> {
    actor.require_manage("edit attendees")?;
    let mut attendee = self.get_attendee(id).await?;
    patch.apply(&mut attendee)?;
    let found = self
      .store
      .update_attendee(&attendee)
      .await
      .map_err(DirectoryError::Store)?;
    if !found {
      return Err(DirectoryError::NotFound(format!("attendee {id}")));
    }
    Ok(attendee)
  }

  pub async fn set_attendee_active(
    &self,
    actor: &Actor,
    id: AttendeeId,
    active: bool,
  ) -> DirResult<Attendee, S> {
    actor.require_manage(if active {
      "activate attendees"
    } else {
      "deactivate attendees"
    })?;
    let label = format!("attendee {id}");
    self
      .store
      .set_attendee_active(id, active)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or(DirectoryError::NotFound(label))
  }

  /// Bulk registration. Invalid rows fail the whole batch before anything is
  /// written; already-registered rows are skipped by the store.
  pub async fn import_attendees(
    &self,
    actor: &Actor,
    rows: Vec<NewAttendee>,
  ) -> DirResult<ImportSummary, S> {
    actor.require_manage("import attendees")?;
    let rows = rows
      .into_iter()
      .enumerate()
      .map(|(i, row)| {
        row.normalized().map_err(|e| {
          DirectoryError::Validation(format!("row {}: {e}", i + 1))
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    self
      .store
      .import_attendees(rows, actor.username.clone())
      .await
      .map_err(DirectoryError::Store)
  }

  pub async fn get_attendee(&self, id: &AttendeeId) -> DirResult<Attendee, S> {
    self
      .store
      .find_attendee(id)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| DirectoryError::NotFound(format!("attendee {id}")))
  }

  pub async fn list_attendees(&self, include_inactive: bool) -> DirResult<Vec<Attendee>, S> {
    self
      .store
      .list_attendees(include_inactive)
      .await
      .map_err(DirectoryError::Store)
  }

  // ── Checkpoints ───────────────────────────────────────────────────────

  pub async fn create_checkpoint(
    &self,
    actor: &Actor,
    event_id: Uuid,
    input: NewCheckpoint,
  ) -> DirResult<Checkpoint, S> {
    actor.require_manage("create checkpoints")?;
    let event = self.get_event(event_id).await?;
    let input = input.normalized(&event)?;
    let position = input.position;
    self
      .store
      .create_checkpoint(event_id, input, actor.username.clone())
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| {
        DirectoryError::Conflict(format!(
          "event {event_id} already has a checkpoint at position {position}"
        ))
      })
  }

  pub async fn set_checkpoint_active(
    &self,
    actor: &Actor,
    id: Uuid,
    active: bool,
  ) -> DirResult<Checkpoint, S> {
    actor.require_manage(if active {
      "activate checkpoints"
    } else {
      "deactivate checkpoints"
    })?;
    self
      .store
      .set_checkpoint_active(id, active)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| DirectoryError::NotFound(format!("checkpoint {id}")))
  }

  pub async fn get_checkpoint(&self, id: Uuid) -> DirResult<Checkpoint, S> {
    self
      .store
      .get_checkpoint(id)
      .await
      .map_err(DirectoryError::Store)?
      .ok_or_else(|| DirectoryError::NotFound(format!("checkpoint {id}")))
  }

  /// Checkpoints of one event in position order.
  pub async fn list_checkpoints(
    &self,
    event_id: Uuid,
    include_inactive: bool,
  ) -> DirResult<Vec<Checkpoint>, S> {
    self.get_event(event_id).await?;
    self
      .store
      .list_checkpoints(event_id, include_inactive)
      .await
      .map_err(DirectoryError::Store)
  }

  // ── Ledgers (read-only) ───────────────────────────────────────────────

  pub async fn list_attendance(&self, query: &LedgerQuery) -> DirResult<Vec<LedgerEntry>, S> {
    self
      .store
      .list_attendance(query)
      .await
      .map_err(DirectoryError::Store)
  }

  pub async fn list_checkpoint_attendance(
    &self,
    query: &CheckpointQuery,
  ) -> DirResult<Vec<CheckpointEntry>, S> {
    self
      .store
      .list_checkpoint_attendance(query)
      .await
      .map_err(DirectoryError::Store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_admins_manage() {
    let admin = Actor { username: "root".into(), role: Role::Admin };
    let viewer = Actor { username: "guest".into(), role: Role::Viewer };
    assert!(admin.can_manage());
    assert!(!viewer.can_manage());

    let err = viewer
      .require_manage::<std::convert::Infallible>("create events")
      .unwrap_err();
    assert_eq!(err.to_string(), "guest is not permitted to create events");
  }

  #[test]
  fn role_deserialises_lowercase() {
    let r: Role = serde_json::from_str("\"viewer\"").unwrap();
    assert_eq!(r, Role::Viewer);
  }
}
