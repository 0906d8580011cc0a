//! SQLite backend for the Muster attendance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The per-session uniqueness of both
//! ledgers is a table constraint, and every write that depends on it runs
//! inside a single transaction on that thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
