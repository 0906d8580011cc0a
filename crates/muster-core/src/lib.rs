//! Core types and trait definitions for the Muster attendance service.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::AttendanceStore`]; the HTTP layer
//! drives [`recorder::Recorder`] for scans and [`directory::Directory`] for
//! administrative writes.

// Store futures declare their `Send` bounds explicitly.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod attendee;
pub mod checkpoint;
pub mod directory;
pub mod error;
pub mod event;
pub mod recorder;
pub mod store;
pub mod token;
pub mod window;

pub use error::{Error, Result};
