//! Data models for Crossdeck.
//!
//! This module contains the domain models:
//! - Note
//! - NoteType
//! - Media references embedded in note field text

pub mod media;
pub mod note;

pub use note::{FIELD_SEPARATOR, Note, NoteType};
