//! Profile store layer.
//!
//! A profile is a self-contained collection: a SQLite database of notes and
//! note types plus a media directory of binary assets. This module is the
//! narrow contract the import engine depends on:
//!
//! - [`profile::ProfileStore`] - open (read-only or writable), search,
//!   note/note-type access, and the IMMEDIATE-transaction write primitive
//! - [`media::MediaDir`] - file-by-name access, content hashing, and a
//!   deterministic snapshot index of the paired media directory
//! - [`schema`] - store schema and version
//!
//! The import engine never touches SQLite or the filesystem directly;
//! everything goes through these types.

pub mod media;
pub mod profile;
pub mod schema;

pub use media::{MediaDir, MediaIndex};
pub use profile::{ProfileStore, SearchHit};
