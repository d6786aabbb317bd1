//! Configuration and profile discovery.
//!
//! Crossdeck keeps every profile as a directory under one **profiles root**:
//!
//! ```text
//! <profiles_root>/<name>/collection.db   -- the note store
//! <profiles_root>/<name>/media/          -- the paired media directory
//! ```
//!
//! The root resolves from an explicit flag, then the environment, then the
//! per-user default. Import behavior knobs live in [`ImportOptions`].

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::profile::collection_path;

/// Environment variable overriding the profiles root.
pub const PROFILES_ENV: &str = "CROSSDECK_PROFILES";

/// Resolve the profiles root directory.
///
/// Priority:
/// 1. Explicit path from the `--profiles-dir` CLI flag
/// 2. `CROSSDECK_PROFILES` environment variable
/// 3. Per-user default: `~/.crossdeck/profiles`
///
/// # Errors
///
/// Returns `ConfigError` if no home directory can be determined and
/// nothing explicit was given.
pub fn profiles_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(root) = std::env::var(PROFILES_ENV) {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".crossdeck").join("profiles"))
        .ok_or_else(|| Error::Config("Cannot determine the home directory".to_string()))
}

/// List profile names under the root, sorted.
///
/// A directory counts as a profile when it contains a `collection.db`.
/// A missing root is an empty list, not an error.
///
/// # Errors
///
/// Returns an error if the root exists but cannot be read.
pub fn list_profiles(root: &Path) -> Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if collection_path(&entry.path()).exists() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Behavior knobs for a search/import session.
///
/// Defaults mirror the original product's settings: note types are created
/// on demand, tags travel with their notes, and empty searches are refused
/// so a stray Enter cannot pull in an entire sentence bank.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Create a missing note type in the destination on first use.
    /// When false, such candidates fail with `IncompatibleNoteType`.
    pub create_missing_notetypes: bool,
    /// Copy the source note's tags onto the imported note.
    pub copy_tags: bool,
    /// Extra tag added to every imported note (e.g. `from::bank`),
    /// so imports can be audited later. `None` adds nothing.
    pub origin_tag: Option<String>,
    /// Allow an empty query to match the whole source store.
    pub allow_empty_search: bool,
    /// Cap on returned search results; the total match count is still
    /// reported so the caller can see what was cut off.
    pub max_search_results: usize,
    /// Attempts to acquire the destination write lock before giving up
    /// with `WriteConflict`.
    pub write_retry_attempts: u32,
    /// Initial backoff between lock attempts; doubles per retry.
    pub write_retry_backoff_ms: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            create_missing_notetypes: true,
            copy_tags: true,
            origin_tag: None,
            allow_empty_search: false,
            max_search_results: 500,
            write_retry_attempts: 5,
            write_retry_backoff_ms: 50,
        }
    }
}
