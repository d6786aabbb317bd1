//! Source Reader: read-only search over the second profile.
//!
//! The reader owns the read-only handle for the session's duration and is
//! the only component that touches the source store. It forwards the query
//! to the store's own matcher and adapts rows into [`Note`] values; query
//! syntax belongs to the store, not to the import engine.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::model::{Note, NoteType};
use crate::store::ProfileStore;
use crate::store::media::MediaDir;

/// Result of one search against the source store.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matching notes, capped at `ImportOptions::max_search_results`.
    pub notes: Vec<Note>,
    /// Uncapped match count.
    pub total_matches: usize,
}

impl SearchOutcome {
    /// Whether the cap cut off results.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.total_matches > self.notes.len()
    }
}

/// Read-only handle to the source profile.
#[derive(Debug)]
pub struct SourceReader {
    store: ProfileStore,
}

impl SourceReader {
    /// Open the source profile read-only.
    ///
    /// # Errors
    ///
    /// Fails with `SourceNotFound`, `SourceLocked`, or
    /// `SourceIncompatible`.
    pub fn open(root: &Path, profile: &str) -> Result<Self> {
        let store = ProfileStore::open_read_only(root, profile)?;
        tracing::info!(profile, "opened source profile read-only");
        Ok(Self { store })
    }

    #[must_use]
    pub fn profile(&self) -> &str {
        self.store.name()
    }

    #[must_use]
    pub fn media(&self) -> &MediaDir {
        self.store.media()
    }

    /// Source note types by name, for compatibility checks during resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn notetypes(&self) -> Result<BTreeMap<String, NoteType>> {
        Ok(self
            .store
            .notetypes()?
            .into_iter()
            .map(|nt| (nt.name.clone(), nt))
            .collect())
    }

    /// Run a search. Finite, restartable by calling again.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidQuery` for an empty query unless
    /// `options.allow_empty_search` is set, or on database errors.
    pub fn search(&self, query: &str, options: &ImportOptions) -> Result<SearchOutcome> {
        if query.trim().is_empty() && !options.allow_empty_search {
            return Err(Error::InvalidQuery {
                reason: "empty query".to_string(),
            });
        }

        let hit = self.store.search(query, options.max_search_results)?;
        tracing::debug!(
            query,
            shown = hit.notes.len(),
            total = hit.total_matches,
            "source search"
        );
        Ok(SearchOutcome {
            notes: hit.notes,
            total_matches: hit.total_matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::profile::ProfileStore;
    use tempfile::TempDir;

    fn seed(root: &Path) {
        let mut store = ProfileStore::create(root, "bank").unwrap();
        let nt = store
            .add_notetype("Basic", &["Front".to_string(), "Back".to_string()])
            .unwrap();
        for i in 0..3 {
            store
                .add_note(nt.id, &[format!("word {i}"), "def".to_string()], &[])
                .unwrap();
        }
    }

    #[test]
    fn test_empty_query_rejected_by_default() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let reader = SourceReader::open(tmp.path(), "bank").unwrap();

        let err = reader.search("  ", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn test_empty_query_allowed_when_opted_in() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let reader = SourceReader::open(tmp.path(), "bank").unwrap();

        let options = ImportOptions {
            allow_empty_search: true,
            ..ImportOptions::default()
        };
        let outcome = reader.search("", &options).unwrap();
        assert_eq!(outcome.total_matches, 3);
        assert!(!outcome.truncated());
    }

    #[test]
    fn test_search_is_restartable_and_capped() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let reader = SourceReader::open(tmp.path(), "bank").unwrap();

        let options = ImportOptions {
            max_search_results: 2,
            ..ImportOptions::default()
        };
        let first = reader.search("word", &options).unwrap();
        let second = reader.search("word", &options).unwrap();
        assert_eq!(first.notes.len(), 2);
        assert!(first.truncated());
        assert_eq!(
            first.notes.iter().map(|n| n.id).collect::<Vec<_>>(),
            second.notes.iter().map(|n| n.id).collect::<Vec<_>>()
        );
    }
}
