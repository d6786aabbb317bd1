//! Session Coordinator: orchestrates Reader -> Resolver -> Writer.
//!
//! An [`ImportSession`] walks the state machine
//!
//! ```text
//! Idle -> SourceOpened -> Searched -> Resolved -> Committed | Aborted
//! ```
//!
//! It exclusively owns the read-only source handle for the session's
//! lifetime and closes it on entry to either terminal state. Re-entering
//! `search` (refining the query) is permitted from `Searched` and
//! `Resolved` and discards prior candidates. A failed commit leaves the
//! session in `Resolved` - the destination was rolled back, so the same
//! candidates can be retried.
//!
//! All session state is in memory; nothing persists when the session ends,
//! successfully or not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::import::reader::{SearchOutcome, SourceReader};
use crate::import::resolver::{DestIndex, resolve};
use crate::import::types::{ImportCandidate, ImportReport};
use crate::import::writer::Writer;
use crate::store::ProfileStore;

/// Cooperative cancellation flag, checked between notes during resolve
/// and commit. Clone it out of the session and flip it from wherever the
/// host surfaces a cancel action.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SourceOpened,
    Searched,
    Resolved,
    Committed,
    Aborted,
}

impl SessionState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::SourceOpened => "SourceOpened",
            Self::Searched => "Searched",
            Self::Resolved => "Resolved",
            Self::Committed => "Committed",
            Self::Aborted => "Aborted",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// One search/import session against a source profile.
#[derive(Debug)]
pub struct ImportSession {
    options: ImportOptions,
    profiles_root: PathBuf,
    state: SessionState,
    cancel: CancelToken,
    source: Option<SourceReader>,
    outcome: Option<SearchOutcome>,
    candidates: Vec<ImportCandidate>,
}

impl ImportSession {
    #[must_use]
    pub fn new(profiles_root: &Path, options: ImportOptions) -> Self {
        Self {
            options,
            profiles_root: profiles_root.to_path_buf(),
            state: SessionState::Idle,
            cancel: CancelToken::default(),
            source: None,
            outcome: None,
            candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Clonable cancellation handle for this session.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Latest search outcome, if any.
    #[must_use]
    pub fn search_outcome(&self) -> Option<&SearchOutcome> {
        self.outcome.as_ref()
    }

    /// Candidates from the latest resolve.
    #[must_use]
    pub fn candidates(&self) -> &[ImportCandidate] {
        &self.candidates
    }

    /// `Idle -> SourceOpened`: open the source profile read-only.
    ///
    /// # Errors
    ///
    /// Fails with `SourceNotFound`, `SourceLocked`, `SourceIncompatible`,
    /// or `SessionState` when not in `Idle`. The session stays `Idle` on
    /// failure.
    pub fn open(&mut self, profile: &str) -> Result<()> {
        self.require(SessionState::Idle, "Idle")?;
        self.source = Some(SourceReader::open(&self.profiles_root, profile)?);
        self.state = SessionState::SourceOpened;
        Ok(())
    }

    /// `SourceOpened|Searched|Resolved -> Searched`: run (or refine) the
    /// query. Prior candidates are discarded.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidQuery` (the session keeps its current state) or
    /// `SessionState`.
    pub fn search(&mut self, query: &str) -> Result<&SearchOutcome> {
        match self.state {
            SessionState::SourceOpened | SessionState::Searched | SessionState::Resolved => {}
            _ => {
                return Err(Error::SessionState {
                    expected: "SourceOpened, Searched, or Resolved",
                    actual: self.state.name(),
                });
            }
        }

        let source = self.source.as_ref().ok_or(Error::SessionState {
            expected: "SourceOpened",
            actual: "no source handle",
        })?;
        let outcome = source.search(query, &self.options)?;

        self.candidates.clear();
        self.outcome = Some(outcome);
        self.state = SessionState::Searched;
        Ok(self.outcome.as_ref().expect("outcome just set"))
    }

    /// `Searched -> Resolved`: build the destination index and resolve
    /// every found note into a candidate.
    ///
    /// Always succeeds structurally; individual candidates may carry
    /// `Fail` markers. Cancellation returns `Cancelled` and the session
    /// stays `Searched`.
    ///
    /// # Errors
    ///
    /// Fails with `SessionState`, `Cancelled`, or on destination read
    /// errors.
    pub fn resolve(&mut self, dest: &ProfileStore) -> Result<&[ImportCandidate]> {
        self.require(SessionState::Searched, "Searched")?;
        let source = self.source.as_ref().ok_or(Error::SessionState {
            expected: "Searched",
            actual: "no source handle",
        })?;
        let outcome = self.outcome.as_ref().ok_or(Error::SessionState {
            expected: "Searched",
            actual: "no search outcome",
        })?;

        let index = DestIndex::build(dest)?;
        let notetypes = source.notetypes()?;
        self.candidates = resolve(
            &outcome.notes,
            source.media(),
            &notetypes,
            &index,
            &self.options,
            &self.cancel,
        )?;
        self.state = SessionState::Resolved;
        Ok(&self.candidates)
    }

    /// Report the commit of the current candidates would produce, without
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Fails with `SessionState` when not in `Resolved`.
    pub fn preview(&self) -> Result<ImportReport> {
        self.require(SessionState::Resolved, "Resolved")?;
        Ok(ImportReport::preview(&self.candidates))
    }

    /// `Resolved -> Committed`: write accepted candidates into the
    /// destination.
    ///
    /// On success (including a cancelled-but-consistent partial commit)
    /// the session is terminal and the source handle is closed. On
    /// failure the destination was rolled back and the session stays
    /// `Resolved`, so the commit can be retried.
    ///
    /// # Errors
    ///
    /// Fails with `SessionState`, `SameProfile`, `WriteConflict`, or
    /// `CommitFailed`.
    pub fn commit(&mut self, dest: &mut ProfileStore) -> Result<ImportReport> {
        self.require(SessionState::Resolved, "Resolved")?;
        let source = self.source.as_ref().ok_or(Error::SessionState {
            expected: "Resolved",
            actual: "no source handle",
        })?;
        if source.profile() == dest.name() {
            return Err(Error::SameProfile {
                name: dest.name().to_string(),
            });
        }

        let report =
            Writer::new(dest, &self.options).commit(&self.candidates, source.media(), &self.cancel)?;

        self.state = SessionState::Committed;
        self.source = None;
        Ok(report)
    }

    /// `SourceOpened|Searched|Resolved -> Aborted`: the user declines to
    /// import. No destination mutation; the source handle is closed.
    ///
    /// # Errors
    ///
    /// Fails with `SessionState` from `Idle` or a terminal state.
    pub fn abort(&mut self) -> Result<()> {
        match self.state {
            SessionState::SourceOpened | SessionState::Searched | SessionState::Resolved => {
                self.state = SessionState::Aborted;
                self.source = None;
                self.candidates.clear();
                Ok(())
            }
            _ => Err(Error::SessionState {
                expected: "SourceOpened, Searched, or Resolved",
                actual: self.state.name(),
            }),
        }
    }

    fn require(&self, state: SessionState, expected: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::SessionState {
                expected,
                actual: self.state.name(),
            })
        }
    }
}
