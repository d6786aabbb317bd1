//! Import Writer: commit accepted candidates into the destination.
//!
//! The whole batch is one IMMEDIATE transaction against the destination
//! store, acquired with bounded retries so a concurrent writer surfaces as
//! `WriteConflict` instead of an opaque database error. Media files are
//! copied before the note referencing them is inserted and every created
//! file is journaled; on any write failure the transaction rolls back and
//! the journaled files are deleted, leaving the destination exactly as it
//! was.
//!
//! Media plans are re-validated against the live media directory at copy
//! time - the host may have written files since resolution - so a silent
//! overwrite is impossible even under concurrent mutation. Cancellation is
//! honored between notes: the in-flight transaction is finished with the
//! notes written so far and the remainder is reported as not attempted.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::Transaction;

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::import::session::CancelToken;
use crate::import::types::{ImportCandidate, ImportReport, MediaAction, RenameDetail};
use crate::store::ProfileStore;
use crate::store::media::MediaDir;
use crate::store::profile::{create_notetype_tx, insert_note_tx, notetype_by_name_tx};

/// Writes accepted candidates into one destination profile.
pub struct Writer<'a> {
    dest: &'a mut ProfileStore,
    options: &'a ImportOptions,
}

impl<'a> Writer<'a> {
    #[must_use]
    pub fn new(dest: &'a mut ProfileStore, options: &'a ImportOptions) -> Self {
        Self { dest, options }
    }

    /// Commit the batch. Only `Accept` candidates are written.
    ///
    /// # Errors
    ///
    /// Returns `WriteConflict` if the destination write lock cannot be
    /// acquired, or `CommitFailed` (wrapping the underlying error, with
    /// the failing candidate's index and summary) after a full rollback.
    pub fn commit(
        &mut self,
        candidates: &[ImportCandidate],
        source_media: &MediaDir,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for (index, candidate) in candidates.iter().enumerate() {
            report.tally_planned(index, candidate);
        }

        let accepted: Vec<(usize, &ImportCandidate)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_accepted())
            .collect();
        if accepted.is_empty() {
            return Ok(report);
        }

        let dest_media = self.dest.media().clone();
        dest_media.ensure()?;
        let mut journal: Vec<PathBuf> = Vec::new();

        let options = self.options;
        let outcome = {
            let report = &mut report;
            let journal = &mut journal;
            self.dest.mutate_with_retry(
                "import_commit",
                options.write_retry_attempts,
                options.write_retry_backoff_ms,
                |tx| {
                    write_batch(
                        tx,
                        &accepted,
                        source_media,
                        &dest_media,
                        options,
                        cancel,
                        report,
                        journal,
                    )
                },
            )
        };

        match outcome {
            Ok(()) => {
                tracing::info!(
                    imported = report.imported,
                    skipped = report.skipped_duplicate,
                    renamed = report.renamed_media,
                    "import committed"
                );
                Ok(report)
            }
            Err(e) => {
                // the transaction already rolled back; undo the media copies
                remove_journaled(&journal);
                Err(e)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_batch(
    tx: &Transaction,
    accepted: &[(usize, &ImportCandidate)],
    source_media: &MediaDir,
    dest_media: &MediaDir,
    options: &ImportOptions,
    cancel: &CancelToken,
    report: &mut ImportReport,
    journal: &mut Vec<PathBuf>,
) -> Result<()> {
    let mut notetype_ids: BTreeMap<String, i64> = BTreeMap::new();

    for (pos, (index, candidate)) in accepted.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            report.not_attempted = accepted.len() - pos;
            tracing::info!(
                written = pos,
                remaining = report.not_attempted,
                "cancellation requested, finishing in-flight transaction"
            );
            break;
        }

        write_candidate(
            tx,
            candidate,
            source_media,
            dest_media,
            options,
            &mut notetype_ids,
            report,
            journal,
        )
        .map_err(|e| Error::CommitFailed {
            index: *index,
            summary: candidate.note.summary(),
            source: Box::new(e),
        })?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_candidate(
    tx: &Transaction,
    candidate: &ImportCandidate,
    source_media: &MediaDir,
    dest_media: &MediaDir,
    options: &ImportOptions,
    notetype_ids: &mut BTreeMap<String, i64>,
    report: &mut ImportReport,
    journal: &mut Vec<PathBuf>,
) -> Result<()> {
    let notetype_id = ensure_notetype(tx, candidate, notetype_ids, report)?;

    // media first, so a note row never becomes visible before its assets
    for plan in &candidate.media {
        let Some(expected) = plan.content_hash.as_deref() else {
            continue; // MissingSource, already itemized
        };
        match &plan.action {
            MediaAction::Copy => {
                copy_blob(source_media, &plan.filename, dest_media, &plan.filename, expected, journal)?;
                report.media_copied += 1;
            }
            MediaAction::Rename { new_name } => {
                copy_blob(source_media, &plan.filename, dest_media, new_name, expected, journal)?;
                report.media_copied += 1;
                report.renamed_media += 1;
                report.renames.push(RenameDetail {
                    from: plan.filename.clone(),
                    to: new_name.clone(),
                });
            }
            MediaAction::Keep => {
                revalidate(dest_media, &plan.filename, expected)?;
            }
            MediaAction::UseExisting { existing } => {
                revalidate(dest_media, existing, expected)?;
                report.media_deduped += 1;
            }
            MediaAction::MissingSource => {}
        }
    }

    let tags = effective_tags(candidate, options);
    insert_note_tx(tx, notetype_id, &candidate.note.fields, &tags)?;
    report.imported += 1;

    Ok(())
}

/// Resolve (or create) the destination note type id, re-validating the
/// layout in case the host mutated it after resolution.
fn ensure_notetype(
    tx: &Transaction,
    candidate: &ImportCandidate,
    notetype_ids: &mut BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<i64> {
    let name = &candidate.note.notetype_name;
    if let Some(id) = notetype_ids.get(name) {
        return Ok(*id);
    }

    let id = match notetype_by_name_tx(tx, name)? {
        Some(nt) if nt.same_layout(&candidate.notetype_fields) => nt.id,
        Some(_) => {
            return Err(Error::Other(format!(
                "note type '{name}' changed layout in the destination during import"
            )));
        }
        None if candidate.create_notetype => {
            let id = create_notetype_tx(tx, name, &candidate.notetype_fields)?;
            report.notetypes_created.push(name.clone());
            tracing::debug!(notetype = %name, "created note type on demand");
            id
        }
        None => {
            return Err(Error::Other(format!(
                "note type '{name}' disappeared from the destination during import"
            )));
        }
    };

    notetype_ids.insert(name.clone(), id);
    Ok(id)
}

/// Copy a blob into the destination, journaling the created file.
///
/// Idempotent: an existing identical file is a no-op. An existing file
/// with *different* content fails the commit; plans are made against a
/// snapshot and the live directory always wins.
fn copy_blob(
    source_media: &MediaDir,
    source_name: &str,
    dest_media: &MediaDir,
    dest_name: &str,
    expected_hash: &str,
    journal: &mut Vec<PathBuf>,
) -> Result<()> {
    if let Some(existing) = dest_media.content_hash(dest_name)? {
        if existing == expected_hash {
            return Ok(());
        }
        return Err(Error::MediaCopyFailure {
            filename: dest_name.to_string(),
            source: std::io::Error::other(
                "a different file with this name appeared in the destination",
            ),
        });
    }

    let target = dest_media.file_path(dest_name);
    std::fs::copy(source_media.file_path(source_name), &target).map_err(|e| {
        Error::MediaCopyFailure {
            filename: source_name.to_string(),
            source: e,
        }
    })?;
    journal.push(target);
    Ok(())
}

/// Confirm a file the note will reference still holds the planned bytes.
fn revalidate(dest_media: &MediaDir, name: &str, expected_hash: &str) -> Result<()> {
    match dest_media.content_hash(name)? {
        Some(hash) if hash == expected_hash => Ok(()),
        _ => Err(Error::MediaCopyFailure {
            filename: name.to_string(),
            source: std::io::Error::other(
                "referenced destination file changed or vanished during import",
            ),
        }),
    }
}

fn effective_tags(candidate: &ImportCandidate, options: &ImportOptions) -> Vec<String> {
    let mut tags = if options.copy_tags {
        candidate.note.tags.clone()
    } else {
        Vec::new()
    };
    if let Some(origin) = &options.origin_tag {
        tags.push(origin.clone());
    }
    tags
}

/// Best-effort removal of files created by a failed commit.
fn remove_journaled(journal: &[PathBuf]) {
    for path in journal {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove journaled media file");
        }
    }
}
