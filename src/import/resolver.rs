//! Conflict Resolver: decide what happens to each candidate note.
//!
//! Resolution compares source notes against a point-in-time index of the
//! destination (note identity hashes, note types, media contents) and
//! against the plans already made for earlier candidates in the same
//! batch, so a file planned for copy counts as present and a repeated
//! source note counts as a duplicate.
//!
//! Output is deterministic: the destination index enumerates sorted, media
//! references resolve in document order, and same-content lookups always
//! pick the smallest filename.

use std::collections::{BTreeMap, HashSet};

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::import::hash::{note_identity_hash, short_hash};
use crate::import::session::CancelToken;
use crate::import::types::{Decision, FailReason, ImportCandidate, MediaAction, MediaPlan};
use crate::model::media::{note_refs, rewrite_note_refs};
use crate::model::{Note, NoteType};
use crate::store::ProfileStore;
use crate::store::media::{MediaDir, MediaIndex};

/// Point-in-time view of the destination used for resolution.
#[derive(Debug)]
pub struct DestIndex {
    note_hashes: HashSet<String>,
    notetypes: BTreeMap<String, NoteType>,
    media: MediaIndex,
}

impl DestIndex {
    /// Build the index by scanning the destination store.
    ///
    /// # Errors
    ///
    /// Returns an error if notes, note types, or media cannot be read.
    pub fn build(dest: &ProfileStore) -> Result<Self> {
        let mut note_hashes = HashSet::new();
        for note in dest.all_notes()? {
            note_hashes.insert(note_identity_hash(
                &note.notetype_name,
                &note.fields,
                dest.media(),
            )?);
        }

        let notetypes = dest
            .notetypes()?
            .into_iter()
            .map(|nt| (nt.name.clone(), nt))
            .collect();

        let media = dest.media().snapshot()?;
        tracing::debug!(
            notes = note_hashes.len(),
            media = media.len(),
            "built destination index"
        );

        Ok(Self {
            note_hashes,
            notetypes,
            media,
        })
    }

    #[must_use]
    pub fn contains_note(&self, identity_hash: &str) -> bool {
        self.note_hashes.contains(identity_hash)
    }
}

/// Resolve source notes into import candidates.
///
/// Always succeeds structurally; individual candidates may carry `Fail`
/// markers. Cancellation between notes returns `Cancelled` and leaves the
/// destination untouched (resolution never writes).
///
/// # Errors
///
/// Returns an error if source media cannot be read, or `Cancelled`.
pub fn resolve(
    notes: &[Note],
    source_media: &MediaDir,
    source_notetypes: &BTreeMap<String, NoteType>,
    dest: &DestIndex,
    options: &ImportOptions,
    cancel: &CancelToken,
) -> Result<Vec<ImportCandidate>> {
    let mut planned = PlannedState::default();
    let mut candidates = Vec::with_capacity(notes.len());

    for note in notes {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        candidates.push(resolve_one(
            note,
            source_media,
            source_notetypes,
            dest,
            options,
            &mut planned,
        )?);
    }

    Ok(candidates)
}

/// Plans made earlier in the batch, visible to later candidates.
#[derive(Default)]
struct PlannedState {
    note_hashes: HashSet<String>,
    media_by_name: BTreeMap<String, String>,
    media_by_hash: BTreeMap<String, String>,
}

fn resolve_one(
    note: &Note,
    source_media: &MediaDir,
    source_notetypes: &BTreeMap<String, NoteType>,
    dest: &DestIndex,
    options: &ImportOptions,
    planned: &mut PlannedState,
) -> Result<ImportCandidate> {
    let identity_hash = note_identity_hash(&note.notetype_name, &note.fields, source_media)?;

    let notetype_fields = source_notetypes
        .get(&note.notetype_name)
        .map(|nt| nt.fields.clone())
        .unwrap_or_default();

    if dest.contains_note(&identity_hash) || planned.note_hashes.contains(&identity_hash) {
        return Ok(ImportCandidate {
            note: note.clone(),
            identity_hash,
            decision: Decision::SkipDuplicate,
            media: Vec::new(),
            notetype_fields,
            create_notetype: false,
        });
    }

    let create_notetype = match check_notetype(note, source_notetypes, dest, options) {
        Ok(create) => create,
        Err(reason) => {
            return Ok(ImportCandidate {
                note: note.clone(),
                identity_hash,
                decision: Decision::Fail(reason),
                media: Vec::new(),
                notetype_fields,
                create_notetype: false,
            });
        }
    };

    let mut fields = note.fields.clone();
    let mut plans = Vec::new();

    for name in note_refs(&note.fields) {
        let plan = match source_media.content_hash(&name)? {
            None => MediaPlan {
                filename: name.clone(),
                action: MediaAction::MissingSource,
                content_hash: None,
            },
            Some(hash) => plan_media(&name, &hash, dest, planned),
        };

        match &plan.action {
            MediaAction::UseExisting { existing } => {
                fields = rewrite_note_refs(&fields, &name, existing);
            }
            MediaAction::Rename { new_name } => {
                fields = rewrite_note_refs(&fields, &name, new_name);
            }
            MediaAction::Copy | MediaAction::Keep | MediaAction::MissingSource => {}
        }
        plans.push(plan);
    }

    planned.note_hashes.insert(identity_hash.clone());

    Ok(ImportCandidate {
        note: Note {
            fields,
            ..note.clone()
        },
        identity_hash,
        decision: Decision::Accept,
        media: plans,
        notetype_fields,
        create_notetype,
    })
}

fn check_notetype(
    note: &Note,
    source_notetypes: &BTreeMap<String, NoteType>,
    dest: &DestIndex,
    options: &ImportOptions,
) -> std::result::Result<bool, FailReason> {
    let Some(src_nt) = source_notetypes.get(&note.notetype_name) else {
        return Err(FailReason::IncompatibleNoteType {
            notetype: note.notetype_name.clone(),
            detail: "missing from the source store".to_string(),
        });
    };

    match dest.notetypes.get(&note.notetype_name) {
        Some(dest_nt) if dest_nt.same_layout(&src_nt.fields) => Ok(false),
        Some(_) => Err(FailReason::IncompatibleNoteType {
            notetype: note.notetype_name.clone(),
            detail: "field layout differs in the destination".to_string(),
        }),
        None if options.create_missing_notetypes => Ok(true),
        None => Err(FailReason::IncompatibleNoteType {
            notetype: note.notetype_name.clone(),
            detail: "not present in the destination and creation is disabled".to_string(),
        }),
    }
}

fn plan_media(name: &str, hash: &str, dest: &DestIndex, planned: &mut PlannedState) -> MediaPlan {
    let dest_hash = dest
        .media
        .hash_of(name)
        .or_else(|| planned.media_by_name.get(name).map(String::as_str));

    let action = match dest_hash {
        // name free in the destination
        None => {
            let existing = dest
                .media
                .name_with_content(hash)
                .or_else(|| planned.media_by_hash.get(hash).map(String::as_str));
            if let Some(existing) = existing {
                MediaAction::UseExisting {
                    existing: existing.to_string(),
                }
            } else {
                planned
                    .media_by_name
                    .insert(name.to_string(), hash.to_string());
                planned
                    .media_by_hash
                    .entry(hash.to_string())
                    .or_insert_with(|| name.to_string());
                MediaAction::Copy
            }
        }
        // identical bytes already there under this name
        Some(h) if h == hash => MediaAction::Keep,
        // name collision with different content
        Some(_) => rename_action(name, hash, dest, planned),
    };

    MediaPlan {
        filename: name.to_string(),
        action,
        content_hash: Some(hash.to_string()),
    }
}

/// Pick a deterministic collision-free name, lengthening the hash suffix
/// if the short one is itself taken by different content.
fn rename_action(
    name: &str,
    hash: &str,
    dest: &DestIndex,
    planned: &mut PlannedState,
) -> MediaAction {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    for len in [short_hash(hash).len(), 16, hash.len()] {
        let suffix = &hash[..hash.len().min(len)];
        let candidate = format!("{stem}-{suffix}{ext}");
        let existing = dest
            .media
            .hash_of(&candidate)
            .or_else(|| planned.media_by_name.get(&candidate).map(String::as_str));
        match existing {
            Some(h) if h == hash => {
                // a previous import already parked these bytes here
                return MediaAction::UseExisting { existing: candidate };
            }
            Some(_) => {}
            None => {
                planned
                    .media_by_name
                    .insert(candidate.clone(), hash.to_string());
                planned
                    .media_by_hash
                    .entry(hash.to_string())
                    .or_insert_with(|| candidate.clone());
                return MediaAction::Rename {
                    new_name: candidate,
                };
            }
        }
    }

    // full-hash suffix colliding with different content cannot happen with
    // an honest SHA-256; keep the name and let the writer refuse to clobber
    MediaAction::Keep
}
