//! Candidate and report types for the import pipeline.
//!
//! The resolver turns source notes into [`ImportCandidate`]s carrying a
//! [`Decision`] and per-file [`MediaPlan`]s; the writer consumes them and
//! produces an [`ImportReport`]. Every skip, rename, and failure is
//! itemized in the report so the user can audit exactly what happened.

use serde::Serialize;

use crate::model::Note;

/// What to do about one media file referenced by a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MediaAction {
    /// Destination lacks the name; copy the blob under its own name.
    Copy,
    /// Destination already holds identical content under this name.
    Keep,
    /// Destination holds identical content under a different name; the
    /// note is rewritten to reference it and nothing is copied.
    UseExisting { existing: String },
    /// Destination holds *different* content under this name; the blob is
    /// copied under a deterministic new name and the note rewritten.
    Rename { new_name: String },
    /// The source store has no blob for this reference; the dangling
    /// reference is imported as-is and itemized in the report.
    MissingSource,
}

/// Planned handling for one media reference.
#[derive(Debug, Clone, Serialize)]
pub struct MediaPlan {
    /// Filename as referenced by the source note.
    pub filename: String,
    pub action: MediaAction,
    /// Content hash of the source blob (absent for `MissingSource`).
    pub content_hash: Option<String>,
}

/// Why a candidate cannot be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailReason {
    /// The destination has no compatible note type and creation is
    /// disallowed, or the name is taken by a different field layout.
    IncompatibleNoteType { notetype: String, detail: String },
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompatibleNoteType { notetype, detail } => {
                write!(f, "incompatible note type '{notetype}': {detail}")
            }
        }
    }
}

/// Resolution decision for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Write this note (media plans applied first).
    Accept,
    /// An identical note already exists in the destination or earlier in
    /// this batch.
    SkipDuplicate,
    /// Cannot be written; carried through to the report, never aborts the
    /// batch.
    Fail(FailReason),
}

/// One source note plus its resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ImportCandidate {
    /// The note to write. Fields may already be rewritten to point at
    /// renamed or deduplicated media.
    pub note: Note,
    /// Cross-store identity hash (computed over the *original* fields;
    /// stable under media renames).
    pub identity_hash: String,
    pub decision: Decision,
    pub media: Vec<MediaPlan>,
    /// Field names of the note's type in the source store; used to create
    /// the type on demand and to re-validate the destination's layout at
    /// commit time.
    pub notetype_fields: Vec<String>,
    /// The destination lacks this note type; the writer creates it on
    /// first use.
    pub create_notetype: bool,
}

impl ImportCandidate {
    /// Number of renames planned for this candidate.
    #[must_use]
    pub fn rename_count(&self) -> usize {
        self.media
            .iter()
            .filter(|p| matches!(p.action, MediaAction::Rename { .. }))
            .count()
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, Decision::Accept)
    }
}

/// A media rename performed (or planned) by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameDetail {
    pub from: String,
    pub to: String,
}

/// A per-candidate failure carried into the report.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    /// Index of the candidate in resolution order.
    pub index: usize,
    /// First-field summary of the note.
    pub summary: String,
    pub reason: String,
}

/// Outcome of a commit (or a dry-run preview of one).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_duplicate: usize,
    pub renamed_media: usize,
    pub media_copied: usize,
    pub media_deduped: usize,
    pub failed: usize,
    /// Candidates never reached because the commit was cancelled.
    pub not_attempted: usize,
    pub cancelled: bool,
    /// Note types created on demand, in creation order.
    pub notetypes_created: Vec<String>,
    pub renames: Vec<RenameDetail>,
    pub failures: Vec<FailureDetail>,
    /// Dangling references imported as-is.
    pub missing_media: Vec<String>,
}

impl ImportReport {
    /// Total candidates accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.imported + self.skipped_duplicate + self.failed + self.not_attempted
    }

    /// Preview the report a commit of these candidates would produce,
    /// without touching the destination. Used for `--dry-run`.
    #[must_use]
    pub fn preview(candidates: &[ImportCandidate]) -> Self {
        let mut report = Self::default();
        for (index, candidate) in candidates.iter().enumerate() {
            report.tally_planned(index, candidate);
            if candidate.is_accepted() {
                report.imported += 1;
                if candidate.create_notetype
                    && !report
                        .notetypes_created
                        .contains(&candidate.note.notetype_name)
                {
                    report
                        .notetypes_created
                        .push(candidate.note.notetype_name.clone());
                }
                for plan in &candidate.media {
                    match &plan.action {
                        MediaAction::Copy => report.media_copied += 1,
                        MediaAction::Rename { new_name } => {
                            report.renamed_media += 1;
                            report.media_copied += 1;
                            report.renames.push(RenameDetail {
                                from: plan.filename.clone(),
                                to: new_name.clone(),
                            });
                        }
                        MediaAction::UseExisting { .. } => report.media_deduped += 1,
                        MediaAction::Keep | MediaAction::MissingSource => {}
                    }
                }
            }
        }
        report
    }

    /// Count a non-accepted candidate (shared between preview and commit).
    pub(crate) fn tally_planned(&mut self, index: usize, candidate: &ImportCandidate) {
        match &candidate.decision {
            Decision::Accept => {
                for plan in &candidate.media {
                    if matches!(plan.action, MediaAction::MissingSource) {
                        self.missing_media.push(plan.filename.clone());
                    }
                }
            }
            Decision::SkipDuplicate => self.skipped_duplicate += 1,
            Decision::Fail(reason) => {
                self.failed += 1;
                self.failures.push(FailureDetail {
                    index,
                    summary: candidate.note.summary(),
                    reason: reason.to_string(),
                });
            }
        }
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} imported, {} duplicates skipped, {} media renamed, {} failed",
            self.imported, self.skipped_duplicate, self.renamed_media, self.failed
        )?;
        if self.cancelled {
            write!(f, ", {} not attempted (cancelled)", self.not_attempted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(fields: &[&str]) -> Note {
        Note {
            id: 1,
            notetype_id: 1,
            notetype_name: "Basic".to_string(),
            fields: fields.iter().map(ToString::to_string).collect(),
            tags: vec![],
            created_at: 0,
            updated_at: 0,
        }
    }

    fn candidate(decision: Decision, media: Vec<MediaPlan>) -> ImportCandidate {
        ImportCandidate {
            note: note(&["front", "back"]),
            identity_hash: "h".to_string(),
            decision,
            media,
            notetype_fields: vec!["Front".to_string(), "Back".to_string()],
            create_notetype: false,
        }
    }

    #[test]
    fn test_preview_counts() {
        let candidates = vec![
            candidate(Decision::Accept, vec![MediaPlan {
                filename: "pic.jpg".to_string(),
                action: MediaAction::Rename {
                    new_name: "pic-1a2b3c4d.jpg".to_string(),
                },
                content_hash: Some("1a2b3c4d".to_string()),
            }]),
            candidate(Decision::SkipDuplicate, vec![]),
            candidate(
                Decision::Fail(FailReason::IncompatibleNoteType {
                    notetype: "Cloze".to_string(),
                    detail: "field layout differs".to_string(),
                }),
                vec![],
            ),
        ];

        let report = ImportReport::preview(&candidates);
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.renamed_media, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.renames[0].to, "pic-1a2b3c4d.jpg");
        assert_eq!(report.failures[0].index, 2);
    }

    #[test]
    fn test_report_display_mentions_cancellation() {
        let report = ImportReport {
            imported: 1,
            not_attempted: 2,
            cancelled: true,
            ..Default::default()
        };
        let text = report.to_string();
        assert!(text.contains("1 imported"));
        assert!(text.contains("2 not attempted"));
    }

    #[test]
    fn test_report_serializes_deterministically() {
        let candidates = vec![candidate(Decision::Accept, vec![])];
        let a = serde_json::to_string(&ImportReport::preview(&candidates)).unwrap();
        let b = serde_json::to_string(&ImportReport::preview(&candidates)).unwrap();
        assert_eq!(a, b);
    }
}
