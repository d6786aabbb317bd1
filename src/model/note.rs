//! Note and note type models.
//!
//! A note is an instance of a note type: an ordered sequence of field
//! values plus a tag set. Field values are stored joined with the ASCII
//! unit separator, matching the host store format, and split on read.
//!
//! Integer ids are store-local and never compared across stores; use
//! [`crate::import::hash::note_identity_hash`] for cross-store identity.

use serde::{Deserialize, Serialize};

/// Separator between field values in the store's `fields` column.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Schema for a family of notes: the ordered list of field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteType {
    pub id: i64,
    pub name: String,
    /// Field names in declared order.
    pub fields: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteType {
    /// Whether another store's note type can receive notes of this type.
    ///
    /// Compatible means the field name lists are identical in order and
    /// count. The name itself is matched by the caller; two types that
    /// share a name but disagree on layout are not compatible.
    #[must_use]
    pub fn same_layout(&self, other_fields: &[String]) -> bool {
        self.fields == other_fields
    }
}

/// A structured flashcard record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub notetype_id: i64,
    /// Denormalized note type name; the portable half of the note's
    /// identity (integer ids mean nothing outside their own store).
    pub notetype_name: String,
    /// Field values in the note type's declared order.
    pub fields: Vec<String>,
    /// Tags, kept sorted for stable serialization.
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    /// Join field values with the store separator for persistence.
    #[must_use]
    pub fn joined_fields(&self) -> String {
        join_fields(&self.fields)
    }

    /// First field value, used as the note's display summary.
    #[must_use]
    pub fn first_field(&self) -> &str {
        self.fields.first().map_or("", String::as_str)
    }

    /// Short, single-line summary for reports and log lines.
    ///
    /// Strips markup and truncates so a long cloze field cannot wreck
    /// terminal output.
    #[must_use]
    pub fn summary(&self) -> String {
        const MAX_CHARS: usize = 60;
        let plain = crate::import::hash::strip_html(self.first_field());
        let collapsed = crate::import::hash::collapse_whitespace(&plain);
        if collapsed.chars().count() <= MAX_CHARS {
            collapsed
        } else {
            let cut: String = collapsed.chars().take(MAX_CHARS).collect();
            format!("{cut}…")
        }
    }
}

/// Join field values with the store separator.
#[must_use]
pub fn join_fields(fields: &[String]) -> String {
    fields.join(&FIELD_SEPARATOR.to_string())
}

/// Split a stored `fields` column back into field values.
#[must_use]
pub fn split_fields(joined: &str) -> Vec<String> {
    joined.split(FIELD_SEPARATOR).map(str::to_string).collect()
}

/// Parse a stored space-separated tag list into a sorted vector.
#[must_use]
pub fn split_tags(joined: &str) -> Vec<String> {
    let mut tags: Vec<String> = joined.split_whitespace().map(str::to_string).collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Join tags for storage, sorted and space-separated.
#[must_use]
pub fn join_tags(tags: &[String]) -> String {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_note(fields: &[&str]) -> Note {
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

    #[test]
    fn test_fields_round_trip() {
        let note = make_note(&["front text", "back text", ""]);
        assert_eq!(split_fields(&note.joined_fields()), note.fields);
    }

    #[test]
    fn test_split_fields_preserves_empty_trailing_field() {
        assert_eq!(split_fields("a\u{1f}"), vec!["a".to_string(), String::new()]);
    }

    #[test]
    fn test_tags_sorted_and_deduped() {
        let joined = join_tags(&["zebra".into(), "apple".into(), "zebra".into()]);
        assert_eq!(joined, "apple zebra");
        assert_eq!(split_tags("b a b"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_same_layout() {
        let nt = NoteType {
            id: 1,
            name: "Basic".to_string(),
            fields: vec!["Front".to_string(), "Back".to_string()],
            created_at: 0,
            updated_at: 0,
        };
        assert!(nt.same_layout(&["Front".to_string(), "Back".to_string()]));
        assert!(!nt.same_layout(&["Back".to_string(), "Front".to_string()]));
        assert!(!nt.same_layout(&["Front".to_string()]));
    }

    #[test]
    fn test_summary_truncates_and_strips_markup() {
        let note = make_note(&["<b>word</b> definition"]);
        assert_eq!(note.summary(), "word definition");

        let long = "x".repeat(200);
        let note = make_note(&[&long]);
        assert!(note.summary().chars().count() <= 61);
        assert!(note.summary().ends_with('…'));
    }
}
