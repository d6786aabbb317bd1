//! Content hashing for cross-store note identity.
//!
//! Integer note ids are store-local, so deduplication across stores hashes
//! note *content*. The hash must be stable across the one mutation an
//! import is allowed to make - renaming a media file to dodge a name
//! collision - so media references are normalized to the referenced blob's
//! content hash before hashing. Two notes that show the same text and the
//! same bytes are the same note, whatever their files are called.
//!
//! Normalization rules, per field, in order:
//! 1. each recognized media reference becomes `{{media:<sha256>}}`, or
//!    `{{missing:<filename>}}` when the blob is absent from that note's
//!    own store;
//! 2. remaining HTML tags are stripped;
//! 3. whitespace runs collapse to one space, ends trimmed.
//! Tags and timestamps never participate in identity.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::media::extract_refs;
use crate::store::media::MediaDir;

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]+>").expect("valid html tag regex"));

/// Strip HTML tags from field text.
#[must_use]
pub fn strip_html(text: &str) -> String {
    HTML_TAG_RE.replace_all(text, "").into_owned()
}

/// Collapse whitespace runs to a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize one field for identity hashing.
///
/// # Errors
///
/// Returns an error if a referenced media file exists but cannot be read.
pub fn normalize_field(text: &str, media: &MediaDir) -> Result<String> {
    // Hash every referenced blob first so the replacement closure below
    // stays infallible.
    let mut tokens = std::collections::HashMap::new();
    for name in extract_refs(text) {
        let token = match media.content_hash(&name)? {
            Some(hash) => format!("{{{{media:{hash}}}}}"),
            None => format!("{{{{missing:{name}}}}}"),
        };
        tokens.insert(name, token);
    }

    let substituted = crate::model::media::replace_refs(text, |name| tokens.get(name).cloned());
    let stripped = strip_html(&substituted);
    Ok(collapse_whitespace(&stripped))
}

/// Cross-store identity hash of a note.
///
/// SHA-256 over the note type name and the normalized field values in
/// declared order, joined with the ASCII unit separator.
///
/// # Errors
///
/// Returns an error if referenced media cannot be read.
pub fn note_identity_hash(
    notetype_name: &str,
    fields: &[String],
    media: &MediaDir,
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(notetype_name.as_bytes());
    for field in fields {
        hasher.update([0x1f]);
        hasher.update(normalize_field(field, media)?.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Short prefix of a content hash used in deterministic renames.
#[must_use]
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

/// Deterministic collision-dodging filename: `<stem>-<shorthash><ext>`.
#[must_use]
pub fn renamed_filename(name: &str, content_hash: &str) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    format!("{stem}-{}{ext}", short_hash(content_hash))
}
