//! Media references embedded in note field text.
//!
//! The host store format embeds media as filenames inside field text, in
//! two syntaxes:
//!
//! - `[sound:clip.mp3]` for audio
//! - the `src`/`data` attribute of `<img>` / `<object>` tags for images
//!
//! Extraction is document order, first occurrence wins. Names containing a
//! path separator are ignored: a reference must resolve inside the store's
//! own media directory.

use std::sync::LazyLock;

use regex::Regex;

static SOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[sound:([^\[\]]+)\]").expect("valid sound regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(?:img|object)\b[^>]*?\b(?:src|data)=(?:"([^"]+)"|'([^']+)')"#)
        .expect("valid tag regex")
});

static FULL_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:img|object)\b[^>]*>").expect("valid full tag regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:src|data)=(?:"([^"]+)"|'([^']+)')"#).expect("valid attr regex")
});

fn capture_name<'t>(caps: &regex::Captures<'t>) -> Option<&'t str> {
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\')
}

/// Extract media filenames referenced by one field, in document order.
#[must_use]
pub fn extract_refs(text: &str) -> Vec<String> {
    // Collect (position, name) across both syntaxes, then order by position
    // so audio and image references interleave the way they appear.
    let mut found: Vec<(usize, &str)> = Vec::new();
    for caps in SOUND_RE.captures_iter(text) {
        if let (Some(name), Some(m)) = (capture_name(&caps), caps.get(0)) {
            found.push((m.start(), name));
        }
    }
    for caps in TAG_RE.captures_iter(text) {
        if let (Some(name), Some(m)) = (capture_name(&caps), caps.get(0)) {
            found.push((m.start(), name));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut refs = Vec::new();
    for (_, name) in found {
        if is_valid_name(name) && !refs.iter().any(|r| r == name) {
            refs.push(name.to_string());
        }
    }
    refs
}

/// Extract media filenames referenced by a whole note, field order then
/// document order, first occurrence wins.
#[must_use]
pub fn note_refs(fields: &[String]) -> Vec<String> {
    let mut refs = Vec::new();
    for field in fields {
        for name in extract_refs(field) {
            if !refs.contains(&name) {
                refs.push(name);
            }
        }
    }
    refs
}

/// Rewrite every reference to `old` in one field to point at `new`.
///
/// Only filename occurrences inside recognized reference syntax are
/// touched; prose that happens to mention the filename is left alone.
#[must_use]
pub fn rewrite_ref(text: &str, old: &str, new: &str) -> String {
    let rewrite = |caps: &regex::Captures| -> String {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        match capture_name(caps) {
            Some(name) if name == old => whole.replacen(old, new, 1),
            _ => whole.to_string(),
        }
    };
    let pass1 = SOUND_RE.replace_all(text, &rewrite);
    TAG_RE.replace_all(&pass1, &rewrite).into_owned()
}

/// Rewrite references across all fields of a note.
#[must_use]
pub fn rewrite_note_refs(fields: &[String], old: &str, new: &str) -> Vec<String> {
    fields.iter().map(|f| rewrite_ref(f, old, new)).collect()
}

/// Replace each whole media reference occurrence with `f(filename)`.
///
/// The *entire* `[sound:..]` block or `<img>`/`<object>` tag is replaced,
/// not just the filename, so the substitution survives later markup
/// stripping. `f` returning `None` keeps the occurrence untouched.
pub fn replace_refs<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let pass1 = SOUND_RE.replace_all(text, |caps: &regex::Captures| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        match capture_name(caps) {
            Some(name) if is_valid_name(name) => f(name).unwrap_or_else(|| whole.to_string()),
            _ => whole.to_string(),
        }
    });
    FULL_TAG_RE
        .replace_all(&pass1, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let name = ATTR_RE
                .captures(whole)
                .and_then(|attr| attr.get(1).or_else(|| attr.get(2)))
                .map(|m| m.as_str());
            match name {
                Some(name) if is_valid_name(name) => f(name).unwrap_or_else(|| whole.to_string()),
                _ => whole.to_string(),
            }
        })
        .into_owned()
}
