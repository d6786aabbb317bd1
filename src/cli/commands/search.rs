//! `crossdeck search` - search a source profile without importing.

use std::path::Path;

use colored::Colorize;

use crate::cli::{SearchArgs, join_query};
use crate::config::ImportOptions;
use crate::error::Result;
use crate::import::SourceReader;

/// Execute the search command.
pub fn execute(root: &Path, args: &SearchArgs, json: bool) -> Result<()> {
    let defaults = ImportOptions::default();
    let options = ImportOptions {
        allow_empty_search: args.allow_empty,
        max_search_results: args.limit.unwrap_or(defaults.max_search_results),
        ..defaults
    };

    let query = join_query(&args.query);
    let reader = SourceReader::open(root, &args.from)?;
    let outcome = reader.search(&query, &options)?;

    if json {
        let output = serde_json::json!({
            "profile": args.from,
            "query": query,
            "total_matches": outcome.total_matches,
            "shown": outcome.notes.len(),
            "notes": outcome.notes,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if outcome.total_matches == 0 {
        println!("No matches in '{}' for: {query}", args.from);
        return Ok(());
    }

    for note in &outcome.notes {
        let tags = if note.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", note.tags.join(", "))
        };
        println!(
            "{:>6}  {}  {}{}",
            note.id,
            note.notetype_name.dimmed(),
            note.summary(),
            tags.dimmed()
        );
    }

    if outcome.truncated() {
        println!(
            "\nShowing {} of {} matches (raise with --limit)",
            outcome.notes.len(),
            outcome.total_matches
        );
    } else {
        println!("\n{} matches", outcome.total_matches);
    }

    Ok(())
}
