//! `crossdeck import` - end-to-end search and import.
//!
//! Drives the full session: open the source read-only, search, resolve
//! against the destination, then commit (or stop after resolution with
//! `--dry-run`). The printed summary mirrors the import report, one line
//! per outcome class, colored like the original product's status bar.

use std::path::Path;

use colored::Colorize;

use crate::cli::{ImportArgs, join_query};
use crate::error::{Error, Result};
use crate::import::{ImportReport, ImportSession};
use crate::store::ProfileStore;

/// Execute the import command.
pub fn execute(root: &Path, dest_profile: Option<&str>, args: &ImportArgs, json: bool) -> Result<()> {
    let dest_profile = dest_profile.ok_or_else(|| {
        Error::InvalidArgument(
            "no destination profile; pass --profile or set CROSSDECK_PROFILE".to_string(),
        )
    })?;
    if dest_profile == args.from {
        return Err(Error::SameProfile {
            name: dest_profile.to_string(),
        });
    }

    let options = args.to_options();
    let query = join_query(&args.query);

    let mut session = ImportSession::new(root, options);
    session.open(&args.from)?;
    let outcome = session.search(&query)?;
    let total_matches = outcome.total_matches;
    let shown = outcome.notes.len();

    let mut dest = ProfileStore::open(root, dest_profile)?;
    session.resolve(&dest)?;

    let report = if args.dry_run {
        let report = session.preview()?;
        session.abort()?;
        report
    } else {
        session.commit(&mut dest)?
    };

    if json {
        let output = serde_json::json!({
            "success": true,
            "dry_run": args.dry_run,
            "from": args.from,
            "into": dest_profile,
            "query": query,
            "total_matches": total_matches,
            "shown": shown,
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if args.dry_run {
        println!(
            "Dry run: '{}' -> '{}' ({query}), nothing written",
            args.from, dest_profile
        );
    } else {
        println!("Imported '{}' -> '{}' ({query})", args.from, dest_profile);
    }
    if shown < total_matches {
        println!("  Considered {shown} of {total_matches} matches (raise with --limit)");
    }
    print_report(&report);

    Ok(())
}

fn print_report(report: &ImportReport) {
    println!();
    if report.imported > 0 {
        println!("  {}", format!("{} notes imported", report.imported).green());
    }
    if report.skipped_duplicate > 0 {
        println!(
            "  {}",
            format!("{} duplicates skipped", report.skipped_duplicate).yellow()
        );
    }
    if report.renamed_media > 0 {
        println!(
            "  {}",
            format!("{} media files renamed", report.renamed_media).yellow()
        );
        for rename in &report.renames {
            println!("    {} -> {}", rename.from, rename.to);
        }
    }
    if report.media_copied > 0 {
        println!("  {} media files copied", report.media_copied);
    }
    if report.media_deduped > 0 {
        println!("  {} media references deduplicated", report.media_deduped);
    }
    if !report.notetypes_created.is_empty() {
        println!("  note types created: {}", report.notetypes_created.join(", "));
    }
    if !report.missing_media.is_empty() {
        println!(
            "  {}",
            format!(
                "{} media references missing from the source: {}",
                report.missing_media.len(),
                report.missing_media.join(", ")
            )
            .yellow()
        );
    }
    if report.failed > 0 {
        println!("  {}", format!("{} notes failed", report.failed).red());
        for failure in &report.failures {
            println!("    #{}: {} ({})", failure.index, failure.summary, failure.reason);
        }
    }
    if report.cancelled {
        println!(
            "  {}",
            format!("cancelled: {} notes not attempted", report.not_attempted).red()
        );
    }
    if report.total() == 0 {
        println!("  nothing to do");
    }
}
