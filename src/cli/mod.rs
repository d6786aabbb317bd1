//! Command-line interface definitions.
//!
//! The CLI is a thin shell over the import engine: every command maps to
//! session operations and prints either human-readable text or one JSON
//! object (`--json`, or automatically when stdout is not a TTY).

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Search another flashcard profile and import notes with their media.
#[derive(Debug, Parser)]
#[command(name = "crossdeck", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Destination profile (the one being imported into).
    #[arg(long, global = true, env = "CROSSDECK_PROFILE")]
    pub profile: Option<String>,

    /// Profiles root directory.
    #[arg(long, global = true, value_name = "DIR", env = "CROSSDECK_PROFILES")]
    pub profiles_dir: Option<PathBuf>,

    /// Emit one JSON object instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new, empty profile.
    Init {
        /// Profile name (directory name under the profiles root).
        name: String,
    },

    /// List profiles under the profiles root.
    Profiles,

    /// Search a source profile without importing anything.
    Search(SearchArgs),

    /// Search a source profile and import the matches.
    Import(ImportArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Source profile to search.
    #[arg(long, value_name = "PROFILE")]
    pub from: String,

    /// Query; terms are AND-ed, `tag:<name>` matches a whole tag.
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Cap on displayed results.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Allow an empty query (matches the whole source profile).
    #[arg(long)]
    pub allow_empty: bool,
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// Source profile to import from.
    #[arg(long, value_name = "PROFILE")]
    pub from: String,

    /// Query; terms are AND-ed, `tag:<name>` matches a whole tag.
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Cap on imported matches.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Allow an empty query (imports the whole source profile).
    #[arg(long)]
    pub allow_empty: bool,

    /// Fail candidates whose note type is missing in the destination
    /// instead of creating it.
    #[arg(long)]
    pub no_create_notetypes: bool,

    /// Do not copy tags onto imported notes.
    #[arg(long)]
    pub no_copy_tags: bool,

    /// Tag imported notes with `from::<source-profile>`.
    #[arg(long)]
    pub tag_origin: bool,

    /// Resolve and report without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    /// Fold the CLI flags over the default import options.
    #[must_use]
    pub fn to_options(&self) -> crate::config::ImportOptions {
        let defaults = crate::config::ImportOptions::default();
        crate::config::ImportOptions {
            create_missing_notetypes: !self.no_create_notetypes,
            copy_tags: !self.no_copy_tags,
            allow_empty_search: self.allow_empty,
            origin_tag: self
                .tag_origin
                .then(|| format!("from::{}", self.from)),
            max_search_results: self.limit.unwrap_or(defaults.max_search_results),
            ..defaults
        }
    }
}

/// Join the trailing query words back into one query string.
#[must_use]
pub fn join_query(words: &[String]) -> String {
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_import() {
        let cli = Cli::try_parse_from([
            "crossdeck",
            "--profile",
            "main",
            "import",
            "--from",
            "bank",
            "--tag-origin",
            "hello",
            "world",
        ])
        .unwrap();

        let Commands::Import(args) = &cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.from, "bank");
        assert_eq!(join_query(&args.query), "hello world");

        let options = args.to_options();
        assert_eq!(options.origin_tag.as_deref(), Some("from::bank"));
        assert!(options.copy_tags);
    }

    #[test]
    fn test_import_flags_invert_defaults() {
        let cli = Cli::try_parse_from([
            "crossdeck",
            "import",
            "--from",
            "bank",
            "--no-create-notetypes",
            "--no-copy-tags",
            "--limit",
            "10",
            "word",
        ])
        .unwrap();

        let Commands::Import(args) = &cli.command else {
            panic!("expected import command");
        };
        let options = args.to_options();
        assert!(!options.create_missing_notetypes);
        assert!(!options.copy_tags);
        assert_eq!(options.max_search_results, 10);
        assert!(options.origin_tag.is_none());
    }
}
