//! Error types for the Crossdeck CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=source, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Crossdeck operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string; shell pipelines on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Source store (exit 2)
    SourceNotFound,
    SourceLocked,
    SourceIncompatible,
    DatabaseError,

    // Not Found (exit 3)
    ProfileNotFound,

    // Validation (exit 4)
    InvalidQuery,
    InvalidArgument,
    ProfileExists,
    SameProfile,

    // Session (exit 5)
    SessionState,
    Cancelled,

    // Commit (exit 6)
    WriteConflict,
    MediaCopyFailure,
    CommitFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::SourceNotFound => "SOURCE_NOT_FOUND",
            Self::SourceLocked => "SOURCE_LOCKED",
            Self::SourceIncompatible => "SOURCE_INCOMPATIBLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ProfileExists => "PROFILE_EXISTS",
            Self::SameProfile => "SAME_PROFILE",
            Self::SessionState => "SESSION_STATE",
            Self::Cancelled => "CANCELLED",
            Self::WriteConflict => "WRITE_CONFLICT",
            Self::MediaCopyFailure => "MEDIA_COPY_FAILURE",
            Self::CommitFailed => "COMMIT_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::SourceNotFound
            | Self::SourceLocked
            | Self::SourceIncompatible
            | Self::DatabaseError => 2,
            Self::ProfileNotFound => 3,
            Self::InvalidQuery | Self::InvalidArgument | Self::ProfileExists | Self::SameProfile => {
                4
            }
            Self::SessionState | Self::Cancelled => 5,
            Self::WriteConflict | Self::MediaCopyFailure | Self::CommitFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller should retry with corrected input or after waiting.
    ///
    /// True for validation errors (fix the query or argument) and lock
    /// contention (retry when the other writer finishes). False for missing
    /// or incompatible stores, rollbacks, and internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery | Self::InvalidArgument | Self::SourceLocked | Self::WriteConflict
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Crossdeck operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source profile not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source profile is locked by another application: {path}")]
    SourceLocked { path: PathBuf },

    #[error(
        "Source profile uses store version {version}, this build supports up to {supported}: {path}"
    )]
    SourceIncompatible {
        path: PathBuf,
        version: i32,
        supported: i32,
    },

    #[error("Profile not found: {name}")]
    ProfileNotFound {
        name: String,
        /// Names of profiles that do exist, for hint display.
        available: Vec<String>,
    },

    #[error("Profile already exists: {name}")]
    ProfileExists { name: String },

    #[error("Source and destination are the same profile: {name}")]
    SameProfile { name: String },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid session state: expected {expected}, got {actual}")]
    SessionState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Destination is locked by another writer (gave up after {attempts} attempts)")]
    WriteConflict { attempts: u32 },

    #[error("Media copy failed for '{filename}': {source}")]
    MediaCopyFailure {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Commit failed at candidate {index} ('{summary}'); all writes rolled back")]
    CommitFailed {
        /// Zero-based index into the committed candidate sequence.
        index: usize,
        /// First-field summary of the failing note.
        summary: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SourceNotFound { .. } => ErrorCode::SourceNotFound,
            Self::SourceLocked { .. } => ErrorCode::SourceLocked,
            Self::SourceIncompatible { .. } => ErrorCode::SourceIncompatible,
            Self::ProfileNotFound { .. } => ErrorCode::ProfileNotFound,
            Self::ProfileExists { .. } => ErrorCode::ProfileExists,
            Self::SameProfile { .. } => ErrorCode::SameProfile,
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::SessionState { .. } => ErrorCode::SessionState,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::WriteConflict { .. } => ErrorCode::WriteConflict,
            Self::MediaCopyFailure { .. } => ErrorCode::MediaCopyFailure,
            Self::CommitFailed { .. } => ErrorCode::CommitFailed,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans and scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ProfileNotFound { available, .. } => {
                if available.is_empty() {
                    Some("No profiles exist yet. Create one: crossdeck init <name>".to_string())
                } else {
                    Some(format!(
                        "Available profiles: {}. Use `crossdeck profiles` to list them.",
                        available.join(", ")
                    ))
                }
            }

            Self::SourceNotFound { .. } => {
                Some("Use `crossdeck profiles` to list available profiles.".to_string())
            }

            Self::SourceLocked { .. } => Some(
                "Another application has this profile open. Close it, then retry.".to_string(),
            ),

            Self::SourceIncompatible { .. } => Some(
                "The profile was created by a newer Crossdeck. Upgrade this build to read it."
                    .to_string(),
            ),

            Self::ProfileExists { name } => Some(format!(
                "Pick a different name, or remove the existing profile directory for '{name}'."
            )),

            Self::SameProfile { .. } => Some(
                "Pass a different --from profile; importing a profile into itself is a no-op."
                    .to_string(),
            ),

            Self::InvalidQuery { .. } => Some(
                "Pass a search term (terms are AND-ed; use tag:<name> to match a tag), \
                 or pass --allow-empty to match the whole source profile."
                    .to_string(),
            ),

            Self::WriteConflict { .. } => Some(
                "The destination profile is busy. Retry when the host application is idle."
                    .to_string(),
            ),

            Self::CommitFailed { .. } => Some(
                "The destination was left unchanged. Fix the underlying error and re-run the \
                 import; already-imported notes are skipped as duplicates."
                    .to_string(),
            ),

            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint. Scripts parse this instead of stderr text.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(
            Error::SourceNotFound {
                path: PathBuf::from("/p")
            }
            .exit_code(),
            2
        );
        assert_eq!(
            Error::InvalidQuery {
                reason: "empty".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::WriteConflict { attempts: 5 }.exit_code(), 6);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::WriteConflict { attempts: 5 };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "WRITE_CONFLICT");
        assert_eq!(json["error"]["retryable"], true);
        assert!(json["error"]["hint"].as_str().is_some());
    }

    #[test]
    fn test_profile_not_found_hint_lists_profiles() {
        let err = Error::ProfileNotFound {
            name: "missing".into(),
            available: vec!["main".into(), "bank".into()],
        };
        let hint = err.hint().unwrap();
        assert!(hint.contains("main"));
        assert!(hint.contains("bank"));

        let err = Error::ProfileNotFound {
            name: "missing".into(),
            available: vec![],
        };
        assert!(err.hint().unwrap().contains("crossdeck init"));
    }

    #[test]
    fn test_commit_failed_wraps_source() {
        let inner = Error::MediaCopyFailure {
            filename: "pic.jpg".into(),
            source: std::io::Error::other("disk full"),
        };
        let err = Error::CommitFailed {
            index: 3,
            summary: "front text".into(),
            source: Box::new(inner),
        };
        assert_eq!(err.error_code(), ErrorCode::CommitFailed);
        assert!(err.to_string().contains("candidate 3"));
    }
}
