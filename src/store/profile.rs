//! Profile store implementation over SQLite.
//!
//! A `ProfileStore` wraps one profile's `collection.db` plus its media
//! directory. Destination profiles open writable and mutate through the
//! IMMEDIATE-transaction protocol; source profiles open strictly read-only
//! so a search/import session can never damage the store it reads from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};

use crate::config::list_profiles;
use crate::error::{Error, Result};
use crate::model::note::{join_fields, join_tags, split_fields, split_tags};
use crate::model::{Note, NoteType};
use crate::store::media::MediaDir;
use crate::store::schema::{STORE_VERSION, apply_schema, store_version};

/// Busy timeout applied to every connection outside write-lock acquisition.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory of a named profile under the profiles root.
#[must_use]
pub fn profile_dir(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Path of the note store inside a profile directory.
#[must_use]
pub fn collection_path(dir: &Path) -> PathBuf {
    dir.join("collection.db")
}

/// Path of the media directory inside a profile directory.
#[must_use]
pub fn media_path(dir: &Path) -> PathBuf {
    dir.join("media")
}

/// Result of a store search: the capped rows plus the uncapped match count.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub notes: Vec<Note>,
    pub total_matches: usize,
}

/// One profile's note store and media directory.
#[derive(Debug)]
pub struct ProfileStore {
    name: String,
    conn: Connection,
    media: MediaDir,
    read_only: bool,
}

impl ProfileStore {
    /// Create a new, empty profile.
    ///
    /// # Errors
    ///
    /// Fails with `ProfileExists` if the profile already has a collection,
    /// or on I/O and database errors.
    pub fn create(root: &Path, name: &str) -> Result<Self> {
        let dir = profile_dir(root, name);
        let db_path = collection_path(&dir);
        if db_path.exists() {
            return Err(Error::ProfileExists {
                name: name.to_string(),
            });
        }

        std::fs::create_dir_all(&dir)?;
        let media = MediaDir::new(media_path(&dir));
        media.ensure()?;

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        apply_schema(&conn)?;

        Ok(Self {
            name: name.to_string(),
            conn,
            media,
            read_only: false,
        })
    }

    /// Open an existing profile writable (the destination side).
    ///
    /// # Errors
    ///
    /// Fails with `ProfileNotFound` (with the list of profiles that do
    /// exist) if there is no collection, `SourceIncompatible` if the store
    /// version is newer than this build, or on database errors.
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let dir = profile_dir(root, name);
        let db_path = collection_path(&dir);
        if !db_path.exists() {
            return Err(Error::ProfileNotFound {
                name: name.to_string(),
                available: list_profiles(root).unwrap_or_default(),
            });
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        check_version(&conn, &db_path)?;
        apply_schema(&conn)?;

        let media = MediaDir::new(media_path(&dir));
        media.ensure()?;

        Ok(Self {
            name: name.to_string(),
            conn,
            media,
            read_only: false,
        })
    }

    /// Open an existing profile strictly read-only (the source side).
    ///
    /// The connection carries SQLite's read-only open flag, so no code
    /// path in the session can mutate the source store.
    ///
    /// # Errors
    ///
    /// Fails with `SourceNotFound`, `SourceLocked`, or
    /// `SourceIncompatible` per the session error taxonomy.
    pub fn open_read_only(root: &Path, name: &str) -> Result<Self> {
        let dir = profile_dir(root, name);
        let db_path = collection_path(&dir);
        if !db_path.exists() {
            return Err(Error::SourceNotFound { path: db_path });
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&db_path, flags)
            .map_err(|e| map_source_open_error(e, &db_path))?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        // Probe the version up front: this both validates compatibility and
        // surfaces an exclusive lock held by another writer as SourceLocked
        // instead of a mid-search database error.
        match store_version(&conn) {
            Ok(version) => check_probed_version(version, &db_path)?,
            Err(Error::Database(e)) if is_busy(&e) => {
                return Err(Error::SourceLocked { path: db_path });
            }
            Err(e) => return Err(e),
        }

        Ok(Self {
            name: name.to_string(),
            conn,
            media: MediaDir::new(media_path(&dir)),
            read_only: true,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn media(&self) -> &MediaDir {
        &self.media
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // ==================
    // Write primitive
    // ==================

    /// Execute a mutation inside one IMMEDIATE transaction.
    ///
    /// Commits when the closure succeeds, rolls back when it fails.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or the commit error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        self.mutate_with_retry(op, 1, 0, f)
    }

    /// Execute a mutation inside one IMMEDIATE transaction, retrying lock
    /// contention.
    ///
    /// IMMEDIATE takes the write lock up front, serializing this mutation
    /// against any other writer of the destination. Acquisition attempts
    /// are spaced by an exponential backoff starting at `backoff_ms`; the
    /// closure runs once, after the lock is held. On closure failure the
    /// transaction is rolled back and the closure's error returned.
    ///
    /// # Errors
    ///
    /// Returns `WriteConflict` once `attempts` are exhausted, the
    /// closure's error, or the commit error.
    pub fn mutate_with_retry<F, R>(
        &mut self,
        op: &str,
        attempts: u32,
        backoff_ms: u64,
        f: F,
    ) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        if self.read_only {
            return Err(Error::InvalidArgument(
                "profile was opened read-only".to_string(),
            ));
        }
        tracing::debug!(op, profile = %self.name, "mutate");

        // The backoff loop owns contention handling; SQLite's internal busy
        // wait would stack on top of it, so drop it for the acquisition and
        // restore it once the lock is held.
        self.conn.busy_timeout(Duration::ZERO)?;

        let mut backoff = backoff_ms;
        let mut attempt = 0;
        let tx = loop {
            attempt += 1;
            let e = match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
            {
                Ok(tx) => break tx,
                Err(e) => e,
            };
            if is_busy(&e) && attempt < attempts {
                tracing::debug!(attempt, backoff_ms = backoff, "destination busy, retrying");
                std::thread::sleep(Duration::from_millis(backoff));
                backoff = backoff.saturating_mul(2);
            } else {
                self.conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
                return Err(if is_busy(&e) {
                    Error::WriteConflict { attempts }
                } else {
                    e.into()
                });
            }
        };
        tx.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    tracing::error!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // ==================
    // Note type operations
    // ==================

    /// All note types, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn notetypes(&self) -> Result<Vec<NoteType>> {
        notetypes_on(&self.conn)
    }

    /// Look up a note type by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn notetype_by_name(&self, name: &str) -> Result<Option<NoteType>> {
        notetype_by_name_on(&self.conn, name)
    }

    /// Create a note type, outside any import transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a name collision).
    pub fn add_notetype(&mut self, name: &str, fields: &[String]) -> Result<NoteType> {
        let name = name.to_string();
        let fields = fields.to_vec();
        self.mutate("add_notetype", move |tx| {
            let id = create_notetype_tx(tx, &name, &fields)?;
            Ok(NoteType {
                id,
                name,
                fields,
                created_at: 0,
                updated_at: 0,
            })
        })
    }

    // ==================
    // Note operations
    // ==================

    /// Number of notes in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn note_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Get a note by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!("{NOTE_SELECT} WHERE n.id = ?1"))?;
        let note = stmt.query_row([id], note_from_row).optional()?;
        Ok(note)
    }

    /// All notes ordered by id.
    ///
    /// Used to build the destination index; id order keeps repeated
    /// resolutions deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT} ORDER BY n.id"))?;
        let notes = stmt
            .query_map([], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Search notes with the store's own query syntax.
    ///
    /// Space-separated terms are AND-ed; a plain term matches any field
    /// substring case-insensitively, `tag:<name>` matches a whole tag. An
    /// empty query matches everything (policy on whether to allow that
    /// lives with the caller). Results are ordered by id and capped at
    /// `limit`; `total_matches` counts the uncapped result set.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchHit> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let mut param_idx = 1;

        for term in query.split_whitespace() {
            if let Some(tag) = term.strip_prefix("tag:") {
                conditions.push(format!(
                    "' ' || n.tags || ' ' LIKE ?{param_idx} ESCAPE '\\'"
                ));
                params.push(format!("% {} %", escape_like(tag)));
            } else {
                conditions.push(format!("n.fields LIKE ?{param_idx} ESCAPE '\\'"));
                params.push(format!("%{}%", escape_like(term)));
            }
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!(
            "SELECT COUNT(*) FROM notes n JOIN notetypes t ON t.id = n.notetype_id{where_clause}"
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let total: i64 = self
            .conn
            .query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))?;

        let sql = format!("{NOTE_SELECT}{where_clause} ORDER BY n.id LIMIT ?{param_idx}");
        params.push(limit.to_string());
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let notes = stmt
            .query_map(param_refs.as_slice(), note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SearchHit {
            notes,
            total_matches: usize::try_from(total).unwrap_or(0),
        })
    }

    /// Insert a note, outside any import transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn add_note(&mut self, notetype_id: i64, fields: &[String], tags: &[String]) -> Result<i64> {
        let fields = fields.to_vec();
        let tags = tags.to_vec();
        self.mutate("add_note", move |tx| {
            insert_note_tx(tx, notetype_id, &fields, &tags)
        })
    }
}

// ==================
// Transaction-scoped helpers (used by the import writer)
// ==================

/// Insert a note inside an open transaction, returning the new id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_note_tx(
    tx: &Transaction,
    notetype_id: i64,
    fields: &[String],
    tags: &[String],
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp_millis();
    tx.execute(
        "INSERT INTO notes (notetype_id, fields, tags, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        rusqlite::params![notetype_id, join_fields(fields), join_tags(tags), now],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Create a note type inside an open transaction, returning the new id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn create_notetype_tx(tx: &Transaction, name: &str, fields: &[String]) -> Result<i64> {
    let now = chrono::Utc::now().timestamp_millis();
    tx.execute(
        "INSERT INTO notetypes (name, fields, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        rusqlite::params![name, serde_json::to_string(fields)?, now],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Look up a note type by name inside an open transaction.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn notetype_by_name_tx(tx: &Transaction, name: &str) -> Result<Option<NoteType>> {
    notetype_by_name_on(tx, name)
}

// ==================
// Internals
// ==================

const NOTE_SELECT: &str = "SELECT n.id, n.notetype_id, t.name, n.fields, n.tags, \
     n.created_at, n.updated_at FROM notes n JOIN notetypes t ON t.id = n.notetype_id";

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let fields: String = row.get(3)?;
    let tags: String = row.get(4)?;
    Ok(Note {
        id: row.get(0)?,
        notetype_id: row.get(1)?,
        notetype_name: row.get(2)?,
        fields: split_fields(&fields),
        tags: split_tags(&tags),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn notetype_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(NoteType, String)> {
    let fields_json: String = row.get(2)?;
    Ok((
        NoteType {
            id: row.get(0)?,
            name: row.get(1)?,
            fields: Vec::new(),
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        },
        fields_json,
    ))
}

fn parse_notetype((mut nt, fields_json): (NoteType, String)) -> Result<NoteType> {
    nt.fields = serde_json::from_str(&fields_json)?;
    Ok(nt)
}

fn notetypes_on(conn: &Connection) -> Result<Vec<NoteType>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, fields, created_at, updated_at FROM notetypes ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], notetype_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(parse_notetype).collect()
}

fn notetype_by_name_on(conn: &Connection, name: &str) -> Result<Option<NoteType>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, fields, created_at, updated_at FROM notetypes WHERE name = ?1",
    )?;
    let row = stmt.query_row([name], notetype_from_row).optional()?;
    row.map(parse_notetype).transpose()
}

/// Escape LIKE wildcards in user input.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::DatabaseBusy
                || err.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn map_source_open_error(e: rusqlite::Error, path: &Path) -> Error {
    if is_busy(&e) {
        Error::SourceLocked {
            path: path.to_path_buf(),
        }
    } else {
        Error::Database(e)
    }
}

fn check_version(conn: &Connection, path: &Path) -> Result<()> {
    check_probed_version(store_version(conn)?, path)
}

fn check_probed_version(version: Option<i32>, path: &Path) -> Result<()> {
    match version {
        Some(v) if v > STORE_VERSION => Err(Error::SourceIncompatible {
            path: path.to_path_buf(),
            version: v,
            supported: STORE_VERSION,
        }),
        Some(_) => Ok(()),
        None => Err(Error::SourceIncompatible {
            path: path.to_path_buf(),
            version: 0,
            supported: STORE_VERSION,
        }),
    }
}
