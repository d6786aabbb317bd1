//! Media directory access and content hashing.
//!
//! Each profile pairs its note store with a flat directory of binary
//! assets, addressed by filename. Cross-store comparisons are always by
//! SHA-256 content hash: two stores may hold the same name with different
//! bytes, or the same bytes under different names, and both cases matter
//! to the resolver.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// SHA-256 of a byte slice as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Handle to a profile's media directory.
#[derive(Debug, Clone)]
pub struct MediaDir {
    dir: PathBuf,
}

impl MediaDir {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Absolute path for a media filename.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    /// Content hash of a named file, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn content_hash(&self, name: &str) -> Result<Option<String>> {
        let path = self.file_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(sha256_hex(&bytes)))
    }

    /// Hash every file in the directory into a deterministic index.
    ///
    /// Enumeration is sorted by filename, so repeated snapshots of the
    /// same directory are identical and same-content lookups always
    /// resolve to the lexicographically smallest name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any file cannot be read.
    pub fn snapshot(&self) -> Result<MediaIndex> {
        let mut by_name = BTreeMap::new();
        let mut by_hash = BTreeMap::new();

        if !self.dir.is_dir() {
            return Ok(MediaIndex { by_name, by_hash });
        }

        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        for name in names {
            let bytes = fs::read(self.file_path(&name))?;
            let hash = sha256_hex(&bytes);
            by_hash.entry(hash.clone()).or_insert_with(|| name.clone());
            by_name.insert(name, hash);
        }

        Ok(MediaIndex { by_name, by_hash })
    }
}

/// Point-in-time index of a media directory.
#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    /// filename -> content hash
    by_name: BTreeMap<String, String>,
    /// content hash -> lexicographically smallest filename with that content
    by_hash: BTreeMap<String, String>,
}

impl MediaIndex {
    /// Hash of the named file, if present at snapshot time.
    #[must_use]
    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Smallest filename holding the given content, if any.
    #[must_use]
    pub fn name_with_content(&self, hash: &str) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
