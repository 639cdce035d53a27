//! Change detection by content hash (blake3).
//!
//! Editors routinely rewrite a file without changing its bytes (save on
//! focus loss, touch, atomic-rename saves). The watcher reports those as
//! modifications; hashing the content lets the reloader skip recompiles
//! that could not produce new output.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use dashmap::DashMap;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash representing "no content" (all zeros). Used for unreadable or
    /// deleted files so deletion still counts as a change.
    #[inline]
    pub const fn empty() -> Self {
        Self([0; 32])
    }
}

/// Compute the blake3 hash of a file's contents. Unreadable files hash to
/// [`ContentHash::empty`].
pub fn compute_file_hash(path: &Path) -> ContentHash {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return ContentHash::empty(),
    };

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return ContentHash::empty(),
        }
    }

    ContentHash::new(*hasher.finalize().as_bytes())
}

/// Last-seen content hashes, keyed by canonicalized path (thread-safe).
pub struct FreshnessCache {
    hashes: DashMap<PathBuf, ContentHash>,
}

impl FreshnessCache {
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
        }
    }

    fn key(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    /// Hash the file and compare against the last-seen hash, updating the
    /// record. Returns `true` on first sight or when the content differs.
    pub fn changed(&self, path: &Path) -> bool {
        let key = Self::key(path);
        let hash = compute_file_hash(&key);
        match self.hashes.insert(key, hash) {
            Some(previous) => previous != hash,
            None => true,
        }
    }

    pub fn forget(&self, path: &Path) {
        self.hashes.remove(&Self::key(path));
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new()
    }
}
