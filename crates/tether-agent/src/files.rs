//! Index of the deployed script files.

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::FileIndexError;
use crate::paths::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Hex SHA-256 of the file contents.
    pub content_hash: String,
    pub line_count: u32,
}

impl FileStats {
    #[must_use]
    pub fn from_contents(contents: &[u8]) -> Self {
        let newlines = contents.iter().filter(|byte| **byte == b'\n').count();
        Self {
            content_hash: hex_digest(contents),
            line_count: u32::try_from(newlines + 1).unwrap_or(u32::MAX),
        }
    }
}

/// Known files keyed by normalized absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    files: IndexMap<String, FileStats>,
}

impl FileIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, stats: FileStats) {
        self.files.insert(normalize(path), stats);
    }

    /// Insert a file given only its line count (hosts that do not hash).
    pub fn insert_lines(&mut self, path: &str, line_count: u32) {
        self.insert(
            path,
            FileStats {
                content_hash: String::new(),
                line_count,
            },
        );
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileStats> {
        self.files.get(&normalize(path))
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Paths ending with `extension`.
    #[must_use]
    pub fn with_extension(&self, extension: &str) -> Vec<String> {
        self.files
            .keys()
            .filter(|path| path.ends_with(extension))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Hash over every path and content hash, independent of scan order.
    #[must_use]
    pub fn aggregate_hash(&self) -> String {
        let mut entries: Vec<(&String, &FileStats)> = self.files.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = Sha256::new();
        for (path, stats) in entries {
            hasher.update(path.as_bytes());
            hasher.update(b":");
            hasher.update(stats.content_hash.as_bytes());
            hasher.update(b"\n");
        }
        to_hex(&hasher.finalize())
    }
}

/// Produces the file index for a root directory.
pub trait FileIndexProvider {
    fn scan(&self, root: &Path, extensions: &[String]) -> Result<FileIndex, FileIndexError>;
}

/// Default scanner: walks `root` with glob patterns and hashes every match.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobScanner;

impl FileIndexProvider for GlobScanner {
    fn scan(&self, root: &Path, extensions: &[String]) -> Result<FileIndex, FileIndexError> {
        let mut index = FileIndex::new();
        for extension in extensions {
            let extension = extension.trim_start_matches('.');
            let pattern = root.join("**").join(format!("*.{extension}"));
            let pattern = pattern.to_string_lossy();
            let entries = glob::glob(&pattern)
                .map_err(|err| FileIndexError::Pattern(format!("{pattern}: {err}").into()))?;
            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        debug!(%err, "skipping unreadable entry");
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                let contents = std::fs::read(&path).map_err(|source| FileIndexError::Read {
                    path: path.clone(),
                    source,
                })?;
                index.insert(&path.to_string_lossy(), FileStats::from_contents(&contents));
            }
        }
        debug!(root = %root.display(), files = index.len(), "scanned file tree");
        Ok(index)
    }
}

fn hex_digest(contents: &[u8]) -> String {
    to_hex(&Sha256::digest(contents))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_counts_trailing_segment() {
        assert_eq!(FileStats::from_contents(b"a\nb\nc").line_count, 3);
        assert_eq!(FileStats::from_contents(b"a\nb\n").line_count, 3);
        assert_eq!(FileStats::from_contents(b"").line_count, 1);
    }

    #[test]
    fn aggregate_hash_ignores_insertion_order() {
        let mut a = FileIndex::new();
        a.insert("/x/1.js", FileStats::from_contents(b"one"));
        a.insert("/x/2.js", FileStats::from_contents(b"two"));
        let mut b = FileIndex::new();
        b.insert("/x/2.js", FileStats::from_contents(b"two"));
        b.insert("/x/1.js", FileStats::from_contents(b"one"));
        assert_eq!(a.aggregate_hash(), b.aggregate_hash());
        assert_eq!(a.aggregate_hash().len(), 64);
    }
}
