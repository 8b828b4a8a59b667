use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::ContentHash;

/// Ordered list of classpath entries (files or directories).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPath {
    entries: Vec<PathBuf>,
}

impl ClassPath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }
}

impl From<Vec<PathBuf>> for ClassPath {
    fn from(entries: Vec<PathBuf>) -> Self {
        Self::new(entries)
    }
}

impl FromIterator<PathBuf> for ClassPath {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Computes a digest for a classpath. Implementations must be deterministic.
pub trait ClassPathHasher: Send + Sync {
    fn hash(&self, classpath: &ClassPath) -> ContentHash;
}

/// Hashes classpath entries by content.
///
/// Files contribute their bytes, directories contribute every file below them
/// keyed by relative path, and missing entries contribute nothing. Absolute
/// locations never enter the digest, so a relocated classpath hashes the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentClassPathHasher;

impl FileContentClassPathHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ClassPathHasher for FileContentClassPathHasher {
    fn hash(&self, classpath: &ClassPath) -> ContentHash {
        let entry_hashes = classpath
            .entries()
            .par_iter()
            .map(|entry| hash_entry(entry))
            .collect::<Vec<_>>();

        let mut hasher = Sha1::new();
        for (entry, digest) in classpath.iter().zip(entry_hashes) {
            match digest {
                Ok(Some(digest)) => hasher.update(digest.as_bytes()),
                Ok(None) => {}
                Err(err) => {
                    warn!(entry = %entry.display(), "skipping unreadable classpath entry: {err:#}");
                }
            }
        }
        ContentHash::finish(hasher)
    }
}

fn hash_entry(path: &Path) -> Result<Option<ContentHash>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to stat {}", path.display()));
        }
    };

    if metadata.is_dir() {
        hash_directory(path).map(Some)
    } else {
        let data = fs::read(path)
            .with_context(|| format!("failed to read {} for hashing", path.display()))?;
        Ok(Some(ContentHash::of(data)))
    }
}

fn hash_directory(root: &Path) -> Result<ContentHash> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;

    let mut relative = files
        .into_iter()
        .map(|file| {
            let rel = file
                .strip_prefix(root)
                .map(normalise_separators)
                .unwrap_or_default();
            (rel, file)
        })
        .collect::<Vec<_>>();
    relative.sort();

    let mut hasher = Sha1::new();
    for (rel, file) in relative {
        let data = fs::read(&file)
            .with_context(|| format!("failed to read {} for hashing", file.display()))?;
        hasher.update(rel.as_bytes());
        hasher.update(ContentHash::of(data).as_bytes());
    }
    Ok(ContentHash::finish(hasher))
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn normalise_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
