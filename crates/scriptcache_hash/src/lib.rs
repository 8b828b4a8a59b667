//! Content digests used to identify script sources and classpaths.
//!
//! A [`ContentHash`] is a SHA-1 digest. [`ClassPathHasher`] folds an ordered
//! [`ClassPath`] into a single digest.

mod classpath;

pub use classpath::{ClassPath, ClassPathHasher, FileContentClassPathHasher};

use std::fmt;

use sha1::{Digest, Sha1};

/// Length in bytes of a [`ContentHash`].
pub const HASH_LEN: usize = 20;

/// Deterministic digest of some content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Hash a byte slice.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data.as_ref());
        Self::finish(hasher)
    }

    pub(crate) fn finish(hasher: Sha1) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}
