//! Classloader scopes: a segment of the loader hierarchy bound to the
//! locations a compiled script was written to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::classloader::{ClassLoader, SegmentClassLoader};
use crate::error::CacheError;

pub trait ClassLoaderScope: Sized {
    /// Adds `location` to the scope's local segment.
    fn localize(self, location: &Path) -> Self;

    /// Freezes the scope; no further locations can be added.
    fn lock(self) -> Self;

    /// Classloader for the local segment. Only available once locked.
    fn local_class_loader(&self) -> Result<Arc<dyn ClassLoader>, CacheError>;
}

#[derive(Debug)]
pub struct DefaultClassLoaderScope {
    id: String,
    parent: Arc<dyn ClassLoader>,
    local: Vec<PathBuf>,
    locked: bool,
    loader: OnceCell<Arc<dyn ClassLoader>>,
}

impl DefaultClassLoaderScope {
    pub fn new(id: impl Into<String>, parent: Arc<dyn ClassLoader>) -> Self {
        Self {
            id: id.into(),
            parent,
            local: Vec::new(),
            locked: false,
            loader: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn local_locations(&self) -> &[PathBuf] {
        &self.local
    }
}

impl ClassLoaderScope for DefaultClassLoaderScope {
    fn localize(mut self, location: &Path) -> Self {
        if self.locked {
            warn!(scope = %self.id, location = %location.display(), "ignoring location added to locked scope");
            return self;
        }
        self.local.push(location.to_path_buf());
        self
    }

    fn lock(mut self) -> Self {
        self.locked = true;
        self
    }

    fn local_class_loader(&self) -> Result<Arc<dyn ClassLoader>, CacheError> {
        if !self.locked {
            return Err(CacheError::ScopeNotLocked {
                scope: self.id.clone(),
            });
        }

        let loader = self.loader.get_or_init(|| {
            if self.local.is_empty() {
                return Arc::clone(&self.parent);
            }
            let segment: Arc<dyn ClassLoader> = Arc::new(SegmentClassLoader::new(
                format!("{}:local", self.id),
                Arc::clone(&self.parent),
                self.local.clone(),
            ));
            segment
        });
        Ok(Arc::clone(loader))
    }
}
