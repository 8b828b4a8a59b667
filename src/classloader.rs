//! Classloaders that script classes are resolved through.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::error::CacheError;

/// Leading bytes every loadable class binary starts with.
pub const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Resolves class names to runtime classes.
///
/// Loaders are handed around as `Arc<dyn ClassLoader>`; a resolved
/// [`RuntimeClass`] keeps its defining loader alive.
pub trait ClassLoader: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn load_class(self: Arc<Self>, class_name: &str) -> Result<RuntimeClass, CacheError>;
}

/// Handle to a class resolved by some [`ClassLoader`].
#[derive(Clone)]
pub struct RuntimeClass {
    name: String,
    defining_loader: Arc<dyn ClassLoader>,
    origin: Option<PathBuf>,
}

impl RuntimeClass {
    pub fn new(
        name: impl Into<String>,
        defining_loader: Arc<dyn ClassLoader>,
        origin: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            defining_loader,
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defining_loader(&self) -> &Arc<dyn ClassLoader> {
        &self.defining_loader
    }

    /// File the class was defined from, `None` for built-in classes.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn is_defined_by(&self, loader: &Arc<dyn ClassLoader>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.defining_loader), Arc::as_ptr(loader))
    }
}

impl fmt::Debug for RuntimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeClass")
            .field("name", &self.name)
            .field("defining_loader", &self.defining_loader.name())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Top of a loader hierarchy: knows a fixed set of built-in class names.
#[derive(Debug)]
pub struct RootClassLoader {
    name: String,
    classes: HashSet<String>,
}

impl RootClassLoader {
    pub fn new(name: impl Into<String>) -> Arc<dyn ClassLoader> {
        Self::with_classes(name, std::iter::empty::<String>())
    }

    pub fn with_classes<I, S>(name: impl Into<String>, classes: I) -> Arc<dyn ClassLoader>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.into(),
            classes: classes.into_iter().map(Into::into).collect(),
        })
    }
}

impl ClassLoader for RootClassLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_class(self: Arc<Self>, class_name: &str) -> Result<RuntimeClass, CacheError> {
        if !self.classes.contains(class_name) {
            return Err(CacheError::ClassNotFound {
                class_name: class_name.to_string(),
                loader: self.name.clone(),
            });
        }
        Ok(RuntimeClass::new(class_name, self, None))
    }
}

/// Loads classes from `.class` files under a set of directories, asking its
/// parent first.
#[derive(Debug)]
pub struct SegmentClassLoader {
    name: String,
    parent: Arc<dyn ClassLoader>,
    roots: Vec<PathBuf>,
}

impl SegmentClassLoader {
    pub fn new(name: impl Into<String>, parent: Arc<dyn ClassLoader>, roots: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            parent,
            roots,
        }
    }

    fn find_class_file(&self, class_name: &str) -> Option<PathBuf> {
        let relative = format!("{}.class", class_name.replace('.', "/"));
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

impl ClassLoader for SegmentClassLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_class(self: Arc<Self>, class_name: &str) -> Result<RuntimeClass, CacheError> {
        match Arc::clone(&self.parent).load_class(class_name) {
            Err(err) if err.is_class_not_found() => {}
            resolved => return resolved,
        }

        let Some(path) = self.find_class_file(class_name) else {
            return Err(CacheError::ClassNotFound {
                class_name: class_name.to_string(),
                loader: self.name.clone(),
            });
        };

        let bytes = fs::read(&path).map_err(|source| CacheError::ClassRead {
            path: path.clone(),
            source,
        })?;
        if !bytes.starts_with(&CLASS_MAGIC) {
            return Err(CacheError::IncompatibleClass {
                class_name: class_name.to_string(),
                path,
            });
        }

        trace!(loader = %self.name, class = class_name, "defined class");
        Ok(RuntimeClass::new(class_name, self, Some(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_class(root: &Path, class_name: &str, bytes: &[u8]) -> PathBuf {
        let path = root.join(format!("{}.class", class_name.replace('.', "/")));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create package dir");
        }
        fs::write(&path, bytes).expect("failed to write class file");
        path
    }

    fn segment(root: &Path, parent: Arc<dyn ClassLoader>) -> Arc<dyn ClassLoader> {
        Arc::new(SegmentClassLoader::new(
            "segment",
            parent,
            vec![root.to_path_buf()],
        ))
    }

    #[test]
    fn defines_class_from_segment() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = write_class(dir.path(), "scripts.Settings_abc", &CLASS_MAGIC);
        let loader = segment(dir.path(), RootClassLoader::new("root"));

        let class = Arc::clone(&loader)
            .load_class("scripts.Settings_abc")
            .expect("class should load");
        assert_eq!(class.name(), "scripts.Settings_abc");
        assert_eq!(class.origin(), Some(path.as_path()));
        assert!(class.is_defined_by(&loader));
    }

    #[test]
    fn parent_wins_over_segment() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write_class(dir.path(), "core.Object", &CLASS_MAGIC);
        let root = RootClassLoader::with_classes("root", ["core.Object"]);
        let loader = segment(dir.path(), Arc::clone(&root));

        let class = loader.load_class("core.Object").expect("class should load");
        assert!(class.is_defined_by(&root));
        assert_eq!(class.origin(), None);
    }

    #[test]
    fn missing_class_is_not_found() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let loader = segment(dir.path(), RootClassLoader::new("root"));
        let err = loader.load_class("scripts.Missing").unwrap_err();
        assert!(err.is_class_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn rejects_foreign_binaries() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write_class(dir.path(), "scripts.Broken", b"not a class");
        let loader = segment(dir.path(), RootClassLoader::new("root"));
        let err = loader.load_class("scripts.Broken").unwrap_err();
        assert!(matches!(err, CacheError::IncompatibleClass { .. }));
    }
}
