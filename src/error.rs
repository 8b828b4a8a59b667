use std::path::PathBuf;

use thiserror::Error;

/// Failures detected by the cache itself while resolving a compiled script.
///
/// Compiler failures are never wrapped in this type; they reach the caller
/// of [`crate::ClassLoadingCache::load_script_class`] unchanged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("class {class_name} not found in {loader}")]
    ClassNotFound { class_name: String, loader: String },

    #[error("failed to read class file {}", path.display())]
    ClassRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not contain a loadable binary for {class_name}", path.display())]
    IncompatibleClass { class_name: String, path: PathBuf },

    #[error("classloader scope {scope} must be locked before its classloader is used")]
    ScopeNotLocked { scope: String },

    #[error("cached entry for template {template} is not a {expected}")]
    EntryTypeMismatch {
        template: String,
        expected: &'static str,
    },

    #[cfg(feature = "toml-config")]
    #[error("invalid cache configuration")]
    Config(#[from] toml::de::Error),
}

impl CacheError {
    pub fn is_class_not_found(&self) -> bool {
        matches!(self, Self::ClassNotFound { .. })
    }
}
