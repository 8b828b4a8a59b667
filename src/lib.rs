//! Process-wide cache of compiled and loaded script classes.
//!
//! A script unit is compiled and then loaded through a classloader
//! hierarchy. [`ClassLoadingCache`] remembers the result per template, source
//! hash, parent classloader and extra classpath, so repeated requests within
//! one process skip both steps.

pub mod cache;
pub mod classloader;
pub mod config;
pub mod error;
pub mod logging;
pub mod scope;
pub mod script;

pub use cache::{
    CachedEntry, ClassLoadingCache, CrossBuildStore, InMemoryCrossBuildStore, ScriptCacheKey,
};
pub use classloader::{ClassLoader, RootClassLoader, RuntimeClass, SegmentClassLoader};
pub use config::CacheConfig;
pub use error::CacheError;
pub use scope::{ClassLoaderScope, DefaultClassLoaderScope};
pub use script::{CompiledArtifact, CompiledScript, LoadedScriptClass, ScriptSource};
pub use scriptcache_hash::{ClassPath, ClassPathHasher, ContentHash, FileContentClassPathHasher};
