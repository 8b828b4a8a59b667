use std::any::type_name;
use std::sync::Arc;

use once_cell::sync::Lazy;
use scriptcache_hash::{ClassPath, ClassPathHasher, FileContentClassPathHasher};
use tracing::{debug, trace};

use super::stats::{CacheStatistics, CacheStatsSnapshot};
use super::store::{CachedEntry, CrossBuildStore, InMemoryCrossBuildStore};
use super::ScriptCacheKey;
use crate::classloader::{ClassLoader, RuntimeClass};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::scope::ClassLoaderScope;
use crate::script::{CompiledArtifact, LoadedScriptClass, ScriptSource};

/// Compiles and loads script classes once per distinct
/// (template, source, parent loader, extra classpath).
///
/// Lookups and stores go straight to the backing [`CrossBuildStore`]. There
/// is no de-duplication of concurrent misses: two callers racing on an equal
/// key both compile, and the last store wins.
pub struct ClassLoadingCache {
    store: Arc<dyn CrossBuildStore>,
    classpath_hasher: Arc<dyn ClassPathHasher>,
    stats: Arc<CacheStatistics>,
}

impl ClassLoadingCache {
    pub fn new(store: Arc<dyn CrossBuildStore>, classpath_hasher: Arc<dyn ClassPathHasher>) -> Self {
        Self {
            store,
            classpath_hasher,
            stats: CacheStatistics::new(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let store = match config.max_entries {
            Some(max_entries) => InMemoryCrossBuildStore::bounded(max_entries),
            None => InMemoryCrossBuildStore::new(),
        };
        Self::new(Arc::new(store), Arc::new(FileContentClassPathHasher::new()))
    }

    /// Cache shared by the whole process, configured from the environment.
    pub fn global() -> &'static Self {
        static GLOBAL: Lazy<ClassLoadingCache> =
            Lazy::new(|| ClassLoadingCache::from_config(&CacheConfig::from_env()));
        &GLOBAL
    }

    /// Key for `source` loaded under `parent_loader`. The classpath is only
    /// hashed if the key is compared against another one.
    pub fn key_for(
        &self,
        source: &ScriptSource,
        parent_loader: &Arc<dyn ClassLoader>,
        extra_classpath: &ClassPath,
    ) -> ScriptCacheKey {
        let hasher = Arc::clone(&self.classpath_hasher);
        let classpath = extra_classpath.clone();
        ScriptCacheKey::new(
            source.template_id(),
            source.source_hash(),
            parent_loader,
            move || hasher.hash(&classpath),
        )
    }

    /// Returns the loaded class for `source`, compiling and loading it only
    /// when no equal key is cached.
    ///
    /// `create_scope` is only invoked on a miss. Errors from `compile` are
    /// returned as-is; nothing is stored when compiling or loading fails.
    pub fn load_script_class<A, S, E>(
        &self,
        source: &ScriptSource,
        parent_loader: &Arc<dyn ClassLoader>,
        compile: impl FnOnce(&ScriptSource) -> Result<A, E>,
        create_scope: impl FnOnce() -> S,
        extra_classpath: &ClassPath,
    ) -> Result<Arc<LoadedScriptClass<A>>, E>
    where
        A: CompiledArtifact,
        S: ClassLoaderScope,
        E: From<CacheError>,
    {
        let key = self.key_for(source, parent_loader, extra_classpath);

        if let Some(entry) = self.store.get(&key) {
            let Ok(loaded) = entry.downcast::<LoadedScriptClass<A>>() else {
                self.stats.record_failure();
                return Err(CacheError::EntryTypeMismatch {
                    template: source.template_id().to_string(),
                    expected: type_name::<LoadedScriptClass<A>>(),
                }
                .into());
            };
            self.stats.record_hit();
            trace!(
                template = source.template_short_name(),
                script = source.display_name(),
                "script class cache hit"
            );
            return Ok(loaded);
        }

        self.stats.record_miss();
        let artifact = compile(source).inspect_err(|_| self.stats.record_failure())?;
        debug!(
            template = source.template_short_name(),
            script = source.display_name(),
            "compiled script, loading class"
        );

        let script_class =
            resolve_class(&artifact, create_scope).inspect_err(|_| self.stats.record_failure())?;

        let loaded = Arc::new(LoadedScriptClass::new(artifact, script_class));
        let erased: CachedEntry = loaded.clone();
        self.store.put(key, erased);
        self.stats.record_store();
        Ok(loaded)
    }

    /// [`Self::load_script_class`] without an extra classpath.
    pub fn load_script_class_default<A, S, E>(
        &self,
        source: &ScriptSource,
        parent_loader: &Arc<dyn ClassLoader>,
        compile: impl FnOnce(&ScriptSource) -> Result<A, E>,
        create_scope: impl FnOnce() -> S,
    ) -> Result<Arc<LoadedScriptClass<A>>, E>
    where
        A: CompiledArtifact,
        S: ClassLoaderScope,
        E: From<CacheError>,
    {
        self.load_script_class(
            source,
            parent_loader,
            compile,
            create_scope,
            &ClassPath::empty(),
        )
    }

    pub fn get(&self, key: &ScriptCacheKey) -> Option<CachedEntry> {
        self.store.get(key)
    }

    pub fn put(&self, key: ScriptCacheKey, value: CachedEntry) {
        self.store.put(key, value);
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

fn resolve_class<A, S>(
    artifact: &A,
    create_scope: impl FnOnce() -> S,
) -> Result<RuntimeClass, CacheError>
where
    A: CompiledArtifact,
    S: ClassLoaderScope,
{
    let scope = create_scope().localize(artifact.location()).lock();
    scope.local_class_loader()?.load_class(artifact.class_name())
}
