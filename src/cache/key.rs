use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use scriptcache_hash::ContentHash;

use crate::classloader::ClassLoader;

type DeferredHash = Lazy<ContentHash, Box<dyn FnOnce() -> ContentHash + Send>>;

/// Identity of a cached script class.
///
/// The parent classloader is held weakly: a key never keeps a loader alive.
/// Once the loader is gone the key stops matching anything, itself included,
/// so entries stored under it can only be dropped by the store.
///
/// The classpath hash is computed on the first comparison that needs it and
/// memoised for the lifetime of the key.
pub struct ScriptCacheKey {
    template_id: String,
    source_hash: ContentHash,
    parent_loader: Weak<dyn ClassLoader>,
    classpath_hash: DeferredHash,
}

impl ScriptCacheKey {
    pub fn new<F>(
        template_id: impl Into<String>,
        source_hash: ContentHash,
        parent_loader: &Arc<dyn ClassLoader>,
        classpath_hash: F,
    ) -> Self
    where
        F: FnOnce() -> ContentHash + Send + 'static,
    {
        let deferred: Box<dyn FnOnce() -> ContentHash + Send> = Box::new(classpath_hash);
        Self {
            template_id: template_id.into(),
            source_hash,
            parent_loader: Arc::downgrade(parent_loader),
            classpath_hash: Lazy::new(deferred),
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn source_hash(&self) -> ContentHash {
        self.source_hash
    }

    /// Forces the classpath hash if it has not been computed yet.
    pub fn classpath_hash(&self) -> ContentHash {
        *Lazy::force(&self.classpath_hash)
    }

    pub fn is_classpath_hash_computed(&self) -> bool {
        Lazy::get(&self.classpath_hash).is_some()
    }

    /// Whether the parent loader is still reachable.
    pub fn is_live(&self) -> bool {
        self.parent_loader.strong_count() > 0
    }

    pub fn parent_loader(&self) -> Option<Arc<dyn ClassLoader>> {
        self.parent_loader.upgrade()
    }

    /// Equality on everything but the classpath hash, so it never triggers
    /// hashing. Requires both parent loaders to be live and identical.
    pub fn same_identity(&self, other: &Self) -> bool {
        let (Some(mine), Some(theirs)) = (self.parent_loader.upgrade(), other.parent_loader.upgrade())
        else {
            return false;
        };

        loader_identity(&mine) == loader_identity(&theirs)
            && self.template_id == other.template_id
            && self.source_hash == other.source_hash
    }
}

fn loader_identity(loader: &Arc<dyn ClassLoader>) -> usize {
    Arc::as_ptr(loader).cast::<()>() as usize
}

impl PartialEq for ScriptCacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other) && self.classpath_hash() == other.classpath_hash()
    }
}

// Not reflexive once the parent loader is reclaimed. Maps keyed by
// `ScriptCacheKey` treat such entries as unreachable.
impl Eq for ScriptCacheKey {}

impl Hash for ScriptCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.template_id.hash(state);
        self.source_hash.hash(state);
        if let Some(loader) = self.parent_loader.upgrade() {
            loader_identity(&loader).hash(state);
        }
    }
}

impl fmt::Debug for ScriptCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCacheKey")
            .field("template_id", &self.template_id)
            .field("source_hash", &self.source_hash)
            .field(
                "parent_loader",
                &self.parent_loader.upgrade().map(|loader| loader.name().to_string()),
            )
            .field("classpath_hash", &Lazy::get(&self.classpath_hash))
            .finish()
    }
}
