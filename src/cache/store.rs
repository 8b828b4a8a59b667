use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::ScriptCacheKey;
use super::eviction::{EntryId, EvictionPolicy, LruEvictionPolicy};

/// Type-erased cached value. Callers downcast to the concrete type they stored.
pub type CachedEntry = Arc<dyn Any + Send + Sync>;

/// Key/value storage shared by every build running in this process.
///
/// `get` and `put` must each be safe to call concurrently. Nothing more is
/// required: a lookup followed by a store is not expected to be atomic.
pub trait CrossBuildStore: Send + Sync {
    fn get(&self, key: &ScriptCacheKey) -> Option<CachedEntry>;

    fn put(&self, key: ScriptCacheKey, value: CachedEntry);
}

struct Slot {
    id: EntryId,
    key: Arc<ScriptCacheKey>,
    value: CachedEntry,
}

/// Candidate found under the lock, compared by classpath hash after release.
type Candidate = (EntryId, Arc<ScriptCacheKey>, CachedEntry);

/// In-memory [`CrossBuildStore`], optionally bounded with LRU eviction.
///
/// Entries are bucketed by the key hash taken when they were stored. Only
/// the cheap parts of a key are compared while the lock is held; classpath
/// hashes, which may read the filesystem, are compared after it is released.
pub struct InMemoryCrossBuildStore {
    buckets: RwLock<HashMap<u64, Vec<Slot>, RandomState>>,
    build_hasher: RandomState,
    eviction_policy: Mutex<Box<dyn EvictionPolicy>>,
    max_entries: Option<usize>,
    next_id: AtomicU64,
}

impl InMemoryCrossBuildStore {
    pub fn new() -> Self {
        Self::with_policy(None, Box::new(LruEvictionPolicy::new()))
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self::with_policy(Some(max_entries), Box::new(LruEvictionPolicy::new()))
    }

    pub fn with_policy(max_entries: Option<usize>, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::with_hasher(RandomState::new())),
            build_hasher: RandomState::new(),
            eviction_policy: Mutex::new(policy),
            max_entries,
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, unreachable ones included.
    pub fn len(&self) -> usize {
        entry_count(&self.buckets.read())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry whose key's parent loader has been reclaimed.
    pub fn purge_unreachable(&self) -> usize {
        let mut buckets = self.buckets.write();
        let mut policy = self.eviction_policy.lock();
        let before = entry_count(&buckets);
        buckets.retain(|_, slots| {
            slots.retain(|slot| {
                let live = slot.key.is_live();
                if !live {
                    policy.on_remove(slot.id);
                }
                live
            });
            !slots.is_empty()
        });
        let purged = before - entry_count(&buckets);
        if purged > 0 {
            debug!(purged, "dropped cache entries with unreachable parent loaders");
        }
        purged
    }

    pub fn clear(&self) {
        let mut buckets = self.buckets.write();
        let mut policy = self.eviction_policy.lock();
        for slot in buckets.values().flatten() {
            policy.on_remove(slot.id);
        }
        buckets.clear();
    }

    fn candidates(&self, bucket: u64, key: &ScriptCacheKey) -> Vec<Candidate> {
        self.buckets
            .read()
            .get(&bucket)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| slot.key.same_identity(key))
                    .map(|slot| (slot.id, Arc::clone(&slot.key), Arc::clone(&slot.value)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn entry_count(buckets: &HashMap<u64, Vec<Slot>, RandomState>) -> usize {
    buckets.values().map(Vec::len).sum()
}

fn remove_slot(buckets: &mut HashMap<u64, Vec<Slot>, RandomState>, id: EntryId) {
    buckets.retain(|_, slots| {
        slots.retain(|slot| slot.id != id);
        !slots.is_empty()
    });
}

impl Default for InMemoryCrossBuildStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossBuildStore for InMemoryCrossBuildStore {
    fn get(&self, key: &ScriptCacheKey) -> Option<CachedEntry> {
        let bucket = self.build_hasher.hash_one(key);
        let (id, _, value) = self
            .candidates(bucket, key)
            .into_iter()
            .find(|(_, candidate, _)| candidate.classpath_hash() == key.classpath_hash())?;
        self.eviction_policy.lock().on_access(id);
        Some(value)
    }

    fn put(&self, key: ScriptCacheKey, value: CachedEntry) {
        let bucket = self.build_hasher.hash_one(&key);
        let replaced = self
            .candidates(bucket, &key)
            .into_iter()
            .filter(|(_, candidate, _)| candidate.classpath_hash() == key.classpath_hash())
            .map(|(id, _, _)| id)
            .collect::<Vec<_>>();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut buckets = self.buckets.write();
        let mut policy = self.eviction_policy.lock();

        let slots = buckets.entry(bucket).or_default();
        slots.retain(|slot| {
            let keep = !replaced.contains(&slot.id);
            if !keep {
                policy.on_remove(slot.id);
            }
            keep
        });
        slots.push(Slot {
            id,
            key: Arc::new(key),
            value,
        });
        policy.on_add(id);

        let Some(max_entries) = self.max_entries else {
            return;
        };
        while entry_count(&buckets) > max_entries {
            let Some(victim) = policy.evict() else {
                break;
            };
            remove_slot(&mut buckets, victim);
            debug!(entry = victim, "evicted cached script class");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::classloader::{ClassLoader, RootClassLoader};
    use scriptcache_hash::ContentHash;

    fn key(template: &str, loader: &Arc<dyn ClassLoader>) -> ScriptCacheKey {
        ScriptCacheKey::new(template, ContentHash::of(template), loader, || {
            ContentHash::of(b"")
        })
    }

    fn entry(value: &'static str) -> CachedEntry {
        Arc::new(value)
    }

    fn stored(store: &InMemoryCrossBuildStore, key: &ScriptCacheKey) -> Option<&'static str> {
        store
            .get(key)
            .and_then(|value| value.downcast_ref::<&'static str>().copied())
    }

    #[test]
    fn put_then_get() {
        let loader = RootClassLoader::new("root");
        let store = InMemoryCrossBuildStore::new();
        store.put(key("settings", &loader), entry("settings-class"));

        assert_eq!(stored(&store, &key("settings", &loader)), Some("settings-class"));

        let unrelated = key("build", &loader);
        assert_eq!(stored(&store, &unrelated), None);
        assert!(!unrelated.is_classpath_hash_computed());
    }

    #[test]
    fn classpath_hashing_does_not_block_writers() {
        let loader = RootClassLoader::new("root");
        let store = InMemoryCrossBuildStore::new();
        store.put(key("settings", &loader), entry("settings"));

        let (started_tx, started_rx) = mpsc::channel();
        let (stored_tx, stored_rx) = mpsc::channel::<()>();
        let lookup = ScriptCacheKey::new("settings", ContentHash::of("settings"), &loader, move || {
            started_tx.send(()).expect("writer thread is alive");
            stored_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("concurrent put should finish while the classpath is hashed");
            ContentHash::of(b"")
        });

        let (store_ref, loader_ref) = (&store, &loader);
        thread::scope(|s| {
            s.spawn(move || {
                started_rx.recv().expect("lookup started hashing");
                store_ref.put(key("project", loader_ref), entry("project"));
                stored_tx.send(()).expect("lookup is waiting");
            });
            assert_eq!(stored(&store, &lookup), Some("settings"));
        });
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn put_with_equal_key_replaces_value() {
        let loader = RootClassLoader::new("root");
        let store = InMemoryCrossBuildStore::new();
        store.put(key("settings", &loader), entry("first"));
        store.put(key("settings", &loader), entry("second"));

        assert_eq!(store.len(), 1);
        assert_eq!(stored(&store, &key("settings", &loader)), Some("second"));
    }

    #[test]
    fn bounded_store_evicts_least_recently_used() {
        let loader = RootClassLoader::new("root");
        let store = InMemoryCrossBuildStore::bounded(2);
        store.put(key("a", &loader), entry("a"));
        store.put(key("b", &loader), entry("b"));
        assert!(stored(&store, &key("a", &loader)).is_some());

        store.put(key("c", &loader), entry("c"));

        assert_eq!(store.len(), 2);
        assert!(stored(&store, &key("a", &loader)).is_some());
        assert!(stored(&store, &key("b", &loader)).is_none());
        assert!(stored(&store, &key("c", &loader)).is_some());
    }

    #[test]
    fn purge_drops_only_unreachable_entries() {
        let kept = RootClassLoader::new("kept");
        let store = InMemoryCrossBuildStore::new();
        store.put(key("settings", &kept), entry("kept"));
        {
            let dropped = RootClassLoader::new("dropped");
            store.put(key("settings", &dropped), entry("dropped"));
        }

        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_unreachable(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(stored(&store, &key("settings", &kept)), Some("kept"));
    }

    #[test]
    fn clear_empties_store() {
        let loader = RootClassLoader::new("root");
        let store = InMemoryCrossBuildStore::new();
        store.put(key("settings", &loader), entry("settings"));
        store.clear();
        assert!(store.is_empty());
    }
}
