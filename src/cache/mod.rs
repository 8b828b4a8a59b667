//! Process-wide cache of compiled and loaded script classes.

pub mod eviction;
pub mod key;
pub mod loading;
pub mod stats;
pub mod store;

pub use eviction::{EntryId, EvictionPolicy, LruEvictionPolicy};
pub use key::ScriptCacheKey;
pub use loading::ClassLoadingCache;
pub use stats::{CacheStatistics, CacheStatsSnapshot};
pub use store::{CachedEntry, CrossBuildStore, InMemoryCrossBuildStore};
