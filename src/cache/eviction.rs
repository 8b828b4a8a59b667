/// Identifier of a stored entry, assigned by the store on insertion.
///
/// Policies track entries by id rather than by key: a key whose parent
/// loader has been reclaimed no longer compares equal to anything.
pub type EntryId = u64;

/// Eviction policy for the in-memory store
pub trait EvictionPolicy: Send {
    /// Pick the entry to evict and forget it
    fn evict(&mut self) -> Option<EntryId>;

    /// Called when an entry is read
    fn on_access(&mut self, id: EntryId);

    /// Called when an entry is added
    fn on_add(&mut self, id: EntryId);

    /// Called when an entry is removed for any other reason
    fn on_remove(&mut self, id: EntryId);
}

/// LRU (Least Recently Used) eviction policy
#[derive(Debug, Default)]
pub struct LruEvictionPolicy {
    access_order: Vec<EntryId>,
}

impl LruEvictionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self) -> usize {
        self.access_order.len()
    }
}

impl EvictionPolicy for LruEvictionPolicy {
    fn evict(&mut self) -> Option<EntryId> {
        if self.access_order.is_empty() {
            return None;
        }
        Some(self.access_order.remove(0))
    }

    fn on_access(&mut self, id: EntryId) {
        // Move to end (most recently used)
        self.access_order.retain(|tracked| *tracked != id);
        self.access_order.push(id);
    }

    fn on_add(&mut self, id: EntryId) {
        self.access_order.push(id);
    }

    fn on_remove(&mut self, id: EntryId) {
        self.access_order.retain(|tracked| *tracked != id);
    }
}
