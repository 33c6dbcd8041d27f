use std::{
    hash::{BuildHasherDefault, Hash, Hasher},
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::{mapref::entry::Entry, DashMap};
use rustc_hash::FxHasher;

/// A get-or-create cache keyed by a structural hash of a descriptor.
///
/// At most one value is ever constructed per hash, even when called from many threads at once.
/// Entries are never evicted individually; [`ObjectCache::invalidate_all`] drops everything.
///
/// Two different descriptors with the same 64-bit hash share an entry.
pub struct ObjectCache<K: ?Sized, V> {
    entries: DashMap<u64, V, BuildHasherDefault<FxHasher>>,
    constructed: AtomicUsize,
    _key: PhantomData<fn(&K)>,
}

impl<K: Hash + ?Sized, V: Clone> Default for ObjectCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + ?Sized, V: Clone> ObjectCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(BuildHasherDefault::default()),
            constructed: AtomicUsize::new(0),
            _key: PhantomData,
        }
    }

    #[inline(always)]
    pub fn structural_hash(desc: &K) -> u64 {
        let mut hasher = FxHasher::default();
        desc.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the cached value for `desc`, constructing it with `create` if there isn't one.
    ///
    /// `create` runs while the entry's shard is locked, so it must not call back into this
    /// cache.
    pub fn get_or_create<E>(
        &self,
        desc: &K,
        create: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<V, E> {
        let hash = Self::structural_hash(desc);

        if let Some(value) = self.entries.get(&hash) {
            return Ok(value.clone());
        }

        match self.entries.entry(hash) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                puffin::profile_scope!("cache_construct");
                let value = create(desc)?;
                self.constructed.fetch_add(1, Ordering::Relaxed);
                entry.insert(value.clone());
                Ok(value)
            }
        }
    }

    #[inline(always)]
    pub fn get(&self, desc: &K) -> Option<V> {
        self.entries
            .get(&Self::structural_hash(desc))
            .map(|value| value.clone())
    }

    /// Drops every entry. Returns how many there were.
    pub fn invalidate_all(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many values this cache has constructed over its lifetime.
    #[inline(always)]
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }
}
