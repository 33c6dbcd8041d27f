use std::{
    fmt,
    num::NonZeroU32,
    sync::{Mutex, PoisonError},
};

/// Identifies a live GPU object created through a render context.
///
/// Handles hash and compare by this id, so it is what keys the per-list state tracker, the
/// referenced-resource set of in-flight command buffers and the structural hash of cached
/// descriptors. Every one of those holds a handle clone, which keeps the object (and therefore
/// its id) alive for as long as the entry exists. An id only returns to the pool once the
/// garbage collector has destroyed the object, so a recycled id never aliases a tracked one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(NonZeroU32);

/// Hands out [`ResourceId`]s. Freed ids are reused most-recent first.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    pool: Mutex<IdPool>,
}

#[derive(Debug, Default)]
struct IdPool {
    /// Number of ids ever handed out. The next fresh id is `issued + 1`.
    issued: u32,
    free: Vec<ResourceId>,
}

impl IdGenerator {
    pub fn create(&self) -> ResourceId {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = pool.free.pop() {
            return id;
        }

        pool.issued += 1;
        match NonZeroU32::new(pool.issued) {
            Some(id) => ResourceId(id),
            None => panic!("resource ids exhausted"),
        }
    }

    /// Returns an id to the pool. Called by the garbage collector after the object is
    /// destroyed.
    pub fn free(&self, id: ResourceId) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(id.get() <= pool.issued);
        pool.free.push(id);
    }

    /// Ids currently held by live objects.
    pub fn live(&self) -> usize {
        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        pool.issued as usize - pool.free.len()
    }
}

impl ResourceId {
    #[inline(always)]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
