use std::mem::ManuallyDrop;

use crossbeam_channel::Sender;
use rustc_hash::FxHashMap;

use crate::{
    binding::{BindingLayout, BindingResource},
    garbage::Garbage,
    Backend, BackendError,
};

/// Tables never grow to less than this.
pub const MIN_DESCRIPTOR_TABLE_GROWTH: u32 = 64;

/// A growable bindless descriptor table bound to a single layout.
///
/// Identical resources share an entry when created through
/// [`DescriptorTable::create_descriptor`]. Running out of entries doubles the capacity.
pub struct DescriptorTable<B: Backend> {
    backend: std::sync::Arc<B>,
    layout: BindingLayout<B>,
    raw: ManuallyDrop<B::DescriptorTable>,
    entries: Vec<Option<BindingResource<B>>>,
    allocated: Vec<bool>,
    index: FxHashMap<BindingResource<B>, u32>,
    search_start: u32,
    on_drop: Sender<Garbage<B>>,
}

impl<B: Backend> DescriptorTable<B> {
    pub(crate) fn new(
        backend: std::sync::Arc<B>,
        layout: BindingLayout<B>,
        raw: B::DescriptorTable,
        capacity: u32,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self {
            backend,
            layout,
            raw: ManuallyDrop::new(raw),
            entries: (0..capacity).map(|_| None).collect(),
            allocated: vec![false; capacity as usize],
            index: FxHashMap::default(),
            search_start: 0,
            on_drop,
        }
    }

    #[inline(always)]
    pub fn layout(&self) -> &BindingLayout<B> {
        &self.layout
    }

    #[inline(always)]
    pub fn internal(&self) -> &B::DescriptorTable {
        &self.raw
    }

    #[inline(always)]
    pub fn capacity(&self) -> u32 {
        self.allocated.len() as u32
    }

    #[inline(always)]
    pub fn get(&self, index: u32) -> Option<&BindingResource<B>> {
        self.entries.get(index as usize).and_then(|entry| entry.as_ref())
    }

    /// Reserves an empty entry, growing the table if it's full.
    pub fn allocate_entry(&mut self) -> Result<u32, BackendError> {
        let capacity = self.capacity();

        if let Some(offset) = self.allocated[self.search_start as usize..]
            .iter()
            .position(|used| !used)
        {
            let index = self.search_start + offset as u32;
            self.allocated[index as usize] = true;
            self.search_start = index + 1;
            return Ok(index);
        }

        if let Some(index) = self.allocated[..self.search_start as usize]
            .iter()
            .position(|used| !used)
        {
            self.allocated[index] = true;
            self.search_start = index as u32 + 1;
            return Ok(index as u32);
        }

        // Full.
        let new_capacity = MIN_DESCRIPTOR_TABLE_GROWTH.max(capacity * 2);
        self.grow(new_capacity)?;

        self.allocated[capacity as usize] = true;
        self.search_start = capacity + 1;
        Ok(capacity)
    }

    /// Writes `resource` into a new entry, or returns the existing entry holding it.
    pub fn create_descriptor(&mut self, resource: BindingResource<B>) -> Result<u32, BackendError> {
        if let Some(index) = self.index.get(&resource) {
            return Ok(*index);
        }

        let index = self.allocate_entry()?;
        self.write(index, resource);
        Ok(index)
    }

    /// Writes `resource` into a specific entry, replacing whatever was there.
    pub fn create_descriptor_at(
        &mut self,
        index: u32,
        resource: BindingResource<B>,
    ) -> Result<(), BackendError> {
        if index >= self.capacity() {
            self.grow(MIN_DESCRIPTOR_TABLE_GROWTH.max((index + 1).next_power_of_two()))?;
        }

        self.allocated[index as usize] = true;
        if let Some(old) = self.entries[index as usize].take() {
            self.unindex(&old, index);
        }
        self.write(index, resource);
        Ok(())
    }

    /// Clears an entry and makes it available again.
    pub fn release_descriptor(&mut self, index: u32) {
        let Some(allocated) = self.allocated.get_mut(index as usize) else {
            return;
        };
        *allocated = false;

        if let Some(old) = self.entries[index as usize].take() {
            self.unindex(&old, index);
        }

        unsafe {
            self.backend.write_descriptor_table(&mut self.raw, index, None);
        }

        if index < self.search_start {
            self.search_start = index;
        }
    }

    fn write(&mut self, index: u32, resource: BindingResource<B>) {
        unsafe {
            self.backend
                .write_descriptor_table(&mut self.raw, index, Some(&resource));
        }
        self.index.entry(resource.clone()).or_insert(index);
        self.entries[index as usize] = Some(resource);
    }

    fn unindex(&mut self, resource: &BindingResource<B>, index: u32) {
        if self.index.get(resource) == Some(&index) {
            self.index.remove(resource);
        }
    }

    fn grow(&mut self, new_capacity: u32) -> Result<(), BackendError> {
        log::debug!(
            "growing descriptor table from {} to {} entries",
            self.capacity(),
            new_capacity
        );

        unsafe {
            self.backend
                .resize_descriptor_table(&mut self.raw, new_capacity, true)?;
        }
        self.entries.resize_with(new_capacity as usize, || None);
        self.allocated.resize(new_capacity as usize, false);
        Ok(())
    }
}

impl<B: Backend> Drop for DescriptorTable<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is never touched again after this.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        let _ = self.on_drop.send(Garbage::DescriptorTable { raw });
    }
}
