use crate::{
    resource::{Buffer, Image},
    types::AccessState,
    Backend,
};

/// How much of a resource a barrier covers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Granularity {
    Whole,
    Subresource { mip: u32, layer: u32 },
}

pub enum BarrierResource<B: Backend> {
    Buffer(Buffer<B>),
    Image(Image<B>),
}

/// A single state transition (or UAV barrier when both states are equal).
pub struct Barrier<B: Backend> {
    pub resource: BarrierResource<B>,
    pub granularity: Granularity,
    pub state_before: AccessState,
    pub state_after: AccessState,
}

/// Barriers accumulated by the tracker that have not been recorded yet. Append only; a commit
/// drains the whole batch.
pub struct PendingBarrierBatch<B: Backend> {
    barriers: Vec<Barrier<B>>,
}

impl<B: Backend> Barrier<B> {
    #[inline(always)]
    pub fn is_uav_barrier(&self) -> bool {
        self.state_before == self.state_after && self.state_after.has_unordered_access()
    }

    #[inline(always)]
    pub fn image(&self) -> Option<&Image<B>> {
        match &self.resource {
            BarrierResource::Image(image) => Some(image),
            BarrierResource::Buffer(_) => None,
        }
    }

    #[inline(always)]
    pub fn buffer(&self) -> Option<&Buffer<B>> {
        match &self.resource {
            BarrierResource::Buffer(buffer) => Some(buffer),
            BarrierResource::Image(_) => None,
        }
    }
}

impl<B: Backend> Default for PendingBarrierBatch<B> {
    fn default() -> Self {
        Self {
            barriers: Vec::default(),
        }
    }
}

impl<B: Backend> PendingBarrierBatch<B> {
    #[inline(always)]
    pub fn push(&mut self, barrier: Barrier<B>) {
        self.barriers.push(barrier);
    }

    #[inline(always)]
    pub(crate) fn push_image(
        &mut self,
        image: &Image<B>,
        granularity: Granularity,
        state_before: AccessState,
        state_after: AccessState,
    ) {
        self.barriers.push(Barrier {
            resource: BarrierResource::Image(image.clone()),
            granularity,
            state_before,
            state_after,
        });
    }

    #[inline(always)]
    pub(crate) fn push_buffer(
        &mut self,
        buffer: &Buffer<B>,
        state_before: AccessState,
        state_after: AccessState,
    ) {
        self.barriers.push(Barrier {
            resource: BarrierResource::Buffer(buffer.clone()),
            granularity: Granularity::Whole,
            state_before,
            state_after,
        });
    }

    #[inline(always)]
    pub fn barriers(&self) -> &[Barrier<B>] {
        &self.barriers
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    #[inline(always)]
    pub fn clear(&mut self) {
        self.barriers.clear();
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Barrier<B>> {
        self.barriers.drain(..)
    }
}
