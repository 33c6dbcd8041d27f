use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    id_gen::{IdGenerator, ResourceId},
    types::QueueType,
    Backend,
};

/// A backend object whose last handle has been dropped.
pub enum Garbage<B: Backend> {
    Buffer {
        id: ResourceId,
        raw: B::Buffer,
    },
    Image {
        id: ResourceId,
        raw: B::Image,
    },
    Shader {
        id: ResourceId,
        raw: B::Shader,
    },
    GraphicsPipeline {
        id: ResourceId,
        raw: B::GraphicsPipeline,
    },
    ComputePipeline {
        id: ResourceId,
        raw: B::ComputePipeline,
    },
    BindingLayout {
        id: ResourceId,
        raw: B::BindingLayout,
    },
    BindingSet {
        id: ResourceId,
        raw: B::BindingSet,
    },
    DescriptorTable {
        raw: B::DescriptorTable,
    },
}

/// Per queue timeline values.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct TimelineValues(pub [u64; QueueType::COUNT]);

pub(crate) struct GarbageCollector<B: Backend> {
    sender: Sender<Garbage<B>>,
    receiver: Receiver<Garbage<B>>,
    to_destroy: Mutex<Vec<ToDestroy<B>>>,
}

struct ToDestroy<B: Backend> {
    garbage: Garbage<B>,
    /// Every queue must reach these values before the object can be destroyed.
    values: TimelineValues,
}

impl<B: Backend> GarbageCollector<B> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            to_destroy: Mutex::new(Vec::default()),
        }
    }

    #[inline(always)]
    pub fn sender(&self) -> Sender<Garbage<B>> {
        self.sender.clone()
    }

    /// Destroys everything whose work has finished. Garbage that arrived since the last call
    /// waits on whatever has been submitted up to now (`target`). Returns how many objects
    /// were destroyed.
    pub unsafe fn cleanup(
        &self,
        backend: &B,
        ids: &IdGenerator,
        current: TimelineValues,
        target: TimelineValues,
    ) -> usize {
        puffin::profile_function!();

        let mut to_destroy = self.to_destroy.lock().unwrap_or_else(PoisonError::into_inner);

        for garbage in self.receiver.try_iter() {
            to_destroy.push(ToDestroy {
                garbage,
                values: target,
            });
        }

        let mut destroyed = 0;
        let mut i = 0;
        while i < to_destroy.len() {
            if !to_destroy[i].values.reached_by(&current) {
                i += 1;
                continue;
            }

            let entry = to_destroy.swap_remove(i);
            destroy(backend, ids, entry.garbage);
            destroyed += 1;
        }

        if destroyed > 0 {
            log::trace!("destroyed {destroyed} GPU objects");
        }

        destroyed
    }

    /// Number of objects waiting on the GPU before they can be destroyed.
    #[inline(always)]
    pub fn pending(&self) -> usize {
        self.to_destroy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self.receiver.len()
    }
}

impl TimelineValues {
    #[inline(always)]
    pub fn reached_by(&self, current: &TimelineValues) -> bool {
        self.0.iter().zip(current.0.iter()).all(|(t, c)| c >= t)
    }
}

unsafe fn destroy<B: Backend>(backend: &B, ids: &IdGenerator, garbage: Garbage<B>) {
    match garbage {
        Garbage::Buffer { id, raw } => {
            backend.destroy_buffer(raw);
            ids.free(id);
        }
        Garbage::Image { id, raw } => {
            backend.destroy_image(raw);
            ids.free(id);
        }
        Garbage::Shader { id, raw } => {
            backend.destroy_shader(raw);
            ids.free(id);
        }
        Garbage::GraphicsPipeline { id, raw } => {
            backend.destroy_graphics_pipeline(raw);
            ids.free(id);
        }
        Garbage::ComputePipeline { id, raw } => {
            backend.destroy_compute_pipeline(raw);
            ids.free(id);
        }
        Garbage::BindingLayout { id, raw } => {
            backend.destroy_binding_layout(raw);
            ids.free(id);
        }
        Garbage::BindingSet { id, raw } => {
            backend.destroy_binding_set(raw);
            ids.free(id);
        }
        Garbage::DescriptorTable { raw } => backend.destroy_descriptor_table(raw),
    }
}
