use std::{sync::Arc, time::Duration};

use crate::{
    binding::{BindingLayout, BindingLayoutDesc, BindingSet, BindingSetDesc},
    cache::ObjectCache,
    command_list::CommandList,
    config::RenderConfig,
    descriptor_table::DescriptorTable,
    garbage::{GarbageCollector, TimelineValues},
    id_gen::IdGenerator,
    pipeline::{
        ComputePipeline, ComputePipelineDesc, GraphicsPipeline, GraphicsPipelineDesc, Shader,
        ShaderDesc,
    },
    queue::{Queue, QueueError, QueueWait},
    resource::{Buffer, BufferDesc, Image, ImageDesc, ResourceCreateError},
    types::QueueType,
    Backend,
};

/// Owns the backend, one submission queue per hardware queue, and the object caches.
///
/// Cloning is cheap and every clone refers to the same context. GPU object handles should be
/// dropped before the last context handle; anything dropped afterwards is leaked.
pub struct RenderContext<B: Backend>(Arc<ContextInner<B>>);

pub(crate) struct ContextInner<B: Backend> {
    backend: Arc<B>,
    config: RenderConfig,
    queues: [Queue<B>; QueueType::COUNT],
    ids: IdGenerator,
    garbage: GarbageCollector<B>,
    graphics_pipelines: ObjectCache<GraphicsPipelineDesc<B>, GraphicsPipeline<B>>,
    compute_pipelines: ObjectCache<ComputePipelineDesc<B>, ComputePipeline<B>>,
    binding_layouts: ObjectCache<BindingLayoutDesc, BindingLayout<B>>,
    binding_sets: ObjectCache<BindingSetDesc<B>, BindingSet<B>>,
}

impl<B: Backend> Clone for RenderContext<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: Backend> RenderContext<B> {
    pub fn new(backend: B, config: RenderConfig) -> Self {
        let backend = Arc::new(backend);
        let queues = QueueType::ALL.map(|ty| Queue::new(ty, backend.clone()));

        log::info!(
            "render context created with {} frames in flight",
            config.frames_in_flight
        );

        Self(Arc::new(ContextInner {
            backend,
            config,
            queues,
            ids: IdGenerator::default(),
            garbage: GarbageCollector::new(),
            graphics_pipelines: ObjectCache::new(),
            compute_pipelines: ObjectCache::new(),
            binding_layouts: ObjectCache::new(),
            binding_sets: ObjectCache::new(),
        }))
    }

    #[inline(always)]
    pub fn backend(&self) -> &B {
        &self.0.backend
    }

    #[inline(always)]
    pub fn config(&self) -> &RenderConfig {
        &self.0.config
    }

    #[inline(always)]
    pub fn queue(&self, ty: QueueType) -> &Queue<B> {
        &self.0.queues[ty.index()]
    }

    pub fn create_buffer(&self, desc: BufferDesc) -> Result<Buffer<B>, ResourceCreateError> {
        if desc.size == 0 {
            return Err(ResourceCreateError::InvalidDescriptor(
                "buffer size must be non-zero",
            ));
        }

        let raw = unsafe { self.0.backend.create_buffer(&desc)? };
        Ok(Buffer::new(
            self.0.ids.create(),
            desc,
            raw,
            self.0.garbage.sender(),
        ))
    }

    pub fn create_image(&self, desc: ImageDesc) -> Result<Image<B>, ResourceCreateError> {
        if desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(ResourceCreateError::InvalidDescriptor(
                "images need at least one mip level and array layer",
            ));
        }

        if desc.extent.width == 0 || desc.extent.height == 0 || desc.extent.depth == 0 {
            return Err(ResourceCreateError::InvalidDescriptor(
                "image extent must be non-zero",
            ));
        }

        let raw = unsafe { self.0.backend.create_image(&desc)? };
        Ok(Image::new(
            self.0.ids.create(),
            desc,
            raw,
            self.0.garbage.sender(),
        ))
    }

    pub fn create_shader(
        &self,
        desc: ShaderDesc,
        code: &[u32],
    ) -> Result<Shader<B>, ResourceCreateError> {
        let raw = unsafe { self.0.backend.create_shader(&desc, code)? };
        Ok(Shader::new(
            self.0.ids.create(),
            desc,
            raw,
            self.0.garbage.sender(),
        ))
    }

    /// Layouts are cached. Structurally identical descriptors return the same layout.
    pub fn create_binding_layout(
        &self,
        desc: BindingLayoutDesc,
    ) -> Result<BindingLayout<B>, ResourceCreateError> {
        let inner = &self.0;
        inner
            .binding_layouts
            .get_or_create(&desc, |desc| -> Result<_, ResourceCreateError> {
                let raw = unsafe { inner.backend.create_binding_layout(desc)? };
                Ok(BindingLayout::new(
                    inner.ids.create(),
                    desc.clone(),
                    raw,
                    inner.garbage.sender(),
                ))
            })
    }

    /// Binding sets are cached. Structurally identical descriptors return the same set.
    ///
    /// The cache keeps every bound buffer and image alive. Call
    /// [`invalidate_binding_sets`](Self::invalidate_binding_sets) to let resources that are no
    /// longer used elsewhere be destroyed.
    pub fn create_binding_set(
        &self,
        desc: BindingSetDesc<B>,
    ) -> Result<BindingSet<B>, ResourceCreateError> {
        let inner = &self.0;
        inner
            .binding_sets
            .get_or_create(&desc, |desc| -> Result<_, ResourceCreateError> {
                let raw = unsafe { inner.backend.create_binding_set(desc)? };
                Ok(BindingSet::new(
                    inner.ids.create(),
                    desc.clone(),
                    raw,
                    inner.garbage.sender(),
                ))
            })
    }

    /// Graphics pipelines are cached. Structurally identical descriptors return the same
    /// pipeline.
    pub fn create_graphics_pipeline(
        &self,
        desc: GraphicsPipelineDesc<B>,
    ) -> Result<GraphicsPipeline<B>, ResourceCreateError> {
        let inner = &self.0;
        inner
            .graphics_pipelines
            .get_or_create(&desc, |desc| -> Result<_, ResourceCreateError> {
                let raw = unsafe { inner.backend.create_graphics_pipeline(desc)? };
                Ok(GraphicsPipeline::new(
                    inner.ids.create(),
                    desc.clone(),
                    raw,
                    inner.garbage.sender(),
                ))
            })
    }

    /// Compute pipelines are cached. Structurally identical descriptors return the same
    /// pipeline.
    pub fn create_compute_pipeline(
        &self,
        desc: ComputePipelineDesc<B>,
    ) -> Result<ComputePipeline<B>, ResourceCreateError> {
        let inner = &self.0;
        inner
            .compute_pipelines
            .get_or_create(&desc, |desc| -> Result<_, ResourceCreateError> {
                let raw = unsafe { inner.backend.create_compute_pipeline(desc)? };
                Ok(ComputePipeline::new(
                    inner.ids.create(),
                    desc.clone(),
                    raw,
                    inner.garbage.sender(),
                ))
            })
    }

    pub fn create_descriptor_table(
        &self,
        layout: &BindingLayout<B>,
    ) -> Result<DescriptorTable<B>, ResourceCreateError> {
        let capacity = self.0.config.descriptor_table_capacity;
        let raw = unsafe { self.0.backend.create_descriptor_table(layout, capacity)? };
        Ok(DescriptorTable::new(
            self.0.backend.clone(),
            layout.clone(),
            raw,
            capacity,
            self.0.garbage.sender(),
        ))
    }

    pub fn create_command_list(
        &self,
        queue: QueueType,
        debug_name: Option<&str>,
    ) -> CommandList<B> {
        CommandList::new(self.clone(), queue, debug_name.map(str::to_owned))
    }

    /// Submits closed command lists to `queue` as one batch. Returns the submission id.
    ///
    /// Lists that aren't closed are a programming error; debug builds assert, release builds
    /// skip them.
    pub fn submit(
        &self,
        queue: QueueType,
        lists: &mut [&mut CommandList<B>],
    ) -> Result<u64, QueueError> {
        puffin::profile_function!();

        let mut buffers = Vec::with_capacity(lists.len());
        for list in lists.iter_mut() {
            debug_assert_eq!(list.queue(), queue);
            match list.take_for_submission() {
                Some(cb) => buffers.push(cb),
                None => log::error!(
                    "command list `{}` is not closed and was not submitted",
                    list.debug_name()
                ),
            }
        }

        self.queue(queue).submit(buffers)
    }

    #[inline(always)]
    pub fn poll_command_list(&self, queue: QueueType, id: u64) -> bool {
        self.queue(queue).poll(id)
    }

    #[inline(always)]
    pub fn wait_command_list(&self, queue: QueueType, id: u64, timeout: Option<Duration>) -> bool {
        self.queue(queue).wait(id, timeout)
    }

    /// Makes the next submission on `wait_queue` wait until `execution_queue` has finished
    /// submission `id`.
    pub fn queue_wait_for_submission(
        &self,
        wait_queue: QueueType,
        execution_queue: QueueType,
        id: u64,
    ) {
        if wait_queue == execution_queue {
            return;
        }

        self.queue(wait_queue).add_wait(QueueWait {
            queue: execution_queue,
            submission_id: id,
        });
    }

    /// Retires completed command buffers on every queue, then destroys objects that are no
    /// longer referenced. Must run at least once per frame. Returns how many command buffers
    /// were retired.
    pub fn retire(&self) -> usize {
        puffin::profile_function!();

        let retired: usize = self.0.queues.iter().map(|queue| queue.retire()).sum();
        self.collect_garbage();
        retired
    }

    /// Blocks until every queue is idle, then cleans up.
    pub fn wait_idle(&self) {
        for queue in &self.0.queues {
            queue.wait_idle();
        }
        self.collect_garbage();
    }

    /// Drops every cached pipeline. Called when shader modules have been replaced.
    pub fn invalidate_pipelines(&self) {
        let graphics = self.0.graphics_pipelines.invalidate_all();
        let compute = self.0.compute_pipelines.invalidate_all();
        log::info!("invalidated {graphics} graphics and {compute} compute pipelines");
    }

    /// Drops every cached binding set. Sets still held by callers stay valid.
    pub fn invalidate_binding_sets(&self) {
        let sets = self.0.binding_sets.invalidate_all();
        log::debug!("invalidated {sets} binding sets");
    }

    #[inline(always)]
    pub fn graphics_pipelines(&self) -> &ObjectCache<GraphicsPipelineDesc<B>, GraphicsPipeline<B>> {
        &self.0.graphics_pipelines
    }

    #[inline(always)]
    pub fn compute_pipelines(&self) -> &ObjectCache<ComputePipelineDesc<B>, ComputePipeline<B>> {
        &self.0.compute_pipelines
    }

    #[inline(always)]
    pub fn binding_layouts(&self) -> &ObjectCache<BindingLayoutDesc, BindingLayout<B>> {
        &self.0.binding_layouts
    }

    #[inline(always)]
    pub fn binding_sets(&self) -> &ObjectCache<BindingSetDesc<B>, BindingSet<B>> {
        &self.0.binding_sets
    }

    /// Objects dropped but not yet destroyed.
    #[inline(always)]
    pub fn pending_garbage(&self) -> usize {
        self.0.garbage.pending()
    }

    fn collect_garbage(&self) -> usize {
        self.0.collect_garbage()
    }
}

impl<B: Backend> ContextInner<B> {
    fn collect_garbage(&self) -> usize {
        let current =
            TimelineValues(QueueType::ALL.map(|ty| self.queues[ty.index()].last_completed_id()));
        let target =
            TimelineValues(QueueType::ALL.map(|ty| self.queues[ty.index()].last_submitted_id()));
        unsafe { self.garbage.cleanup(&self.backend, &self.ids, current, target) }
    }
}

impl<B: Backend> Drop for ContextInner<B> {
    fn drop(&mut self) {
        for queue in &self.queues {
            queue.wait_idle();
        }

        self.graphics_pipelines.invalidate_all();
        self.compute_pipelines.invalidate_all();
        self.binding_sets.invalidate_all();
        self.binding_layouts.invalidate_all();
        self.collect_garbage();

        let leftover = self.garbage.pending();
        if leftover > 0 {
            log::warn!("{leftover} GPU objects were still pending destruction at shutdown");
        }

        let live = self.ids.live();
        if live > 0 {
            log::debug!("{live} GPU objects outlive the render context and will be leaked");
        }

        for queue in &self.queues {
            unsafe {
                queue.release();
            }
        }
    }
}
