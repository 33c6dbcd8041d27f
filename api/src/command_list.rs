use crate::{
    barrier::PendingBarrierBatch,
    binding::{BindingResource, BindingSet},
    commands::*,
    context::RenderContext,
    queue::{QueueError, TrackedCommandBuffer},
    resource::{Buffer, Image},
    subresource::SubresourceRange,
    tracker::{ResourceStateTracker, TrackingDiagnostic},
    types::{AccessState, ClearColor, QueueType},
    Backend,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandListState {
    Idle,
    Recording,
    Closed,
}

/// The recording surface.
///
/// Every operation that touches a resource first requires the state it needs from the
/// tracker, then commits pending barriers before recording. A command list is recorded by one
/// thread at a time. Nothing stops two lists from recording conflicting accesses to the same
/// resource; that coordination is up to the caller.
pub struct CommandList<B: Backend> {
    ctx: RenderContext<B>,
    queue: QueueType,
    debug_name: Option<String>,
    state: CommandListState,
    cb: Option<TrackedCommandBuffer<B>>,
    tracker: ResourceStateTracker<B>,
    barriers: PendingBarrierBatch<B>,
    in_render_pass: bool,
}

impl<B: Backend> CommandList<B> {
    pub(crate) fn new(ctx: RenderContext<B>, queue: QueueType, debug_name: Option<String>) -> Self {
        let tracker = ResourceStateTracker::new(ctx.config().uav_barriers_enabled_by_default);
        Self {
            ctx,
            queue,
            debug_name,
            state: CommandListState::Idle,
            cb: None,
            tracker,
            barriers: PendingBarrierBatch::default(),
            in_render_pass: false,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> CommandListState {
        self.state
    }

    #[inline(always)]
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    #[inline(always)]
    pub fn debug_name(&self) -> &str {
        self.debug_name.as_deref().unwrap_or("unnamed")
    }

    #[inline(always)]
    pub fn tracker(&self) -> &ResourceStateTracker<B> {
        &self.tracker
    }

    /// Barriers required but not yet committed.
    #[inline(always)]
    pub fn pending_barriers(&self) -> &PendingBarrierBatch<B> {
        &self.barriers
    }

    /// The command buffer being recorded, if any.
    #[inline(always)]
    pub fn command_buffer(&self) -> Option<&TrackedCommandBuffer<B>> {
        self.cb.as_ref()
    }

    #[inline(always)]
    pub fn drain_diagnostics(&mut self) -> Vec<TrackingDiagnostic> {
        self.tracker.drain_diagnostics()
    }

    /// Checks out a command buffer from the queue and begins recording.
    pub fn open(&mut self) -> Result<(), QueueError> {
        debug_assert_ne!(
            self.state,
            CommandListState::Recording,
            "command list `{}` is already open",
            self.debug_name()
        );
        if self.state == CommandListState::Recording {
            return Ok(());
        }

        // Closed but never submitted. Throw the old recording away.
        if let Some(cb) = self.cb.take() {
            self.ctx.queue(self.queue).recycle(cb);
        }

        let mut cb = self.ctx.queue(self.queue).acquire()?;
        let began = unsafe {
            self.ctx
                .backend()
                .begin_command_buffer(cb.raw_mut(), self.debug_name.as_deref())
        };
        if let Err(err) = began {
            self.ctx.queue(self.queue).recycle(cb);
            return Err(err.into());
        }

        self.tracker.drain_diagnostics();
        self.barriers.clear();
        self.in_render_pass = false;
        self.cb = Some(cb);
        self.state = CommandListState::Recording;
        Ok(())
    }

    /// Restores keep-initial-state resources, commits remaining barriers, ends the tracking
    /// session and finishes recording.
    pub fn close(&mut self) -> Result<(), QueueError> {
        if !self.is_recording("close") {
            return Ok(());
        }

        if self.in_render_pass {
            log::warn!(
                "command list `{}` closed inside a render pass",
                self.debug_name()
            );
            self.end_render_pass();
        }

        self.tracker.keep_initial_states(&mut self.barriers);
        self.commit_barriers();
        self.tracker.command_list_submitted();

        let ended = match self.cb.as_mut() {
            Some(cb) => unsafe { self.ctx.backend().end_command_buffer(cb.raw_mut()) },
            None => Ok(()),
        };

        if let Err(err) = ended {
            if let Some(cb) = self.cb.take() {
                self.ctx.queue(self.queue).recycle(cb);
            }
            self.state = CommandListState::Idle;
            return Err(err.into());
        }

        self.state = CommandListState::Closed;
        Ok(())
    }

    /// Takes the recorded command buffer for submission. `None` if the list isn't closed.
    pub(crate) fn take_for_submission(&mut self) -> Option<TrackedCommandBuffer<B>> {
        debug_assert_eq!(
            self.state,
            CommandListState::Closed,
            "command list `{}` submitted without being closed",
            self.debug_name()
        );
        if self.state != CommandListState::Closed {
            return None;
        }

        self.state = CommandListState::Idle;
        self.cb.take()
    }

    pub fn begin_tracking_image(
        &mut self,
        image: &Image<B>,
        range: SubresourceRange,
        state: AccessState,
    ) {
        self.tracker.begin_tracking_image(image, range, state);
    }

    pub fn begin_tracking_buffer(&mut self, buffer: &Buffer<B>, state: AccessState) {
        self.tracker.begin_tracking_buffer(buffer, state);
    }

    pub fn set_permanent_image_state(&mut self, image: &Image<B>, state: AccessState) {
        if !self.is_recording("set_permanent_image_state") {
            return;
        }
        if let Some(cb) = self.cb.as_mut() {
            cb.reference(image);
        }
        self.tracker
            .set_permanent_image_state(&mut self.barriers, image, state);
    }

    pub fn set_permanent_buffer_state(&mut self, buffer: &Buffer<B>, state: AccessState) {
        if !self.is_recording("set_permanent_buffer_state") {
            return;
        }
        if let Some(cb) = self.cb.as_mut() {
            cb.reference(buffer);
        }
        self.tracker
            .set_permanent_buffer_state(&mut self.barriers, buffer, state);
    }

    pub fn set_enable_uav_barriers_for_image(&mut self, image: &Image<B>, enabled: bool) {
        self.tracker.set_enable_uav_barriers_for_image(image, enabled);
    }

    pub fn set_enable_uav_barriers_for_buffer(&mut self, buffer: &Buffer<B>, enabled: bool) {
        self.tracker
            .set_enable_uav_barriers_for_buffer(buffer, enabled);
    }

    #[inline(always)]
    pub fn image_subresource_state(&self, image: &Image<B>, mip: u32, layer: u32) -> AccessState {
        self.tracker.image_subresource_state(image, mip, layer)
    }

    #[inline(always)]
    pub fn buffer_state(&self, buffer: &Buffer<B>) -> AccessState {
        self.tracker.buffer_state(buffer)
    }

    /// Requires `access` on a range of an image. Barriers are accumulated until the next
    /// commit.
    pub fn require_image_access(
        &mut self,
        image: &Image<B>,
        range: SubresourceRange,
        access: AccessState,
    ) {
        if !self.is_recording("require_image_access") {
            return;
        }

        if let Some(cb) = self.cb.as_mut() {
            cb.reference(image);
        }
        self.tracker
            .require_image(&mut self.barriers, image, range, access);
    }

    /// Requires `access` on a buffer. Barriers are accumulated until the next commit.
    pub fn require_buffer_access(&mut self, buffer: &Buffer<B>, access: AccessState) {
        if !self.is_recording("require_buffer_access") {
            return;
        }

        if let Some(cb) = self.cb.as_mut() {
            cb.reference(buffer);
        }
        self.tracker
            .require_buffer(&mut self.barriers, buffer, access);
    }

    /// Requires the state every resource in the set is accessed with.
    pub fn set_resource_states_for_binding_set(&mut self, set: &BindingSet<B>) {
        if !self.is_recording("set_resource_states_for_binding_set") {
            return;
        }

        if let Some(cb) = self.cb.as_mut() {
            cb.reference(set);
        }

        for item in &set.desc().items {
            let access = item.resource.required_access();
            match &item.resource {
                BindingResource::ConstantBuffer(buffer)
                | BindingResource::StorageBuffer { buffer, .. } => {
                    self.require_buffer_access(buffer, access);
                }
                BindingResource::SampledImage {
                    image,
                    subresources,
                }
                | BindingResource::StorageImage {
                    image,
                    subresources,
                } => {
                    self.require_image_access(image, *subresources, access);
                }
            }
        }
    }

    /// Records every pending barrier as a single synchronization command.
    pub fn commit_barriers(&mut self) {
        if self.barriers.is_empty() {
            return;
        }

        puffin::profile_function!();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_barriers(cb.raw_mut(), self.barriers.barriers());
            }
        }
        self.barriers.clear();
    }

    pub fn copy_buffer(&mut self, copy: &CopyBufferToBuffer<B>) {
        if !self.is_recording("copy_buffer") {
            return;
        }

        debug_assert!(copy.src_offset + copy.len <= copy.src.size());
        debug_assert!(copy.dst_offset + copy.len <= copy.dst.size());

        self.require_buffer_access(copy.src, AccessState::TRANSFER_READ);
        self.require_buffer_access(copy.dst, AccessState::TRANSFER_WRITE);
        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_copy_buffer(cb.raw_mut(), copy);
            }
        }
    }

    pub fn copy_image(&mut self, copy: &CopyImageToImage<B>) {
        if !self.is_recording("copy_image") {
            return;
        }

        self.require_image_access(
            copy.src,
            SubresourceRange::single(copy.src_mip_level, copy.src_array_layer),
            AccessState::TRANSFER_READ,
        );
        self.require_image_access(
            copy.dst,
            SubresourceRange::single(copy.dst_mip_level, copy.dst_array_layer),
            AccessState::TRANSFER_WRITE,
        );
        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_copy_image(cb.raw_mut(), copy);
            }
        }
    }

    pub fn copy_buffer_to_image(
        &mut self,
        buffer: &Buffer<B>,
        image: &Image<B>,
        copy: &BufferImageCopy,
    ) {
        if !self.is_recording("copy_buffer_to_image") {
            return;
        }

        self.require_buffer_access(buffer, AccessState::TRANSFER_READ);
        self.require_image_access(
            image,
            SubresourceRange::single(copy.mip_level, copy.array_layer),
            AccessState::TRANSFER_WRITE,
        );
        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_copy_buffer_to_image(cb.raw_mut(), buffer, image, copy);
            }
        }
    }

    /// Uploads `data` into the buffer inline with the command stream.
    pub fn write_buffer(&mut self, buffer: &Buffer<B>, offset: u64, data: &[u8]) {
        if !self.is_recording("write_buffer") {
            return;
        }

        debug_assert!(offset + data.len() as u64 <= buffer.size());

        self.require_buffer_access(buffer, AccessState::TRANSFER_WRITE);
        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_write_buffer(cb.raw_mut(), buffer, offset, data);
            }
        }
    }

    pub fn clear_image(&mut self, image: &Image<B>, range: SubresourceRange, color: ClearColor) {
        if !self.is_recording("clear_image") {
            return;
        }

        self.require_image_access(image, range, AccessState::TRANSFER_WRITE);
        self.commit_barriers();

        let range = range.resolve(image.mip_levels(), image.array_layers());
        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_clear_image(cb.raw_mut(), image, range, color);
            }
        }
    }

    pub fn begin_render_pass(&mut self, desc: &RenderPassDesc<B>) {
        if !self.is_recording("begin_render_pass") {
            return;
        }

        debug_assert_eq!(self.queue, QueueType::Main);
        debug_assert!(!self.in_render_pass, "render passes can't be nested");

        for attachment in &desc.color_attachments {
            self.require_image_access(
                attachment.image,
                SubresourceRange::single(attachment.mip_level, attachment.array_layer),
                AccessState::COLOR_ATTACHMENT_WRITE,
            );
        }

        if let Some(attachment) = &desc.depth_stencil_attachment {
            let access = if attachment.read_only {
                AccessState::DEPTH_STENCIL_READ
            } else {
                AccessState::DEPTH_STENCIL_WRITE
            };
            self.require_image_access(
                attachment.image,
                SubresourceRange::single(attachment.mip_level, attachment.array_layer),
                access,
            );
        }

        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_begin_render_pass(cb.raw_mut(), desc);
            }
        }
        self.in_render_pass = true;
    }

    pub fn end_render_pass(&mut self) {
        if !self.is_recording("end_render_pass") || !self.in_render_pass {
            return;
        }

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            unsafe {
                backend.cmd_end_render_pass(cb.raw_mut());
            }
        }
        self.in_render_pass = false;
    }

    /// Records a draw. Must be inside a render pass. Resources read by the draw should be
    /// transitioned before the render pass begins when the backend can't place barriers
    /// inside one.
    pub fn draw(&mut self, state: &GraphicsState<B>, args: DrawArguments) {
        if !self.is_recording("draw") {
            return;
        }

        debug_assert!(self.in_render_pass, "draws must be inside a render pass");

        for set in state.bindings {
            self.set_resource_states_for_binding_set(set);
        }

        for bind in state.vertex_buffers {
            self.require_buffer_access(bind.buffer, AccessState::VERTEX_BUFFER);
        }

        if let Some(bind) = &state.index_buffer {
            self.require_buffer_access(bind.buffer, AccessState::INDEX_BUFFER);
        }

        if let DrawArguments::Indirect { .. } = args {
            debug_assert!(state.indirect_buffer.is_some());
        }
        if let Some(buffer) = state.indirect_buffer {
            self.require_buffer_access(buffer, AccessState::INDIRECT_ARGUMENT);
        }

        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            cb.reference(state.pipeline);
            unsafe {
                backend.cmd_draw(cb.raw_mut(), state, &args);
            }
        }
    }

    pub fn dispatch(&mut self, state: &ComputeState<B>, x: u32, y: u32, z: u32) {
        if !self.is_recording("dispatch") {
            return;
        }

        debug_assert_ne!(self.queue, QueueType::Transfer);

        for set in state.bindings {
            self.set_resource_states_for_binding_set(set);
        }

        self.commit_barriers();

        let backend = self.ctx.backend();
        if let Some(cb) = self.cb.as_mut() {
            cb.reference(state.pipeline);
            unsafe {
                backend.cmd_dispatch(cb.raw_mut(), state, (x, y, z));
            }
        }
    }

    #[inline(always)]
    fn is_recording(&self, op: &str) -> bool {
        debug_assert_eq!(
            self.state,
            CommandListState::Recording,
            "`{op}` called on command list `{}` while it isn't recording",
            self.debug_name()
        );
        self.state == CommandListState::Recording
    }
}

impl<B: Backend> Drop for CommandList<B> {
    fn drop(&mut self) {
        if let Some(cb) = self.cb.take() {
            self.ctx.queue(self.queue).recycle(cb);
        }
    }
}
