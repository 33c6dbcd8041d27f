//! A backend that records everything it's asked to do instead of talking to a GPU.
//!
//! Every object is an integer handle. Queue timelines are plain counters that either complete
//! work immediately or wait for the owner to call [`HeadlessBackend::signal`], which makes it
//! possible to test in-flight behavior deterministically.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use api::{
    barrier::{Barrier, BarrierResource, Granularity},
    binding::{BindingLayout, BindingLayoutDesc, BindingResource, BindingSetDesc},
    commands::{
        BufferImageCopy, ComputeState, CopyBufferToBuffer, CopyImageToImage, DrawArguments,
        GraphicsState, RenderPassDesc,
    },
    pipeline::{ComputePipelineDesc, GraphicsPipelineDesc, ShaderDesc},
    queue::QueueWait,
    resource::{Buffer, BufferDesc, Image, ImageDesc},
    subresource::SubresourceRange,
    types::{AccessState, ClearColor, QueueType},
    Backend, BackendError,
};
use crossbeam_utils::sync::ShardedLock;
use rustc_hash::FxHashMap;

#[derive(Debug, Copy, Clone)]
pub struct HeadlessConfig {
    /// Submissions complete as soon as they're made.
    pub auto_complete: bool,
    /// Maximum number of command buffers that can be allocated per queue at once.
    pub command_buffer_limit: Option<usize>,
}

pub struct HeadlessBackend {
    config: HeadlessConfig,
    next_handle: AtomicU64,
    live_objects: AtomicUsize,
    fail_next_submit: AtomicBool,
    timelines: [Timeline; QueueType::COUNT],
    allocated: [AtomicUsize; QueueType::COUNT],
    submissions: ShardedLock<[Vec<Submission>; QueueType::COUNT]>,
}

struct Timeline {
    completed: Mutex<u64>,
    cond: Condvar,
    submitted: AtomicU64,
}

/// Handle to a headless object.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

#[derive(Debug)]
pub struct HeadlessDescriptorTable {
    handle: u64,
    capacity: u32,
    /// Handle of the resource written to each entry.
    entries: FxHashMap<u32, u64>,
    resizes: Vec<u32>,
}

#[derive(Debug)]
pub struct HeadlessCommandBuffer {
    handle: u64,
    queue: QueueType,
    recording: bool,
    debug_name: Option<String>,
    commands: Vec<RecordedCommand>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordedBarrier {
    /// Handle of the buffer or image.
    pub resource: u64,
    pub granularity: Granularity,
    pub before: AccessState,
    pub after: AccessState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    Barriers(Vec<RecordedBarrier>),
    CopyBuffer {
        src: u64,
        dst: u64,
        len: u64,
    },
    CopyImage {
        src: u64,
        dst: u64,
    },
    CopyBufferToImage {
        buffer: u64,
        image: u64,
    },
    WriteBuffer {
        buffer: u64,
        offset: u64,
        len: usize,
    },
    ClearImage {
        image: u64,
        range: SubresourceRange,
    },
    BeginRenderPass {
        color_attachments: Vec<u64>,
        depth_stencil_attachment: Option<u64>,
    },
    EndRenderPass,
    Draw(DrawArguments),
    Dispatch(u32, u32, u32),
}

/// A batch of command buffers handed to a queue.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Timeline value signaled on completion.
    pub value: u64,
    pub waits: Vec<QueueWait>,
    pub command_buffers: Vec<u64>,
    /// Every command recorded in the batch, in submission order.
    pub commands: Vec<RecordedCommand>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_complete: true,
            command_buffer_limit: None,
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl RawHandle {
    #[inline(always)]
    pub fn handle(&self) -> u64 {
        self.0
    }
}

impl HeadlessDescriptorTable {
    #[inline(always)]
    pub fn handle(&self) -> u64 {
        self.handle
    }

    #[inline(always)]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Handle of the resource in the given entry.
    #[inline(always)]
    pub fn entry(&self, index: u32) -> Option<u64> {
        self.entries.get(&index).copied()
    }

    /// Every capacity the table has been resized to, in order.
    #[inline(always)]
    pub fn resizes(&self) -> &[u32] {
        &self.resizes
    }
}

impl HeadlessCommandBuffer {
    #[inline(always)]
    pub fn handle(&self) -> u64 {
        self.handle
    }

    #[inline(always)]
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    #[inline(always)]
    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }

    /// Commands recorded since the buffer was last reset.
    #[inline(always)]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    #[inline(always)]
    fn record(&mut self, command: RecordedCommand) {
        debug_assert!(self.recording, "command recorded outside of begin/end");
        self.commands.push(command);
    }
}

impl Timeline {
    fn new() -> Self {
        Self {
            completed: Mutex::new(0),
            cond: Condvar::new(),
            submitted: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    fn lock(&self) -> MutexGuard<u64> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, value: u64) {
        let mut completed = self.lock();
        if value > *completed {
            *completed = value;
            self.cond.notify_all();
        }
    }
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(1),
            live_objects: AtomicUsize::new(0),
            fail_next_submit: AtomicBool::new(false),
            timelines: [Timeline::new(), Timeline::new(), Timeline::new()],
            allocated: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
            submissions: ShardedLock::new([Vec::new(), Vec::new(), Vec::new()]),
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Advances a queue's timeline to `value`. Going backwards is ignored.
    pub fn signal(&self, queue: QueueType, value: u64) {
        self.timelines[queue.index()].signal(value);
    }

    /// Completes everything submitted so far on every queue.
    pub fn complete_all(&self) {
        for timeline in &self.timelines {
            timeline.signal(timeline.submitted.load(Ordering::Acquire));
        }
    }

    /// The next call to `submit` fails with a non-fatal error.
    pub fn fail_next_submit(&self) {
        self.fail_next_submit.store(true, Ordering::Release);
    }

    /// Every successful submission made to `queue`, oldest first.
    pub fn submissions(&self, queue: QueueType) -> Vec<Submission> {
        self.submissions
            .read()
            .unwrap_or_else(PoisonError::into_inner)[queue.index()]
        .clone()
    }

    /// Objects created but not yet destroyed. Command buffers aren't counted.
    #[inline(always)]
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Acquire)
    }

    /// Command buffers currently allocated on `queue`.
    #[inline(always)]
    pub fn allocated_command_buffers(&self, queue: QueueType) -> usize {
        self.allocated[queue.index()].load(Ordering::Acquire)
    }

    #[inline(always)]
    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    #[inline(always)]
    fn create_object(&self) -> RawHandle {
        self.live_objects.fetch_add(1, Ordering::AcqRel);
        RawHandle(self.next_handle())
    }

    #[inline(always)]
    fn destroy_object(&self) {
        self.live_objects.fetch_sub(1, Ordering::AcqRel);
    }
}

#[inline(always)]
fn buffer_handle(buffer: &Buffer<HeadlessBackend>) -> u64 {
    buffer.internal().handle()
}

#[inline(always)]
fn image_handle(image: &Image<HeadlessBackend>) -> u64 {
    image.internal().handle()
}

fn binding_handle(resource: &BindingResource<HeadlessBackend>) -> u64 {
    match resource {
        BindingResource::ConstantBuffer(buffer) => buffer_handle(buffer),
        BindingResource::StorageBuffer { buffer, .. } => buffer_handle(buffer),
        BindingResource::SampledImage { image, .. } => image_handle(image),
        BindingResource::StorageImage { image, .. } => image_handle(image),
    }
}

impl Backend for HeadlessBackend {
    type Buffer = RawHandle;
    type Image = RawHandle;
    type Shader = RawHandle;
    type GraphicsPipeline = RawHandle;
    type ComputePipeline = RawHandle;
    type BindingLayout = RawHandle;
    type BindingSet = RawHandle;
    type DescriptorTable = HeadlessDescriptorTable;
    type CommandBuffer = HeadlessCommandBuffer;

    unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<Self::Buffer, BackendError> {
        log::trace!("creating buffer of {} bytes", desc.size);
        Ok(self.create_object())
    }

    unsafe fn destroy_buffer(&self, _buffer: Self::Buffer) {
        self.destroy_object();
    }

    unsafe fn create_image(&self, _desc: &ImageDesc) -> Result<Self::Image, BackendError> {
        Ok(self.create_object())
    }

    unsafe fn destroy_image(&self, _image: Self::Image) {
        self.destroy_object();
    }

    unsafe fn create_shader(
        &self,
        _desc: &ShaderDesc,
        code: &[u32],
    ) -> Result<Self::Shader, BackendError> {
        if code.is_empty() {
            return Err(BackendError::Other(String::from("empty shader module")));
        }
        Ok(self.create_object())
    }

    unsafe fn destroy_shader(&self, _shader: Self::Shader) {
        self.destroy_object();
    }

    unsafe fn create_graphics_pipeline(
        &self,
        _desc: &GraphicsPipelineDesc<Self>,
    ) -> Result<Self::GraphicsPipeline, BackendError> {
        Ok(self.create_object())
    }

    unsafe fn destroy_graphics_pipeline(&self, _pipeline: Self::GraphicsPipeline) {
        self.destroy_object();
    }

    unsafe fn create_compute_pipeline(
        &self,
        _desc: &ComputePipelineDesc<Self>,
    ) -> Result<Self::ComputePipeline, BackendError> {
        Ok(self.create_object())
    }

    unsafe fn destroy_compute_pipeline(&self, _pipeline: Self::ComputePipeline) {
        self.destroy_object();
    }

    unsafe fn create_binding_layout(
        &self,
        _desc: &BindingLayoutDesc,
    ) -> Result<Self::BindingLayout, BackendError> {
        Ok(self.create_object())
    }

    unsafe fn destroy_binding_layout(&self, _layout: Self::BindingLayout) {
        self.destroy_object();
    }

    unsafe fn create_binding_set(
        &self,
        _desc: &BindingSetDesc<Self>,
    ) -> Result<Self::BindingSet, BackendError> {
        Ok(self.create_object())
    }

    unsafe fn destroy_binding_set(&self, _set: Self::BindingSet) {
        self.destroy_object();
    }

    unsafe fn create_descriptor_table(
        &self,
        _layout: &BindingLayout<Self>,
        capacity: u32,
    ) -> Result<Self::DescriptorTable, BackendError> {
        let RawHandle(handle) = self.create_object();
        Ok(HeadlessDescriptorTable {
            handle,
            capacity,
            entries: FxHashMap::default(),
            resizes: Vec::default(),
        })
    }

    unsafe fn resize_descriptor_table(
        &self,
        table: &mut Self::DescriptorTable,
        capacity: u32,
        keep_contents: bool,
    ) -> Result<(), BackendError> {
        if !keep_contents {
            table.entries.clear();
        }
        table.entries.retain(|index, _| *index < capacity);
        table.capacity = capacity;
        table.resizes.push(capacity);
        Ok(())
    }

    unsafe fn write_descriptor_table(
        &self,
        table: &mut Self::DescriptorTable,
        index: u32,
        resource: Option<&BindingResource<Self>>,
    ) {
        debug_assert!(index < table.capacity);
        match resource {
            Some(resource) => {
                table.entries.insert(index, binding_handle(resource));
            }
            None => {
                table.entries.remove(&index);
            }
        }
    }

    unsafe fn destroy_descriptor_table(&self, _table: Self::DescriptorTable) {
        self.destroy_object();
    }

    unsafe fn allocate_command_buffer(
        &self,
        queue: QueueType,
    ) -> Result<Self::CommandBuffer, BackendError> {
        let allocated = &self.allocated[queue.index()];
        if let Some(limit) = self.config.command_buffer_limit {
            if allocated.load(Ordering::Acquire) >= limit {
                return Err(BackendError::OutOfMemory(format!(
                    "command buffer limit of {limit} reached"
                )));
            }
        }
        allocated.fetch_add(1, Ordering::AcqRel);

        Ok(HeadlessCommandBuffer {
            handle: self.next_handle(),
            queue,
            recording: false,
            debug_name: None,
            commands: Vec::default(),
        })
    }

    unsafe fn free_command_buffer(&self, queue: QueueType, cb: Self::CommandBuffer) {
        debug_assert_eq!(cb.queue, queue);
        self.allocated[queue.index()].fetch_sub(1, Ordering::AcqRel);
    }

    unsafe fn begin_command_buffer(
        &self,
        cb: &mut Self::CommandBuffer,
        debug_name: Option<&str>,
    ) -> Result<(), BackendError> {
        cb.recording = true;
        cb.debug_name = debug_name.map(str::to_owned);
        cb.commands.clear();
        Ok(())
    }

    unsafe fn end_command_buffer(&self, cb: &mut Self::CommandBuffer) -> Result<(), BackendError> {
        if !cb.recording {
            return Err(BackendError::Other(String::from(
                "command buffer ended without being started",
            )));
        }
        cb.recording = false;
        Ok(())
    }

    unsafe fn reset_command_buffer(&self, cb: &mut Self::CommandBuffer) {
        cb.recording = false;
        cb.debug_name = None;
        cb.commands.clear();
    }

    unsafe fn cmd_barriers(&self, cb: &mut Self::CommandBuffer, barriers: &[Barrier<Self>]) {
        let barriers = barriers
            .iter()
            .map(|barrier| RecordedBarrier {
                resource: match &barrier.resource {
                    BarrierResource::Buffer(buffer) => buffer_handle(buffer),
                    BarrierResource::Image(image) => image_handle(image),
                },
                granularity: barrier.granularity,
                before: barrier.state_before,
                after: barrier.state_after,
            })
            .collect();
        cb.record(RecordedCommand::Barriers(barriers));
    }

    unsafe fn cmd_copy_buffer(&self, cb: &mut Self::CommandBuffer, copy: &CopyBufferToBuffer<Self>) {
        cb.record(RecordedCommand::CopyBuffer {
            src: buffer_handle(copy.src),
            dst: buffer_handle(copy.dst),
            len: copy.len,
        });
    }

    unsafe fn cmd_copy_image(&self, cb: &mut Self::CommandBuffer, copy: &CopyImageToImage<Self>) {
        cb.record(RecordedCommand::CopyImage {
            src: image_handle(copy.src),
            dst: image_handle(copy.dst),
        });
    }

    unsafe fn cmd_copy_buffer_to_image(
        &self,
        cb: &mut Self::CommandBuffer,
        buffer: &Buffer<Self>,
        image: &Image<Self>,
        _copy: &BufferImageCopy,
    ) {
        cb.record(RecordedCommand::CopyBufferToImage {
            buffer: buffer_handle(buffer),
            image: image_handle(image),
        });
    }

    unsafe fn cmd_write_buffer(
        &self,
        cb: &mut Self::CommandBuffer,
        buffer: &Buffer<Self>,
        offset: u64,
        data: &[u8],
    ) {
        cb.record(RecordedCommand::WriteBuffer {
            buffer: buffer_handle(buffer),
            offset,
            len: data.len(),
        });
    }

    unsafe fn cmd_clear_image(
        &self,
        cb: &mut Self::CommandBuffer,
        image: &Image<Self>,
        range: SubresourceRange,
        _color: ClearColor,
    ) {
        cb.record(RecordedCommand::ClearImage {
            image: image_handle(image),
            range,
        });
    }

    unsafe fn cmd_begin_render_pass(&self, cb: &mut Self::CommandBuffer, desc: &RenderPassDesc<Self>) {
        cb.record(RecordedCommand::BeginRenderPass {
            color_attachments: desc
                .color_attachments
                .iter()
                .map(|attachment| image_handle(attachment.image))
                .collect(),
            depth_stencil_attachment: desc
                .depth_stencil_attachment
                .as_ref()
                .map(|attachment| image_handle(attachment.image)),
        });
    }

    unsafe fn cmd_end_render_pass(&self, cb: &mut Self::CommandBuffer) {
        cb.record(RecordedCommand::EndRenderPass);
    }

    unsafe fn cmd_draw(
        &self,
        cb: &mut Self::CommandBuffer,
        _state: &GraphicsState<Self>,
        args: &DrawArguments,
    ) {
        cb.record(RecordedCommand::Draw(*args));
    }

    unsafe fn cmd_dispatch(
        &self,
        cb: &mut Self::CommandBuffer,
        _state: &ComputeState<Self>,
        groups: (u32, u32, u32),
    ) {
        cb.record(RecordedCommand::Dispatch(groups.0, groups.1, groups.2));
    }

    unsafe fn submit(
        &self,
        queue: QueueType,
        command_buffers: &[&Self::CommandBuffer],
        signal_value: u64,
        waits: &[QueueWait],
    ) -> Result<(), BackendError> {
        if self.fail_next_submit.swap(false, Ordering::AcqRel) {
            return Err(BackendError::Other(String::from("injected submit failure")));
        }

        let timeline = &self.timelines[queue.index()];
        debug_assert!(signal_value > timeline.submitted.load(Ordering::Acquire));

        let submission = Submission {
            value: signal_value,
            waits: waits.to_vec(),
            command_buffers: command_buffers.iter().map(|cb| cb.handle).collect(),
            commands: command_buffers
                .iter()
                .flat_map(|cb| cb.commands.iter().cloned())
                .collect(),
        };
        self.submissions
            .write()
            .unwrap_or_else(PoisonError::into_inner)[queue.index()]
        .push(submission);

        timeline.submitted.store(signal_value, Ordering::Release);
        if self.config.auto_complete {
            timeline.signal(signal_value);
        }

        Ok(())
    }

    unsafe fn completed_value(&self, queue: QueueType) -> u64 {
        *self.timelines[queue.index()].lock()
    }

    unsafe fn wait_for_value(
        &self,
        queue: QueueType,
        value: u64,
        timeout: Option<Duration>,
    ) -> bool {
        let timeline = &self.timelines[queue.index()];
        let completed = timeline.lock();

        match timeout {
            Some(timeout) => {
                let (completed, _) = timeline
                    .cond
                    .wait_timeout_while(completed, timeout, |completed| *completed < value)
                    .unwrap_or_else(PoisonError::into_inner);
                *completed >= value
            }
            None => {
                let completed = timeline
                    .cond
                    .wait_while(completed, |completed| *completed < value)
                    .unwrap_or_else(PoisonError::into_inner);
                *completed >= value
            }
        }
    }
}
