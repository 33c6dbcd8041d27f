//! The backend-agnostic core of the render hardware interface: resource state tracking, barrier
//! generation, command buffer pooling and submission, and object caching.
//!
//! To start, pick a [`Backend`] and create a [`RenderContext`](struct@context::RenderContext).
//! Record work with a [`CommandList`](command_list::CommandList), which asks its
//! [`ResourceStateTracker`](tracker::ResourceStateTracker) for the barriers every operation
//! needs.

mod handle;

pub mod barrier;
pub mod binding;
pub mod cache;
pub mod command_list;
pub mod commands;
pub mod config;
pub mod context;
pub mod descriptor_table;
pub mod frame;
pub mod garbage;
pub mod id_gen;
pub mod pipeline;
pub mod queue;
pub mod resource;
pub mod subresource;
pub mod tracker;
pub mod types;

use std::time::Duration;

use barrier::Barrier;
use binding::{BindingLayout, BindingLayoutDesc, BindingResource, BindingSetDesc};
use commands::{
    BufferImageCopy, ComputeState, CopyBufferToBuffer, CopyImageToImage, DrawArguments,
    GraphicsState, RenderPassDesc,
};
use pipeline::{ComputePipelineDesc, GraphicsPipelineDesc, ShaderDesc};
use queue::QueueWait;
use resource::{Buffer, BufferDesc, Image, ImageDesc};
use subresource::SubresourceRange;
use thiserror::Error;
use types::{ClearColor, QueueType};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("device lost")]
    DeviceLost,
    #[error("an error has occured: {0}")]
    Other(String),
}

impl BackendError {
    /// Fatal errors leave the device in a state that can't be recovered from.
    #[inline(always)]
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::DeviceLost)
    }
}

/// The seam between the tracking/submission core and a graphics API.
///
/// Every method is `unsafe`. Callers guarantee that:
/// - nothing is destroyed while in-flight GPU work may still reference it,
/// - command buffers are only recorded between `begin_command_buffer` and
///   `end_command_buffer`, and are only reset or freed once their work has completed,
/// - timeline values passed to `submit` are strictly increasing per queue.
#[allow(clippy::missing_safety_doc)]
pub trait Backend: Sized + Send + Sync + 'static {
    type Buffer: Send + Sync;
    type Image: Send + Sync;
    type Shader: Send + Sync;
    type GraphicsPipeline: Send + Sync;
    type ComputePipeline: Send + Sync;
    type BindingLayout: Send + Sync;
    type BindingSet: Send + Sync;
    type DescriptorTable: Send + Sync;
    type CommandBuffer: Send + Sync;

    unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<Self::Buffer, BackendError>;
    unsafe fn destroy_buffer(&self, buffer: Self::Buffer);

    unsafe fn create_image(&self, desc: &ImageDesc) -> Result<Self::Image, BackendError>;
    unsafe fn destroy_image(&self, image: Self::Image);

    unsafe fn create_shader(
        &self,
        desc: &ShaderDesc,
        code: &[u32],
    ) -> Result<Self::Shader, BackendError>;
    unsafe fn destroy_shader(&self, shader: Self::Shader);

    unsafe fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<Self>,
    ) -> Result<Self::GraphicsPipeline, BackendError>;
    unsafe fn destroy_graphics_pipeline(&self, pipeline: Self::GraphicsPipeline);

    unsafe fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<Self>,
    ) -> Result<Self::ComputePipeline, BackendError>;
    unsafe fn destroy_compute_pipeline(&self, pipeline: Self::ComputePipeline);

    unsafe fn create_binding_layout(
        &self,
        desc: &BindingLayoutDesc,
    ) -> Result<Self::BindingLayout, BackendError>;
    unsafe fn destroy_binding_layout(&self, layout: Self::BindingLayout);

    unsafe fn create_binding_set(
        &self,
        desc: &BindingSetDesc<Self>,
    ) -> Result<Self::BindingSet, BackendError>;
    unsafe fn destroy_binding_set(&self, set: Self::BindingSet);

    unsafe fn create_descriptor_table(
        &self,
        layout: &BindingLayout<Self>,
        capacity: u32,
    ) -> Result<Self::DescriptorTable, BackendError>;
    unsafe fn resize_descriptor_table(
        &self,
        table: &mut Self::DescriptorTable,
        capacity: u32,
        keep_contents: bool,
    ) -> Result<(), BackendError>;
    /// `None` clears the entry.
    unsafe fn write_descriptor_table(
        &self,
        table: &mut Self::DescriptorTable,
        index: u32,
        resource: Option<&BindingResource<Self>>,
    );
    unsafe fn destroy_descriptor_table(&self, table: Self::DescriptorTable);

    unsafe fn allocate_command_buffer(
        &self,
        queue: QueueType,
    ) -> Result<Self::CommandBuffer, BackendError>;
    unsafe fn free_command_buffer(&self, queue: QueueType, cb: Self::CommandBuffer);
    unsafe fn begin_command_buffer(
        &self,
        cb: &mut Self::CommandBuffer,
        debug_name: Option<&str>,
    ) -> Result<(), BackendError>;
    unsafe fn end_command_buffer(&self, cb: &mut Self::CommandBuffer) -> Result<(), BackendError>;
    unsafe fn reset_command_buffer(&self, cb: &mut Self::CommandBuffer);

    /// Records a batch of barriers as a single synchronization command.
    unsafe fn cmd_barriers(&self, cb: &mut Self::CommandBuffer, barriers: &[Barrier<Self>]);
    unsafe fn cmd_copy_buffer(&self, cb: &mut Self::CommandBuffer, copy: &CopyBufferToBuffer<Self>);
    unsafe fn cmd_copy_image(&self, cb: &mut Self::CommandBuffer, copy: &CopyImageToImage<Self>);
    unsafe fn cmd_copy_buffer_to_image(
        &self,
        cb: &mut Self::CommandBuffer,
        buffer: &Buffer<Self>,
        image: &Image<Self>,
        copy: &BufferImageCopy,
    );
    unsafe fn cmd_write_buffer(
        &self,
        cb: &mut Self::CommandBuffer,
        buffer: &Buffer<Self>,
        offset: u64,
        data: &[u8],
    );
    unsafe fn cmd_clear_image(
        &self,
        cb: &mut Self::CommandBuffer,
        image: &Image<Self>,
        range: SubresourceRange,
        color: ClearColor,
    );
    unsafe fn cmd_begin_render_pass(&self, cb: &mut Self::CommandBuffer, desc: &RenderPassDesc<Self>);
    unsafe fn cmd_end_render_pass(&self, cb: &mut Self::CommandBuffer);
    unsafe fn cmd_draw(
        &self,
        cb: &mut Self::CommandBuffer,
        state: &GraphicsState<Self>,
        args: &DrawArguments,
    );
    unsafe fn cmd_dispatch(
        &self,
        cb: &mut Self::CommandBuffer,
        state: &ComputeState<Self>,
        groups: (u32, u32, u32),
    );

    /// Submits command buffers. Once they've all completed, the queue's timeline must reach
    /// `signal_value`. Execution must not begin until every wait has been reached.
    unsafe fn submit(
        &self,
        queue: QueueType,
        command_buffers: &[&Self::CommandBuffer],
        signal_value: u64,
        waits: &[QueueWait],
    ) -> Result<(), BackendError>;
    /// The value the queue's timeline has reached.
    unsafe fn completed_value(&self, queue: QueueType) -> u64;
    /// Blocks until the queue's timeline reaches `value`. Returns `false` on timeout.
    unsafe fn wait_for_value(&self, queue: QueueType, value: u64, timeout: Option<Duration>)
        -> bool;
}

#[cfg(test)]
mod tests;
