mod command_list;
mod queue;

use crate::{
    backend::{HeadlessBackend, HeadlessConfig, RecordedCommand},
    prelude::*,
};

fn context() -> RenderContext {
    RenderContext::new(HeadlessBackend::default(), RenderConfig::default())
}

/// Work only completes when the test signals it.
fn manual_context() -> RenderContext {
    context_with(
        HeadlessConfig {
            auto_complete: false,
            command_buffer_limit: None,
        },
        RenderConfig::default(),
    )
}

fn context_with(backend: HeadlessConfig, config: RenderConfig) -> RenderContext {
    RenderContext::new(HeadlessBackend::new(backend), config)
}

fn buffer(ctx: &RenderContext, name: &str) -> Buffer {
    ctx.create_buffer(BufferDesc {
        size: 256,
        buffer_usage: BufferUsage::TRANSFER_SRC
            | BufferUsage::TRANSFER_DST
            | BufferUsage::STORAGE_BUFFER
            | BufferUsage::VERTEX_BUFFER,
        memory_usage: MemoryUsage::GpuOnly,
        initial_state: AccessState::UNKNOWN,
        keep_initial_state: false,
        debug_name: Some(String::from(name)),
    })
    .unwrap()
}

fn keep_initial_buffer(ctx: &RenderContext, name: &str, initial_state: AccessState) -> Buffer {
    ctx.create_buffer(BufferDesc {
        size: 256,
        buffer_usage: BufferUsage::TRANSFER_DST | BufferUsage::UNIFORM_BUFFER,
        memory_usage: MemoryUsage::GpuOnly,
        initial_state,
        keep_initial_state: true,
        debug_name: Some(String::from(name)),
    })
    .unwrap()
}

fn image(ctx: &RenderContext, name: &str, mip_levels: u32, array_layers: u32) -> Image {
    ctx.create_image(ImageDesc {
        format: Format::Rgba8Unorm,
        extent: Extent3D::new(64, 64, 1),
        mip_levels,
        array_layers,
        image_usage: ImageUsage::TRANSFER_DST
            | ImageUsage::SAMPLED
            | ImageUsage::STORAGE
            | ImageUsage::COLOR_ATTACHMENT,
        memory_usage: MemoryUsage::GpuOnly,
        initial_state: AccessState::UNKNOWN,
        keep_initial_state: false,
        debug_name: Some(String::from(name)),
    })
    .unwrap()
}

fn keep_initial_image(ctx: &RenderContext, name: &str, initial_state: AccessState) -> Image {
    ctx.create_image(ImageDesc {
        format: Format::Rgba8Unorm,
        extent: Extent3D::new(64, 64, 1),
        mip_levels: 1,
        array_layers: 1,
        image_usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
        memory_usage: MemoryUsage::GpuOnly,
        initial_state,
        keep_initial_state: true,
        debug_name: Some(String::from(name)),
    })
    .unwrap()
}

/// Opens, records and closes a list that writes to `buffer`.
fn recorded_list(ctx: &RenderContext, queue: QueueType, buffer: &Buffer) -> CommandList {
    let mut list = ctx.create_command_list(queue, None);
    list.open().unwrap();
    list.begin_tracking_buffer(buffer, AccessState::COMMON);
    list.write_buffer(buffer, 0, &[1, 2, 3, 4]);
    list.close().unwrap();
    list
}

/// Commands of every submission made to the queue, flattened.
fn submitted_commands(ctx: &RenderContext, queue: QueueType) -> Vec<RecordedCommand> {
    ctx.backend()
        .submissions(queue)
        .into_iter()
        .flat_map(|submission| submission.commands)
        .collect()
}
