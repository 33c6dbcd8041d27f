pub use api;

#[cfg(feature = "headless")]
pub type Backend = headless::HeadlessBackend;

#[cfg(feature = "headless")]
pub mod backend {
    pub use headless::{
        HeadlessBackend, HeadlessCommandBuffer, HeadlessConfig, HeadlessDescriptorTable,
        RawHandle, RecordedBarrier, RecordedCommand, Submission,
    };
}

pub mod log {
    pub use ard_log::*;
}

pub mod prelude {
    pub use api::types::*;

    pub use api::{
        barrier::{BarrierResource, Granularity},
        config::{ConfigError, RenderConfig},
        frame::{Frame, FramePacer},
        id_gen::ResourceId,
        queue::{CommandBufferState, QueueError, QueueWait},
        subresource::SubresourceRange,
        tracker::{ResourceKind, TrackingDiagnostic},
        BackendError,
    };

    // Context
    pub type RenderContext = api::context::RenderContext<crate::Backend>;

    // Command list
    pub type CommandList = api::command_list::CommandList<crate::Backend>;
    pub use api::command_list::CommandListState;
    pub type CopyBufferToBuffer<'a> = api::commands::CopyBufferToBuffer<'a, crate::Backend>;
    pub type CopyImageToImage<'a> = api::commands::CopyImageToImage<'a, crate::Backend>;
    pub type ColorAttachment<'a> = api::commands::ColorAttachment<'a, crate::Backend>;
    pub type DepthStencilAttachment<'a> =
        api::commands::DepthStencilAttachment<'a, crate::Backend>;
    pub type RenderPassDesc<'a> = api::commands::RenderPassDesc<'a, crate::Backend>;
    pub type VertexBind<'a> = api::commands::VertexBind<'a, crate::Backend>;
    pub type IndexBind<'a> = api::commands::IndexBind<'a, crate::Backend>;
    pub type GraphicsState<'a> = api::commands::GraphicsState<'a, crate::Backend>;
    pub type ComputeState<'a> = api::commands::ComputeState<'a, crate::Backend>;
    pub use api::commands::{BufferImageCopy, DrawArguments};

    // Queue
    pub type Queue = api::queue::Queue<crate::Backend>;
    pub type TrackedCommandBuffer = api::queue::TrackedCommandBuffer<crate::Backend>;

    // State tracking
    pub type ResourceStateTracker = api::tracker::ResourceStateTracker<crate::Backend>;
    pub type PendingBarrierBatch = api::barrier::PendingBarrierBatch<crate::Backend>;
    pub type Barrier = api::barrier::Barrier<crate::Backend>;

    // Resources
    pub type Buffer = api::resource::Buffer<crate::Backend>;
    pub type Image = api::resource::Image<crate::Backend>;
    pub use api::resource::{BufferDesc, ImageDesc, ResourceCreateError, ResourceStateExtension};

    // Shaders & pipelines
    pub type Shader = api::pipeline::Shader<crate::Backend>;
    pub type GraphicsPipeline = api::pipeline::GraphicsPipeline<crate::Backend>;
    pub type GraphicsPipelineDesc = api::pipeline::GraphicsPipelineDesc<crate::Backend>;
    pub type ComputePipeline = api::pipeline::ComputePipeline<crate::Backend>;
    pub type ComputePipelineDesc = api::pipeline::ComputePipelineDesc<crate::Backend>;
    pub use api::pipeline::{DepthStencilState, RasterizationState, ShaderDesc};

    // Bindings
    pub type BindingLayout = api::binding::BindingLayout<crate::Backend>;
    pub type BindingSet = api::binding::BindingSet<crate::Backend>;
    pub type BindingSetDesc = api::binding::BindingSetDesc<crate::Backend>;
    pub type BindingSetItem = api::binding::BindingSetItem<crate::Backend>;
    pub type BindingResource = api::binding::BindingResource<crate::Backend>;
    pub type DescriptorTable = api::descriptor_table::DescriptorTable<crate::Backend>;
    pub use api::binding::{BindingLayoutDesc, BindingLayoutItem, BindingType};
}

#[cfg(test)]
mod tests;
