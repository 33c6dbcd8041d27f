use crate::{
    binding::BindingSet,
    pipeline::{ComputePipeline, GraphicsPipeline},
    resource::{Buffer, Image},
    types::{Extent3D, IndexType, LoadOp, Offset3D, StoreOp},
    Backend,
};

pub struct CopyBufferToBuffer<'a, B: Backend> {
    /// The source buffer to read from.
    pub src: &'a Buffer<B>,
    /// The offset within the source buffer to read from.
    pub src_offset: u64,
    /// The destination buffer to write to.
    pub dst: &'a Buffer<B>,
    /// The offset within the destination buffer to write to.
    pub dst_offset: u64,
    /// The number of bytes to copy.
    pub len: u64,
}

/// Copies a region between single subresources of two images.
pub struct CopyImageToImage<'a, B: Backend> {
    pub src: &'a Image<B>,
    pub src_mip_level: u32,
    pub src_array_layer: u32,
    pub src_offset: Offset3D,
    pub dst: &'a Image<B>,
    pub dst_mip_level: u32,
    pub dst_array_layer: u32,
    pub dst_offset: Offset3D,
    pub extent: Extent3D,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferImageCopy {
    /// Offset from the start of the buffer to begin reading.
    pub buffer_offset: u64,
    /// In combination with `buffer_image_height`, this defines (in texels) a subregion of a
    /// larger image in buffer memory. If either value is zero, the buffer memory is considered
    /// tightly packed.
    pub buffer_row_length: u32,
    /// See `buffer_row_length`.
    pub buffer_image_height: u32,
    pub image_offset: Offset3D,
    pub image_extent: Extent3D,
    pub mip_level: u32,
    pub array_layer: u32,
}

pub struct ColorAttachment<'a, B: Backend> {
    pub image: &'a Image<B>,
    pub mip_level: u32,
    pub array_layer: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

pub struct DepthStencilAttachment<'a, B: Backend> {
    pub image: &'a Image<B>,
    pub mip_level: u32,
    pub array_layer: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Depth testing without writes. The image only needs to be readable.
    pub read_only: bool,
}

/// Describes a render pass.
pub struct RenderPassDesc<'a, B: Backend> {
    pub color_attachments: Vec<ColorAttachment<'a, B>>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment<'a, B>>,
}

pub struct VertexBind<'a, B: Backend> {
    pub buffer: &'a Buffer<B>,
    pub offset: u64,
}

pub struct IndexBind<'a, B: Backend> {
    pub buffer: &'a Buffer<B>,
    pub offset: u64,
    pub ty: IndexType,
}

/// Everything a draw reads from.
pub struct GraphicsState<'a, B: Backend> {
    pub pipeline: &'a GraphicsPipeline<B>,
    pub bindings: &'a [&'a BindingSet<B>],
    pub vertex_buffers: &'a [VertexBind<'a, B>],
    pub index_buffer: Option<IndexBind<'a, B>>,
    /// Source of arguments for [`DrawArguments::Indirect`].
    pub indirect_buffer: Option<&'a Buffer<B>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawArguments {
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Indirect {
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
}

/// Everything a dispatch reads from.
pub struct ComputeState<'a, B: Backend> {
    pub pipeline: &'a ComputePipeline<B>,
    pub bindings: &'a [&'a BindingSet<B>],
}
