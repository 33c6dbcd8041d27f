use std::{
    mem::ManuallyDrop,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::{
    binding::BindingSet,
    garbage::Garbage,
    handle::gpu_handle,
    id_gen::ResourceId,
    pipeline::{ComputePipeline, GraphicsPipeline},
    subresource::subresource_index,
    types::*,
    Backend,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// The size in bytes of the buffer to create.
    pub size: u64,
    /// Describes the supported usage types of this buffer.
    pub buffer_usage: BufferUsage,
    /// Describes what memory operations are supported by this buffer.
    pub memory_usage: MemoryUsage,
    /// State the buffer rests in between command lists when `keep_initial_state` is set.
    pub initial_state: AccessState,
    /// If set, the buffer is implicitly tracked starting in `initial_state` and is returned to
    /// it whenever a command list is closed.
    pub keep_initial_state: bool,
    /// The backend *should* use the provided debug name for easy identification.
    pub debug_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub format: Format,
    pub extent: Extent3D,
    /// Must be at least 1.
    pub mip_levels: u32,
    /// Must be at least 1.
    pub array_layers: u32,
    pub image_usage: ImageUsage,
    pub memory_usage: MemoryUsage,
    /// See [`BufferDesc::initial_state`].
    pub initial_state: AccessState,
    /// See [`BufferDesc::keep_initial_state`].
    pub keep_initial_state: bool,
    pub debug_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResourceCreateError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),
    #[error("{0}")]
    Backend(#[from] crate::BackendError),
}

/// State bookkeeping that lives on the resource itself and survives across tracking sessions.
#[derive(Debug)]
pub struct ResourceStateExtension {
    initial_state: AccessState,
    keep_initial_state: bool,
    /// Bits of the promoted permanent state. Zero means "not permanent".
    permanent_state: AtomicU32,
    state_initialized: AtomicBool,
}

/// A GPU memory buffer.
pub struct Buffer<B: Backend>(Arc<BufferInner<B>>);

pub(crate) struct BufferInner<B: Backend> {
    id: ResourceId,
    desc: BufferDesc,
    state: ResourceStateExtension,
    raw: ManuallyDrop<B::Buffer>,
    on_drop: Sender<Garbage<B>>,
}

/// A GPU image with one or more mip levels and array layers.
pub struct Image<B: Backend>(Arc<ImageInner<B>>);

pub(crate) struct ImageInner<B: Backend> {
    id: ResourceId,
    desc: ImageDesc,
    state: ResourceStateExtension,
    raw: ManuallyDrop<B::Image>,
    on_drop: Sender<Garbage<B>>,
}

gpu_handle!(Buffer, BufferInner, Buffer);
gpu_handle!(Image, ImageInner, Image);

/// Anything a command buffer may hold on to until its work has completed.
pub enum ResourceRef<B: Backend> {
    Buffer(Buffer<B>),
    Image(Image<B>),
    GraphicsPipeline(GraphicsPipeline<B>),
    ComputePipeline(ComputePipeline<B>),
    BindingSet(BindingSet<B>),
}

impl ResourceStateExtension {
    pub(crate) fn new(initial_state: AccessState, keep_initial_state: bool) -> Self {
        Self {
            initial_state,
            keep_initial_state,
            permanent_state: AtomicU32::new(0),
            state_initialized: AtomicBool::new(false),
        }
    }

    #[inline(always)]
    pub fn initial_state(&self) -> AccessState {
        self.initial_state
    }

    #[inline(always)]
    pub fn keep_initial_state(&self) -> bool {
        self.keep_initial_state
    }

    #[inline(always)]
    pub fn permanent_state(&self) -> Option<AccessState> {
        match self.permanent_state.load(Ordering::Acquire) {
            0 => None,
            bits => Some(AccessState::from_bits_truncate(bits)),
        }
    }

    #[inline(always)]
    pub(crate) fn set_permanent_state(&self, state: AccessState) {
        self.permanent_state.store(state.bits(), Ordering::Release);
    }

    /// `true` once the resource has been through a submitted command list that restored it to
    /// its initial state.
    #[inline(always)]
    pub fn is_state_initialized(&self) -> bool {
        self.state_initialized.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn mark_initialized(&self) {
        self.state_initialized.store(true, Ordering::Release);
    }
}

impl<B: Backend> Buffer<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: BufferDesc,
        raw: B::Buffer,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        let state = ResourceStateExtension::new(desc.initial_state, desc.keep_initial_state);
        Self(Arc::new(BufferInner {
            id,
            desc,
            state,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &BufferDesc {
        &self.0.desc
    }

    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.0.desc.size
    }

    #[inline(always)]
    pub fn state(&self) -> &ResourceStateExtension {
        &self.0.state
    }

    #[inline(always)]
    pub fn debug_name(&self) -> &str {
        self.0.desc.debug_name.as_deref().unwrap_or("unnamed")
    }
}

impl<B: Backend> Image<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: ImageDesc,
        raw: B::Image,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        let state = ResourceStateExtension::new(desc.initial_state, desc.keep_initial_state);
        Self(Arc::new(ImageInner {
            id,
            desc,
            state,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &ImageDesc {
        &self.0.desc
    }

    #[inline(always)]
    pub fn format(&self) -> Format {
        self.0.desc.format
    }

    #[inline(always)]
    pub fn extent(&self) -> Extent3D {
        self.0.desc.extent
    }

    #[inline(always)]
    pub fn mip_levels(&self) -> u32 {
        self.0.desc.mip_levels
    }

    #[inline(always)]
    pub fn array_layers(&self) -> u32 {
        self.0.desc.array_layers
    }

    #[inline(always)]
    pub fn subresource_count(&self) -> usize {
        (self.0.desc.mip_levels * self.0.desc.array_layers) as usize
    }

    #[inline(always)]
    pub fn subresource_index(&self, mip: u32, layer: u32) -> usize {
        subresource_index(mip, layer, self.0.desc.mip_levels)
    }

    /// Every aspect of the image, derived from its format.
    #[inline(always)]
    pub fn full_aspect_mask(&self) -> AspectMask {
        self.0.desc.format.aspect_mask()
    }

    #[inline(always)]
    pub fn state(&self) -> &ResourceStateExtension {
        &self.0.state
    }

    #[inline(always)]
    pub fn debug_name(&self) -> &str {
        self.0.desc.debug_name.as_deref().unwrap_or("unnamed")
    }
}

impl<B: Backend> ResourceRef<B> {
    #[inline(always)]
    pub fn id(&self) -> ResourceId {
        match self {
            ResourceRef::Buffer(buffer) => buffer.id(),
            ResourceRef::Image(image) => image.id(),
            ResourceRef::GraphicsPipeline(pipeline) => pipeline.id(),
            ResourceRef::ComputePipeline(pipeline) => pipeline.id(),
            ResourceRef::BindingSet(set) => set.id(),
        }
    }
}

impl<B: Backend> From<&Buffer<B>> for ResourceRef<B> {
    fn from(value: &Buffer<B>) -> Self {
        ResourceRef::Buffer(value.clone())
    }
}

impl<B: Backend> From<&Image<B>> for ResourceRef<B> {
    fn from(value: &Image<B>) -> Self {
        ResourceRef::Image(value.clone())
    }
}

impl<B: Backend> From<&GraphicsPipeline<B>> for ResourceRef<B> {
    fn from(value: &GraphicsPipeline<B>) -> Self {
        ResourceRef::GraphicsPipeline(value.clone())
    }
}

impl<B: Backend> From<&ComputePipeline<B>> for ResourceRef<B> {
    fn from(value: &ComputePipeline<B>) -> Self {
        ResourceRef::ComputePipeline(value.clone())
    }
}

impl<B: Backend> From<&BindingSet<B>> for ResourceRef<B> {
    fn from(value: &BindingSet<B>) -> Self {
        ResourceRef::BindingSet(value.clone())
    }
}
