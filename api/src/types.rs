use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How a buffer or image is being accessed by the GPU (or host). Multiple bits may be set at
    /// once, e.g. a buffer read as both a vertex buffer and by a shader.
    ///
    /// The empty set is [`AccessState::UNKNOWN`] and means nothing is known about the resource.
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct AccessState: u32 {
        const COMMON                 = 1 << 0;
        const CONSTANT_BUFFER        = 1 << 1;
        const VERTEX_BUFFER          = 1 << 2;
        const INDEX_BUFFER           = 1 << 3;
        const INDIRECT_ARGUMENT      = 1 << 4;
        const SHADER_READ            = 1 << 5;
        /// Unordered (storage) access from a shader.
        const SHADER_WRITE           = 1 << 6;
        const COLOR_ATTACHMENT_WRITE = 1 << 7;
        const DEPTH_STENCIL_READ     = 1 << 8;
        const DEPTH_STENCIL_WRITE    = 1 << 9;
        const TRANSFER_READ          = 1 << 10;
        const TRANSFER_WRITE         = 1 << 11;
        const PRESENT_READ           = 1 << 12;
        const HOST_READ              = 1 << 13;
        const HOST_WRITE             = 1 << 14;
    }
}

impl AccessState {
    pub const UNKNOWN: Self = Self::empty();

    /// Every bit that implies the resource is written to.
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_WRITE)
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE);

    #[inline(always)]
    pub fn is_unknown(self) -> bool {
        self.is_empty()
    }

    #[inline(always)]
    pub fn has_unordered_access(self) -> bool {
        self.contains(Self::SHADER_WRITE)
    }

    #[inline(always)]
    pub fn is_read_only(self) -> bool {
        !self.intersects(Self::WRITES)
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueType {
    /// The main queue is guaranteed to support graphics, transfer, and compute operations.
    Main,
    /// The transfer queue is guaranteed to support transfer operations and usually operates
    /// asynchronously to other queues.
    Transfer,
    /// The compute queue is guaranteed to support compute operations and usually operates
    /// asynchronously to other queues.
    Compute,
}

impl QueueType {
    pub const COUNT: usize = 3;
    pub const ALL: [QueueType; Self::COUNT] =
        [QueueType::Main, QueueType::Transfer, QueueType::Compute];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            QueueType::Main => 0,
            QueueType::Transfer => 1,
            QueueType::Compute => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    R8Unorm,
    R16SFloat,
    R32UInt,
    R32SFloat,
    Rg16SFloat,
    Rg32SFloat,
    Rgba8Unorm,
    Rgba8Srgb,
    Rgba16SFloat,
    Rgba32SFloat,
    Bgra8Unorm,
    Bgra8Srgb,
    BC7Unorm,
    BC7Srgb,
    D16Unorm,
    D24UnormS8Uint,
    D32Sfloat,
    D32SfloatS8Uint,
}

impl Format {
    #[inline(always)]
    pub fn is_color(&self) -> bool {
        !(self.is_depth() || self.is_stencil())
    }

    #[inline(always)]
    pub fn is_depth(&self) -> bool {
        matches!(
            *self,
            Format::D16Unorm | Format::D24UnormS8Uint | Format::D32Sfloat | Format::D32SfloatS8Uint
        )
    }

    #[inline(always)]
    pub fn is_stencil(&self) -> bool {
        matches!(*self, Format::D24UnormS8Uint | Format::D32SfloatS8Uint)
    }

    /// Every aspect an image of this format has.
    pub fn aspect_mask(&self) -> AspectMask {
        if self.is_color() {
            return AspectMask::COLOR;
        }

        let mut mask = AspectMask::empty();
        if self.is_depth() {
            mask |= AspectMask::DEPTH;
        }
        if self.is_stencil() {
            mask |= AspectMask::STENCIL;
        }
        mask
    }
}

bitflags! {
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct AspectMask: u32 {
        const COLOR   = 0b001;
        const DEPTH   = 0b010;
        const STENCIL = 0b100;
    }
}

bitflags! {
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC    = 0b0000001;
        const TRANSFER_DST    = 0b0000010;
        const UNIFORM_BUFFER  = 0b0000100;
        const STORAGE_BUFFER  = 0b0001000;
        const VERTEX_BUFFER   = 0b0010000;
        const INDEX_BUFFER    = 0b0100000;
        const INDIRECT_BUFFER = 0b1000000;
    }
}

bitflags! {
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC             = 0b0000001;
        const TRANSFER_DST             = 0b0000010;
        const SAMPLED                  = 0b0000100;
        const STORAGE                  = 0b0001000;
        const COLOR_ATTACHMENT         = 0b0010000;
        const DEPTH_STENCIL_ATTACHMENT = 0b0100000;
    }
}

bitflags! {
    #[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(transparent)]
    pub struct ShaderStages: u32 {
        const VERTEX   = 0b001;
        const FRAGMENT = 0b010;
        const COMPUTE  = 0b100;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryUsage {
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexType {
    U16,
    U32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOp {
    DontCare,
    Store,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LoadOp {
    DontCare,
    Load,
    Clear(ClearColor),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ClearColor {
    RgbaF32(f32, f32, f32, f32),
    RU32(u32),
    D32S32(f32, u32),
}

#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    #[inline(always)]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Size of the given mip level. Each dimension is clamped to 1.
    #[inline(always)]
    pub fn mip(self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Offset3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
