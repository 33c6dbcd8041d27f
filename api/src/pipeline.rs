use std::{
    hash::{Hash, Hasher},
    mem::ManuallyDrop,
    sync::Arc,
};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::{
    binding::BindingLayout, garbage::Garbage, handle::gpu_handle, id_gen::ResourceId, types::*,
    Backend,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub debug_name: Option<String>,
}

/// A compiled shader module. Compilation happens upstream; the context only receives bytecode.
pub struct Shader<B: Backend>(Arc<ShaderInner<B>>);

pub(crate) struct ShaderInner<B: Backend> {
    id: ResourceId,
    desc: ShaderDesc,
    raw: ManuallyDrop<B::Shader>,
    on_drop: Sender<Garbage<B>>,
}

gpu_handle!(Shader, ShaderInner, Shader);

impl<B: Backend> Shader<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: ShaderDesc,
        raw: B::Shader,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self(Arc::new(ShaderInner {
            id,
            desc,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &ShaderDesc {
        &self.0.desc
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RasterizationState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
}

pub struct GraphicsPipelineDesc<B: Backend> {
    pub vertex: Shader<B>,
    pub fragment: Option<Shader<B>>,
    pub layouts: Vec<BindingLayout<B>>,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    pub debug_name: Option<String>,
}

pub struct ComputePipelineDesc<B: Backend> {
    pub shader: Shader<B>,
    pub layouts: Vec<BindingLayout<B>>,
    pub debug_name: Option<String>,
}

pub struct GraphicsPipeline<B: Backend>(Arc<GraphicsPipelineInner<B>>);

pub(crate) struct GraphicsPipelineInner<B: Backend> {
    id: ResourceId,
    desc: GraphicsPipelineDesc<B>,
    raw: ManuallyDrop<B::GraphicsPipeline>,
    on_drop: Sender<Garbage<B>>,
}

pub struct ComputePipeline<B: Backend>(Arc<ComputePipelineInner<B>>);

pub(crate) struct ComputePipelineInner<B: Backend> {
    id: ResourceId,
    desc: ComputePipelineDesc<B>,
    raw: ManuallyDrop<B::ComputePipeline>,
    on_drop: Sender<Garbage<B>>,
}

gpu_handle!(GraphicsPipeline, GraphicsPipelineInner, GraphicsPipeline);
gpu_handle!(ComputePipeline, ComputePipelineInner, ComputePipeline);

impl<B: Backend> GraphicsPipeline<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: GraphicsPipelineDesc<B>,
        raw: B::GraphicsPipeline,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self(Arc::new(GraphicsPipelineInner {
            id,
            desc,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &GraphicsPipelineDesc<B> {
        &self.0.desc
    }
}

impl<B: Backend> ComputePipeline<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: ComputePipelineDesc<B>,
        raw: B::ComputePipeline,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self(Arc::new(ComputePipelineInner {
            id,
            desc,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &ComputePipelineDesc<B> {
        &self.0.desc
    }
}

// Descriptors hold handles, which hash and compare by id. Deriving would put bounds on `B`.

impl<B: Backend> Clone for GraphicsPipelineDesc<B> {
    fn clone(&self) -> Self {
        Self {
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            layouts: self.layouts.clone(),
            topology: self.topology,
            rasterization: self.rasterization,
            depth_stencil: self.depth_stencil,
            color_formats: self.color_formats.clone(),
            depth_format: self.depth_format,
            debug_name: self.debug_name.clone(),
        }
    }
}

impl<B: Backend> Hash for GraphicsPipelineDesc<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.vertex.hash(state);
        self.fragment.hash(state);
        self.layouts.hash(state);
        self.topology.hash(state);
        self.rasterization.hash(state);
        self.depth_stencil.hash(state);
        self.color_formats.hash(state);
        self.depth_format.hash(state);
        self.debug_name.hash(state);
    }
}

impl<B: Backend> Clone for ComputePipelineDesc<B> {
    fn clone(&self) -> Self {
        Self {
            shader: self.shader.clone(),
            layouts: self.layouts.clone(),
            debug_name: self.debug_name.clone(),
        }
    }
}

impl<B: Backend> Hash for ComputePipelineDesc<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shader.hash(state);
        self.layouts.hash(state);
        self.debug_name.hash(state);
    }
}
