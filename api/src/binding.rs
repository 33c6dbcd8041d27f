use std::{
    hash::{Hash, Hasher},
    mem::ManuallyDrop,
    sync::Arc,
};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::{
    garbage::Garbage,
    handle::gpu_handle,
    id_gen::ResourceId,
    resource::{Buffer, Image},
    subresource::SubresourceRange,
    types::{AccessState, ShaderStages},
    Backend,
};

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BindingType {
    ConstantBuffer,
    ReadOnlyStorageBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct BindingLayoutItem {
    pub slot: u32,
    pub ty: BindingType,
    /// Number of array elements in the slot.
    pub count: u32,
    pub stages: ShaderStages,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindingLayoutDesc {
    pub items: Vec<BindingLayoutItem>,
    pub debug_name: Option<String>,
}

pub struct BindingLayout<B: Backend>(Arc<BindingLayoutInner<B>>);

pub(crate) struct BindingLayoutInner<B: Backend> {
    id: ResourceId,
    desc: BindingLayoutDesc,
    raw: ManuallyDrop<B::BindingLayout>,
    on_drop: Sender<Garbage<B>>,
}

/// A resource bound into a binding set or descriptor table.
pub enum BindingResource<B: Backend> {
    ConstantBuffer(Buffer<B>),
    StorageBuffer {
        buffer: Buffer<B>,
        writable: bool,
    },
    SampledImage {
        image: Image<B>,
        subresources: SubresourceRange,
    },
    StorageImage {
        image: Image<B>,
        subresources: SubresourceRange,
    },
}

pub struct BindingSetItem<B: Backend> {
    pub slot: u32,
    pub array_element: u32,
    pub resource: BindingResource<B>,
}

pub struct BindingSetDesc<B: Backend> {
    pub layout: BindingLayout<B>,
    pub items: Vec<BindingSetItem<B>>,
    pub debug_name: Option<String>,
}

pub struct BindingSet<B: Backend>(Arc<BindingSetInner<B>>);

pub(crate) struct BindingSetInner<B: Backend> {
    id: ResourceId,
    desc: BindingSetDesc<B>,
    raw: ManuallyDrop<B::BindingSet>,
    on_drop: Sender<Garbage<B>>,
}

gpu_handle!(BindingLayout, BindingLayoutInner, BindingLayout);
gpu_handle!(BindingSet, BindingSetInner, BindingSet);

impl<B: Backend> BindingLayout<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: BindingLayoutDesc,
        raw: B::BindingLayout,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self(Arc::new(BindingLayoutInner {
            id,
            desc,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &BindingLayoutDesc {
        &self.0.desc
    }
}

impl<B: Backend> BindingSet<B> {
    pub(crate) fn new(
        id: ResourceId,
        desc: BindingSetDesc<B>,
        raw: B::BindingSet,
        on_drop: Sender<Garbage<B>>,
    ) -> Self {
        Self(Arc::new(BindingSetInner {
            id,
            desc,
            raw: ManuallyDrop::new(raw),
            on_drop,
        }))
    }

    #[inline(always)]
    pub fn desc(&self) -> &BindingSetDesc<B> {
        &self.0.desc
    }

    #[inline(always)]
    pub fn layout(&self) -> &BindingLayout<B> {
        &self.0.desc.layout
    }
}

impl<B: Backend> BindingResource<B> {
    /// The state a shader needs the resource to be in to access it through this binding.
    pub fn required_access(&self) -> AccessState {
        match self {
            BindingResource::ConstantBuffer(_) => AccessState::CONSTANT_BUFFER,
            BindingResource::StorageBuffer { writable: false, .. } => AccessState::SHADER_READ,
            BindingResource::StorageBuffer { writable: true, .. } => AccessState::SHADER_WRITE,
            BindingResource::SampledImage { .. } => AccessState::SHADER_READ,
            BindingResource::StorageImage { .. } => AccessState::SHADER_WRITE,
        }
    }

    #[inline(always)]
    pub fn binding_type(&self) -> BindingType {
        match self {
            BindingResource::ConstantBuffer(_) => BindingType::ConstantBuffer,
            BindingResource::StorageBuffer { writable: false, .. } => {
                BindingType::ReadOnlyStorageBuffer
            }
            BindingResource::StorageBuffer { writable: true, .. } => BindingType::StorageBuffer,
            BindingResource::SampledImage { .. } => BindingType::SampledImage,
            BindingResource::StorageImage { .. } => BindingType::StorageImage,
        }
    }
}

impl<B: Backend> Clone for BindingResource<B> {
    fn clone(&self) -> Self {
        match self {
            BindingResource::ConstantBuffer(buffer) => {
                BindingResource::ConstantBuffer(buffer.clone())
            }
            BindingResource::StorageBuffer { buffer, writable } => BindingResource::StorageBuffer {
                buffer: buffer.clone(),
                writable: *writable,
            },
            BindingResource::SampledImage {
                image,
                subresources,
            } => BindingResource::SampledImage {
                image: image.clone(),
                subresources: *subresources,
            },
            BindingResource::StorageImage {
                image,
                subresources,
            } => BindingResource::StorageImage {
                image: image.clone(),
                subresources: *subresources,
            },
        }
    }
}

impl<B: Backend> PartialEq for BindingResource<B> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BindingResource::ConstantBuffer(a), BindingResource::ConstantBuffer(b)) => a == b,
            (
                BindingResource::StorageBuffer {
                    buffer: a,
                    writable: wa,
                },
                BindingResource::StorageBuffer {
                    buffer: b,
                    writable: wb,
                },
            ) => a == b && wa == wb,
            (
                BindingResource::SampledImage {
                    image: a,
                    subresources: ra,
                },
                BindingResource::SampledImage {
                    image: b,
                    subresources: rb,
                },
            ) => a == b && ra == rb,
            (
                BindingResource::StorageImage {
                    image: a,
                    subresources: ra,
                },
                BindingResource::StorageImage {
                    image: b,
                    subresources: rb,
                },
            ) => a == b && ra == rb,
            _ => false,
        }
    }
}

impl<B: Backend> Eq for BindingResource<B> {}

impl<B: Backend> std::fmt::Debug for BindingResource<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingResource::ConstantBuffer(buffer) => {
                f.debug_tuple("ConstantBuffer").field(buffer).finish()
            }
            BindingResource::StorageBuffer { buffer, writable } => f
                .debug_struct("StorageBuffer")
                .field("buffer", buffer)
                .field("writable", writable)
                .finish(),
            BindingResource::SampledImage {
                image,
                subresources,
            } => f
                .debug_struct("SampledImage")
                .field("image", image)
                .field("subresources", subresources)
                .finish(),
            BindingResource::StorageImage {
                image,
                subresources,
            } => f
                .debug_struct("StorageImage")
                .field("image", image)
                .field("subresources", subresources)
                .finish(),
        }
    }
}

impl<B: Backend> Hash for BindingResource<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.binding_type().hash(state);
        match self {
            BindingResource::ConstantBuffer(buffer)
            | BindingResource::StorageBuffer { buffer, .. } => buffer.hash(state),
            BindingResource::SampledImage {
                image,
                subresources,
            }
            | BindingResource::StorageImage {
                image,
                subresources,
            } => {
                image.hash(state);
                subresources.hash(state);
            }
        }
    }
}

impl<B: Backend> Clone for BindingSetItem<B> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot,
            array_element: self.array_element,
            resource: self.resource.clone(),
        }
    }
}

impl<B: Backend> Hash for BindingSetItem<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.array_element.hash(state);
        self.resource.hash(state);
    }
}

impl<B: Backend> Clone for BindingSetDesc<B> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            items: self.items.clone(),
            debug_name: self.debug_name.clone(),
        }
    }
}

impl<B: Backend> Hash for BindingSetDesc<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.layout.hash(state);
        self.items.hash(state);
        self.debug_name.hash(state);
    }
}
