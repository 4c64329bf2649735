//! 资源缓存中的记录，每条记录持有它创建的 GPU 对象

use vela_arena::{CacheKey, Handle};
use vela_gfx::handles::{GfxBindingTableHandle, GfxBufferHandle, GfxImageHandle, GfxSamplerHandle};
use vela_scene::Node;

use crate::pipelines::PipelineKind;

/// 上传之后不再变化的几何数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveResources {
    pub vertex_buffer: GfxBufferHandle,
    pub index_buffer: GfxBufferHandle,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// 每个 frame slot 一个 [`crate::uniforms::NodeUniform`] buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResources {
    pub uniform_buffers: Vec<GfxBufferHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialResources {
    pub uniform_buffers: Vec<GfxBufferHandle>,
    pub sampler: GfxSamplerHandle,
    /// 材质贴图在 texture 缓存中的 key
    pub texture: Option<CacheKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureResources {
    pub image: GfxImageHandle,
}

/// (node, material) 组合对应的 binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingTableRecord {
    pub table: GfxBindingTableHandle,
    pub kind: PipelineKind,
    pub node: CacheKey,
    pub material: Option<CacheKey>,
}

/// 环境光与当前激活的光源，所有带光照的 binding table 共用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightResources {
    pub ambient_buffers: Vec<GfxBufferHandle>,
    pub light_buffers: Vec<GfxBufferHandle>,
    pub active_node: Option<Handle<Node>>,
}

/// 各个缓存中的记录数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub primitives: usize,
    pub nodes: usize,
    pub materials: usize,
    pub textures: usize,
    pub binding_tables: usize,
    pub pipelines: usize,
}
