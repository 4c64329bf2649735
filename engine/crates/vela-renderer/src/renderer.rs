use std::collections::HashMap;

use itertools::Itertools;
use vela_arena::{CacheKey, Handle};
use vela_gfx::desc::{
    GfxBindingResource, GfxBindingWrite, GfxBufferDesc, GfxRenderTargets, GfxSamplerDesc, GfxTextureDesc,
};
use vela_gfx::handles::{GfxBindingLayoutHandle, GfxBufferHandle, GfxPipelineHandle};
use vela_gfx::{GfxDevice, GfxResult};
use vela_scene::{Material, Node, Primitive, Scene, Texture};

use crate::pipelines::{PipelineKind, bindings};
use crate::resources::{
    BindingTableRecord, CacheStats, LightResources, MaterialResources, NodeResources, PrimitiveResources,
    TextureResources,
};
use crate::settings::RendererSettings;
use crate::uniforms::{AmbientUniform, LightUniform, MaterialUniform, NodeUniform};

/// binding table 的 key，两个 handle 都参与相等比较
pub type BindingTableKey = (Handle<Node>, Option<Handle<Material>>);

/// GPU 资源缓存
///
/// 场景实体第一次被访问时按 key 创建对应的 GPU 对象，之后一直复用，直到 [`Renderer::destroy`]。
/// CPU 每帧会修改的数据（uniform、binding table）每个 frame slot 一份。
///
/// # key
/// - primitive：顶点与索引内容的 hash，内容相同的 primitive 共用一份 buffer
/// - node / material / texture：handle
/// - binding table：(node, material) 本身，不经过 hash
pub struct Renderer {
    settings: RendererSettings,
    slot_count: usize,

    binding_layouts: HashMap<PipelineKind, GfxBindingLayoutHandle>,
    pipelines: HashMap<PipelineKind, GfxPipelineHandle>,

    primitives: HashMap<CacheKey, PrimitiveResources>,
    nodes: HashMap<CacheKey, NodeResources>,
    materials: HashMap<CacheKey, MaterialResources>,
    textures: HashMap<CacheKey, TextureResources>,
    binding_tables: HashMap<BindingTableKey, BindingTableRecord>,
    light: Option<LightResources>,

    destroyed: bool,
}

// new & init
impl Renderer {
    pub fn new<D: GfxDevice>(
        device: &mut D,
        settings: &RendererSettings,
        slot_count: usize,
        render_targets: &GfxRenderTargets,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("Renderer::new");
        assert!(slot_count > 0, "renderer needs at least one frame slot");

        let mut renderer = Self {
            settings: settings.clone(),
            slot_count,
            binding_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            primitives: HashMap::new(),
            nodes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            binding_tables: HashMap::new(),
            light: None,
            destroyed: false,
        };

        if let Err(e) = renderer.init_pipelines(device, render_targets) {
            renderer.destroy(device);
            return Err(e);
        }

        Ok(renderer)
    }

    /// binding layout 只在这里创建一次，之后的 resize 只重建 pipeline
    fn init_pipelines<D: GfxDevice>(&mut self, device: &mut D, render_targets: &GfxRenderTargets) -> GfxResult<()> {
        for kind in PipelineKind::ALL {
            let layout = device.create_binding_layout(&kind.binding_layout_desc())?;
            self.binding_layouts.insert(kind, layout);
        }
        self.create_pipelines(device, render_targets)
    }

    fn create_pipelines<D: GfxDevice>(&mut self, device: &mut D, render_targets: &GfxRenderTargets) -> GfxResult<()> {
        let shader_dir = self.settings.shader_dir();
        for kind in PipelineKind::ALL {
            let desc = kind.pipeline_desc(&shader_dir, self.binding_layouts[&kind], render_targets.render_pass);
            let pipeline = device.create_pipeline(&desc)?;
            self.pipelines.insert(kind, pipeline);
        }
        log::info!(
            "pipelines created for {}x{}, shaders from {}",
            render_targets.extent.width,
            render_targets.extent.height,
            shader_dir.display()
        );
        Ok(())
    }

    /// 每个 frame slot 一个 uniform buffer，写入相同的初始值
    fn create_uniform_buffers<D: GfxDevice, U: bytemuck::Pod>(
        device: &mut D,
        slot_count: usize,
        name: &str,
        initial: &U,
    ) -> GfxResult<Vec<GfxBufferHandle>> {
        (0..slot_count)
            .map(|slot| {
                let buffer = device.create_buffer(&GfxBufferDesc::uniform(size_of::<U>(), format!("{name}-{slot}")))?;
                device.write_buffer(buffer, 0, bytemuck::bytes_of(initial))?;
                Ok(buffer)
            })
            .collect()
    }
}
// getters
impl Renderer {
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    pub fn pipeline(&self, kind: PipelineKind) -> GfxPipelineHandle {
        self.pipelines[&kind]
    }

    #[inline]
    pub fn binding_layout(&self, kind: PipelineKind) -> GfxBindingLayoutHandle {
        self.binding_layouts[&kind]
    }

    pub fn primitive_resources(&self, primitive: &Primitive) -> Option<&PrimitiveResources> {
        self.primitives.get(&Self::primitive_key(primitive))
    }

    pub fn node_resources(&self, node: Handle<Node>) -> Option<&NodeResources> {
        self.nodes.get(&CacheKey::from_handle(node))
    }

    pub fn material_resources(&self, material: Handle<Material>) -> Option<&MaterialResources> {
        self.materials.get(&CacheKey::from_handle(material))
    }

    pub fn texture_resources(&self, texture: Handle<Texture>) -> Option<&TextureResources> {
        self.textures.get(&CacheKey::from_handle(texture))
    }

    pub fn binding_table(&self, node: Handle<Node>, material: Option<Handle<Material>>) -> Option<&BindingTableRecord> {
        self.binding_tables.get(&(node, material))
    }

    #[inline]
    pub fn light_resources(&self) -> Option<&LightResources> {
        self.light.as_ref()
    }

    #[inline]
    pub fn active_light_node(&self) -> Option<Handle<Node>> {
        self.light.as_ref().and_then(|light| light.active_node)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            primitives: self.primitives.len(),
            nodes: self.nodes.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
            binding_tables: self.binding_tables.len(),
            pipelines: self.pipelines.len(),
        }
    }
}
// tools
impl Renderer {
    /// 顶点与索引的内容 hash，再混入两者的数量
    pub fn primitive_key(primitive: &Primitive) -> CacheKey {
        CacheKey::from_content(&primitive.vertices)
            .combine(CacheKey::from_content(&primitive.indices))
            .combine(primitive.vertices.len() as u64)
            .combine(primitive.indices.len() as u64)
    }

    /// 某个 binding table 在 `slot` 上的全部 binding
    fn binding_writes(&self, record: &BindingTableRecord, slot: usize) -> Vec<GfxBindingWrite> {
        let mut writes = vec![GfxBindingWrite {
            binding: bindings::NODE,
            resource: GfxBindingResource::whole_buffer(self.nodes[&record.node].uniform_buffers[slot]),
        }];

        if let Some(material_key) = record.material {
            let material = &self.materials[&material_key];
            writes.push(GfxBindingWrite {
                binding: bindings::MATERIAL,
                resource: GfxBindingResource::whole_buffer(material.uniform_buffers[slot]),
            });
            if let (PipelineKind::Textured, Some(texture_key)) = (record.kind, material.texture) {
                writes.push(GfxBindingWrite {
                    binding: bindings::TEXTURE,
                    resource: GfxBindingResource::CombinedImageSampler {
                        image: self.textures[&texture_key].image,
                        sampler: material.sampler,
                    },
                });
            }
        }

        if record.kind.is_lit() {
            writes.extend(self.light_writes(slot));
        }
        writes
    }

    /// 还没有激活过光源时为空
    fn light_writes(&self, slot: usize) -> Vec<GfxBindingWrite> {
        let Some(light) = &self.light else {
            return vec![];
        };
        vec![
            GfxBindingWrite {
                binding: bindings::AMBIENT,
                resource: GfxBindingResource::whole_buffer(light.ambient_buffers[slot]),
            },
            GfxBindingWrite {
                binding: bindings::LIGHT,
                resource: GfxBindingResource::whole_buffer(light.light_buffers[slot]),
            },
        ]
    }
}
// update
impl Renderer {
    /// 内容相同的 primitive 只会上传一次
    pub fn ensure_primitive_resources<D: GfxDevice>(
        &mut self,
        device: &mut D,
        primitive: &Primitive,
    ) -> GfxResult<&PrimitiveResources> {
        let key = Self::primitive_key(primitive);

        if !self.primitives.contains_key(&key) {
            assert!(
                !primitive.vertices.is_empty() && !primitive.indices.is_empty(),
                "primitive without geometry can not be uploaded"
            );

            let vertex_bytes: &[u8] = bytemuck::cast_slice(&primitive.vertices);
            let vertex_buffer =
                device.create_buffer(&GfxBufferDesc::vertex(vertex_bytes.len(), format!("vertices-{:016x}", key.raw())))?;
            device.write_buffer(vertex_buffer, 0, vertex_bytes)?;

            let index_bytes: &[u8] = bytemuck::cast_slice(&primitive.indices);
            let index_buffer =
                device.create_buffer(&GfxBufferDesc::index(index_bytes.len(), format!("indices-{:016x}", key.raw())))?;
            device.write_buffer(index_buffer, 0, index_bytes)?;

            log::debug!(
                "primitive resources created: {:?}, {} vertices, {} indices",
                key,
                primitive.vertices.len(),
                primitive.indices.len()
            );
            self.primitives.insert(
                key,
                PrimitiveResources {
                    vertex_buffer,
                    index_buffer,
                    vertex_count: primitive.vertices.len() as u32,
                    index_count: primitive.index_count(),
                },
            );
        }

        let resources = &self.primitives[&key];
        debug_assert!(
            resources.vertex_count == primitive.vertices.len() as u32
                && resources.index_count == primitive.index_count(),
            "geometry key collision: {key:?}"
        );
        Ok(resources)
    }

    /// 没有 mesh 也没有 light 的节点返回 None，不分配任何资源
    pub fn ensure_node_resources<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        node: Handle<Node>,
    ) -> GfxResult<Option<&NodeResources>> {
        let scene_node = scene.node(node);
        if !scene_node.is_drawable() {
            return Ok(None);
        }

        let key = CacheKey::from_handle(node);
        if !self.nodes.contains_key(&key) {
            let uniform_buffers = Self::create_uniform_buffers(
                device,
                self.slot_count,
                &format!("node-{}", scene_node.name),
                &NodeUniform::default(),
            )?;
            log::debug!("node resources created: {}", scene_node.name);
            self.nodes.insert(key, NodeResources { uniform_buffers });
        }

        Ok(self.nodes.get(&key))
    }

    pub fn ensure_texture_resources<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        texture: Handle<Texture>,
    ) -> GfxResult<&TextureResources> {
        let key = CacheKey::from_handle(texture);
        if !self.textures.contains_key(&key) {
            let scene_texture = scene.texture(texture);
            let image = device.create_texture(
                &GfxTextureDesc::rgba8(scene_texture.width, scene_texture.height, &scene_texture.name),
                &scene_texture.pixels,
            )?;
            log::debug!(
                "texture uploaded: {} ({}x{})",
                scene_texture.name,
                scene_texture.width,
                scene_texture.height
            );
            self.textures.insert(key, TextureResources { image });
        }

        Ok(&self.textures[&key])
    }

    /// 材质贴图也会在这里上传
    pub fn ensure_material_resources<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        material: Handle<Material>,
    ) -> GfxResult<&MaterialResources> {
        let key = CacheKey::from_handle(material);
        if !self.materials.contains_key(&key) {
            let scene_material = scene.material(material);

            let texture = match scene_material.texture {
                Some(texture) => {
                    self.ensure_texture_resources(device, scene, texture)?;
                    Some(CacheKey::from_handle(texture))
                }
                None => None,
            };
            let uniform_buffers = Self::create_uniform_buffers(
                device,
                self.slot_count,
                &format!("material-{}", scene_material.name),
                &MaterialUniform::new(scene_material, self.light.is_some()),
            )?;
            let sampler = device.create_sampler(&GfxSamplerDesc::default())?;

            log::debug!("material resources created: {}", scene_material.name);
            self.materials.insert(
                key,
                MaterialResources {
                    uniform_buffers,
                    sampler,
                    texture,
                },
            );
        }

        Ok(&self.materials[&key])
    }

    /// 同一个 (node, material) 只会分配一次 binding table
    ///
    /// 需要的 node、material、texture 资源会一并创建
    pub fn ensure_binding_table<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        node: Handle<Node>,
        material: Option<Handle<Material>>,
    ) -> GfxResult<&BindingTableRecord> {
        let key = (node, material);
        if !self.binding_tables.contains_key(&key) {
            let record = self.create_binding_table(device, scene, node, material)?;
            self.binding_tables.insert(key, record);
        }

        Ok(&self.binding_tables[&key])
    }

    fn create_binding_table<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        node: Handle<Node>,
        material: Option<Handle<Material>>,
    ) -> GfxResult<BindingTableRecord> {
        let kind = PipelineKind::select(material.map(|m| scene.material(m)));
        let node_name = &scene.node(node).name;

        if self.ensure_node_resources(device, scene, node)?.is_none() {
            panic!("binding table requested for node {node_name} which has neither mesh nor light");
        }
        let material_key = match material {
            Some(material) => {
                self.ensure_material_resources(device, scene, material)?;
                Some(CacheKey::from_handle(material))
            }
            None => None,
        };

        let table = device.create_binding_table(
            self.binding_layouts[&kind],
            self.slot_count,
            &format!("{node_name}-{}", kind.name()),
        )?;
        let record = BindingTableRecord {
            table,
            kind,
            node: CacheKey::from_handle(node),
            material: material_key,
        };
        for slot in 0..self.slot_count {
            device.write_binding_table(table, slot, &self.binding_writes(&record, slot))?;
        }

        log::debug!("binding table created: {node_name} ({})", kind.name());
        Ok(record)
    }

    /// 选择写入 light buffer 的光源，`None` 表示关闭光源
    ///
    /// 第一次调用时创建环境光与光源的 buffer，并写入已经存在的 binding table。
    /// 调用者需要保证 GPU 没有在使用这些 buffer。
    pub fn set_active_light<D: GfxDevice>(
        &mut self,
        device: &mut D,
        scene: &Scene,
        node: Option<Handle<Node>>,
    ) -> GfxResult<()> {
        let uniform = match node {
            Some(handle) => {
                let scene_node = scene.node(handle);
                let Some(light) = scene_node.light else {
                    panic!("node {} carries no light", scene_node.name);
                };
                LightUniform::new(scene.light(light), scene.world_transform(handle))
            }
            None => LightUniform::default(),
        };

        let created = self.light.is_none();
        if created {
            let ambient = AmbientUniform::new(self.settings.ambient_color, self.settings.ambient_intensity);
            let ambient_buffers = Self::create_uniform_buffers(device, self.slot_count, "ambient", &ambient)?;
            let light_buffers = Self::create_uniform_buffers(device, self.slot_count, "light", &uniform)?;
            self.light = Some(LightResources {
                ambient_buffers,
                light_buffers,
                active_node: node,
            });

            // buffer 之后不会再变化，只需要写入一次
            let lit_tables = self.binding_tables.values().filter(|r| r.kind.is_lit()).map(|r| r.table).collect_vec();
            for table in lit_tables {
                for slot in 0..self.slot_count {
                    device.write_binding_table(table, slot, &self.light_writes(slot))?;
                }
            }
        } else {
            for slot in 0..self.slot_count {
                self.write_light_uniforms(device, slot, &uniform)?;
            }
            if let Some(light) = self.light.as_mut() {
                light.active_node = node;
            }
        }

        log::info!(
            "active light: {}",
            node.map_or("none", |handle| scene.node(handle).name.as_str())
        );
        Ok(())
    }

    pub fn write_node_uniforms<D: GfxDevice>(
        &self,
        device: &mut D,
        node: Handle<Node>,
        slot: usize,
        uniform: &NodeUniform,
    ) -> GfxResult<()> {
        let Some(resources) = self.node_resources(node) else {
            panic!("node {node:?} has no resources");
        };
        device.write_buffer(resources.uniform_buffers[slot], 0, bytemuck::bytes_of(uniform))
    }

    pub fn write_material_uniforms<D: GfxDevice>(
        &self,
        device: &mut D,
        scene: &Scene,
        material: Handle<Material>,
        slot: usize,
    ) -> GfxResult<()> {
        let Some(resources) = self.material_resources(material) else {
            panic!("material {} has no resources", scene.material(material).name);
        };
        let uniform = MaterialUniform::new(scene.material(material), self.light.is_some());
        device.write_buffer(resources.uniform_buffers[slot], 0, bytemuck::bytes_of(&uniform))
    }

    pub fn write_light_uniforms<D: GfxDevice>(
        &self,
        device: &mut D,
        slot: usize,
        uniform: &LightUniform,
    ) -> GfxResult<()> {
        let Some(light) = &self.light else {
            panic!("light buffers are not created, call set_active_light first");
        };
        device.write_buffer(light.light_buffers[slot], 0, bytemuck::bytes_of(uniform))
    }

    /// 只重建 pipeline；binding layout 以及所有缓存的资源保持不变
    pub fn recreate_pipelines<D: GfxDevice>(
        &mut self,
        device: &mut D,
        render_targets: &GfxRenderTargets,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("Renderer::recreate_pipelines");
        for (_, pipeline) in self.pipelines.drain() {
            device.destroy_pipeline(pipeline);
        }
        self.create_pipelines(device, render_targets)
    }
}
// destroy
impl Renderer {
    pub fn destroy<D: GfxDevice>(&mut self, device: &mut D) {
        let _span = tracy_client::span!("Renderer::destroy");
        log::info!("destroying renderer: {:?}", self.stats());

        for (_, record) in self.binding_tables.drain() {
            device.destroy_binding_table(record.table);
        }
        for (_, pipeline) in self.pipelines.drain() {
            device.destroy_pipeline(pipeline);
        }
        for (_, layout) in self.binding_layouts.drain() {
            device.destroy_binding_layout(layout);
        }
        for (_, primitive) in self.primitives.drain() {
            device.destroy_buffer(primitive.vertex_buffer);
            device.destroy_buffer(primitive.index_buffer);
        }
        for (_, node) in self.nodes.drain() {
            node.uniform_buffers.into_iter().for_each(|buffer| device.destroy_buffer(buffer));
        }
        for (_, material) in self.materials.drain() {
            material.uniform_buffers.into_iter().for_each(|buffer| device.destroy_buffer(buffer));
            device.destroy_sampler(material.sampler);
        }
        for (_, texture) in self.textures.drain() {
            device.destroy_image(texture.image);
        }
        if let Some(light) = self.light.take() {
            light
                .ambient_buffers
                .into_iter()
                .chain(light.light_buffers)
                .for_each(|buffer| device.destroy_buffer(buffer));
        }

        self.destroyed = true;
    }
}
impl Drop for Renderer {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            // 测试失败时不要在 unwind 中再次 panic
            if !std::thread::panicking() {
                assert!(self.destroyed, "Renderer must be destroyed manually.");
            }
        }
    }
}
