//! glTF 2.0 导入
//!
//! gltf 的格式，参考 https://www.khronos.org/files/gltf20-reference-guide.pdf
//!
//! gltf 中实体之间用整数下标互相引用。导入时按文档顺序把每一类实体依次 push 到全新的 arena 中，
//! 于是文档下标和 arena 下标一一对应，整数引用通过 [`Arena::find`] 直接转换为 handle。

use std::path::Path;

use anyhow::{Context, bail};
use gltf::mesh::Mode;
use itertools::{Itertools, izip};
use vela_arena::{Arena, Handle};

use crate::components::light::{Light, LightKind};
use crate::components::material::Material;
use crate::components::mesh::{Mesh, Primitive};
use crate::components::node::Node;
use crate::components::texture::Texture;
use crate::scene::Scene;
use crate::vertex::Vertex;

/// 导入 gltf 格式的模型
///
/// 支持 mesh、材质的 base color 贴图、KHR_lights_punctual；不支持 skin，动画，相机
pub struct GltfLoader {
    gltf_doc: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    images: Vec<gltf::image::Data>,
}

impl Scene {
    /// 从 gltf/glb 文件中载入整个场景
    pub fn load_gltf(path: impl AsRef<Path>) -> anyhow::Result<Scene> {
        GltfLoader::from_file(path.as_ref())?.build_scene()
    }
}

// new & init
impl GltfLoader {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let (gltf_doc, buffers, images) =
            gltf::import(path).with_context(|| format!("failed to open gltf file: {}", path.display()))?;
        log::info!(
            "gltf loaded: {}, nodes: {}, meshes: {}, materials: {}, images: {}",
            path.display(),
            gltf_doc.nodes().len(),
            gltf_doc.meshes().len(),
            gltf_doc.materials().len(),
            images.len()
        );

        Ok(Self {
            gltf_doc,
            buffers,
            images,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let (gltf_doc, buffers, images) = gltf::import_slice(bytes).context("failed to parse gltf data")?;
        Ok(Self {
            gltf_doc,
            buffers,
            images,
        })
    }
}
// tools
impl GltfLoader {
    pub fn build_scene(&self) -> anyhow::Result<Scene> {
        let mut textures = Arena::with_capacity(self.images.len());
        for (index, image) in self.images.iter().enumerate() {
            textures.push(Self::create_texture(index, image)?);
        }

        let mut materials = Arena::with_capacity(self.gltf_doc.materials().len());
        for material in self.gltf_doc.materials() {
            materials.push(Self::create_material(&material, &textures));
        }

        let mut meshes = Arena::with_capacity(self.gltf_doc.meshes().len());
        for mesh in self.gltf_doc.meshes() {
            meshes.push(self.create_mesh(&mesh, &materials)?);
        }

        let mut lights = Arena::new();
        for light in self.gltf_doc.lights().into_iter().flatten() {
            lights.push(Self::create_light(&light));
        }

        let mut nodes: Arena<Node> = Arena::with_capacity(self.gltf_doc.nodes().len());
        for node in self.gltf_doc.nodes() {
            nodes.push(Self::create_node(&node, &meshes, &lights));
        }
        // children 需要所有节点都 push 之后才能解析
        for node in self.gltf_doc.nodes() {
            let parent = nodes.find(node.index());
            for child in node.children() {
                let child = nodes.find(child.index());
                nodes[parent].children.push(child);
                nodes[child].parent = Some(parent);
            }
        }

        let roots = self.root_nodes(&nodes);
        Ok(Scene::from_parts(nodes, meshes, materials, textures, lights, roots))
    }

    /// 读取默认场景，否则读取 0 号场景；文档中没有场景时，所有无 parent 的节点都是根节点
    ///
    /// ```json
    /// {
    ///     "scene": 0,
    ///     "scenes": [
    ///         { "nodes": [ 0, 1, 2 ] }
    ///     ],
    /// }
    /// ```
    fn root_nodes(&self, nodes: &Arena<Node>) -> Vec<Handle<Node>> {
        match self.gltf_doc.default_scene().or_else(|| self.gltf_doc.scenes().next()) {
            Some(scene) => scene.nodes().map(|node| nodes.find(node.index())).collect(),
            None => nodes.iter().filter(|(_, node)| node.parent.is_none()).map(|(handle, _)| handle).collect(),
        }
    }

    /// node 可以包含 transform，mesh，light 信息
    ///
    /// transform 以 matrix 形式整体指定时，会被分解为 TRS
    fn create_node(node: &gltf::Node, meshes: &Arena<Mesh>, lights: &Arena<Light>) -> Node {
        let (translation, rotation, scale) = node.transform().decomposed();

        Node {
            name: node.name().map_or_else(|| format!("node-{}", node.index()), str::to_string),
            mesh: node.mesh().map(|mesh| meshes.find(mesh.index())),
            light: node.light().map(|light| lights.find(light.index())),
            parent: None,
            children: vec![],
            translation: glam::Vec3::from(translation),
            rotation: glam::Quat::from_array(rotation),
            scale: glam::Vec3::from(scale),
        }
    }

    /// 一个 mesh 中可以有多个 `primitive`，每个 `primitive` 都是单独可渲染的
    fn create_mesh(&self, mesh: &gltf::Mesh, materials: &Arena<Material>) -> anyhow::Result<Mesh> {
        let primitives = mesh
            .primitives()
            .filter(|primitive| Self::is_triangle_mode(primitive, mesh))
            .map(|primitive| self.create_primitive(&primitive, materials))
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("mesh {}", mesh.index()))?;

        Ok(Mesh {
            name: mesh.name().map_or_else(|| format!("mesh-{}", mesh.index()), str::to_string),
            primitives,
        })
    }

    fn create_primitive(&self, primitive: &gltf::Primitive, materials: &Arena<Material>) -> anyhow::Result<Primitive> {
        const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];
        const DEFAULT_UV: [f32; 2] = [0.0; 2];
        const DEFAULT_COLOR: [f32; 4] = [1.0; 4];

        let reader = primitive.reader(|buffer| Some(&self.buffers[buffer.index()].0[..]));

        let Some(positions) = reader.read_positions() else {
            bail!("primitive {} has no POSITION attribute", primitive.index());
        };
        let positions = positions.collect_vec();
        let vertex_cnt = positions.len();

        let normals = reader.read_normals().map_or_else(|| vec![DEFAULT_NORMAL; vertex_cnt], Iterator::collect);
        let uvs = reader
            .read_tex_coords(0)
            .map_or_else(|| vec![DEFAULT_UV; vertex_cnt], |uvs| uvs.into_f32().collect());
        let colors = reader
            .read_colors(0)
            .map_or_else(|| vec![DEFAULT_COLOR; vertex_cnt], |colors| colors.into_rgba_f32().collect());

        if normals.len() != vertex_cnt || uvs.len() != vertex_cnt || colors.len() != vertex_cnt {
            bail!("primitive {} has attributes of different length", primitive.index());
        }

        let vertices = izip!(positions, normals, uvs, colors)
            .map(|(position, normal, uv, color)| Vertex::new(position, normal, uv, color))
            .collect_vec();

        // 没有 indices 的 primitive 按顶点顺序绘制
        let indices = reader
            .read_indices()
            .map_or_else(|| (0..vertex_cnt as u32).collect(), |indices| indices.into_u32().collect());
        let indices = Self::triangle_list(primitive.mode(), indices);

        Ok(Primitive {
            vertices,
            indices,
            material: primitive.material().index().map(|index| materials.find(index)),
        })
    }

    /// 点和线没有对应的管线，跳过
    fn is_triangle_mode(primitive: &gltf::Primitive, mesh: &gltf::Mesh) -> bool {
        match primitive.mode() {
            Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan => true,
            mode => {
                log::warn!("skip primitive {} of mesh {}: unsupported mode {:?}", primitive.index(), mesh.index(), mode);
                false
            }
        }
    }

    /// strip 与 fan 按 gltf 规定的顶点顺序展开为 triangle list
    fn triangle_list(mode: Mode, indices: Vec<u32>) -> Vec<u32> {
        let triangle_cnt = indices.len().saturating_sub(2);
        match mode {
            Mode::TriangleStrip => (0..triangle_cnt)
                .flat_map(|i| [indices[i], indices[i + 1 + i % 2], indices[i + 2 - i % 2]])
                .collect(),
            Mode::TriangleFan => (0..triangle_cnt).flat_map(|i| [indices[i + 1], indices[i + 2], indices[0]]).collect(),
            _ => indices,
        }
    }

    /// gltf 中一个 material 的组成
    /// ```json
    /// {
    ///     "pbrMetallicRoughness": {
    ///         "baseColorTexture": {},
    ///         "baseColorFactor": [f32; 4],
    ///         "metallicFactor": f32,
    ///         "roughnessFactor": f32,
    ///     },
    /// }
    /// ```
    fn create_material(material: &gltf::Material, textures: &Arena<Texture>) -> Material {
        let pbr = material.pbr_metallic_roughness();

        // 只支持 TexCoord == 0 的 texture
        let texture = pbr.base_color_texture().and_then(|info| {
            if info.tex_coord() != 0 {
                log::warn!("material {:?}: base color texture uses TEXCOORD_{}, ignored", material.name(), info.tex_coord());
                return None;
            }
            Some(textures.find(info.texture().source().index()))
        });

        Material {
            name: material.name().unwrap_or_default().to_string(),
            base_color: glam::Vec4::from(pbr.base_color_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            texture,
        }
    }

    /// 统一转换为 RGBA8，只支持 8 bit 的格式
    fn create_texture(index: usize, image: &gltf::image::Data) -> anyhow::Result<Texture> {
        use gltf::image::Format as g;

        let pixels = match image.format {
            g::R8G8B8A8 => image.pixels.clone(),
            g::R8G8B8 => image.pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], u8::MAX]).collect(),
            g::R8G8 => image.pixels.chunks_exact(2).flat_map(|p| [p[0], p[1], 0, u8::MAX]).collect(),
            g::R8 => image.pixels.iter().flat_map(|r| [*r, 0, 0, u8::MAX]).collect(),
            other => bail!("image {index}: unsupported format {other:?}"),
        };

        Ok(Texture::new(format!("image-{index}"), image.width, image.height, pixels))
    }

    fn create_light(light: &gltf::khr_lights_punctual::Light) -> Light {
        use gltf::khr_lights_punctual::Kind;

        let kind = match light.kind() {
            Kind::Directional => LightKind::Directional,
            Kind::Point => LightKind::Point,
            Kind::Spot {
                inner_cone_angle,
                outer_cone_angle,
            } => LightKind::Spot {
                inner_cone_angle,
                outer_cone_angle,
            },
        };

        Light {
            name: light.name().map_or_else(|| format!("light-{}", light.index()), str::to_string),
            kind,
            color: glam::Vec3::from(light.color()),
            intensity: light.intensity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    /// 两个节点共享同一个 mesh，mesh 只有一个三角形，node 1 是 node 0 的子节点
    ///
    /// buffer: 3 个 position (36 bytes) + 3 个 u16 index (6 bytes)，数据以 base64 嵌入
    fn shared_mesh_gltf() -> String {
        let mut bytes: Vec<u8> = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            bytes.extend(bytemuck::cast_slice::<f32, u8>(&p));
        }
        bytes.extend(bytemuck::cast_slice::<u16, u8>(&[0, 1, 2]));
        let uri = format!("data:application/octet-stream;base64,{}", STANDARD.encode(&bytes));

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [
    {{ "name": "parent", "mesh": 0, "children": [1], "translation": [1.0, 2.0, 3.0] }},
    {{ "name": "child", "mesh": 0, "scale": [2.0, 2.0, 2.0], "extensions": {{ "KHR_lights_punctual": {{ "light": 0 }} }} }}
  ],
  "extensionsUsed": [ "KHR_lights_punctual" ],
  "extensions": {{ "KHR_lights_punctual": {{ "lights": [ {{ "type": "point", "color": [1.0, 0.5, 0.25], "intensity": 3.0 }} ] }} }},
  "materials": [ {{ "name": "red", "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.5, "roughnessFactor": 0.25 }} }} ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }} ] }} ],
  "buffers": [ {{ "byteLength": {len}, "uri": "{uri}" }} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            len = bytes.len(),
        )
    }

    /// 一个 mesh，三个共用 4 个顶点且没有 indices 的 primitive：LINES、TRIANGLE_STRIP、TRIANGLE_FAN
    fn primitive_modes_gltf() -> String {
        let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        let bytes: Vec<u8> = bytemuck::cast_slice::<[f32; 3], u8>(&positions).to_vec();
        let uri = format!("data:application/octet-stream;base64,{}", STANDARD.encode(&bytes));

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "name": "shapes", "mesh": 0 }} ],
  "meshes": [ {{ "primitives": [
    {{ "attributes": {{ "POSITION": 0 }}, "mode": 1 }},
    {{ "attributes": {{ "POSITION": 0 }}, "mode": 5 }},
    {{ "attributes": {{ "POSITION": 0 }}, "mode": 6 }}
  ] }} ],
  "buffers": [ {{ "byteLength": {len}, "uri": "{uri}" }} ],
  "bufferViews": [ {{ "buffer": 0, "byteOffset": 0, "byteLength": {len} }} ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }}
  ]
}}"#,
            len = bytes.len(),
        )
    }

    #[test]
    fn test_primitive_modes() {
        vela_crate_tools::init_log::init_test_log();

        let scene = GltfLoader::from_slice(primitive_modes_gltf().as_bytes()).unwrap().build_scene().unwrap();
        let mesh = scene.mesh(scene.meshes().find(0));

        // LINES 被跳过
        assert_eq!(mesh.primitives.len(), 2);
        assert_eq!(mesh.primitives[0].indices, vec![0, 1, 2, 1, 3, 2]);
        assert_eq!(mesh.primitives[1].indices, vec![1, 2, 0, 2, 3, 0]);
        assert!(mesh.primitives.iter().all(|p| p.vertices.len() == 4));
    }

    #[test]
    fn test_import_shared_mesh() {
        vela_crate_tools::init_log::init_test_log();

        let scene = GltfLoader::from_slice(shared_mesh_gltf().as_bytes()).unwrap().build_scene().unwrap();

        assert_eq!(scene.nodes().len(), 2);
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.materials().len(), 1);
        assert_eq!(scene.lights().len(), 1);

        let parent = scene.nodes().find(0);
        let child = scene.nodes().find(1);
        assert_eq!(scene.roots(), &[parent]);
        assert_eq!(scene.node(parent).children, vec![child]);
        assert_eq!(scene.node(child).parent, Some(parent));

        // 两个节点引用同一个 mesh
        assert_eq!(scene.node(parent).mesh, scene.node(child).mesh);

        let mesh = scene.mesh(scene.node(parent).mesh.unwrap());
        assert_eq!(mesh.primitives.len(), 1);
        assert_eq!(mesh.primitives[0].indices, vec![0, 1, 2]);
        assert_eq!(mesh.primitives[0].vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.primitives[0].vertices[1].color, [1.0; 4]);

        let material = scene.material(mesh.primitives[0].material.unwrap());
        assert_eq!(material.name, "red");
        assert_eq!(material.metallic, 0.5);
        assert!(material.texture.is_none());

        let light = scene.light(scene.node(child).light.unwrap());
        assert_eq!(light.kind, LightKind::Point);
        assert_eq!(light.intensity, 3.0);

        assert_eq!(scene.node(parent).translation, glam::vec3(1.0, 2.0, 3.0));
        assert_eq!(scene.node(child).scale, glam::Vec3::splat(2.0));
    }

    #[test]
    fn test_rgb_image_is_expanded_to_rgba() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let texture = GltfLoader::create_texture(0, &image).unwrap();
        assert_eq!(texture.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Scene::load_gltf("definitely/not/here.gltf").is_err());
    }
}
