use std::mem::offset_of;
use std::path::Path;

use ash::vk;
use vela_gfx::desc::{
    GfxBindingDesc, GfxBindingLayoutDesc, GfxPipelineDesc, GfxShaderPair, GfxVertexAttribute, GfxVertexLayout,
};
use vela_gfx::handles::{GfxBindingLayoutHandle, GfxRenderPassHandle};
use vela_scene::{Material, Vertex};

/// binding 编号，与 shader 中的 `layout(binding = N)` 一致
pub mod bindings {
    pub const NODE: u32 = 0;
    pub const MATERIAL: u32 = 1;
    pub const TEXTURE: u32 = 2;
    pub const AMBIENT: u32 = 3;
    pub const LIGHT: u32 = 4;
}

/// 三种管线，由 primitive 的材质决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineKind {
    /// 没有材质：线框
    Line,
    /// 有材质，没有贴图
    Untextured,
    /// 有材质，有 base color 贴图
    Textured,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [Self::Line, Self::Untextured, Self::Textured];

    pub fn select(material: Option<&Material>) -> Self {
        match material {
            None => Self::Line,
            Some(Material { texture: None, .. }) => Self::Untextured,
            Some(Material { texture: Some(_), .. }) => Self::Textured,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Untextured => "untextured",
            Self::Textured => "textured",
        }
    }

    /// `{name}.vert.spv` 与 `{name}.frag.spv`
    pub fn shaders(self, shader_dir: &Path) -> GfxShaderPair {
        GfxShaderPair {
            vertex: shader_dir.join(format!("{}.vert.spv", self.name())),
            fragment: shader_dir.join(format!("{}.frag.spv", self.name())),
        }
    }

    /// 是否读取材质、环境光与光源
    #[inline]
    pub fn is_lit(self) -> bool {
        self != Self::Line
    }

    pub fn binding_layout_desc(self) -> GfxBindingLayoutDesc {
        let uniform = |binding, stages, optional| GfxBindingDesc {
            binding,
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            stages,
            optional,
        };
        let vert_frag = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;

        let mut layout = vec![uniform(bindings::NODE, vk::ShaderStageFlags::VERTEX, false)];
        if self.is_lit() {
            layout.push(uniform(bindings::MATERIAL, vert_frag, false));
        }
        if self == Self::Textured {
            layout.push(GfxBindingDesc {
                binding: bindings::TEXTURE,
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                stages: vk::ShaderStageFlags::FRAGMENT,
                optional: false,
            });
        }
        if self.is_lit() {
            // 没有激活的光源时不写入
            layout.push(uniform(bindings::AMBIENT, vk::ShaderStageFlags::FRAGMENT, true));
            layout.push(uniform(bindings::LIGHT, vk::ShaderStageFlags::FRAGMENT, true));
        }

        GfxBindingLayoutDesc {
            bindings: layout,
            name: format!("{}-bindings", self.name()),
        }
    }

    pub fn pipeline_desc(
        self,
        shader_dir: &Path,
        binding_layout: GfxBindingLayoutHandle,
        render_pass: GfxRenderPassHandle,
    ) -> GfxPipelineDesc {
        let (polygon_mode, cull_mode) = match self {
            Self::Line => (vk::PolygonMode::LINE, vk::CullModeFlags::NONE),
            Self::Untextured | Self::Textured => (vk::PolygonMode::FILL, vk::CullModeFlags::BACK),
        };

        GfxPipelineDesc {
            name: self.name().to_string(),
            vertex_layout: vertex_layout(),
            shaders: self.shaders(shader_dir),
            binding_layout,
            render_pass,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode,
            cull_mode,
            depth_test: true,
        }
    }
}

/// [`Vertex`] 的 AoS 布局：position, normal, uv, color
pub fn vertex_layout() -> GfxVertexLayout {
    let attribute = |location, format, offset: usize| GfxVertexAttribute {
        location,
        format,
        offset: offset as u32,
    };

    GfxVertexLayout {
        stride: size_of::<Vertex>() as u32,
        attributes: vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
            attribute(3, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Vertex, color)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_scene::{Scene, Texture};

    #[test]
    fn test_pipeline_selection_is_total() {
        let mut scene = Scene::new();
        let texture = scene.add_texture(Texture::solid("white", [255; 4]));

        let plain = Material::new("plain", glam::Vec4::ONE);
        let textured = Material::new("textured", glam::Vec4::ONE).with_texture(texture);

        assert_eq!(PipelineKind::select(None), PipelineKind::Line);
        assert_eq!(PipelineKind::select(Some(&plain)), PipelineKind::Untextured);
        assert_eq!(PipelineKind::select(Some(&textured)), PipelineKind::Textured);
    }

    #[test]
    fn test_binding_layouts() {
        let line = PipelineKind::Line.binding_layout_desc();
        assert_eq!(line.bindings.len(), 1);
        assert!(line.binding(bindings::NODE).is_some());
        assert!(line.binding(bindings::LIGHT).is_none());

        let untextured = PipelineKind::Untextured.binding_layout_desc();
        assert!(untextured.binding(bindings::TEXTURE).is_none());
        assert!(untextured.binding(bindings::AMBIENT).unwrap().optional);

        let textured = PipelineKind::Textured.binding_layout_desc();
        let texture = textured.binding(bindings::TEXTURE).unwrap();
        assert_eq!(texture.ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert!(!texture.optional);
        assert!(textured.binding(bindings::LIGHT).unwrap().optional);
    }

    #[test]
    fn test_vertex_layout_matches_vertex() {
        let layout = vertex_layout();
        assert_eq!(layout.stride, 48);
        let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }

    #[test]
    fn test_line_pipeline_is_wireframe() {
        let desc = PipelineKind::Line.pipeline_desc(
            Path::new("shaders"),
            GfxBindingLayoutHandle::default(),
            GfxRenderPassHandle::default(),
        );
        assert_eq!(desc.polygon_mode, vk::PolygonMode::LINE);
        assert_eq!(desc.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(desc.shaders.vertex, Path::new("shaders").join("line.vert.spv"));
        assert_eq!(desc.shaders.fragment, Path::new("shaders").join("line.frag.spv"));
    }
}
