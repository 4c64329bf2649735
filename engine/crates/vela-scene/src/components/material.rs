use vela_arena::Handle;

use crate::components::texture::Texture;

/// CPU 侧的材质数据
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,

    pub base_color: glam::Vec4,
    pub metallic: f32,
    pub roughness: f32,

    /// base color 贴图，没有贴图时使用无贴图的管线
    pub texture: Option<Handle<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        // 与 glTF 的默认材质保持一致
        Self {
            name: String::new(),
            base_color: glam::Vec4::ONE,
            metallic: 1.0,
            roughness: 1.0,
            texture: None,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: glam::Vec4) -> Self {
        Self {
            name: name.into(),
            base_color,
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, texture: Handle<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }
}
