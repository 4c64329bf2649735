//! 写入 uniform buffer 的数据，布局与 shader 中的 std140 block 一致

use glam::{Mat4, Vec3, Vec4};
use vela_scene::{Light, LightKind, Material};

/// binding 0，每个 node 每个 frame slot 一份
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeUniform {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

/// binding 1
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    /// binding 3/4 是否已经写入，没有写入时 shader 不能读取
    pub has_light: u32,
    pub _pad: u32,
}

impl MaterialUniform {
    pub fn new(material: &Material, has_light: bool) -> Self {
        Self {
            color: material.base_color,
            metallic: material.metallic,
            roughness: material.roughness,
            has_light: has_light as u32,
            _pad: 0,
        }
    }
}

/// binding 3，rgb 已经乘上了强度
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AmbientUniform {
    pub color: Vec4,
}

impl AmbientUniform {
    pub fn new(color: [f32; 3], intensity: f32) -> Self {
        Self {
            color: (Vec3::from(color) * intensity).extend(1.0),
        }
    }
}

/// binding 4
///
/// `position.w == 0` 时 xyz 是方向光的照射方向，否则是光源的世界坐标
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub position: Vec4,
    pub color: Vec4,
}

impl LightUniform {
    /// 光源沿自身的 -Z 方向照射
    pub fn new(light: &Light, world: Mat4) -> Self {
        let position = match light.kind {
            LightKind::Directional => world.transform_vector3(Vec3::NEG_Z).normalize_or_zero().extend(0.0),
            LightKind::Point | LightKind::Spot { .. } => world.transform_point3(Vec3::ZERO).extend(1.0),
        };
        Self {
            position,
            color: (light.color * light.intensity).extend(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_std140() {
        assert_eq!(size_of::<NodeUniform>(), 192);
        assert_eq!(size_of::<MaterialUniform>(), 32);
        assert_eq!(size_of::<AmbientUniform>(), 16);
        assert_eq!(size_of::<LightUniform>(), 32);
    }

    #[test]
    fn test_light_uniform_from_world() {
        let point = Light::new("p", LightKind::Point, Vec3::new(1.0, 0.5, 0.0), 2.0);
        let uniform = LightUniform::new(&point, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(uniform.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(uniform.color, Vec4::new(2.0, 1.0, 0.0, 1.0));

        let sun = Light::new("sun", LightKind::Directional, Vec3::ONE, 1.0);
        let rotate = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let uniform = LightUniform::new(&sun, Mat4::from_translation(Vec3::splat(10.0)) * rotate);
        assert!(uniform.position.abs_diff_eq(Vec4::new(-1.0, 0.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_ambient_premultiplied() {
        let ambient = AmbientUniform::new([0.5, 1.0, 0.0], 0.2);
        assert!(ambient.color.abs_diff_eq(Vec4::new(0.1, 0.2, 0.0, 1.0), 1e-6));
    }
}
