use vela_arena::Handle;

use crate::components::light::Light;
use crate::components::mesh::Mesh;

/// 场景树中的一个节点
///
/// parent 和 children 都只是 handle，节点本身由 [`crate::Scene`] 的 arena 持有
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,

    pub mesh: Option<Handle<Mesh>>,
    pub light: Option<Handle<Light>>,

    pub parent: Option<Handle<Node>>,
    pub children: Vec<Handle<Node>>,

    pub translation: glam::Vec3,
    pub rotation: glam::Quat,
    pub scale: glam::Vec3,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            mesh: None,
            light: None,
            parent: None,
            children: vec![],
            translation: glam::Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            scale: glam::Vec3::ONE,
        }
    }
}

// new & init
impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: Handle<Mesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_light(mut self, light: Handle<Light>) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_translation(mut self, translation: glam::Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: glam::Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: glam::Vec3) -> Self {
        self.scale = scale;
        self
    }
}
// getters
impl Node {
    /// local = T * R * S：先缩放，再旋转，最后平移
    #[inline]
    pub fn local_transform(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 既没有 mesh 也没有 light 的节点不需要任何 GPU 资源
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.mesh.is_some() || self.light.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Quat, Vec3};

    #[test]
    fn test_local_transform_order() {
        let node = Node::new("n")
            .with_translation(Vec3::new(10.0, 0.0, 0.0))
            .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));

        let expected = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2)
            * Mat4::from_scale(Vec3::splat(2.0));
        assert!(node.local_transform().abs_diff_eq(expected, 1e-5));

        // (1,0,0) 缩放到 (2,0,0)，绕 z 旋转到 (0,2,0)，再平移到 (10,2,0)
        let p = node.local_transform().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(10.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn test_default_node_is_not_drawable() {
        assert!(!Node::default().is_drawable());
        assert_eq!(Node::default().local_transform(), Mat4::IDENTITY);
    }
}
