/// 透视相机
///
/// 右手系，Y-Up；投影矩阵输出 Vulkan 的裁剪空间：Y 轴向下，深度范围 [0, 1]
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: glam::Vec3,
    pub target: glam::Vec3,
    pub up: glam::Vec3,

    /// 垂直方向的视角，弧度
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: glam::vec3(0.0, 0.0, 5.0),
            target: glam::Vec3::ZERO,
            up: glam::Vec3::Y,
            fov_y: 45_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

// new & init
impl Camera {
    /// 放置一个沿 -Z 方向观察包围盒的相机，包围盒完整地落在视野中
    pub fn framing(min: glam::Vec3, max: glam::Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            aspect,
            ..Default::default()
        };

        let center = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(0.01);
        let distance = radius / (camera.fov_y * 0.5).sin();

        camera.target = center;
        camera.position = center + glam::Vec3::Z * distance;
        camera.near = (distance - radius).max(0.01) * 0.5;
        camera.far = (distance + radius) * 2.0;
        camera
    }
}
// getters
impl Camera {
    #[inline]
    pub fn view(&self) -> glam::Mat4 {
        glam::Mat4::look_at_rh(self.position, self.target, self.up)
    }

    #[inline]
    pub fn projection(&self) -> glam::Mat4 {
        let mut proj = glam::Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        // Vulkan 的 NDC 中 Y 轴向下
        proj.y_axis.y *= -1.0;
        proj
    }
}
// update
impl Camera {
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height != 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn test_vulkan_clip_space() {
        let camera = Camera::default();
        let clip_from_world = camera.projection() * camera.view();

        // 目标点上方的点在 NDC 中 y 为负
        let above = clip_from_world * Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert!(above.y / above.w < 0.0);

        // near 平面上的点深度为 0
        let near = clip_from_world * Vec4::new(0.0, 0.0, 5.0 - camera.near, 1.0);
        assert!((near.z / near.w).abs() < 1e-4);
    }

    #[test]
    fn test_framing_contains_bounds() {
        let camera = Camera::framing(Vec3::splat(-3.0), Vec3::splat(3.0), 1.0);
        let clip_from_world = camera.projection() * camera.view();

        for corner in [Vec3::splat(-3.0), Vec3::splat(3.0), Vec3::new(-3.0, 3.0, 3.0)] {
            let clip = clip_from_world * corner.extend(1.0);
            let ndc = clip.truncate() / clip.w;
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{corner} => {ndc}");
            assert!((0.0..=1.0).contains(&ndc.z));
        }
    }
}
