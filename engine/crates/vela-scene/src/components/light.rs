#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

/// 点光源/方向光/聚光灯，位置来自挂载它的 node
#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub color: glam::Vec3,
    pub intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: LightKind::Point,
            color: glam::Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl Light {
    pub fn new(name: impl Into<String>, kind: LightKind, color: glam::Vec3, intensity: f32) -> Self {
        Self {
            name: name.into(),
            kind,
            color,
            intensity,
        }
    }
}
