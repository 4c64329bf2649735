use vela_arena::Handle;

use crate::components::material::Material;
use crate::components::mesh::Primitive;
use crate::vertex::Vertex;

/// 坐标系：RightHand, X-Right, Y-Up
///
/// 位于 XY 平面上的正立三角形，法线 +Z
///
/// 三角形绕序: CCW
///
/// ```text
///          y^
///           |
///           C (red)
///          /|\
///         / | \
///        /  |  \
///       /   |   \
///    A------+------B---->x
/// (green)   |   (blue)
/// ```
pub struct Triangle;

impl Triangle {
    const VERTICES: [Vertex; 3] = [
        Vertex::new([-1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0], [0.0, 1.0, 0.0, 1.0]), // A
        Vertex::new([1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0], [0.0, 0.0, 1.0, 1.0]),  // B
        Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.0], [1.0, 0.0, 0.0, 1.0]),   // C
    ];

    const INDICES: [u32; 3] = [0, 1, 2];

    pub fn primitive(material: Option<Handle<Material>>) -> Primitive {
        Primitive::new(Self::VERTICES.to_vec(), Self::INDICES.to_vec(), material)
    }
}

/// 位于 XZ 平面上的正方形，法线 +Y，边长为 2
///
/// ```text
///   D-------C
///   |       |
///   |   O   |---->x
///   |       |
///   A-------B
///       |
///       v z
/// ```
pub struct Quad;

impl Quad {
    const VERTICES: [Vertex; 4] = [
        Vertex::new([-1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0], [1.0; 4]),  // A
        Vertex::new([1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0], [1.0; 4]),   // B
        Vertex::new([1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0], [1.0; 4]),  // C
        Vertex::new([-1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0], [1.0; 4]), // D
    ];

    const INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    pub fn primitive(material: Option<Handle<Material>>) -> Primitive {
        Primitive::new(Self::VERTICES.to_vec(), Self::INDICES.to_vec(), material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_are_ccw_facing_normal() {
        for primitive in [Triangle::primitive(None), Quad::primitive(None)] {
            for tri in primitive.indices.chunks(3) {
                let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| glam::Vec3::from(primitive.vertices[i as usize].position));
                let face_normal = (b - a).cross(c - a).normalize();
                let vertex_normal = glam::Vec3::from(primitive.vertices[tri[0] as usize].normal);
                assert!(face_normal.abs_diff_eq(vertex_normal, 1e-6));
            }
        }
    }
}
