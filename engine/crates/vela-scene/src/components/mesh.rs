use vela_arena::Handle;

use crate::components::material::Material;
use crate::vertex::Vertex;

/// 可以单独绘制的一组几何数据
///
/// 上传到 GPU 之后不会再变化
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Option<Handle<Material>>,
}

impl Primitive {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, material: Option<Handle<Material>>) -> Self {
        Self {
            vertices,
            indices,
            material,
        }
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// 顶点与索引都不为空才会被绘制
    #[inline]
    pub fn is_drawable(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }
}

/// 有序的 primitive 列表，可以被多个 node 共享
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, primitives: Vec<Primitive>) -> Self {
        Self {
            name: name.into(),
            primitives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Triangle;

    #[test]
    fn test_primitive_without_vertices_is_not_drawable() {
        assert!(Triangle::primitive(None).is_drawable());
        assert!(!Primitive::new(vec![], vec![0, 1, 2], None).is_drawable());
        assert!(!Primitive::new(Triangle::primitive(None).vertices, vec![], None).is_drawable());
    }
}
