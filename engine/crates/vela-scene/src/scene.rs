use vela_arena::{Arena, Handle};

use crate::components::light::Light;
use crate::components::material::Material;
use crate::components::mesh::Mesh;
use crate::components::node::Node;
use crate::components::texture::Texture;

/// 场景文档
///
/// 每一类实体一个 arena，再加上有序的根节点列表。
/// 加载完成后结构不再变化，只有 node 的 transform 可以被修改。
#[derive(Default)]
pub struct Scene {
    nodes: Arena<Node>,
    meshes: Arena<Mesh>,
    materials: Arena<Material>,
    textures: Arena<Texture>,
    lights: Arena<Light>,

    roots: Vec<Handle<Node>>,
}

// new & init
impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由导入器直接提供各个 arena
    pub(crate) fn from_parts(
        nodes: Arena<Node>,
        meshes: Arena<Mesh>,
        materials: Arena<Material>,
        textures: Arena<Texture>,
        lights: Arena<Light>,
        roots: Vec<Handle<Node>>,
    ) -> Self {
        Self {
            nodes,
            meshes,
            materials,
            textures,
            lights,
            roots,
        }
    }
}
// getters
impl Scene {
    #[inline]
    pub fn roots(&self) -> &[Handle<Node>] {
        &self.roots
    }

    #[inline]
    pub fn nodes(&self) -> &Arena<Node> {
        &self.nodes
    }

    #[inline]
    pub fn meshes(&self) -> &Arena<Mesh> {
        &self.meshes
    }

    #[inline]
    pub fn materials(&self) -> &Arena<Material> {
        &self.materials
    }

    #[inline]
    pub fn textures(&self) -> &Arena<Texture> {
        &self.textures
    }

    #[inline]
    pub fn lights(&self) -> &Arena<Light> {
        &self.lights
    }

    #[inline]
    pub fn node(&self, handle: Handle<Node>) -> &Node {
        &self.nodes[handle]
    }

    #[inline]
    pub fn node_mut(&mut self, handle: Handle<Node>) -> &mut Node {
        &mut self.nodes[handle]
    }

    #[inline]
    pub fn mesh(&self, handle: Handle<Mesh>) -> &Mesh {
        &self.meshes[handle]
    }

    #[inline]
    pub fn material(&self, handle: Handle<Material>) -> &Material {
        &self.materials[handle]
    }

    #[inline]
    pub fn texture(&self, handle: Handle<Texture>) -> &Texture {
        &self.textures[handle]
    }

    #[inline]
    pub fn light(&self, handle: Handle<Light>) -> &Light {
        &self.lights[handle]
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<Handle<Node>> {
        self.nodes.iter().find(|(_, node)| node.name == name).map(|(handle, _)| handle)
    }

    /// 第一个挂载了 light 的节点
    pub fn first_light_node(&self) -> Option<Handle<Node>> {
        self.nodes.iter().find(|(_, node)| node.light.is_some()).map(|(handle, _)| handle)
    }

    /// 节点在世界空间中的变换：从根节点开始依次左乘 local
    pub fn world_transform(&self, handle: Handle<Node>) -> glam::Mat4 {
        let node = &self.nodes[handle];
        match node.parent {
            Some(parent) => self.world_transform(parent) * node.local_transform(),
            None => node.local_transform(),
        }
    }

    /// 所有 mesh 顶点在世界空间中的包围盒，场景中没有顶点时返回 None
    pub fn world_bounds(&self) -> Option<(glam::Vec3, glam::Vec3)> {
        let mut bounds: Option<(glam::Vec3, glam::Vec3)> = None;
        let mut stack: Vec<(Handle<Node>, glam::Mat4)> =
            self.roots.iter().map(|root| (*root, glam::Mat4::IDENTITY)).collect();

        while let Some((handle, parent_transform)) = stack.pop() {
            let node = &self.nodes[handle];
            let world = parent_transform * node.local_transform();

            if let Some(mesh) = node.mesh {
                for vertex in self.meshes[mesh].primitives.iter().flat_map(|p| p.vertices.iter()) {
                    let p = world.transform_point3(glam::Vec3::from(vertex.position));
                    bounds = Some(match bounds {
                        Some((min, max)) => (min.min(p), max.max(p)),
                        None => (p, p),
                    });
                }
            }

            stack.extend(node.children.iter().map(|child| (*child, world)));
        }

        bounds
    }
}
// update
impl Scene {
    /// 添加一个根节点
    pub fn add_node(&mut self, mut node: Node) -> Handle<Node> {
        node.parent = None;
        let handle = self.nodes.push(node);
        self.roots.push(handle);
        handle
    }

    /// 添加 `parent` 的一个子节点，同时维护双向的 handle 引用
    pub fn add_child(&mut self, parent: Handle<Node>, mut node: Node) -> Handle<Node> {
        assert!(self.nodes.contains(parent), "parent {:?} is not a node of this scene", parent);
        node.parent = Some(parent);
        let handle = self.nodes.push(node);
        self.nodes[parent].children.push(handle);
        handle
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> Handle<Mesh> {
        self.meshes.push(mesh)
    }

    pub fn add_material(&mut self, material: Material) -> Handle<Material> {
        self.materials.push(material)
    }

    pub fn add_texture(&mut self, texture: Texture) -> Handle<Texture> {
        self.textures.push(texture)
    }

    pub fn add_light(&mut self, light: Light) -> Handle<Light> {
        self.lights.push(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::mesh::Primitive;
    use crate::shapes::Triangle;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_build_scene_without_gltf() {
        let mut scene = Scene::new();
        let texture = scene.add_texture(Texture::solid("white", [255; 4]));
        let material = scene.add_material(Material::new("mat", glam::Vec4::ONE).with_texture(texture));
        let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(Some(material))]));

        let root = scene.add_node(Node::new("root"));
        let child = scene.add_child(root, Node::new("child").with_mesh(mesh));

        assert_eq!(scene.roots(), &[root]);
        assert_eq!(scene.node(root).children, vec![child]);
        assert_eq!(scene.node(child).parent, Some(root));
        assert_eq!(scene.material(material).texture, Some(texture));
        assert_eq!(scene.find_node_by_name("child"), Some(child));
        assert_eq!(scene.find_node_by_name("missing"), None);
    }

    #[test]
    fn test_world_transform_is_parent_times_local() {
        let mut scene = Scene::new();
        let parent = scene.add_node(Node::new("parent").with_scale(Vec3::splat(2.0)));
        let child = scene.add_child(parent, Node::new("child").with_translation(Vec3::new(1.0, 0.0, 0.0)));

        let expected = Mat4::from_scale(Vec3::splat(2.0)) * Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        assert!(scene.world_transform(child).abs_diff_eq(expected, 1e-6));

        // 子节点的平移受父节点缩放的影响
        let origin = scene.world_transform(child).transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_world_bounds() {
        let mut scene = Scene::new();
        assert!(scene.world_bounds().is_none());

        let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(None)]));
        scene.add_node(Node::new("a").with_mesh(mesh).with_translation(Vec3::new(5.0, 0.0, 0.0)));

        let (min, max) = scene.world_bounds().unwrap();
        assert!(min.abs_diff_eq(Vec3::new(4.0, -1.0, 0.0), 1e-6));
        assert!(max.abs_diff_eq(Vec3::new(6.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_first_light_node() {
        let mut scene = Scene::new();
        scene.add_node(Node::new("empty"));
        assert!(scene.first_light_node().is_none());

        let light = scene.add_light(Light::default());
        let lamp = scene.add_node(Node::new("lamp").with_light(light));
        assert_eq!(scene.first_light_node(), Some(lamp));
    }

    #[test]
    #[should_panic(expected = "invalid handle")]
    fn test_dangling_mesh_handle_panics() {
        let mut other = Scene::new();
        let foreign = other.add_mesh(Mesh::new("foreign", vec![Primitive::default()]));

        let scene = Scene::new();
        let _ = scene.mesh(foreign);
    }
}
