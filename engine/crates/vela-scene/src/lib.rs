//! CPU 侧的场景文档模型
//!
//! 所有实体都保存在 [`Scene`] 的 arena 中，通过 [`vela_arena::Handle`] 互相引用。

pub mod camera;
pub mod components;
pub mod gltf_loader;
pub mod scene;
pub mod shapes;
pub mod vertex;

pub use camera::Camera;
pub use components::light::{Light, LightKind};
pub use components::material::Material;
pub use components::mesh::{Mesh, Primitive};
pub use components::node::Node;
pub use components::texture::Texture;
pub use scene::Scene;
pub use vertex::Vertex;
