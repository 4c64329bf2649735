#![allow(dead_code)]

use ash::vk;
use glam::Vec4;
use vela_arena::Handle;
use vela_crate_tools::init_log::init_test_log;
use vela_gfx::mock::{MockCommand, MockGfxDevice};
use vela_renderer::{Graphics, RendererSettings};
use vela_scene::shapes::{Quad, Triangle};
use vela_scene::{Material, Mesh, Node, Scene, Texture};

pub const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

pub fn new_graphics() -> Graphics<MockGfxDevice> {
    init_test_log();
    Graphics::new(MockGfxDevice::new(EXTENT), RendererSettings::default(), EXTENT).unwrap()
}

/// 返回 render_begin 的结果
pub fn render_frame(graphics: &mut Graphics<MockGfxDevice>, scene: &Scene) -> bool {
    if !graphics.render_begin().unwrap() {
        return false;
    }
    graphics.draw_scene(scene).unwrap();
    graphics.render_end().unwrap();
    true
}

pub fn teardown(mut graphics: Graphics<MockGfxDevice>) {
    graphics.destroy().unwrap();
    let live = graphics.device().live_objects();
    assert_eq!(live.buffers, 0);
    assert_eq!(live.images, 0);
    assert_eq!(live.samplers, 0);
    assert_eq!(live.pipelines, 0);
    assert_eq!(live.binding_layouts, 0);
    assert_eq!(live.binding_tables, 0);
    assert_eq!(live.fences, 0);
    assert_eq!(live.semaphores, 0);
    assert_eq!(live.render_passes, 0);
    assert_eq!(live.framebuffers, 0);
}

/// 最近一次 submit 中的 draw call 数量
pub fn last_draw_count(device: &MockGfxDevice) -> usize {
    device.submissions().last().map_or(0, |submission| {
        submission.commands.iter().filter(|c| matches!(c, MockCommand::DrawIndexed { .. })).count()
    })
}

/// 一个根节点，挂着一个三角形，没有材质
pub fn single_triangle_scene() -> (Scene, Handle<Node>) {
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(Mesh::new("triangle", vec![Triangle::primitive(None)]));
    let node = scene.add_node(Node::new("triangle").with_mesh(mesh));
    (scene, node)
}

/// 三个根节点，分别使用三种管线
pub fn three_pipelines_scene() -> Scene {
    let mut scene = Scene::new();
    let texture = scene.add_texture(Texture::solid("checker", [200, 200, 200, 255]));
    let plain = scene.add_material(Material::new("plain", Vec4::new(0.8, 0.2, 0.2, 1.0)));
    let textured = scene.add_material(Material::new("textured", Vec4::ONE).with_texture(texture));

    let wire = scene.add_mesh(Mesh::new("wire", vec![Triangle::primitive(None)]));
    let solid = scene.add_mesh(Mesh::new("solid", vec![Quad::primitive(Some(plain))]));
    let decal = scene.add_mesh(Mesh::new("decal", vec![Quad::primitive(Some(textured))]));

    scene.add_node(Node::new("wire").with_mesh(wire));
    scene.add_node(Node::new("solid").with_mesh(solid));
    scene.add_node(Node::new("decal").with_mesh(decal));
    scene
}
