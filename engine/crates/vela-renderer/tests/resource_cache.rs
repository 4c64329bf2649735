mod common;

use glam::{Mat4, Vec3, Vec4};
use vela_gfx::mock::MockCommand;
use vela_renderer::PipelineKind;
use vela_renderer::uniforms::{LightUniform, NodeUniform};
use vela_scene::shapes::Triangle;
use vela_scene::{Light, LightKind, Material, Mesh, Node, Primitive, Scene};

use common::{last_draw_count, new_graphics, render_frame, single_triangle_scene, teardown, three_pipelines_scene};

#[test]
fn test_single_primitive_without_material() {
    let mut graphics = new_graphics();
    let (scene, node) = single_triangle_scene();

    assert!(render_frame(&mut graphics, &scene));

    let stats = graphics.renderer().stats();
    assert_eq!(stats.primitives, 1);
    assert_eq!(stats.nodes, 1);
    assert_eq!(stats.materials, 0);
    assert_eq!(stats.binding_tables, 1);
    assert_eq!(graphics.renderer().binding_table(node, None).unwrap().kind, PipelineKind::Line);

    teardown(graphics);
}

#[test]
fn test_siblings_share_mesh() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(Mesh::new("shared", vec![Triangle::primitive(None)]));
    let root = scene.add_node(Node::new("root"));
    let a = scene.add_child(root, Node::new("a").with_mesh(mesh));
    let b = scene.add_child(root, Node::new("b").with_mesh(mesh).with_translation(Vec3::X));

    render_frame(&mut graphics, &scene);
    render_frame(&mut graphics, &scene);

    let stats = graphics.renderer().stats();
    assert_eq!(stats.primitives, 1);
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.binding_tables, 2);
    assert_ne!(
        graphics.renderer().binding_table(a, None).unwrap().table,
        graphics.renderer().binding_table(b, None).unwrap().table
    );
    assert_eq!(last_draw_count(graphics.device()), 2);

    teardown(graphics);
}

#[test]
fn test_empty_node_never_gets_record() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(None)]));
    let group = scene.add_node(Node::new("group"));
    scene.add_child(group, Node::new("leaf").with_mesh(mesh));

    for _ in 0..3 {
        render_frame(&mut graphics, &scene);
    }

    assert!(graphics.renderer().node_resources(group).is_none());
    assert!(graphics.renderer().binding_table(group, None).is_none());
    assert_eq!(graphics.renderer().stats().nodes, 1);

    teardown(graphics);
}

#[test]
fn test_binding_tables_are_not_reallocated() {
    let mut graphics = new_graphics();
    let scene = three_pipelines_scene();

    render_frame(&mut graphics, &scene);
    let stats = graphics.device().stats();
    for _ in 0..5 {
        render_frame(&mut graphics, &scene);
    }

    let after = graphics.device().stats();
    assert_eq!(after.binding_tables_created, stats.binding_tables_created);
    assert_eq!(after.binding_table_writes, stats.binding_table_writes);
    assert_eq!(after.buffers_created, stats.buffers_created);
    assert_eq!(after.textures_created, 1);
    assert_eq!(graphics.renderer().stats().binding_tables, 3);

    teardown(graphics);
}

#[test]
fn test_one_frame_lag() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();

    render_frame(&mut graphics, &scene);
    assert_eq!(last_draw_count(graphics.device()), 0);

    render_frame(&mut graphics, &scene);
    assert_eq!(last_draw_count(graphics.device()), 1);

    teardown(graphics);
}

#[test]
fn test_each_kind_draws_with_its_pipeline() {
    let mut graphics = new_graphics();
    let scene = three_pipelines_scene();

    render_frame(&mut graphics, &scene);
    render_frame(&mut graphics, &scene);

    let submission = graphics.device().submissions().last().unwrap();
    let bound: Vec<_> = submission
        .commands
        .iter()
        .filter_map(|c| match c {
            MockCommand::BindPipeline(pipeline) => Some(*pipeline),
            _ => None,
        })
        .collect();
    let expected: Vec<_> = [PipelineKind::Line, PipelineKind::Untextured, PipelineKind::Textured]
        .into_iter()
        .map(|kind| graphics.renderer().pipeline(kind))
        .collect();
    assert_eq!(bound, expected);

    teardown(graphics);
}

#[test]
fn test_uniform_upload_reads_back() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(None)]));
    let node = scene.add_node(Node::new("moved").with_mesh(mesh).with_translation(Vec3::new(1.0, 2.0, 3.0)));

    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(1.0, 4.0 / 3.0, 0.1, 100.0);
    graphics.set_camera(view, proj);

    render_frame(&mut graphics, &scene);
    assert!(graphics.render_begin().unwrap());
    let slot = graphics.current_slot().unwrap();
    graphics.draw_scene(&scene).unwrap();
    graphics.render_end().unwrap();

    let expected = NodeUniform {
        model: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        view,
        proj,
    };
    let buffers = &graphics.renderer().node_resources(node).unwrap().uniform_buffers;
    assert_eq!(graphics.device().read_buffer(buffers[slot]).unwrap(), bytemuck::bytes_of(&expected));

    // 其他 slot 的 buffer 不受影响
    let other = (slot + 1) % graphics.slot_count();
    assert_ne!(graphics.device().read_buffer(buffers[other]).unwrap(), bytemuck::bytes_of(&expected));

    teardown(graphics);
}

#[test]
fn test_world_transform_composition() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(None)]));
    let parent = scene.add_node(Node::new("parent").with_scale(Vec3::splat(2.0)));
    let child = scene.add_child(parent, Node::new("child").with_mesh(mesh).with_translation(Vec3::X));

    render_frame(&mut graphics, &scene);
    assert!(graphics.render_begin().unwrap());
    let slot = graphics.current_slot().unwrap();
    graphics.draw(&scene, parent, Mat4::from_translation(Vec3::Z)).unwrap();
    graphics.render_end().unwrap();

    let buffers = &graphics.renderer().node_resources(child).unwrap().uniform_buffers;
    let uniform: NodeUniform = bytemuck::pod_read_unaligned(graphics.device().read_buffer(buffers[slot]).unwrap());
    let expected = Mat4::from_translation(Vec3::Z) * Mat4::from_scale(Vec3::splat(2.0)) * Mat4::from_translation(Vec3::X);
    assert!(uniform.model.abs_diff_eq(expected, 1e-6));
    assert!(uniform.model.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(2.0, 0.0, 1.0), 1e-6));

    teardown(graphics);
}

#[test]
fn test_binding_table_copy_follows_slot() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();

    render_frame(&mut graphics, &scene);
    for _ in 0..graphics.slot_count() {
        assert!(graphics.render_begin().unwrap());
        let slot = graphics.current_slot().unwrap();
        graphics.draw_scene(&scene).unwrap();
        graphics.render_end().unwrap();

        let submission = graphics.device().submissions().last().unwrap();
        let copies: Vec<usize> = submission
            .commands
            .iter()
            .filter_map(|c| match c {
                MockCommand::BindBindingTable { copy, .. } => Some(*copy),
                _ => None,
            })
            .collect();
        assert_eq!(copies, vec![slot]);
    }

    teardown(graphics);
}

#[test]
fn test_active_light_follows_node() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let material = scene.add_material(Material::new("lit", Vec4::ONE));
    let mesh = scene.add_mesh(Mesh::new("tri", vec![Triangle::primitive(Some(material))]));
    let lit = scene.add_node(Node::new("lit").with_mesh(mesh));
    let light = scene.add_light(Light::new("lamp", LightKind::Point, Vec3::ONE, 1.0));
    let lamp = scene.add_node(Node::new("lamp").with_light(light));

    // 先注册 binding table，再激活光源
    render_frame(&mut graphics, &scene);
    graphics.set_active_light(&scene, Some(lamp)).unwrap();
    let table = graphics.renderer().binding_table(lit, Some(material)).unwrap().table;
    for slot in 0..graphics.slot_count() {
        let entries = graphics.device().binding_table_entries(table, slot).unwrap();
        assert!(entries.contains_key(&vela_renderer::pipelines::bindings::LIGHT));
    }

    scene.node_mut(lamp).translation = Vec3::new(0.0, 4.0, 0.0);
    assert!(graphics.render_begin().unwrap());
    let slot = graphics.current_slot().unwrap();
    graphics.draw_scene(&scene).unwrap();
    graphics.render_end().unwrap();

    let light_buffer = graphics.renderer().light_resources().unwrap().light_buffers[slot];
    let uniform: LightUniform = bytemuck::pod_read_unaligned(graphics.device().read_buffer(light_buffer).unwrap());
    assert_eq!(uniform.position, Vec4::new(0.0, 4.0, 0.0, 1.0));
    assert_eq!(graphics.renderer().stats().nodes, 2);
    assert_eq!(last_draw_count(graphics.device()), 1);

    teardown(graphics);
}

#[test]
fn test_clear_color_from_settings() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    let submission = graphics.device().submissions().last().unwrap();
    match &submission.commands[0] {
        MockCommand::BeginRenderPass { clear_color, extent, .. } => {
            assert_eq!(*clear_color, vela_renderer::DefaultRendererSettings::DEFAULT_CLEAR_COLOR);
            assert_eq!(*extent, common::EXTENT);
        }
        other => panic!("unexpected first command {other:?}"),
    }

    teardown(graphics);
}

#[test]
fn test_binding_tables_keep_pairs_apart() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let materials: Vec<_> = (0..64)
        .map(|i| scene.add_material(Material::new(format!("m{i}"), Vec4::splat(i as f32 / 64.0))))
        .collect();
    let first_mesh = scene.add_mesh(Mesh::new("first", vec![Triangle::primitive(Some(materials[63]))]));
    let second_mesh = scene.add_mesh(Mesh::new("second", vec![Triangle::primitive(Some(materials[0]))]));
    let n0 = scene.add_node(Node::new("n0").with_mesh(first_mesh));
    let n1 = scene.add_node(Node::new("n1").with_mesh(second_mesh));

    assert!(render_frame(&mut graphics, &scene));
    assert!(render_frame(&mut graphics, &scene));

    let renderer = graphics.renderer();
    let first = *renderer.binding_table(n0, Some(materials[63])).unwrap();
    let second = *renderer.binding_table(n1, Some(materials[0])).unwrap();
    assert_ne!(first.table, second.table);
    assert_ne!(first.node, second.node);
    assert!(renderer.binding_table(n0, Some(materials[0])).is_none());
    assert!(renderer.material_resources(materials[0]).is_some());
    assert_eq!(renderer.stats().binding_tables, 2);
    assert_eq!(renderer.stats().materials, 2);
    assert_eq!(last_draw_count(graphics.device()), 2);

    teardown(graphics);
}

#[test]
fn test_primitive_without_vertices_is_skipped() {
    let mut graphics = new_graphics();
    let mut scene = Scene::new();
    let broken = Primitive::new(vec![], vec![0, 1, 2], None);
    let mesh = scene.add_mesh(Mesh::new("partly-broken", vec![broken, Triangle::primitive(None)]));
    scene.add_node(Node::new("n").with_mesh(mesh));

    assert!(render_frame(&mut graphics, &scene));
    assert!(render_frame(&mut graphics, &scene));

    assert_eq!(graphics.renderer().stats().primitives, 1);
    assert_eq!(last_draw_count(graphics.device()), 1);

    teardown(graphics);
}
