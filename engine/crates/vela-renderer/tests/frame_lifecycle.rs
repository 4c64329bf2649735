mod common;

use ash::vk;
use glam::{Mat4, Vec3};
use vela_gfx::GfxError;
use vela_gfx::desc::GfxPresentResult;
use vela_renderer::FrameState;
use vela_scene::{Light, LightKind, Node};

use common::{EXTENT, last_draw_count, new_graphics, render_frame, single_triangle_scene, teardown};

const RESIZED: vk::Extent2D = vk::Extent2D {
    width: 1024,
    height: 768,
};

#[test]
fn test_steady_frames() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    assert_eq!(graphics.slot_count(), 3);
    assert_eq!(graphics.state(), FrameState::Idle);

    for frame in 0..7 {
        assert!(graphics.render_begin().unwrap());
        assert_eq!(graphics.state(), FrameState::Recording);
        assert_eq!(graphics.current_slot(), Some(frame % 3));
        graphics.draw_scene(&scene).unwrap();
        graphics.render_end().unwrap();
        assert_eq!(graphics.state(), FrameState::Idle);
    }

    assert_eq!(graphics.frame_id(), 7);
    let stats = graphics.device().stats();
    assert_eq!(stats.submits, 7);
    assert_eq!(stats.presents, 7);
    assert_eq!(stats.swapchains_created, 1);
    assert!((0..3).all(|slot| graphics.is_fence_waitable(slot)));

    teardown(graphics);
}

#[test]
fn test_submit_waits_on_rotating_semaphores() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();

    for _ in 0..4 {
        render_frame(&mut graphics, &scene);
    }

    let submissions = graphics.device().submissions();
    let waits: Vec<_> = submissions.iter().map(|s| s.wait_semaphore.unwrap()).collect();
    assert_ne!(waits[0], waits[1]);
    assert_ne!(waits[1], waits[2]);
    assert_eq!(waits[0], waits[3]);
    assert!(submissions.iter().all(|s| s.fence.is_some() && s.signal_semaphore.is_some()));

    teardown(graphics);
}

#[test]
fn test_draw_is_noop_after_begin_false() {
    let mut graphics = new_graphics();
    let (scene, node) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    graphics.set_window_extent(vk::Extent2D { width: 0, height: 0 });
    let stats = graphics.device().stats();
    let cache = graphics.renderer().stats();

    assert!(!graphics.render_begin().unwrap());
    graphics.draw_scene(&scene).unwrap();
    graphics.draw(&scene, node, Mat4::IDENTITY).unwrap();
    graphics.render_end().unwrap();

    assert_eq!(graphics.device().stats(), stats);
    assert_eq!(graphics.renderer().stats(), cache);
    assert_eq!(graphics.state(), FrameState::Idle);
    assert_eq!(graphics.frame_id(), 1);

    teardown(graphics);
}

#[test]
fn test_minimized_window() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();

    graphics.set_window_extent(vk::Extent2D { width: 0, height: 0 });
    for _ in 0..3 {
        assert!(!render_frame(&mut graphics, &scene));
    }
    assert_eq!(graphics.device().stats().acquires, 0);
    assert_eq!(graphics.device().stats().swapchains_created, 1);

    // 恢复到原来的尺寸，不需要重建 swapchain
    graphics.set_window_extent(EXTENT);
    assert!(render_frame(&mut graphics, &scene));
    assert_eq!(graphics.device().stats().swapchains_created, 1);

    teardown(graphics);
}

#[test]
fn test_resize_mid_frame() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    assert!(graphics.render_begin().unwrap());
    graphics.draw_scene(&scene).unwrap();
    graphics.device_mut().resize_surface(RESIZED);
    graphics.set_window_extent(RESIZED);
    graphics.render_end().unwrap();

    let before = graphics.device().stats();
    assert!(!graphics.render_begin().unwrap());
    assert_eq!(graphics.state(), FrameState::Idle);

    let after = graphics.device().stats();
    assert_eq!(after.swapchains_created, before.swapchains_created + 1);
    assert_eq!(after.render_targets_created, before.render_targets_created + 1);
    assert_eq!(after.pipelines_destroyed, before.pipelines_destroyed + 3);
    assert_eq!(after.pipelines_created, before.pipelines_created + 3);
    assert_eq!(after.binding_layouts_destroyed, 0);
    assert_eq!(after.wait_idles, before.wait_idles + 1);
    assert!((0..graphics.slot_count()).all(|slot| !graphics.is_fence_waitable(slot)));
    assert_eq!(graphics.viewport_extent(), RESIZED);

    // 缓存的资源在 resize 之后仍然有效
    assert!(render_frame(&mut graphics, &scene));
    assert_eq!(last_draw_count(graphics.device()), 1);
    assert_eq!(graphics.device().stats().swapchains_created, after.swapchains_created);

    teardown(graphics);
}

#[test]
fn test_resize_between_frames() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    graphics.device_mut().resize_surface(RESIZED);
    graphics.set_window_extent(RESIZED);

    let acquires = graphics.device().stats().acquires;
    assert!(!render_frame(&mut graphics, &scene));
    // 窗口尺寸变化在 acquire 之前就被发现
    assert_eq!(graphics.device().stats().acquires, acquires);
    assert!(render_frame(&mut graphics, &scene));

    teardown(graphics);
}

#[test]
fn test_out_of_date_on_acquire() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    graphics.device_mut().inject_acquire_out_of_date();
    assert!(!render_frame(&mut graphics, &scene));
    assert_eq!(graphics.device().stats().swapchains_created, 2);
    assert!(!graphics.is_fence_waitable(0));

    assert!(render_frame(&mut graphics, &scene));
    assert_eq!(graphics.frame_id(), 2);

    teardown(graphics);
}

#[test]
fn test_suboptimal_acquire_continues() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();

    graphics.device_mut().inject_acquire_suboptimal();
    assert!(render_frame(&mut graphics, &scene));
    assert!(render_frame(&mut graphics, &scene));
    assert_eq!(graphics.device().stats().swapchains_created, 1);

    teardown(graphics);
}

#[test]
fn test_out_of_date_or_suboptimal_on_present() {
    for result in [GfxPresentResult::OutOfDate, GfxPresentResult::Suboptimal] {
        let mut graphics = new_graphics();
        let (scene, _) = single_triangle_scene();

        graphics.device_mut().inject_present_result(result);
        assert!(render_frame(&mut graphics, &scene));
        assert_eq!(graphics.frame_id(), 1);

        assert!(!render_frame(&mut graphics, &scene));
        assert_eq!(graphics.device().stats().swapchains_created, 2);
        assert!(render_frame(&mut graphics, &scene));

        teardown(graphics);
    }
}

#[test]
fn test_public_recreate_pipelines() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    let cache = graphics.renderer().stats();
    graphics.recreate_pipelines().unwrap();
    assert_eq!(graphics.device().stats().pipelines_destroyed, 3);
    assert_eq!(graphics.renderer().stats(), cache);
    assert!(render_frame(&mut graphics, &scene));
    assert_eq!(last_draw_count(graphics.device()), 1);

    teardown(graphics);
}

#[test]
fn test_image_count_change_is_fatal() {
    let mut graphics = new_graphics();
    let (scene, _) = single_triangle_scene();
    render_frame(&mut graphics, &scene);

    graphics.device_mut().set_surface_image_count(2);
    graphics.device_mut().resize_surface(RESIZED);
    graphics.set_window_extent(RESIZED);

    let result = graphics.render_begin();
    assert!(matches!(result, Err(GfxError::SwapchainImageCountChanged { old: 3, new: 2 })));

    teardown(graphics);
}

#[test]
#[should_panic(expected = "render_begin while recording")]
fn test_begin_while_recording_panics() {
    let mut graphics = new_graphics();
    assert!(graphics.render_begin().unwrap());
    let _ = graphics.render_begin();
}

#[test]
fn test_destroy_after_device_lost() {
    let mut graphics = new_graphics();
    let (mut scene, _) = single_triangle_scene();
    let light = scene.add_light(Light::new("lamp", LightKind::Point, Vec3::ONE, 1.0));
    let lamp = scene.add_node(Node::new("lamp").with_light(light));
    render_frame(&mut graphics, &scene);

    graphics.device_mut().inject_device_lost();
    assert!(matches!(graphics.set_active_light(&scene, Some(lamp)), Err(GfxError::DeviceLost)));

    // wait_idle 失败时仍然释放全部对象，drop 时不会 panic
    assert!(matches!(graphics.destroy(), Err(GfxError::DeviceLost)));
    let live = graphics.device().live_objects();
    assert_eq!(live.buffers, 0);
    assert_eq!(live.pipelines, 0);
    assert_eq!(live.binding_tables, 0);
    assert_eq!(live.fences, 0);
    assert_eq!(live.semaphores, 0);
    assert_eq!(live.framebuffers, 0);
}
