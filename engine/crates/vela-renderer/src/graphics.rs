use ash::vk;
use glam::Mat4;
use vela_arena::Handle;
use vela_gfx::desc::{
    GfxAcquireResult, GfxPresentResult, GfxRenderTargets, GfxRenderTargetsDesc, GfxSubmitDesc, GfxSwapchainDesc,
    GfxSwapchainInfo, full_scissor, full_viewport,
};
use vela_gfx::handles::{GfxCommandBufferHandle, GfxFenceHandle, GfxSemaphoreHandle};
use vela_gfx::{GfxDevice, GfxError, GfxResult};
use vela_scene::{Light, Node, Scene};

use crate::renderer::Renderer;
use crate::settings::RendererSettings;
use crate::uniforms::{LightUniform, NodeUniform};

/// 帧生命周期的状态
///
/// `Idle -> AcquireRequested -> Recording -> Submitted -> Idle`，
/// 以及短暂的 `ResizeRecovery`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    AcquireRequested,
    Recording,
    Submitted,
    ResizeRecovery,
}

/// 每张 swapchain image 一份
struct FrameSlot {
    fence: GfxFenceHandle,
    /// resize 之后 fence 可能永远不会被 signal，这时不能等待
    fence_waitable: bool,
    rendered_semaphore: GfxSemaphoreHandle,
    command_buffer: GfxCommandBufferHandle,
}

/// 正在录制的这一帧
#[derive(Debug, Clone, Copy)]
struct CurrentFrame {
    image_index: u32,
    image_available: GfxSemaphoreHandle,
}

/// 驱动每一帧的同步协议
///
/// CPU 为一张 swapchain image 录制命令的同时，GPU 在消费另一张。
/// frame slot 就是 acquire 得到的 image index；image-available semaphore 单独组成一个环，每帧轮换。
pub struct Graphics<D: GfxDevice> {
    device: D,
    renderer: Renderer,
    settings: RendererSettings,

    swapchain: GfxSwapchainInfo,
    render_targets: Option<GfxRenderTargets>,
    slots: Vec<FrameSlot>,
    image_available_semaphores: Vec<GfxSemaphoreHandle>,
    next_semaphore: usize,

    /// 窗口最新的 framebuffer 尺寸
    window_extent: vk::Extent2D,
    /// 创建或上一次 recovery 时的窗口尺寸
    recorded_window_extent: vk::Extent2D,
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
    swapchain_dirty: bool,

    state: FrameState,
    current: Option<CurrentFrame>,
    frame_id: u64,

    view: Mat4,
    projection: Mat4,

    destroyed: bool,
}

// new & init
impl<D: GfxDevice> Graphics<D> {
    pub fn new(mut device: D, settings: RendererSettings, window_extent: vk::Extent2D) -> GfxResult<Self> {
        let _span = tracy_client::span!("Graphics::new");

        let swapchain = device.create_swapchain(&Self::swapchain_desc(&settings, window_extent))?;
        let render_targets = device.create_render_targets(&GfxRenderTargetsDesc {
            depth_format: settings.depth_format.vk(),
        })?;
        log::info!(
            "swapchain created: {}x{}, {} images, {:?}",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.image_count,
            swapchain.color_format
        );

        let slot_count = swapchain.image_count;
        let mut slots = Vec::with_capacity(slot_count);
        let mut image_available_semaphores = Vec::with_capacity(slot_count);
        for idx in 0..slot_count {
            slots.push(FrameSlot {
                fence: device.create_fence(true, &format!("frame-in-flight-{idx}"))?,
                fence_waitable: true,
                rendered_semaphore: device.create_semaphore(&format!("image-rendered-{idx}"))?,
                command_buffer: device.create_command_buffer(&format!("frame-{idx}"))?,
            });
            image_available_semaphores.push(device.create_semaphore(&format!("image-available-{idx}"))?);
        }

        let renderer = Renderer::new(&mut device, &settings, slot_count, &render_targets)?;

        Ok(Self {
            device,
            renderer,
            settings,

            swapchain,
            render_targets: Some(render_targets),
            slots,
            image_available_semaphores,
            next_semaphore: 0,

            window_extent,
            recorded_window_extent: window_extent,
            viewport: full_viewport(swapchain.extent),
            scissor: full_scissor(swapchain.extent),
            swapchain_dirty: false,

            state: FrameState::Idle,
            current: None,
            frame_id: 0,

            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,

            destroyed: false,
        })
    }

    fn swapchain_desc(settings: &RendererSettings, extent: vk::Extent2D) -> GfxSwapchainDesc {
        GfxSwapchainDesc {
            extent,
            present_mode: settings.present_mode.vk(),
            surface_format: settings.surface_format(),
        }
    }
}
// getters
impl<D: GfxDevice> Graphics<D> {
    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 测试中用于模拟窗口变化
    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// 已经提交的帧数
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn viewport_extent(&self) -> vk::Extent2D {
        self.scissor.extent
    }

    #[inline]
    pub fn swapchain_info(&self) -> GfxSwapchainInfo {
        self.swapchain
    }

    /// 正在录制时的 frame slot
    #[inline]
    pub fn current_slot(&self) -> Option<usize> {
        self.current.map(|frame| frame.image_index as usize)
    }

    #[inline]
    pub fn is_fence_waitable(&self, slot: usize) -> bool {
        self.slots[slot].fence_waitable
    }

    #[inline]
    fn render_targets(&self) -> &GfxRenderTargets {
        match &self.render_targets {
            Some(targets) => targets,
            None => panic!("render targets are only missing during resize recovery"),
        }
    }
}
// update
impl<D: GfxDevice> Graphics<D> {
    #[inline]
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    /// 窗口层上报的 framebuffer 尺寸，下一次 `render_begin` 时生效
    #[inline]
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    /// 会等待 GPU 空闲
    pub fn set_active_light(&mut self, scene: &Scene, node: Option<Handle<Node>>) -> GfxResult<()> {
        assert_ne!(self.state, FrameState::Recording, "can not change light while recording");
        self.device.wait_idle()?;
        self.renderer.set_active_light(&mut self.device, scene, node)
    }

    /// 会等待 GPU 空闲
    pub fn recreate_pipelines(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::recreate_pipelines");
        assert_ne!(self.state, FrameState::Recording, "can not recreate pipelines while recording");
        self.device.wait_idle()?;

        let Self {
            device,
            renderer,
            render_targets,
            ..
        } = self;
        let Some(render_targets) = render_targets.as_ref() else {
            panic!("render targets are only missing during resize recovery");
        };
        renderer.recreate_pipelines(device, render_targets)
    }

    /// 返回 false 时这一帧不能绘制：窗口最小化，或者刚刚重建了 swapchain
    pub fn render_begin(&mut self) -> GfxResult<bool> {
        let _span = tracy_client::span!("Graphics::render_begin");
        assert_ne!(self.state, FrameState::Recording, "render_begin while recording");

        if self.window_extent.width == 0 || self.window_extent.height == 0 {
            log::debug!("window is minimized, skip frame");
            return Ok(false);
        }
        if self.swapchain_dirty || self.window_extent != self.recorded_window_extent {
            self.resize_recovery()?;
            return Ok(false);
        }

        self.state = FrameState::AcquireRequested;
        let image_available = self.image_available_semaphores[self.next_semaphore];
        self.next_semaphore = (self.next_semaphore + 1) % self.image_available_semaphores.len();

        let image_index = match self.device.acquire_next_image(image_available)? {
            GfxAcquireResult::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    log::warn!("swapchain is suboptimal for the surface");
                }
                image_index
            }
            GfxAcquireResult::OutOfDate => {
                log::warn!("swapchain is out of date on acquire");
                self.resize_recovery()?;
                return Ok(false);
            }
        };
        assert!(
            (image_index as usize) < self.slots.len(),
            "acquired image {image_index} out of {} slots",
            self.slots.len()
        );

        let slot = &mut self.slots[image_index as usize];
        if slot.fence_waitable {
            let _span = tracy_client::span!("wait frame fence");
            self.device.wait_fence(slot.fence)?;
        }
        self.device.reset_fence(slot.fence)?;
        slot.fence_waitable = false;

        let cmd = slot.command_buffer;
        let (render_pass, framebuffer) = {
            let targets = self.render_targets();
            (targets.render_pass, targets.framebuffers[image_index as usize])
        };
        self.device.begin_command_buffer(cmd)?;
        self.device.cmd_begin_render_pass(
            cmd,
            render_pass,
            framebuffer,
            self.swapchain.extent,
            self.settings.clear_color,
        );
        self.device.cmd_set_viewport_scissor(cmd, self.viewport, self.scissor);

        self.current = Some(CurrentFrame {
            image_index,
            image_available,
        });
        self.state = FrameState::Recording;
        Ok(true)
    }

    /// 深度优先绘制 `node` 及其子节点，world = parent * local
    ///
    /// 资源还没有缓存的节点在这一帧只注册资源，下一帧才会被绘制
    pub fn draw(&mut self, scene: &Scene, node: Handle<Node>, parent_transform: Mat4) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::draw");
        if self.state != FrameState::Recording {
            log::warn!("draw called outside of recording, ignored");
            return Ok(());
        }
        self.draw_recursive(scene, node, parent_transform)
    }

    pub fn draw_scene(&mut self, scene: &Scene) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::draw_scene");
        if self.state != FrameState::Recording {
            log::warn!("draw_scene called outside of recording, ignored");
            return Ok(());
        }
        for root in scene.roots() {
            self.draw_recursive(scene, *root, Mat4::IDENTITY)?;
        }
        Ok(())
    }

    pub fn render_end(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::render_end");
        if self.state != FrameState::Recording {
            log::warn!("render_end called outside of recording, ignored");
            return Ok(());
        }
        let Some(current) = self.current.take() else {
            panic!("recording without an acquired image");
        };
        let slot = &mut self.slots[current.image_index as usize];

        self.device.cmd_end_render_pass(slot.command_buffer);
        self.device.end_command_buffer(slot.command_buffer)?;
        self.device.submit(&GfxSubmitDesc {
            command_buffer: slot.command_buffer,
            wait_semaphore: Some(current.image_available),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: Some(slot.rendered_semaphore),
            fence: Some(slot.fence),
        })?;
        slot.fence_waitable = true;
        self.state = FrameState::Submitted;

        match self.device.present(current.image_index, slot.rendered_semaphore)? {
            GfxPresentResult::Presented => {}
            GfxPresentResult::Suboptimal => {
                log::warn!("swapchain is suboptimal on present");
                self.swapchain_dirty = true;
            }
            GfxPresentResult::OutOfDate => {
                log::warn!("swapchain is out of date on present");
                self.swapchain_dirty = true;
            }
        }

        self.frame_id += 1;
        self.state = FrameState::Idle;
        Ok(())
    }
}
// tools
impl<D: GfxDevice> Graphics<D> {
    /// 等待 GPU 空闲后按窗口尺寸重建 swapchain、render target 与 pipeline
    fn resize_recovery(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::resize_recovery");
        self.state = FrameState::ResizeRecovery;
        self.current = None;
        log::info!(
            "resize recovery: window {}x{}, swapchain {}x{}",
            self.window_extent.width,
            self.window_extent.height,
            self.swapchain.extent.width,
            self.swapchain.extent.height
        );

        self.device.wait_idle()?;
        if let Some(targets) = self.render_targets.take() {
            self.device.destroy_render_targets(targets);
        }

        let swapchain = self.device.create_swapchain(&Self::swapchain_desc(&self.settings, self.window_extent))?;
        if swapchain.image_count != self.swapchain.image_count {
            return Err(GfxError::SwapchainImageCountChanged {
                old: self.swapchain.image_count,
                new: swapchain.image_count,
            });
        }
        let render_targets = self.device.create_render_targets(&GfxRenderTargetsDesc {
            depth_format: self.settings.depth_format.vk(),
        })?;
        self.renderer.recreate_pipelines(&mut self.device, &render_targets)?;

        self.swapchain = swapchain;
        self.render_targets = Some(render_targets);
        self.viewport = full_viewport(swapchain.extent);
        self.scissor = full_scissor(swapchain.extent);
        self.recorded_window_extent = self.window_extent;
        self.swapchain_dirty = false;
        // 之前的 fence 不一定会再被 signal
        for slot in &mut self.slots {
            slot.fence_waitable = false;
        }

        log::info!(
            "swapchain recreated: {}x{}, {} images",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.image_count
        );
        self.state = FrameState::Idle;
        Ok(())
    }

    fn draw_recursive(&mut self, scene: &Scene, node: Handle<Node>, parent_transform: Mat4) -> GfxResult<()> {
        let scene_node = scene.node(node);
        let world = parent_transform * scene_node.local_transform();

        if scene_node.is_drawable() {
            if self.is_node_cached(scene, node) {
                self.draw_node(scene, node, world)?;
            } else {
                self.register_node(scene, node)?;
            }
        }

        for child in &scene_node.children {
            self.draw_recursive(scene, *child, world)?;
        }
        Ok(())
    }

    /// node、primitive 以及 binding table 都已经存在
    fn is_node_cached(&self, scene: &Scene, node: Handle<Node>) -> bool {
        if self.renderer.node_resources(node).is_none() {
            return false;
        }
        let Some(mesh) = scene.node(node).mesh else {
            return true;
        };
        scene.mesh(mesh).primitives.iter().filter(|p| p.is_drawable()).all(|primitive| {
            self.renderer.primitive_resources(primitive).is_some()
                && self.renderer.binding_table(node, primitive.material).is_some()
        })
    }

    fn register_node(&mut self, scene: &Scene, node: Handle<Node>) -> GfxResult<()> {
        let scene_node = scene.node(node);
        log::debug!("register node {}, drawn from next frame", scene_node.name);

        self.renderer.ensure_node_resources(&mut self.device, scene, node)?;
        let Some(mesh) = scene_node.mesh else {
            return Ok(());
        };
        for primitive in scene.mesh(mesh).primitives.iter().filter(|p| p.is_drawable()) {
            self.renderer.ensure_primitive_resources(&mut self.device, primitive)?;
            self.renderer.ensure_binding_table(&mut self.device, scene, node, primitive.material)?;
        }
        Ok(())
    }

    fn draw_node(&mut self, scene: &Scene, node: Handle<Node>, world: Mat4) -> GfxResult<()> {
        let Some(current) = self.current else {
            panic!("draw without an acquired image");
        };
        let slot = current.image_index as usize;
        let cmd = self.slots[slot].command_buffer;
        let scene_node = scene.node(node);

        self.renderer.write_node_uniforms(
            &mut self.device,
            node,
            slot,
            &NodeUniform {
                model: world,
                view: self.view,
                proj: self.projection,
            },
        )?;

        if let Some(light) = scene_node.light.filter(|_| self.renderer.active_light_node() == Some(node)) {
            let light: &Light = scene.light(light);
            self.renderer.write_light_uniforms(&mut self.device, slot, &LightUniform::new(light, world))?;
        }

        let Some(mesh) = scene_node.mesh else {
            return Ok(());
        };
        for primitive in scene.mesh(mesh).primitives.iter().filter(|p| p.is_drawable()) {
            let Some(geometry) = self.renderer.primitive_resources(primitive).copied() else {
                panic!("primitive of node {} is not registered", scene_node.name);
            };
            let Some(table) = self.renderer.binding_table(node, primitive.material).copied() else {
                panic!("binding table of node {} is not registered", scene_node.name);
            };
            if let Some(material) = primitive.material {
                self.renderer.write_material_uniforms(&mut self.device, scene, material, slot)?;
            }

            let pipeline = self.renderer.pipeline(table.kind);
            self.device.cmd_bind_pipeline(cmd, pipeline);
            self.device.cmd_bind_binding_table(cmd, pipeline, table.table, slot);
            self.device.cmd_bind_vertex_buffer(cmd, geometry.vertex_buffer);
            self.device.cmd_bind_index_buffer(cmd, geometry.index_buffer);
            self.device.cmd_draw_indexed(cmd, geometry.index_count, 1);
        }
        Ok(())
    }
}
// destroy
impl<D: GfxDevice> Graphics<D> {
    /// 即使 wait_idle 失败也会销毁全部对象，之后再返回该错误
    pub fn destroy(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Graphics::destroy");
        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            log::error!("wait idle failed before destroy: {e}");
        }

        self.renderer.destroy(&mut self.device);
        for slot in self.slots.drain(..) {
            self.device.destroy_fence(slot.fence);
            self.device.destroy_semaphore(slot.rendered_semaphore);
        }
        for semaphore in self.image_available_semaphores.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
        if let Some(targets) = self.render_targets.take() {
            self.device.destroy_render_targets(targets);
        }
        self.device.destroy_swapchain();

        self.state = FrameState::Idle;
        self.destroyed = true;
        log::info!("graphics destroyed after {} frames", self.frame_id);
        idle
    }
}
impl<D: GfxDevice> Drop for Graphics<D> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            if !std::thread::panicking() {
                assert!(self.destroyed, "Graphics must be destroyed manually.");
            }
        }
    }
}
