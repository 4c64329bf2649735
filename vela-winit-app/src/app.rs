use anyhow::Context;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use vela_crate_tools::init_log::init_log;
use vela_gfx::vulkan::VulkanDevice;
use vela_renderer::{AppConfig, Graphics};
use vela_scene::{Camera, Scene};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::cli::ViewerArgs;

pub struct WinitApp {
    config: AppConfig,
    scene: Scene,
    camera: Camera,

    // graphics 必须先于 window 销毁
    graphics: Option<Graphics<VulkanDevice>>,
    window: Option<Window>,

    /// 事件回调中无法返回错误，先记下来，退出循环之后再返回
    error: Option<anyhow::Error>,
}
// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口
    pub fn run(args: ViewerArgs) -> anyhow::Result<()> {
        init_log();
        #[cfg(feature = "profile-with-tracy")]
        tracy_client::Client::start();

        let config = AppConfig::load(&args.config)?;
        let scene = Scene::load_gltf(&args.gltf).with_context(|| format!("failed to load {}", args.gltf.display()))?;
        log::info!("scene loaded: {} nodes, {} meshes", scene.nodes().len(), scene.meshes().len());

        let event_loop = EventLoop::new()?;
        let mut app = Self {
            config,
            scene,
            camera: Camera::default(),
            graphics: None,
            window: None,
            error: None,
        };
        event_loop.run_app(&mut app)?;

        log::info!("end run.");
        app.destroy()
    }
}
// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化 Graphics 和相机
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_settings = &self.config.window;
        let window = event_loop.create_window(
            Window::default_attributes()
                .with_title(window_settings.title.clone())
                .with_inner_size(winit::dpi::LogicalSize::new(window_settings.width, window_settings.height)),
        )?;

        let device = VulkanDevice::new(
            &window_settings.title,
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
        )?;
        let extent = Self::window_extent(window.inner_size());
        let mut graphics = Graphics::new(device, self.config.renderer.clone(), extent)?;

        self.camera = match self.scene.world_bounds() {
            Some((min, max)) => Camera::framing(min, max, 1.0),
            None => Camera::default(),
        };
        self.camera.set_aspect(extent.width, extent.height);
        graphics.set_camera(self.camera.view(), self.camera.projection());

        if let Some(light) = self.scene.first_light_node() {
            if let Err(e) = graphics.set_active_light(&self.scene, Some(light)) {
                // 出错时 graphics 也需要手动销毁
                if let Err(destroy_err) = graphics.destroy() {
                    log::error!("failed to destroy graphics: {destroy_err}");
                }
                return Err(e.into());
            }
        }

        self.graphics = Some(graphics);
        self.window = Some(window);
        Ok(())
    }

    #[inline]
    fn window_extent(size: PhysicalSize<u32>) -> vk::Extent2D {
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
// update
impl WinitApp {
    fn on_resized(&mut self, size: PhysicalSize<u32>) {
        let Some(graphics) = self.graphics.as_mut() else {
            return;
        };
        graphics.set_window_extent(Self::window_extent(size));
        self.camera.set_aspect(size.width, size.height);
        graphics.set_camera(self.camera.view(), self.camera.projection());
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let Some(graphics) = self.graphics.as_mut() else {
            return Ok(());
        };

        if graphics.render_begin()? {
            graphics.draw_scene(&self.scene)?;
            graphics.render_end()?;
        }
        tracy_client::frame_mark();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}
// destroy
impl WinitApp {
    fn destroy(mut self) -> anyhow::Result<()> {
        if let Some(mut graphics) = self.graphics.take() {
            graphics.destroy()?;
        }
        self.window = None;

        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 Graphics
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("winit event: resumed");

        if let Err(e) = self.init_after_window(event_loop) {
            self.fail(event_loop, e.context("failed to initialize graphics"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.on_resized(size);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
