//! 渲染核心
//!
//! - [`Renderer`]：按需创建并缓存场景实体对应的 GPU 资源
//! - [`Graphics`]：每一帧的 acquire / record / submit / present，以及窗口变化后的恢复
//!
//! 两者都只通过 [`vela_gfx::GfxDevice`] 访问 GPU，测试中使用 [`vela_gfx::mock::MockGfxDevice`]。

pub mod graphics;
pub mod pipelines;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod uniforms;

pub use graphics::{FrameState, Graphics};
pub use pipelines::PipelineKind;
pub use renderer::Renderer;
pub use resources::CacheStats;
pub use settings::{AppConfig, DefaultRendererSettings, RendererSettings};
