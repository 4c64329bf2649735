//! glTF viewer：winit 窗口 + Vulkan 后端的 [`vela_renderer::Graphics`]

pub mod app;
pub mod cli;
