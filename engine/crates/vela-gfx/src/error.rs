use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// GPU 对象层的错误
///
/// 只包含设备级别的失败；out-of-date/suboptimal 等可恢复的状况通过返回值表达，不是错误
#[derive(Error, Debug)]
pub enum GfxError {
    #[error("vulkan call failed: {0:?}")]
    Vulkan(vk::Result),

    #[error("memory allocation failed: {0}")]
    Allocation(String),

    #[error("failed to load vulkan library: {0}")]
    Loading(String),

    #[error("shader not found: {}", .0.display())]
    ShaderNotFound(PathBuf),

    #[error("surface lost")]
    SurfaceLost,

    #[error("swapchain image count changed from {old} to {new}")]
    SwapchainImageCountChanged { old: usize, new: usize },

    #[error("invalid {0} handle")]
    InvalidHandle(&'static str),

    #[error("device lost")]
    DeviceLost,

    #[error("mock device: {0}")]
    Mock(String),
}

impl From<vk::Result> for GfxError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_SURFACE_LOST_KHR => Self::SurfaceLost,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::Allocation(format!("{result:?}"))
            }
            other => Self::Vulkan(other),
        }
    }
}

impl From<ash::LoadingError> for GfxError {
    fn from(e: ash::LoadingError) -> Self {
        Self::Loading(e.to_string())
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
