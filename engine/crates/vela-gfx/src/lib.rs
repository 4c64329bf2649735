//! GPU 对象层
//!
//! 渲染核心只通过 [`GfxDevice`] 与 GPU 打交道，所有 GPU 对象都用 slotmap 的 key 作为不透明的 handle。
//! - [`vulkan::VulkanDevice`]：基于 ash + vk-mem 的实现
//! - [`mock::MockGfxDevice`]：纯内存实现，记录所有调用，用于测试

pub mod desc;
pub mod device;
pub mod error;
pub mod handles;
pub mod mock;
pub mod vulkan;

pub use device::GfxDevice;
pub use error::{GfxError, GfxResult};
