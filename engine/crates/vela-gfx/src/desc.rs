//! 创建 GPU 对象所需的描述信息
//!
//! 直接使用 ash 的 vk 类型表达格式、usage 等枚举，Mock 实现也共用这些类型

use std::path::PathBuf;

use ash::vk;

use crate::handles::{
    GfxBindingLayoutHandle, GfxBufferHandle, GfxCommandBufferHandle, GfxFenceHandle, GfxFramebufferHandle,
    GfxImageHandle, GfxRenderPassHandle, GfxSamplerHandle, GfxSemaphoreHandle,
};

#[derive(Debug, Clone)]
pub struct GfxBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub name: String,
}

impl GfxBufferDesc {
    pub fn vertex(size: usize, name: impl Into<String>) -> Self {
        Self {
            size: size as vk::DeviceSize,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            name: name.into(),
        }
    }

    pub fn index(size: usize, name: impl Into<String>) -> Self {
        Self {
            size: size as vk::DeviceSize,
            usage: vk::BufferUsageFlags::INDEX_BUFFER,
            name: name.into(),
        }
    }

    pub fn uniform(size: usize, name: impl Into<String>) -> Self {
        Self {
            size: size as vk::DeviceSize,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            name: name.into(),
        }
    }
}

/// 2D 贴图，像素数据在创建时一次性上传
#[derive(Debug, Clone)]
pub struct GfxTextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub name: String,
}

impl GfxTextureDesc {
    #[inline]
    pub fn rgba8(width: u32, height: u32, name: impl Into<String>) -> Self {
        Self {
            width,
            height,
            format: vk::Format::R8G8B8A8_SRGB,
            name: name.into(),
        }
    }

    /// 按格式计算的像素数据字节数，只支持 4 字节的格式
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub address_mode: vk::SamplerAddressMode,
}

impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
        }
    }
}

/// binding layout 中的一个 binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxBindingDesc {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
    /// 可以不写入的 binding，对应 PARTIALLY_BOUND
    pub optional: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GfxBindingLayoutDesc {
    pub bindings: Vec<GfxBindingDesc>,
    pub name: String,
}

impl GfxBindingLayoutDesc {
    pub fn binding(&self, binding: u32) -> Option<&GfxBindingDesc> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}

/// binding table 中某个 binding 指向的资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxBindingResource {
    UniformBuffer {
        buffer: GfxBufferHandle,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    CombinedImageSampler {
        image: GfxImageHandle,
        sampler: GfxSamplerHandle,
    },
}

impl GfxBindingResource {
    /// 整个 buffer 作为 uniform buffer
    #[inline]
    pub fn whole_buffer(buffer: GfxBufferHandle) -> Self {
        Self::UniformBuffer {
            buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }

    #[inline]
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
            Self::CombinedImageSampler { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxBindingWrite {
    pub binding: u32,
    pub resource: GfxBindingResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxVertexAttribute {
    pub location: u32,
    pub format: vk::Format,
    pub offset: u32,
}

/// 单个 binding 的 AoS 顶点布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxVertexLayout {
    pub stride: u32,
    pub attributes: Vec<GfxVertexAttribute>,
}

/// vertex + fragment 两个 SPIR-V 文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxShaderPair {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GfxPipelineDesc {
    pub name: String,
    pub vertex_layout: GfxVertexLayout,
    pub shaders: GfxShaderPair,
    pub binding_layout: GfxBindingLayoutHandle,
    pub render_pass: GfxRenderPassHandle,
    pub topology: vk::PrimitiveTopology,
    /// LINE 需要 fillModeNonSolid
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub depth_test: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GfxSwapchainDesc {
    /// 期望的尺寸；surface 自己规定了尺寸时以 surface 为准
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub surface_format: vk::SurfaceFormatKHR,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxSwapchainInfo {
    pub extent: vk::Extent2D,
    pub image_count: usize,
    pub color_format: vk::Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxRenderTargetsDesc {
    pub depth_format: vk::Format,
}

/// 与 swapchain 绑定的渲染目标：render pass，以及每张 swapchain image 一份 depth buffer 和 framebuffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxRenderTargets {
    pub render_pass: GfxRenderPassHandle,
    pub framebuffers: Vec<GfxFramebufferHandle>,
    pub depth_images: Vec<GfxImageHandle>,
    pub extent: vk::Extent2D,
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxAcquireResult {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxPresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Debug, Clone, Copy)]
pub struct GfxSubmitDesc {
    pub command_buffer: GfxCommandBufferHandle,
    pub wait_semaphore: Option<GfxSemaphoreHandle>,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: Option<GfxSemaphoreHandle>,
    pub fence: Option<GfxFenceHandle>,
}

/// 覆盖整个 extent 的 viewport，深度范围 [0, 1]
#[inline]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

#[inline]
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}
