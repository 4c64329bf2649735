use ash::vk;
use vk_mem::Alloc;

use crate::desc::{GfxBufferDesc, GfxSamplerDesc, GfxTextureDesc};
use crate::error::{GfxError, GfxResult};
use crate::vulkan::context::VkCore;
use crate::vulkan::swapchain::color_subresource_range;

/// host 可见并且持久映射的 buffer
pub struct VkBuffer {
    pub(crate) handle: vk::Buffer,
    allocation: vk_mem::Allocation,
    map_ptr: *mut u8,
    size: vk::DeviceSize,
    name: String,
}

// new & init
impl VkBuffer {
    /// 优先使用 device memory，需要 host 可以随机访问
    pub fn new(core: &VkCore, desc: &GfxBufferDesc) -> GfxResult<Self> {
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            ..Default::default()
        };

        let (handle, mut allocation) = unsafe { core.allocator.create_buffer(&buffer_ci, &alloc_ci)? };
        let map_ptr = match unsafe { core.allocator.map_memory(&mut allocation) } {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { core.allocator.destroy_buffer(handle, &mut allocation) };
                return Err(GfxError::Allocation(format!("failed to map buffer {}: {:?}", desc.name, e)));
            }
        };
        core.set_debug_name(handle, format!("Buffer::{}", desc.name));

        Ok(Self {
            handle,
            allocation,
            map_ptr,
            size: desc.size,
            name: desc.name.clone(),
        })
    }
}
// tools
impl VkBuffer {
    /// 通过 mem map 的方式将 data 写入到 buffer 中
    pub fn write(&self, core: &VkCore, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(GfxError::Allocation(format!(
                "write [{}, {}) out of buffer {} of size {}",
                offset, end, self.name, self.size
            )));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.map_ptr.add(offset as usize), data.len());
        }
        core.allocator.flush_allocation(&self.allocation, offset, data.len() as vk::DeviceSize)?;
        Ok(())
    }
}
// destroy
impl VkBuffer {
    pub fn destroy(mut self, core: &VkCore) {
        unsafe {
            core.allocator.unmap_memory(&mut self.allocation);
            core.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}

/// 2D image 以及对应的 image view
pub struct VkImage {
    pub(crate) handle: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: vk_mem::Allocation,
    name: String,
}

// new & init
impl VkImage {
    fn new(
        core: &VkCore,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
        name: &str,
    ) -> GfxResult<Self> {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (handle, mut allocation) = unsafe { core.allocator.create_image(&image_ci, &alloc_ci)? };
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(handle)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                ..color_subresource_range()
            });
        let view = match unsafe { core.device.create_image_view(&view_ci, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { core.allocator.destroy_image(handle, &mut allocation) };
                return Err(e.into());
            }
        };
        core.set_debug_name(handle, format!("Image::{name}"));
        core.set_debug_name(view, format!("ImageView::{name}"));

        Ok(Self {
            handle,
            view,
            allocation,
            name: name.to_string(),
        })
    }

    pub fn new_depth(core: &VkCore, extent: vk::Extent2D, format: vk::Format, name: &str) -> GfxResult<Self> {
        Self::new(
            core,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
            name,
        )
    }

    /// # 实现步骤
    /// 1. 创建一个 staging buffer，将像素数据复制进去
    /// 2. 布局转换到 TRANSFER_DST_OPTIMAL
    /// 3. 将 staging buffer 的数据复制到图像
    /// 4. 布局转换到 SHADER_READ_ONLY_OPTIMAL，让 fragment shader 可读
    pub fn new_texture(core: &VkCore, desc: &GfxTextureDesc, pixels: &[u8]) -> GfxResult<Self> {
        let _span = tracy_client::span!("VkImage::new_texture");
        assert_eq!(pixels.len(), desc.byte_size(), "texture {} has wrong pixel data size", desc.name);

        let extent = vk::Extent2D {
            width: desc.width,
            height: desc.height,
        };
        let image = Self::new(
            core,
            extent,
            desc.format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
            &desc.name,
        )?;

        let stage_buffer = match VkBuffer::new(
            core,
            &GfxBufferDesc {
                size: pixels.len() as vk::DeviceSize,
                usage: vk::BufferUsageFlags::TRANSFER_SRC,
                name: format!("{}-stage-buffer", desc.name),
            },
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                image.destroy(core);
                return Err(e);
            }
        };
        let upload = stage_buffer.write(core, 0, pixels).and_then(|_| {
            core.one_time_exec(&desc.name, |device, cmd| unsafe {
                let to_transfer = vk::ImageMemoryBarrier::default()
                    .image(image.handle)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .subresource_range(color_subresource_range());
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer],
                );

                let region = vk::BufferImageCopy::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: 1,
                    });
                device.cmd_copy_buffer_to_image(
                    cmd,
                    stage_buffer.handle,
                    image.handle,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                let to_shader_read = to_transfer
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_shader_read],
                );
            })
        });
        stage_buffer.destroy(core);

        match upload {
            Ok(()) => Ok(image),
            Err(e) => {
                image.destroy(core);
                Err(e)
            }
        }
    }
}
// destroy
impl VkImage {
    pub fn destroy(mut self, core: &VkCore) {
        log::debug!("destroying image: {}", self.name);
        unsafe {
            core.device.destroy_image_view(self.view, None);
            core.allocator.destroy_image(self.handle, &mut self.allocation);
        }
    }
}

pub fn create_sampler(core: &VkCore, desc: &GfxSamplerDesc) -> GfxResult<vk::Sampler> {
    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(desc.mag_filter)
        .min_filter(desc.min_filter)
        .address_mode_u(desc.address_mode)
        .address_mode_v(desc.address_mode)
        .address_mode_w(desc.address_mode)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .anisotropy_enable(false)
        .compare_enable(false)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK);

    Ok(unsafe { core.device.create_sampler(&create_info, None)? })
}
