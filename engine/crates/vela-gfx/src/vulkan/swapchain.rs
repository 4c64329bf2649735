use ash::vk;

use crate::desc::{GfxAcquireResult, GfxPresentResult, GfxSwapchainDesc};
use crate::error::GfxResult;
use crate::vulkan::context::VkCore;

pub struct VkSwapchain {
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    color_format: vk::Format,
    extent: vk::Extent2D,
}

// new & init
impl VkSwapchain {
    /// `old_swapchain` 不为 null 时，新的 swapchain 会接管它的资源，调用者随后需要销毁旧的
    pub fn new(
        core: &VkCore,
        surface: vk::SurfaceKHR,
        desc: &GfxSwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("VkSwapchain::new");

        let surface_capabilities =
            unsafe { core.surface_pf.get_physical_device_surface_capabilities(core.pdevice, surface)? };
        let extent = Self::calculate_swapchain_extent(&surface_capabilities, desc.extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            desc.extent.width,
            desc.extent.height,
            extent.width,
            extent.height
        );

        let surface_format = Self::choose_surface_format(core, surface, desc.surface_format)?;
        let present_mode = Self::choose_present_mode(core, surface, desc.present_mode)?;

        // max_image_count == 0，表示不限制 image 数量
        let image_count = if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { core.swapchain_pf.create_swapchain(&create_info, None)? };
        core.set_debug_name(handle, "main");

        let images = unsafe { core.swapchain_pf.get_swapchain_images(handle)? };
        let mut image_views = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let view = unsafe {
                core.device.create_image_view(
                    &vk::ImageViewCreateInfo::default()
                        .image(*image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(surface_format.format)
                        .subresource_range(color_subresource_range()),
                    None,
                )?
            };
            core.set_debug_name(view, format!("swapchain-image-{idx}"));
            image_views.push(view);
        }

        Ok(Self {
            handle,
            images,
            image_views,
            color_format: surface_format.format,
            extent,
        })
    }

    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
            let width = window_physical_extent
                .width
                .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
            let height = window_physical_extent
                .height
                .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }

    /// 不支持期望的格式时退回到 surface 的第一个格式
    fn choose_surface_format(
        core: &VkCore,
        surface: vk::SurfaceKHR,
        preferred: vk::SurfaceFormatKHR,
    ) -> GfxResult<vk::SurfaceFormatKHR> {
        let formats = unsafe { core.surface_pf.get_physical_device_surface_formats(core.pdevice, surface)? };
        let chosen = formats
            .iter()
            .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .or_else(|| formats.first())
            .copied()
            .unwrap_or(preferred);
        if chosen.format != preferred.format {
            log::warn!("surface format {:?} is not supported, use {:?}", preferred.format, chosen.format);
        }
        Ok(chosen)
    }

    /// FIFO 一定支持
    fn choose_present_mode(
        core: &VkCore,
        surface: vk::SurfaceKHR,
        preferred: vk::PresentModeKHR,
    ) -> GfxResult<vk::PresentModeKHR> {
        let modes = unsafe { core.surface_pf.get_physical_device_surface_present_modes(core.pdevice, surface)? };
        if modes.contains(&preferred) {
            Ok(preferred)
        } else {
            log::warn!("present mode {:?} is not supported, use FIFO", preferred);
            Ok(vk::PresentModeKHR::FIFO)
        }
    }
}
// getters
impl VkSwapchain {
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}
// update
impl VkSwapchain {
    pub fn acquire_next_image(&self, core: &VkCore, semaphore: vk::Semaphore) -> GfxResult<GfxAcquireResult> {
        let result =
            unsafe { core.swapchain_pf.acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null()) };

        match result {
            Ok((image_index, suboptimal)) => Ok(GfxAcquireResult::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(GfxAcquireResult::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    pub fn present_image(
        &self,
        core: &VkCore,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> GfxResult<GfxPresentResult> {
        let wait_semaphores = [wait_semaphore];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        match unsafe { core.swapchain_pf.queue_present(core.queue, &present_info) } {
            Ok(true) => Ok(GfxPresentResult::Suboptimal),
            Ok(false) => Ok(GfxPresentResult::Presented),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(GfxPresentResult::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }
}
// destroy
impl VkSwapchain {
    pub fn destroy(self, core: &VkCore) {
        unsafe {
            for view in &self.image_views {
                core.device.destroy_image_view(*view, None);
            }
            core.swapchain_pf.destroy_swapchain(self.handle, None);
        }
    }
}

#[inline]
pub(crate) fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}
