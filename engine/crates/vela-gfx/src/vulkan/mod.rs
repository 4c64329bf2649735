//! 基于 ash 的 GfxDevice 实现
//!
//! 所有 Vulkan 对象都保存在 slotmap 中，外部只拿到 handle

pub mod context;
pub mod debug_messenger;
pub mod pipeline;
pub mod resources;
pub mod swapchain;

use ash::vk;
use itertools::Itertools;
use slotmap::SlotMap;

use crate::desc::{
    GfxAcquireResult, GfxBindingLayoutDesc, GfxBindingResource, GfxBindingWrite, GfxBufferDesc, GfxPipelineDesc,
    GfxPresentResult, GfxRenderTargets, GfxRenderTargetsDesc, GfxSamplerDesc, GfxSubmitDesc, GfxSwapchainDesc,
    GfxSwapchainInfo, GfxTextureDesc,
};
use crate::device::GfxDevice;
use crate::error::{GfxError, GfxResult};
use crate::handles::{
    GfxBindingLayoutHandle, GfxBindingTableHandle, GfxBufferHandle, GfxCommandBufferHandle, GfxFenceHandle,
    GfxFramebufferHandle, GfxImageHandle, GfxPipelineHandle, GfxRenderPassHandle, GfxSamplerHandle,
    GfxSemaphoreHandle,
};
use crate::vulkan::context::VkCore;
use crate::vulkan::pipeline::{VkBindingLayout, VkBindingTable, VkPipeline, create_render_pass};
use crate::vulkan::resources::{VkBuffer, VkImage, create_sampler};
use crate::vulkan::swapchain::VkSwapchain;

pub struct VulkanDevice {
    core: VkCore,
    surface: vk::SurfaceKHR,
    swapchain: Option<VkSwapchain>,

    buffers: SlotMap<GfxBufferHandle, VkBuffer>,
    images: SlotMap<GfxImageHandle, VkImage>,
    samplers: SlotMap<GfxSamplerHandle, vk::Sampler>,
    binding_layouts: SlotMap<GfxBindingLayoutHandle, VkBindingLayout>,
    pipelines: SlotMap<GfxPipelineHandle, VkPipeline>,
    binding_tables: SlotMap<GfxBindingTableHandle, VkBindingTable>,
    fences: SlotMap<GfxFenceHandle, vk::Fence>,
    semaphores: SlotMap<GfxSemaphoreHandle, vk::Semaphore>,
    command_buffers: SlotMap<GfxCommandBufferHandle, vk::CommandBuffer>,
    render_passes: SlotMap<GfxRenderPassHandle, vk::RenderPass>,
    framebuffers: SlotMap<GfxFramebufferHandle, vk::Framebuffer>,
}

// new & init
impl VulkanDevice {
    pub fn new(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let (core, surface) = VkCore::new(app_name, raw_display_handle, raw_window_handle)?;

        Ok(Self {
            core,
            surface,
            swapchain: None,

            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            binding_layouts: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            binding_tables: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            semaphores: SlotMap::with_key(),
            command_buffers: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
        })
    }
}
// tools
impl VulkanDevice {
    #[inline]
    fn cmd(&self, cmd: GfxCommandBufferHandle) -> vk::CommandBuffer {
        let Some(cmd) = self.command_buffers.get(cmd) else {
            panic!("invalid command buffer handle {:?}", cmd);
        };
        *cmd
    }

    fn semaphore(&self, semaphore: GfxSemaphoreHandle) -> GfxResult<vk::Semaphore> {
        self.semaphores.get(semaphore).copied().ok_or(GfxError::InvalidHandle("semaphore"))
    }

    fn swapchain(&self) -> GfxResult<&VkSwapchain> {
        self.swapchain.as_ref().ok_or(GfxError::InvalidHandle("swapchain"))
    }
}

impl GfxDevice for VulkanDevice {
    fn create_buffer(&mut self, desc: &GfxBufferDesc) -> GfxResult<GfxBufferHandle> {
        let buffer = VkBuffer::new(&self.core, desc)?;
        Ok(self.buffers.insert(buffer))
    }

    fn write_buffer(&mut self, buffer: GfxBufferHandle, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        let buffer = self.buffers.get(buffer).ok_or(GfxError::InvalidHandle("buffer"))?;
        buffer.write(&self.core, offset, data)
    }

    fn destroy_buffer(&mut self, buffer: GfxBufferHandle) {
        if let Some(buffer) = self.buffers.remove(buffer) {
            buffer.destroy(&self.core);
        }
    }

    fn create_texture(&mut self, desc: &GfxTextureDesc, pixels: &[u8]) -> GfxResult<GfxImageHandle> {
        let image = VkImage::new_texture(&self.core, desc, pixels)?;
        Ok(self.images.insert(image))
    }

    fn destroy_image(&mut self, image: GfxImageHandle) {
        if let Some(image) = self.images.remove(image) {
            image.destroy(&self.core);
        }
    }

    fn create_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<GfxSamplerHandle> {
        let sampler = create_sampler(&self.core, desc)?;
        Ok(self.samplers.insert(sampler))
    }

    fn destroy_sampler(&mut self, sampler: GfxSamplerHandle) {
        if let Some(sampler) = self.samplers.remove(sampler) {
            unsafe { self.core.device.destroy_sampler(sampler, None) };
        }
    }

    fn create_binding_layout(&mut self, desc: &GfxBindingLayoutDesc) -> GfxResult<GfxBindingLayoutHandle> {
        let layout = VkBindingLayout::new(&self.core, desc)?;
        Ok(self.binding_layouts.insert(layout))
    }

    fn destroy_binding_layout(&mut self, layout: GfxBindingLayoutHandle) {
        if let Some(layout) = self.binding_layouts.remove(layout) {
            layout.destroy(&self.core);
        }
    }

    fn create_pipeline(&mut self, desc: &GfxPipelineDesc) -> GfxResult<GfxPipelineHandle> {
        let layout = self.binding_layouts.get(desc.binding_layout).ok_or(GfxError::InvalidHandle("binding layout"))?;
        let render_pass = *self.render_passes.get(desc.render_pass).ok_or(GfxError::InvalidHandle("render pass"))?;

        let pipeline = VkPipeline::new(&self.core, desc, layout, render_pass)?;
        Ok(self.pipelines.insert(pipeline))
    }

    fn destroy_pipeline(&mut self, pipeline: GfxPipelineHandle) {
        if let Some(pipeline) = self.pipelines.remove(pipeline) {
            pipeline.destroy(&self.core);
        }
    }

    fn create_binding_table(
        &mut self,
        layout: GfxBindingLayoutHandle,
        copies: usize,
        name: &str,
    ) -> GfxResult<GfxBindingTableHandle> {
        let layout = self.binding_layouts.get(layout).ok_or(GfxError::InvalidHandle("binding layout"))?;
        let table = VkBindingTable::new(&self.core, layout, copies, name)?;
        Ok(self.binding_tables.insert(table))
    }

    fn write_binding_table(
        &mut self,
        table: GfxBindingTableHandle,
        copy: usize,
        writes: &[GfxBindingWrite],
    ) -> GfxResult<()> {
        let table = self.binding_tables.get(table).ok_or(GfxError::InvalidHandle("binding table"))?;
        let set = *table.sets.get(copy).ok_or(GfxError::InvalidHandle("binding table copy"))?;

        // 先收集所有的 info，保证 write 中的引用有效
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        for write in writes {
            match write.resource {
                GfxBindingResource::UniformBuffer { buffer, offset, range } => {
                    let buffer = self.buffers.get(buffer).ok_or(GfxError::InvalidHandle("buffer"))?;
                    buffer_infos.push((
                        write.binding,
                        [vk::DescriptorBufferInfo {
                            buffer: buffer.handle,
                            offset,
                            range,
                        }],
                    ));
                }
                GfxBindingResource::CombinedImageSampler { image, sampler } => {
                    let image = self.images.get(image).ok_or(GfxError::InvalidHandle("image"))?;
                    let sampler = *self.samplers.get(sampler).ok_or(GfxError::InvalidHandle("sampler"))?;
                    image_infos.push((
                        write.binding,
                        [vk::DescriptorImageInfo {
                            sampler,
                            image_view: image.view,
                            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        }],
                    ));
                }
            }
        }

        let vk_writes = buffer_infos
            .iter()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(info)
            })
            .chain(image_infos.iter().map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(info)
            }))
            .collect_vec();

        unsafe {
            self.core.device.update_descriptor_sets(&vk_writes, &[]);
        }
        Ok(())
    }

    fn destroy_binding_table(&mut self, table: GfxBindingTableHandle) {
        if let Some(table) = self.binding_tables.remove(table) {
            table.destroy(&self.core);
        }
    }

    fn create_fence(&mut self, signaled: bool, name: &str) -> GfxResult<GfxFenceHandle> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.core.device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };
        self.core.set_debug_name(fence, format!("Fence::{name}"));
        Ok(self.fences.insert(fence))
    }

    fn wait_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()> {
        let fence = self.fences.get(fence).ok_or(GfxError::InvalidHandle("fence"))?;
        unsafe { self.core.device.wait_for_fences(std::slice::from_ref(fence), true, u64::MAX)? };
        Ok(())
    }

    fn reset_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()> {
        let fence = self.fences.get(fence).ok_or(GfxError::InvalidHandle("fence"))?;
        unsafe { self.core.device.reset_fences(std::slice::from_ref(fence))? };
        Ok(())
    }

    fn destroy_fence(&mut self, fence: GfxFenceHandle) {
        if let Some(fence) = self.fences.remove(fence) {
            unsafe { self.core.device.destroy_fence(fence, None) };
        }
    }

    fn create_semaphore(&mut self, name: &str) -> GfxResult<GfxSemaphoreHandle> {
        let semaphore = unsafe { self.core.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };
        self.core.set_debug_name(semaphore, format!("Semaphore::{name}"));
        Ok(self.semaphores.insert(semaphore))
    }

    fn destroy_semaphore(&mut self, semaphore: GfxSemaphoreHandle) {
        if let Some(semaphore) = self.semaphores.remove(semaphore) {
            unsafe { self.core.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn wait_idle(&mut self) -> GfxResult<()> {
        unsafe { self.core.device.device_wait_idle()? };
        Ok(())
    }

    fn create_swapchain(&mut self, desc: &GfxSwapchainDesc) -> GfxResult<GfxSwapchainInfo> {
        let old = self.swapchain.take();
        let old_handle = old.as_ref().map_or(vk::SwapchainKHR::null(), |s| s.handle());

        let result = VkSwapchain::new(&self.core, self.surface, desc, old_handle);
        if let Some(old) = old {
            old.destroy(&self.core);
        }

        let swapchain = result?;
        let info = GfxSwapchainInfo {
            extent: swapchain.extent(),
            image_count: swapchain.image_count(),
            color_format: swapchain.color_format(),
        };
        self.swapchain = Some(swapchain);
        Ok(info)
    }

    fn destroy_swapchain(&mut self) {
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&self.core);
        }
    }

    fn create_render_targets(&mut self, desc: &GfxRenderTargetsDesc) -> GfxResult<GfxRenderTargets> {
        let swapchain = self.swapchain()?;
        let extent = swapchain.extent();
        let color_format = swapchain.color_format();
        let color_views = swapchain.image_views().to_vec();

        let render_pass = create_render_pass(&self.core, color_format, desc.depth_format)?;
        let mut targets = GfxRenderTargets {
            render_pass: self.render_passes.insert(render_pass),
            framebuffers: Vec::with_capacity(color_views.len()),
            depth_images: Vec::with_capacity(color_views.len()),
            extent,
            color_format,
            depth_format: desc.depth_format,
        };

        for (idx, color_view) in color_views.iter().enumerate() {
            let created = VkImage::new_depth(&self.core, extent, desc.depth_format, &format!("depth-{idx}"))
                .and_then(|depth| {
                    let attachments = [*color_view, depth.view];
                    let framebuffer = unsafe {
                        self.core.device.create_framebuffer(
                            &vk::FramebufferCreateInfo::default()
                                .render_pass(render_pass)
                                .attachments(&attachments)
                                .width(extent.width)
                                .height(extent.height)
                                .layers(1),
                            None,
                        )
                    };
                    match framebuffer {
                        Ok(framebuffer) => Ok((depth, framebuffer)),
                        Err(e) => {
                            depth.destroy(&self.core);
                            Err(e.into())
                        }
                    }
                });

            match created {
                Ok((depth, framebuffer)) => {
                    self.core.set_debug_name(framebuffer, format!("Framebuffer::{idx}"));
                    targets.depth_images.push(self.images.insert(depth));
                    targets.framebuffers.push(self.framebuffers.insert(framebuffer));
                }
                Err(e) => {
                    self.destroy_render_targets(targets);
                    return Err(e);
                }
            }
        }

        Ok(targets)
    }

    fn destroy_render_targets(&mut self, targets: GfxRenderTargets) {
        for framebuffer in targets.framebuffers {
            if let Some(framebuffer) = self.framebuffers.remove(framebuffer) {
                unsafe { self.core.device.destroy_framebuffer(framebuffer, None) };
            }
        }
        for image in targets.depth_images {
            self.destroy_image(image);
        }
        if let Some(render_pass) = self.render_passes.remove(targets.render_pass) {
            unsafe { self.core.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn acquire_next_image(&mut self, semaphore: GfxSemaphoreHandle) -> GfxResult<GfxAcquireResult> {
        let semaphore = self.semaphore(semaphore)?;
        self.swapchain()?.acquire_next_image(&self.core, semaphore)
    }

    fn present(&mut self, image_index: u32, wait_semaphore: GfxSemaphoreHandle) -> GfxResult<GfxPresentResult> {
        let wait_semaphore = self.semaphore(wait_semaphore)?;
        self.swapchain()?.present_image(&self.core, image_index, wait_semaphore)
    }

    fn create_command_buffer(&mut self, name: &str) -> GfxResult<GfxCommandBufferHandle> {
        let cmd = unsafe {
            self.core.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.core.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?[0]
        };
        self.core.set_debug_name(cmd, format!("CommandBuffer::{name}"));
        Ok(self.command_buffers.insert(cmd))
    }

    fn begin_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()> {
        let cmd = *self.command_buffers.get(cmd).ok_or(GfxError::InvalidHandle("command buffer"))?;
        unsafe {
            self.core.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            self.core.device.begin_command_buffer(
                cmd,
                &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
        }
        Ok(())
    }

    fn end_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()> {
        let cmd = *self.command_buffers.get(cmd).ok_or(GfxError::InvalidHandle("command buffer"))?;
        unsafe { self.core.device.end_command_buffer(cmd)? };
        Ok(())
    }

    fn submit(&mut self, desc: &GfxSubmitDesc) -> GfxResult<()> {
        let _span = tracy_client::span!("VulkanDevice::submit");

        let cmds = [*self.command_buffers.get(desc.command_buffer).ok_or(GfxError::InvalidHandle("command buffer"))?];
        let wait_semaphores = desc.wait_semaphore.map(|s| self.semaphore(s)).transpose()?.into_iter().collect_vec();
        let wait_stages = vec![desc.wait_stage; wait_semaphores.len()];
        let signal_semaphores =
            desc.signal_semaphore.map(|s| self.semaphore(s)).transpose()?.into_iter().collect_vec();
        let fence = match desc.fence {
            Some(fence) => *self.fences.get(fence).ok_or(GfxError::InvalidHandle("fence"))?,
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&cmds)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);
        unsafe { self.core.device.queue_submit(self.core.queue, &[submit_info], fence)? };
        Ok(())
    }

    fn cmd_begin_render_pass(
        &mut self,
        cmd: GfxCommandBufferHandle,
        render_pass: GfxRenderPassHandle,
        framebuffer: GfxFramebufferHandle,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let cmd = self.cmd(cmd);
        let (Some(render_pass), Some(framebuffer)) =
            (self.render_passes.get(render_pass), self.framebuffers.get(framebuffer))
        else {
            panic!("begin render pass with invalid render pass or framebuffer");
        };

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(*render_pass)
            .framebuffer(*framebuffer)
            .render_area(crate::desc::full_scissor(extent))
            .clear_values(&clear_values);
        unsafe {
            self.core.device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&mut self, cmd: GfxCommandBufferHandle) {
        let cmd = self.cmd(cmd);
        unsafe { self.core.device.cmd_end_render_pass(cmd) };
    }

    fn cmd_set_viewport_scissor(&mut self, cmd: GfxCommandBufferHandle, viewport: vk::Viewport, scissor: vk::Rect2D) {
        let cmd = self.cmd(cmd);
        unsafe {
            self.core.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.core.device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn cmd_bind_pipeline(&mut self, cmd: GfxCommandBufferHandle, pipeline: GfxPipelineHandle) {
        let cmd = self.cmd(cmd);
        let Some(pipeline) = self.pipelines.get(pipeline) else {
            panic!("bind invalid pipeline {:?}", pipeline);
        };
        unsafe { self.core.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.handle) };
    }

    fn cmd_bind_binding_table(
        &mut self,
        cmd: GfxCommandBufferHandle,
        pipeline: GfxPipelineHandle,
        table: GfxBindingTableHandle,
        copy: usize,
    ) {
        let cmd = self.cmd(cmd);
        let (Some(pipeline), Some(table)) = (self.pipelines.get(pipeline), self.binding_tables.get(table)) else {
            panic!("bind binding table {:?} with pipeline {:?}: invalid handle", table, pipeline);
        };
        unsafe {
            self.core.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout,
                0,
                &[table.sets[copy]],
                &[],
            );
        }
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle) {
        let cmd = self.cmd(cmd);
        let Some(buffer) = self.buffers.get(buffer) else {
            panic!("bind invalid vertex buffer {:?}", buffer);
        };
        unsafe { self.core.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer.handle], &[0]) };
    }

    fn cmd_bind_index_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle) {
        let cmd = self.cmd(cmd);
        let Some(buffer) = self.buffers.get(buffer) else {
            panic!("bind invalid index buffer {:?}", buffer);
        };
        unsafe { self.core.device.cmd_bind_index_buffer(cmd, buffer.handle, 0, vk::IndexType::UINT32) };
    }

    fn cmd_draw_indexed(&mut self, cmd: GfxCommandBufferHandle, index_count: u32, instance_count: u32) {
        let cmd = self.cmd(cmd);
        unsafe { self.core.device.cmd_draw_indexed(cmd, index_count, instance_count, 0, 0, 0) };
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        let _span = tracy_client::span!("VulkanDevice::drop");
        if let Err(e) = unsafe { self.core.device.device_wait_idle() } {
            log::error!("wait idle before destroying device failed: {:?}", e);
        }

        let leaked = self.buffers.len()
            + self.images.len()
            + self.binding_tables.len()
            + self.pipelines.len()
            + self.binding_layouts.len();
        if leaked > 0 {
            log::warn!("{} gpu objects are still alive when the device is dropped", leaked);
        }

        let core = &self.core;
        for (_, table) in self.binding_tables.drain() {
            table.destroy(core);
        }
        for (_, pipeline) in self.pipelines.drain() {
            pipeline.destroy(core);
        }
        for (_, layout) in self.binding_layouts.drain() {
            layout.destroy(core);
        }
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy(core);
        }
        for (_, framebuffer) in self.framebuffers.drain() {
            unsafe { core.device.destroy_framebuffer(framebuffer, None) };
        }
        for (_, image) in self.images.drain() {
            image.destroy(core);
        }
        unsafe {
            for (_, sampler) in self.samplers.drain() {
                core.device.destroy_sampler(sampler, None);
            }
            for (_, render_pass) in self.render_passes.drain() {
                core.device.destroy_render_pass(render_pass, None);
            }
            for (_, fence) in self.fences.drain() {
                core.device.destroy_fence(fence, None);
            }
            for (_, semaphore) in self.semaphores.drain() {
                core.device.destroy_semaphore(semaphore, None);
            }
        }
        // command buffer 随 command pool 一起释放
        self.command_buffers.clear();

        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(core);
        }
        unsafe { core.surface_pf.destroy_surface(self.surface, None) };

        self.core.destroy();
    }
}
