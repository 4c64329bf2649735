//! 纯内存的 GfxDevice 实现
//!
//! 不依赖任何 GPU：buffer 内容可以读回，所有录制的命令和提交都有记录，
//! fence/semaphore 的状态会被检查，违反同步协议的调用返回错误。
//! submit 会立即 "执行完成"，signal 对应的 semaphore 和 fence。

use std::collections::{BTreeMap, VecDeque};

use ash::vk;
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

pub struct MockBuffer {
    pub desc: GfxBufferDesc,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockImageKind {
    Texture,
    Depth,
}

pub struct MockImage {
    pub kind: MockImageKind,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub pixels: Vec<u8>,
}

pub struct MockPipeline {
    pub desc: GfxPipelineDesc,
}

pub struct MockBindingTable {
    pub layout: GfxBindingLayoutHandle,
    pub name: String,
    /// 每一份 binding table 中已经写入的 binding
    pub copies: Vec<BTreeMap<u32, GfxBindingResource>>,
}

struct MockFence {
    signaled: bool,
}

struct MockSemaphore {
    name: String,
    signaled: bool,
}

struct MockCommandBuffer {
    name: String,
    recording: bool,
    in_render_pass: bool,
    commands: Vec<MockCommand>,
}

struct MockRenderPass {
    _color_format: vk::Format,
    _depth_format: vk::Format,
}

struct MockFramebuffer {
    render_pass: GfxRenderPassHandle,
    extent: vk::Extent2D,
}

struct MockSwapchain {
    info: GfxSwapchainInfo,
    next_image: u32,
}

/// 录制在 command buffer 中的一条命令
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    BeginRenderPass {
        render_pass: GfxRenderPassHandle,
        framebuffer: GfxFramebufferHandle,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    },
    EndRenderPass,
    SetViewportScissor {
        width: f32,
        height: f32,
        scissor: vk::Rect2D,
    },
    BindPipeline(GfxPipelineHandle),
    BindBindingTable {
        pipeline: GfxPipelineHandle,
        table: GfxBindingTableHandle,
        copy: usize,
    },
    BindVertexBuffer(GfxBufferHandle),
    BindIndexBuffer(GfxBufferHandle),
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
}

/// 一次 submit 的快照
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub command_buffer: GfxCommandBufferHandle,
    pub commands: Vec<MockCommand>,
    pub wait_semaphore: Option<GfxSemaphoreHandle>,
    pub signal_semaphore: Option<GfxSemaphoreHandle>,
    pub fence: Option<GfxFenceHandle>,
}

/// 累计的调用次数，只增不减
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub buffers_created: usize,
    pub buffer_writes: usize,
    pub textures_created: usize,
    pub samplers_created: usize,
    pub binding_layouts_created: usize,
    pub binding_layouts_destroyed: usize,
    pub pipelines_created: usize,
    pub pipelines_destroyed: usize,
    pub binding_tables_created: usize,
    pub binding_table_writes: usize,
    pub fences_created: usize,
    pub fence_waits: usize,
    pub fence_resets: usize,
    pub semaphores_created: usize,
    pub swapchains_created: usize,
    pub render_targets_created: usize,
    pub render_targets_destroyed: usize,
    pub command_buffers_created: usize,
    pub acquires: usize,
    pub submits: usize,
    pub presents: usize,
    pub wait_idles: usize,
}

/// 当前存活的对象数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockLiveObjects {
    pub buffers: usize,
    pub images: usize,
    pub samplers: usize,
    pub binding_layouts: usize,
    pub pipelines: usize,
    pub binding_tables: usize,
    pub fences: usize,
    pub semaphores: usize,
    pub render_passes: usize,
    pub framebuffers: usize,
}

pub struct MockGfxDevice {
    buffers: SlotMap<GfxBufferHandle, MockBuffer>,
    images: SlotMap<GfxImageHandle, MockImage>,
    samplers: SlotMap<GfxSamplerHandle, GfxSamplerDesc>,
    binding_layouts: SlotMap<GfxBindingLayoutHandle, GfxBindingLayoutDesc>,
    pipelines: SlotMap<GfxPipelineHandle, MockPipeline>,
    binding_tables: SlotMap<GfxBindingTableHandle, MockBindingTable>,
    fences: SlotMap<GfxFenceHandle, MockFence>,
    semaphores: SlotMap<GfxSemaphoreHandle, MockSemaphore>,
    command_buffers: SlotMap<GfxCommandBufferHandle, MockCommandBuffer>,
    render_passes: SlotMap<GfxRenderPassHandle, MockRenderPass>,
    framebuffers: SlotMap<GfxFramebufferHandle, MockFramebuffer>,

    swapchain: Option<MockSwapchain>,

    /// 模拟窗口 surface 的当前尺寸
    surface_extent: vk::Extent2D,
    /// 下一次创建 swapchain 时的 image 数量
    surface_image_count: usize,

    acquire_overrides: VecDeque<GfxAcquireResult>,
    present_overrides: VecDeque<GfxPresentResult>,
    /// 设置之后 wait_idle 一直返回 device lost
    device_lost: bool,

    submissions: Vec<MockSubmission>,
    stats: MockStats,
}

// new & init
impl MockGfxDevice {
    pub const DEFAULT_IMAGE_COUNT: usize = 3;

    pub fn new(surface_extent: vk::Extent2D) -> Self {
        Self::with_image_count(surface_extent, Self::DEFAULT_IMAGE_COUNT)
    }

    pub fn with_image_count(surface_extent: vk::Extent2D, image_count: usize) -> Self {
        assert!(image_count > 0);
        Self {
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

            swapchain: None,
            surface_extent,
            surface_image_count: image_count,

            acquire_overrides: VecDeque::new(),
            present_overrides: VecDeque::new(),
            device_lost: false,

            submissions: vec![],
            stats: MockStats::default(),
        }
    }
}
// 模拟外部环境
impl MockGfxDevice {
    /// 窗口尺寸变化：之后的 acquire/present 会报告 out-of-date，直到 swapchain 重建
    pub fn resize_surface(&mut self, extent: vk::Extent2D) {
        self.surface_extent = extent;
    }

    /// 影响之后创建的 swapchain
    pub fn set_surface_image_count(&mut self, image_count: usize) {
        self.surface_image_count = image_count;
    }

    /// 下一次 acquire 返回 out-of-date
    pub fn inject_acquire_out_of_date(&mut self) {
        self.acquire_overrides.push_back(GfxAcquireResult::OutOfDate);
    }

    /// 下一次 acquire 成功，但是报告 suboptimal
    pub fn inject_acquire_suboptimal(&mut self) {
        self.acquire_overrides.push_back(GfxAcquireResult::Acquired {
            image_index: u32::MAX,
            suboptimal: true,
        });
    }

    /// 下一次 present 的结果
    pub fn inject_present_result(&mut self, result: GfxPresentResult) {
        self.present_overrides.push_back(result);
    }

    /// 之后的 wait_idle 都返回 [`GfxError::DeviceLost`]
    pub fn inject_device_lost(&mut self) {
        self.device_lost = true;
    }
}
// getters
impl MockGfxDevice {
    #[inline]
    pub fn stats(&self) -> MockStats {
        self.stats
    }

    pub fn live_objects(&self) -> MockLiveObjects {
        MockLiveObjects {
            buffers: self.buffers.len(),
            images: self.images.len(),
            samplers: self.samplers.len(),
            binding_layouts: self.binding_layouts.len(),
            pipelines: self.pipelines.len(),
            binding_tables: self.binding_tables.len(),
            fences: self.fences.len(),
            semaphores: self.semaphores.len(),
            render_passes: self.render_passes.len(),
            framebuffers: self.framebuffers.len(),
        }
    }

    #[inline]
    pub fn surface_extent(&self) -> vk::Extent2D {
        self.surface_extent
    }

    #[inline]
    pub fn swapchain_info(&self) -> Option<GfxSwapchainInfo> {
        self.swapchain.as_ref().map(|s| s.info)
    }

    #[inline]
    pub fn read_buffer(&self, buffer: GfxBufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.data.as_slice())
    }

    #[inline]
    pub fn buffer(&self, buffer: GfxBufferHandle) -> Option<&MockBuffer> {
        self.buffers.get(buffer)
    }

    #[inline]
    pub fn image(&self, image: GfxImageHandle) -> Option<&MockImage> {
        self.images.get(image)
    }

    #[inline]
    pub fn pipeline(&self, pipeline: GfxPipelineHandle) -> Option<&MockPipeline> {
        self.pipelines.get(pipeline)
    }

    #[inline]
    pub fn binding_table(&self, table: GfxBindingTableHandle) -> Option<&MockBindingTable> {
        self.binding_tables.get(table)
    }

    pub fn binding_table_entries(
        &self,
        table: GfxBindingTableHandle,
        copy: usize,
    ) -> Option<&BTreeMap<u32, GfxBindingResource>> {
        self.binding_tables.get(table).and_then(|t| t.copies.get(copy))
    }

    pub fn is_fence_signaled(&self, fence: GfxFenceHandle) -> Option<bool> {
        self.fences.get(fence).map(|f| f.signaled)
    }

    pub fn is_semaphore_signaled(&self, semaphore: GfxSemaphoreHandle) -> Option<bool> {
        self.semaphores.get(semaphore).map(|s| s.signaled)
    }

    /// command buffer 最近一次录制的命令
    pub fn commands(&self, cmd: GfxCommandBufferHandle) -> &[MockCommand] {
        self.command_buffers.get(cmd).map_or(&[], |c| c.commands.as_slice())
    }

    #[inline]
    pub fn submissions(&self) -> &[MockSubmission] {
        &self.submissions
    }
}
// tools
impl MockGfxDevice {
    fn record(&mut self, cmd: GfxCommandBufferHandle, command: MockCommand) {
        let Some(cb) = self.command_buffers.get_mut(cmd) else {
            panic!("record {:?} into invalid command buffer {:?}", command, cmd);
        };
        assert!(cb.recording, "command buffer {} is not recording", cb.name);

        match &command {
            MockCommand::BeginRenderPass { .. } => {
                assert!(!cb.in_render_pass, "nested render pass in {}", cb.name);
                cb.in_render_pass = true;
            }
            MockCommand::EndRenderPass => {
                assert!(cb.in_render_pass, "end render pass without begin in {}", cb.name);
                cb.in_render_pass = false;
            }
            MockCommand::DrawIndexed { .. } => {
                assert!(cb.in_render_pass, "draw outside of render pass in {}", cb.name);
            }
            _ => {}
        }
        cb.commands.push(command);
    }

    fn check_binding_write(&self, layout: &GfxBindingLayoutDesc, write: &GfxBindingWrite) -> GfxResult<()> {
        let Some(binding) = layout.binding(write.binding) else {
            return Err(GfxError::Mock(format!("binding {} is not in layout {}", write.binding, layout.name)));
        };
        if binding.ty != write.resource.descriptor_type() {
            return Err(GfxError::Mock(format!(
                "binding {} of layout {} expects {:?}, got {:?}",
                write.binding,
                layout.name,
                binding.ty,
                write.resource.descriptor_type()
            )));
        }
        match write.resource {
            GfxBindingResource::UniformBuffer { buffer, .. } => {
                if !self.buffers.contains_key(buffer) {
                    return Err(GfxError::InvalidHandle("buffer"));
                }
            }
            GfxBindingResource::CombinedImageSampler { image, sampler } => {
                if !self.images.contains_key(image) {
                    return Err(GfxError::InvalidHandle("image"));
                }
                if !self.samplers.contains_key(sampler) {
                    return Err(GfxError::InvalidHandle("sampler"));
                }
            }
        }
        Ok(())
    }

    fn surface_matches_swapchain(&self) -> bool {
        self.swapchain.as_ref().is_some_and(|s| s.info.extent == self.surface_extent)
    }
}

impl GfxDevice for MockGfxDevice {
    fn create_buffer(&mut self, desc: &GfxBufferDesc) -> GfxResult<GfxBufferHandle> {
        self.stats.buffers_created += 1;
        Ok(self.buffers.insert(MockBuffer {
            desc: desc.clone(),
            data: vec![0; desc.size as usize],
        }))
    }

    fn write_buffer(&mut self, buffer: GfxBufferHandle, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        let buffer = self.buffers.get_mut(buffer).ok_or(GfxError::InvalidHandle("buffer"))?;
        let begin = offset as usize;
        let end = begin + data.len();
        if end > buffer.data.len() {
            return Err(GfxError::Mock(format!(
                "write [{begin}, {end}) out of buffer {} of size {}",
                buffer.desc.name,
                buffer.data.len()
            )));
        }
        buffer.data[begin..end].copy_from_slice(data);
        self.stats.buffer_writes += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GfxBufferHandle) {
        self.buffers.remove(buffer);
    }

    fn create_texture(&mut self, desc: &GfxTextureDesc, pixels: &[u8]) -> GfxResult<GfxImageHandle> {
        if pixels.len() != desc.byte_size() {
            return Err(GfxError::Mock(format!(
                "texture {} expects {} bytes, got {}",
                desc.name,
                desc.byte_size(),
                pixels.len()
            )));
        }
        self.stats.textures_created += 1;
        Ok(self.images.insert(MockImage {
            kind: MockImageKind::Texture,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            format: desc.format,
            pixels: pixels.to_vec(),
        }))
    }

    fn destroy_image(&mut self, image: GfxImageHandle) {
        self.images.remove(image);
    }

    fn create_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<GfxSamplerHandle> {
        self.stats.samplers_created += 1;
        Ok(self.samplers.insert(*desc))
    }

    fn destroy_sampler(&mut self, sampler: GfxSamplerHandle) {
        self.samplers.remove(sampler);
    }

    fn create_binding_layout(&mut self, desc: &GfxBindingLayoutDesc) -> GfxResult<GfxBindingLayoutHandle> {
        self.stats.binding_layouts_created += 1;
        Ok(self.binding_layouts.insert(desc.clone()))
    }

    fn destroy_binding_layout(&mut self, layout: GfxBindingLayoutHandle) {
        if self.binding_layouts.remove(layout).is_some() {
            self.stats.binding_layouts_destroyed += 1;
        }
    }

    fn create_pipeline(&mut self, desc: &GfxPipelineDesc) -> GfxResult<GfxPipelineHandle> {
        if !self.binding_layouts.contains_key(desc.binding_layout) {
            return Err(GfxError::InvalidHandle("binding layout"));
        }
        if !self.render_passes.contains_key(desc.render_pass) {
            return Err(GfxError::InvalidHandle("render pass"));
        }
        self.stats.pipelines_created += 1;
        Ok(self.pipelines.insert(MockPipeline { desc: desc.clone() }))
    }

    fn destroy_pipeline(&mut self, pipeline: GfxPipelineHandle) {
        if self.pipelines.remove(pipeline).is_some() {
            self.stats.pipelines_destroyed += 1;
        }
    }

    fn create_binding_table(
        &mut self,
        layout: GfxBindingLayoutHandle,
        copies: usize,
        name: &str,
    ) -> GfxResult<GfxBindingTableHandle> {
        if !self.binding_layouts.contains_key(layout) {
            return Err(GfxError::InvalidHandle("binding layout"));
        }
        if copies == 0 {
            return Err(GfxError::Mock(format!("binding table {name} with zero copies")));
        }
        self.stats.binding_tables_created += 1;
        Ok(self.binding_tables.insert(MockBindingTable {
            layout,
            name: name.to_string(),
            copies: vec![BTreeMap::new(); copies],
        }))
    }

    fn write_binding_table(
        &mut self,
        table: GfxBindingTableHandle,
        copy: usize,
        writes: &[GfxBindingWrite],
    ) -> GfxResult<()> {
        let layout = self.binding_tables.get(table).ok_or(GfxError::InvalidHandle("binding table"))?.layout;
        let layout = self.binding_layouts.get(layout).ok_or(GfxError::InvalidHandle("binding layout"))?;
        for write in writes {
            self.check_binding_write(layout, write)?;
        }

        let table = self.binding_tables.get_mut(table).ok_or(GfxError::InvalidHandle("binding table"))?;
        let copies = table.copies.len();
        let entries = table.copies.get_mut(copy).ok_or_else(|| {
            GfxError::Mock(format!("binding table {} has {} copies, got copy {}", table.name, copies, copy))
        })?;
        for write in writes {
            entries.insert(write.binding, write.resource);
        }
        self.stats.binding_table_writes += 1;
        Ok(())
    }

    fn destroy_binding_table(&mut self, table: GfxBindingTableHandle) {
        self.binding_tables.remove(table);
    }

    fn create_fence(&mut self, signaled: bool, _name: &str) -> GfxResult<GfxFenceHandle> {
        self.stats.fences_created += 1;
        Ok(self.fences.insert(MockFence { signaled }))
    }

    fn wait_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()> {
        let fence = self.fences.get(fence).ok_or(GfxError::InvalidHandle("fence"))?;
        self.stats.fence_waits += 1;
        if !fence.signaled {
            // 所有 submit 都立即完成，未 signal 的 fence 永远不会被 signal
            return Err(GfxError::Mock("wait on a fence that will never be signaled".to_string()));
        }
        Ok(())
    }

    fn reset_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()> {
        let fence = self.fences.get_mut(fence).ok_or(GfxError::InvalidHandle("fence"))?;
        fence.signaled = false;
        self.stats.fence_resets += 1;
        Ok(())
    }

    fn destroy_fence(&mut self, fence: GfxFenceHandle) {
        self.fences.remove(fence);
    }

    fn create_semaphore(&mut self, name: &str) -> GfxResult<GfxSemaphoreHandle> {
        self.stats.semaphores_created += 1;
        Ok(self.semaphores.insert(MockSemaphore {
            name: name.to_string(),
            signaled: false,
        }))
    }

    fn destroy_semaphore(&mut self, semaphore: GfxSemaphoreHandle) {
        self.semaphores.remove(semaphore);
    }

    fn wait_idle(&mut self) -> GfxResult<()> {
        self.stats.wait_idles += 1;
        if self.device_lost {
            return Err(GfxError::DeviceLost);
        }
        Ok(())
    }

    fn create_swapchain(&mut self, desc: &GfxSwapchainDesc) -> GfxResult<GfxSwapchainInfo> {
        // 与 Vulkan 一致：surface 规定了尺寸，desc 中的尺寸被忽略
        let extent = self.surface_extent;
        if extent.width == 0 || extent.height == 0 {
            return Err(GfxError::Mock("create swapchain with zero extent".to_string()));
        }
        if let Some(old) = self.swapchain.take() {
            log::debug!("mock swapchain replaced: {:?} -> {:?}", old.info.extent, extent);
        }

        let info = GfxSwapchainInfo {
            extent,
            image_count: self.surface_image_count,
            color_format: desc.surface_format.format,
        };
        self.swapchain = Some(MockSwapchain { info, next_image: 0 });
        self.stats.swapchains_created += 1;
        Ok(info)
    }

    fn destroy_swapchain(&mut self) {
        self.swapchain = None;
    }

    fn create_render_targets(&mut self, desc: &GfxRenderTargetsDesc) -> GfxResult<GfxRenderTargets> {
        let info = self.swapchain_info().ok_or_else(|| GfxError::Mock("no swapchain".to_string()))?;

        let render_pass = self.render_passes.insert(MockRenderPass {
            _color_format: info.color_format,
            _depth_format: desc.depth_format,
        });
        let mut depth_images = Vec::with_capacity(info.image_count);
        let mut framebuffers = Vec::with_capacity(info.image_count);
        for _ in 0..info.image_count {
            depth_images.push(self.images.insert(MockImage {
                kind: MockImageKind::Depth,
                extent: info.extent,
                format: desc.depth_format,
                pixels: vec![],
            }));
            framebuffers.push(self.framebuffers.insert(MockFramebuffer {
                render_pass,
                extent: info.extent,
            }));
        }

        self.stats.render_targets_created += 1;
        Ok(GfxRenderTargets {
            render_pass,
            framebuffers,
            depth_images,
            extent: info.extent,
            color_format: info.color_format,
            depth_format: desc.depth_format,
        })
    }

    fn destroy_render_targets(&mut self, targets: GfxRenderTargets) {
        for framebuffer in targets.framebuffers {
            self.framebuffers.remove(framebuffer);
        }
        for image in targets.depth_images {
            self.images.remove(image);
        }
        self.render_passes.remove(targets.render_pass);
        self.stats.render_targets_destroyed += 1;
    }

    fn acquire_next_image(&mut self, semaphore: GfxSemaphoreHandle) -> GfxResult<GfxAcquireResult> {
        self.stats.acquires += 1;
        let surface_matches = self.surface_matches_swapchain();

        let sem = self.semaphores.get(semaphore).ok_or(GfxError::InvalidHandle("semaphore"))?;
        if sem.signaled {
            return Err(GfxError::Mock(format!("acquire with semaphore {} that is still signaled", sem.name)));
        }
        let swapchain = self.swapchain.as_mut().ok_or_else(|| GfxError::Mock("no swapchain".to_string()))?;

        let suboptimal = match self.acquire_overrides.pop_front() {
            Some(GfxAcquireResult::OutOfDate) => return Ok(GfxAcquireResult::OutOfDate),
            Some(GfxAcquireResult::Acquired { suboptimal, .. }) => suboptimal,
            None if !surface_matches => return Ok(GfxAcquireResult::OutOfDate),
            None => false,
        };

        let image_index = swapchain.next_image;
        swapchain.next_image = (swapchain.next_image + 1) % swapchain.info.image_count as u32;
        if let Some(sem) = self.semaphores.get_mut(semaphore) {
            sem.signaled = true;
        }

        Ok(GfxAcquireResult::Acquired {
            image_index,
            suboptimal,
        })
    }

    fn present(&mut self, image_index: u32, wait_semaphore: GfxSemaphoreHandle) -> GfxResult<GfxPresentResult> {
        self.stats.presents += 1;
        let surface_matches = self.surface_matches_swapchain();

        let info = self.swapchain_info().ok_or_else(|| GfxError::Mock("no swapchain".to_string()))?;
        if image_index as usize >= info.image_count {
            return Err(GfxError::Mock(format!("present image {image_index} of {}", info.image_count)));
        }

        let sem = self.semaphores.get_mut(wait_semaphore).ok_or(GfxError::InvalidHandle("semaphore"))?;
        if !sem.signaled {
            return Err(GfxError::Mock(format!("present waits on semaphore {} that is never signaled", sem.name)));
        }
        sem.signaled = false;

        Ok(match self.present_overrides.pop_front() {
            Some(result) => result,
            None if !surface_matches => GfxPresentResult::OutOfDate,
            None => GfxPresentResult::Presented,
        })
    }

    fn create_command_buffer(&mut self, name: &str) -> GfxResult<GfxCommandBufferHandle> {
        self.stats.command_buffers_created += 1;
        Ok(self.command_buffers.insert(MockCommandBuffer {
            name: name.to_string(),
            recording: false,
            in_render_pass: false,
            commands: vec![],
        }))
    }

    fn begin_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()> {
        let cb = self.command_buffers.get_mut(cmd).ok_or(GfxError::InvalidHandle("command buffer"))?;
        if cb.recording {
            return Err(GfxError::Mock(format!("command buffer {} is already recording", cb.name)));
        }
        cb.recording = true;
        cb.in_render_pass = false;
        cb.commands.clear();
        Ok(())
    }

    fn end_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()> {
        let cb = self.command_buffers.get_mut(cmd).ok_or(GfxError::InvalidHandle("command buffer"))?;
        if !cb.recording || cb.in_render_pass {
            return Err(GfxError::Mock(format!("command buffer {} can not be ended", cb.name)));
        }
        cb.recording = false;
        Ok(())
    }

    fn submit(&mut self, desc: &GfxSubmitDesc) -> GfxResult<()> {
        let cb = self.command_buffers.get(desc.command_buffer).ok_or(GfxError::InvalidHandle("command buffer"))?;
        if cb.recording {
            return Err(GfxError::Mock(format!("submit command buffer {} that is still recording", cb.name)));
        }
        let commands = cb.commands.clone();

        if let Some(wait) = desc.wait_semaphore {
            let sem = self.semaphores.get_mut(wait).ok_or(GfxError::InvalidHandle("semaphore"))?;
            if !sem.signaled {
                return Err(GfxError::Mock(format!("submit waits on semaphore {} that is never signaled", sem.name)));
            }
            sem.signaled = false;
        }
        if let Some(signal) = desc.signal_semaphore {
            let sem = self.semaphores.get_mut(signal).ok_or(GfxError::InvalidHandle("semaphore"))?;
            if sem.signaled {
                return Err(GfxError::Mock(format!("submit signals semaphore {} that is already signaled", sem.name)));
            }
            sem.signaled = true;
        }
        if let Some(fence) = desc.fence {
            let fence = self.fences.get_mut(fence).ok_or(GfxError::InvalidHandle("fence"))?;
            if fence.signaled {
                return Err(GfxError::Mock("submit with a fence that is not reset".to_string()));
            }
            fence.signaled = true;
        }

        self.submissions.push(MockSubmission {
            command_buffer: desc.command_buffer,
            commands,
            wait_semaphore: desc.wait_semaphore,
            signal_semaphore: desc.signal_semaphore,
            fence: desc.fence,
        });
        self.stats.submits += 1;
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
        let Some(fb) = self.framebuffers.get(framebuffer) else {
            panic!("begin render pass with invalid framebuffer {:?}", framebuffer);
        };
        assert_eq!(fb.render_pass, render_pass, "framebuffer is not compatible with the render pass");
        assert_eq!(fb.extent, extent, "render area differs from framebuffer extent");

        self.record(
            cmd,
            MockCommand::BeginRenderPass {
                render_pass,
                framebuffer,
                extent,
                clear_color,
            },
        );
    }

    fn cmd_end_render_pass(&mut self, cmd: GfxCommandBufferHandle) {
        self.record(cmd, MockCommand::EndRenderPass);
    }

    fn cmd_set_viewport_scissor(&mut self, cmd: GfxCommandBufferHandle, viewport: vk::Viewport, scissor: vk::Rect2D) {
        self.record(
            cmd,
            MockCommand::SetViewportScissor {
                width: viewport.width,
                height: viewport.height,
                scissor,
            },
        );
    }

    fn cmd_bind_pipeline(&mut self, cmd: GfxCommandBufferHandle, pipeline: GfxPipelineHandle) {
        assert!(self.pipelines.contains_key(pipeline), "bind invalid pipeline {:?}", pipeline);
        self.record(cmd, MockCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_binding_table(
        &mut self,
        cmd: GfxCommandBufferHandle,
        pipeline: GfxPipelineHandle,
        table: GfxBindingTableHandle,
        copy: usize,
    ) {
        let (Some(p), Some(t)) = (self.pipelines.get(pipeline), self.binding_tables.get(table)) else {
            panic!("bind binding table {:?} with pipeline {:?}: invalid handle", table, pipeline);
        };
        assert_eq!(p.desc.binding_layout, t.layout, "binding table {} does not match the pipeline layout", t.name);
        assert!(copy < t.copies.len(), "binding table {} has no copy {}", t.name, copy);

        self.record(cmd, MockCommand::BindBindingTable { pipeline, table, copy });
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle) {
        assert!(self.buffers.contains_key(buffer), "bind invalid vertex buffer {:?}", buffer);
        self.record(cmd, MockCommand::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle) {
        assert!(self.buffers.contains_key(buffer), "bind invalid index buffer {:?}", buffer);
        self.record(cmd, MockCommand::BindIndexBuffer(buffer));
    }

    fn cmd_draw_indexed(&mut self, cmd: GfxCommandBufferHandle, index_count: u32, instance_count: u32) {
        self.record(
            cmd,
            MockCommand::DrawIndexed {
                index_count,
                instance_count,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::GfxBindingDesc;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn new_device() -> MockGfxDevice {
        vela_crate_tools::init_log::init_test_log();
        MockGfxDevice::new(EXTENT)
    }

    fn swapchain_desc() -> GfxSwapchainDesc {
        GfxSwapchainDesc {
            extent: EXTENT,
            present_mode: vk::PresentModeKHR::FIFO,
            surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        }
    }

    #[test]
    fn test_buffer_write_and_read_back() {
        let mut device = new_device();
        let buffer = device.create_buffer(&GfxBufferDesc::uniform(16, "ubo")).unwrap();

        device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read_buffer(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(device.write_buffer(buffer, 14, &[0; 4]).is_err());

        device.destroy_buffer(buffer);
        assert!(device.read_buffer(buffer).is_none());
        assert!(matches!(device.write_buffer(buffer, 0, &[0]), Err(GfxError::InvalidHandle("buffer"))));
    }

    #[test]
    fn test_wait_on_unsignaled_fence_is_an_error() {
        let mut device = new_device();
        let signaled = device.create_fence(true, "signaled").unwrap();
        let unsignaled = device.create_fence(false, "unsignaled").unwrap();

        assert!(device.wait_fence(signaled).is_ok());
        assert!(device.wait_fence(unsignaled).is_err());

        device.reset_fence(signaled).unwrap();
        assert!(device.wait_fence(signaled).is_err());
    }

    #[test]
    fn test_submit_signals_fence_and_semaphore() {
        let mut device = new_device();
        device.create_swapchain(&swapchain_desc()).unwrap();

        let image_available = device.create_semaphore("image-available").unwrap();
        let rendered = device.create_semaphore("rendered").unwrap();
        let fence = device.create_fence(false, "fence").unwrap();
        let cmd = device.create_command_buffer("cmd").unwrap();

        let GfxAcquireResult::Acquired { image_index, .. } = device.acquire_next_image(image_available).unwrap() else {
            panic!("acquire failed");
        };
        assert_eq!(image_index, 0);

        device.begin_command_buffer(cmd).unwrap();
        device.end_command_buffer(cmd).unwrap();
        device
            .submit(&GfxSubmitDesc {
                command_buffer: cmd,
                wait_semaphore: Some(image_available),
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_semaphore: Some(rendered),
                fence: Some(fence),
            })
            .unwrap();

        assert_eq!(device.is_fence_signaled(fence), Some(true));
        assert_eq!(device.is_semaphore_signaled(image_available), Some(false));
        assert_eq!(device.is_semaphore_signaled(rendered), Some(true));

        assert_eq!(device.present(image_index, rendered).unwrap(), GfxPresentResult::Presented);
        // rendered semaphore 已经被 present 消耗
        assert!(device.present(image_index, rendered).is_err());
    }

    #[test]
    fn test_acquire_reports_out_of_date_after_resize() {
        let mut device = MockGfxDevice::with_image_count(EXTENT, 2);
        device.create_swapchain(&swapchain_desc()).unwrap();
        let semaphore = device.create_semaphore("sem").unwrap();

        device.resize_surface(vk::Extent2D {
            width: 1024,
            height: 768,
        });
        assert_eq!(device.acquire_next_image(semaphore).unwrap(), GfxAcquireResult::OutOfDate);
        // out-of-date 时 semaphore 不会被 signal
        assert_eq!(device.is_semaphore_signaled(semaphore), Some(false));

        let info = device.create_swapchain(&swapchain_desc()).unwrap();
        assert_eq!(info.extent.width, 1024);
        assert_eq!(info.image_count, 2);
        assert!(matches!(device.acquire_next_image(semaphore).unwrap(), GfxAcquireResult::Acquired { .. }));

        // semaphore 没有被消耗就再次 acquire
        assert!(device.acquire_next_image(semaphore).is_err());
    }

    #[test]
    fn test_binding_table_write_is_validated() {
        let mut device = new_device();
        let layout = device
            .create_binding_layout(&GfxBindingLayoutDesc {
                bindings: vec![GfxBindingDesc {
                    binding: 0,
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    stages: vk::ShaderStageFlags::VERTEX,
                    optional: false,
                }],
                name: "layout".to_string(),
            })
            .unwrap();
        let table = device.create_binding_table(layout, 2, "table").unwrap();
        let buffer = device.create_buffer(&GfxBufferDesc::uniform(64, "ubo")).unwrap();

        let write = GfxBindingWrite {
            binding: 0,
            resource: GfxBindingResource::whole_buffer(buffer),
        };
        device.write_binding_table(table, 1, &[write]).unwrap();
        assert_eq!(device.binding_table_entries(table, 1).unwrap().get(&0), Some(&write.resource));
        assert!(device.binding_table_entries(table, 0).unwrap().is_empty());

        // 不存在的 binding
        let bad_binding = GfxBindingWrite { binding: 3, ..write };
        assert!(device.write_binding_table(table, 0, &[bad_binding]).is_err());
        // 超出份数
        assert!(device.write_binding_table(table, 2, &[write]).is_err());
    }

    #[test]
    fn test_render_targets_follow_swapchain() {
        let mut device = MockGfxDevice::with_image_count(EXTENT, 2);
        device.create_swapchain(&swapchain_desc()).unwrap();

        let targets = device
            .create_render_targets(&GfxRenderTargetsDesc {
                depth_format: vk::Format::D32_SFLOAT,
            })
            .unwrap();
        assert_eq!(targets.framebuffers.len(), 2);
        assert_eq!(targets.depth_images.len(), 2);
        assert_eq!(targets.extent, EXTENT);
        assert_eq!(device.live_objects().framebuffers, 2);

        device.destroy_render_targets(targets);
        let live = device.live_objects();
        assert_eq!((live.framebuffers, live.images, live.render_passes), (0, 0, 0));
    }

    #[test]
    fn test_device_lost_on_wait_idle() {
        let mut device = new_device();
        assert!(device.wait_idle().is_ok());

        device.inject_device_lost();
        assert!(matches!(device.wait_idle(), Err(GfxError::DeviceLost)));
        assert_eq!(device.stats().wait_idles, 2);
    }
}
