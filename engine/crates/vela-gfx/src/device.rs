use ash::vk;

use crate::desc::{
    GfxAcquireResult, GfxBindingLayoutDesc, GfxBindingWrite, GfxBufferDesc, GfxPipelineDesc, GfxPresentResult,
    GfxRenderTargets, GfxRenderTargetsDesc, GfxSamplerDesc, GfxSubmitDesc, GfxSwapchainDesc, GfxSwapchainInfo,
    GfxTextureDesc,
};
use crate::error::GfxResult;
use crate::handles::{
    GfxBindingLayoutHandle, GfxBindingTableHandle, GfxBufferHandle, GfxCommandBufferHandle, GfxFenceHandle,
    GfxFramebufferHandle, GfxImageHandle, GfxPipelineHandle, GfxRenderPassHandle, GfxSamplerHandle,
    GfxSemaphoreHandle,
};

/// 渲染核心与 GPU 之间唯一的接口
///
/// 所有对象都通过 handle 引用，handle 的生命周期由调用者负责：
/// 创建之后必须显式 destroy，destroy 之后 handle 不能再使用。
///
/// 录制命令（`cmd_*`）不会失败；传入无效 handle 属于调用者的 bug。
pub trait GfxDevice {
    // ----------------------------------------------------------------
    // buffer / image / sampler
    // ----------------------------------------------------------------

    /// host 可见并且持久映射的 buffer
    fn create_buffer(&mut self, desc: &GfxBufferDesc) -> GfxResult<GfxBufferHandle>;

    /// 写入 `data` 到 buffer 的 `offset` 处，越界是错误
    fn write_buffer(&mut self, buffer: GfxBufferHandle, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()>;

    fn destroy_buffer(&mut self, buffer: GfxBufferHandle);

    /// 创建 2D 贴图并同步上传像素数据，返回时贴图已经可以被采样
    fn create_texture(&mut self, desc: &GfxTextureDesc, pixels: &[u8]) -> GfxResult<GfxImageHandle>;

    fn destroy_image(&mut self, image: GfxImageHandle);

    fn create_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<GfxSamplerHandle>;

    fn destroy_sampler(&mut self, sampler: GfxSamplerHandle);

    // ----------------------------------------------------------------
    // binding layout / pipeline / binding table
    // ----------------------------------------------------------------

    fn create_binding_layout(&mut self, desc: &GfxBindingLayoutDesc) -> GfxResult<GfxBindingLayoutHandle>;

    fn destroy_binding_layout(&mut self, layout: GfxBindingLayoutHandle);

    fn create_pipeline(&mut self, desc: &GfxPipelineDesc) -> GfxResult<GfxPipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: GfxPipelineHandle);

    /// 分配 `copies` 份使用同一个 layout 的 binding table，每个 frame slot 使用其中一份
    fn create_binding_table(
        &mut self,
        layout: GfxBindingLayoutHandle,
        copies: usize,
        name: &str,
    ) -> GfxResult<GfxBindingTableHandle>;

    /// 更新第 `copy` 份 binding table，调用者需要保证这一份没有被 GPU 使用
    fn write_binding_table(
        &mut self,
        table: GfxBindingTableHandle,
        copy: usize,
        writes: &[GfxBindingWrite],
    ) -> GfxResult<()>;

    fn destroy_binding_table(&mut self, table: GfxBindingTableHandle);

    // ----------------------------------------------------------------
    // 同步
    // ----------------------------------------------------------------

    fn create_fence(&mut self, signaled: bool, name: &str) -> GfxResult<GfxFenceHandle>;

    /// 阻塞等待，没有超时
    fn wait_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()>;

    fn reset_fence(&mut self, fence: GfxFenceHandle) -> GfxResult<()>;

    fn destroy_fence(&mut self, fence: GfxFenceHandle);

    fn create_semaphore(&mut self, name: &str) -> GfxResult<GfxSemaphoreHandle>;

    fn destroy_semaphore(&mut self, semaphore: GfxSemaphoreHandle);

    fn wait_idle(&mut self) -> GfxResult<()>;

    // ----------------------------------------------------------------
    // 呈现
    // ----------------------------------------------------------------

    /// 创建 swapchain，已经存在的 swapchain 会被替换并销毁
    fn create_swapchain(&mut self, desc: &GfxSwapchainDesc) -> GfxResult<GfxSwapchainInfo>;

    fn destroy_swapchain(&mut self);

    /// 基于当前的 swapchain 创建 render pass、depth buffer 和 framebuffer
    fn create_render_targets(&mut self, desc: &GfxRenderTargetsDesc) -> GfxResult<GfxRenderTargets>;

    fn destroy_render_targets(&mut self, targets: GfxRenderTargets);

    /// 获取下一张 swapchain image，`semaphore` 在 image 可用时被 signal
    fn acquire_next_image(&mut self, semaphore: GfxSemaphoreHandle) -> GfxResult<GfxAcquireResult>;

    /// 等待 `wait_semaphore` 之后呈现 `image_index`
    fn present(&mut self, image_index: u32, wait_semaphore: GfxSemaphoreHandle) -> GfxResult<GfxPresentResult>;

    // ----------------------------------------------------------------
    // command buffer
    // ----------------------------------------------------------------

    fn create_command_buffer(&mut self, name: &str) -> GfxResult<GfxCommandBufferHandle>;

    /// 重置并开始录制，一次性提交
    fn begin_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()>;

    fn end_command_buffer(&mut self, cmd: GfxCommandBufferHandle) -> GfxResult<()>;

    fn submit(&mut self, desc: &GfxSubmitDesc) -> GfxResult<()>;

    fn cmd_begin_render_pass(
        &mut self,
        cmd: GfxCommandBufferHandle,
        render_pass: GfxRenderPassHandle,
        framebuffer: GfxFramebufferHandle,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    );

    fn cmd_end_render_pass(&mut self, cmd: GfxCommandBufferHandle);

    fn cmd_set_viewport_scissor(&mut self, cmd: GfxCommandBufferHandle, viewport: vk::Viewport, scissor: vk::Rect2D);

    fn cmd_bind_pipeline(&mut self, cmd: GfxCommandBufferHandle, pipeline: GfxPipelineHandle);

    /// 绑定 binding table 的第 `copy` 份，layout 来自 `pipeline`
    fn cmd_bind_binding_table(
        &mut self,
        cmd: GfxCommandBufferHandle,
        pipeline: GfxPipelineHandle,
        table: GfxBindingTableHandle,
        copy: usize,
    );

    fn cmd_bind_vertex_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle);

    /// index 类型固定为 u32
    fn cmd_bind_index_buffer(&mut self, cmd: GfxCommandBufferHandle, buffer: GfxBufferHandle);

    fn cmd_draw_indexed(&mut self, cmd: GfxCommandBufferHandle, index_count: u32, instance_count: u32);
}
