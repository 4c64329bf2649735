use slotmap::new_key_type;

// 所有 GPU 对象的不透明 handle，由具体的 GfxDevice 实现负责解释
new_key_type! {
    pub struct GfxBufferHandle;
    /// texture 和 depth buffer 共用
    pub struct GfxImageHandle;
    pub struct GfxSamplerHandle;
    /// 对应 vk::DescriptorSetLayout + vk::PipelineLayout
    pub struct GfxBindingLayoutHandle;
    pub struct GfxPipelineHandle;
    /// 一组 descriptor set，每个 frame slot 一份
    pub struct GfxBindingTableHandle;
    pub struct GfxFenceHandle;
    pub struct GfxSemaphoreHandle;
    pub struct GfxCommandBufferHandle;
    pub struct GfxRenderPassHandle;
    pub struct GfxFramebufferHandle;
}
