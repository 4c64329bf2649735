use std::ffi::CStr;
use std::path::Path;

use ash::vk;
use itertools::Itertools;

use crate::desc::{GfxBindingLayoutDesc, GfxPipelineDesc};
use crate::error::{GfxError, GfxResult};
use crate::vulkan::context::VkCore;

/// descriptor set layout 以及只包含这一个 set 的 pipeline layout
pub struct VkBindingLayout {
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) desc: GfxBindingLayoutDesc,
}

// new & init
impl VkBindingLayout {
    pub fn new(core: &VkCore, desc: &GfxBindingLayoutDesc) -> GfxResult<Self> {
        let bindings = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.ty)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
            })
            .collect_vec();
        // 可选的 binding 允许不写入
        let binding_flags = desc
            .bindings
            .iter()
            .map(|b| {
                if b.optional { vk::DescriptorBindingFlags::PARTIALLY_BOUND } else { vk::DescriptorBindingFlags::empty() }
            })
            .collect_vec();
        let mut binding_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let set_layout_ci =
            vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings).push_next(&mut binding_flags_ci);
        let set_layout = unsafe { core.device.create_descriptor_set_layout(&set_layout_ci, None)? };
        core.set_debug_name(set_layout, format!("DescriptorSetLayout::{}", desc.name));

        let set_layouts = [set_layout];
        let pipeline_layout = match unsafe {
            core.device.create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts), None)
        } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { core.device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(e.into());
            }
        };
        core.set_debug_name(pipeline_layout, format!("PipelineLayout::{}", desc.name));

        Ok(Self {
            set_layout,
            pipeline_layout,
            desc: desc.clone(),
        })
    }
}
// destroy
impl VkBindingLayout {
    pub fn destroy(self, core: &VkCore) {
        unsafe {
            core.device.destroy_pipeline_layout(self.pipeline_layout, None);
            core.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// 一组使用同一个 layout 的 descriptor set，拥有自己的 descriptor pool
pub struct VkBindingTable {
    pool: vk::DescriptorPool,
    pub(crate) sets: Vec<vk::DescriptorSet>,
}

// new & init
impl VkBindingTable {
    pub fn new(core: &VkCore, layout: &VkBindingLayout, copies: usize, name: &str) -> GfxResult<Self> {
        let pool_sizes = layout
            .desc
            .bindings
            .iter()
            .into_group_map_by(|b| b.ty)
            .into_iter()
            .map(|(ty, bindings)| vk::DescriptorPoolSize {
                ty,
                descriptor_count: (bindings.len() * copies) as u32,
            })
            .collect_vec();

        let pool = unsafe {
            core.device.create_descriptor_pool(
                &vk::DescriptorPoolCreateInfo::default().max_sets(copies as u32).pool_sizes(&pool_sizes),
                None,
            )?
        };
        core.set_debug_name(pool, format!("DescriptorPool::{name}"));

        let set_layouts = vec![layout.set_layout; copies];
        let sets = match unsafe {
            core.device.allocate_descriptor_sets(
                &vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool).set_layouts(&set_layouts),
            )
        } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { core.device.destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };
        for (idx, set) in sets.iter().enumerate() {
            core.set_debug_name(*set, format!("DescriptorSet::{name}-{idx}"));
        }

        Ok(Self { pool, sets })
    }
}
// destroy
impl VkBindingTable {
    /// descriptor set 随 pool 一起释放
    pub fn destroy(self, core: &VkCore) {
        unsafe {
            core.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

pub struct VkPipeline {
    pub(crate) handle: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
}

// new & init
impl VkPipeline {
    pub fn new(
        core: &VkCore,
        desc: &GfxPipelineDesc,
        binding_layout: &VkBindingLayout,
        render_pass: vk::RenderPass,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("VkPipeline::new");

        let vertex_module = create_shader_module(core, &desc.shaders.vertex)?;
        let fragment_module = match create_shader_module(core, &desc.shaders.fragment) {
            Ok(module) => module,
            Err(e) => {
                unsafe { core.device.destroy_shader_module(vertex_module, None) };
                return Err(e);
            }
        };

        let result = Self::create_pipeline(core, desc, binding_layout, render_pass, vertex_module, fragment_module);

        // pipeline 创建完成之后 shader module 就不再需要了
        unsafe {
            core.device.destroy_shader_module(vertex_module, None);
            core.device.destroy_shader_module(fragment_module, None);
        }

        let handle = result?;
        core.set_debug_name(handle, format!("Pipeline::{}", desc.name));
        Ok(Self {
            handle,
            layout: binding_layout.pipeline_layout,
        })
    }

    fn create_pipeline(
        core: &VkCore,
        desc: &GfxPipelineDesc,
        binding_layout: &VkBindingLayout,
        render_pass: vk::RenderPass,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> GfxResult<vk::Pipeline> {
        const ENTRY_POINT: &CStr = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_POINT),
        ];

        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let vertex_attributes = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attr| vk::VertexInputAttributeDescription {
                location: attr.location,
                binding: 0,
                format: attr.format,
                offset: attr.offset,
            })
            .collect_vec();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(desc.topology);

        // viewport 和 scissor 都是动态的，这里只需要给出数量
        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(desc.polygon_mode)
            .cull_mode(desc.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachments);

        let pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(binding_layout.pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            core.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
                .map_err(|(_, e)| GfxError::from(e))?
        };
        Ok(pipelines[0])
    }
}
// destroy
impl VkPipeline {
    /// pipeline layout 属于 binding layout，不在这里销毁
    pub fn destroy(self, core: &VkCore) {
        unsafe {
            core.device.destroy_pipeline(self.handle, None);
        }
    }
}

/// 读取 SPIR-V 文件并创建 shader module
pub fn create_shader_module(core: &VkCore, path: &Path) -> GfxResult<vk::ShaderModule> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        log::error!("failed to open shader {}: {}", path.display(), e);
        GfxError::ShaderNotFound(path.to_path_buf())
    })?;
    let code = ash::util::read_spv(&mut file).map_err(|e| {
        log::error!("failed to read spv {}: {}", path.display(), e);
        GfxError::ShaderNotFound(path.to_path_buf())
    })?;

    let module = unsafe { core.device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code), None)? };
    core.set_debug_name(module, format!("ShaderModule::{}", path.display()));
    Ok(module)
}

/// 一个 color attachment + 一个 depth attachment 的单 subpass render pass
///
/// color attachment 结束后直接转换到 PRESENT_SRC_KHR
pub fn create_render_pass(
    core: &VkCore,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> GfxResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    // 等待 acquire 的 semaphore 之后才能写入 color attachment
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let render_pass_ci = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { core.device.create_render_pass(&render_pass_ci, None)? };
    core.set_debug_name(render_pass, "main");
    Ok(render_pass)
}
