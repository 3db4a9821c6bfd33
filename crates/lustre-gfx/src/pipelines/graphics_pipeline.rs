use std::path::PathBuf;

use ash::vk;

use crate::{
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::{pipeline_layout::GfxPipelineLayout, shader::GfxShaderModule},
};

/// 图形管线的固定功能描述
///
/// 基于 dynamic rendering，不使用 render pass 对象；
/// viewport/scissor 是 dynamic state。
/// 顶点数据通过 buffer device address 拉取，没有 vertex input binding。
pub struct GfxGraphicsPipelineDesc {
    pub vertex_shader: PathBuf,
    /// depth-only pass 可以没有 fragment shader
    pub fragment_shader: Option<PathBuf>,

    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,

    pub depth_test: bool,
    pub depth_write: bool,
    /// reversed-Z 下常规深度测试使用 GREATER
    pub depth_compare_op: vk::CompareOp,

    /// None 表示没有 color attachment（shadow/depth-prepass/OIT）
    pub color_format: Option<vk::Format>,
    pub depth_format: Option<vk::Format>,

    pub blend_enable: bool,
    /// OIT pass 只通过 storage 写入，关闭 color write
    pub color_write_mask: vk::ColorComponentFlags,
}

impl Default for GfxGraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::new(),
            fragment_shader: None,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::GREATER,
            color_format: None,
            depth_format: None,
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

pub struct GfxGraphicsPipeline {
    handle: vk::Pipeline,
}

impl DebugType for GfxGraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxGraphicsPipeline {
    pub fn new(gfx: &Gfx, layout: &GfxPipelineLayout, desc: &GfxGraphicsPipelineDesc, name: &str) -> Self {
        let vertex_module = GfxShaderModule::load(gfx, &desc.vertex_shader);
        let fragment_module = desc.fragment_shader.as_ref().map(|path| GfxShaderModule::load(gfx, path));

        let mut stages = vec![
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module.handle())
                .name(c"main"),
        ];
        if let Some(fragment) = &fragment_module {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment.handle())
                    .name(c"main"),
            );
        }

        // 顶点数据走 vertex pulling，没有 attribute/binding
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(desc.depth_compare_op);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(desc.blend_enable)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(desc.color_write_mask);
        let blend_attachments = desc.color_format.map(|_| vec![blend_attachment]).unwrap_or_default();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let color_formats = desc.color_format.map(|f| vec![f]).unwrap_or_default();
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format.unwrap_or(vk::Format::UNDEFINED));

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
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        let handle = unsafe {
            gfx.gfx_device()
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
                .unwrap()[0]
        };

        vertex_module.destroy(gfx);
        if let Some(fragment) = fragment_module {
            fragment.destroy(gfx);
        }

        let pipeline = Self { handle };
        gfx.gfx_device().set_debug_name(&pipeline, name);
        pipeline
    }
}

// getters
impl GfxGraphicsPipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

// destroy
impl GfxGraphicsPipeline {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_pipeline(self.handle, None);
        }
        self.handle = vk::Pipeline::null();
    }
}
impl Drop for GfxGraphicsPipeline {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
