//! 不透明几何的 PBR 着色
//!
//! 深度由 prepass 写好，这里以 EQUAL 测试只着色可见片元。

use ash::vk;
use lustre_gfx::resources::state::GfxImageState;
use lustre_render_graph::{RgImageHandle, RgPass, RgPassBuilder, RgPassContext};

use crate::{
    model::Model,
    passes::{full_scissor, full_viewport, INDIRECT_STRIDE},
    pipelines::RenderPipelines,
    shader_data::FramePushConstants,
};

/// set 1 的帧级输入：shadow map 来自渲染图，IBL 三件套与
/// BRDF LUT 是持久资源，直接以 vk handle 传入
pub struct FrameInputBindings {
    pub shadow_sampler: vk::Sampler,

    pub irradiance_view: vk::ImageView,
    pub radiance_view: vk::ImageView,
    pub env_sampler: vk::Sampler,

    pub brdf_lut_view: vk::ImageView,
    pub brdf_lut_sampler: vk::Sampler,
}

pub struct OpaquePass<'a> {
    pub pipelines: &'a RenderPipelines,
    pub model: &'a Model,
    pub push: FramePushConstants,
    pub extent: vk::Extent2D,
    pub inputs: FrameInputBindings,

    pub hdr_color: RgImageHandle,
    pub depth: RgImageHandle,
    pub shadow_map: RgImageHandle,
}

impl RgPass for OpaquePass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.write_image(self.hdr_color, GfxImageState::COLOR_ATTACHMENT_WRITE);
        builder.read_image(self.depth, GfxImageState::DEPTH_ATTACHMENT_READ);
        builder.read_image(self.shadow_map, GfxImageState::SHADER_READ_FRAGMENT);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.image_view(self.hdr_color))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
            });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.image_view(self.depth))
            .image_layout(vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::NONE);
        let rendering_info = vk::RenderingInfo::default()
            .render_area(full_scissor(self.extent))
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        ctx.cmd.begin_rendering(&rendering_info);
        ctx.cmd.set_viewport(full_viewport(self.extent));
        ctx.cmd.set_scissor(full_scissor(self.extent));

        let layout = self.pipelines.model_pipeline_layout.handle();
        ctx.cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipelines.opaque_pipeline.handle());
        ctx.cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[self.model.bindless_set]);

        let shadow_info = vk::DescriptorImageInfo::default()
            .sampler(self.inputs.shadow_sampler)
            .image_view(ctx.image_view(self.shadow_map))
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let irradiance_info = vk::DescriptorImageInfo::default()
            .sampler(self.inputs.env_sampler)
            .image_view(self.inputs.irradiance_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let radiance_info = vk::DescriptorImageInfo::default()
            .sampler(self.inputs.env_sampler)
            .image_view(self.inputs.radiance_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let brdf_info = vk::DescriptorImageInfo::default()
            .sampler(self.inputs.brdf_lut_sampler)
            .image_view(self.inputs.brdf_lut_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let writes = [
            sampled_write(0, &shadow_info),
            sampled_write(1, &irradiance_info),
            sampled_write(2, &radiance_info),
            sampled_write(3, &brdf_info),
        ];
        ctx.cmd.push_descriptor_set(vk::PipelineBindPoint::GRAPHICS, layout, 1, &writes);

        ctx.cmd.push_constants(
            layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            bytemuck::bytes_of(&self.push),
        );
        ctx.cmd.bind_index_buffer(&self.model.index_buffer, 0, vk::IndexType::UINT32);
        ctx.cmd.draw_indexed_indirect(
            &self.model.indirect_buffer,
            0,
            self.model.opaque_draw_count,
            INDIRECT_STRIDE,
        );

        ctx.cmd.end_rendering();
    }
}

fn sampled_write(binding: u32, info: &vk::DescriptorImageInfo) -> vk::WriteDescriptorSet<'_> {
    vk::WriteDescriptorSet::default()
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(std::slice::from_ref(info))
}
