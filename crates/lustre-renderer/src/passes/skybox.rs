//! 天空盒
//!
//! 顶点由 shader 内置的 cube 生成（36 个顶点，无 buffer）。
//! reversed-Z 下深度 clear 是 0.0，EQUAL 测试只覆盖没有几何体的像素。

use ash::vk;
use lustre_gfx::resources::state::GfxImageState;
use lustre_render_graph::{RgImageHandle, RgPass, RgPassBuilder, RgPassContext};

use crate::{
    passes::{full_scissor, full_viewport},
    pipelines::RenderPipelines,
    shader_data::SkyboxPushConstants,
};

pub struct SkyboxPass<'a> {
    pub pipelines: &'a RenderPipelines,
    pub push: SkyboxPushConstants,
    pub extent: vk::Extent2D,

    pub env_view: vk::ImageView,
    pub env_sampler: vk::Sampler,

    pub hdr_color: RgImageHandle,
    pub depth: RgImageHandle,
}

impl RgPass for SkyboxPass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_write_image(self.hdr_color, GfxImageState::COLOR_ATTACHMENT_READ_WRITE);
        builder.read_image(self.depth, GfxImageState::DEPTH_ATTACHMENT_READ);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.image_view(self.hdr_color))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
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

        let layout = self.pipelines.skybox_pipeline_layout.handle();
        ctx.cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipelines.skybox_pipeline.handle());

        let env_info = vk::DescriptorImageInfo::default()
            .sampler(self.env_sampler)
            .image_view(self.env_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let write = vk::WriteDescriptorSet::default()
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&env_info));
        ctx.cmd.push_descriptor_set(
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            0,
            std::slice::from_ref(&write),
        );

        ctx.cmd.push_constants(layout, vk::ShaderStageFlags::VERTEX, 0, bytemuck::bytes_of(&self.push));
        ctx.cmd.draw(36, 1, 0, 0);

        ctx.cmd.end_rendering();
    }
}
