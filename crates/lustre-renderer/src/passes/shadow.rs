//! 方向光 shadow map

use ash::vk;
use lustre_gfx::resources::state::GfxImageState;
use lustre_render_graph::{RgImageHandle, RgPass, RgPassBuilder, RgPassContext};

use crate::{
    model::Model,
    passes::{full_scissor, full_viewport, INDIRECT_STRIDE},
    pipelines::RenderPipelines,
    settings::RendererSettings,
    shader_data::FramePushConstants,
};

pub struct ShadowPass<'a> {
    pub pipelines: &'a RenderPipelines,
    pub model: &'a Model,
    /// view_proj 已经换成光源视角
    pub push: FramePushConstants,

    pub shadow_map: RgImageHandle,
}

impl RgPass for ShadowPass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.write_image(self.shadow_map, GfxImageState::DEPTH_ATTACHMENT_WRITE);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let extent = vk::Extent2D {
            width: RendererSettings::SHADOW_MAP_SIZE,
            height: RendererSettings::SHADOW_MAP_SIZE,
        };

        // reversed-Z，clear 到 0.0
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.image_view(self.shadow_map))
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(full_scissor(extent))
            .layer_count(1)
            .depth_attachment(&depth_attachment);

        ctx.cmd.begin_rendering(&rendering_info);
        ctx.cmd.set_viewport(full_viewport(extent));
        ctx.cmd.set_scissor(full_scissor(extent));

        ctx.cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipelines.shadow_pipeline.handle());
        ctx.cmd.push_constants(
            self.pipelines.model_pipeline_layout.handle(),
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
