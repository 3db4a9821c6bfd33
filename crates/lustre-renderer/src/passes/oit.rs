//! 半透明几何的 per-pixel linked list
//!
//! clear pass 把链表头清成 `u32::MAX`（链表终止哨兵）并把节点计数
//! 清零；blend pass 对 blend 段做 indirect 绘制，fragment shader
//! 通过原子计数向链表追加节点，不写 color attachment。

use ash::vk;
use lustre_gfx::resources::{
    buffer::GfxBuffer,
    image::GfxImage,
    state::{GfxBufferState, GfxImageState},
};
use lustre_render_graph::{RgBufferHandle, RgImageHandle, RgPass, RgPassBuilder, RgPassContext};

use crate::{
    model::Model,
    passes::{full_scissor, full_viewport, INDIRECT_STRIDE},
    pipelines::RenderPipelines,
    shader_data::OitPushConstants,
};

/// 链表头的清除值，shader 侧判断链表结束
const OIT_HEAD_SENTINEL: u32 = u32::MAX;

pub struct OitClearPass<'a> {
    /// subresource range 从 image 上取，clear 本身走 handle
    pub head_image: &'a GfxImage,
    pub counter_buffer: &'a GfxBuffer,

    pub head: RgImageHandle,
    pub counter: RgBufferHandle,
}

impl RgPass for OitClearPass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.write_image(self.head, GfxImageState::TRANSFER_DST);
        builder.write_buffer(self.counter, GfxBufferState::TRANSFER_DST);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        ctx.cmd.cmd_clear_color_image(
            ctx.image(self.head),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &vk::ClearColorValue { uint32: [OIT_HEAD_SENTINEL; 4] },
            &[self.head_image.subresource_range()],
        );
        ctx.cmd.cmd_fill_buffer(self.counter_buffer, 0, vk::WHOLE_SIZE, 0);
    }
}

pub struct OitBlendPass<'a> {
    pub pipelines: &'a RenderPipelines,
    pub model: &'a Model,
    pub push: OitPushConstants,
    pub extent: vk::Extent2D,

    pub depth: RgImageHandle,
    pub head: RgImageHandle,
    pub nodes: RgBufferHandle,
    pub counter: RgBufferHandle,
}

impl RgPass for OitBlendPass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.depth, GfxImageState::DEPTH_ATTACHMENT_READ);
        builder.read_write_image(self.head, GfxImageState::STORAGE_READ_WRITE_FRAGMENT);
        builder.write_buffer(self.nodes, GfxBufferState::STORAGE_READ_WRITE_FRAGMENT);
        builder.write_buffer(self.counter, GfxBufferState::STORAGE_READ_WRITE_FRAGMENT);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        // 深度只读，被不透明几何遮住的片元直接剔除
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.image_view(self.depth))
            .image_layout(vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::NONE);
        let rendering_info = vk::RenderingInfo::default()
            .render_area(full_scissor(self.extent))
            .layer_count(1)
            .depth_attachment(&depth_attachment);

        ctx.cmd.begin_rendering(&rendering_info);
        ctx.cmd.set_viewport(full_viewport(self.extent));
        ctx.cmd.set_scissor(full_scissor(self.extent));

        let layout = self.pipelines.oit_pipeline_layout.handle();
        ctx.cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipelines.oit_blend_pipeline.handle());
        ctx.cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[self.model.bindless_set]);

        let head_info = vk::DescriptorImageInfo::default()
            .image_view(ctx.image_view(self.head))
            .image_layout(vk::ImageLayout::GENERAL);
        let head_write = vk::WriteDescriptorSet::default()
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(std::slice::from_ref(&head_info));
        ctx.cmd.push_descriptor_set(
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            1,
            std::slice::from_ref(&head_write),
        );

        ctx.cmd.push_constants(
            layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            bytemuck::bytes_of(&self.push),
        );
        ctx.cmd.bind_index_buffer(&self.model.index_buffer, 0, vk::IndexType::UINT32);
        ctx.cmd.draw_indexed_indirect(
            &self.model.indirect_buffer,
            self.model.blend_draw_offset(),
            self.model.blend_draw_count,
            INDIRECT_STRIDE,
        );

        ctx.cmd.end_rendering();
    }
}
