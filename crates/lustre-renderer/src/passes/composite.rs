//! 合成：HDR tone map + OIT 链表排序混合，直接写 swapchain image
//!
//! compute pass，swapchain image 以 GENERAL layout 作 storage 写入。

use ash::vk;
use lustre_gfx::resources::state::{GfxBufferState, GfxImageState};
use lustre_render_graph::{RgBufferHandle, RgImageHandle, RgPass, RgPassBuilder, RgPassContext};

use crate::{pipelines::RenderPipelines, shader_data::CompositePushConstants, upload::dispatch_group_count};

pub struct CompositePass<'a> {
    pub pipelines: &'a RenderPipelines,
    pub push: CompositePushConstants,
    pub extent: vk::Extent2D,
    pub hdr_sampler: vk::Sampler,

    pub hdr_color: RgImageHandle,
    pub oit_head: RgImageHandle,
    pub nodes: RgBufferHandle,
    pub swapchain_image: RgImageHandle,
}

impl RgPass for CompositePass<'_> {
    fn setup(&mut self, builder: &mut RgPassBuilder) {
        builder.read_image(self.hdr_color, GfxImageState::SHADER_READ_COMPUTE);
        builder.read_write_image(self.oit_head, GfxImageState::STORAGE_READ_WRITE_COMPUTE);
        builder.read_buffer(self.nodes, GfxBufferState::STORAGE_READ_COMPUTE);
        builder.write_image(self.swapchain_image, GfxImageState::STORAGE_WRITE_COMPUTE);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let layout = self.pipelines.composite_pipeline_layout.handle();
        ctx.cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, self.pipelines.composite_pipeline.handle());

        let hdr_info = vk::DescriptorImageInfo::default()
            .sampler(self.hdr_sampler)
            .image_view(ctx.image_view(self.hdr_color))
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let head_info = vk::DescriptorImageInfo::default()
            .image_view(ctx.image_view(self.oit_head))
            .image_layout(vk::ImageLayout::GENERAL);
        let output_info = vk::DescriptorImageInfo::default()
            .image_view(ctx.image_view(self.swapchain_image))
            .image_layout(vk::ImageLayout::GENERAL);
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&hdr_info)),
            vk::WriteDescriptorSet::default()
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(std::slice::from_ref(&head_info)),
            vk::WriteDescriptorSet::default()
                .dst_binding(2)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(std::slice::from_ref(&output_info)),
        ];
        ctx.cmd.push_descriptor_set(vk::PipelineBindPoint::COMPUTE, layout, 0, &writes);

        ctx.cmd.push_constants(layout, vk::ShaderStageFlags::COMPUTE, 0, bytemuck::bytes_of(&self.push));
        ctx.cmd.dispatch(dispatch_group_count(self.extent.width), dispatch_group_count(self.extent.height), 1);
    }
}
