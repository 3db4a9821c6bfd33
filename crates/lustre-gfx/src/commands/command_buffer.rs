use std::ffi::CString;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// command buffer 封装
///
/// 持有录制所需的 device 函数表克隆，录制接口不再需要额外传入设备
pub struct GfxCommandBuffer {
    handle: vk::CommandBuffer,

    device: ash::Device,
    dynamic_rendering: ash::khr::dynamic_rendering::Device,
    debug_utils: ash::ext::debug_utils::Device,
    push_descriptor: ash::khr::push_descriptor::Device,
}

impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxCommandBuffer {
    pub fn new(gfx: &Gfx, handle: vk::CommandBuffer, name: &str) -> Self {
        let gfx_device = gfx.gfx_device();
        let cmd = Self {
            handle,
            device: (**gfx_device).clone(),
            dynamic_rendering: gfx_device.dynamic_rendering().clone(),
            debug_utils: gfx_device.debug_utils().clone(),
            push_descriptor: gfx_device.push_descriptor().clone(),
        };
        gfx_device.set_debug_name(&cmd, name);
        cmd
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}

// 录制控制
impl GfxCommandBuffer {
    #[inline]
    pub fn begin(&self, usage: vk::CommandBufferUsageFlags) {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage);
        unsafe {
            self.device.begin_command_buffer(self.handle, &begin_info).unwrap();
        }
    }

    #[inline]
    pub fn end(&self) {
        unsafe {
            self.device.end_command_buffer(self.handle).unwrap();
        }
    }

    pub fn begin_label(&self, name: &str, color: [f32; 4]) {
        let name = CString::new(name).unwrap();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color);
        unsafe {
            self.debug_utils.cmd_begin_debug_utils_label(self.handle, &label);
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe {
            self.debug_utils.cmd_end_debug_utils_label(self.handle);
        }
    }
}

// barrier
impl GfxCommandBuffer {
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let vk_barriers = barriers.iter().map(|b| b.barrier()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .dependency_flags(dependency_flags)
            .image_memory_barriers(&vk_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }

    pub fn buffer_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]) {
        let vk_barriers = barriers.iter().map(|b| b.barrier()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .dependency_flags(dependency_flags)
            .buffer_memory_barriers(&vk_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }
}

// transfer
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_copy_buffer(&self, src: &GfxBuffer, dst: &GfxBuffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device.cmd_copy_buffer(self.handle, src.vk_buffer(), dst.vk_buffer(), regions);
        }
    }

    #[inline]
    pub fn cmd_copy_buffer_to_image(&self, copy_info: &vk::CopyBufferToImageInfo2) {
        unsafe {
            self.device.cmd_copy_buffer_to_image2(self.handle, copy_info);
        }
    }

    #[inline]
    pub fn cmd_clear_color_image(
        &self,
        image: vk::Image,
        layout: vk::ImageLayout,
        clear_value: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe {
            self.device.cmd_clear_color_image(self.handle, image, layout, clear_value, ranges);
        }
    }

    #[inline]
    pub fn cmd_fill_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        unsafe {
            self.device.cmd_fill_buffer(self.handle, buffer.vk_buffer(), offset, size, data);
        }
    }
}

// 动态渲染
impl GfxCommandBuffer {
    #[inline]
    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        unsafe {
            self.dynamic_rendering.cmd_begin_rendering(self.handle, rendering_info);
        }
    }

    #[inline]
    pub fn end_rendering(&self) {
        unsafe {
            self.dynamic_rendering.cmd_end_rendering(self.handle);
        }
    }

    #[inline]
    pub fn set_viewport(&self, viewport: vk::Viewport) {
        unsafe {
            self.device.cmd_set_viewport(self.handle, 0, std::slice::from_ref(&viewport));
        }
    }

    #[inline]
    pub fn set_scissor(&self, scissor: vk::Rect2D) {
        unsafe {
            self.device.cmd_set_scissor(self.handle, 0, std::slice::from_ref(&scissor));
        }
    }
}

// 绑定与绘制
impl GfxCommandBuffer {
    #[inline]
    pub fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.handle, bind_point, pipeline);
        }
    }

    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.handle, bind_point, layout, first_set, sets, &[]);
        }
    }

    #[inline]
    pub fn push_descriptor_set(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: &[vk::WriteDescriptorSet],
    ) {
        unsafe {
            self.push_descriptor.cmd_push_descriptor_set(self.handle, bind_point, layout, set, writes);
        }
    }

    #[inline]
    pub fn push_constants(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(self.handle, layout, stages, offset, data);
        }
    }

    #[inline]
    pub fn bind_index_buffer(&self, buffer: &GfxBuffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe {
            self.device.cmd_bind_index_buffer(self.handle, buffer.vk_buffer(), offset, index_type);
        }
    }

    #[inline]
    pub fn draw_indexed_indirect(
        &self,
        buffer: &GfxBuffer,
        offset: vk::DeviceSize,
        draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed_indirect(self.handle, buffer.vk_buffer(), offset, draw_count, stride);
        }
    }

    #[inline]
    pub fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(self.handle, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    #[inline]
    pub fn dispatch(&self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        unsafe {
            self.device.cmd_dispatch(self.handle, group_count_x, group_count_y, group_count_z);
        }
    }
}
