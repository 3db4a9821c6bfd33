use std::path::Path;

use ash::vk;

use crate::{
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::{pipeline_layout::GfxPipelineLayout, shader::GfxShaderModule},
};

pub struct GfxComputePipeline {
    handle: vk::Pipeline,
}

impl DebugType for GfxComputePipeline {
    fn debug_type_name() -> &'static str {
        "GfxComputePipeline"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxComputePipeline {
    pub fn new(gfx: &Gfx, layout: &GfxPipelineLayout, shader_path: &Path, name: &str) -> Self {
        let module = GfxShaderModule::load(gfx, shader_path);

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.handle())
            .name(c"main");

        let pipeline_ci = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout.handle());

        let handle = unsafe {
            gfx.gfx_device()
                .create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
                .unwrap()[0]
        };

        module.destroy(gfx);

        let pipeline = Self { handle };
        gfx.gfx_device().set_debug_name(&pipeline, name);
        pipeline
    }
}

// getters
impl GfxComputePipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

// destroy
impl GfxComputePipeline {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_pipeline(self.handle, None);
        }
        self.handle = vk::Pipeline::null();
    }
}
impl Drop for GfxComputePipeline {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
