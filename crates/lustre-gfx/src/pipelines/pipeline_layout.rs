use ash::vk;
use itertools::Itertools;

use crate::{
    foundation::debug_messenger::DebugType, gfx::Gfx, pipelines::descriptor::GfxDescriptorSetLayout,
};

pub struct GfxPipelineLayout {
    handle: vk::PipelineLayout,
}

impl DebugType for GfxPipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxPipelineLayout {
    /// 最多一个 push constant range；renderer 里所有 pipeline 都走 push constant 传参
    pub fn new(
        gfx: &Gfx,
        set_layouts: &[&GfxDescriptorSetLayout],
        push_constant_range: Option<vk::PushConstantRange>,
        name: &str,
    ) -> Self {
        let vk_set_layouts = set_layouts.iter().map(|l| l.handle()).collect_vec();
        let ranges = push_constant_range.map(|r| vec![r]).unwrap_or_default();

        let layout_ci =
            vk::PipelineLayoutCreateInfo::default().set_layouts(&vk_set_layouts).push_constant_ranges(&ranges);

        let handle = unsafe { gfx.gfx_device().create_pipeline_layout(&layout_ci, None).unwrap() };
        let layout = Self { handle };
        gfx.gfx_device().set_debug_name(&layout, name);
        layout
    }
}

// getters
impl GfxPipelineLayout {
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

// destroy
impl GfxPipelineLayout {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_pipeline_layout(self.handle, None);
        }
        self.handle = vk::PipelineLayout::null();
    }
}
impl Drop for GfxPipelineLayout {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
