use ash::vk;
use itertools::Itertools;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// descriptor set layout 封装
///
/// 支持 bindless 的可变数量 binding 以及 push descriptor layout
pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
}

impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

pub struct GfxDescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
    binding_flags: Vec<vk::DescriptorBindingFlags>,
    layout_flags: vk::DescriptorSetLayoutCreateFlags,
}

impl Default for GfxDescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GfxDescriptorSetLayoutBuilder<'a> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            binding_flags: Vec::new(),
            layout_flags: vk::DescriptorSetLayoutCreateFlags::empty(),
        }
    }

    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stages),
        );
        self.binding_flags.push(vk::DescriptorBindingFlags::empty());
        self
    }

    /// bindless 的贴图数组：可变数量 + partially bound + update after bind
    pub fn variable_count_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        max_count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(max_count)
                .stage_flags(stages),
        );
        self.binding_flags.push(
            vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT
                | vk::DescriptorBindingFlags::PARTIALLY_BOUND
                | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND,
        );
        self.layout_flags |= vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL;
        self
    }

    /// push descriptor layout（不从 pool 分配，直接随 cmd 推送）
    pub fn push_descriptor(mut self) -> Self {
        self.layout_flags |= vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR;
        self
    }

    pub fn build(self, gfx: &Gfx, name: &str) -> GfxDescriptorSetLayout {
        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&self.binding_flags);
        let layout_ci = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings)
            .flags(self.layout_flags)
            .push_next(&mut flags_info);

        let handle = unsafe { gfx.gfx_device().create_descriptor_set_layout(&layout_ci, None).unwrap() };
        let layout = GfxDescriptorSetLayout { handle };
        gfx.gfx_device().set_debug_name(&layout, name);
        layout
    }
}

// getters
impl GfxDescriptorSetLayout {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

// destroy
impl GfxDescriptorSetLayout {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_descriptor_set_layout(self.handle, None);
        }
        self.handle = vk::DescriptorSetLayout::null();
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}

/// descriptor pool 封装
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
}

impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxDescriptorPool {
    pub fn new(gfx: &Gfx, max_sets: u32, pool_sizes: &[vk::DescriptorPoolSize], name: &str) -> Self {
        let pool_ci = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes)
            .flags(
                vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET
                    | vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
            );

        let handle = unsafe { gfx.gfx_device().create_descriptor_pool(&pool_ci, None).unwrap() };
        let pool = Self { handle };
        gfx.gfx_device().set_debug_name(&pool, name);
        pool
    }
}

// tools
impl GfxDescriptorPool {
    /// 分配可变数量 binding 的 descriptor set
    pub fn alloc_variable_set(
        &self,
        gfx: &Gfx,
        layout: &GfxDescriptorSetLayout,
        variable_count: u32,
        name: &str,
    ) -> vk::DescriptorSet {
        let counts = [variable_count];
        let mut variable_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
            .descriptor_counts(&counts);

        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(&layouts)
            .push_next(&mut variable_info);

        let set = unsafe { gfx.gfx_device().allocate_descriptor_sets(&alloc_info).unwrap()[0] };
        gfx.gfx_device().set_object_debug_name(set, name);
        set
    }

    pub fn alloc_sets(
        &self,
        gfx: &Gfx,
        layouts: &[&GfxDescriptorSetLayout],
        name: &str,
    ) -> Vec<vk::DescriptorSet> {
        let vk_layouts = layouts.iter().map(|l| l.handle()).collect_vec();
        let alloc_info =
            vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.handle).set_layouts(&vk_layouts);

        let sets = unsafe { gfx.gfx_device().allocate_descriptor_sets(&alloc_info).unwrap() };
        for set in &sets {
            gfx.gfx_device().set_object_debug_name(*set, name);
        }
        sets
    }

    pub fn free_sets(&self, gfx: &Gfx, sets: &[vk::DescriptorSet]) {
        unsafe {
            gfx.gfx_device().free_descriptor_sets(self.handle, sets).unwrap();
        }
    }
}

// destroy
impl GfxDescriptorPool {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_descriptor_pool(self.handle, None);
        }
        self.handle = vk::DescriptorPool::null();
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
