use ash::vk;

use crate::{
    commands::command_buffer::GfxCommandBuffer,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

pub struct GfxCommandPool {
    handle: vk::CommandPool,
    family_index: u32,
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxCommandPool {
    pub fn new(gfx: &Gfx, family_index: u32, flags: vk::CommandPoolCreateFlags, name: &str) -> Self {
        let pool_ci = vk::CommandPoolCreateInfo::default().queue_family_index(family_index).flags(flags);
        let handle = unsafe { gfx.gfx_device().create_command_pool(&pool_ci, None).unwrap() };

        let pool = Self { handle, family_index };
        gfx.gfx_device().set_debug_name(&pool, name);
        pool
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn family_index(&self) -> u32 {
        self.family_index
    }
}

// tools
impl GfxCommandPool {
    pub fn alloc_command_buffer(&self, gfx: &Gfx, name: &str) -> GfxCommandBuffer {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.handle)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { gfx.gfx_device().allocate_command_buffers(&alloc_info).unwrap()[0] };
        GfxCommandBuffer::new(gfx, cmd, name)
    }

    /// 重置 pool 中所有 command buffer
    ///
    /// 调用前必须保证其中的 command buffer 不再被 GPU 使用
    #[inline]
    pub fn reset(&self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().reset_command_pool(self.handle, vk::CommandPoolResetFlags::empty()).unwrap();
        }
    }
}

// destroy
impl GfxCommandPool {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_command_pool(self.handle, None);
        }
        self.handle = vk::CommandPool::null();
    }
}
impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
