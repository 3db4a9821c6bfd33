use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// binary semaphore 封装
#[derive(Clone)]
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(gfx: &Gfx, debug_name: &str) -> Self {
        let gfx_device = gfx.gfx_device();
        let semaphore = unsafe { gfx_device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None).unwrap() };

        let semaphore = Self { semaphore };
        gfx_device.set_debug_name(&semaphore, debug_name);
        semaphore
    }

    #[inline]
    pub fn destroy(self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}
