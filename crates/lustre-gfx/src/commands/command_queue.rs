use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx::Gfx,
};

/// command queue 封装
///
/// queue 与其所属的 queue family index 绑定在一起
pub struct GfxCommandQueue {
    queue: vk::Queue,
    family_index: u32,
}

impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.queue
    }
}

// new & init
impl GfxCommandQueue {
    pub fn new(gfx_device: &GfxDevice, family_index: u32, name: &str) -> Self {
        let queue = unsafe { gfx_device.get_device_queue(family_index, 0) };
        let queue = Self { queue, family_index };
        gfx_device.set_debug_name(&queue, name);
        queue
    }
}

// getters
impl GfxCommandQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn family_index(&self) -> u32 {
        self.family_index
    }
}

// tools
impl GfxCommandQueue {
    pub fn submit(&self, gfx: &Gfx, infos: Vec<GfxSubmitInfo>, fence: Option<&GfxFence>) {
        let submit_infos = infos.iter().map(|info| info.submit_info()).collect_vec();
        unsafe {
            gfx.gfx_device()
                .queue_submit2(self.queue, &submit_infos, fence.map_or(vk::Fence::null(), |f| f.handle()))
                .unwrap();
        }
    }

    /// 阻塞等待 queue 上全部提交执行完成
    #[inline]
    pub fn wait_idle(&self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().queue_wait_idle(self.queue).unwrap();
        }
    }
}
