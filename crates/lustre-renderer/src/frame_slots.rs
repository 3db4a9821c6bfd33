//! 每帧（FIF）的命令与同步对象
//!
//! 每个 frame label 一套：command pool/buffer、acquire/present
//! semaphore、in-flight fence。fence 等待是帧循环唯一的背压来源，
//! 也是 pool reset 安全的前提。

use ash::vk;
use itertools::Itertools;
use lustre_gfx::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, fence::GfxFence, semaphore::GfxSemaphore,
    },
    gfx::Gfx,
};

use crate::settings::{FrameCounter, FrameLabel};

pub struct FrameSlot {
    command_pool: GfxCommandPool,
    command_buffer: GfxCommandBuffer,

    acquire_semaphore: GfxSemaphore,
    present_semaphore: GfxSemaphore,
    /// 创建时 signaled，首帧不等待
    in_flight_fence: GfxFence,
}

// new & init
impl FrameSlot {
    fn new(gfx: &Gfx, label: FrameLabel) -> Self {
        let command_pool = GfxCommandPool::new(
            gfx,
            gfx.graphics_queue().family_index(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            &format!("frame-{label}"),
        );
        let command_buffer = command_pool.alloc_command_buffer(gfx, &format!("frame-{label}"));

        Self {
            command_pool,
            command_buffer,
            acquire_semaphore: GfxSemaphore::new(gfx, &format!("frame-{label}-acquire")),
            present_semaphore: GfxSemaphore::new(gfx, &format!("frame-{label}-present")),
            in_flight_fence: GfxFence::new(gfx, true, &format!("frame-{label}-in-flight")),
        }
    }
}

// getters
impl FrameSlot {
    #[inline]
    pub fn command_buffer(&self) -> &GfxCommandBuffer {
        &self.command_buffer
    }
    #[inline]
    pub fn acquire_semaphore(&self) -> &GfxSemaphore {
        &self.acquire_semaphore
    }
    #[inline]
    pub fn present_semaphore(&self) -> &GfxSemaphore {
        &self.present_semaphore
    }
    #[inline]
    pub fn in_flight_fence(&self) -> &GfxFence {
        &self.in_flight_fence
    }
}

// tools
impl FrameSlot {
    /// 等待本 slot 上一次提交完成
    pub fn wait_frame_done(&self, gfx: &Gfx) {
        let _span = tracy_client::span!("FrameSlot::wait_frame_done");
        self.in_flight_fence.wait(gfx);
    }

    /// fence reset + pool reset；必须在 `wait_frame_done` 之后调用
    pub fn reset(&self, gfx: &Gfx) {
        self.in_flight_fence.reset(gfx);
        self.command_pool.reset(gfx);
    }
}

// destroy
impl FrameSlot {
    fn destroy(self, gfx: &Gfx) {
        self.in_flight_fence.destroy(gfx);
        self.present_semaphore.destroy(gfx);
        self.acquire_semaphore.destroy(gfx);
        self.command_pool.destroy(gfx);
    }
}

pub struct FrameSlots {
    slots: Vec<FrameSlot>,
}

impl FrameSlots {
    pub fn new(gfx: &Gfx) -> Self {
        let slots = FrameCounter::frame_labels().into_iter().map(|label| FrameSlot::new(gfx, label)).collect_vec();
        Self { slots }
    }

    #[inline]
    pub fn slot(&self, label: FrameLabel) -> &FrameSlot {
        &self.slots[*label]
    }

    /// 调用前需要 device wait idle
    pub fn destroy(mut self, gfx: &Gfx) {
        for slot in self.slots.drain(..) {
            slot.destroy(gfx);
        }
    }
}
