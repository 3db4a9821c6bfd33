//! Barrier 自动计算
//!
//! 由资源的状态转换生成 sync2 的 image/buffer barrier 描述。

use ash::vk;
use lustre_gfx::{
    commands::barrier::{GfxBufferBarrier, GfxImageBarrier},
    resources::state::{GfxBufferState, GfxImageState},
};

use crate::handle::{RgBufferHandle, RgImageHandle};

#[derive(Clone, Debug)]
pub struct ImageBarrierDesc {
    pub handle: RgImageHandle,
    pub src_state: GfxImageState,
    pub dst_state: GfxImageState,
    pub aspect: vk::ImageAspectFlags,
}

impl ImageBarrierDesc {
    pub fn new(handle: RgImageHandle, src_state: GfxImageState, dst_state: GfxImageState) -> Self {
        Self {
            handle,
            src_state,
            dst_state,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    pub fn with_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    /// layout 改变必须 barrier；涉及写入需要 barrier 保证可见性；
    /// 同 layout 的只读到只读可以省略
    pub fn needs_barrier(&self) -> bool {
        if self.src_state.layout != self.dst_state.layout {
            return true;
        }
        self.src_state.is_write() || self.dst_state.is_write()
    }

    pub fn to_gfx_barrier(&self, image: vk::Image) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .image(image)
            .layout_transfer(self.src_state.layout, self.dst_state.layout)
            .src_mask(self.src_state.stage, self.src_state.src_access())
            .dst_mask(self.dst_state.stage, self.dst_state.access)
            .image_aspect_flag(self.aspect)
    }
}

#[derive(Clone, Debug)]
pub struct BufferBarrierDesc {
    pub handle: RgBufferHandle,
    pub src_state: GfxBufferState,
    pub dst_state: GfxBufferState,
}

impl BufferBarrierDesc {
    pub fn new(handle: RgBufferHandle, src_state: GfxBufferState, dst_state: GfxBufferState) -> Self {
        Self { handle, src_state, dst_state }
    }

    pub fn needs_barrier(&self) -> bool {
        self.src_state.is_write() || self.dst_state.is_write()
    }

    pub fn to_gfx_barrier(&self, buffer: vk::Buffer) -> GfxBufferBarrier {
        GfxBufferBarrier::new()
            .buffer(buffer, 0, vk::WHOLE_SIZE)
            .src_mask(self.src_state.stage, self.src_state.access)
            .dst_mask(self.dst_state.stage, self.dst_state.access)
    }
}

/// 单个 pass 执行前需要的 barrier 集合
#[derive(Clone, Debug, Default)]
pub struct PassBarriers {
    pub image_barriers: Vec<ImageBarrierDesc>,
    pub buffer_barriers: Vec<BufferBarrierDesc>,
}

impl PassBarriers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image_barrier(&mut self, barrier: ImageBarrierDesc) {
        if barrier.needs_barrier() {
            self.image_barriers.push(barrier);
        }
    }

    pub fn add_buffer_barrier(&mut self, barrier: BufferBarrierDesc) {
        if barrier.needs_barrier() {
            self.buffer_barriers.push(barrier);
        }
    }

    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty() || !self.buffer_barriers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn image_handle() -> RgImageHandle {
        let mut map: SlotMap<RgImageHandle, ()> = SlotMap::with_key();
        map.insert(())
    }

    fn buffer_handle() -> RgBufferHandle {
        let mut map: SlotMap<RgBufferHandle, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn layout_change_needs_barrier() {
        let desc =
            ImageBarrierDesc::new(image_handle(), GfxImageState::UNDEFINED, GfxImageState::COLOR_ATTACHMENT_WRITE);
        assert!(desc.needs_barrier());
    }

    #[test]
    fn read_to_read_same_layout_elided() {
        // 两个只读状态的 layout 都是 SHADER_READ_ONLY_OPTIMAL
        let desc = ImageBarrierDesc::new(
            image_handle(),
            GfxImageState::SHADER_READ_FRAGMENT,
            GfxImageState::SHADER_READ_COMPUTE,
        );
        assert!(!desc.needs_barrier());
    }

    #[test]
    fn write_to_read_needs_barrier() {
        let desc = ImageBarrierDesc::new(
            image_handle(),
            GfxImageState::STORAGE_WRITE_COMPUTE,
            GfxImageState::SHADER_READ_FRAGMENT,
        );
        assert!(desc.needs_barrier());
    }

    #[test]
    fn src_access_strips_read_bits() {
        let desc = ImageBarrierDesc::new(
            image_handle(),
            GfxImageState::COLOR_ATTACHMENT_READ_WRITE,
            GfxImageState::SHADER_READ_FRAGMENT,
        );
        let barrier = desc.to_gfx_barrier(vk::Image::null()).barrier();
        assert_eq!(barrier.src_access_mask, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn buffer_read_to_read_elided() {
        let desc = BufferBarrierDesc::new(
            buffer_handle(),
            GfxBufferState::STORAGE_READ_COMPUTE,
            GfxBufferState::STORAGE_READ_FRAGMENT,
        );
        assert!(!desc.needs_barrier());
    }

    #[test]
    fn buffer_write_to_read_needs_barrier() {
        let desc = BufferBarrierDesc::new(
            buffer_handle(),
            GfxBufferState::STORAGE_READ_WRITE_COMPUTE,
            GfxBufferState::INDIRECT_BUFFER,
        );
        assert!(desc.needs_barrier());
    }
}
