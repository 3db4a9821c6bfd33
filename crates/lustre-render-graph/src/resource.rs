//! 资源注册表
//!
//! graph 只接受导入的外部资源：renderer 负责创建和销毁所有
//! image/buffer，这里只登记 raw handle、格式和进入 graph 时的状态。

use ash::vk;
use lustre_gfx::resources::{
    image::infer_aspect,
    state::{GfxBufferState, GfxImageState},
};
use slotmap::SlotMap;

use crate::handle::{RgBufferHandle, RgImageHandle};

pub struct RgImageResource {
    pub name: String,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    /// 导入时的状态，由调用者保证与实际 layout 一致
    pub initial_state: GfxImageState,
}

impl RgImageResource {
    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_aspect(self.format)
    }
}

pub struct RgBufferResource {
    pub name: String,
    pub buffer: vk::Buffer,
    pub initial_state: GfxBufferState,
}

#[derive(Default)]
pub struct RgResourceRegistry {
    images: SlotMap<RgImageHandle, RgImageResource>,
    buffers: SlotMap<RgBufferHandle, RgBufferResource>,
}

impl RgResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_image(&mut self, resource: RgImageResource) -> RgImageHandle {
        self.images.insert(resource)
    }

    pub fn register_buffer(&mut self, resource: RgBufferResource) -> RgBufferHandle {
        self.buffers.insert(resource)
    }

    #[inline]
    pub fn image(&self, handle: RgImageHandle) -> &RgImageResource {
        &self.images[handle]
    }

    #[inline]
    pub fn buffer(&self, handle: RgBufferHandle) -> &RgBufferResource {
        &self.buffers[handle]
    }

    pub fn iter_images(&self) -> impl Iterator<Item = (RgImageHandle, &RgImageResource)> {
        self.images.iter()
    }

    pub fn iter_buffers(&self) -> impl Iterator<Item = (RgBufferHandle, &RgBufferResource)> {
        self.buffers.iter()
    }
}
