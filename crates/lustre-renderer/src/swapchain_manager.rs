//! swapchain 与跟随窗口尺寸的离屏资源
//!
//! HDR color、depth、OIT 链表三类资源与 swapchain extent 绑定，
//! 窗口尺寸变化时一起重建。

use ash::vk;
use lustre_gfx::{
    gfx::Gfx,
    resources::{
        buffer::GfxBuffer,
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
    swapchain::{surface::GfxSurface, swapchain::GfxSwapchain},
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::settings::RendererSettings;

/// OIT 节点在 buffer 里的 stride：12 byte payload + 4 byte next 索引
const OIT_NODE_STRIDE: u64 = 16;

/// 与 swapchain extent 绑定的离屏资源
pub struct OffscreenTargets {
    pub hdr_image: GfxImage,
    pub hdr_view: GfxImageView,

    pub depth_image: GfxImage,
    pub depth_view: GfxImageView,

    /// 每像素链表头，R32_UINT
    pub oit_head_image: GfxImage,
    pub oit_head_view: GfxImageView,
    pub oit_node_buffer: GfxBuffer,
    pub oit_counter_buffer: GfxBuffer,
    pub oit_node_capacity: u32,
}

// new & init
impl OffscreenTargets {
    fn new(gfx: &Gfx, extent: vk::Extent2D) -> Self {
        let hdr_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_2d(
                extent,
                RendererSettings::COLOR_FORMAT,
                1,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            "hdr-color",
        );
        let hdr_view = GfxImageView::new(
            gfx,
            hdr_image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::COLOR_FORMAT, vk::ImageAspectFlags::COLOR),
            "hdr-color",
        );

        let depth_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_2d(
                extent,
                RendererSettings::DEPTH_FORMAT,
                1,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ),
            "main-depth",
        );
        let depth_view = GfxImageView::new(
            gfx,
            depth_image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::DEPTH_FORMAT, vk::ImageAspectFlags::DEPTH),
            "main-depth",
        );

        let oit_head_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_2d(
                extent,
                RendererSettings::OIT_HEAD_FORMAT,
                1,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_DST,
            ),
            "oit-head",
        );
        let oit_head_view = GfxImageView::new(
            gfx,
            oit_head_image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::OIT_HEAD_FORMAT, vk::ImageAspectFlags::COLOR),
            "oit-head",
        );

        let oit_node_capacity = extent.width * extent.height * RendererSettings::OIT_NODES_PER_PIXEL;
        let oit_node_buffer = GfxBuffer::new(
            gfx,
            oit_node_capacity as u64 * OIT_NODE_STRIDE,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            false,
            "oit-nodes",
        );
        let oit_counter_buffer = GfxBuffer::new(
            gfx,
            size_of::<u32>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            false,
            "oit-counter",
        );

        Self {
            hdr_image,
            hdr_view,
            depth_image,
            depth_view,
            oit_head_image,
            oit_head_view,
            oit_node_buffer,
            oit_counter_buffer,
            oit_node_capacity,
        }
    }

    fn destroy(self, gfx: &Gfx) {
        self.oit_counter_buffer.destroy(gfx);
        self.oit_node_buffer.destroy(gfx);
        self.oit_head_view.destroy(gfx);
        self.oit_head_image.destroy(gfx);
        self.depth_view.destroy(gfx);
        self.depth_image.destroy(gfx);
        self.hdr_view.destroy(gfx);
        self.hdr_image.destroy(gfx);
    }
}

pub struct SwapchainManager {
    surface: GfxSurface,
    swapchain: Option<GfxSwapchain>,
    targets: Option<OffscreenTargets>,
}

// new & init
impl SwapchainManager {
    pub fn new(
        gfx: &Gfx,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        window_size: (u32, u32),
    ) -> Self {
        let surface = GfxSurface::new(gfx, display_handle, window_handle);
        assert!(
            surface.supports_present(gfx, gfx.graphics_queue().family_index()),
            "graphics queue family does not support present"
        );

        let swapchain = GfxSwapchain::new(gfx, &surface, window_size.0, window_size.1, None);
        let targets = OffscreenTargets::new(gfx, swapchain.extent());

        Self {
            surface,
            swapchain: Some(swapchain),
            targets: Some(targets),
        }
    }
}

// getters
impl SwapchainManager {
    #[inline]
    pub fn swapchain(&self) -> &GfxSwapchain {
        self.swapchain.as_ref().unwrap()
    }
    #[inline]
    pub fn swapchain_mut(&mut self) -> &mut GfxSwapchain {
        self.swapchain.as_mut().unwrap()
    }
    #[inline]
    pub fn targets(&self) -> &OffscreenTargets {
        self.targets.as_ref().unwrap()
    }
    #[inline]
    pub fn targets_mut(&mut self) -> &mut OffscreenTargets {
        self.targets.as_mut().unwrap()
    }
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain().extent()
    }
}

// tools
impl SwapchainManager {
    /// 重建 swapchain 与离屏资源
    ///
    /// `window_size` 每次调用返回当前窗口尺寸；窗口最小化时返回 0，
    /// 这里轮询直到拿到非零尺寸
    pub fn recreate(&mut self, gfx: &Gfx, mut window_size: impl FnMut() -> (u32, u32)) {
        let _span = tracy_client::span!("SwapchainManager::recreate");

        let mut size = window_size();
        while size.0 == 0 || size.1 == 0 {
            std::thread::sleep(std::time::Duration::from_millis(50));
            size = window_size();
        }

        gfx.gfx_device().wait_idle();

        if let Some(targets) = self.targets.take() {
            targets.destroy(gfx);
        }

        // 旧 swapchain 交给新 swapchain 复用
        let old_swapchain = self.swapchain.take();
        let swapchain = GfxSwapchain::new(gfx, &self.surface, size.0, size.1, old_swapchain);

        self.targets = Some(OffscreenTargets::new(gfx, swapchain.extent()));
        self.swapchain = Some(swapchain);
    }
}

// destroy
impl SwapchainManager {
    /// 调用前需要 device wait idle
    pub fn destroy(mut self, gfx: &Gfx) {
        if let Some(targets) = self.targets.take() {
            targets.destroy(gfx);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(gfx);
        }
        self.surface.destroy();
    }
}
