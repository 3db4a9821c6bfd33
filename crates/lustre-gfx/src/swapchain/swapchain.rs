use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    gfx::Gfx,
    resources::{image::GfxImage, image_view::{GfxImageView, GfxImageViewDesc}},
    swapchain::surface::GfxSurface,
};

/// swapchain 至少三张 image，配合 compute 直写需要 STORAGE usage
const MIN_IMAGE_COUNT: u32 = 3;

/// 从 surface capabilities 解析 swapchain extent
///
/// current_extent 为 0xFFFFFFFF 时表示由应用决定，取窗口尺寸并 clamp 到
/// min/max image extent
pub fn calculate_swapchain_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_width: u32,
    window_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: window_height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// 选择 surface format
///
/// swapchain image 需要 STORAGE usage（composite pass 直写），
/// 优先 UNORM 格式，sRGB 转换在 shader 里完成
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

pub struct GfxSwapchain {
    handle: vk::SwapchainKHR,

    /// swapchain image 来自驱动，只做包装不做分配
    images: Vec<GfxImage>,
    image_views: Vec<GfxImageView>,
    current_image_index: usize,

    color_format: vk::Format,
    extent: vk::Extent2D,
}

// new & init
impl GfxSwapchain {
    /// `old_swapchain` 传入上一代 swapchain 可以复用资源；
    /// 调用后旧的 handle 归本函数处置，调用者不得再使用
    pub fn new(
        gfx: &Gfx,
        surface: &GfxSurface,
        window_width: u32,
        window_height: u32,
        old_swapchain: Option<GfxSwapchain>,
    ) -> Self {
        let capabilities = surface.capabilities(gfx);
        let surface_format = choose_surface_format(&surface.formats(gfx));
        let extent = calculate_swapchain_extent(&capabilities, window_width, window_height);

        let mut image_count = u32::max(MIN_IMAGE_COUNT, capabilities.min_image_count);
        // max_image_count == 0 表示不限制数量
        if capabilities.max_image_count != 0 {
            image_count = u32::min(image_count, capabilities.max_image_count);
        }

        let old_handle = old_swapchain.as_ref().map_or(vk::SwapchainKHR::null(), |s| s.handle);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_handle);

        let gfx_device = gfx.gfx_device();
        let handle = unsafe { gfx_device.swapchain.create_swapchain(&create_info, None).unwrap() };
        gfx_device.set_object_debug_name(handle, "main");

        if let Some(old) = old_swapchain {
            old.destroy(gfx);
        }

        let vk_images = unsafe { gfx_device.swapchain.get_swapchain_images(handle).unwrap() };
        let images = vk_images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                GfxImage::from_external(
                    gfx,
                    *img,
                    vk::Extent2D { width: extent.width, height: extent.height },
                    surface_format.format,
                    &format!("swapchain-{idx}"),
                )
            })
            .collect_vec();
        let image_views = vk_images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                GfxImageView::new(
                    gfx,
                    *img,
                    GfxImageViewDesc::new_2d(surface_format.format, vk::ImageAspectFlags::COLOR),
                    format!("swapchain-{idx}"),
                )
            })
            .collect_vec();

        log::info!(
            "swapchain created: {}x{}, {} images, format {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format
        );

        Self {
            handle,
            images,
            image_views,
            current_image_index: 0,
            color_format: surface_format.format,
            extent,
        }
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.current_image_index
    }
    #[inline]
    pub fn current_image(&self) -> &GfxImage {
        &self.images[self.current_image_index]
    }
    #[inline]
    pub fn current_image_mut(&mut self) -> &mut GfxImage {
        &mut self.images[self.current_image_index]
    }
    #[inline]
    pub fn current_image_view(&self) -> &GfxImageView {
        &self.image_views[self.current_image_index]
    }
}

// tools
impl GfxSwapchain {
    /// 获取下一张 image
    ///
    /// OUT_OF_DATE 时没有 image 被获取（semaphore 不会 signal），
    /// 返回 None；SUBOPTIMAL 时 image 已获取，返回 Some(true)，
    /// 调用者应在本帧 present 之后重建；其余错误直接 panic
    pub fn acquire_next_image(&mut self, gfx: &Gfx, semaphore: &GfxSemaphore) -> Option<bool> {
        let result = unsafe {
            gfx.gfx_device().swapchain.acquire_next_image(
                self.handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => {
                self.current_image_index = image_index as usize;
                // acquire 到新 image 后，其内容不再有效
                self.images[self.current_image_index].assume_state(crate::resources::state::GfxImageState::UNDEFINED);
                Some(suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => None,
            Err(e) => panic!("failed to acquire swapchain image: {e:?}"),
        }
    }

    /// 提交 present；返回 true 表示 swapchain 需要重建
    pub fn present_image(&self, gfx: &Gfx, queue: &GfxCommandQueue, wait_semaphore: &GfxSemaphore) -> bool {
        let wait_semaphores = [wait_semaphore.handle()];
        let image_indices = [self.current_image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        let result = unsafe { gfx.gfx_device().swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => panic!("failed to present swapchain image: {e:?}"),
        }
    }
}

// destroy
impl GfxSwapchain {
    pub fn destroy(mut self, gfx: &Gfx) {
        for view in self.image_views.drain(..) {
            view.destroy(gfx);
        }
        // 外部 image 随 swapchain 销毁，包装对象只需要解除持有
        for mut image in self.images.drain(..) {
            image.release_external();
        }
        unsafe {
            gfx.gfx_device().swapchain.destroy_swapchain(self.handle, None);
        }
        self.handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: u32, min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current, height: current },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    #[test]
    fn extent_follows_surface_when_fixed() {
        let c = caps(1280, (1, 1), (4096, 4096));
        let extent = calculate_swapchain_extent(&c, 800, 600);
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 1280);
    }

    #[test]
    fn extent_from_window_when_sentinel() {
        let c = caps(u32::MAX, (1, 1), (4096, 4096));
        let extent = calculate_swapchain_extent(&c, 800, 600);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn extent_clamped_to_surface_limits() {
        let c = caps(u32::MAX, (200, 200), (1024, 768));
        let too_big = calculate_swapchain_extent(&c, 5000, 5000);
        assert_eq!(too_big.width, 1024);
        assert_eq!(too_big.height, 768);

        let too_small = calculate_swapchain_extent(&c, 10, 10);
        assert_eq!(too_small.width, 200);
        assert_eq!(too_small.height, 200);
    }

    #[test]
    fn surface_format_prefers_bgra_unorm() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::B8G8R8A8_UNORM);

        let only_srgb = [formats[0]];
        assert_eq!(choose_surface_format(&only_srgb).format, vk::Format::B8G8R8A8_SRGB);
    }
}
