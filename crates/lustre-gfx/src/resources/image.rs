use ash::vk;
use ash::vk::Handle;
use vk_mem::{Alloc, Allocation};

use crate::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::state::GfxImageState,
};

/// mip 数量：floor(log2(max(w, h))) + 1
#[inline]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - u32::max(width, height).max(1).leading_zeros()
}

/// 根据 format 推断 barrier 和 view 使用的 aspect
pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }

        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }

        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Image 来源枚举
pub enum ImageSource {
    /// 由 VMA 分配的 Image
    Allocated(Allocation),
    /// 外部 Image（例如 Swapchain Image），不管理其内存生命周期
    External,
}

pub struct GfxImage {
    handle: vk::Image,
    source: ImageSource,

    extent: vk::Extent3D,
    /// 调用者请求的 format（sampled view 使用）
    format: vk::Format,
    /// vk image 实际创建时的 format（sRGB storage 时退化为 UNORM）
    vk_format: vk::Format,
    mip_levels: u32,
    layer_count: u32,

    /// 当前的 layout/stage/access 状态
    ///
    /// 只在两处更新：`transition()` 录制 barrier 时，
    /// 以及 render graph 执行后通过 `assume_state()` 回写
    state: GfxImageState,

    _usage: vk::ImageUsageFlags,

    name: String,
}

// getter
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// vk image 的实际 format，storage view 使用
    #[inline]
    pub fn vk_format(&self) -> vk::Format {
        self.vk_format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    #[inline]
    pub fn state(&self) -> GfxImageState {
        self.state
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_aspect(self.format)
    }

    #[inline]
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect(),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.layer_count,
        }
    }
}

// new & init
impl GfxImage {
    pub fn new(gfx: &Gfx, image_info: &GfxImageCreateInfo, debug_name: &str) -> Self {
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (image, alloc) = unsafe { gfx.allocator().create_image(&image_info.as_info(gfx), &alloc_ci).unwrap() };
        let image = Self {
            handle: image,
            source: ImageSource::Allocated(alloc),
            extent: image_info.inner.extent,
            format: image_info.requested_format,
            vk_format: image_info.inner.format,
            mip_levels: image_info.inner.mip_levels,
            layer_count: image_info.inner.array_layers,
            state: GfxImageState::UNDEFINED,
            _usage: image_info.inner.usage,

            name: debug_name.to_string(),
        };
        gfx.gfx_device().set_debug_name(&image, debug_name);
        image
    }

    /// 包装外部 image（swapchain image），不接管内存
    pub fn from_external(
        gfx: &Gfx,
        handle: vk::Image,
        extent: vk::Extent2D,
        format: vk::Format,
        debug_name: &str,
    ) -> Self {
        let image = Self {
            handle,
            source: ImageSource::External,
            extent: extent.into(),
            format,
            vk_format: format,
            mip_levels: 1,
            layer_count: 1,
            state: GfxImageState::UNDEFINED,
            _usage: vk::ImageUsageFlags::empty(),

            name: debug_name.to_string(),
        };
        gfx.gfx_device().set_debug_name(&image, debug_name);
        image
    }
}

impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// destroy
impl GfxImage {
    pub fn destroy(mut self, gfx: &Gfx) {
        self.destroy_mut(gfx);
    }
    /// 外部 image 的生命周期由创建方负责（swapchain），这里只解除包装
    pub fn release_external(&mut self) {
        debug_assert!(matches!(self.source, ImageSource::External));
        self.handle = vk::Image::null();
    }

    pub fn destroy_mut(&mut self, gfx: &Gfx) {
        log::debug!("Destroying GfxImage: {}", self.name);

        match &mut self.source {
            ImageSource::External => (),
            ImageSource::Allocated(allocation) => unsafe { gfx.allocator().destroy_image(self.handle, allocation) },
        }
        self.handle = vk::Image::null();
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null());
    }
}

// tools
impl GfxImage {
    /// 录制到目标状态的 barrier，并更新跟踪的状态
    ///
    /// 整个 image 所有 mip/layer 一起转换
    pub fn transition(&mut self, cmd: &GfxCommandBuffer, dst_state: GfxImageState) {
        let barrier = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(self.state.stage, self.state.src_access())
            .dst_mask(dst_state.stage, dst_state.access)
            .layout_transfer(self.state.layout, dst_state.layout)
            .image_aspect_flag(self.aspect());
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&barrier));

        self.state = dst_state;
    }

    /// 外部（render graph 或 swapchain 呈现路径）已经录制了 barrier，
    /// 把跟踪的状态同步过来
    #[inline]
    pub fn assume_state(&mut self, state: GfxImageState) {
        self.state = state;
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,

    requested_format: vk::Format,
    /// attachment 类用途时 EXCLUSIVE（只在 graphics queue 上使用），
    /// 否则在三个 queue family 间 CONCURRENT
    concurrent_sharing: bool,
}

impl GfxImageCreateInfo {
    /// attachment 类 usage（只会在 graphics queue 上使用）
    const ATTACHMENT_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
        vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
            | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT.as_raw()
            | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT.as_raw()
            | vk::ImageUsageFlags::INPUT_ATTACHMENT.as_raw(),
    );

    pub fn new_2d(extent: vk::Extent2D, format: vk::Format, mip_levels: u32, usage: vk::ImageUsageFlags) -> Self {
        let (vk_format, flags) = Self::resolve_format(format, usage);
        Self {
            inner: vk::ImageCreateInfo {
                flags,
                image_type: vk::ImageType::TYPE_2D,
                format: vk_format,
                extent: extent.into(),
                mip_levels,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // Vulkan 规定这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
            requested_format: format,
            concurrent_sharing: !usage.intersects(Self::ATTACHMENT_USAGE),
        }
    }

    /// cube image：6 layer，CUBE_COMPATIBLE；
    /// 需要以其他 format 采样（R32_UINT 存储、E5B9G9R9 采样），因此带上 MUTABLE_FORMAT
    pub fn new_cube(side: u32, format: vk::Format, mip_levels: u32, usage: vk::ImageUsageFlags) -> Self {
        let (vk_format, format_flags) = Self::resolve_format(format, usage);
        Self {
            inner: vk::ImageCreateInfo {
                flags: format_flags
                    | vk::ImageCreateFlags::CUBE_COMPATIBLE
                    | vk::ImageCreateFlags::MUTABLE_FORMAT,
                image_type: vk::ImageType::TYPE_2D,
                format: vk_format,
                extent: vk::Extent3D {
                    width: side,
                    height: side,
                    depth: 1,
                },
                mip_levels,
                array_layers: 6,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
            requested_format: format,
            concurrent_sharing: !usage.intersects(Self::ATTACHMENT_USAGE),
        }
    }

    /// sRGB format 不支持 storage image，用 UNORM 创建并带上 MUTABLE_FORMAT，
    /// 采样 view 再以 sRGB 重解释
    fn resolve_format(format: vk::Format, usage: vk::ImageUsageFlags) -> (vk::Format, vk::ImageCreateFlags) {
        if format == vk::Format::R8G8B8A8_SRGB && usage.contains(vk::ImageUsageFlags::STORAGE) {
            (vk::Format::R8G8B8A8_UNORM, vk::ImageCreateFlags::MUTABLE_FORMAT)
        } else {
            (format, vk::ImageCreateFlags::empty())
        }
    }

    pub fn as_info<'a>(&self, gfx: &'a Gfx) -> vk::ImageCreateInfo<'a> {
        if self.concurrent_sharing {
            let mut info = self.inner;
            info.sharing_mode = vk::SharingMode::CONCURRENT;
            info.queue_family_indices(gfx.concurrent_queue_family_indices())
        } else {
            self.inner
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_matches_log2() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(800, 600), 10);
    }

    #[test]
    fn srgb_storage_backed_by_unorm() {
        let info = GfxImageCreateInfo::new_2d(
            vk::Extent2D { width: 16, height: 16 },
            vk::Format::R8G8B8A8_SRGB,
            1,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        );
        assert_eq!(info.inner.format, vk::Format::R8G8B8A8_UNORM);
        assert!(info.inner.flags.contains(vk::ImageCreateFlags::MUTABLE_FORMAT));
        assert_eq!(info.requested_format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn srgb_without_storage_keeps_format() {
        let info = GfxImageCreateInfo::new_2d(
            vk::Extent2D { width: 16, height: 16 },
            vk::Format::R8G8B8A8_SRGB,
            1,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        );
        assert_eq!(info.inner.format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn attachment_usage_is_exclusive() {
        let attachment = GfxImageCreateInfo::new_2d(
            vk::Extent2D { width: 16, height: 16 },
            vk::Format::R16G16B16A16_SFLOAT,
            1,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE,
        );
        assert!(!attachment.concurrent_sharing);

        let sampled = GfxImageCreateInfo::new_2d(
            vk::Extent2D { width: 16, height: 16 },
            vk::Format::R8G8B8A8_UNORM,
            1,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        );
        assert!(sampled.concurrent_sharing);
    }

    #[test]
    fn depth_aspect_inference() {
        assert_eq!(infer_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            infer_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(infer_aspect(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    }
}
