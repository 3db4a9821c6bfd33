use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};
use ash::vk;
use ash::vk::Handle;

pub struct GfxImageView {
    handle: vk::ImageView,

    desc: GfxImageViewDesc,

    name: String,
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImageView {
    pub fn new(gfx: &Gfx, image: vk::Image, view_desc: GfxImageViewDesc, name: impl AsRef<str>) -> Self {
        let gfx_device = gfx.gfx_device();

        let mut usage_info = vk::ImageViewUsageCreateInfo::default();
        let mut info = vk::ImageViewCreateInfo {
            image,
            view_type: view_desc.view_type,
            format: view_desc.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: view_desc.aspect_mask,
                base_mip_level: view_desc.mip.0 as u32,
                level_count: view_desc.mip.1 as u32,
                base_array_layer: view_desc.layer.0 as u32,
                layer_count: view_desc.layer.1 as u32,
            },
            ..Default::default()
        };
        // 不覆盖时 view 继承 image 的全部 usage；
        // 重解释 format 的 view 需要排除新 format 不支持的 usage
        if let Some(usage) = view_desc.usage {
            usage_info = usage_info.usage(usage);
            info = info.push_next(&mut usage_info);
        }

        let handle = unsafe { gfx_device.create_image_view(&info, None).expect("Failed to create GfxImageView") };
        let image_view = Self {
            handle,

            desc: view_desc,

            name: name.as_ref().to_string(),
        };
        gfx_device.set_debug_name(&image_view, &name);
        image_view
    }
}
// destroy
impl GfxImageView {
    pub fn destroy(mut self, gfx: &Gfx) {
        self.destroy_mut(gfx);
    }
    pub fn destroy_mut(&mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_image_view(self.handle, None);
        }
        self.handle = vk::ImageView::null();
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null());
    }
}
// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
impl std::fmt::Display for GfxImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageView({}, {:?})", self.name, self.handle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// format 可以基于 vk::Image 重解释
    pub(crate) format: vk::Format,
    /// view type 可以基于 vk::Image 重解释
    pub(crate) view_type: vk::ImageViewType,
    /// aspect 可以基于 vk::Image 重解释
    pub(crate) aspect_mask: vk::ImageAspectFlags,
    /// base mip level 和 mip level count
    pub(crate) mip: (u8, u8),
    /// base layer 和 layer count
    pub(crate) layer: (u8, u8),
    /// None 表示继承 image 的 usage
    pub(crate) usage: Option<vk::ImageUsageFlags>,
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (0, 1),
            layer: (0, 1),
            usage: None,
        }
    }

    /// 覆盖整个 mip chain 的 2D view
    pub fn new_2d_all_mips(format: vk::Format, aspect: vk::ImageAspectFlags, mip_levels: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (0, mip_levels),
            layer: (0, 1),
            usage: None,
        }
    }

    /// 单个 mip level 的 view，mip 生成的 storage binding 使用
    pub fn new_2d_mip(format: vk::Format, aspect: vk::ImageAspectFlags, mip_level: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (mip_level, 1),
            layer: (0, 1),
            usage: None,
        }
    }

    /// cube view，覆盖 6 个 layer
    pub fn new_cube(format: vk::Format, mip_levels: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::CUBE,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip: (0, mip_levels),
            layer: (0, 6),
            usage: None,
        }
    }

    /// cube image 单个 mip 的 2D array view，compute 写入时使用
    pub fn new_cube_storage_mip(format: vk::Format, mip_level: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D_ARRAY,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip: (mip_level, 1),
            layer: (0, 6),
            usage: None,
        }
    }

    /// 创建完整的视图描述
    pub fn new(
        format: vk::Format,
        view_type: vk::ImageViewType,
        aspect_mask: vk::ImageAspectFlags,
        mip_range: (u8, u8),
        layer_range: (u8, u8),
    ) -> Self {
        Self { format, view_type, aspect_mask, mip: mip_range, layer: layer_range, usage: None }
    }

    /// 限定 view 的 usage，不再继承 image 的全部 usage
    ///
    /// 重解释 format 的 view 必须排除新 format 不支持的 usage，
    /// 比如 sRGB / E5B9G9R9 的采样 view 要去掉 STORAGE
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = Some(usage);
        self
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn view_type(&self) -> vk::ImageViewType {
        self.view_type
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    #[inline]
    pub fn mip_range(&self) -> (u8, u8) {
        self.mip
    }

    #[inline]
    pub fn layer_range(&self) -> (u8, u8) {
        self.layer
    }

    #[inline]
    pub fn usage(&self) -> Option<vk::ImageUsageFlags> {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_usage_defaults_to_inherit() {
        assert_eq!(GfxImageViewDesc::new_2d(vk::Format::R8G8B8A8_UNORM, vk::ImageAspectFlags::COLOR).usage(), None);
        assert_eq!(GfxImageViewDesc::new_cube(vk::Format::R32_UINT, 1).usage(), None);
    }

    #[test]
    fn reinterpreting_sampled_view_restricts_usage() {
        // E5B9G9R9 不支持 STORAGE，采样 view 必须把 usage 限定为 SAMPLED
        let desc = GfxImageViewDesc::new_cube(vk::Format::E5B9G9R9_UFLOAT_PACK32, 1)
            .with_usage(vk::ImageUsageFlags::SAMPLED);
        assert_eq!(desc.usage(), Some(vk::ImageUsageFlags::SAMPLED));

        let srgb = GfxImageViewDesc::new_2d_all_mips(vk::Format::R8G8B8A8_SRGB, vk::ImageAspectFlags::COLOR, 4)
            .with_usage(vk::ImageUsageFlags::SAMPLED);
        assert_eq!(srgb.usage(), Some(vk::ImageUsageFlags::SAMPLED));
    }
}
