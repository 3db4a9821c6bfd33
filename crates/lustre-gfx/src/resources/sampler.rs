use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxSampler {
    handle: vk::Sampler,
}

impl DebugType for GfxSampler {
    fn debug_type_name() -> &'static str {
        "GfxSampler"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxSampler {
    pub fn new(gfx: &Gfx, sampler_ci: &vk::SamplerCreateInfo, name: &str) -> Self {
        let handle = unsafe { gfx.gfx_device().create_sampler(sampler_ci, None).unwrap() };
        let sampler = Self { handle };
        gfx.gfx_device().set_debug_name(&sampler, name);
        sampler
    }

    /// 模型贴图：linear + repeat + 各向异性 + 全 mip 范围
    pub fn new_linear_repeat(gfx: &Gfx, max_anisotropy: f32, name: &str) -> Self {
        let ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy)
            .max_lod(vk::LOD_CLAMP_NONE);
        Self::new(gfx, &ci, name)
    }

    /// skybox/LUT/attachment 采样：linear + clamp to edge
    pub fn new_linear_clamp(gfx: &Gfx, name: &str) -> Self {
        let ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .max_lod(vk::LOD_CLAMP_NONE);
        Self::new(gfx, &ci, name)
    }

    /// shadow map 比较采样；reversed-Z 下用 GREATER
    pub fn new_shadow_compare(gfx: &Gfx, name: &str) -> Self {
        let ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .compare_enable(true)
            .compare_op(vk::CompareOp::GREATER);
        Self::new(gfx, &ci, name)
    }
}

// getters
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

// destroy
impl GfxSampler {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_sampler(self.handle, None);
        }
        self.handle = vk::Sampler::null();
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
