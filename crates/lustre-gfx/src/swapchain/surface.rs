use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxSurface {
    pub fn new(gfx: &Gfx, display_handle: RawDisplayHandle, window_handle: RawWindowHandle) -> Self {
        let pf = ash::khr::surface::Instance::new(gfx.vk_entry(), &gfx.instance().ash_instance);

        let handle = unsafe {
            ash_window::create_surface(
                gfx.vk_entry(),
                &gfx.instance().ash_instance,
                display_handle,
                window_handle,
                None,
            )
            .unwrap()
        };

        let surface = Self { handle, pf };
        gfx.gfx_device().set_debug_name(&surface, "main");
        surface
    }
}

// getters
impl GfxSurface {
    /// capabilities 随窗口尺寸变化，每次重建 swapchain 前重新查询
    pub fn capabilities(&self, gfx: &Gfx) -> vk::SurfaceCapabilitiesKHR {
        unsafe {
            self.pf
                .get_physical_device_surface_capabilities(gfx.physical_device().vk_handle, self.handle)
                .unwrap()
        }
    }

    pub fn formats(&self, gfx: &Gfx) -> Vec<vk::SurfaceFormatKHR> {
        unsafe {
            self.pf.get_physical_device_surface_formats(gfx.physical_device().vk_handle, self.handle).unwrap()
        }
    }

    /// present 支持校验；graphics queue 必须支持 present
    pub fn supports_present(&self, gfx: &Gfx, queue_family_index: u32) -> bool {
        unsafe {
            self.pf
                .get_physical_device_surface_support(
                    gfx.physical_device().vk_handle,
                    queue_family_index,
                    self.handle,
                )
                .unwrap()
        }
    }
}

// destroy
impl GfxSurface {
    pub fn destroy(mut self) {
        unsafe {
            self.pf.destroy_surface(self.handle, None);
        }
        self.handle = vk::SurfaceKHR::null();
    }
}
impl Drop for GfxSurface {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
