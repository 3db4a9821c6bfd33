use std::ffi::{CStr, CString};

use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::GfxDebugMsger;

/// Vulkan instance 封装
///
/// 负责 instance 的创建，包括 validation layer 和 surface 相关扩展。
pub struct GfxInstance {
    pub ash_instance: ash::Instance,
}

// new & init
impl GfxInstance {
    pub fn new(vk_pf: &ash::Entry, app_name: &str, raw_display_handle: raw_window_handle::RawDisplayHandle) -> Self {
        let _span = tracy_client::span!("GfxInstance::new");

        let app_name = CString::new(app_name).unwrap();
        let engine_name = CString::new("lustre").unwrap();
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name.as_c_str())
            .engine_name(engine_name.as_c_str())
            .api_version(vk::API_VERSION_1_3);

        // surface 相关扩展由 window handle 决定
        let mut exts = ash_window::enumerate_required_extensions(raw_display_handle).unwrap().to_vec();
        exts.push(ash::ext::debug_utils::NAME.as_ptr());

        let mut exts_str = String::new();
        for ext in &exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance exts: {}", exts_str);

        let layers = Self::basic_layers().iter().map(|l| l.as_ptr()).collect_vec();

        // instance 创建期间的消息也交给 debug messenger
        let mut debug_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&exts)
            .enabled_layer_names(&layers)
            .push_next(&mut debug_messenger_ci);

        let instance = unsafe { vk_pf.create_instance(&instance_ci, None).unwrap() };

        Self { ash_instance: instance }
    }

    fn basic_layers() -> Vec<&'static CStr> {
        vec![c"VK_LAYER_KHRONOS_validation"]
    }
}

// destroy
impl GfxInstance {
    pub fn destroy(&self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}
