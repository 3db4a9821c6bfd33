use std::path::Path;

use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// shader module 封装
///
/// 只接受编译好的 SPIR-V；shader 编译由外部工具链负责
pub struct GfxShaderModule {
    handle: vk::ShaderModule,
}

impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxShaderModule {
    pub fn load(gfx: &Gfx, path: &Path) -> Self {
        let mut file =
            std::fs::File::open(path).unwrap_or_else(|e| panic!("failed to open shader {}: {}", path.display(), e));
        let spv = ash::util::read_spv(&mut file)
            .unwrap_or_else(|e| panic!("failed to read spv {}: {}", path.display(), e));

        let handle = unsafe {
            gfx.gfx_device().create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&spv), None).unwrap()
        };

        let module = Self { handle };
        gfx.gfx_device().set_debug_name(&module, path.file_name().unwrap_or_default().to_string_lossy());
        module
    }
}

// getters
impl GfxShaderModule {
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

// destroy
impl GfxShaderModule {
    pub fn destroy(mut self, gfx: &Gfx) {
        unsafe {
            gfx.gfx_device().destroy_shader_module(self.handle, None);
        }
        self.handle = vk::ShaderModule::null();
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null());
    }
}
