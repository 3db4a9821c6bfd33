//! 帧内的各个 render pass
//!
//! 每个 pass 实现 `RgPass`：setup 声明读写，execute 录制命令。
//! pass 只借用外部资源（pipeline、model、离屏目标），自身不持有
//! 任何 GPU 对象。

mod composite;
mod depth_prepass;
mod oit;
mod opaque;
mod shadow;
mod skybox;

pub use composite::CompositePass;
pub use depth_prepass::DepthPrepass;
pub use oit::{OitBlendPass, OitClearPass};
pub use opaque::{FrameInputBindings, OpaquePass};
pub use shadow::ShadowPass;
pub use skybox::SkyboxPass;

use ash::vk;

/// indirect command 的 stride，opaque / blend 两段共用
pub(crate) const INDIRECT_STRIDE: u32 = size_of::<vk::DrawIndexedIndirectCommand>() as u32;

/// 覆盖整个 extent 的 viewport，深度范围 [0, 1]
pub(crate) fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub(crate) fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // orchestrator 通过 crate::passes::FrameInputBindings 组装 opaque pass
    // 的帧级输入，这里固定该公开路径
    #[test]
    fn frame_inputs_visible_at_module_root() {
        let inputs = crate::passes::FrameInputBindings {
            shadow_sampler: vk::Sampler::null(),
            irradiance_view: vk::ImageView::null(),
            radiance_view: vk::ImageView::null(),
            env_sampler: vk::Sampler::null(),
            brdf_lut_view: vk::ImageView::null(),
            brdf_lut_sampler: vk::Sampler::null(),
        };
        assert_eq!(inputs.shadow_sampler, vk::Sampler::null());
    }

    #[test]
    fn viewport_covers_extent() {
        let viewport = full_viewport(vk::Extent2D { width: 1280, height: 720 });
        assert_eq!(viewport.width, 1280.0);
        assert_eq!(viewport.height, 720.0);
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
    }
}
