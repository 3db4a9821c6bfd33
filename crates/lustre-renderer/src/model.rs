//! 模型与天空盒的数据模型
//!
//! `ModelData`/`SkyboxData` 是 CPU 侧输入（来自外部的资产解码），
//! `Model`/`Skybox` 是整体创建、整体销毁的 GPU 聚合。

use ash::vk;
use glam::{Mat4, Vec3};
use lustre_gfx::{
    gfx::Gfx,
    pipelines::descriptor::GfxDescriptorPool,
    resources::{buffer::GfxBuffer, image::GfxImage, image_view::GfxImageView, sampler::GfxSampler},
};

use crate::shader_data::{Material, Vertex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerKind {
    LinearRepeat,
    LinearClamp,
}

/// 解码后的贴图数据，RGBA8
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// base color / emissive 贴图是 sRGB，其余线性
    pub srgb: bool,
    pub sampler: SamplerKind,
}

/// 模型的 CPU 侧输入
///
/// indirect command 的 `first_instance` 携带材质索引
/// （shader 侧通过 gl_BaseInstance 读取），这里不做校验。
pub struct ModelData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub materials: Vec<Material>,

    pub opaque_draws: Vec<vk::DrawIndexedIndirectCommand>,
    pub blend_draws: Vec<vk::DrawIndexedIndirectCommand>,

    pub textures: Vec<TextureData>,

    pub transform: Mat4,
    pub aabb: (Vec3, Vec3),
}

/// blend 段在 indirect buffer 中的字节偏移：
/// opaque command 连续排在前面，blend 紧随其后
#[inline]
pub fn blend_draw_offset(opaque_count: usize) -> vk::DeviceSize {
    (opaque_count * size_of::<vk::DrawIndexedIndirectCommand>()) as vk::DeviceSize
}

pub struct ModelTexture {
    pub image: GfxImage,
    pub view: GfxImageView,
    pub sampler: GfxSampler,
}

/// GPU 侧的模型聚合，由 `Uploader::load_model` 整体创建
pub struct Model {
    pub textures: Vec<ModelTexture>,
    /// 绑定全部贴图的 bindless descriptor set
    pub bindless_set: vk::DescriptorSet,

    /// device address 在 push constant 里传递
    pub vertex_buffer: GfxBuffer,
    pub index_buffer: GfxBuffer,
    /// opaque 段在前、blend 段在后
    pub indirect_buffer: GfxBuffer,
    pub material_buffer: GfxBuffer,

    pub opaque_draw_count: u32,
    pub blend_draw_count: u32,

    pub transform: Mat4,
}

// getters
impl Model {
    #[inline]
    pub fn blend_draw_offset(&self) -> vk::DeviceSize {
        blend_draw_offset(self.opaque_draw_count as usize)
    }

    #[inline]
    pub fn has_opaque(&self) -> bool {
        self.opaque_draw_count > 0
    }

    #[inline]
    pub fn has_blend(&self) -> bool {
        self.blend_draw_count > 0
    }
}

// destroy
impl Model {
    pub fn destroy(mut self, gfx: &Gfx, pool: &GfxDescriptorPool) {
        pool.free_sets(gfx, &[self.bindless_set]);

        self.material_buffer.destroy(gfx);
        self.indirect_buffer.destroy(gfx);
        self.index_buffer.destroy(gfx);
        self.vertex_buffer.destroy(gfx);

        for texture in self.textures.drain(..) {
            texture.sampler.destroy(gfx);
            texture.view.destroy(gfx);
            texture.image.destroy(gfx);
        }
    }
}

/// 等距柱状投影的 HDR 环境图，RGBA32F
pub struct SkyboxData {
    pub pixels: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

/// GPU 侧的天空盒聚合：环境、辐照度、预滤波辐射度三个 cube
///
/// image 以 R32_UINT 存储，view 以 E5B9G9R9 重解释采样
pub struct Skybox {
    pub environment_image: GfxImage,
    pub environment_view: GfxImageView,

    pub irradiance_image: GfxImage,
    pub irradiance_view: GfxImageView,

    pub radiance_image: GfxImage,
    pub radiance_view: GfxImageView,

    pub sampler: GfxSampler,
}

// destroy
impl Skybox {
    pub fn destroy(self, gfx: &Gfx) {
        self.sampler.destroy(gfx);
        self.radiance_view.destroy(gfx);
        self.radiance_image.destroy(gfx);
        self.irradiance_view.destroy(gfx);
        self.irradiance_image.destroy(gfx);
        self.environment_view.destroy(gfx);
        self.environment_image.destroy(gfx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_offset_follows_opaque_segment() {
        assert_eq!(blend_draw_offset(0), 0);
        // vk::DrawIndexedIndirectCommand 是 20 byte
        assert_eq!(blend_draw_offset(1), 20);
        assert_eq!(blend_draw_offset(7), 140);
    }
}
