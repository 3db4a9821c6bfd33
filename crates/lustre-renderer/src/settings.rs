use std::{fmt::Display, ops::Deref};

use ash::vk;
use lustre_gfx::gfx::Gfx;

/// 渲染器固定配置
pub struct RendererSettings;
impl RendererSettings {
    /// HDR 离屏 color target
    pub const COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    /// reversed-Z，clear 为 0.0，比较方向 GREATER
    pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

    pub const SHADOW_MAP_SIZE: u32 = 2048;

    /// cube image 的存储 format（compute 写入 RGBE 打包值）
    pub const CUBE_STORAGE_FORMAT: vk::Format = vk::Format::R32_UINT;
    /// 采样 view 以共享指数 HDR format 重解释
    pub const CUBE_SAMPLE_FORMAT: vk::Format = vk::Format::E5B9G9R9_UFLOAT_PACK32;
    pub const IRRADIANCE_SIZE: u32 = 32;

    pub const BRDF_LUT_SIZE: u32 = 512;
    pub const BRDF_LUT_FORMAT: vk::Format = vk::Format::R16G16_SFLOAT;

    /// compute shader 的 workgroup 边长，与 shader 里的 local_size 一致
    pub const WORKGROUP_SIZE: u32 = 8;

    /// OIT 链表头 image
    pub const OIT_HEAD_FORMAT: vk::Format = vk::Format::R32_UINT;
    /// 平均每像素的 OIT 节点容量
    pub const OIT_NODES_PER_PIXEL: u32 = 4;
}

/// bindless 贴图数组的容量，启动时从 device limits 解析一次
#[derive(Clone, Copy, Debug)]
pub struct BindlessConfig {
    pub max_bindless_textures: u32,
}

impl BindlessConfig {
    /// 给 push descriptor 等其他用途留出的余量
    const RESERVED_DESCRIPTORS: u32 = 64;
    const MAX_CAPACITY: u32 = 16 * 1024;

    pub fn resolve(gfx: &Gfx) -> Self {
        let limit = gfx.physical_device().limits().max_descriptor_set_sampled_images;
        let capacity = limit.saturating_sub(Self::RESERVED_DESCRIPTORS).clamp(1, Self::MAX_CAPACITY);
        log::info!("bindless texture capacity: {capacity} (device limit {limit})");
        Self { max_bindless_textures: capacity }
    }
}

/// 帧标签（A/B）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1。
#[derive(Debug, Clone, Copy)]
pub enum FrameLabel {
    A,
    B,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 2] = [0, 1];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            _ => panic!("Invalid frame index: {idx}"),
        }
    }
}

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}
// new & init
impl FrameCounter {
    pub fn new() -> Self {
        Self { frame_id: 0 }
    }
}
impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    const FIF_COUNT: usize = 2;

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; Self::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_label_round_robin() {
        let mut counter = FrameCounter::new();
        assert_eq!(*counter.frame_label(), 0);
        counter.next_frame();
        assert_eq!(*counter.frame_label(), 1);
        counter.next_frame();
        assert_eq!(*counter.frame_label(), 0);
        assert_eq!(counter.frame_id(), 2);
    }

    #[test]
    fn frame_name_carries_id_and_label() {
        let mut counter = FrameCounter::new();
        counter.next_frame();
        assert_eq!(counter.frame_name(), "[F1B]");
    }
}
