//! 与 shader 共享的数据布局
//!
//! 所有结构都是 `repr(C)` + `bytemuck::Pod`，与 SPIR-V 侧的 std430
//! 声明逐字段对应。buffer 一律通过 device address 在 push constant
//! 里传递，shader 侧做 vertex pulling。

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// 顶点：位置、法线、切线（w 为副切线符号）、UV
///
/// tangent 用 `[f32; 4]` 而不是 `Vec4`：Vec4 的 16 byte 对齐会在
/// offset 24 处引入 padding，破坏与 shader 侧的紧凑布局
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: [f32; 4],
    pub uv: Vec2,
}

/// PBR 材质
///
/// 五个贴图索引指向 model 的 bindless 贴图数组；
/// `texture_flags` 按位标记哪些贴图存在
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Material {
    pub base_color: Vec4,
    pub emissive: Vec4,

    pub metallic: f32,
    pub roughness: f32,
    pub base_color_tex: u32,
    pub normal_tex: u32,

    pub metallic_roughness_tex: u32,
    pub emissive_tex: u32,
    pub occlusion_tex: u32,
    pub texture_flags: u32,
}

pub const TEX_FLAG_BASE_COLOR: u32 = 1 << 0;
pub const TEX_FLAG_NORMAL: u32 = 1 << 1;
pub const TEX_FLAG_METALLIC_ROUGHNESS: u32 = 1 << 2;
pub const TEX_FLAG_EMISSIVE: u32 = 1 << 3;
pub const TEX_FLAG_OCCLUSION: u32 = 1 << 4;

/// OIT 链表节点；next 指针由 shader 侧在节点数组旁的
/// index 区域维护，这里只描述 payload
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct OitNode {
    /// RGBA8 打包的颜色
    pub packed_color: u32,
    pub depth: f32,
    pub transmittance: f32,
}

/// 不透明 / 深度 / 阴影 pass 的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FramePushConstants {
    pub vertex_buffer_addr: u64,
    pub material_buffer_addr: u64,

    pub view_proj: Mat4,
    pub light_view_proj: Mat4,
    pub model: Mat4,

    pub camera_pos: Vec3,
    /// bit 0: 是否有 skybox（决定 IBL 路径）
    pub flags: u32,

    pub light_dir: Vec3,
    pub _pad0: u32,
}

pub const FRAME_FLAG_HAS_SKYBOX: u32 = 1 << 0;

/// OIT blend pass 的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct OitPushConstants {
    pub vertex_buffer_addr: u64,
    pub material_buffer_addr: u64,
    pub node_buffer_addr: u64,
    pub counter_buffer_addr: u64,

    pub view_proj: Mat4,
    pub model: Mat4,

    pub camera_pos: Vec3,
    pub node_capacity: u32,
}

/// composite pass 的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CompositePushConstants {
    pub node_buffer_addr: u64,

    pub extent: [u32; 2],
    pub node_capacity: u32,
    pub _pad0: u32,
}

/// mip 生成的 push constant（src 是上一级 mip）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct MipPushConstants {
    pub src_extent: [u32; 2],
    pub dst_extent: [u32; 2],
}

/// equirect 投影 / 辐照度卷积 / 辐射度预滤波共用
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CubePushConstants {
    pub face_size: u32,
    /// 预滤波时为 level/(mips-1)，其余 pass 忽略
    pub roughness: f32,
}

/// skybox pass 的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct SkyboxPushConstants {
    /// 去掉平移的 view 与 proj 的乘积
    pub view_proj_no_translation: Mat4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn vertex_layout() {
        assert_eq!(size_of::<Vertex>(), 48);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 12);
        assert_eq!(std::mem::offset_of!(Vertex, tangent), 24);
        assert_eq!(std::mem::offset_of!(Vertex, uv), 40);
    }

    #[test]
    fn material_layout() {
        assert_eq!(size_of::<Material>(), 64);
        assert_eq!(std::mem::offset_of!(Material, metallic), 32);
        assert_eq!(std::mem::offset_of!(Material, texture_flags), 60);
    }

    #[test]
    fn oit_node_is_12_bytes() {
        assert_eq!(size_of::<OitNode>(), 12);
    }

    #[test]
    fn push_constants_fit_vulkan_minimum() {
        // 保证在 maxPushConstantsSize 的 128 byte 保底值之上也可用的
        // 只有小 payload；大 payload 针对 256 byte 的桌面设备
        assert!(size_of::<FramePushConstants>() <= 256);
        assert!(size_of::<OitPushConstants>() <= 256);
        assert!(size_of::<CompositePushConstants>() <= 128);
        assert!(size_of::<MipPushConstants>() <= 128);
    }
}
