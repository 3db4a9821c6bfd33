//! 程序化的演示场景
//!
//! 地板 + 不透明立方体 + 半透明立方体，外加棋盘格贴图与
//! 渐变天空的等距柱状环境图。不依赖任何外部资产文件。

use ash::vk;
use glam::{Mat4, Vec2, Vec3, Vec4};
use lustre_renderer::model::{ModelData, SamplerKind, SkyboxData, TextureData};
use lustre_renderer::shader_data::{Material, Vertex, TEX_FLAG_BASE_COLOR};

const CHECKER_SIZE: u32 = 256;
const SKY_WIDTH: u32 = 128;
const SKY_HEIGHT: u32 = 64;

/// 一个轴对齐 box 的 24 顶点 / 36 索引，追加到 vertices/indices
fn append_box(vertices: &mut Vec<Vertex>, indices: &mut Vec<u32>, center: Vec3, half: Vec3) -> (u32, u32) {
    // 每面：法线、切线、面内的两个方向
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let first_index = indices.len() as u32;
    let index_count = 36;

    for (normal, tangent, bitangent) in faces {
        let base = vertices.len() as u32;
        for (u, v) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let dir = normal + tangent * u + bitangent * v;
            vertices.push(Vertex {
                position: center + dir * half,
                normal,
                tangent: [tangent.x, tangent.y, tangent.z, 1.0],
                uv: Vec2::new(u * 0.5 + 0.5, v * 0.5 + 0.5),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (first_index, index_count)
}

/// 位于 y=0 的地板
fn append_floor(vertices: &mut Vec<Vertex>, indices: &mut Vec<u32>, half_size: f32) -> (u32, u32) {
    let first_index = indices.len() as u32;
    let base = vertices.len() as u32;
    for (x, z) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        vertices.push(Vertex {
            position: Vec3::new(x * half_size, 0.0, z * half_size),
            normal: Vec3::Y,
            tangent: [1.0, 0.0, 0.0, 1.0],
            // 每 2 个单位重复一次贴图
            uv: Vec2::new(x, z) * (half_size / 2.0),
        });
    }
    indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    (first_index, 6)
}

fn checkerboard_texture() -> TextureData {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let cell = ((x / 32) + (y / 32)) % 2;
            let value = if cell == 0 { 230u8 } else { 60 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    TextureData {
        pixels,
        width: CHECKER_SIZE,
        height: CHECKER_SIZE,
        srgb: true,
        sampler: SamplerKind::LinearRepeat,
    }
}

fn draw_command(first_index: u32, index_count: u32, material_index: u32) -> vk::DrawIndexedIndirectCommand {
    vk::DrawIndexedIndirectCommand {
        index_count,
        instance_count: 1,
        first_index,
        vertex_offset: 0,
        // shader 通过 gl_BaseInstance 取材质索引
        first_instance: material_index,
    }
}

pub fn build_model() -> ModelData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    let (floor_first, floor_count) = append_floor(&mut vertices, &mut indices, 8.0);
    let (cube_first, cube_count) = append_box(&mut vertices, &mut indices, Vec3::new(-1.5, 1.0, 0.0), Vec3::ONE);
    let (glass_first, glass_count) =
        append_box(&mut vertices, &mut indices, Vec3::new(1.5, 1.0, 0.5), Vec3::splat(0.8));

    let materials = vec![
        // 地板：棋盘格
        Material {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.9,
            base_color_tex: 0,
            texture_flags: TEX_FLAG_BASE_COLOR,
            ..Default::default()
        },
        // 金属立方体
        Material {
            base_color: Vec4::new(0.9, 0.3, 0.2, 1.0),
            metallic: 0.8,
            roughness: 0.25,
            ..Default::default()
        },
        // 半透明玻璃
        Material {
            base_color: Vec4::new(0.3, 0.6, 0.9, 0.4),
            metallic: 0.0,
            roughness: 0.05,
            ..Default::default()
        },
    ];

    let aabb = (Vec3::new(-8.0, 0.0, -8.0), Vec3::new(8.0, 2.0, 8.0));
    ModelData {
        vertices,
        indices,
        materials,
        opaque_draws: vec![draw_command(floor_first, floor_count, 0), draw_command(cube_first, cube_count, 1)],
        blend_draws: vec![draw_command(glass_first, glass_count, 2)],
        textures: vec![checkerboard_texture()],
        transform: Mat4::IDENTITY,
        aabb,
    }
}

/// 渐变天空：地平线亮、天顶蓝、地面暗
pub fn build_skybox() -> SkyboxData {
    let mut pixels = Vec::with_capacity((SKY_WIDTH * SKY_HEIGHT * 4) as usize);
    for y in 0..SKY_HEIGHT {
        // v: 0 是天顶，1 是地面
        let v = (y as f32 + 0.5) / SKY_HEIGHT as f32;
        let (r, g, b) = if v < 0.5 {
            let t = v * 2.0;
            (0.2 + 0.8 * t, 0.4 + 0.5 * t, 0.9 + 0.1 * t)
        } else {
            let t = (v - 0.5) * 2.0;
            (0.35 - 0.2 * t, 0.3 - 0.18 * t, 0.25 - 0.15 * t)
        };
        for _ in 0..SKY_WIDTH {
            pixels.extend_from_slice(&[r, g, b, 1.0]);
        }
    }
    SkyboxData {
        pixels,
        width: SKY_WIDTH,
        height: SKY_HEIGHT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_segments_are_contiguous() {
        let model = build_model();

        // 地板 6 + 两个 box 各 36
        assert_eq!(model.indices.len(), 6 + 36 + 36);
        assert_eq!(model.opaque_draws.len(), 2);
        assert_eq!(model.blend_draws.len(), 1);

        assert_eq!(model.opaque_draws[0].first_index, 0);
        assert_eq!(model.opaque_draws[1].first_index, 6);
        assert_eq!(model.blend_draws[0].first_index, 42);
    }

    #[test]
    fn materials_cover_draw_commands() {
        let model = build_model();
        for cmd in model.opaque_draws.iter().chain(model.blend_draws.iter()) {
            assert!((cmd.first_instance as usize) < model.materials.len());
        }
    }

    #[test]
    fn skybox_is_rgba32f() {
        let sky = build_skybox();
        assert_eq!(sky.pixels.len(), (sky.width * sky.height * 4) as usize);
    }
}
