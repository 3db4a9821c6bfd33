//! 管线工厂
//!
//! 启动时从预编译的 SPIR-V 一次性建出所有 layout 与 pipeline。
//! shader 编译不在本 crate 职责内，只接受编译产物目录。

use std::path::Path;

use ash::vk;
use lustre_gfx::{
    gfx::Gfx,
    pipelines::{
        compute_pipeline::GfxComputePipeline,
        descriptor::{GfxDescriptorPool, GfxDescriptorSetLayout, GfxDescriptorSetLayoutBuilder},
        graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineDesc},
        pipeline_layout::GfxPipelineLayout,
    },
};

use crate::{
    settings::{BindlessConfig, RendererSettings},
    shader_data,
};

pub struct RenderPipelines {
    pub bindless_config: BindlessConfig,

    /// set 0：model 的 bindless 贴图数组
    pub bindless_set_layout: GfxDescriptorSetLayout,
    /// set 1：shadow map 与 IBL 输入，push descriptor
    pub frame_inputs_layout: GfxDescriptorSetLayout,
    /// skybox 的环境贴图，push descriptor
    pub env_map_layout: GfxDescriptorSetLayout,
    /// OIT 链表头 storage image，push descriptor
    pub oit_head_layout: GfxDescriptorSetLayout,
    /// mip 生成：src/dst 两个 storage image，push descriptor
    pub mip_set_layout: GfxDescriptorSetLayout,
    /// 采样源 + storage 目标，IBL 预计算使用，push descriptor
    pub sampler_storage_layout: GfxDescriptorSetLayout,
    /// composite：HDR 输入 + OIT head + swapchain 输出，push descriptor
    pub composite_set_layout: GfxDescriptorSetLayout,

    pub model_pipeline_layout: GfxPipelineLayout,
    pub oit_pipeline_layout: GfxPipelineLayout,
    pub skybox_pipeline_layout: GfxPipelineLayout,
    pub mip_pipeline_layout: GfxPipelineLayout,
    pub cube_pipeline_layout: GfxPipelineLayout,
    pub composite_pipeline_layout: GfxPipelineLayout,

    pub shadow_pipeline: GfxGraphicsPipeline,
    pub depth_prepass_pipeline: GfxGraphicsPipeline,
    pub opaque_pipeline: GfxGraphicsPipeline,
    pub skybox_pipeline: GfxGraphicsPipeline,
    pub oit_blend_pipeline: GfxGraphicsPipeline,

    pub mip_pipeline: GfxComputePipeline,
    pub mip_srgb_pipeline: GfxComputePipeline,
    pub equirect_pipeline: GfxComputePipeline,
    pub cube_mip_pipeline: GfxComputePipeline,
    pub irradiance_pipeline: GfxComputePipeline,
    pub radiance_pipeline: GfxComputePipeline,
    pub brdf_lut_pipeline: GfxComputePipeline,
    pub composite_pipeline: GfxComputePipeline,

    /// bindless 贴图数组的分配池
    pub descriptor_pool: GfxDescriptorPool,
}

// new & init
impl RenderPipelines {
    pub fn new(gfx: &Gfx, shader_dir: &Path, bindless_config: BindlessConfig) -> Self {
        let _span = tracy_client::span!("RenderPipelines::new");

        let bindless_set_layout = GfxDescriptorSetLayoutBuilder::new()
            .variable_count_binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                bindless_config.max_bindless_textures,
                vk::ShaderStageFlags::FRAGMENT,
            )
            .build(gfx, "bindless-textures");

        let frame_inputs_layout = GfxDescriptorSetLayoutBuilder::new()
            // shadow map（compare sampler）
            .binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT)
            // irradiance cube
            .binding(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT)
            // radiance cube
            .binding(2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT)
            // BRDF LUT
            .binding(3, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT)
            .push_descriptor()
            .build(gfx, "frame-inputs");

        let env_map_layout = GfxDescriptorSetLayoutBuilder::new()
            .binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT)
            .push_descriptor()
            .build(gfx, "env-map");

        let oit_head_layout = GfxDescriptorSetLayoutBuilder::new()
            .binding(0, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::FRAGMENT)
            .push_descriptor()
            .build(gfx, "oit-head");

        let mip_set_layout = GfxDescriptorSetLayoutBuilder::new()
            .binding(0, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::COMPUTE)
            .binding(1, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::COMPUTE)
            .push_descriptor()
            .build(gfx, "mip-gen");

        let sampler_storage_layout = GfxDescriptorSetLayoutBuilder::new()
            .binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::COMPUTE)
            .binding(1, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::COMPUTE)
            .push_descriptor()
            .build(gfx, "sampler-storage");

        let composite_set_layout = GfxDescriptorSetLayoutBuilder::new()
            // HDR color
            .binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::COMPUTE)
            // OIT head
            .binding(1, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::COMPUTE)
            // swapchain image
            .binding(2, vk::DescriptorType::STORAGE_IMAGE, 1, vk::ShaderStageFlags::COMPUTE)
            .push_descriptor()
            .build(gfx, "composite");

        let model_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&bindless_set_layout, &frame_inputs_layout],
            Some(push_range(
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                size_of::<shader_data::FramePushConstants>(),
            )),
            "model",
        );
        let oit_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&bindless_set_layout, &oit_head_layout],
            Some(push_range(
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                size_of::<shader_data::OitPushConstants>(),
            )),
            "oit",
        );
        let skybox_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&env_map_layout],
            Some(push_range(vk::ShaderStageFlags::VERTEX, size_of::<shader_data::SkyboxPushConstants>())),
            "skybox",
        );
        let mip_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&mip_set_layout],
            Some(push_range(vk::ShaderStageFlags::COMPUTE, size_of::<shader_data::MipPushConstants>())),
            "mip-gen",
        );
        let cube_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&sampler_storage_layout],
            Some(push_range(vk::ShaderStageFlags::COMPUTE, size_of::<shader_data::CubePushConstants>())),
            "cube",
        );
        let composite_pipeline_layout = GfxPipelineLayout::new(
            gfx,
            &[&composite_set_layout],
            Some(push_range(vk::ShaderStageFlags::COMPUTE, size_of::<shader_data::CompositePushConstants>())),
            "composite",
        );

        let shadow_pipeline = GfxGraphicsPipeline::new(
            gfx,
            &model_pipeline_layout,
            &GfxGraphicsPipelineDesc {
                vertex_shader: shader_dir.join("shadow.vert.spv"),
                fragment_shader: None,
                // 正面剔除减少 shadow acne
                cull_mode: vk::CullModeFlags::FRONT,
                depth_format: Some(RendererSettings::DEPTH_FORMAT),
                ..Default::default()
            },
            "shadow",
        );
        let depth_prepass_pipeline = GfxGraphicsPipeline::new(
            gfx,
            &model_pipeline_layout,
            &GfxGraphicsPipelineDesc {
                vertex_shader: shader_dir.join("depth_prepass.vert.spv"),
                fragment_shader: None,
                depth_format: Some(RendererSettings::DEPTH_FORMAT),
                ..Default::default()
            },
            "depth-prepass",
        );
        let opaque_pipeline = GfxGraphicsPipeline::new(
            gfx,
            &model_pipeline_layout,
            &GfxGraphicsPipelineDesc {
                vertex_shader: shader_dir.join("opaque.vert.spv"),
                fragment_shader: Some(shader_dir.join("opaque.frag.spv")),
                // 深度已由 prepass 写好，这里只做相等测试
                depth_write: false,
                depth_compare_op: vk::CompareOp::EQUAL,
                color_format: Some(RendererSettings::COLOR_FORMAT),
                depth_format: Some(RendererSettings::DEPTH_FORMAT),
                ..Default::default()
            },
            "opaque",
        );
        let skybox_pipeline = GfxGraphicsPipeline::new(
            gfx,
            &skybox_pipeline_layout,
            &GfxGraphicsPipelineDesc {
                vertex_shader: shader_dir.join("skybox.vert.spv"),
                fragment_shader: Some(shader_dir.join("skybox.frag.spv")),
                cull_mode: vk::CullModeFlags::NONE,
                depth_write: false,
                // reversed-Z 的 clear 值是 0.0，只在没有几何体的像素通过
                depth_compare_op: vk::CompareOp::EQUAL,
                color_format: Some(RendererSettings::COLOR_FORMAT),
                depth_format: Some(RendererSettings::DEPTH_FORMAT),
                ..Default::default()
            },
            "skybox",
        );
        let oit_blend_pipeline = GfxGraphicsPipeline::new(
            gfx,
            &oit_pipeline_layout,
            &GfxGraphicsPipelineDesc {
                vertex_shader: shader_dir.join("oit.vert.spv"),
                fragment_shader: Some(shader_dir.join("oit.frag.spv")),
                cull_mode: vk::CullModeFlags::NONE,
                depth_write: false,
                // fragment shader 只向链表追加，没有 color attachment
                color_format: None,
                depth_format: Some(RendererSettings::DEPTH_FORMAT),
                ..Default::default()
            },
            "oit-blend",
        );

        let mip_pipeline = GfxComputePipeline::new(gfx, &mip_pipeline_layout, &shader_dir.join("mip.comp.spv"), "mip");
        let mip_srgb_pipeline =
            GfxComputePipeline::new(gfx, &mip_pipeline_layout, &shader_dir.join("mip_srgb.comp.spv"), "mip-srgb");
        let equirect_pipeline = GfxComputePipeline::new(
            gfx,
            &cube_pipeline_layout,
            &shader_dir.join("equirect_to_cube.comp.spv"),
            "equirect-to-cube",
        );
        let cube_mip_pipeline =
            GfxComputePipeline::new(gfx, &mip_pipeline_layout, &shader_dir.join("cube_mip.comp.spv"), "cube-mip");
        let irradiance_pipeline = GfxComputePipeline::new(
            gfx,
            &cube_pipeline_layout,
            &shader_dir.join("irradiance.comp.spv"),
            "irradiance",
        );
        let radiance_pipeline = GfxComputePipeline::new(
            gfx,
            &cube_pipeline_layout,
            &shader_dir.join("radiance_prefilter.comp.spv"),
            "radiance-prefilter",
        );
        let brdf_lut_pipeline =
            GfxComputePipeline::new(gfx, &cube_pipeline_layout, &shader_dir.join("brdf_lut.comp.spv"), "brdf-lut");
        let composite_pipeline = GfxComputePipeline::new(
            gfx,
            &composite_pipeline_layout,
            &shader_dir.join("composite.comp.spv"),
            "composite",
        );

        let descriptor_pool = GfxDescriptorPool::new(
            gfx,
            8,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: bindless_config.max_bindless_textures,
            }],
            "bindless",
        );

        Self {
            bindless_config,
            bindless_set_layout,
            frame_inputs_layout,
            env_map_layout,
            oit_head_layout,
            mip_set_layout,
            sampler_storage_layout,
            composite_set_layout,
            model_pipeline_layout,
            oit_pipeline_layout,
            skybox_pipeline_layout,
            mip_pipeline_layout,
            cube_pipeline_layout,
            composite_pipeline_layout,
            shadow_pipeline,
            depth_prepass_pipeline,
            opaque_pipeline,
            skybox_pipeline,
            oit_blend_pipeline,
            mip_pipeline,
            mip_srgb_pipeline,
            equirect_pipeline,
            cube_mip_pipeline,
            irradiance_pipeline,
            radiance_pipeline,
            brdf_lut_pipeline,
            composite_pipeline,
            descriptor_pool,
        }
    }
}

fn push_range(stages: vk::ShaderStageFlags, size: usize) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: stages,
        offset: 0,
        size: size as u32,
    }
}

// destroy
impl RenderPipelines {
    pub fn destroy(self, gfx: &Gfx) {
        self.descriptor_pool.destroy(gfx);

        self.composite_pipeline.destroy(gfx);
        self.brdf_lut_pipeline.destroy(gfx);
        self.radiance_pipeline.destroy(gfx);
        self.irradiance_pipeline.destroy(gfx);
        self.cube_mip_pipeline.destroy(gfx);
        self.equirect_pipeline.destroy(gfx);
        self.mip_srgb_pipeline.destroy(gfx);
        self.mip_pipeline.destroy(gfx);

        self.oit_blend_pipeline.destroy(gfx);
        self.skybox_pipeline.destroy(gfx);
        self.opaque_pipeline.destroy(gfx);
        self.depth_prepass_pipeline.destroy(gfx);
        self.shadow_pipeline.destroy(gfx);

        self.composite_pipeline_layout.destroy(gfx);
        self.cube_pipeline_layout.destroy(gfx);
        self.mip_pipeline_layout.destroy(gfx);
        self.skybox_pipeline_layout.destroy(gfx);
        self.oit_pipeline_layout.destroy(gfx);
        self.model_pipeline_layout.destroy(gfx);

        self.composite_set_layout.destroy(gfx);
        self.sampler_storage_layout.destroy(gfx);
        self.mip_set_layout.destroy(gfx);
        self.oit_head_layout.destroy(gfx);
        self.env_map_layout.destroy(gfx);
        self.frame_inputs_layout.destroy(gfx);
        self.bindless_set_layout.destroy(gfx);
    }
}
