//! 资产上传
//!
//! transfer queue 负责 staging copy，compute queue 负责 mip 生成与
//! IBL 预计算，两者之间用一个 binary semaphore 衔接。
//! 上传是加载期的低频路径，结束时阻塞等待两个 queue 完成，
//! 之后统一销毁 staging 资源并 reset pool。
//!
//! 注意 barrier 所在的 queue：transfer queue 不支持 COMPUTE_SHADER
//! stage，所以所有离开 TRANSFER_DST 的 layout 转换都录制在 compute
//! cmd 上（TRANSFER stage 在 compute queue 上合法）。

use ash::vk;
use bytemuck::bytes_of;
use itertools::Itertools;
use lustre_gfx::{
    basic::color::LabelColor,
    commands::{
        barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool,
        semaphore::GfxSemaphore, submit_info::GfxSubmitInfo,
    },
    gfx::Gfx,
    resources::{
        buffer::GfxBuffer,
        image::{mip_level_count, GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::GfxSampler,
        state::GfxImageState,
    },
};

use crate::{
    model::{blend_draw_offset, Model, ModelData, ModelTexture, SamplerKind, Skybox, SkyboxData},
    pipelines::RenderPipelines,
    settings::RendererSettings,
    shader_data::{CubePushConstants, MipPushConstants},
};

/// 辐射度预滤波 cube 的边长
const RADIANCE_SIZE: u32 = 128;

/// mip level 的边长：右移并保底 1
#[inline]
pub fn mip_extent(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

/// dispatch 的 workgroup 数：对边长向上取整
#[inline]
pub fn dispatch_group_count(size: u32) -> u32 {
    size.div_ceil(RendererSettings::WORKGROUP_SIZE)
}

pub struct Uploader {
    transfer_pool: GfxCommandPool,
    transfer_cmd: GfxCommandBuffer,
    compute_pool: GfxCommandPool,
    compute_cmd: GfxCommandBuffer,

    /// transfer 提交 signal，compute 提交 wait
    transfer_done: GfxSemaphore,
}

// new & init
impl Uploader {
    pub fn new(gfx: &Gfx) -> Self {
        let transfer_pool = GfxCommandPool::new(
            gfx,
            gfx.transfer_queue().family_index(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "upload-transfer",
        );
        let transfer_cmd = transfer_pool.alloc_command_buffer(gfx, "upload-transfer");
        let compute_pool = GfxCommandPool::new(
            gfx,
            gfx.compute_queue().family_index(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "upload-compute",
        );
        let compute_cmd = compute_pool.alloc_command_buffer(gfx, "upload-compute");

        Self {
            transfer_pool,
            transfer_cmd,
            compute_pool,
            compute_cmd,
            transfer_done: GfxSemaphore::new(gfx, "upload-transfer-done"),
        }
    }
}

// tools
impl Uploader {
    pub fn load_model(&self, gfx: &Gfx, pipelines: &RenderPipelines, data: &ModelData) -> Model {
        let _span = tracy_client::span!("Uploader::load_model");
        log::info!(
            "loading model: {} vertices, {} indices, {} materials, {} textures, {} opaque + {} blend draws",
            data.vertices.len(),
            data.indices.len(),
            data.materials.len(),
            data.textures.len(),
            data.opaque_draws.len(),
            data.blend_draws.len()
        );

        self.transfer_cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.compute_cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.transfer_cmd.begin_label("upload-model", LabelColor::COLOR_CMD);
        self.compute_cmd.begin_label("model-mips", LabelColor::COLOR_CMD);

        let mut stagings: Vec<GfxBuffer> = Vec::new();

        let vertex_buffer = self.stage_buffer_copy(
            gfx,
            &mut stagings,
            &data.vertices,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            "model-vertices",
        );
        let index_buffer = self.stage_buffer_copy(
            gfx,
            &mut stagings,
            &data.indices,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            "model-indices",
        );
        let material_buffer = self.stage_buffer_copy(
            gfx,
            &mut stagings,
            &data.materials,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            "model-materials",
        );

        // indirect buffer：opaque 段在前，blend 段紧随其后
        let indirect_draws = data.opaque_draws.iter().chain(data.blend_draws.iter()).copied().collect_vec();
        let indirect_buffer = self.stage_buffer_copy(
            gfx,
            &mut stagings,
            &indirect_draws,
            vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            "model-indirect",
        );
        debug_assert_eq!(
            blend_draw_offset(data.opaque_draws.len()),
            (data.opaque_draws.len() * size_of::<vk::DrawIndexedIndirectCommand>()) as u64
        );

        let mut mip_views: Vec<GfxImageView> = Vec::new();
        let mut textures: Vec<ModelTexture> = Vec::new();
        for (tex_idx, tex) in data.textures.iter().enumerate() {
            let format = if tex.srgb { vk::Format::R8G8B8A8_SRGB } else { vk::Format::R8G8B8A8_UNORM };
            let mut image = self.upload_texture_base(
                gfx,
                &mut stagings,
                &tex.pixels,
                vk::Extent2D { width: tex.width, height: tex.height },
                format,
                &format!("model-tex-{tex_idx}"),
            );

            self.generate_mips(gfx, pipelines, &mut image, tex.srgb, &mut mip_views);

            // 采样 view 用请求的 format（sRGB storage 的 image 是 UNORM + MUTABLE）；
            // sRGB 不支持 STORAGE，view 的 usage 限定为 SAMPLED
            let view = GfxImageView::new(
                gfx,
                image.handle(),
                GfxImageViewDesc::new_2d_all_mips(format, vk::ImageAspectFlags::COLOR, image.mip_levels() as u8)
                    .with_usage(vk::ImageUsageFlags::SAMPLED),
                format!("model-tex-{tex_idx}"),
            );
            let sampler = match tex.sampler {
                SamplerKind::LinearRepeat => {
                    GfxSampler::new_linear_repeat(gfx, 8.0, &format!("model-tex-{tex_idx}"))
                }
                SamplerKind::LinearClamp => GfxSampler::new_linear_clamp(gfx, &format!("model-tex-{tex_idx}")),
            };
            textures.push(ModelTexture { image, view, sampler });
        }

        self.transfer_cmd.end_label();
        self.compute_cmd.end_label();
        self.submit_and_wait(gfx);

        for staging in stagings.drain(..) {
            staging.destroy(gfx);
        }
        for view in mip_views.drain(..) {
            view.destroy(gfx);
        }
        self.transfer_pool.reset(gfx);
        self.compute_pool.reset(gfx);

        // bindless set：PARTIALLY_BOUND，无贴图时分配 1 个空位
        let set_count = (textures.len() as u32).max(1);
        let bindless_set = pipelines.descriptor_pool.alloc_variable_set(
            gfx,
            &pipelines.bindless_set_layout,
            set_count,
            "model-bindless",
        );
        if !textures.is_empty() {
            let image_infos = textures
                .iter()
                .map(|tex| {
                    vk::DescriptorImageInfo::default()
                        .sampler(tex.sampler.handle())
                        .image_view(tex.view.handle())
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                })
                .collect_vec();
            let write = vk::WriteDescriptorSet::default()
                .dst_set(bindless_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos);
            unsafe {
                gfx.gfx_device().update_descriptor_sets(std::slice::from_ref(&write), &[]);
            }
        }

        Model {
            textures,
            bindless_set,
            vertex_buffer,
            index_buffer,
            indirect_buffer,
            material_buffer,
            opaque_draw_count: data.opaque_draws.len() as u32,
            blend_draw_count: data.blend_draws.len() as u32,
            transform: data.transform,
        }
    }

    pub fn load_skybox(&self, gfx: &Gfx, pipelines: &RenderPipelines, data: &SkyboxData) -> Skybox {
        let _span = tracy_client::span!("Uploader::load_skybox");
        log::info!("loading skybox: {}x{} equirect", data.width, data.height);

        self.transfer_cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.compute_cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.transfer_cmd.begin_label("upload-skybox", LabelColor::COLOR_CMD);
        self.compute_cmd.begin_label("skybox-ibl", LabelColor::COLOR_CMD);

        let mut stagings: Vec<GfxBuffer> = Vec::new();
        let mut scratch_views: Vec<GfxImageView> = Vec::new();

        let sampler = GfxSampler::new_linear_clamp(gfx, "skybox");

        // 等距柱状图只在预计算阶段采样，之后销毁
        let mut equirect_image = self.upload_texture_base(
            gfx,
            &mut stagings,
            &data.pixels,
            vk::Extent2D { width: data.width, height: data.height },
            vk::Format::R32G32B32A32_SFLOAT,
            "skybox-equirect",
        );
        // 预计算阶段所有采样源都停留在 GENERAL，与 descriptor 里声明的
        // layout 一致
        equirect_image.transition(&self.compute_cmd, GfxImageState::GENERAL);
        let equirect_view = GfxImageView::new(
            gfx,
            equirect_image.handle(),
            GfxImageViewDesc::new_2d(vk::Format::R32G32B32A32_SFLOAT, vk::ImageAspectFlags::COLOR),
            "skybox-equirect",
        );

        let env_side = (data.height / 2).max(1);
        let env_mips = mip_level_count(env_side, env_side);
        let mut environment_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_cube(
                env_side,
                RendererSettings::CUBE_STORAGE_FORMAT,
                env_mips,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            "skybox-env",
        );
        environment_image.transition(&self.compute_cmd, GfxImageState::GENERAL);

        // equirect -> cube 的 mip 0
        self.dispatch_cube(
            gfx,
            pipelines,
            pipelines.equirect_pipeline.handle(),
            &sampler,
            &equirect_view,
            &mut environment_image,
            0,
            CubePushConstants { face_size: env_side, roughness: 0.0 },
            &mut scratch_views,
        );

        // cube 的 mip chain
        self.generate_cube_mips(gfx, pipelines, &mut environment_image, &mut scratch_views);

        // env cube 的采样 view（E5B9G9R9 重解释，该 format 不支持 STORAGE），
        // irradiance/radiance 的输入
        let environment_view = GfxImageView::new(
            gfx,
            environment_image.handle(),
            GfxImageViewDesc::new_cube(RendererSettings::CUBE_SAMPLE_FORMAT, env_mips as u8)
                .with_usage(vk::ImageUsageFlags::SAMPLED),
            "skybox-env",
        );

        let mut irradiance_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_cube(
                RendererSettings::IRRADIANCE_SIZE,
                RendererSettings::CUBE_STORAGE_FORMAT,
                1,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            "skybox-irradiance",
        );
        irradiance_image.transition(&self.compute_cmd, GfxImageState::GENERAL);
        self.dispatch_cube(
            gfx,
            pipelines,
            pipelines.irradiance_pipeline.handle(),
            &sampler,
            &environment_view,
            &mut irradiance_image,
            0,
            CubePushConstants { face_size: RendererSettings::IRRADIANCE_SIZE, roughness: 0.0 },
            &mut scratch_views,
        );

        let radiance_mips = mip_level_count(RADIANCE_SIZE, RADIANCE_SIZE);
        let mut radiance_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_cube(
                RADIANCE_SIZE,
                RendererSettings::CUBE_STORAGE_FORMAT,
                radiance_mips,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            "skybox-radiance",
        );
        radiance_image.transition(&self.compute_cmd, GfxImageState::GENERAL);
        for level in 0..radiance_mips {
            // 粗糙度随 mip 递增
            let roughness = if radiance_mips > 1 { level as f32 / (radiance_mips - 1) as f32 } else { 0.0 };
            self.dispatch_cube(
                gfx,
                pipelines,
                pipelines.radiance_pipeline.handle(),
                &sampler,
                &environment_view,
                &mut radiance_image,
                level,
                CubePushConstants { face_size: mip_extent(RADIANCE_SIZE, level), roughness },
                &mut scratch_views,
            );
        }

        environment_image.transition(&self.compute_cmd, GfxImageState::SHADER_READ_COMPUTE);
        irradiance_image.transition(&self.compute_cmd, GfxImageState::SHADER_READ_COMPUTE);
        radiance_image.transition(&self.compute_cmd, GfxImageState::SHADER_READ_COMPUTE);

        self.transfer_cmd.end_label();
        self.compute_cmd.end_label();
        self.submit_and_wait(gfx);

        for staging in stagings.drain(..) {
            staging.destroy(gfx);
        }
        for view in scratch_views.drain(..) {
            view.destroy(gfx);
        }
        equirect_view.destroy(gfx);
        equirect_image.destroy(gfx);
        self.transfer_pool.reset(gfx);
        self.compute_pool.reset(gfx);

        let irradiance_view = GfxImageView::new(
            gfx,
            irradiance_image.handle(),
            GfxImageViewDesc::new_cube(RendererSettings::CUBE_SAMPLE_FORMAT, 1)
                .with_usage(vk::ImageUsageFlags::SAMPLED),
            "skybox-irradiance",
        );
        let radiance_view = GfxImageView::new(
            gfx,
            radiance_image.handle(),
            GfxImageViewDesc::new_cube(RendererSettings::CUBE_SAMPLE_FORMAT, radiance_mips as u8)
                .with_usage(vk::ImageUsageFlags::SAMPLED),
            "skybox-radiance",
        );

        Skybox {
            environment_image,
            environment_view,
            irradiance_image,
            irradiance_view,
            radiance_image,
            radiance_view,
            sampler,
        }
    }

    /// 启动时一次性生成 BRDF 积分 LUT
    pub fn build_brdf_lut(&self, gfx: &Gfx, pipelines: &RenderPipelines) -> (GfxImage, GfxImageView) {
        let _span = tracy_client::span!("Uploader::build_brdf_lut");

        let mut image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_2d(
                vk::Extent2D {
                    width: RendererSettings::BRDF_LUT_SIZE,
                    height: RendererSettings::BRDF_LUT_SIZE,
                },
                RendererSettings::BRDF_LUT_FORMAT,
                1,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            ),
            "brdf-lut",
        );
        let view = GfxImageView::new(
            gfx,
            image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::BRDF_LUT_FORMAT, vk::ImageAspectFlags::COLOR),
            "brdf-lut",
        );

        gfx.one_time_exec(
            gfx.compute_queue(),
            |cmd| {
                image.transition(cmd, GfxImageState::STORAGE_WRITE_COMPUTE);

                cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipelines.brdf_lut_pipeline.handle());
                let dst_info = vk::DescriptorImageInfo::default()
                    .image_view(view.handle())
                    .image_layout(vk::ImageLayout::GENERAL);
                let write = vk::WriteDescriptorSet::default()
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(std::slice::from_ref(&dst_info));
                cmd.push_descriptor_set(
                    vk::PipelineBindPoint::COMPUTE,
                    pipelines.cube_pipeline_layout.handle(),
                    0,
                    std::slice::from_ref(&write),
                );
                cmd.push_constants(
                    pipelines.cube_pipeline_layout.handle(),
                    vk::ShaderStageFlags::COMPUTE,
                    0,
                    bytes_of(&CubePushConstants { face_size: RendererSettings::BRDF_LUT_SIZE, roughness: 0.0 }),
                );
                let groups = dispatch_group_count(RendererSettings::BRDF_LUT_SIZE);
                cmd.dispatch(groups, groups, 1);

                image.transition(cmd, GfxImageState::SHADER_READ_COMPUTE);
            },
            "brdf-lut",
        );

        (image, view)
    }
}

// upload helpers
impl Uploader {
    /// staging buffer + device local buffer，并在 transfer cmd 上录制 copy
    fn stage_buffer_copy<T: Copy>(
        &self,
        gfx: &Gfx,
        stagings: &mut Vec<GfxBuffer>,
        data: &[T],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> GfxBuffer {
        // 空数组也分配最小 buffer，device address 始终有效
        let size = (std::mem::size_of_val(data) as vk::DeviceSize).max(4);

        let staging = GfxBuffer::new_stage_buffer(gfx, size, format!("staging-{name}"));
        if !data.is_empty() {
            staging.transfer_data_by_mmap(gfx, data);
        }

        let buffer = GfxBuffer::new(gfx, size, usage, false, name);
        self.transfer_cmd.cmd_copy_buffer(
            &staging,
            &buffer,
            &[vk::BufferCopy { src_offset: 0, dst_offset: 0, size }],
        );

        stagings.push(staging);
        buffer
    }

    /// 创建 image 并上传 mip 0：UNDEFINED -> TRANSFER_DST 和 copy 在
    /// transfer cmd 上，之后的转换由调用者在 compute cmd 上录制
    fn upload_texture_base<T: Copy>(
        &self,
        gfx: &Gfx,
        stagings: &mut Vec<GfxBuffer>,
        pixels: &[T],
        extent: vk::Extent2D,
        format: vk::Format,
        name: &str,
    ) -> GfxImage {
        let mip_levels = if format == vk::Format::R32G32B32A32_SFLOAT {
            // float 环境图不走 mip 链
            1
        } else {
            mip_level_count(extent.width, extent.height)
        };
        let usage = if mip_levels > 1 {
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED
        } else {
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED
        };
        let mut image =
            GfxImage::new(gfx, &GfxImageCreateInfo::new_2d(extent, format, mip_levels, usage), name);

        let staging = GfxBuffer::new_stage_buffer(
            gfx,
            std::mem::size_of_val(pixels) as vk::DeviceSize,
            format!("staging-{name}"),
        );
        staging.transfer_data_by_mmap(gfx, pixels);

        image.transition(&self.transfer_cmd, GfxImageState::TRANSFER_DST);

        let region = vk::BufferImageCopy2::default()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });
        let copy_info = vk::CopyBufferToImageInfo2::default()
            .src_buffer(staging.vk_buffer())
            .dst_image(image.handle())
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .regions(std::slice::from_ref(&region));
        self.transfer_cmd.cmd_copy_buffer_to_image(&copy_info);

        stagings.push(staging);
        image
    }

    /// 在 compute cmd 上为 2D 贴图生成完整 mip 链
    ///
    /// 每级 dispatch 后对写入的 level 插入 write->read barrier，
    /// 结束时整个 image 转为 SHADER_READ
    fn generate_mips(
        &self,
        gfx: &Gfx,
        pipelines: &RenderPipelines,
        image: &mut GfxImage,
        srgb: bool,
        scratch_views: &mut Vec<GfxImageView>,
    ) {
        image.transition(&self.compute_cmd, GfxImageState::GENERAL);

        if image.mip_levels() > 1 {
            let pipeline =
                if srgb { pipelines.mip_srgb_pipeline.handle() } else { pipelines.mip_pipeline.handle() };
            self.compute_cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline);

            // storage view 以实际 format（UNORM）创建
            let level_views = (0..image.mip_levels())
                .map(|level| {
                    GfxImageView::new(
                        gfx,
                        image.handle(),
                        GfxImageViewDesc::new_2d_mip(image.vk_format(), vk::ImageAspectFlags::COLOR, level as u8),
                        format!("mip-{level}"),
                    )
                })
                .collect_vec();

            for level in 1..image.mip_levels() {
                self.push_mip_descriptors(
                    pipelines,
                    &level_views[(level - 1) as usize],
                    &level_views[level as usize],
                );
                let src_extent = [mip_extent(image.width(), level - 1), mip_extent(image.height(), level - 1)];
                let dst_extent = [mip_extent(image.width(), level), mip_extent(image.height(), level)];
                self.compute_cmd.push_constants(
                    pipelines.mip_pipeline_layout.handle(),
                    vk::ShaderStageFlags::COMPUTE,
                    0,
                    bytes_of(&MipPushConstants { src_extent, dst_extent }),
                );
                self.compute_cmd.dispatch(dispatch_group_count(dst_extent[0]), dispatch_group_count(dst_extent[1]), 1);

                self.mip_level_barrier(image, level);
            }

            scratch_views.extend(level_views);
        }

        image.transition(&self.compute_cmd, GfxImageState::SHADER_READ_COMPUTE);
    }

    /// cube image 的 mip 链，六个 layer 一起处理
    fn generate_cube_mips(
        &self,
        gfx: &Gfx,
        pipelines: &RenderPipelines,
        image: &mut GfxImage,
        scratch_views: &mut Vec<GfxImageView>,
    ) {
        if image.mip_levels() <= 1 {
            return;
        }

        self.compute_cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipelines.cube_mip_pipeline.handle());

        let level_views = (0..image.mip_levels())
            .map(|level| {
                GfxImageView::new(
                    gfx,
                    image.handle(),
                    GfxImageViewDesc::new_cube_storage_mip(image.vk_format(), level as u8),
                    format!("cube-mip-{level}"),
                )
            })
            .collect_vec();

        for level in 1..image.mip_levels() {
            self.push_mip_descriptors(pipelines, &level_views[(level - 1) as usize], &level_views[level as usize]);
            let src_extent = [mip_extent(image.width(), level - 1); 2];
            let dst_extent = [mip_extent(image.width(), level); 2];
            self.compute_cmd.push_constants(
                pipelines.mip_pipeline_layout.handle(),
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytes_of(&MipPushConstants { src_extent, dst_extent }),
            );
            self.compute_cmd.dispatch(dispatch_group_count(dst_extent[0]), dispatch_group_count(dst_extent[1]), 6);

            self.mip_level_barrier(image, level);
        }

        scratch_views.extend(level_views);
    }

    /// IBL 预计算的一次 dispatch：采样 src，写入 dst 的一个 mip
    #[allow(clippy::too_many_arguments)]
    fn dispatch_cube(
        &self,
        gfx: &Gfx,
        pipelines: &RenderPipelines,
        pipeline: vk::Pipeline,
        sampler: &GfxSampler,
        src_view: &GfxImageView,
        dst_image: &mut GfxImage,
        dst_level: u32,
        push: CubePushConstants,
        scratch_views: &mut Vec<GfxImageView>,
    ) {
        self.compute_cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline);

        let dst_view = GfxImageView::new(
            gfx,
            dst_image.handle(),
            GfxImageViewDesc::new_cube_storage_mip(dst_image.vk_format(), dst_level as u8),
            format!("cube-dst-{dst_level}"),
        );

        let src_info = vk::DescriptorImageInfo::default()
            .sampler(sampler.handle())
            .image_view(src_view.handle())
            // 预计算期间所有 cube 都停留在 GENERAL
            .image_layout(vk::ImageLayout::GENERAL);
        let dst_info =
            vk::DescriptorImageInfo::default().image_view(dst_view.handle()).image_layout(vk::ImageLayout::GENERAL);
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&src_info)),
            vk::WriteDescriptorSet::default()
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(std::slice::from_ref(&dst_info)),
        ];
        self.compute_cmd.push_descriptor_set(
            vk::PipelineBindPoint::COMPUTE,
            pipelines.cube_pipeline_layout.handle(),
            0,
            &writes,
        );
        self.compute_cmd.push_constants(
            pipelines.cube_pipeline_layout.handle(),
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytes_of(&push),
        );

        let groups = dispatch_group_count(push.face_size);
        self.compute_cmd.dispatch(groups, groups, 6);

        self.mip_level_barrier(dst_image, dst_level);

        scratch_views.push(dst_view);
    }

    fn push_mip_descriptors(&self, pipelines: &RenderPipelines, src: &GfxImageView, dst: &GfxImageView) {
        let src_info =
            vk::DescriptorImageInfo::default().image_view(src.handle()).image_layout(vk::ImageLayout::GENERAL);
        let dst_info =
            vk::DescriptorImageInfo::default().image_view(dst.handle()).image_layout(vk::ImageLayout::GENERAL);
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(std::slice::from_ref(&src_info)),
            vk::WriteDescriptorSet::default()
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(std::slice::from_ref(&dst_info)),
        ];
        self.compute_cmd.push_descriptor_set(
            vk::PipelineBindPoint::COMPUTE,
            pipelines.mip_pipeline_layout.handle(),
            0,
            &writes,
        );
    }

    /// 写入的 mip level 对后续读取可见；layer 范围默认 REMAINING
    fn mip_level_barrier(&self, image: &GfxImage, level: u32) {
        let barrier = GfxImageBarrier::new()
            .image(image.handle())
            .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
            .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ)
            .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
            .mip_range(level, 1);
        self.compute_cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&barrier));
    }

    /// 提交 transfer + compute，并阻塞等待两个 queue 完成
    fn submit_and_wait(&self, gfx: &Gfx) {
        self.transfer_cmd.end();
        self.compute_cmd.end();

        gfx.transfer_queue().submit(
            gfx,
            vec![
                GfxSubmitInfo::new(std::slice::from_ref(&self.transfer_cmd))
                    .signal(&self.transfer_done, vk::PipelineStageFlags2::ALL_COMMANDS),
            ],
            None,
        );
        gfx.compute_queue().submit(
            gfx,
            vec![
                GfxSubmitInfo::new(std::slice::from_ref(&self.compute_cmd))
                    .wait(&self.transfer_done, vk::PipelineStageFlags2::ALL_COMMANDS),
            ],
            None,
        );

        // 加载期的低频路径，直接阻塞
        gfx.transfer_queue().wait_idle(gfx);
        gfx.compute_queue().wait_idle(gfx);
    }
}

// destroy
impl Uploader {
    pub fn destroy(self, gfx: &Gfx) {
        self.transfer_done.destroy(gfx);
        self.compute_pool.destroy(gfx);
        self.transfer_pool.destroy(gfx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_clamps_to_one() {
        assert_eq!(mip_extent(1024, 0), 1024);
        assert_eq!(mip_extent(1024, 5), 32);
        assert_eq!(mip_extent(1024, 10), 1);
        assert_eq!(mip_extent(1024, 12), 1);
        assert_eq!(mip_extent(800, 1), 400);
    }

    #[test]
    fn dispatch_rounds_up() {
        assert_eq!(dispatch_group_count(8), 1);
        assert_eq!(dispatch_group_count(9), 2);
        assert_eq!(dispatch_group_count(1), 1);
        assert_eq!(dispatch_group_count(1024), 128);
        // 奇数边长的最后一级
        assert_eq!(dispatch_group_count(mip_extent(25, 1)), 2);
    }
}
