//! 渲染器主循环
//!
//! 每帧重新构建渲染图：shadow → depth prepass → opaque → skybox →
//! OIT → composite，录制进当前 frame slot 的 command buffer，
//! 一次提交后 present。背压来自 per-frame 的 in-flight fence。

use std::path::Path;

use ash::vk;
use glam::{Mat4, Vec3, Vec4};
use lustre_gfx::{
    basic::color::LabelColor,
    commands::submit_info::GfxSubmitInfo,
    gfx::Gfx,
    resources::{
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::GfxSampler,
        state::{GfxBufferState, GfxImageState},
    },
};
use lustre_render_graph::{RenderGraphBuilder, RgQueue};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::{
    frame_slots::FrameSlots,
    model::{Model, ModelData, Skybox, SkyboxData},
    passes::{
        CompositePass, DepthPrepass, FrameInputBindings, OitBlendPass, OitClearPass, OpaquePass, ShadowPass,
        SkyboxPass,
    },
    pipelines::RenderPipelines,
    settings::{BindlessConfig, FrameCounter, RendererSettings},
    shader_data::{
        CompositePushConstants, FramePushConstants, OitPushConstants, SkyboxPushConstants, FRAME_FLAG_HAS_SKYBOX,
    },
    swapchain_manager::SwapchainManager,
    upload::Uploader,
};

/// 一帧的相机与光源参数
pub struct FrameParams {
    pub view: Mat4,
    /// reversed-Z 投影（near/far 对调，clear 0.0 + GREATER 比较）
    pub proj: Mat4,
    pub camera_pos: Vec3,

    /// 指向光源的方向
    pub light_dir: Vec3,
    pub light_view_proj: Mat4,
}

pub struct Renderer {
    frame_counter: FrameCounter,
    frame_slots: FrameSlots,
    swapchain_manager: SwapchainManager,
    pipelines: RenderPipelines,
    uploader: Uploader,

    shadow_image: GfxImage,
    shadow_view: GfxImageView,
    shadow_sampler: GfxSampler,
    /// composite 读 HDR 用，也给 BRDF LUT 共用
    linear_clamp_sampler: GfxSampler,

    brdf_lut_image: GfxImage,
    brdf_lut_view: GfxImageView,

    /// 没有加载 skybox 时 IBL 输入退化为 1x1 黑色 cube
    fallback_skybox: Skybox,

    model: Option<Model>,
    skybox: Option<Skybox>,

    resize_requested: bool,
}

// new & init
impl Renderer {
    pub fn new(
        gfx: &Gfx,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        window_size: (u32, u32),
        shader_dir: &Path,
    ) -> Self {
        let _span = tracy_client::span!("Renderer::new");

        let bindless_config = BindlessConfig::resolve(gfx);
        let pipelines = RenderPipelines::new(gfx, shader_dir, bindless_config);
        let frame_slots = FrameSlots::new(gfx);
        let swapchain_manager = SwapchainManager::new(gfx, display_handle, window_handle, window_size);
        let uploader = Uploader::new(gfx);

        let shadow_image = GfxImage::new(
            gfx,
            &GfxImageCreateInfo::new_2d(
                vk::Extent2D {
                    width: RendererSettings::SHADOW_MAP_SIZE,
                    height: RendererSettings::SHADOW_MAP_SIZE,
                },
                RendererSettings::DEPTH_FORMAT,
                1,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ),
            "shadow-map",
        );
        let shadow_view = GfxImageView::new(
            gfx,
            shadow_image.handle(),
            GfxImageViewDesc::new_2d(RendererSettings::DEPTH_FORMAT, vk::ImageAspectFlags::DEPTH),
            "shadow-map",
        );
        let shadow_sampler = GfxSampler::new_shadow_compare(gfx, "shadow-map");
        let linear_clamp_sampler = GfxSampler::new_linear_clamp(gfx, "linear-clamp");

        let (brdf_lut_image, brdf_lut_view) = uploader.build_brdf_lut(gfx, &pipelines);
        let fallback_skybox = Self::create_fallback_skybox(gfx);

        Self {
            frame_counter: FrameCounter::new(),
            frame_slots,
            swapchain_manager,
            pipelines,
            uploader,
            shadow_image,
            shadow_view,
            shadow_sampler,
            linear_clamp_sampler,
            brdf_lut_image,
            brdf_lut_view,
            fallback_skybox,
            model: None,
            skybox: None,
            resize_requested: false,
        }
    }

    /// 1x1 黑色 cube 三件套，未加载 skybox 时占位
    fn create_fallback_skybox(gfx: &Gfx) -> Skybox {
        let make_cube = |name: &str| {
            GfxImage::new(
                gfx,
                &GfxImageCreateInfo::new_cube(
                    1,
                    RendererSettings::CUBE_STORAGE_FORMAT,
                    1,
                    vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                ),
                name,
            )
        };
        let mut environment_image = make_cube("fallback-env");
        let mut irradiance_image = make_cube("fallback-irradiance");
        let mut radiance_image = make_cube("fallback-radiance");

        gfx.one_time_exec(
            gfx.graphics_queue(),
            |cmd| {
                for image in [&mut environment_image, &mut irradiance_image, &mut radiance_image] {
                    image.transition(cmd, GfxImageState::TRANSFER_DST);
                    cmd.cmd_clear_color_image(
                        image.handle(),
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        // E5B9G9R9 的全零 bit pattern 解码为黑色
                        &vk::ClearColorValue { uint32: [0; 4] },
                        &[image.subresource_range()],
                    );
                    image.transition(cmd, GfxImageState::SHADER_READ_FRAGMENT);
                }
            },
            "fallback-skybox",
        );

        let make_view = |image: &GfxImage, name: &str| {
            GfxImageView::new(
                gfx,
                image.handle(),
                GfxImageViewDesc::new_cube(RendererSettings::CUBE_SAMPLE_FORMAT, 1)
                    .with_usage(vk::ImageUsageFlags::SAMPLED),
                name,
            )
        };
        let environment_view = make_view(&environment_image, "fallback-env");
        let irradiance_view = make_view(&irradiance_image, "fallback-irradiance");
        let radiance_view = make_view(&radiance_image, "fallback-radiance");

        Skybox {
            environment_image,
            environment_view,
            irradiance_image,
            irradiance_view,
            radiance_image,
            radiance_view,
            sampler: GfxSampler::new_linear_clamp(gfx, "fallback-skybox"),
        }
    }
}

// getters
impl Renderer {
    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

// 资产加载
impl Renderer {
    /// 替换当前模型；旧模型在 device idle 后销毁
    pub fn load_model(&mut self, gfx: &Gfx, data: &ModelData) {
        gfx.gfx_device().wait_idle();
        if let Some(old) = self.model.take() {
            old.destroy(gfx, &self.pipelines.descriptor_pool);
        }
        self.model = Some(self.uploader.load_model(gfx, &self.pipelines, data));
    }

    pub fn load_skybox(&mut self, gfx: &Gfx, data: &SkyboxData) {
        gfx.gfx_device().wait_idle();
        if let Some(old) = self.skybox.take() {
            old.destroy(gfx);
        }
        self.skybox = Some(self.uploader.load_skybox(gfx, &self.pipelines, data));
    }
}

// 帧循环
impl Renderer {
    /// 窗口尺寸变化时由事件循环调用，下一帧开始时重建 swapchain
    #[inline]
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    /// 渲染一帧
    ///
    /// `window_size` 在重建 swapchain 时轮询当前窗口尺寸。
    /// 没有加载模型时本帧跳过。
    pub fn draw_frame(&mut self, gfx: &Gfx, params: &FrameParams, mut window_size: impl FnMut() -> (u32, u32)) {
        let _span = tracy_client::span!("Renderer::draw_frame");

        if self.model.is_none() {
            return;
        }

        let label = self.frame_counter.frame_label();
        self.frame_slots.slot(label).wait_frame_done(gfx);

        if self.resize_requested {
            self.swapchain_manager.recreate(gfx, &mut window_size);
            self.resize_requested = false;
        }

        match self.swapchain_manager.swapchain_mut().acquire_next_image(gfx, self.frame_slots.slot(label).acquire_semaphore()) {
            // OUT_OF_DATE：没有 image 被获取，重建后下一帧再来
            None => {
                self.swapchain_manager.recreate(gfx, &mut window_size);
                return;
            }
            // SUBOPTIMAL：image 可用，本帧照常渲染，之后重建
            Some(true) => self.resize_requested = true,
            Some(false) => {}
        }

        let slot = self.frame_slots.slot(label);
        slot.reset(gfx);
        let cmd = slot.command_buffer();
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        cmd.begin_label(&self.frame_counter.frame_name(), LabelColor::COLOR_CMD);

        let (shadow_state, hdr_state, depth_state, head_state, swapchain_state) = {
            let model = self.model.as_ref().unwrap();
            let targets = self.swapchain_manager.targets();
            let swapchain = self.swapchain_manager.swapchain();
            let extent = swapchain.extent();
            let has_skybox = self.skybox.is_some();
            let env = self.skybox.as_ref().unwrap_or(&self.fallback_skybox);

            let view_proj = params.proj * params.view;
            let frame_push = FramePushConstants {
                vertex_buffer_addr: model.vertex_buffer.device_address(),
                material_buffer_addr: model.material_buffer.device_address(),
                view_proj,
                light_view_proj: params.light_view_proj,
                model: model.transform,
                camera_pos: params.camera_pos,
                flags: if has_skybox { FRAME_FLAG_HAS_SKYBOX } else { 0 },
                light_dir: params.light_dir,
                _pad0: 0,
            };
            // shadow pass 从光源视角渲染
            let shadow_push = FramePushConstants { view_proj: params.light_view_proj, ..frame_push };

            let mut builder = RenderGraphBuilder::new();
            let shadow = builder.import_image(
                "shadow-map",
                self.shadow_image.handle(),
                self.shadow_view.handle(),
                RendererSettings::DEPTH_FORMAT,
                self.shadow_image.state(),
            );
            let hdr = builder.import_image(
                "hdr-color",
                targets.hdr_image.handle(),
                targets.hdr_view.handle(),
                RendererSettings::COLOR_FORMAT,
                targets.hdr_image.state(),
            );
            let depth = builder.import_image(
                "main-depth",
                targets.depth_image.handle(),
                targets.depth_view.handle(),
                RendererSettings::DEPTH_FORMAT,
                targets.depth_image.state(),
            );
            let oit_head = builder.import_image(
                "oit-head",
                targets.oit_head_image.handle(),
                targets.oit_head_view.handle(),
                RendererSettings::OIT_HEAD_FORMAT,
                targets.oit_head_image.state(),
            );
            let swapchain_image = builder.import_image(
                "swapchain",
                swapchain.current_image().handle(),
                swapchain.current_image_view().handle(),
                swapchain.color_format(),
                swapchain.current_image().state(),
            );
            // buffer 没有跨帧的状态跟踪，初始状态取上一帧的最后用途；
            // 首帧 src 偏保守但无害
            let oit_nodes = builder.import_buffer(
                "oit-nodes",
                targets.oit_node_buffer.vk_buffer(),
                GfxBufferState::STORAGE_READ_COMPUTE,
            );
            let oit_counter = builder.import_buffer(
                "oit-counter",
                targets.oit_counter_buffer.vk_buffer(),
                GfxBufferState::STORAGE_READ_WRITE_FRAGMENT,
            );

            // shadow / prepass 即使 draw count 为 0 也要执行，
            // clear 后的深度是 skybox EQUAL 测试与 OIT 深度剔除的前提
            builder.add_pass(
                "shadow",
                RgQueue::Graphics,
                ShadowPass { pipelines: &self.pipelines, model, push: shadow_push, shadow_map: shadow },
            );
            builder.add_pass(
                "depth-prepass",
                RgQueue::Graphics,
                DepthPrepass { pipelines: &self.pipelines, model, push: frame_push, extent, depth },
            );
            builder.add_pass(
                "opaque",
                RgQueue::Graphics,
                OpaquePass {
                    pipelines: &self.pipelines,
                    model,
                    push: frame_push,
                    extent,
                    inputs: FrameInputBindings {
                        shadow_sampler: self.shadow_sampler.handle(),
                        irradiance_view: env.irradiance_view.handle(),
                        radiance_view: env.radiance_view.handle(),
                        env_sampler: env.sampler.handle(),
                        brdf_lut_view: self.brdf_lut_view.handle(),
                        brdf_lut_sampler: self.linear_clamp_sampler.handle(),
                    },
                    hdr_color: hdr,
                    depth,
                    shadow_map: shadow,
                },
            );
            if has_skybox {
                let mut view_no_translation = params.view;
                view_no_translation.w_axis = Vec4::W;
                builder.add_pass(
                    "skybox",
                    RgQueue::Graphics,
                    SkyboxPass {
                        pipelines: &self.pipelines,
                        push: SkyboxPushConstants {
                            view_proj_no_translation: params.proj * view_no_translation,
                        },
                        extent,
                        env_view: env.environment_view.handle(),
                        env_sampler: env.sampler.handle(),
                        hdr_color: hdr,
                        depth,
                    },
                );
            }
            builder.add_pass(
                "oit-clear",
                RgQueue::Graphics,
                OitClearPass {
                    head_image: &targets.oit_head_image,
                    counter_buffer: &targets.oit_counter_buffer,
                    head: oit_head,
                    counter: oit_counter,
                },
            );
            if model.has_blend() {
                builder.add_pass(
                    "oit-blend",
                    RgQueue::Graphics,
                    OitBlendPass {
                        pipelines: &self.pipelines,
                        model,
                        push: OitPushConstants {
                            vertex_buffer_addr: model.vertex_buffer.device_address(),
                            material_buffer_addr: model.material_buffer.device_address(),
                            node_buffer_addr: targets.oit_node_buffer.device_address(),
                            counter_buffer_addr: targets.oit_counter_buffer.device_address(),
                            view_proj,
                            model: model.transform,
                            camera_pos: params.camera_pos,
                            node_capacity: targets.oit_node_capacity,
                        },
                        extent,
                        depth,
                        head: oit_head,
                        nodes: oit_nodes,
                        counter: oit_counter,
                    },
                );
            }
            builder.add_pass(
                "composite",
                RgQueue::Graphics,
                CompositePass {
                    pipelines: &self.pipelines,
                    push: CompositePushConstants {
                        node_buffer_addr: targets.oit_node_buffer.device_address(),
                        extent: [extent.width, extent.height],
                        node_capacity: targets.oit_node_capacity,
                        _pad0: 0,
                    },
                    extent,
                    hdr_sampler: self.linear_clamp_sampler.handle(),
                    hdr_color: hdr,
                    oit_head,
                    nodes: oit_nodes,
                    swapchain_image,
                },
            );

            let graph = builder.compile();
            // 帧内的 pass 全部在 graphics queue 上，graph 保持单 segment，
            // 段间 semaphore 不参与
            debug_assert_eq!(graph.segments().len(), 1);
            for segment_index in 0..graph.segments().len() {
                graph.record_segment(cmd, segment_index);
            }

            (
                graph.final_image_state(shadow),
                graph.final_image_state(hdr),
                graph.final_image_state(depth),
                graph.final_image_state(oit_head),
                graph.final_image_state(swapchain_image),
            )
        };

        // graph 执行后的状态回写到各 image 的跟踪字段
        self.shadow_image.assume_state(shadow_state);
        {
            let targets = self.swapchain_manager.targets_mut();
            targets.hdr_image.assume_state(hdr_state);
            targets.depth_image.assume_state(depth_state);
            targets.oit_head_image.assume_state(head_state);
        }

        // present 前最后一个 barrier
        let swapchain = self.swapchain_manager.swapchain_mut();
        swapchain.current_image_mut().assume_state(swapchain_state);
        swapchain.current_image_mut().transition(cmd, GfxImageState::PRESENT);

        cmd.end_label();
        cmd.end();

        gfx.graphics_queue().submit(
            gfx,
            vec![
                GfxSubmitInfo::new(std::slice::from_ref(cmd))
                    .wait(slot.acquire_semaphore(), vk::PipelineStageFlags2::ALL_COMMANDS)
                    .signal(slot.present_semaphore(), vk::PipelineStageFlags2::ALL_COMMANDS),
            ],
            Some(slot.in_flight_fence()),
        );

        if self.swapchain_manager.swapchain().present_image(gfx, gfx.graphics_queue(), slot.present_semaphore()) {
            self.resize_requested = true;
        }

        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }
        self.frame_counter.next_frame();
    }
}

// destroy
impl Renderer {
    pub fn destroy(mut self, gfx: &Gfx) {
        gfx.gfx_device().wait_idle();

        if let Some(model) = self.model.take() {
            model.destroy(gfx, &self.pipelines.descriptor_pool);
        }
        if let Some(skybox) = self.skybox.take() {
            skybox.destroy(gfx);
        }
        self.fallback_skybox.destroy(gfx);

        self.brdf_lut_view.destroy(gfx);
        self.brdf_lut_image.destroy(gfx);
        self.linear_clamp_sampler.destroy(gfx);
        self.shadow_sampler.destroy(gfx);
        self.shadow_view.destroy(gfx);
        self.shadow_image.destroy(gfx);

        self.uploader.destroy(gfx);
        self.swapchain_manager.destroy(gfx);
        self.frame_slots.destroy(gfx);
        self.pipelines.destroy(gfx);
    }
}
