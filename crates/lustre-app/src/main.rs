//! Lustre 演示程序
//!
//! winit 事件循环 + 程序化场景。可选的 `lustre.json` 覆盖窗口尺寸
//! 与 shader 目录。

mod demo_scene;

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use lustre_gfx::gfx::Gfx;
use lustre_renderer::{FrameParams, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

/// 启动配置，`lustre.json` 里可以覆盖
struct AppConfig {
    window_width: u32,
    window_height: u32,
    shader_dir: PathBuf,
}

impl AppConfig {
    fn load() -> Self {
        let mut config = Self {
            window_width: 1280,
            window_height: 720,
            shader_dir: PathBuf::from("shaders"),
        };

        if let Ok(text) = std::fs::read_to_string("lustre.json") {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => {
                    if let Some(w) = value.get("window_width").and_then(|v| v.as_u64()) {
                        config.window_width = w as u32;
                    }
                    if let Some(h) = value.get("window_height").and_then(|v| v.as_u64()) {
                        config.window_height = h as u32;
                    }
                    if let Some(dir) = value.get("shader_dir").and_then(|v| v.as_str()) {
                        config.shader_dir = PathBuf::from(dir);
                    }
                }
                Err(e) => log::warn!("invalid lustre.json, using defaults: {e}"),
            }
        }
        config
    }
}

/// 窗口创建后才存在的渲染状态
struct RenderContext {
    window: Window,
    gfx: Gfx,
    renderer: Renderer,

    start_time: std::time::Instant,
}

struct App {
    config: AppConfig,
    context: Option<RenderContext>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self { config, context: None }
    }
}

fn frame_params(aspect: f32, elapsed: f32) -> FrameParams {
    // 相机绕场景缓慢旋转
    let angle = elapsed * 0.3;
    let camera_pos = Vec3::new(angle.cos() * 8.0, 4.0, angle.sin() * 8.0);
    let target = Vec3::new(0.0, 1.0, 0.0);
    let view = Mat4::look_at_rh(camera_pos, target, Vec3::Y);
    // reversed-Z：near/far 对调
    let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 100.0, 0.1);

    let light_dir = Vec3::new(0.4, 1.0, 0.3).normalize();
    let light_view = Mat4::look_at_rh(light_dir * 20.0, Vec3::ZERO, Vec3::Y);
    let light_proj = Mat4::orthographic_rh(-12.0, 12.0, -12.0, 12.0, 40.0, 0.1);

    FrameParams {
        view,
        proj,
        camera_pos,
        light_dir,
        light_view_proj: light_proj * light_view,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.context.is_some() {
            return;
        }

        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Lustre")
                    .with_inner_size(LogicalSize::new(self.config.window_width, self.config.window_height)),
            )
            .expect("failed to create window");

        let display_handle = window.display_handle().unwrap().as_raw();
        let window_handle = window.window_handle().unwrap().as_raw();
        let size = window.inner_size();

        let gfx = Gfx::new("lustre", display_handle);
        let mut renderer =
            Renderer::new(&gfx, display_handle, window_handle, (size.width, size.height), &self.config.shader_dir);

        renderer.load_model(&gfx, &demo_scene::build_model());
        renderer.load_skybox(&gfx, &demo_scene::build_skybox());

        self.context = Some(RenderContext {
            window,
            gfx,
            renderer,
            start_time: std::time::Instant::now(),
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(context) = &mut self.context else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.logical_key == Key::Named(NamedKey::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(_) => {
                context.renderer.request_resize();
            }
            WindowEvent::RedrawRequested => {
                let size = context.window.inner_size();
                let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
                let params = frame_params(aspect, context.start_time.elapsed().as_secs_f32());

                let window = &context.window;
                context.renderer.draw_frame(&context.gfx, &params, || {
                    let size = window.inner_size();
                    (size.width, size.height)
                });
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(context) = &self.context {
            context.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(context) = self.context.take() {
            context.renderer.destroy(&context.gfx);
            context.gfx.destroy();
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new().expect("failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(AppConfig::load());
    event_loop.run_app(&mut app).expect("event loop error");
}
