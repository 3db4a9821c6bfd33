//! Lustre 渲染器
//!
//! 在 lustre-gfx 与 lustre-render-graph 之上实现完整的帧循环：
//! 资源上传（transfer/compute 跨 queue）、阴影、深度预通道、
//! 不透明 PBR、天空盒、OIT 半透明与 compute 合成。

pub mod frame_slots;
pub mod model;
pub mod passes;
pub mod pipelines;
pub mod renderer;
pub mod settings;
pub mod shader_data;
pub mod swapchain_manager;
pub mod upload;

pub use renderer::{FrameParams, Renderer};
