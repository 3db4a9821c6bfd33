//! Pass 定义与构建器
//!
//! `RgPass` 分 setup/execute 两个阶段：setup 声明资源的读写集合与
//! 目标状态，execute 在 barrier 已经就位后录制命令。

use ash::vk;
use lustre_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    resources::state::{GfxBufferState, GfxImageState},
};
use slotmap::SecondaryMap;

use crate::handle::{RgBufferHandle, RgImageHandle};

/// pass 所在的执行队列
///
/// 同一 queue 上连续的 pass 合并为一个 segment，跨 queue 的相邻
/// segment 之间插入 semaphore
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgQueue {
    Graphics,
    Compute,
    Transfer,
}

/// Pass 执行时的上下文
pub struct RgPassContext<'a> {
    pub cmd: &'a GfxCommandBuffer,

    pub(crate) images: &'a SecondaryMap<RgImageHandle, (vk::Image, vk::ImageView)>,
    pub(crate) buffers: &'a SecondaryMap<RgBufferHandle, vk::Buffer>,
}

impl RgPassContext<'_> {
    #[inline]
    pub fn image(&self, handle: RgImageHandle) -> vk::Image {
        self.images[handle].0
    }

    #[inline]
    pub fn image_view(&self, handle: RgImageHandle) -> vk::ImageView {
        self.images[handle].1
    }

    #[inline]
    pub fn buffer(&self, handle: RgBufferHandle) -> vk::Buffer {
        self.buffers[handle]
    }
}

/// 在 `RgPass::setup()` 中声明资源依赖
pub struct RgPassBuilder {
    pub(crate) image_reads: Vec<(RgImageHandle, GfxImageState)>,
    pub(crate) image_writes: Vec<(RgImageHandle, GfxImageState)>,
    pub(crate) buffer_reads: Vec<(RgBufferHandle, GfxBufferState)>,
    pub(crate) buffer_writes: Vec<(RgBufferHandle, GfxBufferState)>,
}

impl RgPassBuilder {
    pub(crate) fn new() -> Self {
        Self {
            image_reads: Vec::new(),
            image_writes: Vec::new(),
            buffer_reads: Vec::new(),
            buffer_writes: Vec::new(),
        }
    }

    #[inline]
    pub fn read_image(&mut self, handle: RgImageHandle, state: GfxImageState) -> RgImageHandle {
        self.image_reads.push((handle, state));
        handle
    }

    pub fn write_image(&mut self, handle: RgImageHandle, state: GfxImageState) -> RgImageHandle {
        self.image_writes.push((handle, state));
        handle
    }

    /// 读写同一 image（attachment 的 load + store、原子累积）
    pub fn read_write_image(&mut self, handle: RgImageHandle, state: GfxImageState) -> RgImageHandle {
        self.read_image(handle, state);
        self.write_image(handle, state)
    }

    #[inline]
    pub fn read_buffer(&mut self, handle: RgBufferHandle, state: GfxBufferState) -> RgBufferHandle {
        self.buffer_reads.push((handle, state));
        handle
    }

    pub fn write_buffer(&mut self, handle: RgBufferHandle, state: GfxBufferState) -> RgBufferHandle {
        self.buffer_writes.push((handle, state));
        handle
    }
}

/// 渲染图中的一个 pass
///
/// pass 可以借用外部资源（pipeline、几何数据），
/// 生命周期由 `RenderGraphBuilder` 的生命周期参数约束。
pub trait RgPass {
    /// 声明读写的资源与目标状态
    fn setup(&mut self, builder: &mut RgPassBuilder);

    /// 录制渲染命令；调用时 barrier 已经就位
    fn execute(&self, ctx: &RgPassContext<'_>);
}

/// Pass 节点（编译后使用）
pub struct RgPassNode<'a> {
    pub name: String,
    pub queue: RgQueue,

    pub image_reads: Vec<(RgImageHandle, GfxImageState)>,
    pub image_writes: Vec<(RgImageHandle, GfxImageState)>,
    pub buffer_reads: Vec<(RgBufferHandle, GfxBufferState)>,
    pub buffer_writes: Vec<(RgBufferHandle, GfxBufferState)>,

    pub(crate) pass: Box<dyn RgPass + 'a>,
}
