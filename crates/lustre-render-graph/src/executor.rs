//! RenderGraph 构建器与编译结果
//!
//! `RenderGraphBuilder` 每帧重新构建；`compile()` 完成依赖分析、
//! 拓扑排序、barrier 计算与 queue 分段，得到可录制的 `CompiledGraph`。

use std::{collections::HashMap, ops::Range};

use ash::vk;
use itertools::Itertools;
use lustre_gfx::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_buffer::GfxCommandBuffer,
    },
    resources::state::{GfxBufferState, GfxImageState},
};
use slotmap::SecondaryMap;

use crate::{
    barrier::{BufferBarrierDesc, ImageBarrierDesc, PassBarriers},
    graph::DependencyGraph,
    handle::{RgBufferHandle, RgImageHandle},
    pass::{RgPass, RgPassBuilder, RgPassContext, RgPassNode, RgQueue},
    resource::{RgBufferResource, RgImageResource, RgResourceRegistry},
};

/// 同一 queue 上连续执行的一段 pass
///
/// 相邻 segment 之间各有一个 binary semaphore：
/// 第 i 段结束时 signal 第 i 个，第 i+1 段开始前 wait 第 i 个。
/// semaphore 由调用者按 `CompiledGraph::semaphore_count()` 分配，
/// 这里只给出索引。单 queue 的 graph 只有一个 segment，不需要 semaphore。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgSegment {
    pub queue: RgQueue,
    /// 在 execution order 中的区间
    pub pass_range: Range<usize>,
    /// 提交前 wait 的段间 semaphore 索引，首段为 None
    pub wait_semaphore: Option<usize>,
    /// 提交时 signal 的段间 semaphore 索引，末段为 None
    pub signal_semaphore: Option<usize>,
}

pub struct RenderGraphBuilder<'a> {
    resources: RgResourceRegistry,
    passes: Vec<RgPassNode<'a>>,
}

impl Default for RenderGraphBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraphBuilder<'a> {
    pub fn new() -> Self {
        Self {
            resources: RgResourceRegistry::new(),
            passes: Vec::new(),
        }
    }

    /// 导入外部 image
    ///
    /// `initial_state` 必须与 image 的实际状态一致，
    /// 调用者从 `GfxImage::state()` 取得
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        view: vk::ImageView,
        format: vk::Format,
        initial_state: GfxImageState,
    ) -> RgImageHandle {
        self.resources.register_image(RgImageResource {
            name: name.into(),
            image,
            view,
            format,
            initial_state,
        })
    }

    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        initial_state: GfxBufferState,
    ) -> RgBufferHandle {
        self.resources.register_buffer(RgBufferResource {
            name: name.into(),
            buffer,
            initial_state,
        })
    }

    pub fn add_pass<P: RgPass + 'a>(&mut self, name: impl Into<String>, queue: RgQueue, mut pass: P) -> &mut Self {
        let mut builder = RgPassBuilder::new();
        pass.setup(&mut builder);

        self.passes.push(RgPassNode {
            name: name.into(),
            queue,
            image_reads: builder.image_reads,
            image_writes: builder.image_writes,
            buffer_reads: builder.buffer_reads,
            buffer_writes: builder.buffer_writes,
            pass: Box::new(pass),
        });
        self
    }

    /// 依赖分析 + 拓扑排序 + barrier 计算 + queue 分段
    ///
    /// # Panics
    /// 检测到循环依赖时 panic，并列出参与循环的 pass 名称
    pub fn compile(self) -> CompiledGraph<'a> {
        let _span = tracy_client::span!("RenderGraphBuilder::compile");

        let pass_count = self.passes.len();

        let image_reads = self.passes.iter().map(|p| p.image_reads.iter().map(|s| s.0).collect_vec()).collect_vec();
        let image_writes = self.passes.iter().map(|p| p.image_writes.iter().map(|s| s.0).collect_vec()).collect_vec();
        let buffer_reads = self.passes.iter().map(|p| p.buffer_reads.iter().map(|s| s.0).collect_vec()).collect_vec();
        let buffer_writes =
            self.passes.iter().map(|p| p.buffer_writes.iter().map(|s| s.0).collect_vec()).collect_vec();

        let dep_graph =
            DependencyGraph::analyze(pass_count, &image_reads, &image_writes, &buffer_reads, &buffer_writes);

        let execution_order = dep_graph.topological_sort().unwrap_or_else(|cycle| {
            let cycle_names = cycle.iter().map(|&i| self.passes[i].name.as_str()).collect_vec();
            panic!("render graph cycle detected involving passes: {cycle_names:?}");
        });

        let (barriers, final_image_states) = self.compute_barriers(&execution_order);
        let segments = Self::build_segments(&self.passes, &execution_order);

        // 导入资源的物理 handle 查询表
        let mut images = SecondaryMap::new();
        let mut buffers = SecondaryMap::new();
        for (handle, res) in self.resources.iter_images() {
            images.insert(handle, (res.image, res.view));
        }
        for (handle, res) in self.resources.iter_buffers() {
            buffers.insert(handle, res.buffer);
        }

        CompiledGraph {
            resources: self.resources,
            passes: self.passes,
            execution_order,
            barriers,
            segments,
            final_image_states,
            images,
            buffers,
        }
    }

    /// 模拟执行顺序，跟踪每个资源的状态并生成 barrier
    ///
    /// 同时得到每个 image 在 graph 执行完后的最终状态，
    /// 调用者用它回写 `GfxImage::assume_state`
    fn compute_barriers(
        &self,
        execution_order: &[usize],
    ) -> (Vec<PassBarriers>, SecondaryMap<RgImageHandle, GfxImageState>) {
        let mut barriers = vec![PassBarriers::new(); self.passes.len()];

        let mut image_states: SecondaryMap<RgImageHandle, GfxImageState> = SecondaryMap::new();
        let mut buffer_states: SecondaryMap<RgBufferHandle, GfxBufferState> = SecondaryMap::new();
        for (handle, res) in self.resources.iter_images() {
            image_states.insert(handle, res.initial_state);
        }
        for (handle, res) in self.resources.iter_buffers() {
            buffer_states.insert(handle, res.initial_state);
        }

        for &pass_idx in execution_order {
            let pass = &self.passes[pass_idx];
            let pass_barriers = &mut barriers[pass_idx];

            // 同一 pass 中读写并存时，写入状态优先
            let mut image_usage: HashMap<RgImageHandle, (bool, GfxImageState)> = HashMap::new();
            for (handle, state) in &pass.image_reads {
                image_usage.entry(*handle).or_insert((false, *state));
            }
            for (handle, state) in &pass.image_writes {
                image_usage.insert(*handle, (true, *state));
            }

            for (handle, (is_write, required_state)) in image_usage {
                let current_state = image_states[handle];
                let aspect = self.resources.image(handle).aspect();

                pass_barriers.add_image_barrier(
                    ImageBarrierDesc::new(handle, current_state, required_state).with_aspect(aspect),
                );

                if is_write || current_state.layout != required_state.layout {
                    image_states.insert(handle, required_state);
                }
            }

            let mut buffer_usage: HashMap<RgBufferHandle, (bool, GfxBufferState)> = HashMap::new();
            for (handle, state) in &pass.buffer_reads {
                buffer_usage.entry(*handle).or_insert((false, *state));
            }
            for (handle, state) in &pass.buffer_writes {
                buffer_usage.insert(*handle, (true, *state));
            }

            for (handle, (is_write, required_state)) in buffer_usage {
                let current_state = buffer_states[handle];
                pass_barriers.add_buffer_barrier(BufferBarrierDesc::new(handle, current_state, required_state));

                if is_write {
                    buffer_states.insert(handle, required_state);
                }
            }
        }

        (barriers, image_states)
    }

    /// 按执行顺序把连续同 queue 的 pass 合并为 segment，
    /// 并在相邻 segment 之间连上 semaphore 边
    fn build_segments(passes: &[RgPassNode], execution_order: &[usize]) -> Vec<RgSegment> {
        let mut segments: Vec<RgSegment> = Vec::new();
        for (pos, &pass_idx) in execution_order.iter().enumerate() {
            let queue = passes[pass_idx].queue;
            match segments.last_mut() {
                Some(segment) if segment.queue == queue => {
                    segment.pass_range.end = pos + 1;
                }
                _ => segments.push(RgSegment {
                    queue,
                    pass_range: pos..pos + 1,
                    wait_semaphore: None,
                    signal_semaphore: None,
                }),
            }
        }

        // 第 i 段 signal 第 i 个 semaphore，第 i+1 段 wait 它
        let count = segments.len();
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.wait_semaphore = (i > 0).then(|| i - 1);
            segment.signal_semaphore = (i + 1 < count).then_some(i);
        }
        segments
    }
}

/// 编译后的渲染图
///
/// 调用者按 `segments()` 的顺序，为每个 segment 录制一个 command buffer
/// 并按段间 semaphore 提交到对应的 queue。
pub struct CompiledGraph<'a> {
    resources: RgResourceRegistry,
    passes: Vec<RgPassNode<'a>>,
    execution_order: Vec<usize>,
    /// 按 pass 索引存放
    barriers: Vec<PassBarriers>,
    segments: Vec<RgSegment>,
    final_image_states: SecondaryMap<RgImageHandle, GfxImageState>,

    images: SecondaryMap<RgImageHandle, (vk::Image, vk::ImageView)>,
    buffers: SecondaryMap<RgBufferHandle, vk::Buffer>,
}

// getters
impl CompiledGraph<'_> {
    #[inline]
    pub fn segments(&self) -> &[RgSegment] {
        &self.segments
    }

    /// 段间 binary semaphore 的数量，调用者按此分配后对照
    /// `RgSegment` 上的索引提交
    #[inline]
    pub fn semaphore_count(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    #[inline]
    pub fn execution_order(&self) -> &[usize] {
        &self.execution_order
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, index: usize) -> &str {
        &self.passes[index].name
    }

    /// image 在 graph 执行完之后的状态
    #[inline]
    pub fn final_image_state(&self, handle: RgImageHandle) -> GfxImageState {
        self.final_image_states[handle]
    }

    pub fn final_image_states(&self) -> impl Iterator<Item = (RgImageHandle, GfxImageState)> + '_ {
        self.final_image_states.iter().map(|(h, s)| (h, *s))
    }

    pub(crate) fn pass_barriers(&self, pass_idx: usize) -> &PassBarriers {
        &self.barriers[pass_idx]
    }
}

// tools
impl CompiledGraph<'_> {
    /// 录制一个 segment：逐 pass 插入 barrier 并执行
    ///
    /// cmd 必须已经 begin，且其 queue family 与 segment 的 queue 匹配
    pub fn record_segment(&self, cmd: &GfxCommandBuffer, segment_index: usize) {
        let _span = tracy_client::span!("CompiledGraph::record_segment");

        let segment = &self.segments[segment_index];
        for pos in segment.pass_range.clone() {
            let pass_idx = self.execution_order[pos];
            let pass = &self.passes[pass_idx];

            self.record_barriers(cmd, &self.barriers[pass_idx]);

            cmd.begin_label(&pass.name, LabelColor::COLOR_PASS);
            let ctx = RgPassContext {
                cmd,
                images: &self.images,
                buffers: &self.buffers,
            };
            pass.pass.execute(&ctx);
            cmd.end_label();
        }
    }

    fn record_barriers(&self, cmd: &GfxCommandBuffer, pass_barriers: &PassBarriers) {
        if !pass_barriers.has_barriers() {
            return;
        }

        let image_barriers: Vec<GfxImageBarrier> = pass_barriers
            .image_barriers
            .iter()
            .map(|desc| desc.to_gfx_barrier(self.images[desc.handle].0))
            .collect_vec();
        if !image_barriers.is_empty() {
            cmd.image_memory_barrier(vk::DependencyFlags::empty(), &image_barriers);
        }

        let buffer_barriers: Vec<GfxBufferBarrier> = pass_barriers
            .buffer_barriers
            .iter()
            .map(|desc| desc.to_gfx_barrier(self.buffers[desc.handle]))
            .collect_vec();
        if !buffer_barriers.is_empty() {
            cmd.buffer_memory_barrier(vk::DependencyFlags::empty(), &buffer_barriers);
        }
    }

    /// 打印执行计划，调试用
    pub fn print_execution_plan(&self) {
        log::info!(
            "render graph: {} passes, {} segments, order: [{}]",
            self.passes.len(),
            self.segments.len(),
            self.execution_order.iter().map(|&i| self.passes[i].name.as_str()).join(", ")
        );
        for (seg_idx, segment) in self.segments.iter().enumerate() {
            log::info!("  segment {} on {:?}:", seg_idx, segment.queue);
            for pos in segment.pass_range.clone() {
                let pass_idx = self.execution_order[pos];
                let pass = &self.passes[pass_idx];
                let barriers = &self.barriers[pass_idx];
                log::info!(
                    "    [{}] \"{}\" ({} image barriers, {} buffer barriers)",
                    pos,
                    pass.name,
                    barriers.image_barriers.len(),
                    barriers.buffer_barriers.len()
                );
                for barrier in &barriers.image_barriers {
                    log::info!(
                        "      image \"{}\": {:?} -> {:?}",
                        self.resources.image(barrier.handle).name,
                        barrier.src_state.layout,
                        barrier.dst_state.layout
                    );
                }
                for barrier in &barriers.buffer_barriers {
                    log::info!(
                        "      buffer \"{}\": {:?} -> {:?}",
                        self.resources.buffer(barrier.handle).name,
                        barrier.src_state.access,
                        barrier.dst_state.access
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 只声明依赖、不录制命令的测试 pass
    struct DeclPass {
        image_reads: Vec<(RgImageHandle, GfxImageState)>,
        image_writes: Vec<(RgImageHandle, GfxImageState)>,
        buffer_reads: Vec<(RgBufferHandle, GfxBufferState)>,
        buffer_writes: Vec<(RgBufferHandle, GfxBufferState)>,
    }

    impl DeclPass {
        fn new() -> Self {
            Self {
                image_reads: Vec::new(),
                image_writes: Vec::new(),
                buffer_reads: Vec::new(),
                buffer_writes: Vec::new(),
            }
        }

        fn reads_image(mut self, handle: RgImageHandle, state: GfxImageState) -> Self {
            self.image_reads.push((handle, state));
            self
        }

        fn writes_image(mut self, handle: RgImageHandle, state: GfxImageState) -> Self {
            self.image_writes.push((handle, state));
            self
        }

        fn reads_buffer(mut self, handle: RgBufferHandle, state: GfxBufferState) -> Self {
            self.buffer_reads.push((handle, state));
            self
        }

        fn writes_buffer(mut self, handle: RgBufferHandle, state: GfxBufferState) -> Self {
            self.buffer_writes.push((handle, state));
            self
        }
    }

    impl RgPass for DeclPass {
        fn setup(&mut self, builder: &mut RgPassBuilder) {
            for (handle, state) in &self.image_reads {
                builder.read_image(*handle, *state);
            }
            for (handle, state) in &self.image_writes {
                builder.write_image(*handle, *state);
            }
            for (handle, state) in &self.buffer_reads {
                builder.read_buffer(*handle, *state);
            }
            for (handle, state) in &self.buffer_writes {
                builder.write_buffer(*handle, *state);
            }
        }

        fn execute(&self, _ctx: &RgPassContext<'_>) {
            unreachable!("tests never record commands");
        }
    }

    fn import_test_image(builder: &mut RenderGraphBuilder, name: &str) -> RgImageHandle {
        builder.import_image(
            name,
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Format::R16G16B16A16_SFLOAT,
            GfxImageState::UNDEFINED,
        )
    }

    #[test]
    fn single_queue_collapses_to_one_segment() {
        let mut builder = RenderGraphBuilder::new();
        let img = import_test_image(&mut builder, "hdr");

        builder.add_pass(
            "write",
            RgQueue::Graphics,
            DeclPass::new().writes_image(img, GfxImageState::COLOR_ATTACHMENT_WRITE),
        );
        builder.add_pass(
            "read",
            RgQueue::Graphics,
            DeclPass::new().reads_image(img, GfxImageState::SHADER_READ_FRAGMENT),
        );

        let compiled = builder.compile();
        assert_eq!(
            compiled.segments(),
            &[RgSegment {
                queue: RgQueue::Graphics,
                pass_range: 0..2,
                wait_semaphore: None,
                signal_semaphore: None,
            }]
        );
        assert_eq!(compiled.semaphore_count(), 0);
    }

    #[test]
    fn queue_change_splits_segments() {
        let mut builder = RenderGraphBuilder::new();
        let img = import_test_image(&mut builder, "sky");

        builder.add_pass(
            "upload",
            RgQueue::Transfer,
            DeclPass::new().writes_image(img, GfxImageState::TRANSFER_DST),
        );
        builder.add_pass(
            "mips",
            RgQueue::Compute,
            DeclPass::new().writes_image(img, GfxImageState::STORAGE_WRITE_COMPUTE),
        );
        builder.add_pass(
            "draw",
            RgQueue::Graphics,
            DeclPass::new().reads_image(img, GfxImageState::SHADER_READ_FRAGMENT),
        );

        let compiled = builder.compile();
        let segments = compiled.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].queue, RgQueue::Transfer);
        assert_eq!(segments[1].queue, RgQueue::Compute);
        assert_eq!(segments[2].queue, RgQueue::Graphics);
        assert_eq!(segments[0].pass_range, 0..1);
        assert_eq!(segments[2].pass_range, 2..3);

        // 相邻 segment 两两一个 semaphore：0 signal→1 wait，1 signal→2 wait
        assert_eq!(compiled.semaphore_count(), 2);
        assert_eq!(segments[0].wait_semaphore, None);
        assert_eq!(segments[0].signal_semaphore, Some(0));
        assert_eq!(segments[1].wait_semaphore, Some(0));
        assert_eq!(segments[1].signal_semaphore, Some(1));
        assert_eq!(segments[2].wait_semaphore, Some(1));
        assert_eq!(segments[2].signal_semaphore, None);
    }

    #[test]
    fn state_walk_generates_and_elides_barriers() {
        let mut builder = RenderGraphBuilder::new();
        let img = import_test_image(&mut builder, "hdr");

        builder.add_pass(
            "draw",
            RgQueue::Graphics,
            DeclPass::new().writes_image(img, GfxImageState::COLOR_ATTACHMENT_WRITE),
        );
        builder.add_pass(
            "post",
            RgQueue::Graphics,
            DeclPass::new().reads_image(img, GfxImageState::SHADER_READ_FRAGMENT),
        );
        builder.add_pass(
            "resample",
            RgQueue::Graphics,
            DeclPass::new().reads_image(img, GfxImageState::SHADER_READ_COMPUTE),
        );

        let compiled = builder.compile();
        let order = compiled.execution_order().to_vec();
        assert_eq!(order, vec![0, 1, 2]);

        // UNDEFINED -> COLOR_ATTACHMENT_WRITE
        assert_eq!(compiled.pass_barriers(0).image_barriers.len(), 1);
        // COLOR_ATTACHMENT_WRITE -> SHADER_READ
        assert_eq!(compiled.pass_barriers(1).image_barriers.len(), 1);
        // 只读到只读、同 layout：省略
        assert_eq!(compiled.pass_barriers(2).image_barriers.len(), 0);
    }

    #[test]
    fn final_image_state_reflects_last_use() {
        let mut builder = RenderGraphBuilder::new();
        let img = import_test_image(&mut builder, "hdr");

        builder.add_pass(
            "draw",
            RgQueue::Graphics,
            DeclPass::new().writes_image(img, GfxImageState::COLOR_ATTACHMENT_WRITE),
        );
        builder.add_pass(
            "post",
            RgQueue::Graphics,
            DeclPass::new().reads_image(img, GfxImageState::SHADER_READ_FRAGMENT),
        );

        let compiled = builder.compile();
        assert_eq!(compiled.final_image_state(img), GfxImageState::SHADER_READ_FRAGMENT);
    }

    #[test]
    fn buffer_barrier_targets_last_writer() {
        let mut builder = RenderGraphBuilder::new();
        let buf = builder.import_buffer("indirect", vk::Buffer::null(), GfxBufferState::UNDEFINED);

        builder.add_pass(
            "cull",
            RgQueue::Graphics,
            DeclPass::new().writes_buffer(buf, GfxBufferState::STORAGE_READ_WRITE_COMPUTE),
        );
        // 中间一个不接触 buffer 的 pass
        builder.add_pass("unrelated", RgQueue::Graphics, DeclPass::new());
        builder.add_pass(
            "draw",
            RgQueue::Graphics,
            DeclPass::new().reads_buffer(buf, GfxBufferState::INDIRECT_BUFFER),
        );

        let compiled = builder.compile();
        assert_eq!(compiled.pass_barriers(1).buffer_barriers.len(), 0);

        let draw_barriers = &compiled.pass_barriers(2).buffer_barriers;
        assert_eq!(draw_barriers.len(), 1);
        assert_eq!(draw_barriers[0].src_state, GfxBufferState::STORAGE_READ_WRITE_COMPUTE);
        assert_eq!(draw_barriers[0].dst_state, GfxBufferState::INDIRECT_BUFFER);
    }

}
