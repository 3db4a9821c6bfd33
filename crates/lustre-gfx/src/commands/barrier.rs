use ash::vk;

/// builder 风格的 image barrier 封装，基于 synchronization2
///
/// 默认覆盖整个 image（所有 mip 和 layer）
#[derive(Clone)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2 {
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                },
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }

    #[inline]
    pub fn src_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = stage;
        self.inner.src_access_mask = access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = stage;
        self.inner.dst_access_mask = access;
        self
    }

    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    #[inline]
    pub fn image_aspect_flag(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect;
        self
    }

    /// 限定 barrier 作用的 mip 范围，mip 生成时使用
    #[inline]
    pub fn mip_range(mut self, base: u32, count: u32) -> Self {
        self.inner.subresource_range.base_mip_level = base;
        self.inner.subresource_range.level_count = count;
        self
    }

    #[inline]
    pub fn layer_range(mut self, base: u32, count: u32) -> Self {
        self.inner.subresource_range.base_array_layer = base;
        self.inner.subresource_range.layer_count = count;
        self
    }

    #[inline]
    pub fn barrier(&self) -> vk::ImageMemoryBarrier2<'static> {
        self.inner
    }
}

/// builder 风格的 buffer barrier 封装
#[derive(Clone)]
pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}

impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2 {
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                size: vk::WHOLE_SIZE,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.inner.buffer = buffer;
        self.inner.offset = offset;
        self.inner.size = size;
        self
    }

    #[inline]
    pub fn src_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = stage;
        self.inner.src_access_mask = access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = stage;
        self.inner.dst_access_mask = access;
        self
    }

    #[inline]
    pub fn barrier(&self) -> vk::BufferMemoryBarrier2<'static> {
        self.inner
    }
}
