use ash::vk;
use ash::vk::Handle;
use std::ptr;

use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    debug_name: String,

    _usage: vk::BufferUsageFlags,
}

impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// init & destroy
impl GfxBuffer {
    /// buffer 默认在三个 queue family 间 CONCURRENT 共享
    ///
    /// - mem_map: host 可见并持久映射，用于 staging 或 CPU 每帧写入
    /// - 优先使用 device memory
    pub fn new(
        gfx: &Gfx,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> Self {
        let queue_family_indices = gfx.all_queue_family_indices();
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(&queue_family_indices);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let (buffer, mut alloc) = unsafe { gfx.allocator().create_buffer(&buffer_ci, &alloc_ci).unwrap() };

        let mut mapped_ptr = None;
        if mem_map {
            unsafe {
                mapped_ptr = Some(gfx.allocator().map_memory(&mut alloc).unwrap());
            }
        }

        // device address 在创建时解析一次，生命周期内保持不变
        let mut device_addr = None;
        if buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            unsafe {
                device_addr = Some(
                    gfx.gfx_device()
                        .get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer)),
                );
            }
        }

        gfx.gfx_device().set_object_debug_name(buffer, format!("Buffer::{}", name.as_ref()));
        Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr: mapped_ptr,
            device_addr,

            debug_name: name.as_ref().to_string(),

            _usage: buffer_usage,
        }
    }

    #[inline]
    pub fn new_stage_buffer(gfx: &Gfx, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> Self {
        Self::new(gfx, size, vk::BufferUsageFlags::TRANSFER_SRC, true, debug_name)
    }
}

// destroy
impl GfxBuffer {
    pub fn destroy(mut self, gfx: &Gfx) {
        self.destroy_mut(gfx);
    }

    pub fn destroy_mut(&mut self, gfx: &Gfx) {
        log::debug!("Destroying GfxBuffer: {}", self.debug_name);
        unsafe {
            if self.map_ptr.take().is_some() {
                gfx.allocator().unmap_memory(&mut self.allocation);
            }
            gfx.allocator().destroy_buffer(self.handle, &mut self.allocation);
        }
        self.handle = vk::Buffer::null();
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null());
    }
}

// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_addr.expect(
            "Buffer does not have device address, please make sure the buffer usage contains SHADER_DEVICE_ADDRESS",
        )
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

// tools
impl GfxBuffer {
    #[inline]
    pub fn mapped_ptr(&self) -> *mut u8 {
        self.map_ptr.expect("Buffer is not mapped, create it with mem_map before using mapped_ptr()")
    }

    #[inline]
    pub fn flush(&self, gfx: &Gfx, offset: vk::DeviceSize, size: vk::DeviceSize) {
        gfx.allocator().flush_allocation(&self.allocation, offset, size).unwrap();
    }

    /// 通过 mem map 的方式将 data 传入到 buffer 中
    pub fn transfer_data_by_mmap<T>(&self, gfx: &Gfx, data: &[T])
    where
        T: Sized + Copy,
    {
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr() as *const u8, self.mapped_ptr(), size_of_val(data));
        }
        gfx.allocator().flush_allocation(&self.allocation, 0, size_of_val(data) as vk::DeviceSize).unwrap();
    }
}
