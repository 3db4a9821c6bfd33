use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        fence::GfxFence, submit_info::GfxSubmitInfo,
    },
    foundation::{
        debug_messenger::GfxDebugMsger,
        device::GfxDevice,
        instance::GfxInstance,
        physical_device::{self, GfxPhysicalDevice},
    },
};

/// Gfx 上下文
///
/// 持有 Vulkan 的全部基础对象：instance、physical device、device、
/// 三个 command queue 以及 VMA allocator。
///
/// 整个应用只创建一个 `Gfx`，所有需要设备的对象都通过 `&Gfx` 显式传入，
/// 不存在全局可变状态。
pub struct Gfx {
    _vk_entry: ash::Entry,
    instance: GfxInstance,
    debug_msger: Option<GfxDebugMsger>,
    physical_device: GfxPhysicalDevice,
    gfx_device: GfxDevice,

    /// 图形队列：GRAPHICS
    graphics_queue: GfxCommandQueue,
    /// 计算队列：COMPUTE，排除 GRAPHICS
    compute_queue: GfxCommandQueue,
    /// 传输队列：TRANSFER，排除 GRAPHICS 和 COMPUTE
    transfer_queue: GfxCommandQueue,

    /// [graphics, compute, transfer] 的 family index，CONCURRENT 共享时使用
    queue_family_indices: [u32; 3],

    vm_allocator: Option<vk_mem::Allocator>,
}

// new & init
impl Gfx {
    pub fn new(app_name: &str, raw_display_handle: raw_window_handle::RawDisplayHandle) -> Self {
        let _span = tracy_client::span!("Gfx::new");

        let vk_entry = unsafe { ash::Entry::load().unwrap() };
        let instance = GfxInstance::new(&vk_entry, app_name, raw_display_handle);
        let debug_msger = GfxDebugMsger::new(&vk_entry, &instance.ash_instance);
        let physical_device = GfxPhysicalDevice::new(&instance.ash_instance);

        // 三类队列分属不同的 queue family，跨队列资源使用 CONCURRENT 共享
        let graphics_family = physical_device
            .find_queue_family(vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty())
            .unwrap_or_else(|| panic!("no graphics queue family"));
        let compute_family = physical_device
            .find_queue_family(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS)
            .unwrap_or_else(|| panic!("no dedicated compute queue family"));
        let transfer_family = physical_device
            .find_queue_family(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            .unwrap_or_else(|| panic!("no dedicated transfer queue family"));
        log::info!(
            "queue families: graphics={}, compute={}, transfer={}",
            graphics_family,
            compute_family,
            transfer_family
        );

        // 启动时校验必要的 memory type 存在
        physical_device
            .find_memory_type(u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap_or_else(|| panic!("no device local memory type"));
        physical_device
            .find_memory_type(
                u32::MAX,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )
            .unwrap_or_else(|| panic!("no host visible coherent memory type"));

        let queue_priorities = [1.0_f32];
        let queue_create_infos = physical_device::build_queue_create_infos(
            &[graphics_family, compute_family, transfer_family],
            &queue_priorities,
        );
        let gfx_device = GfxDevice::new(&instance.ash_instance, physical_device.vk_handle, &queue_create_infos);

        let graphics_queue = GfxCommandQueue::new(&gfx_device, graphics_family, "graphics");
        let compute_queue = GfxCommandQueue::new(&gfx_device, compute_family, "compute");
        let transfer_queue = GfxCommandQueue::new(&gfx_device, transfer_family, "transfer");

        let mut allocator_ci =
            vk_mem::AllocatorCreateInfo::new(&instance.ash_instance, &gfx_device.device, physical_device.vk_handle);
        allocator_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
        let vm_allocator = unsafe { vk_mem::Allocator::new(allocator_ci).unwrap() };

        Self {
            _vk_entry: vk_entry,
            instance,
            debug_msger: Some(debug_msger),
            physical_device,
            gfx_device,
            graphics_queue,
            compute_queue,
            transfer_queue,
            queue_family_indices: [graphics_family, compute_family, transfer_family],
            vm_allocator: Some(vm_allocator),
        }
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self._vk_entry
    }
    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }
    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }
    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_device
    }
    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        self.vm_allocator.as_ref().unwrap()
    }

    #[inline]
    pub fn graphics_queue(&self) -> &GfxCommandQueue {
        &self.graphics_queue
    }
    #[inline]
    pub fn compute_queue(&self) -> &GfxCommandQueue {
        &self.compute_queue
    }
    #[inline]
    pub fn transfer_queue(&self) -> &GfxCommandQueue {
        &self.transfer_queue
    }

    /// 资源创建时用于 CONCURRENT 共享的三个 queue family
    #[inline]
    pub fn all_queue_family_indices(&self) -> [u32; 3] {
        self.queue_family_indices
    }

    /// 同上，slice 形式，直接填入 create info
    #[inline]
    pub fn concurrent_queue_family_indices(&self) -> &[u32] {
        &self.queue_family_indices
    }
}

// tools
impl Gfx {
    /// 在指定 queue 上同步执行一段一次性命令
    ///
    /// 会阻塞等待 queue 执行完成，仅用于初始化等低频路径
    pub fn one_time_exec(&self, queue: &GfxCommandQueue, f: impl FnOnce(&GfxCommandBuffer), name: impl AsRef<str>) {
        let pool = GfxCommandPool::new(
            self,
            queue.family_index(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            &format!("one-time-{}", name.as_ref()),
        );
        let cmd = pool.alloc_command_buffer(self, &format!("one-time-{}", name.as_ref()));

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        f(&cmd);
        cmd.end();

        let fence = GfxFence::new(self, false, &format!("one-time-{}", name.as_ref()));
        queue.submit(self, vec![GfxSubmitInfo::new(std::slice::from_ref(&cmd))], Some(&fence));
        fence.wait(self);

        fence.destroy(self);
        pool.destroy(self);
    }
}

// destroy
impl Gfx {
    /// 销毁上下文；调用前所有依赖 `Gfx` 的对象都必须已经销毁
    pub fn destroy(mut self) {
        self.gfx_device.wait_idle();

        // allocator 必须在 device 之前销毁
        drop(self.vm_allocator.take());

        self.gfx_device.destroy();
        drop(self.debug_msger.take());
        self.instance.destroy();
    }
}
