use ash::vk;
use itertools::Itertools;

/// 物理设备封装
///
/// 保存设备属性、memory type 表和 queue family 能力表，
/// 队列选择和 memory type 匹配都基于这里的表进行。
pub struct GfxPhysicalDevice {
    pub vk_handle: vk::PhysicalDevice,

    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
}

// new & init
impl GfxPhysicalDevice {
    /// 优先选择独立显卡；没有独显时退回第一个设备
    pub fn new(instance: &ash::Instance) -> Self {
        let _span = tracy_client::span!("GfxPhysicalDevice::new");

        let pdevices = unsafe { instance.enumerate_physical_devices().unwrap() };
        if pdevices.is_empty() {
            panic!("no vulkan physical device found");
        }

        let pdevice = pdevices
            .iter()
            .copied()
            .find(|pdevice| {
                let props = unsafe { instance.get_physical_device_properties(*pdevice) };
                props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .unwrap_or(pdevices[0]);

        let properties = unsafe { instance.get_physical_device_properties(pdevice) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(pdevice) };
        let queue_family_properties = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };

        let device_name = properties.device_name_as_c_str().unwrap_or(c"<unknown>");
        log::info!("physical device: {:?}", device_name);
        for (idx, props) in queue_family_properties.iter().enumerate() {
            log::info!("queue family {}: {:?} x{}", idx, props.queue_flags, props.queue_count);
        }

        Self {
            vk_handle: pdevice,
            properties,
            memory_properties,
            queue_family_properties,
        }
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }
}

// tools
impl GfxPhysicalDevice {
    /// 找到第一个满足条件的 queue family：
    /// flags 包含所有 required，且不包含任何 excluded
    #[inline]
    pub fn find_queue_family(&self, required: vk::QueueFlags, excluded: vk::QueueFlags) -> Option<u32> {
        find_queue_family(&self.queue_family_properties, required, excluded)
    }

    /// 找到第一个满足条件的 memory type：
    /// index 在 type_mask 中，且 property flags 包含所有 props
    #[inline]
    pub fn find_memory_type(&self, type_mask: u32, props: vk::MemoryPropertyFlags) -> Option<u32> {
        let memory_types = &self.memory_properties.memory_types[..self.memory_properties.memory_type_count as usize];
        find_memory_type(memory_types, type_mask, props)
    }
}

/// 在 queue family 表中做首次匹配扫描
pub fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    required: vk::QueueFlags,
    excluded: vk::QueueFlags,
) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(required) && !family.queue_flags.intersects(excluded))
        .map(|idx| idx as u32)
}

/// 在 memory type 表中做首次匹配扫描
pub fn find_memory_type(memory_types: &[vk::MemoryType], type_mask: u32, props: vk::MemoryPropertyFlags) -> Option<u32> {
    memory_types
        .iter()
        .enumerate()
        .find(|(idx, mem_type)| (type_mask & (1 << idx)) != 0 && mem_type.property_flags.contains(props))
        .map(|(idx, _)| idx as u32)
}

/// 构建 device 创建所需的 queue create info
///
/// 同一个 family 只会出现一次
pub fn build_queue_create_infos<'a>(family_indices: &[u32], priorities: &'a [f32]) -> Vec<vk::DeviceQueueCreateInfo<'a>> {
    family_indices
        .iter()
        .copied()
        .unique()
        .map(|family_index| {
            vk::DeviceQueueCreateInfo::default().queue_family_index(family_index).queue_priorities(priorities)
        })
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn queue_family_first_match_wins() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];

        assert_eq!(find_queue_family(&families, vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty()), Some(0));
        assert_eq!(find_queue_family(&families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS), Some(1));
        assert_eq!(
            find_queue_family(
                &families,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE
            ),
            Some(2)
        );
    }

    #[test]
    fn queue_family_none_when_all_excluded() {
        // 只有一个全能 family 时，排除 GRAPHICS 的 compute 查询会失败
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];

        assert_eq!(find_queue_family(&families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS), None);
    }

    fn mem_type(flags: vk::MemoryPropertyFlags) -> vk::MemoryType {
        vk::MemoryType {
            property_flags: flags,
            heap_index: 0,
        }
    }

    #[test]
    fn memory_type_respects_mask_and_props() {
        let types = [
            mem_type(vk::MemoryPropertyFlags::DEVICE_LOCAL),
            mem_type(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT),
            mem_type(vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE),
        ];

        // 全量 mask：首个匹配
        assert_eq!(find_memory_type(&types, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL), Some(0));
        // mask 排除 index 0 之后，匹配下一个
        assert_eq!(find_memory_type(&types, 0b100, vk::MemoryPropertyFlags::DEVICE_LOCAL), Some(2));
        // 不存在的组合
        assert_eq!(
            find_memory_type(&types, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_CACHED),
            None
        );
    }

    #[test]
    fn queue_create_infos_deduplicate_families() {
        let priorities = [1.0_f32];
        let infos = build_queue_create_infos(&[0, 0, 1], &priorities);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[1].queue_family_index, 1);
    }
}
