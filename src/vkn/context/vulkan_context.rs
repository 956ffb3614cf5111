use super::RayTracingDevice;
use crate::vkn::MemoryAllocator;
use std::sync::Arc;

/// The device and the device-wide allocator, cloned into every object that
/// owns native resources so it can release them on drop.
#[derive(Clone)]
pub struct VulkanContext {
    // declared first so the allocator goes away before the device
    allocator: Arc<dyn MemoryAllocator>,
    device: Arc<dyn RayTracingDevice>,
}

impl VulkanContext {
    pub fn new(device: Arc<dyn RayTracingDevice>, allocator: Arc<dyn MemoryAllocator>) -> Self {
        Self { allocator, device }
    }

    pub fn device(&self) -> &dyn RayTracingDevice {
        self.device.as_ref()
    }

    pub fn allocator(&self) -> &dyn MemoryAllocator {
        self.allocator.as_ref()
    }
}
