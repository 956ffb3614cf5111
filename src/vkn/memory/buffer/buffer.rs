use super::BufferUsage;
use crate::vkn::{vk_check, AccelError, MemoryBlock, VulkanContext};
use ash::vk;
use gpu_allocator::MemoryLocation;

pub struct Buffer {
    context: VulkanContext,
    buffer: vk::Buffer,
    // `None` when the buffer is bound to memory owned by someone else
    allocated_mem: Option<MemoryBlock>,
    size: vk::DeviceSize,
    usage: BufferUsage,
    location: MemoryLocation,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("location", &self.location)
            .finish()
    }
}

impl Buffer {
    fn unbound(
        context: &VulkanContext,
        usage: BufferUsage,
        location: MemoryLocation,
        size: vk::DeviceSize,
    ) -> Result<Self, AccelError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.as_raw())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = vk_check(
            context.device().create_buffer(&buffer_info),
            "vkCreateBuffer",
        )?;

        Ok(Self {
            context: context.clone(),
            buffer,
            allocated_mem: None,
            size,
            usage,
            location,
        })
    }

    /// Creates a buffer of `size` bytes backed by its own allocation.
    pub fn new_sized(
        context: &VulkanContext,
        usage: BufferUsage,
        location: MemoryLocation,
        size: vk::DeviceSize,
    ) -> Result<Self, AccelError> {
        // on any error below `buffer` drops and takes the handle with it
        let mut buffer = Self::unbound(context, usage, location, size)?;

        let requirements = context.device().buffer_memory_requirements(buffer.buffer);
        let allocated_mem = context
            .allocator()
            .allocate("buffer", requirements, location)?;
        let (memory, offset) = (allocated_mem.memory(), allocated_mem.offset());
        buffer.allocated_mem = Some(allocated_mem);

        vk_check(
            context
                .device()
                .bind_buffer_memory(buffer.buffer, memory, offset),
            "vkBindBufferMemory",
        )?;

        Ok(buffer)
    }

    /// Creates a buffer of `size` bytes over memory the caller keeps ownership
    /// of. `memory` must outlive the returned buffer.
    pub fn from_memory(
        context: &VulkanContext,
        usage: BufferUsage,
        memory: &MemoryBlock,
        size: vk::DeviceSize,
    ) -> Result<Self, AccelError> {
        let buffer = Self::unbound(context, usage, MemoryLocation::GpuOnly, size)?;

        vk_check(
            context
                .device()
                .bind_buffer_memory(buffer.buffer, memory.memory(), memory.offset()),
            "vkBindBufferMemory",
        )?;

        Ok(buffer)
    }

    /// Releases the native buffer and its memory right away. Afterwards the
    /// buffer reports a null handle.
    pub fn destroy(&mut self) {
        if self.buffer != vk::Buffer::null() {
            self.context.device().destroy_buffer(self.buffer);
            self.buffer = vk::Buffer::null();
        }
        if let Some(allocated_mem) = self.allocated_mem.take() {
            if let Err(e) = self.context.allocator().free(allocated_mem) {
                log::warn!("Failed to free buffer memory: {e}");
            }
        }
    }

    pub fn get_size_bytes(&self) -> vk::DeviceSize {
        // the allocation itself may be larger than what was asked for
        self.size
    }

    pub fn get_usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn get_location(&self) -> MemoryLocation {
        self.location
    }

    /// Offset of the buffer inside its backing memory, zero when the memory
    /// is not owned by this buffer.
    pub fn memory_offset(&self) -> vk::DeviceSize {
        self.allocated_mem
            .as_ref()
            .map_or(0, |allocated_mem| allocated_mem.offset())
    }

    /// Fills the buffer with generic typed data through its mapped pointer.
    pub fn fill<T: Copy>(&self, data: &[T]) -> Result<(), AccelError> {
        let allocated_mem = self
            .allocated_mem
            .as_ref()
            .ok_or(AccelError::MemoryNotMapped)?;
        let requested = std::mem::size_of_val(data) as vk::DeviceSize;
        if requested > self.size {
            return Err(AccelError::OutOfBounds {
                requested,
                available: self.size,
            });
        }
        allocated_mem.write(data)
    }

    /// Reads the whole buffer back through its mapped pointer.
    pub fn fetch_raw(&self) -> Result<Vec<u8>, AccelError> {
        let allocated_mem = self
            .allocated_mem
            .as_ref()
            .ok_or(AccelError::MemoryNotMapped)?;
        allocated_mem.read(self.size as usize)
    }

    /// Returns the raw Vulkan buffer handle, null once destroyed.
    pub fn as_raw(&self) -> vk::Buffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vkn::rtx::mock::MockContext;

    #[test]
    fn test_fill_then_fetch() {
        let mock = MockContext::new();
        let data = [1u32, 2, 3, 4];
        let buffer = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::instance_upload(),
            MemoryLocation::CpuToGpu,
            16,
        )
        .unwrap();

        buffer.fill(&data).unwrap();

        let bytes = buffer.fetch_raw().unwrap();
        assert_eq!(bytes, bytemuck::cast_slice::<u32, u8>(&data));
        assert_eq!(buffer.get_size_bytes(), 16);
        assert_eq!(buffer.get_location(), MemoryLocation::CpuToGpu);
    }

    #[test]
    fn test_device_local_memory_is_not_mapped() {
        let mock = MockContext::new();
        let buffer = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::ray_tracing_scratch(),
            MemoryLocation::GpuOnly,
            64,
        )
        .unwrap();

        assert!(matches!(buffer.fill(&[0u8; 4]), Err(AccelError::MemoryNotMapped)));
        assert!(matches!(buffer.fetch_raw(), Err(AccelError::MemoryNotMapped)));
    }

    #[test]
    fn test_oversized_fill_is_rejected() {
        let mock = MockContext::new();
        let buffer = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::instance_upload(),
            MemoryLocation::CpuToGpu,
            16,
        )
        .unwrap();

        let err = buffer.fill(&[0u64; 8]).unwrap_err();
        assert!(matches!(
            err,
            AccelError::OutOfBounds {
                requested: 64,
                available: 16
            }
        ));
    }

    #[test]
    fn test_empty_buffer_is_rejected() {
        let mock = MockContext::new();

        let err = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::instance_upload(),
            MemoryLocation::CpuToGpu,
            0,
        )
        .unwrap_err();

        assert!(matches!(err, AccelError::Allocation(_)));
        assert_eq!(mock.device.live_buffers(), 0);
        assert_eq!(mock.allocator.live_allocations(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mock = MockContext::new();
        let mut buffer = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::geometry_input(),
            MemoryLocation::CpuToGpu,
            32,
        )
        .unwrap();

        buffer.destroy();
        assert_eq!(buffer.as_raw(), vk::Buffer::null());
        assert_eq!(mock.device.live_buffers(), 0);
        assert_eq!(mock.allocator.live_allocations(), 0);

        buffer.destroy();
        drop(buffer);
        assert_eq!(mock.allocator.live_allocations(), 0);
    }

    #[test]
    fn test_failed_bind_releases_buffer() {
        let mock = MockContext::new();
        mock.device
            .fail_next("vkBindBufferMemory", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

        let err = Buffer::new_sized(
            &mock.ctx,
            BufferUsage::geometry_input(),
            MemoryLocation::CpuToGpu,
            32,
        )
        .unwrap_err();

        assert!(matches!(err, AccelError::Vulkan { call: "vkBindBufferMemory", .. }));
        assert_eq!(mock.device.live_buffers(), 0);
        assert_eq!(mock.allocator.live_allocations(), 0);
    }
}
