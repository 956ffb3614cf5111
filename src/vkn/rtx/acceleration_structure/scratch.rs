use crate::vkn::{vk_check, AccelError, Buffer, BufferUsage, MemoryBlock, VulkanContext};
use ash::vk;
use gpu_allocator::MemoryLocation;

/// One dedicated allocation backing a part of an acceleration structure.
#[derive(Debug)]
pub struct ScratchRegion {
    allocation: MemoryBlock,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
}

impl ScratchRegion {
    fn allocate(
        context: &VulkanContext,
        name: &str,
        requirements: vk::MemoryRequirements,
    ) -> Result<Self, AccelError> {
        let allocation = context
            .allocator()
            .allocate(name, requirements, MemoryLocation::GpuOnly)?;
        Ok(Self {
            offset: allocation.offset(),
            size: requirements.size,
            allocation,
        })
    }

    pub fn allocation(&self) -> &MemoryBlock {
        &self.allocation
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.allocation.memory()
    }

    /// Byte offset of the region inside its allocation's heap.
    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    /// Size the driver asked for.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

/// Memory of one acceleration structure: persistent object storage, scratch
/// for the initial build, and scratch for updates when the driver needs any.
///
/// Every part is optional so a half finished reservation can still be torn
/// down through [`ScratchMemory::release`].
#[derive(Debug, Default)]
pub struct ScratchMemory {
    result: Option<ScratchRegion>,
    build: Option<ScratchRegion>,
    build_buffer: Option<Buffer>,
    update: Option<ScratchRegion>,
}

impl ScratchMemory {
    /// Object storage the structure is bound to.
    pub fn result(&self) -> Option<&ScratchRegion> {
        self.result.as_ref()
    }

    pub fn build(&self) -> Option<&ScratchRegion> {
        self.build.as_ref()
    }

    /// Buffer over the build region, usable as ray-tracing scratch.
    pub fn build_buffer(&self) -> Option<&Buffer> {
        self.build_buffer.as_ref()
    }

    /// Absent when the driver reports no update scratch.
    pub fn update(&self) -> Option<&ScratchRegion> {
        self.update.as_ref()
    }

    /// Queries the three memory classes of `acc`, allocates each of them and
    /// binds the object storage to the structure.
    ///
    /// Runs once per structure, after it is created and before it is built.
    /// Memory still held from an earlier reservation is released first.
    pub(crate) fn reserve(
        &mut self,
        context: &VulkanContext,
        acc: vk::AccelerationStructureNV,
    ) -> Result<(), AccelError> {
        self.release(context);

        let device = context.device();
        let requirements = |ty| {
            vk_check(
                device.acceleration_structure_memory_requirements(acc, ty),
                "vkGetAccelerationStructureMemoryRequirementsNV",
            )
        };

        let result_requirements =
            requirements(vk::AccelerationStructureMemoryRequirementsTypeNV::OBJECT)?;
        let build_requirements =
            requirements(vk::AccelerationStructureMemoryRequirementsTypeNV::BUILD_SCRATCH)?;
        let update_requirements =
            requirements(vk::AccelerationStructureMemoryRequirementsTypeNV::UPDATE_SCRATCH)?;

        log::debug!("acceleration_structure_size: {}", result_requirements.size);
        log::debug!("build_scratch_size: {}", build_requirements.size);
        log::debug!("update_scratch_size: {}", update_requirements.size);

        self.result = Some(ScratchRegion::allocate(
            context,
            "acceleration structure object",
            result_requirements,
        )?);

        let build = self.build.insert(ScratchRegion::allocate(
            context,
            "acceleration structure build scratch",
            build_requirements,
        )?);
        self.build_buffer = Some(Buffer::from_memory(
            context,
            BufferUsage::ray_tracing_scratch(),
            &build.allocation,
            build.size,
        )?);

        if update_requirements.size > 0 {
            self.update = Some(ScratchRegion::allocate(
                context,
                "acceleration structure update scratch",
                update_requirements,
            )?);
        }

        self.bind(context, acc)
    }

    fn bind(&self, context: &VulkanContext, acc: vk::AccelerationStructureNV) -> Result<(), AccelError> {
        let result = self.result.as_ref().ok_or(AccelError::MemoryBindFailed)?;
        if result.memory() == vk::DeviceMemory::null() {
            return Err(AccelError::MemoryBindFailed);
        }

        let bind_info = vk::BindAccelerationStructureMemoryInfoNV::default()
            .acceleration_structure(acc)
            .memory(result.memory())
            .memory_offset(result.offset());

        vk_check(
            context.device().bind_acceleration_structure_memory(&bind_info),
            "vkBindAccelerationStructureMemoryNV",
        )
    }

    /// Frees whatever has been allocated so far. Safe to call repeatedly.
    pub fn release(&mut self, context: &VulkanContext) {
        // the buffer goes before the memory it is bound to
        self.build_buffer = None;

        let regions = [self.result.take(), self.build.take(), self.update.take()];
        for region in regions.into_iter().flatten() {
            if let Err(e) = context.allocator().free(region.allocation) {
                log::warn!("Failed to free acceleration structure memory: {e}");
            }
        }
    }
}
