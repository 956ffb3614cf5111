use super::{
    accel_struct::create_acc, encode_geometries, encode_instances, ContainerDescriptor,
    ContainerFlags, ContainerLevel, InstanceBuffer, InstanceRecord, ScratchMemory,
};
use crate::vkn::{vk_check, AccelError, VulkanContext};
use ash::vk;

/// A bottom- or top-level acceleration structure together with every piece of
/// memory it needs to be built and referenced.
///
/// Created in one go by [`AccelerationContainer::new`]. Bottom-level containers
/// must be fully created before a top-level container can reference them.
pub struct AccelerationContainer {
    context: VulkanContext,
    level: ContainerLevel,
    flags: ContainerFlags,
    geometries: Vec<vk::GeometryNV<'static>>,
    instances: Vec<InstanceRecord>,
    acc: vk::AccelerationStructureNV,
    handle: u64,
    scratch: ScratchMemory,
    instance_buffer: Option<InstanceBuffer>,
}

// the geometry records only carry buffer handles, their p_next chains are null
unsafe impl Send for AccelerationContainer {}
unsafe impl Sync for AccelerationContainer {}

impl Drop for AccelerationContainer {
    fn drop(&mut self) {
        if self.acc != vk::AccelerationStructureNV::null() {
            log::info!("Destroying {:?} acceleration structure {:?}", self.level, self.acc);
            self.context
                .device()
                .destroy_acceleration_structure(self.acc);
            self.acc = vk::AccelerationStructureNV::null();
        }
        self.scratch.release(&self.context);
        self.instance_buffer = None;
    }
}

impl AccelerationContainer {
    /// Runs the whole initialization sequence. Nothing is returned on failure,
    /// resources created before the failing step are released.
    pub fn new(context: &VulkanContext, desc: &ContainerDescriptor) -> Result<Self, AccelError> {
        let mut container = Self {
            context: context.clone(),
            level: ContainerLevel::Undefined,
            flags: ContainerFlags::empty(),
            geometries: Vec::new(),
            instances: Vec::new(),
            acc: vk::AccelerationStructureNV::null(),
            handle: 0,
            scratch: ScratchMemory::default(),
            instance_buffer: None,
        };
        container.initialize(desc)?;
        log::info!(
            "Created {:?} acceleration structure {:?} with handle {:#x}",
            container.level,
            container.acc,
            container.handle
        );
        Ok(container)
    }

    fn initialize(&mut self, desc: &ContainerDescriptor) -> Result<(), AccelError> {
        self.level = desc.level;
        self.flags = desc.flags;

        if !self.context.device().ray_tracing_supported() {
            return Err(AccelError::UnsupportedFeature);
        }

        if self.level == ContainerLevel::Bottom {
            self.geometries = encode_geometries(desc.geometries)?;
        }

        let instance_count = match self.level {
            ContainerLevel::Top => desc.instances.len() as u32,
            _ => 0,
        };
        self.acc = create_acc(
            self.context.device(),
            self.level,
            &self.geometries,
            instance_count,
        )?;

        if self.level == ContainerLevel::Top {
            self.instances = encode_instances(desc.instances)?;
            // an empty top level has nothing to upload, vulkan forbids empty buffers
            if !self.instances.is_empty() {
                self.instance_buffer =
                    Some(InstanceBuffer::upload(&self.context, &self.instances)?);
            }
        }

        self.scratch.reserve(&self.context, self.acc)?;

        self.handle = vk_check(
            self.context
                .device()
                .acceleration_structure_handle(self.acc),
            "vkGetAccelerationStructureHandleNV",
        )?;
        Ok(())
    }

    pub fn level(&self) -> ContainerLevel {
        self.level
    }

    /// Build flags as requested by the caller.
    pub fn flags(&self) -> ContainerFlags {
        self.flags
    }

    /// Native translation of [`Self::flags`].
    pub fn native_flags(&self) -> vk::BuildAccelerationStructureFlagsNV {
        self.flags.to_vk()
    }

    /// Native structure handle.
    pub fn as_raw(&self) -> vk::AccelerationStructureNV {
        self.acc
    }

    /// Opaque device handle other containers' instances use to reference this
    /// one. Zero until creation has finished.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn geometries(&self) -> &[vk::GeometryNV<'static>] {
        &self.geometries
    }

    pub fn geometry_count(&self) -> u32 {
        self.geometries.len() as u32
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn scratch_memory(&self) -> &ScratchMemory {
        &self.scratch
    }

    pub fn instance_buffer(&self) -> Option<&InstanceBuffer> {
        self.instance_buffer.as_ref()
    }

    /// Null for bottom-level containers and for top-level ones without
    /// instances.
    pub fn instance_buffer_handle(&self) -> vk::Buffer {
        self.instance_buffer
            .as_ref()
            .map_or(vk::Buffer::null(), InstanceBuffer::as_raw)
    }

    pub fn instance_buffer_offset(&self) -> vk::DeviceSize {
        self.instance_buffer
            .as_ref()
            .map_or(0, InstanceBuffer::offset)
    }
}
