use super::{transform::compose, InstanceDescriptor};
use crate::vkn::{AccelError, Buffer, BufferUsage, VulkanContext};
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Native instance record, laid out the way the device reads it.
pub type InstanceRecord = vk::AccelerationStructureInstanceKHR;

pub const INSTANCE_RECORD_SIZE: vk::DeviceSize = std::mem::size_of::<InstanceRecord>() as vk::DeviceSize;

/// Converts top-level instance descriptors into native instance records.
///
/// Every referenced container must already carry its device handle. Record
/// order follows descriptor order, which fixes the instance index shaders see.
pub fn encode_instances(
    descriptors: &[InstanceDescriptor],
) -> Result<Vec<InstanceRecord>, AccelError> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, desc)| {
            let handle = desc.geometry_container.handle();
            if handle == 0 {
                return Err(AccelError::InvalidAccelerationHandle { index });
            }

            let transform = &desc.transform;
            let matrix = compose(transform.translation, transform.rotation, transform.scale);

            Ok(vk::AccelerationStructureInstanceKHR {
                transform: matrix.to_vk(),
                instance_custom_index_and_mask: vk::Packed24_8::new(desc.instance_id, desc.mask),
                instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
                    desc.instance_offset,
                    desc.flags.to_vk().as_raw() as u8,
                ),
                acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                    device_handle: handle,
                },
            })
        })
        .collect()
}

/// Host visible buffer holding the encoded instance records of a top-level
/// container, consumed by the build command.
pub struct InstanceBuffer {
    buffer: Buffer,
    count: u32,
}

impl InstanceBuffer {
    /// Allocates a buffer sized for `instances` and copies them in.
    ///
    /// `instances` must not be empty.
    pub fn upload(context: &VulkanContext, instances: &[InstanceRecord]) -> Result<Self, AccelError> {
        let size = instances.len() as vk::DeviceSize * INSTANCE_RECORD_SIZE;

        let buffer = Buffer::new_sized(
            context,
            BufferUsage::instance_upload(),
            MemoryLocation::CpuToGpu,
            size,
        )?;
        buffer.fill(instances)?;

        log::debug!(
            "Uploaded {} instance records ({} bytes) into {:?}",
            instances.len(),
            size,
            buffer.as_raw()
        );

        Ok(Self {
            buffer,
            count: instances.len() as u32,
        })
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn as_raw(&self) -> vk::Buffer {
        self.buffer.as_raw()
    }

    /// Offset of the records inside the backing memory.
    pub fn offset(&self) -> vk::DeviceSize {
        self.buffer.memory_offset()
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
