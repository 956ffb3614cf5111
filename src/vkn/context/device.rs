use crate::vkn::{vk_check, AccelError};
use ash::{nv, prelude::VkResult, vk};
use std::ffi::CStr;
use std::sync::Arc;

/// Device entry points needed to create, size, bind and reference acceleration
/// structures, plus the plain buffer calls used next to them.
///
/// `ray_tracing_supported` is computed once when the device is opened. When it
/// is `false` the acceleration-structure calls fail with
/// `ERROR_EXTENSION_NOT_PRESENT`.
pub trait RayTracingDevice: Send + Sync {
    fn ray_tracing_supported(&self) -> bool;

    fn create_acceleration_structure(
        &self,
        create_info: &vk::AccelerationStructureCreateInfoNV,
    ) -> VkResult<vk::AccelerationStructureNV>;

    fn destroy_acceleration_structure(&self, accel_struct: vk::AccelerationStructureNV);

    fn acceleration_structure_memory_requirements(
        &self,
        accel_struct: vk::AccelerationStructureNV,
        ty: vk::AccelerationStructureMemoryRequirementsTypeNV,
    ) -> VkResult<vk::MemoryRequirements>;

    fn bind_acceleration_structure_memory(
        &self,
        bind_info: &vk::BindAccelerationStructureMemoryInfoNV,
    ) -> VkResult<()>;

    /// Reads back the 8 byte handle instances use to reference the structure.
    fn acceleration_structure_handle(&self, accel_struct: vk::AccelerationStructureNV)
        -> VkResult<u64>;

    fn create_buffer(&self, create_info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer>;

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn destroy_buffer(&self, buffer: vk::Buffer);
}

const RAY_TRACING_ENTRY_POINTS: [&CStr; 4] = [
    c"vkCreateAccelerationStructureNV",
    c"vkGetAccelerationStructureMemoryRequirementsNV",
    c"vkBindAccelerationStructureMemoryNV",
    c"vkGetAccelerationStructureHandleNV",
];

struct DeviceInner {
    device: ash::Device,
    ray_tracing: Option<nv::ray_tracing::Device>,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle failed on shutdown: {e}");
            }
            self.device.destroy_device(None);
        }
    }
}

#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);

impl std::ops::Deref for Device {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.0.device
    }
}

impl Device {
    /// Creates a logical device with a single queue from `queue_family_index`,
    /// enabling `VK_NV_ray_tracing` when the physical device offers it.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<Self, AccelError> {
        let device = create_device(instance, physical_device, queue_family_index)?;
        Ok(Self::from_raw(instance, device))
    }

    /// Takes ownership of an already created device.
    pub fn from_raw(instance: &ash::Instance, device: ash::Device) -> Self {
        let ray_tracing = if has_ray_tracing_entry_points(instance, &device) {
            Some(nv::ray_tracing::Device::new(instance, &device))
        } else {
            None
        };
        log::info!(
            "Ray tracing support: {}",
            if ray_tracing.is_some() { "yes" } else { "no" }
        );
        Self(Arc::new(DeviceInner {
            device,
            ray_tracing,
        }))
    }

    pub fn as_raw(&self) -> &ash::Device {
        &self.0.device
    }

    fn ray_tracing_fn(&self) -> VkResult<&nv::ray_tracing::Device> {
        require_ray_tracing(self.0.ray_tracing.as_ref())
    }
}

fn require_ray_tracing<T>(ray_tracing: Option<&T>) -> VkResult<&T> {
    ray_tracing.ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
}

impl RayTracingDevice for Device {
    fn ray_tracing_supported(&self) -> bool {
        self.0.ray_tracing.is_some()
    }

    fn create_acceleration_structure(
        &self,
        create_info: &vk::AccelerationStructureCreateInfoNV,
    ) -> VkResult<vk::AccelerationStructureNV> {
        let ray_tracing = self.ray_tracing_fn()?;
        unsafe { ray_tracing.create_acceleration_structure(create_info, None) }
    }

    fn destroy_acceleration_structure(&self, accel_struct: vk::AccelerationStructureNV) {
        match self.ray_tracing_fn() {
            Ok(ray_tracing) => unsafe {
                ray_tracing.destroy_acceleration_structure(accel_struct, None)
            },
            Err(_) => log::warn!(
                "Cannot destroy {accel_struct:?}, VK_NV_ray_tracing is not available"
            ),
        }
    }

    fn acceleration_structure_memory_requirements(
        &self,
        accel_struct: vk::AccelerationStructureNV,
        ty: vk::AccelerationStructureMemoryRequirementsTypeNV,
    ) -> VkResult<vk::MemoryRequirements> {
        let ray_tracing = self.ray_tracing_fn()?;
        let info = vk::AccelerationStructureMemoryRequirementsInfoNV::default()
            .ty(ty)
            .acceleration_structure(accel_struct);
        let requirements =
            unsafe { ray_tracing.get_acceleration_structure_memory_requirements(&info) };
        Ok(requirements.memory_requirements)
    }

    fn bind_acceleration_structure_memory(
        &self,
        bind_info: &vk::BindAccelerationStructureMemoryInfoNV,
    ) -> VkResult<()> {
        let ray_tracing = self.ray_tracing_fn()?;
        unsafe { ray_tracing.bind_acceleration_structure_memory(std::slice::from_ref(bind_info)) }
    }

    fn acceleration_structure_handle(
        &self,
        accel_struct: vk::AccelerationStructureNV,
    ) -> VkResult<u64> {
        let ray_tracing = self.ray_tracing_fn()?;
        unsafe { ray_tracing.get_acceleration_structure_handle(accel_struct) }
    }

    fn create_buffer(&self, create_info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        unsafe { self.as_raw().create_buffer(create_info, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.as_raw().get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.as_raw().bind_buffer_memory(buffer, memory, offset) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.as_raw().destroy_buffer(buffer, None) }
    }
}

fn has_ray_tracing_entry_points(instance: &ash::Instance, device: &ash::Device) -> bool {
    RAY_TRACING_ENTRY_POINTS.iter().all(|name| unsafe {
        (instance.fp_v1_0().get_device_proc_addr)(device.handle(), name.as_ptr()).is_some()
    })
}

fn supports_extension(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    extension: &CStr,
) -> Result<bool, AccelError> {
    let properties = vk_check(
        unsafe { instance.enumerate_device_extension_properties(physical_device) },
        "vkEnumerateDeviceExtensionProperties",
    )?;
    Ok(properties
        .iter()
        .any(|p| p.extension_name_as_c_str().is_ok_and(|name| name == extension)))
}

fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> Result<ash::Device, AccelError> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family_index)
        .queue_priorities(&queue_priorities)];

    let mut device_extensions_ptrs = vec![];
    if supports_extension(instance, physical_device, vk::NV_RAY_TRACING_NAME)? {
        device_extensions_ptrs.push(vk::NV_RAY_TRACING_NAME.as_ptr());
    } else {
        log::warn!("VK_NV_ray_tracing is not offered by the physical device");
    }

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extensions_ptrs);

    vk_check(
        unsafe { instance.create_device(physical_device, &device_create_info, None) },
        "vkCreateDevice",
    )
}
