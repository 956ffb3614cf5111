use super::ContainerLevel;
use crate::vkn::{vk_check, AccelError, RayTracingDevice};
use ash::vk;

/// Creates the native structure object for either level.
///
/// Top-level structures are sized by `instance_count` and carry no geometry,
/// bottom-level ones carry `geometries` and no instances. Creation always asks
/// for fast tracing, the caller's build flags are not forwarded.
pub fn create_acc(
    device: &dyn RayTracingDevice,
    level: ContainerLevel,
    geometries: &[vk::GeometryNV],
    instance_count: u32,
) -> Result<vk::AccelerationStructureNV, AccelError> {
    if !device.ray_tracing_supported() {
        return Err(AccelError::UnsupportedFeature);
    }

    let info = vk::AccelerationStructureInfoNV::default()
        .flags(vk::BuildAccelerationStructureFlagsNV::PREFER_FAST_TRACE);
    let info = match level {
        ContainerLevel::Top => info
            .ty(vk::AccelerationStructureTypeNV::TOP_LEVEL)
            .instance_count(instance_count),
        ContainerLevel::Bottom => info
            .ty(vk::AccelerationStructureTypeNV::BOTTOM_LEVEL)
            .geometries(geometries),
        ContainerLevel::Undefined => return Err(AccelError::InvalidLevel),
    };

    let create_info = vk::AccelerationStructureCreateInfoNV::default()
        .compacted_size(0)
        .info(info);

    let acc = vk_check(
        device.create_acceleration_structure(&create_info),
        "vkCreateAccelerationStructureNV",
    )?;
    log::debug!("Created {:?} acceleration structure {:?}", level, acc);
    Ok(acc)
}
