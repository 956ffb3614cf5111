use super::AccelerationContainer;
use crate::vkn::Buffer;
use ash::vk;
use glam::Vec3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContainerLevel {
    /// Neither level was named, rejected when the structure is created.
    #[default]
    Undefined,
    /// Holds geometry.
    Bottom,
    /// Holds instances of bottom-level containers.
    Top,
}

impl ContainerLevel {
    pub fn to_vk(self) -> Option<vk::AccelerationStructureTypeNV> {
        match self {
            ContainerLevel::Undefined => None,
            ContainerLevel::Bottom => Some(vk::AccelerationStructureTypeNV::BOTTOM_LEVEL),
            ContainerLevel::Top => Some(vk::AccelerationStructureTypeNV::TOP_LEVEL),
        }
    }
}

bitflags::bitflags! {
    /// Build preferences captured with the container.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ContainerFlags: u32 {
        const ALLOW_UPDATE = 0x1;
        const PREFER_FAST_BUILD = 0x2;
        const PREFER_FAST_TRACE = 0x4;
        const LOW_MEMORY = 0x8;
    }
}

impl ContainerFlags {
    pub fn to_vk(self) -> vk::BuildAccelerationStructureFlagsNV {
        let mut flags = vk::BuildAccelerationStructureFlagsNV::empty();
        if self.contains(ContainerFlags::ALLOW_UPDATE) {
            flags |= vk::BuildAccelerationStructureFlagsNV::ALLOW_UPDATE;
        }
        if self.contains(ContainerFlags::PREFER_FAST_BUILD) {
            flags |= vk::BuildAccelerationStructureFlagsNV::PREFER_FAST_BUILD;
        }
        if self.contains(ContainerFlags::PREFER_FAST_TRACE) {
            flags |= vk::BuildAccelerationStructureFlagsNV::PREFER_FAST_TRACE;
        }
        if self.contains(ContainerFlags::LOW_MEMORY) {
            flags |= vk::BuildAccelerationStructureFlagsNV::LOW_MEMORY;
        }
        flags
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GeometryType {
    #[default]
    Triangles,
    Aabbs,
}

impl GeometryType {
    pub fn to_vk(self) -> vk::GeometryTypeNV {
        match self {
            GeometryType::Triangles => vk::GeometryTypeNV::TRIANGLES,
            GeometryType::Aabbs => vk::GeometryTypeNV::AABBS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    #[default]
    None,
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn to_vk(self) -> vk::IndexType {
        match self {
            IndexFormat::None => vk::IndexType::NONE_NV,
            IndexFormat::Uint16 => vk::IndexType::UINT16,
            IndexFormat::Uint32 => vk::IndexType::UINT32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float2,
    #[default]
    Float3,
}

impl VertexFormat {
    pub fn to_vk(self) -> vk::Format {
        match self {
            VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
            VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        }
    }
}

bitflags::bitflags! {
    /// Per-instance overrides, stored in the 8 flag bits of an instance record.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct InstanceFlags: u8 {
        const TRIANGLE_CULL_DISABLE = 0x1;
        const TRIANGLE_FRONT_COUNTERCLOCKWISE = 0x2;
        const FORCE_OPAQUE = 0x4;
        const FORCE_NO_OPAQUE = 0x8;
    }
}

impl InstanceFlags {
    pub fn to_vk(self) -> vk::GeometryInstanceFlagsNV {
        let mut flags = vk::GeometryInstanceFlagsNV::empty();
        if self.contains(InstanceFlags::TRIANGLE_CULL_DISABLE) {
            flags |= vk::GeometryInstanceFlagsNV::TRIANGLE_FACING_CULL_DISABLE;
        }
        if self.contains(InstanceFlags::TRIANGLE_FRONT_COUNTERCLOCKWISE) {
            flags |= vk::GeometryInstanceFlagsNV::TRIANGLE_FLIP_FACING;
        }
        if self.contains(InstanceFlags::FORCE_OPAQUE) {
            flags |= vk::GeometryInstanceFlagsNV::FORCE_OPAQUE;
        }
        if self.contains(InstanceFlags::FORCE_NO_OPAQUE) {
            flags |= vk::GeometryInstanceFlagsNV::FORCE_NO_OPAQUE;
        }
        flags
    }
}

/// Optional translation, rotation (euler angles in radians, applied X, Y then
/// Z) and scale. A missing part is the identity for that part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform3D {
    pub translation: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub scale: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryDescriptor<'a> {
    pub ty: GeometryType,
    pub vertex_buffer: Option<&'a Buffer>,
    pub vertex_offset: vk::DeviceSize,
    pub vertex_count: u32,
    pub vertex_stride: vk::DeviceSize,
    pub vertex_format: VertexFormat,
    pub index_buffer: Option<&'a Buffer>,
    pub index_offset: vk::DeviceSize,
    pub index_count: u32,
    pub index_format: IndexFormat,
}

#[derive(Clone, Copy)]
pub struct InstanceDescriptor<'a> {
    pub transform: Transform3D,
    /// Only the low 24 bits reach the device.
    pub instance_id: u32,
    pub mask: u8,
    /// Shader binding table offset, only the low 24 bits reach the device.
    pub instance_offset: u32,
    pub flags: InstanceFlags,
    pub geometry_container: &'a AccelerationContainer,
}

#[derive(Clone, Copy, Default)]
pub struct ContainerDescriptor<'a> {
    pub level: ContainerLevel,
    pub flags: ContainerFlags,
    pub geometries: &'a [GeometryDescriptor<'a>],
    pub instances: &'a [InstanceDescriptor<'a>],
}
