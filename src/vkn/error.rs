use super::rtx::GeometryType;
use ash::vk;

/// Every way building an acceleration container can fail.
#[derive(Debug, thiserror::Error)]
pub enum AccelError {
    #[error("ray tracing entry points are not available on this device")]
    UnsupportedFeature,

    #[error("geometry {index} has type {ty:?}, only triangles are supported")]
    UnsupportedGeometryType { index: usize, ty: GeometryType },

    #[error("geometry {index} references a vertex buffer without a native handle")]
    InvalidVertexData { index: usize },

    #[error("geometry {index} references an index buffer without a native handle")]
    InvalidIndexData { index: usize },

    #[error("instance {index} references a container that has no device handle yet")]
    InvalidAccelerationHandle { index: usize },

    #[error("container level must be either top or bottom")]
    InvalidLevel,

    #[error("object memory of the acceleration structure resolved to no device memory")]
    MemoryBindFailed,

    #[error("memory is not host visible")]
    MemoryNotMapped,

    #[error("access of {requested} bytes exceeds the {available} bytes available")]
    OutOfBounds {
        requested: vk::DeviceSize,
        available: vk::DeviceSize,
    },

    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },

    #[error(transparent)]
    Allocation(#[from] gpu_allocator::AllocationError),
}

/// Attaches the name of the driver entry point to a raw Vulkan status.
pub fn vk_check<T>(result: ash::prelude::VkResult<T>, call: &'static str) -> Result<T, AccelError> {
    result.map_err(|result| AccelError::Vulkan { call, result })
}
