//! Ray-tracing acceleration containers on top of `VK_NV_ray_tracing`.
//!
//! A bottom-level [`AccelerationContainer`] holds triangle geometry, a
//! top-level one holds instances of finished bottom-level containers. Each
//! container is created in one synchronous step that encodes its contents,
//! creates the native structure, reserves and binds its memory and fetches the
//! device handle instances refer to it by. Recording and submitting the
//! actual build is left to the caller.

pub mod vkn;

pub use vkn::rtx::{
    compose, AccelerationContainer, ContainerDescriptor, ContainerFlags, ContainerLevel,
    GeometryDescriptor, GeometryType, IndexFormat, InstanceDescriptor, InstanceFlags,
    Transform3D, Transform4x3, VertexFormat,
};
pub use vkn::{AccelError, Allocator, AllocatorDesc, Device, VulkanContext};
