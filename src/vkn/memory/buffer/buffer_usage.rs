use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage {
    usage: vk::BufferUsageFlags,
}

impl BufferUsage {
    pub fn from_flags(usage: vk::BufferUsageFlags) -> Self {
        Self { usage }
    }

    /// Geometry input of a ray-tracing build, vertices or indices.
    pub fn geometry_input() -> Self {
        Self::from_flags(
            vk::BufferUsageFlags::RAY_TRACING_NV
                | vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER,
        )
    }

    /// Host written staging data for the instance records of a top-level build.
    pub fn instance_upload() -> Self {
        Self::from_flags(vk::BufferUsageFlags::TRANSFER_SRC)
    }

    /// Scratch space consumed by a ray-tracing build command.
    pub fn ray_tracing_scratch() -> Self {
        Self::from_flags(vk::BufferUsageFlags::RAY_TRACING_NV)
    }

    pub fn as_raw(&self) -> vk::BufferUsageFlags {
        self.usage
    }
}
