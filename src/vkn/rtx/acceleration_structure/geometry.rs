use super::{GeometryDescriptor, GeometryType};
use crate::vkn::{AccelError, Buffer};
use ash::vk;

fn resolve(buffer: Option<&Buffer>) -> Option<vk::Buffer> {
    buffer
        .map(Buffer::as_raw)
        .filter(|handle| *handle != vk::Buffer::null())
}

/// Converts bottom-level geometry descriptors into native geometry records.
///
/// Only triangles are accepted for now. Geometry stays in object space, the
/// transform fields of the records are left empty.
pub fn encode_geometries(
    descriptors: &[GeometryDescriptor],
) -> Result<Vec<vk::GeometryNV<'static>>, AccelError> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, desc)| encode_geometry(index, desc))
        .collect()
}

fn encode_geometry(
    index: usize,
    desc: &GeometryDescriptor,
) -> Result<vk::GeometryNV<'static>, AccelError> {
    if desc.ty != GeometryType::Triangles {
        return Err(AccelError::UnsupportedGeometryType { index, ty: desc.ty });
    }

    let vertex_data =
        resolve(desc.vertex_buffer).ok_or(AccelError::InvalidVertexData { index })?;

    let mut triangles = vk::GeometryTrianglesNV {
        vertex_data,
        vertex_offset: desc.vertex_offset,
        vertex_count: desc.vertex_count,
        vertex_stride: desc.vertex_stride,
        vertex_format: desc.vertex_format.to_vk(),
        index_data: vk::Buffer::null(),
        index_offset: 0,
        index_count: 0,
        index_type: vk::IndexType::NONE_NV,
        transform_data: vk::Buffer::null(),
        transform_offset: 0,
        ..Default::default()
    };

    if desc.index_buffer.is_some() {
        triangles.index_data =
            resolve(desc.index_buffer).ok_or(AccelError::InvalidIndexData { index })?;
        triangles.index_offset = desc.index_offset;
        triangles.index_count = desc.index_count;
        triangles.index_type = desc.index_format.to_vk();
    }

    Ok(vk::GeometryNV {
        geometry_type: desc.ty.to_vk(),
        geometry: vk::GeometryDataNV {
            triangles,
            aabbs: vk::GeometryAABBNV::default(),
            ..Default::default()
        },
        flags: vk::GeometryFlagsNV::OPAQUE,
        ..Default::default()
    })
}
