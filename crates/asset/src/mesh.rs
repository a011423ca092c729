//! CPU-side mesh representation used by loaders.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex: position/normal/uv plus tangent frame for normal mapping.
/// Values are in object space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// One entry of the vertex layout table: shader location, float count, byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u64,
}

impl Vertex {
    pub const STRIDE: u64 = size_of::<Vertex>() as u64;

    /// Attribute table derived from the struct layout, in shader-location order.
    pub const ATTRIBUTES: [VertexAttribute; 5] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: offset_of!(Vertex, position) as u64,
        },
        VertexAttribute {
            location: 1,
            components: 3,
            offset: offset_of!(Vertex, normal) as u64,
        },
        VertexAttribute {
            location: 2,
            components: 2,
            offset: offset_of!(Vertex, uv) as u64,
        },
        VertexAttribute {
            location: 3,
            components: 3,
            offset: offset_of!(Vertex, tangent) as u64,
        },
        VertexAttribute {
            location: 4,
            components: 3,
            offset: offset_of!(Vertex, bitangent) as u64,
        },
    ];

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            ..Self::default()
        }
    }
}

/// Indexed triangle list with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    /// Every index addresses a vertex and the list is made of whole triangles.
    pub fn is_triangle_list(&self) -> bool {
        let count = self.vertices.len();
        self.indices.len() % 3 == 0 && self.indices.iter().all(|&i| (i as usize) < count)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![Vertex::default()], vec![0]);
        assert!(data.is_valid());
        assert!(!data.is_triangle_list());
    }

    #[test]
    fn out_of_range_index_is_not_a_triangle_list() {
        let data = MeshData::new(vec![Vertex::default(); 3], vec![0, 1, 3]);
        assert!(!data.is_triangle_list());
        let data = MeshData::new(vec![Vertex::default(); 3], vec![0, 1, 2]);
        assert!(data.is_triangle_list());
        assert_eq!(data.triangle_count(), 1);
    }

    #[test]
    fn layout_is_tightly_interleaved() {
        assert_eq!(Vertex::STRIDE, 14 * 4);
        let offsets: Vec<u64> = Vertex::ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32, 44]);
        let floats: u32 = Vertex::ATTRIBUTES.iter().map(|a| a.components).sum();
        assert_eq!(u64::from(floats) * 4, Vertex::STRIDE);
    }
}
