use bytemuck::{Pod, Zeroable};

use crate::constants::FLOATS_PER_VERTEX;

/// Interleaved chunk vertex as stored in the atlas.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<Vertex>() == FLOATS_PER_VERTEX * 4);

impl Vertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Number of whole vertices in a flat float array.
pub fn vertex_count(floats: &[f32]) -> u32 {
    (floats.len() / FLOATS_PER_VERTEX) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_atlas_floats() {
        let layout = Vertex::desc();
        assert_eq!(layout.array_stride, (FLOATS_PER_VERTEX * 4) as u64);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Vertex);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[1].shader_location, 1);
    }

    #[test]
    fn test_vertex_count_ignores_partial_vertices() {
        assert_eq!(vertex_count(&[0.0; 18]), 3);
        assert_eq!(vertex_count(&[0.0; 20]), 3);
        assert_eq!(vertex_count(&[]), 0);
    }
}
