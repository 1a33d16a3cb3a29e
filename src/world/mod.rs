//! World-side collaborators
//! The traits the renderer consumes plus a heightmap world for headless runs.

pub mod generator;
pub mod terrain;

use crate::core::chunk::ChunkCoord;

// Re-export commonly used types
pub use generator::TerrainGenerator;
pub use terrain::HeightmapWorld;

/// Chunk storage as seen by the renderer.
pub trait ChunkSource {
    /// Every chunk the world currently holds.
    fn all_chunks(&self) -> Vec<ChunkCoord>;

    /// Whether the chunk's blocks changed since it was last meshed.
    fn is_dirty(&self, coord: ChunkCoord) -> bool;

    fn set_clean(&mut self, coord: ChunkCoord);
}

/// Turns a chunk into a flat vertex array (position + normal per vertex,
/// counter-clockwise triangles). An empty array is a valid result.
pub trait ChunkMesher<W: ?Sized> {
    fn build_mesh(&mut self, world: &W, coord: ChunkCoord) -> Vec<f32>;
}
