// Core module with fundamental types
pub mod core;

// Render module with the atlas, culling and draw scheduling
pub mod render;

// World collaborator traits and the heightmap world
pub mod world;

// Settings and timing
pub mod utils;

// Other modules
pub mod constants;

// Re-exports
pub use constants::*;
pub use crate::core::{BlockType, ChunkCoord, ColumnKey, Vertex};
pub use render::{
    AABB, Atlas, AtlasBuffer, AtlasError, ChunkMeshCache, ChunkRenderer, ColumnCombiner,
    CpuAtlasBuffer, DrawBatch, DrawSink, FaceMesher, FrameStats, FrustumCuller, IndirectDrawer,
    RecordingSink, Region, WgpuAtlasBuffer,
};
pub use utils::{ConfigError, FrameTimings, RenderSettings, ScopedTimer};
pub use world::{ChunkMesher, ChunkSource, HeightmapWorld, TerrainGenerator};
