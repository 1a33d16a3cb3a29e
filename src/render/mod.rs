//! Rendering-related modules
//! Contains the vertex atlas, column merging, frustum culling, the per-frame
//! scheduler and the draw submission backends.

pub mod atlas;
pub mod batch;
pub mod buffer;
pub mod column;
pub mod frustum;
pub mod indirect;
pub mod mesh;
pub mod mesh_cache;
pub mod prune;
pub mod scheduler;

// Re-export commonly used types
pub use atlas::{Atlas, AtlasError};
pub use batch::{DrawBatch, DrawSink, RecordingSink};
pub use buffer::{AtlasBuffer, CpuAtlasBuffer, WgpuAtlasBuffer};
pub use column::{ColumnCombiner, ColumnMeshRecord};
pub use frustum::{AABB, Frustum, FrustumCuller, extract_frustum_planes};
pub use indirect::{DrawIndirect, IndirectDrawer};
pub use mesh::{FaceMesher, add_quad};
pub use mesh_cache::{ChunkMeshCache, ChunkMeshRecord, Region};
pub use prune::prune_meshes;
pub use scheduler::{ChunkRenderer, FrameStats};
