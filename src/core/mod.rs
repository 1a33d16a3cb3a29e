//! Core data structures
//! Contains chunk coordinates, block types and the atlas vertex layout.

pub mod block;
pub mod chunk;
pub mod vertex;

// Re-export commonly used types
pub use block::BlockType;
pub use chunk::{ChunkCoord, ColumnKey};
pub use vertex::Vertex;
