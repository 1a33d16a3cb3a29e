// World constants
pub const CHUNK_SIZE: i32 = 16;
pub const WORLD_HEIGHT: i32 = 128;
pub const SEA_LEVEL: i32 = 48;

// Vertex layout: position(3) + normal(3)
pub const FLOATS_PER_VERTEX: usize = 6;
pub const BYTES_PER_FLOAT: u64 = 4;

// Build budgets
pub const NEAR_BUILD_BUDGET: usize = 4;
pub const FAR_BUILD_BUDGET: usize = 2;
pub const NEAR_RADIUS: i32 = 4;
pub const RENDER_DISTANCE: i32 = 10;
pub const CHUNK_RETAIN_DISTANCE: i32 = 16;

// Culling
pub const FRUSTUM_MARGIN: f32 = 2.0;
pub const MATRIX_EPSILON: f32 = 1e-3;

// Atlas
pub const INITIAL_ATLAS_BYTES: u64 = 4 * 1024 * 1024;
pub const MAX_ATLAS_BYTES: u64 = 1024 * 1024 * 1024;
pub const ATLAS_GROWTH_FACTOR: u64 = 2;
