use rustc_hash::{FxHashMap, FxHashSet};

use crate::constants::*;
use crate::core::block::BlockType;
use crate::core::chunk::{ChunkCoord, ColumnKey};
use crate::world::ChunkSource;
use crate::world::generator::TerrainGenerator;

const CHUNK_LEVELS: i32 = WORLD_HEIGHT / CHUNK_SIZE;
const COLUMN_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Cubic-chunk world backed by a height function plus sparse block edits.
///
/// Blocks are a pure function of the generator and the edit list, so every
/// position can be queried whether or not its chunk is loaded. Loading only
/// decides which chunks are offered to the renderer.
pub struct HeightmapWorld {
    generator: TerrainGenerator,
    heights: FxHashMap<ColumnKey, Box<[i32; COLUMN_AREA]>>,
    edits: FxHashMap<(i32, i32, i32), BlockType>,
    edit_tops: FxHashMap<(i32, i32), i32>,
    chunks: FxHashMap<ChunkCoord, bool>,
}

impl HeightmapWorld {
    pub fn new(seed: u32) -> Self {
        Self::with_generator(TerrainGenerator::new(seed))
    }

    /// World whose surface is at `height` everywhere.
    pub fn flat(height: i32) -> Self {
        Self::with_generator(TerrainGenerator::flat(height))
    }

    pub fn with_generator(generator: TerrainGenerator) -> Self {
        Self {
            generator,
            heights: FxHashMap::default(),
            edits: FxHashMap::default(),
            edit_tops: FxHashMap::default(),
            chunks: FxHashMap::default(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Loads every chunk of every column within `radius` (horizontal chunk
    /// distance) of `center`. New chunks start dirty. Returns how many were added.
    pub fn load_around(&mut self, center: ChunkCoord, radius: i32) -> usize {
        let r_sq = radius as i64 * radius as i64;
        let mut added = 0;
        for cx in (center.x - radius)..=(center.x + radius) {
            for cz in (center.z - radius)..=(center.z + radius) {
                let dx = (cx - center.x) as i64;
                let dz = (cz - center.z) as i64;
                if dx * dx + dz * dz > r_sq {
                    continue;
                }
                self.ensure_heights(ColumnKey::new(cx, cz));
                for cy in 0..CHUNK_LEVELS {
                    let coord = ChunkCoord::new(cx, cy, cz);
                    if !self.chunks.contains_key(&coord) {
                        self.chunks.insert(coord, true);
                        added += 1;
                    }
                }
            }
        }
        if added > 0 {
            tracing::debug!(added, total = self.chunks.len(), "Loaded chunks");
        }
        added
    }

    /// Drops chunks whose column lies outside `radius` of `center`.
    /// Block edits are kept. Returns how many chunks were dropped.
    pub fn unload_outside(&mut self, center: ChunkCoord, radius: i32) -> usize {
        let r_sq = radius as i64 * radius as i64;
        let outside = |key: ColumnKey| {
            let dx = (key.x - center.x) as i64;
            let dz = (key.z - center.z) as i64;
            dx * dx + dz * dz > r_sq
        };

        let before = self.chunks.len();
        self.chunks.retain(|coord, _| !outside(coord.column()));
        self.heights.retain(|key, _| !outside(*key));
        let removed = before - self.chunks.len();
        if removed > 0 {
            tracing::debug!(removed, total = self.chunks.len(), "Unloaded chunks");
        }
        removed
    }

    fn ensure_heights(&mut self, key: ColumnKey) {
        if self.heights.contains_key(&key) {
            return;
        }
        let mut heights = Box::new([0i32; COLUMN_AREA]);
        let base_x = key.x * CHUNK_SIZE;
        let base_z = key.z * CHUNK_SIZE;
        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                heights[(lx * CHUNK_SIZE + lz) as usize] =
                    self.generator.height(base_x + lx, base_z + lz);
            }
        }
        self.heights.insert(key, heights);
    }

    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let key = ColumnKey::new(x.div_euclid(CHUNK_SIZE), z.div_euclid(CHUNK_SIZE));
        match self.heights.get(&key) {
            Some(heights) => {
                let lx = x.rem_euclid(CHUNK_SIZE);
                let lz = z.rem_euclid(CHUNK_SIZE);
                heights[(lx * CHUNK_SIZE + lz) as usize]
            }
            None => self.generator.height(x, z),
        }
    }

    /// One past the highest block that can be solid in the column at (x, z).
    pub fn column_top(&self, x: i32, z: i32) -> i32 {
        let surface = self.surface_height(x, z);
        self.edit_tops.get(&(x, z)).map_or(surface, |top| surface.max(*top))
    }

    /// Block at a world position. Everything below the world is solid so the
    /// bottom layer never exposes faces.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockType {
        if y < 0 {
            return BlockType::Stone;
        }
        if y >= WORLD_HEIGHT {
            return BlockType::Air;
        }
        if let Some(block) = self.edits.get(&(x, y, z)) {
            return *block;
        }
        BlockType::for_depth(y, self.surface_height(x, z))
    }

    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.get_block(x, y, z).is_solid()
    }

    /// Changes one block and dirties its chunk, plus every loaded neighbour
    /// that shares the edited block's faces.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockType) {
        if y < 0 || y >= WORLD_HEIGHT {
            return;
        }
        self.edits.insert((x, y, z), block);
        if block.is_solid() {
            let top = self.edit_tops.entry((x, z)).or_insert(0);
            *top = (*top).max(y + 1);
        }

        let mut touched = FxHashSet::default();
        for (dx, dy, dz) in [
            (0, 0, 0),
            (-1, 0, 0),
            (1, 0, 0),
            (0, -1, 0),
            (0, 1, 0),
            (0, 0, -1),
            (0, 0, 1),
        ] {
            touched.insert(ChunkCoord::new(
                (x + dx).div_euclid(CHUNK_SIZE),
                (y + dy).div_euclid(CHUNK_SIZE),
                (z + dz).div_euclid(CHUNK_SIZE),
            ));
        }
        for coord in touched {
            self.mark_dirty(coord);
        }
    }

    /// Flags a loaded chunk for remeshing.
    pub fn mark_dirty(&mut self, coord: ChunkCoord) {
        if let Some(dirty) = self.chunks.get_mut(&coord) {
            *dirty = true;
        }
    }

    pub fn dirty_count(&self) -> usize {
        self.chunks.values().filter(|dirty| **dirty).count()
    }
}

impl ChunkSource for HeightmapWorld {
    fn all_chunks(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    fn is_dirty(&self, coord: ChunkCoord) -> bool {
        self.chunks.get(&coord).copied().unwrap_or(false)
    }

    fn set_clean(&mut self, coord: ChunkCoord) {
        if let Some(dirty) = self.chunks.get_mut(&coord) {
            *dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_unload_by_column_distance() {
        let mut world = HeightmapWorld::flat(20);
        let added = world.load_around(ChunkCoord::new(0, 0, 0), 1);
        // (0,0) plus its four axis neighbours, every level
        assert_eq!(added, 5 * CHUNK_LEVELS as usize);
        assert_eq!(world.load_around(ChunkCoord::new(0, 3, 0), 1), 0);
        assert!(world.is_dirty(ChunkCoord::new(1, 0, 0)));
        assert!(!world.is_loaded(ChunkCoord::new(1, 0, 1)));

        let removed = world.unload_outside(ChunkCoord::new(1, 0, 0), 0);
        assert_eq!(removed, 4 * CHUNK_LEVELS as usize);
        assert!(world.is_loaded(ChunkCoord::new(1, 5, 0)));
    }

    #[test]
    fn test_blocks_follow_surface_and_edits() {
        let mut world = HeightmapWorld::flat(8);
        assert!(world.is_solid(3, 7, -3));
        assert!(!world.is_solid(3, 8, -3));
        assert!(world.is_solid(0, -1, 0));

        world.set_block(3, 30, -3, BlockType::Stone);
        world.set_block(3, 7, -3, BlockType::Air);
        assert_eq!(world.get_block(3, 30, -3), BlockType::Stone);
        assert_eq!(world.get_block(3, 7, -3), BlockType::Air);
        assert_eq!(world.column_top(3, -3), 31);
        assert_eq!(world.column_top(4, -3), 8);
    }

    #[test]
    fn test_edit_on_chunk_border_dirties_neighbour() {
        let mut world = HeightmapWorld::flat(8);
        world.load_around(ChunkCoord::new(0, 0, 0), 2);
        for coord in world.all_chunks() {
            world.set_clean(coord);
        }

        world.set_block(15, 5, 3, BlockType::Air);

        assert!(world.is_dirty(ChunkCoord::new(0, 0, 0)));
        assert!(world.is_dirty(ChunkCoord::new(1, 0, 0)));
        assert!(!world.is_dirty(ChunkCoord::new(-1, 0, 0)));
        assert!(!world.is_dirty(ChunkCoord::new(0, 1, 0)));
        assert_eq!(world.dirty_count(), 2);
    }

    #[test]
    fn test_all_chunks_is_sorted() {
        let mut world = HeightmapWorld::flat(8);
        world.load_around(ChunkCoord::new(4, 0, -2), 2);
        let chunks = world.all_chunks();
        assert!(chunks.windows(2).all(|w| w[0] < w[1]));
    }
}
