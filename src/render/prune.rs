//! Mesh eviction.

use rustc_hash::FxHashSet;

use crate::core::chunk::ChunkCoord;
use crate::render::atlas::Atlas;
use crate::render::buffer::AtlasBuffer;
use crate::render::mesh_cache::ChunkMeshCache;
use crate::world::ChunkSource;

/// Removes every cached mesh whose chunk the world no longer holds or that
/// lies outside `radius` of `center`, abandoning its atlas region. Returns the
/// number of meshes removed.
///
/// Columns are not touched here. Removing a member changes the column's
/// revision, so the next `ColumnCombiner::ensure` re-merges it.
pub fn prune_meshes<B: AtlasBuffer, W: ChunkSource + ?Sized>(
    meshes: &mut ChunkMeshCache,
    atlas: &mut Atlas<B>,
    world: &W,
    center: ChunkCoord,
    radius: i32,
) -> usize {
    let live: FxHashSet<ChunkCoord> = world.all_chunks().into_iter().collect();

    let mut removed = 0;
    for coord in meshes.sorted_coords() {
        if live.contains(&coord) && coord.within_radius(center, radius) {
            continue;
        }
        if let Some(record) = meshes.remove(coord) {
            if let Some(region) = record.placement() {
                atlas.abandon(region);
            }
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::CpuAtlasBuffer;
    use crate::render::column::ColumnCombiner;

    struct ListWorld(Vec<ChunkCoord>);

    impl ChunkSource for ListWorld {
        fn all_chunks(&self) -> Vec<ChunkCoord> {
            self.0.clone()
        }

        fn is_dirty(&self, _coord: ChunkCoord) -> bool {
            false
        }

        fn set_clean(&mut self, _coord: ChunkCoord) {}
    }

    #[test]
    fn test_prunes_missing_and_distant_meshes() {
        let mut atlas = Atlas::new(CpuAtlasBuffer::new(), 4096, 1 << 20, 2);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();

        let kept = ChunkCoord::new(1, 0, 1);
        let unloaded = ChunkCoord::new(2, 0, 0);
        let distant = ChunkCoord::new(9, 0, 0);
        let empty = ChunkCoord::new(0, 0, 0);
        for coord in [kept, unloaded, distant] {
            meshes.insert(coord, vec![1.0; 12]);
            atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap();
        }
        meshes.insert(empty, Vec::new());

        let world = ListWorld(vec![kept, distant]);
        let removed = prune_meshes(&mut meshes, &mut atlas, &world, ChunkCoord::new(0, 0, 0), 4);

        assert_eq!(removed, 3);
        assert_eq!(meshes.sorted_coords(), vec![kept]);
        assert_eq!(atlas.wasted_floats(), 24);
    }
}
