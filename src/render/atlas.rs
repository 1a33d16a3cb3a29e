//! Chunk vertex atlas.
//!
//! One growable buffer holds the vertices of every placed chunk and merged
//! column. Allocation is a bump pointer: a region whose size changes is
//! abandoned and the new data is appended, so abandoned regions stay as holes
//! until the next growth rebuild. When an append does not fit, the capacity is
//! multiplied by the growth factor and the whole buffer is repopulated from the
//! CPU-side mesh cache. GPU contents are never copied between buffers.

use thiserror::Error;

use crate::constants::{BYTES_PER_FLOAT, FLOATS_PER_VERTEX};
use crate::core::chunk::ChunkCoord;
use crate::render::buffer::AtlasBuffer;
use crate::render::column::ColumnCombiner;
use crate::render::mesh_cache::{ChunkMeshCache, Region};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    #[error("chunk atlas needs {required_bytes} bytes but is capped at {max_bytes} bytes")]
    CapacityExceeded { required_bytes: u64, max_bytes: u64 },
}

pub struct Atlas<B: AtlasBuffer> {
    buffer: B,
    used_floats: usize,
    wasted_floats: usize,
    max_capacity_bytes: u64,
    growth_factor: u64,
    generation: u64,
    rebuilds: u64,
}

impl<B: AtlasBuffer> Atlas<B> {
    pub fn new(
        mut buffer: B,
        initial_capacity_bytes: u64,
        max_capacity_bytes: u64,
        growth_factor: u64,
    ) -> Self {
        let initial = initial_capacity_bytes
            .max(BYTES_PER_FLOAT)
            .next_multiple_of(BYTES_PER_FLOAT);
        buffer.reallocate(initial);

        Self {
            buffer,
            used_floats: 0,
            wasted_floats: 0,
            max_capacity_bytes: max_capacity_bytes.max(initial),
            growth_factor: growth_factor.max(2),
            generation: 0,
            rebuilds: 0,
        }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.buffer.capacity_bytes()
    }

    pub fn max_capacity_bytes(&self) -> u64 {
        self.max_capacity_bytes
    }

    /// Bump pointer, in floats.
    pub fn used_floats(&self) -> usize {
        self.used_floats
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_floats as u64 * BYTES_PER_FLOAT
    }

    /// Floats in regions that were abandoned since the last rebuild.
    pub fn wasted_floats(&self) -> usize {
        self.wasted_floats
    }

    /// Number of full rebuilds so far. Regions recorded under an older
    /// generation are no longer valid.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rebuilds from CPU vertices, excluding `reset`.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn grown_capacity(&self, required_bytes: u64) -> Result<u64, AtlasError> {
        if required_bytes > self.max_capacity_bytes {
            return Err(AtlasError::CapacityExceeded {
                required_bytes,
                max_bytes: self.max_capacity_bytes,
            });
        }

        let mut capacity = self.buffer.capacity_bytes().max(1);
        while capacity < required_bytes {
            capacity = capacity
                .saturating_mul(self.growth_factor)
                .min(self.max_capacity_bytes);
        }
        Ok(capacity)
    }

    /// Makes room for `required_bytes`. Returns `Ok(true)` if the buffer was
    /// reallocated, in which case every chunk has been re-placed from its CPU
    /// vertices and every column is dirty.
    pub fn ensure_capacity(
        &mut self,
        required_bytes: u64,
        meshes: &mut ChunkMeshCache,
        columns: &mut ColumnCombiner,
    ) -> Result<bool, AtlasError> {
        if required_bytes <= self.buffer.capacity_bytes() {
            return Ok(false);
        }

        let old_capacity = self.buffer.capacity_bytes();
        let new_capacity = match self.grown_capacity(required_bytes) {
            Ok(capacity) => capacity,
            Err(err) => {
                tracing::warn!(
                    required_bytes,
                    max_bytes = self.max_capacity_bytes,
                    "Chunk atlas reached its capacity ceiling"
                );
                return Err(err);
            }
        };

        tracing::info!(
            "Growing chunk atlas: {} -> {} bytes ({} used, {} wasted floats)",
            old_capacity,
            new_capacity,
            self.used_bytes(),
            self.wasted_floats
        );
        self.buffer.reallocate(new_capacity);
        self.rebuild_from_cpu(meshes, columns)?;
        Ok(true)
    }

    /// Resets the bump pointer and copies every non-empty chunk mesh back into
    /// the buffer in coordinate order. Column regions are dropped and every
    /// column is marked dirty.
    pub fn rebuild_from_cpu(
        &mut self,
        meshes: &mut ChunkMeshCache,
        columns: &mut ColumnCombiner,
    ) -> Result<(), AtlasError> {
        let required_bytes = meshes.total_floats() as u64 * BYTES_PER_FLOAT;
        if required_bytes > self.buffer.capacity_bytes() {
            let capacity = self.grown_capacity(required_bytes)?;
            self.buffer.reallocate(capacity);
        }

        self.used_floats = 0;
        self.wasted_floats = 0;
        self.generation += 1;
        self.rebuilds += 1;

        let mut placed = 0usize;
        for coord in meshes.sorted_coords() {
            let Some(record) = meshes.get_mut(coord) else {
                continue;
            };
            if record.is_empty() {
                record.set_placement(None);
                continue;
            }
            let region = Region {
                offset_floats: self.used_floats,
                len_floats: record.cpu_vertices().len(),
            };
            self.buffer.write(region.offset_floats, record.cpu_vertices());
            self.used_floats = region.end_floats();
            record.set_placement(Some(region));
            placed += 1;
        }

        columns.invalidate_all();

        tracing::debug!(
            generation = self.generation,
            placed,
            used_floats = self.used_floats,
            "Rebuilt chunk atlas from CPU meshes"
        );
        Ok(())
    }

    /// Writes the current CPU vertices of `coord` into the atlas.
    ///
    /// Same-size updates overwrite the existing region. Anything else abandons
    /// the old region and appends at the bump pointer.
    pub fn place_chunk(
        &mut self,
        coord: ChunkCoord,
        meshes: &mut ChunkMeshCache,
        columns: &mut ColumnCombiner,
    ) -> Result<(), AtlasError> {
        let Some(record) = meshes.get_mut(coord) else {
            return Ok(());
        };
        let len = record.cpu_vertices().len();
        let previous = record.placement();

        if len == 0 {
            if let Some(old) = previous {
                self.wasted_floats += old.len_floats;
            }
            record.set_placement(None);
            return Ok(());
        }

        if let Some(region) = previous {
            if region.len_floats == len {
                self.buffer.write(region.offset_floats, record.cpu_vertices());
                return Ok(());
            }
        }

        // The old region no longer matches the CPU vertices, so it is dropped
        // before growing. A failed growth leaves the chunk unplaced.
        if let Some(old) = previous {
            self.wasted_floats += old.len_floats;
        }
        record.set_placement(None);

        let required_bytes = (self.used_floats + len) as u64 * BYTES_PER_FLOAT;
        if self.ensure_capacity(required_bytes, meshes, columns)? {
            // The rebuild already placed this chunk's new vertices.
            return Ok(());
        }

        let Some(record) = meshes.get_mut(coord) else {
            return Ok(());
        };
        let region = self.bump(len);
        self.buffer.write(region.offset_floats, record.cpu_vertices());
        record.set_placement(Some(region));
        Ok(())
    }

    /// Appends `data` at the bump pointer, growing the atlas if needed.
    pub fn append(
        &mut self,
        data: &[f32],
        meshes: &mut ChunkMeshCache,
        columns: &mut ColumnCombiner,
    ) -> Result<Region, AtlasError> {
        let required_bytes = (self.used_floats + data.len()) as u64 * BYTES_PER_FLOAT;
        self.ensure_capacity(required_bytes, meshes, columns)?;

        let region = self.bump(data.len());
        self.buffer.write(region.offset_floats, data);
        Ok(region)
    }

    /// Overwrites a live region with data of exactly the same length.
    pub fn write_in_place(&mut self, region: Region, data: &[f32]) {
        debug_assert_eq!(region.len_floats, data.len());
        debug_assert!(region.end_floats() <= self.used_floats);
        self.buffer.write(region.offset_floats, data);
    }

    /// Marks a region as no longer referenced. Its space is not reused.
    pub fn abandon(&mut self, region: Region) {
        self.wasted_floats += region.len_floats;
    }

    fn bump(&mut self, len_floats: usize) -> Region {
        let region = Region {
            offset_floats: self.used_floats,
            len_floats,
        };
        self.used_floats += len_floats;
        debug_assert!(self.used_bytes() <= self.buffer.capacity_bytes());
        region
    }

    /// Drops every placement without touching the buffer.
    pub fn reset(&mut self) {
        self.used_floats = 0;
        self.wasted_floats = 0;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::{CpuAtlasBuffer, WgpuAtlasBuffer};

    fn verts(floats: usize, seed: f32) -> Vec<f32> {
        assert_eq!(floats % FLOATS_PER_VERTEX, 0);
        (0..floats).map(|i| seed + i as f32 * 0.25).collect()
    }

    fn atlas(initial_floats: u64) -> Atlas<CpuAtlasBuffer> {
        Atlas::new(CpuAtlasBuffer::new(), initial_floats * 4, 1 << 30, 2)
    }

    fn assert_placed(atlas: &Atlas<CpuAtlasBuffer>, meshes: &ChunkMeshCache, coord: ChunkCoord) {
        let record = meshes.get(coord).unwrap();
        let region = record.placement().unwrap();
        assert_eq!(region.len_floats, record.vertex_count() as usize * FLOATS_PER_VERTEX);
        assert_eq!(
            atlas.buffer().read(region.offset_floats, region.len_floats),
            record.cpu_vertices()
        );
    }

    #[test]
    fn test_growth_rebuilds_and_places_at_zero() {
        let mut atlas = atlas(1_000);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let coord = ChunkCoord::new(0, 0, 0);

        meshes.insert(coord, verts(1_200, 1.0));
        atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap();

        assert!(atlas.capacity_bytes() >= 1_200 * 4);
        assert_eq!(atlas.capacity_bytes(), 2_000 * 4);
        assert_eq!(atlas.generation(), 1);
        assert_eq!(meshes.get(coord).unwrap().placement().unwrap().offset_floats, 0);
        assert_placed(&atlas, &meshes, coord);
    }

    #[test]
    fn test_same_size_update_is_written_in_place() {
        let mut atlas = atlas(10_000);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let a = ChunkCoord::new(0, 0, 0);
        let b = ChunkCoord::new(1, 0, 0);

        meshes.insert(a, verts(60, 1.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();
        meshes.insert(b, verts(90, 2.0));
        atlas.place_chunk(b, &mut meshes, &mut columns).unwrap();
        let region = meshes.get(a).unwrap().placement().unwrap();
        let used = atlas.used_floats();

        meshes.insert(a, verts(60, 7.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();

        assert_eq!(meshes.get(a).unwrap().placement(), Some(region));
        assert_eq!(atlas.used_floats(), used);
        assert_eq!(atlas.wasted_floats(), 0);
        assert_placed(&atlas, &meshes, a);
        assert_placed(&atlas, &meshes, b);
    }

    #[test]
    fn test_resized_update_appends_and_leaves_hole() {
        let mut atlas = atlas(10_000);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let a = ChunkCoord::new(0, 0, 0);

        meshes.insert(a, verts(60, 1.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();
        meshes.insert(a, verts(90, 3.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();

        let region = meshes.get(a).unwrap().placement().unwrap();
        assert_eq!(region.offset_floats, 60);
        assert_eq!(atlas.used_floats(), 150);
        assert_eq!(atlas.wasted_floats(), 60);
        assert_placed(&atlas, &meshes, a);
    }

    #[test]
    fn test_empty_mesh_is_unplaced() {
        let mut atlas = atlas(1_000);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let a = ChunkCoord::new(0, 0, 0);

        meshes.insert(a, verts(12, 1.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();
        meshes.insert(a, Vec::new());
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();

        assert_eq!(meshes.get(a).unwrap().placement(), None);
        assert_eq!(atlas.used_floats(), 12);
        assert_eq!(atlas.wasted_floats(), 12);
    }

    #[test]
    fn test_used_floats_only_shrinks_on_rebuild() {
        let mut atlas = atlas(96);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();

        let mut last_used = 0;
        let mut last_generation = atlas.generation();
        for step in 0..40usize {
            let coord = ChunkCoord::new((step % 5) as i32, 0, 0);
            let floats = FLOATS_PER_VERTEX * (1 + (step * 7) % 11);
            meshes.insert(coord, verts(floats, step as f32));
            atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap();

            if atlas.generation() == last_generation {
                assert!(atlas.used_floats() >= last_used);
            }
            assert!(atlas.used_bytes() <= atlas.capacity_bytes());
            last_used = atlas.used_floats();
            last_generation = atlas.generation();
        }

        for coord in meshes.sorted_coords() {
            assert_placed(&atlas, &meshes, coord);
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut atlas = atlas(10_000);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        for (i, coord) in [
            ChunkCoord::new(3, 1, -2),
            ChunkCoord::new(-1, 0, 4),
            ChunkCoord::new(0, 2, 0),
        ]
        .into_iter()
        .enumerate()
        {
            meshes.insert(coord, verts(FLOATS_PER_VERTEX * (i + 2), i as f32));
            atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap();
        }
        meshes.insert(ChunkCoord::new(9, 9, 9), Vec::new());

        atlas.rebuild_from_cpu(&mut meshes, &mut columns).unwrap();
        let first_contents = atlas.buffer().as_slice().to_vec();
        let first_offsets: Vec<_> = meshes
            .sorted_coords()
            .into_iter()
            .map(|c| meshes.get(c).unwrap().placement())
            .collect();

        atlas.rebuild_from_cpu(&mut meshes, &mut columns).unwrap();
        let second_offsets: Vec<_> = meshes
            .sorted_coords()
            .into_iter()
            .map(|c| meshes.get(c).unwrap().placement())
            .collect();

        assert_eq!(atlas.buffer().as_slice(), first_contents.as_slice());
        assert_eq!(first_offsets, second_offsets);
        assert_eq!(meshes.get(ChunkCoord::new(9, 9, 9)).unwrap().placement(), None);
    }

    #[test]
    fn test_capacity_ceiling_is_reported() {
        let mut atlas = Atlas::new(CpuAtlasBuffer::new(), 96, 192, 2);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let coord = ChunkCoord::new(0, 0, 0);

        meshes.insert(coord, verts(60, 1.0));
        let err = atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap_err();

        assert_eq!(
            err,
            AtlasError::CapacityExceeded {
                required_bytes: 240,
                max_bytes: 192
            }
        );
        assert_eq!(atlas.used_floats(), 0);
        assert_eq!(atlas.capacity_bytes(), 96);
    }

    #[test]
    fn test_failed_resize_leaves_chunk_unplaced() {
        let mut atlas = Atlas::new(CpuAtlasBuffer::new(), 96, 192, 2);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let coord = ChunkCoord::new(0, 0, 0);

        meshes.insert(coord, verts(12, 1.0));
        atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap();
        meshes.insert(coord, verts(60, 2.0));
        let err = atlas.place_chunk(coord, &mut meshes, &mut columns).unwrap_err();

        assert_eq!(
            err,
            AtlasError::CapacityExceeded {
                required_bytes: 288,
                max_bytes: 192
            }
        );
        let record = meshes.get(coord).unwrap();
        assert_eq!(record.placement(), None);
        assert_eq!(record.cpu_vertices().len(), 60);
        assert_eq!(atlas.used_floats(), 12);
        assert_eq!(atlas.wasted_floats(), 12);
    }

    #[test]
    fn test_growth_reallocates_gpu_buffer() {
        let (device, queue) = wgpu::Device::noop(&wgpu::DeviceDescriptor::default());
        let mut atlas = Atlas::new(WgpuAtlasBuffer::new(&device, &queue), 96, 1 << 20, 2);
        let mut meshes = ChunkMeshCache::new();
        let mut columns = ColumnCombiner::new();
        let a = ChunkCoord::new(0, 0, 0);
        let b = ChunkCoord::new(0, 1, 0);

        meshes.insert(a, verts(12, 1.0));
        atlas.place_chunk(a, &mut meshes, &mut columns).unwrap();
        assert_eq!(atlas.generation(), 0);

        meshes.insert(b, verts(60, 2.0));
        atlas.place_chunk(b, &mut meshes, &mut columns).unwrap();

        assert_eq!(atlas.capacity_bytes(), 384);
        assert_eq!(atlas.buffer().buffer().size(), 384);
        assert_eq!(atlas.generation(), 1);
        assert_eq!(atlas.used_floats(), 72);
        assert_eq!(
            meshes.get(b).unwrap().placement(),
            Some(Region {
                offset_floats: 12,
                len_floats: 60
            })
        );
    }
}
