//! Column merging.
//!
//! All chunk meshes sharing an (x, z) column are concatenated into one atlas
//! region so a whole column costs a single sub-draw. A column is stale as soon
//! as the mesh cache reports a different revision for it, or after an atlas
//! rebuild.

use rustc_hash::FxHashMap;

use crate::core::chunk::ColumnKey;
use crate::core::vertex::vertex_count;
use crate::render::atlas::{Atlas, AtlasError};
use crate::render::buffer::AtlasBuffer;
use crate::render::mesh_cache::{ChunkMeshCache, Region};

#[derive(Debug, Clone)]
pub struct ColumnMeshRecord {
    cpu_vertices: Vec<f32>,
    vertex_count: u32,
    placement: Option<Region>,
    dirty: bool,
    revision: u64,
}

impl Default for ColumnMeshRecord {
    fn default() -> Self {
        Self {
            cpu_vertices: Vec::new(),
            vertex_count: 0,
            placement: None,
            dirty: true,
            revision: 0,
        }
    }
}

impl ColumnMeshRecord {
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn cpu_vertices(&self) -> &[f32] {
        &self.cpu_vertices
    }

    pub fn placement(&self) -> Option<Region> {
        self.placement
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn ready_region(&self) -> Option<Region> {
        if self.dirty || self.vertex_count == 0 {
            return None;
        }
        self.placement
    }
}

#[derive(Debug, Default)]
pub struct ColumnCombiner {
    records: FxHashMap<ColumnKey, ColumnMeshRecord>,
    merges: u64,
    in_place_updates: u64,
}

impl ColumnCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ColumnKey) -> Option<&ColumnMeshRecord> {
        self.records.get(&key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `ensure` would have to redo the merge for this column.
    pub fn is_dirty(&self, key: ColumnKey, meshes: &ChunkMeshCache) -> bool {
        match self.records.get(&key) {
            Some(record) => record.dirty || record.revision != meshes.column_revision(key),
            None => true,
        }
    }

    pub fn mark_dirty(&mut self, key: ColumnKey) {
        if let Some(record) = self.records.get_mut(&key) {
            record.dirty = true;
        }
    }

    /// Marks every column dirty and forgets its placement. Called after the
    /// atlas is rebuilt, since column regions are not carried over.
    pub fn invalidate_all(&mut self) {
        for record in self.records.values_mut() {
            record.dirty = true;
            record.placement = None;
        }
    }

    /// Brings the merged region of `key` up to date and returns it if the
    /// column is ready to draw.
    ///
    /// A column whose chunks currently hold no vertices stays dirty and yields
    /// `None`, so callers keep drawing its chunks individually instead of
    /// publishing an empty region.
    pub fn ensure<B: AtlasBuffer>(
        &mut self,
        key: ColumnKey,
        meshes: &mut ChunkMeshCache,
        atlas: &mut Atlas<B>,
    ) -> Result<Option<Region>, AtlasError> {
        let revision = meshes.column_revision(key);
        let record = self.records.entry(key).or_default();
        if record.revision != revision {
            record.dirty = true;
        }
        if !record.dirty {
            return Ok(record.ready_region());
        }

        let total = meshes.column_floats(key);
        if total == 0 {
            return Ok(None);
        }

        let mut merged = Vec::with_capacity(total);
        for chunk in meshes.column_records(key) {
            merged.extend_from_slice(chunk.cpu_vertices());
        }

        if let Some(region) = record.placement {
            if region.len_floats == total {
                atlas.write_in_place(region, &merged);
                record.vertex_count = vertex_count(&merged);
                record.cpu_vertices = merged;
                record.dirty = false;
                record.revision = revision;
                self.in_place_updates += 1;
                return Ok(Some(region));
            }
        }

        let previous = record.placement;
        let generation = atlas.generation();
        let region = atlas.append(&merged, meshes, self)?;
        if atlas.generation() == generation {
            if let Some(old) = previous {
                atlas.abandon(old);
            }
        }

        let record = self.records.entry(key).or_default();
        record.vertex_count = vertex_count(&merged);
        record.cpu_vertices = merged;
        record.placement = Some(region);
        record.dirty = false;
        record.revision = revision;
        self.merges += 1;

        tracing::trace!(
            column_x = key.x,
            column_z = key.z,
            floats = total,
            offset = region.offset_floats,
            "Merged column"
        );
        Ok(Some(region))
    }

    /// Drops records of columns that no longer have any cached chunk mesh and
    /// releases their atlas regions. Returns how many were removed.
    pub fn drop_orphans<B: AtlasBuffer>(
        &mut self,
        meshes: &ChunkMeshCache,
        atlas: &mut Atlas<B>,
    ) -> usize {
        let before = self.records.len();
        self.records.retain(|key, record| {
            if meshes.has_column(*key) {
                return true;
            }
            if let Some(region) = record.placement {
                atlas.abandon(region);
            }
            false
        });
        before - self.records.len()
    }

    /// Full merges that appended a new region.
    pub fn merges(&self) -> u64 {
        self.merges
    }

    pub fn in_place_updates(&self) -> u64 {
        self.in_place_updates
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
