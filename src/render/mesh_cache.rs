//! Per-chunk mesh records.
//!
//! Every meshed chunk keeps its last built vertex array on the CPU. Those arrays
//! are the source of truth for the atlas: a growth rebuild copies them back into
//! the new buffer and column merges concatenate them.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::constants::FLOATS_PER_VERTEX;
use crate::core::chunk::{ChunkCoord, ColumnKey};
use crate::core::vertex::vertex_count;

/// A placed span of the atlas, in floats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub offset_floats: usize,
    pub len_floats: usize,
}

impl Region {
    pub fn first_vertex(&self) -> u32 {
        (self.offset_floats / FLOATS_PER_VERTEX) as u32
    }

    pub fn vertex_count(&self) -> u32 {
        (self.len_floats / FLOATS_PER_VERTEX) as u32
    }

    pub fn end_floats(&self) -> usize {
        self.offset_floats + self.len_floats
    }
}

#[derive(Debug, Default, Clone)]
pub struct ChunkMeshRecord {
    vertex_count: u32,
    cpu_vertices: Vec<f32>,
    placement: Option<Region>,
}

impl ChunkMeshRecord {
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn cpu_vertices(&self) -> &[f32] {
        &self.cpu_vertices
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_vertices.is_empty()
    }

    /// Where the vertices currently live in the atlas. `None` while unplaced.
    pub fn placement(&self) -> Option<Region> {
        self.placement
    }

    pub(crate) fn set_placement(&mut self, placement: Option<Region>) {
        self.placement = placement;
    }
}

#[derive(Debug, Default)]
struct ColumnMembers {
    levels: BTreeSet<i32>,
    revision: u64,
}

/// Owns one mesh record per chunk and an index of which chunk levels
/// populate each column.
#[derive(Debug, Default)]
pub struct ChunkMeshCache {
    records: FxHashMap<ChunkCoord, ChunkMeshRecord>,
    columns: FxHashMap<ColumnKey, ColumnMembers>,
    next_revision: u64,
}

impl ChunkMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.records.contains_key(&coord)
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkMeshRecord> {
        self.records.get(&coord)
    }

    pub(crate) fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut ChunkMeshRecord> {
        self.records.get_mut(&coord)
    }

    /// Stores a freshly built vertex array for `coord`. An existing placement is
    /// kept so the atlas can overwrite it in place when the size is unchanged.
    pub fn insert(&mut self, coord: ChunkCoord, vertices: Vec<f32>) -> &ChunkMeshRecord {
        debug_assert_eq!(vertices.len() % FLOATS_PER_VERTEX, 0);
        self.touch_column(coord, true);

        let record = self.records.entry(coord).or_default();
        record.vertex_count = vertex_count(&vertices);
        record.cpu_vertices = vertices;
        record
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> Option<ChunkMeshRecord> {
        let record = self.records.remove(&coord)?;
        self.touch_column(coord, false);
        Some(record)
    }

    fn touch_column(&mut self, coord: ChunkCoord, present: bool) {
        self.next_revision += 1;
        let revision = self.next_revision;
        let key = coord.column();

        let members = self.columns.entry(key).or_default();
        if present {
            members.levels.insert(coord.y);
        } else {
            members.levels.remove(&coord.y);
        }
        members.revision = revision;

        if members.levels.is_empty() {
            self.columns.remove(&key);
        }
    }

    /// Changes whenever any chunk of the column is inserted, rebuilt or removed.
    /// Zero for a column with no meshes.
    pub fn column_revision(&self, key: ColumnKey) -> u64 {
        self.columns.get(&key).map_or(0, |m| m.revision)
    }

    /// Records of a column, bottom to top.
    pub fn column_records(&self, key: ColumnKey) -> impl Iterator<Item = &ChunkMeshRecord> + '_ {
        self.columns
            .get(&key)
            .into_iter()
            .flat_map(|m| m.levels.iter())
            .filter_map(move |&y| self.records.get(&ChunkCoord::new(key.x, y, key.z)))
    }

    pub fn column_floats(&self, key: ColumnKey) -> usize {
        self.column_records(key).map(|r| r.cpu_vertices.len()).sum()
    }

    pub fn has_column(&self, key: ColumnKey) -> bool {
        self.columns.contains_key(&key)
    }

    /// All cached coordinates in ascending order.
    pub fn sorted_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.records.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    pub fn total_floats(&self) -> usize {
        self.records.values().map(|r| r.cpu_vertices.len()).sum()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.columns.clear();
    }
}
