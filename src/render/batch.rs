use crate::render::mesh_cache::Region;

/// Parallel (first vertex, vertex count) arrays for one multi-draw.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    pub first_vertex: Vec<u32>,
    pub vertex_count: Vec<u32>,
}

impl DrawBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sub-draw for `region`. Unplaced and zero-length regions are
    /// skipped; returns whether anything was added.
    pub fn push(&mut self, region: Option<Region>) -> bool {
        match region {
            Some(region) if region.vertex_count() > 0 => {
                self.first_vertex.push(region.first_vertex());
                self.vertex_count.push(region.vertex_count());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.first_vertex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_vertex.is_empty()
    }

    pub fn total_vertices(&self) -> u64 {
        self.vertex_count.iter().map(|&c| c as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.first_vertex
            .iter()
            .copied()
            .zip(self.vertex_count.iter().copied())
    }

    pub fn clear(&mut self) {
        self.first_vertex.clear();
        self.vertex_count.clear();
    }
}

/// Receives the batched draws of a frame. One call is one multi-draw.
pub trait DrawSink {
    fn multi_draw(&mut self, batch: &DrawBatch);
}

/// Keeps every submitted batch. Used for headless runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub batches: Vec<DrawBatch>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw_calls(&self) -> usize {
        self.batches.len()
    }

    pub fn sub_draws(&self) -> usize {
        self.batches.iter().map(DrawBatch::len).sum()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

impl DrawSink for RecordingSink {
    fn multi_draw(&mut self, batch: &DrawBatch) {
        self.batches.push(batch.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_skips_unplaced_and_empty_regions() {
        let mut batch = DrawBatch::new();
        assert!(!batch.push(None));
        assert!(!batch.push(Some(Region {
            offset_floats: 36,
            len_floats: 0
        })));
        assert!(batch.push(Some(Region {
            offset_floats: 36,
            len_floats: 60
        })));

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.iter().collect::<Vec<_>>(), vec![(6, 10)]);
        assert_eq!(batch.total_vertices(), 10);
    }
}
