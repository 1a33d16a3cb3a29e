//! Per-frame build and draw scheduling.
//!
//! `ChunkRenderer` owns the atlas, the mesh cache and the column records and
//! runs the frame pipeline: radius filter, frustum test, budgeted meshing,
//! column merging and batch emission.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use glam::{Mat4, Vec3};

use crate::core::chunk::{ChunkCoord, ColumnKey};
use crate::render::atlas::{Atlas, AtlasError};
use crate::render::batch::{DrawBatch, DrawSink};
use crate::render::buffer::AtlasBuffer;
use crate::render::column::ColumnCombiner;
use crate::render::frustum::FrustumCuller;
use crate::render::mesh_cache::{ChunkMeshCache, Region};
use crate::render::prune::prune_meshes;
use crate::utils::settings::RenderSettings;
use crate::utils::timing::{FrameTimings, ScopedTimer};
use crate::world::{ChunkMesher, ChunkSource};

/// What one call to `ChunkRenderer::render` did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// Chunks inside the render radius
    pub candidates: usize,
    pub visible: usize,
    pub culled: usize,
    pub built_near: usize,
    pub built_far: usize,
    /// Chunks that needed a build but were left for a later frame
    pub deferred: usize,
    pub columns_ready: usize,
    pub column_draws: usize,
    pub fallback_draws: usize,
    pub draw_calls: usize,
    pub atlas_used_floats: usize,
    pub atlas_wasted_floats: usize,
    pub atlas_capacity_bytes: u64,
    pub timings: FrameTimings,
}

impl FrameStats {
    pub fn built(&self) -> usize {
        self.built_near + self.built_far
    }
}

pub struct ChunkRenderer<B: AtlasBuffer> {
    settings: RenderSettings,
    atlas: Atlas<B>,
    meshes: ChunkMeshCache,
    columns: ColumnCombiner,
    culler: FrustumCuller,
    column_batch: DrawBatch,
    fallback_batch: DrawBatch,
    frame: u64,
}

impl<B: AtlasBuffer> ChunkRenderer<B> {
    pub fn new(buffer: B, settings: RenderSettings) -> Self {
        let atlas = Atlas::new(
            buffer,
            settings.initial_atlas_bytes,
            settings.max_atlas_bytes,
            settings.growth_factor,
        );
        tracing::info!(
            "Chunk renderer ready: atlas {} bytes (max {}), render radius {}",
            atlas.capacity_bytes(),
            atlas.max_capacity_bytes(),
            settings.render_radius
        );

        Self {
            culler: FrustumCuller::new(settings.matrix_epsilon, settings.frustum_margin),
            settings,
            atlas,
            meshes: ChunkMeshCache::new(),
            columns: ColumnCombiner::new(),
            column_batch: DrawBatch::new(),
            fallback_batch: DrawBatch::new(),
            frame: 0,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn atlas(&self) -> &Atlas<B> {
        &self.atlas
    }

    pub fn meshes(&self) -> &ChunkMeshCache {
        &self.meshes
    }

    pub fn columns(&self) -> &ColumnCombiner {
        &self.columns
    }

    pub fn culler(&self) -> &FrustumCuller {
        &self.culler
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Runs one frame and submits at most two multi-draws to `sink`: one for
    /// the ready columns and one for visible chunks whose column is not ready.
    ///
    /// An error means the atlas hit its capacity ceiling. The atlas and caches
    /// stay consistent, but the frame was not drawn.
    pub fn render<W, M, D>(
        &mut self,
        world: &mut W,
        mesher: &mut M,
        camera: Vec3,
        view: &Mat4,
        proj: &Mat4,
        sink: &mut D,
    ) -> Result<FrameStats, AtlasError>
    where
        W: ChunkSource + ?Sized,
        M: ChunkMesher<W> + ?Sized,
        D: DrawSink + ?Sized,
    {
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };
        self.frame += 1;

        let mut timings = FrameTimings::default();
        let mut total = Duration::ZERO;
        let result = {
            let _timer = ScopedTimer::new("frame", &mut total);
            self.run_frame(world, mesher, camera, view, proj, sink, &mut stats, &mut timings)
        };
        timings.total = total;
        stats.timings = timings;
        result?;

        stats.atlas_used_floats = self.atlas.used_floats();
        stats.atlas_wasted_floats = self.atlas.wasted_floats();
        stats.atlas_capacity_bytes = self.atlas.capacity_bytes();

        tracing::debug!(
            frame = stats.frame,
            visible = stats.visible,
            culled = stats.culled,
            built = stats.built(),
            deferred = stats.deferred,
            column_draws = stats.column_draws,
            fallback_draws = stats.fallback_draws,
            micros = total.as_micros() as u64,
            "Frame rendered"
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_frame<W, M, D>(
        &mut self,
        world: &mut W,
        mesher: &mut M,
        camera: Vec3,
        view: &Mat4,
        proj: &Mat4,
        sink: &mut D,
        stats: &mut FrameStats,
        timings: &mut FrameTimings,
    ) -> Result<(), AtlasError>
    where
        W: ChunkSource + ?Sized,
        M: ChunkMesher<W> + ?Sized,
        D: DrawSink + ?Sized,
    {
        let center = ChunkCoord::from_world(camera);

        let visible = {
            let _timer = ScopedTimer::new("cull", &mut timings.cull);
            self.cull(&*world, center, view, proj, stats)
        };

        let deferred = {
            let _timer = ScopedTimer::new("build", &mut timings.build);
            self.build(world, mesher, center, &visible, stats)?
        };

        let ready = {
            let _timer = ScopedTimer::new("columns", &mut timings.columns);
            self.resolve_columns(&visible, &deferred)?
        };
        stats.columns_ready = ready.len();

        let _timer = ScopedTimer::new("emit", &mut timings.emit);
        self.column_batch.clear();
        for region in ready.values() {
            if self.column_batch.push(Some(*region)) {
                stats.column_draws += 1;
            }
        }

        // Visible chunks of columns that are not ready, including columns with
        // a deferred build, are drawn one by one from their own placements.
        self.fallback_batch.clear();
        for coord in &visible {
            if ready.contains_key(&coord.column()) {
                continue;
            }
            let placement = self.meshes.get(*coord).and_then(|r| r.placement());
            if self.fallback_batch.push(placement) {
                stats.fallback_draws += 1;
            }
        }

        for batch in [&self.column_batch, &self.fallback_batch] {
            if !batch.is_empty() {
                sink.multi_draw(batch);
                stats.draw_calls += 1;
            }
        }
        Ok(())
    }

    /// Radius filter then frustum test. Returns the visible chunks in
    /// coordinate order.
    fn cull<W: ChunkSource + ?Sized>(
        &mut self,
        world: &W,
        center: ChunkCoord,
        view: &Mat4,
        proj: &Mat4,
        stats: &mut FrameStats,
    ) -> Vec<ChunkCoord> {
        self.culler.update(view, proj);

        let mut visible = Vec::new();
        for coord in world.all_chunks() {
            if !coord.within_radius(center, self.settings.render_radius) {
                continue;
            }
            stats.candidates += 1;
            if self.culler.is_visible(&coord.aabb()) {
                visible.push(coord);
            } else {
                stats.culled += 1;
            }
        }
        visible.sort_unstable();
        stats.visible = visible.len();
        visible
    }

    /// Meshes visible chunks that are missing a mesh or dirty, nearest first,
    /// within the near and far budgets. Returns the columns that still have a
    /// deferred chunk.
    fn build<W, M>(
        &mut self,
        world: &mut W,
        mesher: &mut M,
        center: ChunkCoord,
        visible: &[ChunkCoord],
        stats: &mut FrameStats,
    ) -> Result<BTreeSet<ColumnKey>, AtlasError>
    where
        W: ChunkSource + ?Sized,
        M: ChunkMesher<W> + ?Sized,
    {
        let mut deferred = BTreeSet::new();
        let mut pending: Vec<(i64, ChunkCoord)> = visible
            .iter()
            .filter(|coord| !self.meshes.contains(**coord) || world.is_dirty(**coord))
            .map(|coord| (coord.distance_sq(center), *coord))
            .collect();
        pending.sort_unstable();

        let near_sq = self.settings.near_radius as i64 * self.settings.near_radius as i64;
        let mut near_left = self.settings.near_build_budget;
        let mut far_left = self.settings.far_build_budget;

        for (distance_sq, coord) in pending {
            let near = distance_sq <= near_sq;
            let budget = if near { &mut near_left } else { &mut far_left };
            if *budget == 0 {
                stats.deferred += 1;
                deferred.insert(coord.column());
                continue;
            }
            *budget -= 1;

            let vertices = mesher.build_mesh(&*world, coord);
            self.meshes.insert(coord, vertices);
            self.atlas
                .place_chunk(coord, &mut self.meshes, &mut self.columns)?;
            world.set_clean(coord);

            if near {
                stats.built_near += 1;
            } else {
                stats.built_far += 1;
            }
        }

        if stats.deferred > 0 {
            tracing::trace!(
                deferred = stats.deferred,
                "Build budget exhausted, deferring chunks"
            );
        }
        Ok(deferred)
    }

    /// Ensures every column touched by a visible chunk, except columns with a
    /// deferred build. A growth rebuild in the middle of the pass invalidates
    /// regions handed out earlier in it, so the pass repeats until the atlas
    /// generation holds still.
    fn resolve_columns(
        &mut self,
        visible: &[ChunkCoord],
        deferred: &BTreeSet<ColumnKey>,
    ) -> Result<BTreeMap<ColumnKey, Region>, AtlasError> {
        let keys: BTreeSet<ColumnKey> = visible
            .iter()
            .map(ChunkCoord::column)
            .filter(|key| !deferred.contains(key))
            .collect();
        let mut ready = BTreeMap::new();

        loop {
            let generation = self.atlas.generation();
            ready.clear();
            for key in &keys {
                if let Some(region) = self.columns.ensure(*key, &mut self.meshes, &mut self.atlas)? {
                    ready.insert(*key, region);
                }
            }
            if self.atlas.generation() == generation {
                return Ok(ready);
            }
            tracing::debug!(
                generation = self.atlas.generation(),
                "Atlas rebuilt during column pass, repeating"
            );
        }
    }

    /// Evicts meshes of chunks the world dropped or that lie outside `radius`,
    /// then drops column records left without members. Returns the number of
    /// chunk meshes evicted.
    pub fn prune<W: ChunkSource + ?Sized>(
        &mut self,
        world: &W,
        center: ChunkCoord,
        radius: i32,
    ) -> usize {
        let evicted = prune_meshes(&mut self.meshes, &mut self.atlas, world, center, radius);
        let columns = self.columns.drop_orphans(&self.meshes, &mut self.atlas);
        if evicted > 0 {
            tracing::debug!(
                evicted,
                columns,
                wasted_floats = self.atlas.wasted_floats(),
                "Pruned chunk meshes"
            );
        }
        evicted
    }

    /// Forgets every mesh, column and placement. The atlas keeps its capacity.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.columns.clear();
        self.atlas.reset();
        self.culler.invalidate();
        tracing::info!("Chunk renderer cleared");
    }
}
