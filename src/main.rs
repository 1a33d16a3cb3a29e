//! Headless chunk atlas driver
//!
//! Flies a camera over a heightmap world, editing blocks as it goes, and
//! renders every frame into the CPU atlas backend.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chunk_atlas::{
    BlockType, ChunkCoord, ChunkRenderer, CpuAtlasBuffer, FaceMesher, FrameTimings,
    HeightmapWorld, RecordingSink, RenderSettings,
};
use chunk_atlas::utils::settings::{default_settings_path, load_settings};
use clap::Parser;
use glam::{Mat4, Vec3};

/// Chunk atlas and visibility batching driver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of frames to render
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Render radius in chunks (overrides the settings file)
    #[arg(long)]
    radius: Option<i32>,

    /// Terrain seed
    #[arg(long, default_value_t = 2137)]
    seed: u32,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block edits applied around the camera each frame
    #[arg(long, default_value_t = 2)]
    edits_per_frame: u32,
}

const FLIGHT_ALTITUDE: f32 = 90.0;
const FLIGHT_SPEED: f32 = 0.6;

fn load_render_settings(args: &Args) -> Option<RenderSettings> {
    let mut settings = match args.config.clone().or_else(default_settings_path) {
        Some(path) => match load_settings(&path) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(err) => {
                tracing::error!("Failed to load settings from {}: {}", path.display(), err);
                return None;
            }
        },
        None => RenderSettings::default(),
    };

    if let Some(radius) = args.radius {
        settings.render_radius = radius;
        settings.near_radius = settings.near_radius.min(radius);
        settings.retain_radius = settings.retain_radius.max(radius);
    }
    if let Err(err) = settings.validate() {
        tracing::error!("{}", err);
        return None;
    }
    Some(settings)
}

/// Camera position and view matrix for a frame.
fn camera_at(frame: u64) -> (Vec3, Mat4) {
    let t = frame as f32;
    let eye = Vec3::new(t * FLIGHT_SPEED, FLIGHT_ALTITUDE, (t * 0.01).sin() * 48.0);
    let yaw = (t * 0.004).sin() * 0.8;
    let forward = Vec3::new(yaw.cos(), -0.35, yaw.sin()).normalize();
    (eye, Mat4::look_at_rh(eye, eye + forward, Vec3::Y))
}

/// Deterministic integer mix for picking edit positions.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^ (x >> 33)
}

fn apply_edits(world: &mut HeightmapWorld, eye: Vec3, frame: u64, count: u32, seed: u32) {
    for i in 0..count {
        let h = mix(((seed as u64) << 32) ^ frame.wrapping_mul(31) ^ i as u64);
        let x = eye.x as i32 + (h % 64) as i32 - 32;
        let z = eye.z as i32 + ((h >> 8) % 64) as i32 - 32;
        let top = world.column_top(x, z);
        if (h >> 16) & 1 == 0 {
            world.set_block(x, top, z, BlockType::Stone);
        } else {
            world.set_block(x, top - 1, z, BlockType::Air);
        }
    }
}

/// Average of `total` over `frames`, treating zero frames as one.
fn per_frame(total: Duration, frames: u64) -> Duration {
    total.div_f64(frames.max(1) as f64)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let Some(settings) = load_render_settings(&args) else {
        return ExitCode::from(2);
    };
    tracing::info!("Starting chunk atlas run: {} frames, seed {}", args.frames, args.seed);

    let render_radius = settings.render_radius;
    let retain_radius = settings.retain_radius;
    let mut renderer = ChunkRenderer::new(CpuAtlasBuffer::new(), settings);
    let mut world = HeightmapWorld::new(args.seed);
    let mut mesher = FaceMesher::new();
    let mut sink = RecordingSink::new();
    let proj = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);

    let mut last_center: Option<ChunkCoord> = None;
    let mut timings = FrameTimings::default();
    let mut built = 0usize;
    let mut draws = 0usize;
    let mut evicted = 0usize;

    for frame in 0..args.frames {
        let (eye, view) = camera_at(frame);
        let center = ChunkCoord::from_world(eye);

        if last_center.map(|c| c.column()) != Some(center.column()) {
            world.load_around(center, render_radius);
            world.unload_outside(center, retain_radius);
            evicted += renderer.prune(&world, center, retain_radius);
            last_center = Some(center);
        }
        if frame > 0 {
            apply_edits(&mut world, eye, frame, args.edits_per_frame, args.seed);
        }

        sink.clear();
        let stats = match renderer.render(&mut world, &mut mesher, eye, &view, &proj, &mut sink) {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!("Frame {} failed: {}", frame, err);
                return ExitCode::FAILURE;
            }
        };

        timings.accumulate(&stats.timings);
        built += stats.built();
        draws += stats.column_draws + stats.fallback_draws;

        if frame % 60 == 0 {
            tracing::info!(
                "Frame {}: {} visible, {} culled, {} built, {} deferred, {} column + {} fallback draws, atlas {}/{} bytes",
                frame,
                stats.visible,
                stats.culled,
                stats.built(),
                stats.deferred,
                stats.column_draws,
                stats.fallback_draws,
                stats.atlas_used_floats * 4,
                stats.atlas_capacity_bytes
            );
        }
    }

    let atlas = renderer.atlas();
    let frames = args.frames;
    tracing::info!(
        "Done: {} meshes built, {} sub-draws, {} evicted, {} atlas rebuilds, {} wasted floats",
        built,
        draws,
        evicted,
        atlas.rebuilds(),
        atlas.wasted_floats()
    );
    tracing::info!(
        "Average frame: {:?} (cull {:?}, build {:?}, columns {:?}, emit {:?})",
        per_frame(timings.total, frames),
        per_frame(timings.cull, frames),
        per_frame(timings.build, frames),
        per_frame(timings.columns, frames),
        per_frame(timings.emit, frames)
    );
    ExitCode::SUCCESS
}
