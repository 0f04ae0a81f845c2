//! Terrain walk: streams chunks around a viewer moving in a straight line.
//!
//! Usage: cargo run --release --bin terrain_walk -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>    Terrain config JSON (default: built-in defaults)
//!   --steps <N>        Number of viewer steps (default: 20)
//!   --speed <UNITS>    Distance moved along +X per step (default: 60.0)
//!   --preview <PNG>    Also write a preview image of the origin chunk
//!   --mode <MODE>      Preview mode: noise, color, mesh, falloff (default: color)

use std::time::{Duration, Instant};

use glam::Vec2;

use terrain_stream::core::logging;
use terrain_stream::preview::{self, DrawMode};
use terrain_stream::render::DrawStats;
use terrain_stream::streaming::{ChunkManager, GenerationPipeline};
use terrain_stream::{Result, TerrainConfig};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("terrain_walk failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_str_arg(&args, "--config") {
        Some(path) => TerrainConfig::load(path)?,
        None => TerrainConfig::default(),
    };
    let steps = parse_usize_arg(&args, "--steps").unwrap_or(20);
    let speed = parse_f32_arg(&args, "--speed").unwrap_or(60.0);

    if let Some(path) = parse_str_arg(&args, "--preview") {
        let mode = match parse_str_arg(&args, "--mode") {
            Some(mode) => mode.parse()?,
            None => DrawMode::default(),
        };
        preview::render_preview(&config, mode)?.save_texture(&path)?;
        println!("Preview ({:?}) written to {}", mode, path);
    }

    println!("=== Terrain Walk ===");
    println!("Chunk size:    {}", config.chunk_size);
    println!("View distance: {}", config.lod_table()?.max_view_distance());
    println!("Steps:         {} x {} units", steps, speed);
    println!();

    let pipeline = GenerationPipeline::from_config(&config)?;
    let mut manager = ChunkManager::new(&config, pipeline)?;

    let start = Instant::now();
    for step in 0..=steps {
        let viewer = Vec2::new(step as f32 * speed, 0.0);
        let step_start = Instant::now();

        let recomputed = manager.on_viewpoint_moved(viewer);
        if !manager.tick_until_idle(SETTLE_TIMEOUT) {
            log::warn!("Step {} did not settle within {:?}", step, SETTLE_TIMEOUT);
        }

        let mut stats = DrawStats::default();
        let drawn = manager.draw(&mut stats);
        log::info!(
            "Step {:>3} at x={:>7.1}{} chunks={} visible={} drawn={} meshes={} tris={} ({:.1?})",
            step,
            viewer.x,
            if recomputed { " *" } else { "  " },
            manager.chunk_count(),
            manager.visible_chunks().len(),
            drawn,
            manager.cached_mesh_count(),
            stats.triangles,
            step_start.elapsed()
        );
    }

    println!();
    println!("Done in {:.2?}", start.elapsed());
    println!("Chunks created: {}", manager.chunk_count());
    println!("Meshes cached:  {}", manager.cached_mesh_count());
    println!("Recomputes:     {}", manager.recompute_count());
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
