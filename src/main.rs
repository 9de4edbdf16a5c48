//! Headless streaming demo: walks an observer across a generated world and
//! logs chunk lifecycle events as the streamer keeps up.

use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use voxplanet_chunk::DeformPolicy;
use voxplanet_field::{TerrainParams, load_params_from_path};
use voxplanet_geom::Vec3;
use voxplanet_stream::{ChunkStreamer, StreamerConfig};

#[derive(Parser, Debug)]
#[command(name = "voxplanet", about = "Voxel terrain streaming demo")]
struct Args {
    /// Stream a cube-sphere planet instead of a flat world
    #[arg(long)]
    planet: bool,
    /// World seed; omitted means a time-derived seed
    #[arg(long)]
    seed: Option<i32>,
    /// Worker threads (0 uses all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,
    /// Cell-center vertices instead of surface nets
    #[arg(long)]
    blocky: bool,
    /// LOD ring widths, finest first
    #[arg(long, value_delimiter = ',', default_values_t = vec![8, 16, 32])]
    lod: Vec<i32>,
    /// Streaming ticks to run
    #[arg(long, default_value_t = 200)]
    ticks: u32,
    /// Terrain parameter TOML file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dig a crater under the observer once streaming settles
    #[arg(long)]
    deform: bool,
}

fn time_seed() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as i32)
        .unwrap_or(3564)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut params = match &args.config {
        Some(path) => load_params_from_path(path)?,
        None => TerrainParams::default(),
    };
    params.seed = args.seed.unwrap_or_else(time_seed);

    let cfg = StreamerConfig {
        lod_thresholds: args.lod.clone(),
        workers: args.threads,
        surface_nets: !args.blocky,
        chunk_height: if args.planet { 64 } else { 256 },
        ..StreamerConfig::default()
    };
    log::info!(
        target: "demo",
        "streaming {} world, seed={} lod={:?}",
        if args.planet { "planet" } else { "flat" },
        params.seed,
        cfg.lod_thresholds
    );

    let face_radius = (cfg.chunk_radius * cfg.chunk_size as i32) as f32;
    let mut streamer = if args.planet {
        ChunkStreamer::planet(cfg, params)?
    } else {
        ChunkStreamer::flat(cfg, params)?
    };
    streamer.set_deform_policy(DeformPolicy { floor_min_y: 10 });

    let mut observer = if args.planet {
        Vec3::new(0.0, face_radius + 40.0, 0.0)
    } else {
        Vec3::new(8.0, 40.0, 8.0)
    };

    for tick in 0..args.ticks {
        observer.x += 2.0;
        for coord in streamer.update(observer) {
            let tris = streamer.mesh(&coord).map_or(0, |m| m.triangle_count());
            log::info!(target: "events", "[tick {tick}] ChunkReady {coord} tris={tris}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    if args.deform {
        let point = observer - Vec3::new(0.0, 15.0, 0.0);
        for coord in streamer.apply_deform(point, 4, -10.0) {
            log::info!(target: "events", "Deformed {coord}");
        }
    }

    let stats = streamer.stats();
    log::info!(
        target: "demo",
        "done: active={} ready={} queued={} building={}",
        stats.active,
        stats.ready,
        stats.queued,
        stats.building
    );
    Ok(())
}
