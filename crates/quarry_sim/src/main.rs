use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use quarry_shared::block::BlockRegistry;
use quarry_sim::config::load_or_create_config;
use quarry_sim::observer::{MoveIntent, Observer, PhysicsMode};
use quarry_sim::world::{World, WorldEvent};
use tracing::{debug, info};

/// Where a fresh world drops its first observer before the ground under it
/// has streamed in.
const SPAWN_POSITION: Vec3 = Vec3::new(8.5, 8.5, 120.0);
const STATUS_INTERVAL_TICKS: u64 = 600;

struct Options {
    config_path: PathBuf,
    world_path: Option<PathBuf>,
    ticks: Option<u64>,
    walk: bool,
}

fn parse_args() -> Options {
    let mut options = Options {
        config_path: PathBuf::from("quarry.toml"),
        world_path: None,
        ticks: None,
        walk: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("--config expects a path argument");
                    std::process::exit(2);
                };
                options.config_path = PathBuf::from(value);
            }
            "--world" => {
                let Some(value) = args.next() else {
                    eprintln!("--world expects a path argument");
                    std::process::exit(2);
                };
                options.world_path = Some(PathBuf::from(value));
            }
            "--ticks" => {
                let Some(value) = args.next() else {
                    eprintln!("--ticks expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u64>() {
                    Ok(parsed) => options.ticks = Some(parsed),
                    Err(err) => {
                        eprintln!("invalid tick count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--walk" => options.walk = true,
            "--help" | "-h" => {
                println!(
                    "Usage: quarry_sim [--config <path>] [--world <path>] [--ticks <n>] [--walk]"
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    options
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
    let options = parse_args();

    let mut config = load_or_create_config(&options.config_path);
    if let Some(world_path) = options.world_path {
        config.save_dir = world_path;
    }
    let tick_duration = Duration::from_secs(1) / config.tick_rate.max(1);
    let dt = tick_duration.as_secs_f32();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, saving world...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let mut world = match World::new(config, Arc::new(BlockRegistry::default())) {
        Ok(world) => world,
        Err(err) => {
            eprintln!("failed to open world: {err}");
            std::process::exit(1);
        }
    };
    let events = world.take_event_receiver();

    let mut settling = None;
    if world.observers().is_empty() {
        let mut observer = Observer::new(SPAWN_POSITION);
        observer.physics_mode = PhysicsMode::Flying;
        settling = Some(world.add_observer(observer));
    }

    let intent = MoveIntent {
        direction: if options.walk { Vec2::X } else { Vec2::ZERO },
        ..MoveIntent::default()
    };

    info!("Simulation running at {} ticks per second", world.config().tick_rate);
    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        let stats = world.tick(dt);
        if let Some(index) = settling {
            if world.settle_observer_on_surface(index) {
                info!("Observer {index} placed on the surface");
                settling = None;
            }
        } else {
            for index in 0..world.observers().len() {
                world.step_observer(index, &intent, dt);
            }
        }

        if let Some(events) = &events {
            for event in events.drain() {
                match event {
                    WorldEvent::ChunkActivated(coords) => {
                        debug!("Chunk ({}, {}) active", coords.x, coords.y)
                    }
                    WorldEvent::ChunkDeactivated(coords) => {
                        debug!("Chunk ({}, {}) flushed", coords.x, coords.y)
                    }
                    other => debug!("{other:?}"),
                }
            }
        }

        if world.tick_count() % STATUS_INTERVAL_TICKS == 0 {
            info!(
                "Tick {}: {} chunk(s) loaded, {} enemy(ies), {} lighting update(s) last tick",
                world.tick_count(),
                world.arena().len(),
                world.enemies().len(),
                stats.lighting.processed
            );
        }
        if options.ticks.is_some_and(|limit| world.tick_count() >= limit) {
            break;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            std::thread::sleep(tick_duration - elapsed);
        }
    }

    info!("Simulation stopping, saving world...");
    match world.shutdown() {
        Ok(saved) => info!("Saved {saved} chunk(s). Goodbye!"),
        Err(err) => {
            eprintln!("failed to save world: {err}");
            std::process::exit(1);
        }
    }
}
