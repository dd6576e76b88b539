use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use grid_traffic::simulation::{SimConfig, SimWorld};

#[derive(Parser)]
#[command(name = "grid_traffic")]
#[command(about = "Headless tile-grid traffic simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for the random source (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of cars to spawn on random road tiles
    #[arg(long, default_value = "20")]
    cars: usize,

    /// Blocks per side of the generated road lattice
    #[arg(long, default_value = "3")]
    grid: usize,

    /// Traffic light green phase in seconds
    #[arg(long, default_value = "5.0")]
    pass_time: f32,

    /// Traffic light red phase in seconds
    #[arg(long, default_value = "5.0")]
    stop_time: f32,

    /// Print the ASCII map with every summary
    #[arg(long)]
    map: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_headless(&cli);
}

/// Run the simulation and report once per simulated second
fn run_headless(cli: &Cli) {
    info!("Running traffic simulation in headless mode...");
    info!("Ticks: {}, Delta: {}s", cli.ticks, cli.delta);

    let mut config = SimConfig::default();
    config.light.pass_time = cli.pass_time;
    config.light.stop_time = cli.stop_time;

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut world = SimWorld::build_test_world(SimWorld::with_config(config, rng), cli.grid);
    let spawned = world.spawn_random_cars(cli.cars);
    info!("Spawned {} car(s)", spawned.len());

    world.log_summary();
    if cli.map {
        println!("{}", world.render_map());
    }

    // Ticks per second of simulated time
    let ticks_per_second = if cli.delta > 0.0 {
        (1.0 / cli.delta).ceil() as u32
    } else {
        cli.ticks.max(1)
    };

    let mut tick = 0;
    while tick < cli.ticks {
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);

        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(cli.delta);
        }

        info!("--- After tick {} ({:.1}s simulated time) ---", tick, world.time);
        world.log_summary();
        if cli.map {
            println!("{}", world.render_map());
        }
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Total ticks: {}", world.stats.ticks);
    info!("Total cars spawned: {}", world.stats.cars_spawned);
    info!("Active cars: {}", world.cars.len());
    info!("Traffic lights: {}", world.lights.len());
    info!("Yields entered: {}", world.stats.yields_entered);
    info!("Light stops: {}", world.stats.light_stops);
    info!("Light releases: {}", world.stats.light_releases);
}
