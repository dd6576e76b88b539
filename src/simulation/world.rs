//! Main simulation world that ties everything together
//!
//! `SimWorld` is the simulation clock: it owns the road graph, the car
//! arena, the traffic lights and the random source, and advances all of
//! them in a fixed order on every tick.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use super::car::{draw_default_speed, CarAgent, CarState};
use super::config::SimConfig;
use super::light_registry::LightRegistry;
use super::road_graph::RoadGraph;
use super::spatial::{CarView, Obstacle, SnapshotSpace};
use super::traffic_light::LightState;
use super::types::{Aabb, CarId, Position, SimId, TilePos};

/// Running totals for a simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub ticks: u64,
    pub cars_spawned: usize,
    pub cars_despawned: usize,
    /// Spawns rejected for lack of a road graph or road tile
    pub spawns_rejected: usize,
    pub yields_entered: usize,
    pub light_stops: usize,
    pub light_releases: usize,
}

/// The main simulation world
pub struct SimWorld {
    /// Road layout; `None` until one is bound
    road_graph: Option<RoadGraph>,

    /// All cars, iterated in spawn order
    pub cars: BTreeMap<CarId, CarAgent>,

    /// One light per intersection
    pub lights: LightRegistry,

    /// Static non-car colliders
    pub obstacles: Vec<Obstacle>,

    pub config: SimConfig,

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    pub time: f32,

    pub stats: SimStats,

    /// Source of all route and speed randomness
    rng: StdRng,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(config: SimConfig, road_graph: Option<RoadGraph>, rng: StdRng) -> Self {
        let lights = LightRegistry::new(config.light.clone());
        let mut world = Self {
            road_graph,
            cars: BTreeMap::new(),
            lights,
            obstacles: Vec::new(),
            config,
            next_id: 0,
            time: 0.0,
            stats: SimStats::default(),
            rng,
        };
        world.refresh_traffic_lights();
        world
    }

    /// A world with an empty road graph and an OS-seeded random source
    pub fn new() -> Self {
        Self::with_config(SimConfig::default(), StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_config(SimConfig::default(), StdRng::seed_from_u64(seed))
    }

    pub fn with_config(config: SimConfig, rng: StdRng) -> Self {
        let road_graph = RoadGraph::new(config.cell_size);
        Self::new_internal(config, Some(road_graph), rng)
    }

    /// A world with no road graph bound; spawning fails until one is bound
    pub fn without_road_graph(config: SimConfig, rng: StdRng) -> Self {
        Self::new_internal(config, None, rng)
    }

    pub fn road_graph(&self) -> Option<&RoadGraph> {
        self.road_graph.as_ref()
    }

    /// Replace the road layout and rebuild the lights for it
    pub fn bind_road_graph(&mut self, road_graph: RoadGraph) {
        self.road_graph = Some(road_graph);
        self.refresh_traffic_lights();
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place or remove a road tile and refresh the lights.
    /// Binds an empty graph first if none is bound.
    pub fn set_tile(&mut self, tile: TilePos, is_road: bool) {
        let cell_size = self.config.cell_size;
        self.road_graph
            .get_or_insert_with(|| RoadGraph::new(cell_size))
            .set_tile(tile, is_road);
        self.refresh_traffic_lights();
    }

    /// Place lights on the current intersections, releasing agents held by
    /// lights that no longer qualify
    pub fn refresh_traffic_lights(&mut self) {
        let released = match &self.road_graph {
            Some(road_graph) => self.lights.refresh(road_graph),
            None => self.lights.clear(),
        };
        self.release_cars(&released);
    }

    fn release_cars(&mut self, released: &[CarId]) {
        for car_id in released {
            if let Some(car) = self.cars.get_mut(car_id) {
                debug!("Car {:?} released", car_id);
                car.state = CarState::Drive;
                self.stats.light_releases += 1;
            }
        }
    }

    /// Register a static obstacle
    pub fn add_obstacle(&mut self, center: Position, size: Position) {
        self.obstacles.push(Obstacle {
            bounds: Aabb::new(center, size),
        });
    }

    /// Spawn a car on the road tile containing `position`
    pub fn spawn_car(&mut self, position: Position) -> Result<CarId> {
        // Rejected spawns leave the random sequence untouched
        if let Err(e) = CarAgent::spawn_tile(position, self.road_graph.as_ref()) {
            return Err(self.reject_spawn(position, e));
        }
        let default_speed = draw_default_speed(&self.config.car, &mut self.rng);
        self.spawn_car_with_speed(position, default_speed)
    }

    /// Spawn a car with a fixed cruising speed
    pub fn spawn_car_with_speed(&mut self, position: Position, default_speed: f32) -> Result<CarId> {
        let id = CarId(SimId(self.next_id));
        let car = CarAgent::spawn(
            id,
            position,
            self.road_graph.as_ref(),
            self.config.car.clone(),
            default_speed,
        );

        match car {
            Ok(car) => {
                self.next_sim_id();
                info!("Spawned car {:?} at {:?}", id, car.previous_tile);
                self.cars.insert(id, car);
                self.stats.cars_spawned += 1;
                Ok(id)
            }
            Err(e) => Err(self.reject_spawn(position, e)),
        }
    }

    fn reject_spawn(&mut self, position: Position, e: anyhow::Error) -> anyhow::Error {
        warn!("Rejected car spawn at {:?}: {:#}", position, e);
        self.stats.spawns_rejected += 1;
        e
    }

    /// Spawn a car on the centre of a road tile
    pub fn spawn_car_on_tile(&mut self, tile: TilePos) -> Result<CarId> {
        let position = self
            .road_graph
            .as_ref()
            .map(|road_graph| road_graph.cell_center(tile))
            .context("No road graph bound")?;
        self.spawn_car(position)
    }

    /// Spawn up to `count` cars on random road tiles
    pub fn spawn_random_cars(&mut self, count: usize) -> Vec<CarId> {
        let tiles: Vec<TilePos> = match &self.road_graph {
            Some(road_graph) => road_graph.tiles().iter().copied().collect(),
            None => Vec::new(),
        };

        let mut spawned = Vec::new();
        for _ in 0..count {
            let Some(tile) = tiles.choose(&mut self.rng).copied() else {
                break;
            };
            if let Ok(id) = self.spawn_car_on_tile(tile) {
                spawned.push(id);
            }
        }
        spawned
    }

    /// Remove a car from the simulation
    pub fn despawn_car(&mut self, car_id: CarId) -> Result<()> {
        self.cars
            .remove(&car_id)
            .with_context(|| format!("Car {:?} not found", car_id))?;
        self.lights.forget(car_id);
        self.stats.cars_despawned += 1;
        info!("Despawned car {:?}", car_id);
        Ok(())
    }

    /// Read-only views of all cars as they are now
    pub fn snapshot(&self) -> Vec<CarView> {
        self.cars.values().map(CarAgent::view).collect()
    }

    /// Main simulation tick
    ///
    /// Lights update first, then every car in spawn order against a
    /// snapshot taken before any car moves, then light zones are checked
    /// for new arrivals.
    pub fn tick(&mut self, delta_secs: f32) {
        self.time += delta_secs;
        self.stats.ticks += 1;

        let released = self.lights.update(delta_secs);
        self.release_cars(&released);

        let Some(road_graph) = &self.road_graph else {
            return;
        };

        let snapshot = self.snapshot();
        let space = SnapshotSpace::new(&snapshot, &self.obstacles, self.config.car.collider_radius);

        for car in self.cars.values_mut() {
            let was_yielding = car.state == CarState::Yield;
            car.update(delta_secs, road_graph, &space, &mut self.rng);
            if !was_yielding && car.state == CarState::Yield {
                self.stats.yields_entered += 1;
            }
        }

        self.stats.light_stops += self.lights.detect_entries(&mut self.cars);
    }

    /// Number of cars in each state: (drive, yield, stop)
    pub fn state_counts(&self) -> (usize, usize, usize) {
        self.cars
            .values()
            .fold((0, 0, 0), |(drive, yielding, stop), car| match car.state {
                CarState::Drive => (drive + 1, yielding, stop),
                CarState::Yield => (drive, yielding + 1, stop),
                CarState::Stop => (drive, yielding, stop + 1),
            })
    }

    /// Create a default test world with some roads
    pub fn create_test_world(blocks: usize) -> Self {
        Self::build_test_world(SimWorld::new(), blocks)
    }

    /// Create a default test world with a seeded RNG for reproducible simulations
    pub fn create_test_world_with_seed(blocks: usize, seed: u64) -> Self {
        Self::build_test_world(SimWorld::new_with_seed(seed), blocks)
    }

    /// Lay a lattice of roads: rows and columns every 4 tiles, `blocks`
    /// blocks per side, producing 3- and 4-way intersections
    pub fn build_test_world(mut world: SimWorld, blocks: usize) -> Self {
        const BLOCK: i32 = 4;
        let extent = blocks.max(1) as i32 * BLOCK;

        let mut road_graph = RoadGraph::new(world.config.cell_size);
        for a in 0..=extent {
            for b in (0..=extent).step_by(BLOCK as usize) {
                road_graph.set_tile(TilePos::new(a, b), true);
                road_graph.set_tile(TilePos::new(b, a), true);
            }
        }

        world.bind_road_graph(road_graph);
        world
    }

    /// Log a summary of the world state
    pub fn log_summary(&self) {
        let (driving, yielding, stopped) = self.state_counts();
        let (pass, stop) = self
            .lights
            .lights()
            .fold((0, 0), |(pass, stop), light| match light.state {
                LightState::Pass => (pass + 1, stop),
                LightState::Stop => (pass, stop + 1),
            });

        info!("=== Traffic Simulation Summary ===");
        info!("Time: {:.2}s ({} ticks)", self.time, self.stats.ticks);
        match &self.road_graph {
            Some(road_graph) => info!(
                "Road tiles: {}, Road networks: {}",
                road_graph.tile_count(),
                road_graph.network_count()
            ),
            None => info!("No road graph bound"),
        }
        info!("Traffic lights: {} ({} pass, {} stop)", self.lights.len(), pass, stop);
        info!(
            "Cars: {} ({} driving, {} yielding, {} stopped)",
            self.cars.len(),
            driving,
            yielding,
            stopped
        );
        if !self.cars.is_empty() {
            let mean_speed =
                self.cars.values().map(|car| car.speed).sum::<f32>() / self.cars.len() as f32;
            info!("Mean speed: {:.2}", mean_speed);
        }
        info!(
            "Yields: {}, Light stops: {}, Light releases: {}",
            self.stats.yields_entered, self.stats.light_stops, self.stats.light_releases
        );
    }

    /// Draw the road grid as text, north at the top
    pub fn render_map(&self) -> String {
        let Some(road_graph) = &self.road_graph else {
            return String::new();
        };
        let tiles = road_graph.tiles();
        let (Some(first), Some(last)) = (tiles.first(), tiles.last()) else {
            return String::new();
        };

        // Tiles sort by x first
        let (min_x, max_x) = (first.x, last.x);
        let min_y = tiles.iter().map(|tile| tile.y).min().unwrap_or(first.y);
        let max_y = tiles.iter().map(|tile| tile.y).max().unwrap_or(first.y);

        let width = (max_x - min_x + 1) as usize;
        let height = (max_y - min_y + 1) as usize;
        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |tile: TilePos| -> Option<(usize, usize)> {
            if tile.x < min_x || tile.x > max_x || tile.y < min_y || tile.y > max_y {
                return None;
            }
            Some(((max_y - tile.y) as usize, (tile.x - min_x) as usize))
        };

        for tile in tiles.iter() {
            if let Some((row, col)) = to_grid(*tile) {
                grid[row][col] = '#';
            }
        }

        for light in self.lights.lights() {
            if let Some((row, col)) = to_grid(light.tile) {
                grid[row][col] = match light.state {
                    LightState::Pass => 'G',
                    LightState::Stop => 'R',
                };
            }
        }

        for car in self.cars.values() {
            if let Some((row, col)) = to_grid(road_graph.tile_at(car.position)) {
                grid[row][col] = 'C';
            }
        }

        let mut map = String::with_capacity((width + 1) * height);
        for row in &grid {
            map.extend(row.iter());
            map.push('\n');
        }
        map
    }
}
