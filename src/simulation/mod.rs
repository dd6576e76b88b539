//! Standalone traffic simulation module
//!
//! Cars wander a tile-based road grid, follow the vehicle in front, yield
//! to traffic from the right at intersections and obey traffic lights.
//! Nothing here renders or reads input; the engine can be driven entirely
//! from tests or the headless runner.

mod car;
mod config;
mod light_registry;
mod road_graph;
mod spatial;
mod traffic_light;
mod types;
mod world;

pub use car::{decide_next_tile, draw_default_speed, CarAgent, CarState};
pub use config::{
    CarConfig, LightConfig, SimConfig, CLOSE_FOLLOW_FACTOR, DEFAULT_CELL_SIZE, TARGET_TOLERANCE,
};
pub use light_registry::LightRegistry;
pub use road_graph::RoadGraph;
pub use spatial::{CarView, HitEntity, Obstacle, SnapshotSpace, SpatialHit, SpatialQuery};
pub use traffic_light::{LightState, TrafficLight};
pub use types::{Aabb, CarId, Direction, LightId, Position, SimId, TilePos};
pub use world::{SimStats, SimWorld};
