//! Tuning values for agents, lights and the grid

use super::types::Position;

/// Size of one road tile in world units
pub const DEFAULT_CELL_SIZE: f32 = 1.0;

/// Distance under which an agent counts as having reached its target point
pub const TARGET_TOLERANCE: f32 = 0.01;

/// Leader speed multiplier applied when the gap is below the minimum follow distance
pub const CLOSE_FOLLOW_FACTOR: f32 = 0.5;

/// Per-agent driving parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CarConfig {
    /// Lower bound of the cruising speed drawn at spawn
    pub min_speed: f32,
    /// Upper bound of the cruising speed drawn at spawn
    pub max_speed: f32,
    /// Perpendicular displacement that puts the agent in its lane
    pub lane_offset_length: f32,
    /// Length of the forward ray used to find a leading vehicle
    pub max_follow_distance: f32,
    /// Gap under which the agent brakes below the leader's speed
    pub min_follow_distance: f32,
    /// How far ahead of the agent the forward ray starts
    pub ray_offset_length: f32,
    /// Right-hand detection box, offset to the agent's right
    pub box_right_offset_length: f32,
    /// Right-hand detection box, offset ahead of the agent
    pub box_up_offset_length: f32,
    pub box_size: Position,
    /// Upper bound on a single yield
    pub max_yield_time: f32,
    /// Radius of the agent's collider as seen by ray casts, overlaps and light zones
    pub collider_radius: f32,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            min_speed: 5.0,
            max_speed: 10.0,
            lane_offset_length: 0.15,
            max_follow_distance: 1.0,
            min_follow_distance: 0.5,
            ray_offset_length: 0.2,
            box_right_offset_length: 0.25,
            box_up_offset_length: 0.5,
            box_size: Position::new(0.5, 0.5),
            max_yield_time: 3.0,
            collider_radius: 0.15,
        }
    }
}

/// Traffic light timings and trigger geometry
#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub pass_time: f32,
    pub stop_time: f32,
    /// Size of the trigger zone centred on the intersection tile
    pub zone_size: Position,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            pass_time: 5.0,
            stop_time: 5.0,
            zone_size: Position::new(1.0, 1.0),
        }
    }
}

/// Everything a [`SimWorld`](super::SimWorld) needs to be built
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub cell_size: f32,
    pub car: CarConfig,
    pub light: LightConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            car: CarConfig::default(),
            light: LightConfig::default(),
        }
    }
}
