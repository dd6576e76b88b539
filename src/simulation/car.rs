//! Car agent logic for the traffic simulation
//!
//! Each agent wanders the road grid: it picks a random next tile whenever it
//! reaches its current target, keeps to the right-hand lane, follows the
//! vehicle in front and yields to traffic coming from its right at
//! intersections. Traffic lights stop and release it from outside.

use anyhow::{Context, Result};
use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::config::{CarConfig, CLOSE_FOLLOW_FACTOR, TARGET_TOLERANCE};
use super::road_graph::RoadGraph;
use super::spatial::{CarView, HitEntity, SpatialHit, SpatialQuery};
use super::types::{CarId, Direction, Position, TilePos};

/// Behaviour state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarState {
    /// Held by a traffic light until it releases the agent
    Stop,
    Drive,
    /// Waiting for a vehicle approaching from the right
    Yield,
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct CarAgent {
    pub id: CarId,
    pub position: Position,
    /// Facing direction (unit vector)
    pub direction: Position,
    /// Signed angle in degrees from world up to `direction`
    pub heading: f32,
    pub speed: f32,
    /// Cruising speed drawn at spawn from the configured bounds
    pub default_speed: f32,
    pub velocity: Position,
    pub state: CarState,
    /// Remaining time before a yield times out
    pub yield_time: f32,
    pub previous_tile: TilePos,
    pub target_tile: TilePos,
    pub target_position: Position,
    /// Lane offset applied for the current target
    pub current_offset: Position,
    target_reached: bool,
    config: CarConfig,
}

/// Cruising speed between `min` and `max` drawn from `rng`
pub fn draw_default_speed<R: Rng + ?Sized>(config: &CarConfig, rng: &mut R) -> f32 {
    config.min_speed + rng.random::<f32>() * (config.max_speed - config.min_speed)
}

/// Pick the next tile to drive to from `current`, never turning back unless
/// `current` is a dead end
pub fn decide_next_tile<R: Rng + ?Sized>(
    road_graph: &RoadGraph,
    current: TilePos,
    previous: TilePos,
    rng: &mut R,
) -> TilePos {
    let candidates: Vec<TilePos> = road_graph
        .neighbor_tiles(current)
        .into_iter()
        .filter(|tile| *tile != previous)
        .collect();

    // Dead end: U-turn
    candidates.choose(rng).copied().unwrap_or(previous)
}

impl CarAgent {
    /// Create an agent at the centre of the road tile containing `position`.
    ///
    /// Fails if no road graph is bound or the tile isn't road; such an agent
    /// never joins the simulation.
    pub fn spawn(
        id: CarId,
        position: Position,
        road_graph: Option<&RoadGraph>,
        config: CarConfig,
        default_speed: f32,
    ) -> Result<Self> {
        let road_graph = road_graph.context("No road graph bound to the spawned car")?;
        let tile = Self::spawn_tile(position, Some(road_graph))?;
        let position = road_graph.cell_center(tile);

        Ok(Self {
            id,
            position,
            direction: Position::UP,
            heading: 0.0,
            speed: 0.0,
            default_speed: default_speed.max(0.0),
            velocity: Position::ZERO,
            state: CarState::Drive,
            yield_time: 0.0,
            previous_tile: tile,
            target_tile: tile,
            target_position: position,
            current_offset: Position::ZERO,
            target_reached: true,
            config,
        })
    }

    /// The road tile an agent spawned at `position` would occupy
    pub fn spawn_tile(position: Position, road_graph: Option<&RoadGraph>) -> Result<TilePos> {
        let road_graph = road_graph.context("No road graph bound to the spawned car")?;

        let tile = road_graph.tile_at(position);
        if !road_graph.has_road(tile) {
            anyhow::bail!("No road tile at {:?}", tile);
        }
        Ok(tile)
    }

    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    pub fn target_reached(&self) -> bool {
        self.target_reached
    }

    /// Snapshot used by other agents' queries
    pub fn view(&self) -> CarView {
        CarView {
            id: self.id,
            position: self.position,
            direction: self.direction,
            speed: self.speed,
        }
    }

    /// Advance this agent by one tick.
    ///
    /// Transitions are evaluated first, against the spatial state captured
    /// at the start of the tick, then the behaviour of the resulting state
    /// runs.
    pub fn update<Q, R>(&mut self, delta_secs: f32, road_graph: &RoadGraph, space: &Q, rng: &mut R)
    where
        Q: SpatialQuery + ?Sized,
        R: Rng + ?Sized,
    {
        match self.state {
            CarState::Stop => {}
            CarState::Drive => {
                if self.priority_to_the_right(road_graph, space) {
                    debug!("Car {:?} yielding at {:?}", self.id, road_graph.tile_at(self.position));
                    self.yield_time = self.config.max_yield_time;
                    self.state = CarState::Yield;
                }
            }
            CarState::Yield => {
                if self.yield_time <= 0.0 {
                    debug!("Car {:?} yield timed out", self.id);
                    self.state = CarState::Drive;
                } else if !self.priority_to_the_right(road_graph, space) {
                    debug!("Car {:?} done yielding", self.id);
                    self.state = CarState::Drive;
                }
            }
        }

        match self.state {
            CarState::Stop => self.halt(),
            // An expired countdown is picked up by the next tick's
            // transitions, which then drive in that same tick
            CarState::Yield => {
                self.halt();
                self.yield_time -= delta_secs;
            }
            CarState::Drive => self.drive(delta_secs, road_graph, space, rng),
        }
    }

    fn halt(&mut self) {
        self.speed = 0.0;
        self.velocity = Position::ZERO;
    }

    /// True when a vehicle approaching from the right has priority over this one
    pub fn priority_to_the_right<Q>(&self, road_graph: &RoadGraph, space: &Q) -> bool
    where
        Q: SpatialQuery + ?Sized,
    {
        let right = self.direction.perp_right();
        let center = self.position
            + self.direction * self.config.box_up_offset_length
            + right * self.config.box_right_offset_length;

        let Some(SpatialHit {
            entity: HitEntity::Car(other),
            ..
        }) = space.box_overlap(center, self.config.box_size, Some(self.id))
        else {
            return false;
        };

        let from_other_to_self = (self.position - other.position)
            .normalized()
            .unwrap_or(Position::ZERO);

        from_other_to_self.dot(other.direction) > 0.0
            && other.speed > 0.0
            && road_graph.is_intersection(road_graph.tile_at(self.position))
    }

    /// Speed for this tick given the vehicle ahead, if any
    pub fn follow_speed<Q>(&self, space: &Q) -> f32
    where
        Q: SpatialQuery + ?Sized,
    {
        // Start the ray ahead of the agent so it doesn't hit its own collider
        let origin = self.position + self.direction * self.config.ray_offset_length;
        let hit = space.raycast(
            origin,
            self.direction,
            self.config.max_follow_distance,
            Some(self.id),
        );

        match hit {
            Some(SpatialHit {
                entity: HitEntity::Car(leader),
                distance,
            }) if self.direction.dot(leader.direction) > 0.0 => {
                let speed = if distance < self.config.min_follow_distance {
                    leader.speed * CLOSE_FOLLOW_FACTOR
                } else {
                    leader.speed
                };
                speed.clamp(0.0, self.default_speed)
            }
            _ => self.default_speed,
        }
    }

    fn retarget<R: Rng + ?Sized>(&mut self, road_graph: &RoadGraph, rng: &mut R) {
        let current = road_graph.tile_at(self.position);
        let next = decide_next_tile(road_graph, current, self.previous_tile, rng);

        let lane_offset = Direction::between(current, next)
            .map(|direction| direction.lane_offset(self.config.lane_offset_length))
            .unwrap_or(Position::ZERO);

        // Nudge into the new lane once, when the lane changes
        if lane_offset != self.current_offset {
            self.position += lane_offset;
            self.current_offset = lane_offset;
        }

        self.target_tile = next;
        self.target_position = road_graph.cell_center(next) + lane_offset;
        self.target_reached = false;
        self.previous_tile = current;
    }

    fn drive<Q, R>(&mut self, delta_secs: f32, road_graph: &RoadGraph, space: &Q, rng: &mut R)
    where
        Q: SpatialQuery + ?Sized,
        R: Rng + ?Sized,
    {
        if self.target_reached {
            self.retarget(road_graph, rng);
        }

        let to_target = self.target_position - self.position;
        let step_direction = to_target.normalized();
        if let Some(direction) = step_direction {
            self.direction = direction;
            self.heading = direction.signed_angle_from_up();
        }

        self.speed = self.follow_speed(space);

        match step_direction {
            Some(direction) => {
                self.velocity = direction * self.speed;
                let step = self.speed * delta_secs;
                let remaining = to_target.length();
                if step >= remaining {
                    self.position = self.target_position;
                } else {
                    self.position += self.velocity * delta_secs;
                }
            }
            // Already on the target point
            None => self.velocity = Position::ZERO,
        }

        if (self.position - self.target_position).length_squared()
            < TARGET_TOLERANCE * TARGET_TOLERANCE
        {
            self.target_reached = true;
        }
    }
}
