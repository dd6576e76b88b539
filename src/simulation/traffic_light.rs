//! Traffic light logic for the traffic simulation
//!
//! A light alternates between PASS and STOP on a timer. Agents that enter
//! its trigger zone while it shows STOP are held, and all of them are
//! released together when it turns back to PASS.

use std::collections::BTreeSet;

use super::config::LightConfig;
use super::types::{Aabb, CarId, LightId, Position, TilePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    Pass,
    Stop,
}

/// A traffic light on an intersection tile
#[derive(Debug, Clone)]
pub struct TrafficLight {
    pub id: LightId,
    pub tile: TilePos,
    pub zone: Aabb,
    pub state: LightState,
    /// Time left before the next flip
    pub remaining_time: f32,
    pub pass_time: f32,
    pub stop_time: f32,
    /// Agents this light stopped, in the order they arrived
    held: Vec<CarId>,
    /// Agents overlapping the trigger zone after the last check
    occupants: BTreeSet<CarId>,
}

impl TrafficLight {
    /// A new light starts in PASS with a full countdown
    pub fn new(id: LightId, tile: TilePos, center: Position, config: &LightConfig) -> Self {
        let mut light = Self {
            id,
            tile,
            zone: Aabb::new(center, config.zone_size),
            state: LightState::Pass,
            remaining_time: 0.0,
            pass_time: config.pass_time,
            stop_time: config.stop_time,
            held: Vec::new(),
            occupants: BTreeSet::new(),
        };
        light.set_state(LightState::Pass);
        light
    }

    /// Switch state and reset the countdown.
    /// Returns the agents released by a switch to PASS.
    pub fn set_state(&mut self, state: LightState) -> Vec<CarId> {
        self.state = state;
        match state {
            LightState::Pass => {
                self.remaining_time = self.pass_time;
                std::mem::take(&mut self.held)
            }
            LightState::Stop => {
                self.remaining_time = self.stop_time;
                Vec::new()
            }
        }
    }

    /// Count down and flip when the timer runs out.
    /// Returns the agents released by this tick.
    pub fn update(&mut self, delta_secs: f32) -> Vec<CarId> {
        self.remaining_time -= delta_secs;

        if self.remaining_time > 0.0 {
            return Vec::new();
        }

        match self.state {
            LightState::Pass => self.set_state(LightState::Stop),
            LightState::Stop => self.set_state(LightState::Pass),
        }
    }

    /// Record the set of agents currently overlapping the zone and return
    /// the ones that were not inside at the previous check
    pub fn track_occupants(&mut self, inside: BTreeSet<CarId>) -> Vec<CarId> {
        let entered = inside.difference(&self.occupants).copied().collect();
        self.occupants = inside;
        entered
    }

    /// Hold an agent that entered on STOP. Returns false if the light isn't
    /// showing STOP or already holds the agent.
    pub fn hold(&mut self, car_id: CarId) -> bool {
        if self.state != LightState::Stop || self.held.contains(&car_id) {
            return false;
        }
        self.held.push(car_id);
        true
    }

    pub fn holds(&self, car_id: CarId) -> bool {
        self.held.contains(&car_id)
    }

    pub fn held(&self) -> &[CarId] {
        &self.held
    }

    /// Drop every reference to an agent that left the simulation
    pub fn forget(&mut self, car_id: CarId) {
        self.held.retain(|held| *held != car_id);
        self.occupants.remove(&car_id);
    }

    /// Release everything without changing state (light being removed)
    pub fn release_all(&mut self) -> Vec<CarId> {
        self.occupants.clear();
        std::mem::take(&mut self.held)
    }
}
