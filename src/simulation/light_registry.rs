//! Placement and coordination of traffic lights
//!
//! The registry owns one light per intersection tile. It is rebuilt from the
//! road graph by [`LightRegistry::refresh`] after every edit and is driven by
//! the simulation clock.

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

use super::car::{CarAgent, CarState};
use super::config::LightConfig;
use super::road_graph::RoadGraph;
use super::traffic_light::TrafficLight;
use super::types::{CarId, LightId, SimId, TilePos};

#[derive(Debug, Clone, Default)]
pub struct LightRegistry {
    lights: BTreeMap<TilePos, TrafficLight>,
    config: LightConfig,
    next_id: usize,
}

impl LightRegistry {
    pub fn new(config: LightConfig) -> Self {
        Self {
            lights: BTreeMap::new(),
            config,
            next_id: 0,
        }
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    /// Place lights on exactly the intersection tiles of `road_graph`.
    ///
    /// Lights on tiles that still qualify are kept as they are. Returns the
    /// agents held by removed lights, which the caller must set driving.
    pub fn refresh(&mut self, road_graph: &RoadGraph) -> Vec<CarId> {
        let intersections: BTreeSet<TilePos> = road_graph.intersections().into_iter().collect();

        let stale: Vec<TilePos> = self
            .lights
            .keys()
            .filter(|tile| !intersections.contains(tile))
            .copied()
            .collect();

        let mut released = Vec::new();
        for tile in stale {
            if let Some(mut light) = self.lights.remove(&tile) {
                let held = light.release_all();
                if !held.is_empty() {
                    warn!(
                        "Removing light {:?} at {:?} while it holds {} car(s)",
                        light.id,
                        tile,
                        held.len()
                    );
                }
                released.extend(held);
            }
        }

        for tile in intersections {
            if self.lights.contains_key(&tile) {
                continue;
            }
            let id = LightId(SimId(self.next_id));
            self.next_id += 1;
            let light = TrafficLight::new(id, tile, road_graph.cell_center(tile), &self.config);
            self.lights.insert(tile, light);
        }

        info!("Traffic lights refreshed: {} light(s)", self.lights.len());
        released
    }

    /// Advance every light's timer. Returns the agents released this tick.
    pub fn update(&mut self, delta_secs: f32) -> Vec<CarId> {
        self.lights
            .values_mut()
            .flat_map(|light| light.update(delta_secs))
            .collect()
    }

    /// Stop agents that entered a red light's zone since the last check.
    /// Returns how many agents were stopped.
    pub fn detect_entries(&mut self, cars: &mut BTreeMap<CarId, CarAgent>) -> usize {
        let mut stopped = 0;

        for light in self.lights.values_mut() {
            let inside: BTreeSet<CarId> = cars
                .values()
                .filter(|car| {
                    light
                        .zone
                        .overlaps_circle(car.position, car.config().collider_radius)
                })
                .map(|car| car.id)
                .collect();

            for car_id in light.track_occupants(inside) {
                let Some(car) = cars.get_mut(&car_id) else {
                    continue;
                };
                // An agent that is already stopped belongs to another light
                if car.state == CarState::Stop {
                    continue;
                }
                if light.hold(car_id) {
                    debug!("Car {:?} stopped by light {:?}", car_id, light.id);
                    car.state = CarState::Stop;
                    stopped += 1;
                }
            }
        }

        stopped
    }

    /// Remove an agent from every held set and zone
    pub fn forget(&mut self, car_id: CarId) {
        for light in self.lights.values_mut() {
            light.forget(car_id);
        }
    }

    pub fn get(&self, tile: TilePos) -> Option<&TrafficLight> {
        self.lights.get(&tile)
    }

    pub fn get_mut(&mut self, tile: TilePos) -> Option<&mut TrafficLight> {
        self.lights.get_mut(&tile)
    }

    /// Tiles carrying a light, in sorted order
    pub fn positions(&self) -> Vec<TilePos> {
        self.lights.keys().copied().collect()
    }

    pub fn lights(&self) -> impl Iterator<Item = &TrafficLight> {
        self.lights.values()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Drop all lights, releasing every held agent
    pub fn clear(&mut self) -> Vec<CarId> {
        let released = self
            .lights
            .values_mut()
            .flat_map(|light| light.release_all())
            .collect();
        self.lights.clear();
        released
    }
}
