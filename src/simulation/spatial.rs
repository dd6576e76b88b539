//! Spatial queries against other agents
//!
//! Agents never look at each other directly. Every cross-agent read goes
//! through a [`SpatialQuery`], which answers from a snapshot taken at the
//! start of the tick, so the result does not depend on update order.

use ordered_float::OrderedFloat;

use super::types::{Aabb, CarId, Position};

/// Read-only view of an agent as it was at the start of the tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub position: Position,
    /// Facing direction (unit vector)
    pub direction: Position,
    pub speed: f32,
}

/// What a query hit, resolved once at the query boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitEntity {
    Car(CarView),
    /// Any collider that isn't an agent
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    pub entity: HitEntity,
    /// Distance from the query origin (ray) or box centre (overlap)
    pub distance: f32,
}

/// Collision collaborator consumed by agents
pub trait SpatialQuery {
    /// First collider along a ray, ignoring the agent `exclude`
    fn raycast(
        &self,
        origin: Position,
        direction: Position,
        max_distance: f32,
        exclude: Option<CarId>,
    ) -> Option<SpatialHit>;

    /// A collider overlapping an axis-aligned box, ignoring the agent `exclude`
    fn box_overlap(
        &self,
        center: Position,
        size: Position,
        exclude: Option<CarId>,
    ) -> Option<SpatialHit>;
}

/// A static non-agent collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub bounds: Aabb,
}

/// Built-in collision backend: agents are circles, obstacles are boxes
pub struct SnapshotSpace<'a> {
    cars: &'a [CarView],
    obstacles: &'a [Obstacle],
    car_radius: f32,
}

impl<'a> SnapshotSpace<'a> {
    pub fn new(cars: &'a [CarView], obstacles: &'a [Obstacle], car_radius: f32) -> Self {
        Self {
            cars,
            obstacles,
            car_radius,
        }
    }

    /// Distance along a normalized ray to where it enters a circle
    fn ray_circle(&self, origin: Position, direction: Position, center: Position) -> Option<f32> {
        let to_center = center - origin;
        let along = to_center.dot(direction);
        let closest_sq = to_center.length_squared() - along * along;
        let radius_sq = self.car_radius * self.car_radius;
        if closest_sq > radius_sq {
            return None;
        }
        let half_chord = (radius_sq - closest_sq).sqrt();
        let entry = along - half_chord;
        if entry >= 0.0 {
            Some(entry)
        } else if along + half_chord >= 0.0 {
            // Origin inside the circle
            Some(0.0)
        } else {
            None
        }
    }

    fn nearest(hits: impl Iterator<Item = (SpatialHit, usize)>) -> Option<SpatialHit> {
        hits.min_by_key(|(hit, order)| (OrderedFloat(hit.distance), *order))
            .map(|(hit, _)| hit)
    }
}

impl SpatialQuery for SnapshotSpace<'_> {
    fn raycast(
        &self,
        origin: Position,
        direction: Position,
        max_distance: f32,
        exclude: Option<CarId>,
    ) -> Option<SpatialHit> {
        let direction = direction.normalized()?;

        let car_hits = self
            .cars
            .iter()
            .enumerate()
            .filter(|(_, car)| Some(car.id) != exclude)
            .filter_map(|(order, car)| {
                self.ray_circle(origin, direction, car.position)
                    .filter(|distance| *distance <= max_distance)
                    .map(|distance| {
                        (
                            SpatialHit {
                                entity: HitEntity::Car(*car),
                                distance,
                            },
                            order,
                        )
                    })
            });

        let obstacle_hits = self
            .obstacles
            .iter()
            .enumerate()
            .filter_map(|(order, obstacle)| {
                obstacle
                    .bounds
                    .ray_entry(origin, direction, max_distance)
                    .map(|distance| {
                        (
                            SpatialHit {
                                entity: HitEntity::Other,
                                distance,
                            },
                            self.cars.len() + order,
                        )
                    })
            });

        Self::nearest(car_hits.chain(obstacle_hits))
    }

    fn box_overlap(
        &self,
        center: Position,
        size: Position,
        exclude: Option<CarId>,
    ) -> Option<SpatialHit> {
        let query = Aabb::new(center, size);

        let car_hits = self
            .cars
            .iter()
            .enumerate()
            .filter(|(_, car)| Some(car.id) != exclude)
            .filter(|(_, car)| query.overlaps_circle(car.position, self.car_radius))
            .map(|(order, car)| {
                (
                    SpatialHit {
                        entity: HitEntity::Car(*car),
                        distance: center.distance(&car.position),
                    },
                    order,
                )
            });

        let obstacle_hits = self
            .obstacles
            .iter()
            .enumerate()
            .filter(|(_, obstacle)| boxes_overlap(&query, &obstacle.bounds))
            .map(|(order, obstacle)| {
                (
                    SpatialHit {
                        entity: HitEntity::Other,
                        distance: center.distance(&obstacle.bounds.clamp(center)),
                    },
                    self.cars.len() + order,
                )
            });

        Self::nearest(car_hits.chain(obstacle_hits))
    }
}

fn boxes_overlap(a: &Aabb, b: &Aabb) -> bool {
    (a.center.x - b.center.x).abs() < (a.size.x + b.size.x) * 0.5
        && (a.center.y - b.center.y).abs() < (a.size.y + b.size.y) * 0.5
}
