//! Snapshot collision backend validation

use grid_traffic::simulation::{
    Aabb, CarId, CarView, HitEntity, Obstacle, Position, SimId, SnapshotSpace, SpatialQuery,
};

fn car(id: usize, x: f32, y: f32) -> CarView {
    CarView {
        id: CarId(SimId(id)),
        position: Position::new(x, y),
        direction: Position::new(1.0, 0.0),
        speed: 3.0,
    }
}

fn hit_car_id(entity: HitEntity) -> Option<CarId> {
    match entity {
        HitEntity::Car(view) => Some(view.id),
        HitEntity::Other => None,
    }
}

#[test]
fn test_raycast_returns_nearest_car() {
    let cars = [car(0, 3.0, 0.0), car(1, 2.0, 0.0)];
    let space = SnapshotSpace::new(&cars, &[], 0.15);

    let hit = space
        .raycast(Position::new(0.0, 0.0), Position::new(1.0, 0.0), 5.0, None)
        .expect("ray should hit");
    assert_eq!(hit_car_id(hit.entity), Some(CarId(SimId(1))));
    assert!((hit.distance - 1.85).abs() < 1e-4);
}

#[test]
fn test_raycast_respects_exclusion_and_range() {
    let cars = [car(0, 2.0, 0.0), car(1, 3.0, 0.0)];
    let space = SnapshotSpace::new(&cars, &[], 0.15);
    let origin = Position::new(0.0, 0.0);
    let right = Position::new(1.0, 0.0);

    let hit = space
        .raycast(origin, right, 5.0, Some(CarId(SimId(0))))
        .expect("ray should hit the second car");
    assert_eq!(hit_car_id(hit.entity), Some(CarId(SimId(1))));

    assert!(space.raycast(origin, right, 1.0, None).is_none());
    assert!(space.raycast(origin, Position::new(0.0, 1.0), 5.0, None).is_none());
}

#[test]
fn test_raycast_zero_direction_misses() {
    let cars = [car(0, 0.1, 0.0)];
    let space = SnapshotSpace::new(&cars, &[], 0.15);
    assert!(space
        .raycast(Position::new(0.0, 0.0), Position::ZERO, 5.0, None)
        .is_none());
}

#[test]
fn test_obstacle_blocks_ray_as_other() {
    let cars = [car(0, 2.0, 0.0)];
    let obstacles = [Obstacle {
        bounds: Aabb::new(Position::new(1.0, 0.0), Position::new(0.2, 0.2)),
    }];
    let space = SnapshotSpace::new(&cars, &obstacles, 0.15);

    let hit = space
        .raycast(Position::new(0.0, 0.0), Position::new(1.0, 0.0), 5.0, None)
        .expect("ray should hit the obstacle");
    assert_eq!(hit.entity, HitEntity::Other);
    assert!((hit.distance - 0.9).abs() < 1e-4);
}

#[test]
fn test_box_overlap() {
    let cars = [car(0, 2.0, 0.0)];
    let space = SnapshotSpace::new(&cars, &[], 0.15);
    let size = Position::new(0.5, 0.5);

    let hit = space
        .box_overlap(Position::new(2.0, 0.3), size, None)
        .expect("box should overlap the car");
    assert_eq!(hit_car_id(hit.entity), Some(CarId(SimId(0))));

    assert!(space.box_overlap(Position::new(2.0, 1.0), size, None).is_none());
    assert!(space
        .box_overlap(Position::new(2.0, 0.3), size, Some(CarId(SimId(0))))
        .is_none());
}
