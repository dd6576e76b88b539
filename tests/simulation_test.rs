//! End-to-end validation of the simulation clock

use std::process::Command;

use grid_traffic::simulation::{
    CarId, CarState, LightState, Position, RoadGraph, SimConfig, SimWorld, TilePos,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn straight(length: i32) -> RoadGraph {
    RoadGraph::from_tiles(1.0, (0..length).map(|x| TilePos::new(x, 0)))
}

fn cross(arm: i32) -> RoadGraph {
    let mut tiles = vec![TilePos::new(0, 0)];
    for i in 1..=arm {
        tiles.push(TilePos::new(0, i));
        tiles.push(TilePos::new(i, 0));
        tiles.push(TilePos::new(0, -i));
        tiles.push(TilePos::new(-i, 0));
    }
    RoadGraph::from_tiles(1.0, tiles)
}

fn world_with(road_graph: RoadGraph) -> SimWorld {
    let mut world = SimWorld::new_with_seed(11);
    world.bind_road_graph(road_graph);
    world
}

fn car_mut(world: &mut SimWorld, id: CarId) -> &mut grid_traffic::simulation::CarAgent {
    world.cars.get_mut(&id).expect("car exists")
}

#[test]
fn test_spawn_without_road_graph_is_rejected() {
    let mut world = SimWorld::without_road_graph(SimConfig::default(), StdRng::seed_from_u64(1));
    assert!(world.spawn_car(Position::new(0.5, 0.5)).is_err());
    assert!(world.cars.is_empty());
    assert_eq!(world.stats.spawns_rejected, 1);

    // Ticking a world without roads is harmless
    world.tick(0.1);
    assert_eq!(world.stats.ticks, 1);
}

#[test]
fn test_spawn_off_road_is_rejected() {
    let mut world = world_with(straight(3));
    assert!(world.spawn_car(Position::new(0.5, 3.5)).is_err());
    assert!(world.spawn_car(Position::new(0.5, 0.5)).is_ok());
    assert_eq!(world.cars.len(), 1);
}

#[test]
fn test_rejected_spawn_leaves_ids_and_speeds_unchanged() {
    let mut rejected_first = world_with(straight(3));
    assert!(rejected_first.spawn_car(Position::new(0.5, 3.5)).is_err());
    let id = rejected_first
        .spawn_car(Position::new(1.5, 0.5))
        .expect("spawn on road");

    let mut clean = world_with(straight(3));
    let clean_id = clean.spawn_car(Position::new(1.5, 0.5)).expect("spawn on road");

    assert_eq!(id, clean_id);
    assert_eq!(
        rejected_first.cars[&id].default_speed,
        clean.cars[&clean_id].default_speed
    );
    assert_eq!(rejected_first.stats.spawns_rejected, 1);
}

#[test]
fn test_create_test_world_lattice() {
    let world = SimWorld::create_test_world(2);
    let road_graph = world.road_graph().expect("road graph bound");

    // Three rows and three columns of nine tiles, sharing nine crossings
    assert_eq!(road_graph.tile_count(), 45);
    assert_eq!(road_graph.network_count(), 1);
    // Corners are bends; edge crossings are T junctions plus the centre
    assert_eq!(world.lights.len(), 5);
    assert!(world.lights.get(TilePos::new(4, 4)).is_some());
    assert!(world.lights.get(TilePos::new(0, 0)).is_none());
    assert!(world.cars.is_empty());
}

#[test]
fn test_default_speed_within_bounds() {
    let mut world = world_with(straight(10));
    for x in 0..10 {
        let id = world
            .spawn_car_on_tile(TilePos::new(x, 0))
            .expect("spawn on road");
        let car = &world.cars[&id];
        assert!(car.default_speed >= world.config.car.min_speed);
        assert!(car.default_speed <= world.config.car.max_speed);
    }
}

#[test]
fn test_follower_brakes_behind_close_leader() {
    let mut world = world_with(straight(10));

    // Leader first, so it is updated before the follower reads it
    let leader = world
        .spawn_car_with_speed(Position::new(5.5, 0.5), 9.0)
        .expect("spawn leader");
    let follower = world
        .spawn_car_with_speed(Position::new(4.5, 0.5), 8.0)
        .expect("spawn follower");

    {
        let car = car_mut(&mut world, leader);
        car.position = Position::new(5.5, 0.35);
        car.direction = Position::new(1.0, 0.0);
        car.speed = 5.0;
    }
    {
        // On the centre line; the eastbound lane nudge puts it at y = 0.35
        let car = car_mut(&mut world, follower);
        car.position = Position::new(5.2, 0.5);
    }

    world.tick(0.01);

    assert_eq!(world.cars[&follower].speed, 2.5);
}

#[test]
fn test_follower_matches_leader_at_distance() {
    let mut world = world_with(straight(10));
    let leader = world
        .spawn_car_with_speed(Position::new(6.5, 0.5), 9.0)
        .expect("spawn leader");
    let follower = world
        .spawn_car_with_speed(Position::new(4.5, 0.5), 8.0)
        .expect("spawn follower");

    {
        let car = car_mut(&mut world, leader);
        car.position = Position::new(6.0, 0.35);
        car.direction = Position::new(1.0, 0.0);
        car.speed = 4.0;
    }
    {
        let car = car_mut(&mut world, follower);
        car.position = Position::new(5.0, 0.5);
    }

    world.tick(0.01);

    assert_eq!(world.cars[&follower].speed, 4.0);
}

#[test]
fn test_yield_to_car_from_the_right() {
    let mut world = world_with(cross(2));
    let yielding = world
        .spawn_car_on_tile(TilePos::new(0, 0))
        .expect("spawn at junction");
    let priority = world
        .spawn_car_on_tile(TilePos::new(1, 0))
        .expect("spawn on east arm");

    {
        let car = car_mut(&mut world, yielding);
        car.position = Position::new(0.65, 0.3);
        car.direction = Position::UP;
    }
    {
        let car = car_mut(&mut world, priority);
        car.position = Position::new(1.0, 0.65);
        car.direction = Position::new(-1.0, 0.0);
        car.speed = 5.0;
    }

    world.tick(0.1);
    assert_eq!(world.cars[&yielding].state, CarState::Yield);
    assert_eq!(world.cars[&yielding].speed, 0.0);
    assert_eq!(world.stats.yields_entered, 1);

    world.despawn_car(priority).expect("despawn");
    world.tick(0.1);
    assert_eq!(world.cars[&yielding].state, CarState::Drive);
}

#[test]
fn test_no_yield_to_standing_car() {
    let mut world = world_with(cross(2));
    let checking = world
        .spawn_car_on_tile(TilePos::new(0, 0))
        .expect("spawn at junction");
    let standing = world
        .spawn_car_on_tile(TilePos::new(1, 0))
        .expect("spawn on east arm");

    {
        let car = car_mut(&mut world, checking);
        car.position = Position::new(0.65, 0.3);
        car.direction = Position::UP;
    }
    {
        let car = car_mut(&mut world, standing);
        car.position = Position::new(1.0, 0.65);
        car.direction = Position::new(-1.0, 0.0);
        car.speed = 0.0;
    }

    world.tick(0.1);
    assert_eq!(world.cars[&checking].state, CarState::Drive);
}

#[test]
fn test_red_light_stops_and_releases_car() {
    let mut world = world_with(cross(2));
    let junction = TilePos::new(0, 0);
    world
        .lights
        .get_mut(junction)
        .expect("light at junction")
        .set_state(LightState::Stop);

    // The end of the east arm only leads towards the junction
    let id = world
        .spawn_car_with_speed(Position::new(2.5, 0.5), 5.0)
        .expect("spawn");

    for _ in 0..100 {
        world.tick(0.02);
        if world.cars[&id].state == CarState::Stop {
            break;
        }
    }

    let light = world.lights.get(junction).expect("light at junction");
    assert_eq!(world.cars[&id].state, CarState::Stop);
    assert!(light.holds(id));
    assert_eq!(world.stats.light_stops, 1);
    let stopped_at = world.cars[&id].position;

    // Stays put while red
    world.tick(0.02);
    assert_eq!(world.cars[&id].position, stopped_at);
    assert_eq!(world.cars[&id].speed, 0.0);

    let mut ticks = 0;
    while world.lights.get(junction).map(|light| light.state) == Some(LightState::Stop) {
        world.tick(0.02);
        ticks += 1;
        assert!(ticks < 1000, "Light never turned green");
    }

    assert_eq!(world.cars[&id].state, CarState::Drive);
    assert!(world
        .lights
        .get(junction)
        .map(|light| light.held().is_empty())
        .unwrap_or(false));
    assert_eq!(world.stats.light_releases, 1);
}

#[test]
fn test_light_turning_red_does_not_stop_car_already_inside() {
    let mut world = world_with(cross(2));
    let junction = TilePos::new(0, 0);
    let id = world
        .spawn_car_with_speed(Position::new(0.5, 0.5), 1.0)
        .expect("spawn at junction");

    world.tick(0.01);
    world
        .lights
        .get_mut(junction)
        .expect("light at junction")
        .set_state(LightState::Stop);
    world.tick(0.01);

    assert_eq!(world.cars[&id].state, CarState::Drive);
    assert!(world
        .lights
        .get(junction)
        .map(|light| light.held().is_empty())
        .unwrap_or(false));
}

#[test]
fn test_despawn_removes_car_from_held_set() {
    let mut world = world_with(cross(2));
    let junction = TilePos::new(0, 0);
    world
        .lights
        .get_mut(junction)
        .expect("light at junction")
        .set_state(LightState::Stop);
    let id = world
        .spawn_car_with_speed(Position::new(2.5, 0.5), 5.0)
        .expect("spawn");

    for _ in 0..100 {
        world.tick(0.02);
    }
    assert!(world.lights.get(junction).map(|light| light.holds(id)) == Some(true));

    world.despawn_car(id).expect("despawn");
    assert!(world.cars.is_empty());
    assert!(world.lights.get(junction).map(|light| light.holds(id)) == Some(false));
    assert!(world.despawn_car(id).is_err());
}

#[test]
fn test_removing_junction_releases_held_car() {
    let mut world = world_with(cross(2));
    let junction = TilePos::new(0, 0);
    world
        .lights
        .get_mut(junction)
        .expect("light at junction")
        .set_state(LightState::Stop);
    let id = world
        .spawn_car_with_speed(Position::new(2.5, 0.5), 5.0)
        .expect("spawn");

    for _ in 0..100 {
        world.tick(0.02);
    }
    assert_eq!(world.cars[&id].state, CarState::Stop);

    world.set_tile(TilePos::new(0, 1), false);
    world.set_tile(TilePos::new(0, -1), false);

    assert!(world.lights.is_empty());
    assert_eq!(world.cars[&id].state, CarState::Drive);
}

#[test]
fn test_light_refresh_is_idempotent() {
    let mut world = SimWorld::create_test_world_with_seed(2, 5);
    let positions = world.lights.positions();
    let expected = world
        .road_graph()
        .map(|road_graph| road_graph.intersections())
        .unwrap_or_default();
    assert_eq!(positions, expected);
    assert!(!positions.is_empty());

    for _ in 0..3 {
        world.refresh_traffic_lights();
        assert_eq!(world.lights.positions(), positions);
    }
}

#[test]
fn test_set_tile_updates_lights() {
    let mut world = world_with(straight(5));
    assert!(world.lights.is_empty());

    // A side branch turns the straight road into a T junction
    world.set_tile(TilePos::new(2, 1), true);
    assert_eq!(world.lights.positions(), vec![TilePos::new(2, 0)]);

    world.set_tile(TilePos::new(2, -1), true);
    assert_eq!(world.lights.positions(), vec![TilePos::new(2, 0)]);

    world.set_tile(TilePos::new(2, 1), false);
    assert_eq!(world.lights.positions(), vec![TilePos::new(2, 0)]);

    world.set_tile(TilePos::new(2, -1), false);
    assert!(world.lights.is_empty());
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let run = || {
        let mut world = SimWorld::create_test_world_with_seed(2, 42);
        world.spawn_random_cars(12);
        for _ in 0..300 {
            world.tick(0.05);
        }
        world
            .cars
            .values()
            .map(|car| (car.id, car.position, car.state))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_long_run_invariants() {
    let mut world = SimWorld::create_test_world_with_seed(3, 7);
    let spawned = world.spawn_random_cars(30);
    assert_eq!(spawned.len(), 30);

    for _ in 0..2000 {
        world.tick(0.05);

        let road_graph = world.road_graph().expect("road graph bound");
        for car in world.cars.values() {
            assert!(car.position.x.is_finite() && car.position.y.is_finite());
            assert!(car.speed >= 0.0 && car.speed <= car.default_speed);
            assert!(road_graph.has_road(road_graph.tile_at(car.position)));

            let holders = world.lights.lights().filter(|light| light.holds(car.id)).count();
            assert!(holders <= 1, "Car {:?} held by {} lights", car.id, holders);
            if holders == 1 {
                assert_eq!(car.state, CarState::Stop);
            }
        }
    }

    assert_eq!(world.cars.len(), 30);
    assert!(world.stats.light_stops > 0);
}

#[test]
fn test_render_map() {
    let mut world = world_with(cross(1));
    world.spawn_car_on_tile(TilePos::new(0, 1)).expect("spawn");

    let map = world.render_map();
    assert_eq!(map, " C \n#G#\n # \n");
}

/// Test that the headless runner completes and reports its totals
#[test]
fn test_headless_simulation_runs() {
    let output = Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .args(["--ticks", "50", "--seed", "3", "--cars", "5"])
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute simulation");

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Total cars spawned: 5"));
}
