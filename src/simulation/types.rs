//! Core types for the traffic simulation
//!
//! Plain value types shared by the road graph, the agents and the lights.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// A wrapper type for car IDs
///
/// Ordered by allocation, so iterating cars by ID visits them in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarId(pub SimId);

/// A wrapper type for traffic light IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightId(pub SimId);

/// Integer coordinate of a road grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile one step in `direction`
    pub fn step(self, direction: Direction) -> TilePos {
        let (dx, dy) = direction.tile_delta();
        TilePos::new(self.x + dx, self.y + dy)
    }
}

/// The four grid directions, listed clockwise starting at north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Neighbor scan order: north, east, south, west
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn tile_delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }

    /// Direction of a single step from `from` to `to`, if the tiles are adjacent
    pub fn between(from: TilePos, to: TilePos) -> Option<Direction> {
        let delta = (to.x - from.x, to.y - from.y);
        Direction::ALL
            .into_iter()
            .find(|direction| direction.tile_delta() == delta)
    }

    pub fn unit(self) -> Position {
        let (dx, dy) = self.tile_delta();
        Position::new(dx as f32, dy as f32)
    }

    /// Perpendicular lane displacement for right-hand traffic:
    /// up -> right, right -> down, down -> left, left -> up
    pub fn lane_offset(self, length: f32) -> Position {
        self.unit().perp_right() * length
    }
}

/// A 2D position (or displacement) in world space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ZERO: Position = Position { x: 0.0, y: 0.0 };
    pub const UP: Position = Position { x: 0.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: Position) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length_squared(&self) -> f32 {
        self.dot(*self)
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*other - *self).length()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector
    pub fn normalized(&self) -> Option<Position> {
        let len = self.length();
        if len > f32::EPSILON && len.is_finite() {
            Some(Position::new(self.x / len, self.y / len))
        } else {
            None
        }
    }

    /// The vector rotated 90 degrees clockwise
    pub fn perp_right(&self) -> Position {
        Position::new(self.y, -self.x)
    }

    /// Signed angle in degrees from the world "up" axis to this vector,
    /// counter-clockwise positive
    pub fn signed_angle_from_up(&self) -> f32 {
        (-self.x).atan2(self.y).to_degrees()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

/// An axis-aligned box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Position,
    pub size: Position,
}

impl Aabb {
    pub fn new(center: Position, size: Position) -> Self {
        Self { center, size }
    }

    /// Closest point of the box to `point`
    pub fn clamp(&self, point: Position) -> Position {
        let half_x = self.size.x * 0.5;
        let half_y = self.size.y * 0.5;
        Position::new(
            point.x.clamp(self.center.x - half_x, self.center.x + half_x),
            point.y.clamp(self.center.y - half_y, self.center.y + half_y),
        )
    }

    /// True if a circle of `radius` around `point` overlaps the box
    pub fn overlaps_circle(&self, point: Position, radius: f32) -> bool {
        (self.clamp(point) - point).length_squared() < radius * radius
    }

    /// Entry distance of a ray into the box (slab test), if it hits within `max_distance`
    pub fn ray_entry(&self, origin: Position, direction: Position, max_distance: f32) -> Option<f32> {
        let half = Position::new(self.size.x * 0.5, self.size.y * 0.5);
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        for (o, d, c, h) in [
            (origin.x, direction.x, self.center.x, half.x),
            (origin.y, direction.y, self.center.y, half.y),
        ] {
            if d.abs() < f32::EPSILON {
                if o < c - h || o > c + h {
                    return None;
                }
                continue;
            }
            let t1 = (c - h - o) / d;
            let t2 = (c + h - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}
