//! Tile-based road layout
//!
//! Road tiles are nodes of an undirected graph; an edge joins every pair of
//! orthogonally adjacent road tiles. The graph is only mutated between ticks
//! by the editing collaborator through [`RoadGraph::set_tile`].

use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;
use sorted_vec::SortedVec;
use std::collections::HashSet;

use super::config::DEFAULT_CELL_SIZE;
use super::types::{Direction, Position, TilePos};

/// The road grid shared read-only by agents and lights
#[derive(Debug, Clone)]
pub struct RoadGraph {
    /// Road tiles and their adjacency
    graph: UnGraphMap<TilePos, ()>,

    /// World size of one tile
    cell_size: f32,
}

impl Default for RoadGraph {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl RoadGraph {
    pub fn new(cell_size: f32) -> Self {
        Self {
            graph: UnGraphMap::new(),
            cell_size,
        }
    }

    /// Build a graph with the given road tiles already placed
    pub fn from_tiles(cell_size: f32, tiles: impl IntoIterator<Item = TilePos>) -> Self {
        let mut graph = Self::new(cell_size);
        for tile in tiles {
            graph.set_tile(tile, true);
        }
        graph
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Place or remove a road tile, keeping adjacency edges in sync.
    /// Callers must refresh traffic lights afterwards.
    pub fn set_tile(&mut self, tile: TilePos, is_road: bool) {
        if is_road {
            if self.graph.contains_node(tile) {
                return;
            }
            self.graph.add_node(tile);
            for direction in Direction::ALL {
                let neighbor = tile.step(direction);
                if self.graph.contains_node(neighbor) {
                    self.graph.add_edge(tile, neighbor, ());
                }
            }
        } else {
            self.graph.remove_node(tile);
        }
    }

    /// The tile containing a world point
    pub fn tile_at(&self, position: Position) -> TilePos {
        TilePos::new(
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    pub fn has_road(&self, tile: TilePos) -> bool {
        self.graph.contains_node(tile)
    }

    /// World position of the centre of a tile
    pub fn cell_center(&self, tile: TilePos) -> Position {
        Position::new(
            (tile.x as f32 + 0.5) * self.cell_size,
            (tile.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Adjacent road tiles in north, east, south, west order
    pub fn neighbor_tiles(&self, tile: TilePos) -> Vec<TilePos> {
        Direction::ALL
            .into_iter()
            .map(|direction| tile.step(direction))
            .filter(|neighbor| self.has_road(*neighbor))
            .collect()
    }

    /// Number of adjacent road tiles
    pub fn neighbor_count(&self, tile: TilePos) -> usize {
        if self.has_road(tile) {
            // Road tiles carry an edge to every adjacent road tile
            self.graph.neighbors(tile).count()
        } else {
            self.neighbor_tiles(tile).len()
        }
    }

    /// A tile with more than two road neighbors
    pub fn is_intersection(&self, tile: TilePos) -> bool {
        self.neighbor_count(tile) > 2
    }

    /// All road tiles in sorted order
    pub fn tiles(&self) -> SortedVec<TilePos> {
        SortedVec::from_unsorted(self.graph.nodes().collect())
    }

    pub fn tile_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All intersection tiles in sorted order
    pub fn intersections(&self) -> Vec<TilePos> {
        self.tiles()
            .iter()
            .copied()
            .filter(|tile| self.is_intersection(*tile))
            .collect()
    }

    /// Number of disconnected road networks
    pub fn network_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut networks = 0;

        for tile in self.tiles().iter().copied() {
            if seen.contains(&tile) {
                continue;
            }
            networks += 1;
            let mut bfs = Bfs::new(&self.graph, tile);
            while let Some(reached) = bfs.next(&self.graph) {
                seen.insert(reached);
            }
        }

        networks
    }
}
