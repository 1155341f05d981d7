//! Weighted grid graphs built from a tile layer, and shortest-path search over them.

use crate::layer::{LayerId, TileLayer};
use crate::spatial::index::{TileCell, TileCoordinate, TileRect};
use crate::tileset::{TilesetData, TilesetRegistry};
use ahash::{AHashMap, AHashSet};
use log::debug;
use pathfinding::prelude::astar;
use smallvec::SmallVec;

/// Edge costs are searched as integers with this many steps per unit.
const COST_SCALE: f32 = 1000.0;

const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONAL: [(i32, i32); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

/// A walkable tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphNode {
    /// Tile position.
    pub coordinate: TileCoordinate,
    /// Cost of entering the tile; 1.0 unless the tile sets `weight`.
    pub weight: f32,
}

/// Directed link to a neighbour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    /// Target node.
    pub to: TileCoordinate,
    /// Cost of taking the link.
    pub cost: f32,
}

/// How `build_graph` decides whether a coordinate is walkable.
pub enum Walkable<'a> {
    /// Exactly these coordinates; entries outside the layer are ignored.
    Set(&'a AHashSet<TileCoordinate>),
    /// Called for every coordinate inside the layer.
    Classifier(&'a dyn Fn(TileCoordinate, Option<TileCell>, Option<&TilesetData>) -> bool),
    /// Tiles whose data says `walkable = true` and not `obstacle`.
    TileProperties,
}

/// Nodes keyed by coordinate with directed adjacency.
///
/// The graph only remembers which layer it came from; it holds no reference to it.
#[derive(Debug, Clone, Default)]
pub struct NavigationGraph {
    layer: Option<LayerId>,
    nodes: AHashMap<TileCoordinate, GraphNode>,
    edges: AHashMap<TileCoordinate, SmallVec<[GraphEdge; 8]>>,
    spliced: bool,
}

impl NavigationGraph {
    /// Empty graph, optionally tagged with its source layer.
    pub fn new(layer: Option<LayerId>) -> Self {
        NavigationGraph {
            layer,
            ..Default::default()
        }
    }

    /// Layer the graph was built from.
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    /// Adds or reweights a node. Existing edges keep their cost.
    pub fn add_node(&mut self, coordinate: TileCoordinate, weight: f32) {
        self.nodes.insert(coordinate, GraphNode { coordinate, weight });
        self.edges.entry(coordinate).or_default();
    }

    /// Node at `coordinate`.
    pub fn node(&self, coordinate: TileCoordinate) -> Option<&GraphNode> {
        self.nodes.get(&coordinate)
    }

    /// `true` if `coordinate` is walkable in this graph.
    pub fn contains(&self, coordinate: TileCoordinate) -> bool {
        self.nodes.contains_key(&coordinate)
    }

    /// Every node, unordered.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// `true` without nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outgoing edges of a node; empty for unknown coordinates.
    pub fn neighbors(&self, coordinate: TileCoordinate) -> &[GraphEdge] {
        self.edges.get(&coordinate).map(|e| e.as_slice()).unwrap_or(&[])
    }

    /// `true` if a directed edge leads from `from` to `to`.
    pub fn has_edge(&self, from: TileCoordinate, to: TileCoordinate) -> bool {
        self.neighbors(from).iter().any(|e| e.to == to)
    }

    /// Connections counted once per node pair, whatever their direction.
    pub fn edge_count(&self) -> usize {
        let mut pairs = AHashSet::new();
        for (from, list) in &self.edges {
            for e in list {
                pairs.insert(if *from <= e.to { (*from, e.to) } else { (e.to, *from) });
            }
        }
        pairs.len()
    }

    fn link(&mut self, from: TileCoordinate, to: TileCoordinate, cost: f32) {
        let list = self.edges.entry(from).or_default();
        match list.iter_mut().find(|e| e.to == to) {
            Some(e) => e.cost = cost,
            None => list.push(GraphEdge { to, cost }),
        }
    }

    /// Joins two existing nodes, e.g. the ends of a tunnel. Cost is the weight of the target.
    pub fn connect(&mut self, a: TileCoordinate, b: TileCoordinate, bidirectional: bool) -> bool {
        let (Some(na), Some(nb)) = (self.nodes.get(&a).copied(), self.nodes.get(&b).copied()) else {
            return false;
        };
        if a == b {
            return false;
        }
        self.link(a, b, nb.weight);
        if bidirectional {
            self.link(b, a, na.weight);
        }
        self.spliced = true;
        true
    }

    /// Removes edges between `a` and `b` in both directions.
    pub fn disconnect(&mut self, a: TileCoordinate, b: TileCoordinate) -> bool {
        let mut removed = false;
        for (from, to) in [(a, b), (b, a)] {
            if let Some(list) = self.edges.get_mut(&from) {
                let before = list.len();
                list.retain(|e| e.to != to);
                removed |= list.len() != before;
            }
        }
        removed
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, coordinate: TileCoordinate) -> Option<GraphNode> {
        let node = self.nodes.remove(&coordinate)?;
        if let Some(out) = self.edges.remove(&coordinate) {
            for e in out {
                if let Some(back) = self.edges.get_mut(&e.to) {
                    back.retain(|x| x.to != coordinate);
                }
            }
        }
        // manual edges may point here without a reverse edge
        for list in self.edges.values_mut() {
            list.retain(|e| e.to != coordinate);
        }
        Some(node)
    }

    /// Lower bound on the cost of one unit of grid distance, used to scale the
    /// A* heuristic. Diagonal edges span √2 units. Zero once `connect` has
    /// added links that skip over the grid.
    fn cost_per_step(&self) -> f32 {
        if self.spliced {
            return 0.0;
        }
        let min = self
            .edges
            .iter()
            .flat_map(|(from, list)| list.iter().map(move |e| (*from, e)))
            .map(|(from, e)| {
                if e.to.x != from.x && e.to.y != from.y {
                    e.cost / std::f32::consts::SQRT_2
                } else {
                    e.cost
                }
            })
            .fold(f32::INFINITY, f32::min);
        if min.is_finite() {
            min
        } else {
            0.0
        }
    }

    /// Cheapest path from `start` to `goal` and its total cost.
    ///
    /// `None` when either end is missing or the goal is unreachable.
    pub fn find_path(&self, start: TileCoordinate, goal: TileCoordinate) -> Option<(Vec<TileCoordinate>, f32)> {
        if !self.contains(start) || !self.contains(goal) {
            return None;
        }
        let scale = self.cost_per_step();
        let diagonal = self
            .edges
            .iter()
            .any(|(from, list)| list.iter().any(|e| e.to.x != from.x && e.to.y != from.y));

        let (path, cost) = astar(
            &start,
            |c| {
                self.neighbors(*c)
                    .iter()
                    .map(|e| (e.to, to_fixed(e.cost)))
                    .collect::<SmallVec<[_; 8]>>()
            },
            |c| {
                let dx = (c.x - goal.x).unsigned_abs() as f32;
                let dy = (c.y - goal.y).unsigned_abs() as f32;
                let steps = if diagonal {
                    dx.max(dy) + (std::f32::consts::SQRT_2 - 1.0) * dx.min(dy)
                } else {
                    dx + dy
                };
                to_fixed(steps * scale)
            },
            |c| *c == goal,
        )?;
        Some((path, cost as f32 / COST_SCALE))
    }
}

fn to_fixed(cost: f32) -> u64 {
    (cost.max(0.0) * COST_SCALE).round() as u64
}

/// Builds the walkable graph of `layer`.
///
/// Nodes are only created for coordinates inside the layer: the map area for
/// finite layers, allocated chunks for infinite ones. Neighbours are linked in
/// both directions; the edge cost is the weight of the tile being entered,
/// scaled by √2 on diagonals. No walkable tile yields an empty graph.
pub fn build_graph(
    layer: &TileLayer,
    tilesets: &TilesetRegistry,
    walkable: Walkable<'_>,
    diagonals_allowed: bool,
) -> NavigationGraph {
    let mut graph = NavigationGraph::new(Some(layer.id));
    let candidates = collect_candidates(layer, &walkable);
    let data_of = |cell: Option<TileCell>| cell.and_then(|cell| tilesets.data_for_cell(cell)).map(|d| &**d);
    let weight_of = |data: Option<&TilesetData>| data.map(TilesetData::weight).unwrap_or(1.0);

    // the read guard is gone here, so a classifier may query the layer itself
    for (c, cell) in candidates {
        let data = data_of(cell);
        let keep = match walkable {
            Walkable::Set(_) => true,
            Walkable::Classifier(f) => f(c, cell, data),
            Walkable::TileProperties => data.is_some_and(|d| d.walkable() == Some(true) && !d.obstacle()),
        };
        if keep {
            graph.add_node(c, weight_of(data));
        }
    }

    let coords: Vec<TileCoordinate> = graph.nodes.keys().copied().collect();
    for c in coords {
        for (dx, dy) in ORTHOGONAL {
            let n = c.offset(dx, dy);
            if let Some(w) = graph.node(n).map(|n| n.weight) {
                graph.link(c, n, w);
            }
        }
        if diagonals_allowed {
            for (dx, dy) in DIAGONAL {
                let n = c.offset(dx, dy);
                if let Some(w) = graph.node(n).map(|n| n.weight) {
                    graph.link(c, n, w * std::f32::consts::SQRT_2);
                }
            }
        }
    }

    debug!(
        "layer '{}': graph with {} nodes, {} edges",
        layer.name,
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

/// Snapshot of the cells `walkable` has to look at, taken under one read guard.
///
/// Infinite layers are walked chunk by chunk so far-apart chunks cost only
/// their own extent.
fn collect_candidates(layer: &TileLayer, walkable: &Walkable<'_>) -> Vec<(TileCoordinate, Option<TileCell>)> {
    let bounds = layer.bounds();
    let store = layer.chunks();
    let inside = |c: TileCoordinate| match bounds {
        Some(b) => b.contains(c),
        None => store.chunk_for(c).is_some(),
    };

    match walkable {
        Walkable::Set(set) => set
            .iter()
            .filter(|c| inside(**c))
            .map(|c| (*c, store.get_tile(*c)))
            .collect(),
        Walkable::Classifier(_) => match bounds {
            Some(rect) => rect.coords().map(|c| (c, store.get_tile(c))).collect(),
            None => {
                let extent = store.extent();
                let mut out = Vec::with_capacity(store.chunk_count() * (extent.width * extent.height) as usize);
                for key in store.chunk_keys() {
                    let Some(chunk) = store.chunk(key) else {
                        continue;
                    };
                    let origin = chunk.origin();
                    let rect = TileRect::from_size(origin.x, origin.y, extent.width, extent.height);
                    out.extend(rect.coords().map(|c| (c, store.get_tile(c))));
                }
                out
            }
        },
        Walkable::TileProperties => store.iter().map(|(c, cell)| (c, Some(cell))).collect(),
    }
}
