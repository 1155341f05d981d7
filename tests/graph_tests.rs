// tests/graph_tests.rs

mod common;

use ahash::AHashSet;
use approx::assert_relative_eq;
use common::*;
use macroquad_tiled_runtime::{
    build_graph, EngineConfig, GridGeometry, Map, MapOrientation, NavigationGraph, TileCell, TileCoordinate,
    TileLayer, TileSize, TilesetData, TilesetRegistry, Walkable,
};
use std::sync::Arc;

const LAYER: u32 = 1;

fn tc(x: i32, y: i32) -> TileCoordinate {
    TileCoordinate::new(x, y)
}

fn graph_of(map: &Map, diagonals: bool) -> NavigationGraph {
    let layer = map.tile_layer(LAYER).unwrap();
    build_graph(layer, map.tilesets(), Walkable::TileProperties, diagonals)
}

#[test]
fn scenario_five_by_five_open_grid() {
    let map = single_layer_map(5, 5, vec![STATIC_GID; 25], EngineConfig::default());
    let graph = graph_of(&map, false);

    assert_eq!(graph.node_count(), 25);
    assert_eq!(graph.edge_count(), 40);

    let mut degrees = [0usize; 5];
    for n in graph.nodes() {
        degrees[graph.neighbors(n.coordinate).len()] += 1;
    }
    assert_eq!(degrees, [0, 0, 4, 12, 9]);
    for n in graph.nodes() {
        for e in graph.neighbors(n.coordinate) {
            assert!(graph.has_edge(e.to, n.coordinate), "edges come in pairs");
        }
    }
}

#[test]
fn walls_and_unwalkable_tiles_are_left_out() {
    // 8 is a tile without properties
    let gids = vec![
        STATIC_GID, WALL_GID, STATIC_GID, //
        STATIC_GID, 8, STATIC_GID, //
        STATIC_GID, STATIC_GID, 0,
    ];
    let map = single_layer_map(3, 3, gids, EngineConfig::default());
    let graph = graph_of(&map, true);

    assert_eq!(graph.node_count(), 6);
    assert!(!graph.contains(tc(1, 0)));
    assert!(!graph.contains(tc(1, 1)));
    assert!(!graph.contains(tc(2, 2)));
    assert!(!graph.has_edge(tc(0, 0), tc(1, 1)));
    assert!(graph.has_edge(tc(1, 2), tc(2, 1)));
    assert_eq!(graph.neighbors(tc(0, 0)).len(), 1);
}

#[test]
fn heavy_tiles_are_avoided_when_a_detour_is_cheaper() {
    let gids = vec![
        STATIC_GID, MUD_GID, MUD_GID, STATIC_GID, //
        STATIC_GID, STATIC_GID, STATIC_GID, STATIC_GID,
    ];
    let map = single_layer_map(4, 2, gids, EngineConfig::default());
    let graph = graph_of(&map, false);

    let (path, cost) = graph.find_path(tc(0, 0), tc(3, 0)).unwrap();
    assert_relative_eq!(cost, 5.0);
    assert_eq!(path, vec![tc(0, 0), tc(0, 1), tc(1, 1), tc(2, 1), tc(3, 1), tc(3, 0)]);

    // block the detour and the mud becomes the only way through
    let gids = vec![
        STATIC_GID, MUD_GID, MUD_GID, STATIC_GID, //
        STATIC_GID, WALL_GID, WALL_GID, STATIC_GID,
    ];
    let map = single_layer_map(4, 2, gids, EngineConfig::default());
    let (path, cost) = graph_of(&map, false).find_path(tc(0, 0), tc(3, 0)).unwrap();
    assert_relative_eq!(cost, 7.0);
    assert_eq!(path.len(), 4);
}

#[test]
fn diagonal_moves_cost_root_two() {
    let map = single_layer_map(3, 3, vec![STATIC_GID; 9], EngineConfig::default());
    let (path, cost) = graph_of(&map, true).find_path(tc(0, 0), tc(2, 2)).unwrap();
    assert_eq!(path, vec![tc(0, 0), tc(1, 1), tc(2, 2)]);
    assert_relative_eq!(cost, 2.0 * std::f32::consts::SQRT_2, epsilon = 1e-3);
}

#[test]
fn unreachable_or_missing_ends_give_no_path() {
    let gids = vec![STATIC_GID, WALL_GID, STATIC_GID];
    let map = single_layer_map(3, 1, gids, EngineConfig::default());
    let graph = graph_of(&map, true);
    assert!(graph.find_path(tc(0, 0), tc(2, 0)).is_none());
    assert!(graph.find_path(tc(0, 0), tc(1, 0)).is_none());
    assert_eq!(graph.find_path(tc(0, 0), tc(0, 0)).map(|(p, c)| (p.len(), c)), Some((1, 0.0)));
}

#[test]
fn connect_splices_distant_nodes() {
    let gids = vec![STATIC_GID, WALL_GID, STATIC_GID, STATIC_GID, STATIC_GID];
    let map = single_layer_map(5, 1, gids, EngineConfig::default());
    let mut graph = graph_of(&map, false);
    assert!(graph.find_path(tc(0, 0), tc(4, 0)).is_none());

    assert!(graph.connect(tc(0, 0), tc(4, 0), false));
    let (path, cost) = graph.find_path(tc(0, 0), tc(4, 0)).unwrap();
    assert_eq!(path, vec![tc(0, 0), tc(4, 0)]);
    assert_relative_eq!(cost, 1.0);
    assert!(graph.find_path(tc(4, 0), tc(0, 0)).is_none(), "one-way link");

    // the teleport must not make the search skip the cheaper route through it
    let (path, _) = graph.find_path(tc(0, 0), tc(3, 0)).unwrap();
    assert_eq!(path, vec![tc(0, 0), tc(4, 0), tc(3, 0)]);

    assert!(!graph.connect(tc(0, 0), tc(1, 0), true), "wall has no node");
    assert!(graph.disconnect(tc(0, 0), tc(4, 0)));
    assert!(graph.find_path(tc(0, 0), tc(4, 0)).is_none());
}

#[test]
fn removing_a_node_drops_its_edges() {
    let map = single_layer_map(3, 1, vec![STATIC_GID; 3], EngineConfig::default());
    let mut graph = graph_of(&map, false);
    assert!(graph.remove_node(tc(1, 0)).is_some());
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.neighbors(tc(0, 0)).is_empty());
    assert!(graph.remove_node(tc(1, 0)).is_none());
}

#[test]
fn infinite_layers_only_cover_allocated_chunks() {
    let geometry = GridGeometry::new(MapOrientation::Orthogonal, TileSize::new(16, 16));
    let layer = TileLayer::infinite(7, "sparse", geometry, TileSize::new(4, 4));
    layer.set_tile(tc(-1, -1), TileCell::new(STATIC_GID));
    layer.set_tile(tc(0, 0), TileCell::new(STATIC_GID));

    let everything = |_: TileCoordinate, _: Option<TileCell>, _: Option<&TilesetData>| true;
    let graph = build_graph(&layer, &TilesetRegistry::default(), Walkable::Classifier(&everything), false);
    // two 4x4 chunks
    assert_eq!(graph.node_count(), 32);
    assert!(graph.contains(tc(-4, -4)));
    assert!(!graph.contains(tc(4, 0)));
    assert!(!graph.contains(tc(0, -1)), "no chunk allocated there");
    assert_eq!(graph.layer(), Some(7));

    let set: AHashSet<TileCoordinate> = [tc(0, 0), tc(1, 0), tc(50, 50)].into_iter().collect();
    let graph = build_graph(&layer, &TilesetRegistry::default(), Walkable::Set(&set), false);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn far_apart_chunks_cost_only_their_own_extent() {
    let geometry = GridGeometry::new(MapOrientation::Orthogonal, TileSize::new(16, 16));
    let layer = TileLayer::infinite(3, "islands", geometry, TileSize::new(16, 16));
    layer.set_tile(tc(0, 0), TileCell::new(STATIC_GID));
    layer.set_tile(tc(50_000, 50_000), TileCell::new(STATIC_GID));

    let everything = |_: TileCoordinate, _: Option<TileCell>, _: Option<&TilesetData>| true;
    let graph = build_graph(&layer, &TilesetRegistry::default(), Walkable::Classifier(&everything), false);
    assert_eq!(graph.node_count(), 512);
    assert!(graph.contains(tc(15, 15)) && graph.contains(tc(50_000, 50_000)));
    assert!(!graph.contains(tc(16, 0)));
    assert!(graph.find_path(tc(0, 0), tc(50_000, 50_000)).is_none());
}

#[test]
fn classifier_may_read_the_layer_while_a_writer_waits() {
    let map = single_layer_map(2, 1, vec![STATIC_GID; 2], EngineConfig::default());
    let layer = map.tile_layer(LAYER).unwrap();
    let (start_write, wait_write) = crossbeam_channel::bounded::<()>(1);

    let graph = std::thread::scope(|s| {
        s.spawn(|| {
            if wait_write.recv().is_ok() {
                layer.set_tile(tc(1, 0), TileCell::new(MUD_GID));
            }
        });
        let classify = |c: TileCoordinate, _: Option<TileCell>, _: Option<&TilesetData>| {
            if c == tc(0, 0) {
                let _ = start_write.send(());
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            c == tc(1, 0) || layer.tile_at(c.offset(1, 0)).is_some()
        };
        build_graph(layer, map.tilesets(), Walkable::Classifier(&classify), false)
    });

    assert_eq!(graph.node_count(), 2);
    assert_eq!(layer.tile_at(tc(1, 0)), Some(TileCell::new(MUD_GID)));
}

#[test]
fn classifier_sees_cells_and_data() {
    let map = single_layer_map(3, 1, vec![ANIMATED_GID, 0, MUD_GID], EngineConfig::default());
    let layer = map.tile_layer(LAYER).unwrap();
    let animated_or_empty = |_: TileCoordinate, cell: Option<TileCell>, data: Option<&TilesetData>| {
        cell.is_none() || data.is_some_and(TilesetData::is_animated)
    };
    let graph = build_graph(layer, map.tilesets(), Walkable::Classifier(&animated_or_empty), false);
    assert!(graph.contains(tc(0, 0)) && graph.contains(tc(1, 0)));
    assert!(!graph.contains(tc(2, 0)));
}

#[test]
fn published_graphs_are_read_concurrently() {
    let map = single_layer_map(12, 12, vec![STATIC_GID; 144], EngineConfig::default());
    let first = map.publish_graph(LAYER, graph_of(&map, true)).unwrap();
    let layer = map.tile_layer(LAYER).unwrap();

    std::thread::scope(|s| {
        for i in 0..4 {
            s.spawn(move || {
                let graph = layer.graph().unwrap();
                for j in 0..12 {
                    let (path, _) = graph.find_path(tc(0, 0), tc(11, (i * 3 + j) % 12)).unwrap();
                    assert_eq!(path.first(), Some(&tc(0, 0)));
                }
                assert!(layer.tile_at(tc(i, i)).is_some());
            });
        }
    });

    // readers holding the old graph keep it after a swap
    map.remove_tile(LAYER, tc(5, 5));
    let second = map.publish_graph(LAYER, graph_of(&map, true)).unwrap();
    assert_eq!(first.node_count(), 144);
    assert_eq!(second.node_count(), 143);
    assert!(Arc::ptr_eq(&layer.graph().unwrap(), &second));
    assert_eq!(layer.clear_graph().map(|g| g.node_count()), Some(143));
    assert!(layer.graph().is_none());
}
