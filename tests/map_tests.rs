// tests/map_tests.rs

mod common;

use common::*;
use macroquad::math::{vec2, Rect};
use macroquad_tiled_runtime::render::cull::animated_tiles_in_view;
use macroquad_tiled_runtime::{
    build_graph, DebugDrawOptions, EngineConfig, IrLayer, IrLayerKind, IrMap, Map, MapError, MapEvent,
    MapOrientation, MapSize, TileCell, TileCoordinate, TileSize, TileUpdateScheduler, UpdateMode, Walkable,
};
use std::sync::{Arc, Mutex};

#[test]
fn error_on_layer_size_mismatch() {
    let ir = single_layer_ir(2, 2, vec![1, 2, 3]);
    let err = Map::from_ir(&ir, EngineConfig::default()).unwrap_err();
    assert!(matches!(err, MapError::InvalidLayerSize { ref layer, expected: 4, actual: 3 } if layer == "ground"));
}

#[test]
fn zero_tile_size_is_rejected() {
    let mut ir = single_layer_ir(1, 1, vec![1]);
    ir.tile_w = 0;
    assert!(matches!(Map::from_ir(&ir, EngineConfig::default()), Err(MapError::InvalidMap(_))));
}

#[test]
fn zero_sized_tile_layer_is_rejected() {
    let mut ir = single_layer_ir(1, 1, vec![1]);
    ir.layers[0].kind = IrLayerKind::Tiles {
        width: 0,
        height: 3,
        data: Vec::new(),
    };
    let err = Map::from_ir(&ir, EngineConfig::default()).unwrap_err();
    assert!(matches!(err, MapError::InvalidMap(ref msg) if msg.contains("ground")));
}

#[test]
fn duplicate_tilesets_are_rejected() {
    let mut ir = single_layer_ir(1, 1, vec![1]);
    ir.tilesets.push(test_tileset());
    let err = Map::from_ir(&ir, EngineConfig::default()).unwrap_err();
    assert!(matches!(err, MapError::DuplicateTileset { first_gid: 1 }));
}

#[test]
fn load_allows_empty_layer_name() {
    let mut ir = single_layer_ir(1, 1, vec![1]);
    ir.layers[0].name.clear();
    let map = Map::from_ir(&ir, EngineConfig::default()).unwrap();
    assert_eq!(map.layers()[0].name(), "");
}

#[test]
fn unsupported_layers_are_skipped() {
    let mut ir = single_layer_ir(1, 1, vec![1]);
    ir.layers.push(IrLayer::new(9, "image", IrLayerKind::Unsupported));
    let map = Map::from_ir(&ir, EngineConfig::default()).unwrap();
    assert_eq!(map.layers().len(), 1);
    assert!(map.layer(9).is_none());
}

#[test]
fn flip_flags_survive_loading() {
    let raw = TileCell::new(STATIC_GID).with_flags(true, true, false).raw();
    let map = single_layer_map(1, 1, vec![raw], EngineConfig::default());
    let cell = map.tile_at(1, TileCoordinate::new(0, 0)).unwrap();
    assert_eq!(cell.gid(), STATIC_GID);
    assert!(cell.flip_h() && cell.flip_v() && !cell.flip_d());
    assert_eq!(map.tile_data_at(1, TileCoordinate::new(0, 0)).unwrap().gid, STATIC_GID);
}

#[test]
fn orthogonal_bounds_follow_layer_offset() {
    let map = single_layer_map(3, 2, vec![STATIC_GID; 6], EngineConfig::default());
    assert_eq!(map.bounding_rect(), Some(Rect::new(0.0, -32.0, 48.0, 32.0)));

    assert!(map.set_layer_offset(1, vec2(5.0, 5.0)));
    assert_eq!(map.bounding_rect(), Some(Rect::new(5.0, -27.0, 48.0, 32.0)));
    assert!(!map.set_layer_offset(42, vec2(1.0, 1.0)));
}

#[test]
fn isometric_bounds_cover_the_diamond() {
    let mut ir = single_layer_ir(2, 2, vec![STATIC_GID; 4]);
    ir.orientation = MapOrientation::Isometric;
    ir.tile_w = 64;
    ir.tile_h = 32;
    let map = Map::from_ir(&ir, EngineConfig::default()).unwrap();
    assert_eq!(map.bounding_rect(), Some(Rect::new(-64.0, -64.0, 128.0, 64.0)));
}

#[test]
fn tiles_with_property_are_ordered_by_row() {
    let gids = vec![MUD_GID, STATIC_GID, MUD_GID, MUD_GID];
    let map = single_layer_map(2, 2, gids, EngineConfig::default());
    let heavy: Vec<TileCoordinate> = map.tiles_with_property("weight").into_iter().map(|(_, c, _)| c).collect();
    assert_eq!(
        heavy,
        vec![TileCoordinate::new(0, 0), TileCoordinate::new(0, 1), TileCoordinate::new(1, 1)]
    );
}

#[test]
fn observers_receive_state_changes() {
    let mut map = single_layer_map(2, 1, vec![ANIMATED_GID, STATIC_GID], EngineConfig::default());
    let seen: Arc<Mutex<Vec<MapEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let id = map.observe(Box::new(move |e: &MapEvent| sink.lock().unwrap().push(e.clone())));

    let at = TileCoordinate::new(1, 0);
    map.set_tile(1, at, TileCell::new(STATIC_GID));
    map.set_tile(1, at, TileCell::new(MUD_GID));
    map.set_debug_draw_options(None, DebugDrawOptions::GRID | DebugDrawOptions::BOUNDS);

    let graph = build_graph(map.tile_layer(1).unwrap(), map.tilesets(), Walkable::TileProperties, false);
    map.publish_graph(1, graph);

    let mut sched = TileUpdateScheduler::new(map.config());
    let mut host = RecordingHost::new();
    sched.instantiate_layer(&map, 1, &mut host);
    sched.set_update_mode(&map, UpdateMode::Full, &mut host);

    let events = seen.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            MapEvent::TileChanged {
                layer: 1,
                coord: at,
                previous: Some(TileCell::new(STATIC_GID)),
                current: Some(TileCell::new(MUD_GID)),
            },
            MapEvent::DebugOptionsChanged {
                layer: None,
                options: DebugDrawOptions::GRID | DebugDrawOptions::BOUNDS,
            },
            MapEvent::GraphPublished { layer: 1, nodes: 2 },
            MapEvent::UpdateModeChanged {
                from: UpdateMode::Dynamic,
                to: UpdateMode::Full,
            },
        ]
    );
    assert_eq!(
        map.tile_layer(1).unwrap().debug_draw_options(),
        DebugDrawOptions::GRID | DebugDrawOptions::BOUNDS
    );

    assert!(map.unobserve(id));
    map.remove_tile(1, at);
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[test]
fn config_file_drives_map_and_scheduler() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("tiled_runtime_config_{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "update_mode": "actions", "debug_draw_options": "GRAPH", "tile_overlap": 1.0,
             "chunk_extent": { "width": 8, "height": 8 } }"#,
    )?;
    let config = EngineConfig::load(&path);
    std::fs::remove_file(&path)?;
    let config = config?;

    assert_eq!(config.update_mode, UpdateMode::Actions);
    assert_eq!(config.chunk_extent, TileSize::new(8, 8));

    let map = Map::from_ir(&single_layer_ir(1, 1, vec![STATIC_GID]), config)?;
    assert_eq!(map.tile_layer(1).unwrap().debug_draw_options(), DebugDrawOptions::GRAPH);
    assert_eq!(TileUpdateScheduler::new(map.config()).mode(), UpdateMode::Actions);
    Ok(())
}

#[test]
fn infinite_maps_use_configured_chunk_extent() {
    let config = EngineConfig {
        chunk_extent: TileSize::new(4, 4),
        ..EngineConfig::default()
    };
    let mut ir = IrMap::new(MapOrientation::Orthogonal, TileSize::new(16, 16), MapSize::new(0, 0));
    ir.infinite = true;
    ir.tilesets.push(test_tileset());
    ir.layers.push(IrLayer::new(1, "ground", IrLayerKind::Chunks { chunks: Vec::new() }));
    let map = Map::from_ir(&ir, config).unwrap();

    assert!(!map.is_valid(TileCoordinate::new(100, 100)));
    map.set_tile(1, TileCoordinate::new(100, 100), TileCell::new(STATIC_GID));
    let layer = map.tile_layer(1).unwrap();
    assert_eq!(layer.chunks().chunk_count(), 1);
    assert!(map.is_valid(TileCoordinate::new(103, 103)));
    assert!(!map.is_valid(TileCoordinate::new(104, 100)));
    assert_eq!(layer.tile_count(), 1);
}

#[test]
fn animated_tiles_in_view_skips_static_and_hidden() {
    let mut ir = single_layer_ir(3, 1, vec![ANIMATED_GID, STATIC_GID, ANIMATED_GID]);
    let mut hidden = IrLayer::new(
        2,
        "hidden",
        IrLayerKind::Tiles {
            width: 3,
            height: 1,
            data: vec![ANIMATED_GID; 3],
        },
    );
    hidden.visible = false;
    ir.layers.push(hidden);
    let map = Map::from_ir(&ir, EngineConfig::default()).unwrap();

    let found = animated_tiles_in_view(&map, Rect::new(0.0, -16.0, 48.0, 16.0));
    let coords: Vec<(u32, TileCoordinate)> = found.iter().map(|(l, c, _)| (*l, *c)).collect();
    assert_eq!(coords, vec![(1, TileCoordinate::new(0, 0)), (1, TileCoordinate::new(2, 0))]);
    assert!(found.iter().all(|(_, _, d)| d.is_animated()));
}
