// tests/common/mod.rs
#![allow(dead_code)]

use macroquad_tiled_runtime::{
    DisplayedFrame, EngineConfig, FrameAnimation, FrameTimeline, IrFrame, IrLayer, IrLayerKind, IrMap,
    IrTileMetadata, IrTileset, Map, MapOrientation, MapSize, NodeHandle, Properties, TileNodeHost, TileNodeSpec,
    TileSize,
};
use std::collections::BTreeMap;

/// Local ids 0..3 of the test tileset; tile 0 animates through 0, 1, 2.
pub const ANIMATED_GID: u32 = 1;
pub const STATIC_GID: u32 = 5;
pub const WALL_GID: u32 = 6;
pub const MUD_GID: u32 = 7;
pub const DURATIONS: [u32; 3] = [100, 150, 200];

#[derive(Debug)]
pub struct RecordedNode {
    pub spec: TileNodeSpec,
    pub gid: u32,
}

#[derive(Debug)]
pub struct RunningAnimation {
    pub timeline: FrameTimeline,
    pub frame: usize,
    pub elapsed: f64,
    pub speed: f64,
    pub paused: bool,
}

/// Host that records every call and can play Actions animations.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next: u64,
    pub nodes: BTreeMap<NodeHandle, RecordedNode>,
    pub running: BTreeMap<NodeHandle, RunningAnimation>,
    /// Texture shown by each node at the moment its animation was handed over.
    pub handoff_gids: Vec<(NodeHandle, u32, usize)>,
    pub texture_calls: usize,
    pub removed: usize,
    /// Whether this host plays animations itself.
    pub supports_actions: bool,
    /// Whether stopping an animation reports the frame it reached.
    pub reports_position: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actions(reports_position: bool) -> Self {
        RecordingHost {
            supports_actions: true,
            reports_position,
            ..Self::default()
        }
    }

    pub fn gid(&self, node: NodeHandle) -> Option<u32> {
        self.nodes.get(&node).map(|n| n.gid)
    }

    /// Plays host-side animations forward by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        for (handle, anim) in self.running.iter_mut() {
            if anim.paused {
                continue;
            }
            let (frame, elapsed) = anim.timeline.advance(anim.frame, anim.elapsed, dt * anim.speed);
            anim.frame = frame;
            anim.elapsed = elapsed;
            if let (Some(node), Some(gid)) = (self.nodes.get_mut(handle), anim.timeline.frame_gid(frame)) {
                node.gid = gid;
            }
        }
    }
}

impl TileNodeHost for RecordingHost {
    fn create_tile_node(&mut self, spec: &TileNodeSpec) -> NodeHandle {
        let handle = NodeHandle(self.next);
        self.next += 1;
        self.nodes.insert(
            handle,
            RecordedNode {
                spec: spec.clone(),
                gid: spec.frame_gid,
            },
        );
        handle
    }

    fn set_node_texture(&mut self, node: NodeHandle, frame_gid: u32) {
        self.texture_calls += 1;
        if let Some(n) = self.nodes.get_mut(&node) {
            n.gid = frame_gid;
        }
    }

    fn remove_node(&mut self, node: NodeHandle) {
        self.removed += 1;
        self.nodes.remove(&node);
        self.running.remove(&node);
    }

    fn run_frame_animation(&mut self, node: NodeHandle, animation: &FrameAnimation) -> bool {
        if !self.supports_actions {
            return false;
        }
        if let Some(n) = self.nodes.get(&node) {
            self.handoff_gids.push((node, n.gid, animation.start_frame));
        }
        self.running.insert(
            node,
            RunningAnimation {
                timeline: FrameTimeline::new(&animation.frames),
                frame: animation.start_frame,
                elapsed: animation.start_elapsed,
                speed: animation.speed,
                paused: animation.paused,
            },
        );
        true
    }

    fn stop_frame_animation(&mut self, node: NodeHandle) -> Option<DisplayedFrame> {
        let anim = self.running.remove(&node)?;
        self.reports_position.then_some(DisplayedFrame {
            frame_index: anim.frame,
            elapsed: anim.elapsed,
        })
    }
}

/// One tileset: tile 0 animated over [100, 150, 200] ms, tile 4 static,
/// tile 5 a wall, tile 6 walkable mud with weight 3. Tiles 0..=4 are walkable.
pub fn test_tileset() -> IrTileset {
    let walkable = Properties::new().with("walkable", true);
    let mut tiles = vec![IrTileMetadata {
        id: 0,
        properties: walkable.clone(),
        animation: DURATIONS
            .iter()
            .enumerate()
            .map(|(i, d)| IrFrame {
                tile_id: i as u32,
                duration_ms: *d,
            })
            .collect(),
    }];
    for id in 1..5 {
        tiles.push(IrTileMetadata {
            id,
            properties: walkable.clone(),
            animation: Vec::new(),
        });
    }
    tiles.push(IrTileMetadata {
        id: 5,
        properties: Properties::new().with("walkable", true).with("obstacle", true),
        animation: Vec::new(),
    });
    tiles.push(IrTileMetadata {
        id: 6,
        properties: walkable.with("weight", 3.0),
        animation: Vec::new(),
    });

    IrTileset {
        name: "test".into(),
        first_gid: 1,
        image: "test.png".into(),
        tile_w: 16,
        tile_h: 16,
        tilecount: 8,
        columns: 4,
        spacing: 0,
        margin: 0,
        properties: Properties::new(),
        tiles,
    }
}

/// Finite orthogonal map with a single tile layer (id 1) filled from `gids`.
pub fn single_layer_ir(width: usize, height: usize, gids: Vec<u32>) -> IrMap {
    let mut ir = IrMap::new(
        MapOrientation::Orthogonal,
        TileSize::new(16, 16),
        MapSize::new(width as u32, height as u32),
    );
    ir.tilesets.push(test_tileset());
    ir.layers.push(IrLayer::new(
        1,
        "ground",
        IrLayerKind::Tiles {
            width,
            height,
            data: gids,
        },
    ));
    ir
}

pub fn single_layer_map(width: usize, height: usize, gids: Vec<u32>, config: EngineConfig) -> Map {
    Map::from_ir(&single_layer_ir(width, height, gids), config).expect("test map should build")
}
