#![warn(missing_docs)]

//! Tile-map runtime for Tiled maps on Macroquad: orientation-aware transforms,
//! sparse chunked layers, a three-mode tile animation scheduler and
//! navigation graphs.

/// Per-tile animation state and the update scheduler.
pub mod animation {
    pub mod scheduler;
    pub mod state;
}
pub mod config;
pub mod error;
pub mod events;
pub mod ir_map;
pub mod layer;
pub mod map;
pub mod navigation;
pub mod properties;
/// View culling and the render host seam.
pub mod render {
    pub mod cull;
    pub mod host;
    pub mod macroquad_host;
}
/// Coordinates, chunk storage and orientation transforms.
pub mod spatial {
    pub mod chunk;
    pub mod index;
    pub mod transform;
}
pub mod tileset;

pub use animation::scheduler::{FrameDecision, TickReport, TileKey, TileUpdateScheduler};
pub use animation::state::{AnimationState, FrameTimeline};
pub use config::{DebugDrawOptions, EngineConfig, UpdateMode, MAX_TILE_OVERLAP};
pub use error::MapError;
pub use events::{MapEvent, ObserverId};
pub use ir_map::{IrChunk, IrFrame, IrLayer, IrLayerKind, IrMap, IrObject, IrObjectShape, IrTileMetadata, IrTileset};
pub use layer::{GroupLayer, Layer, LayerId, MapObject, ObjectLayer, TileLayer};
pub use map::Map;
pub use navigation::{build_graph, GraphEdge, GraphNode, NavigationGraph, Walkable};
pub use properties::{Properties, PropertyValue};
pub use render::host::{DisplayedFrame, FrameAnimation, NodeHandle, TileNodeHost, TileNodeSpec};
pub use render::macroquad_host::MacroquadHost;
pub use spatial::chunk::{Chunk, ChunkStore};
pub use spatial::index::{ChunkCoord, MapSize, TileCell, TileCoordinate, TileRect, TileSize};
pub use spatial::transform::{
    coordinate_to_point, coordinate_to_point_with_offset, point_to_coordinate, point_to_coordinate_with_offset,
    Anchor, GridGeometry, MapOrientation, RenderPoint, StaggerAxis, StaggerIndex, TileOffset,
};
pub use tileset::{AnimationFrame, Tileset, TilesetData, TilesetRegistry};
