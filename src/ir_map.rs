// src/ir_map.rs
//! Format-agnostic, fully resolved map description.
//!
//! This is what a document parser hands to [`Map::from_ir`](crate::Map::from_ir).
//! Offsets and object positions are in Tiled pixels (y down).
use crate::properties::Properties;
use crate::spatial::index::{MapSize, TileSize};
use crate::spatial::transform::MapOrientation;
use macroquad::math::Vec2;

/// Canonical, format-agnostic map.
#[derive(Debug, Clone)]
pub struct IrMap {
    /// Grid layout.
    pub orientation: MapOrientation,
    /// Tile width in pixels.
    pub tile_w: u32,
    /// Tile height in pixels.
    pub tile_h: u32,
    /// Size in tiles. Ignored for infinite maps.
    pub width: u32,
    /// See `width`.
    pub height: u32,
    /// Tile layers come as chunk lists instead of fixed arrays.
    pub infinite: bool,
    /// Map-level custom properties.
    pub properties: Properties,
    /// Any order; sorted by `first_gid` at load.
    pub tilesets: Vec<IrTileset>,
    /// Draw order: array order.
    pub layers: Vec<IrLayer>,
}

impl IrMap {
    /// Finite map without tilesets or layers.
    pub fn new(orientation: MapOrientation, tile_size: TileSize, size: MapSize) -> Self {
        IrMap {
            orientation,
            tile_w: tile_size.width,
            tile_h: tile_size.height,
            width: size.width,
            height: size.height,
            infinite: false,
            properties: Properties::new(),
            tilesets: Vec::new(),
            layers: Vec::new(),
        }
    }
}

/// One image atlas with a regular grid.
#[derive(Debug, Clone)]
pub struct IrTileset {
    /// Display name.
    pub name: String,
    /// Global id of the tileset's first tile.
    pub first_gid: u32,
    /// Atlas image path.
    pub image: String,
    /// Tile width in pixels.
    pub tile_w: u32,
    /// Tile height in pixels.
    pub tile_h: u32,
    /// Tiles in the atlas.
    pub tilecount: u32,
    /// Tiles per atlas row.
    pub columns: u32,
    /// Pixels between tiles; 0 if not used.
    pub spacing: u32,
    /// Pixels around the atlas border; 0 if not used.
    pub margin: u32,
    /// Tileset-level custom properties.
    pub properties: Properties,
    /// Only tiles that carry metadata are listed.
    pub tiles: Vec<IrTileMetadata>,
}

/// Per-tile metadata: properties and animation.
#[derive(Debug, Clone, Default)]
pub struct IrTileMetadata {
    /// Local id inside the tileset.
    pub id: u32,
    /// Tile custom properties (`walkable`, `weight`, ...).
    pub properties: Properties,
    /// Empty for static tiles.
    pub animation: Vec<IrFrame>,
}

/// Animation frame; `tile_id` is local to the owning tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFrame {
    /// Local id of the tile shown.
    pub tile_id: u32,
    /// How long it is shown.
    pub duration_ms: u32,
}

/// Block of cells of an infinite tile layer.
#[derive(Debug, Clone)]
pub struct IrChunk {
    /// Column of the first cell.
    pub x: i32,
    /// Row of the first cell.
    pub y: i32,
    /// Columns in the block.
    pub width: u32,
    /// Rows in the block.
    pub height: u32,
    /// Raw gids, flip flags included.
    pub data: Vec<u32>,
}

/// Layer payload.
#[derive(Debug, Clone)]
pub enum IrLayerKind {
    /// Finite tile layer.
    Tiles {
        /// Columns.
        width: usize,
        /// Rows.
        height: usize,
        /// Raw gids, row-major, flip flags included.
        data: Vec<u32>,
    },
    /// Infinite-map tile layer.
    Chunks {
        /// Allocated blocks.
        chunks: Vec<IrChunk>,
    },
    /// Object layer.
    Objects {
        /// Objects in draw order.
        objects: Vec<IrObject>,
    },
    /// Group of nested layers.
    Group {
        /// Children in draw order.
        layers: Vec<IrLayer>,
    },
    /// Image layers and anything else the runtime skips.
    Unsupported,
}

/// One layer of the map description.
#[derive(Debug, Clone)]
pub struct IrLayer {
    /// Unique id.
    pub id: u32,
    /// Display name; may be empty.
    pub name: String,
    /// Hidden layers are loaded but not drawn or animated.
    pub visible: bool,
    /// 0 to 1.
    pub opacity: f32,
    /// Tiled pixels, y down.
    pub offset: Vec2,
    /// Layer custom properties.
    pub properties: Properties,
    /// Payload.
    pub kind: IrLayerKind,
}

impl IrLayer {
    /// Visible, opaque layer without offset or properties.
    pub fn new(id: u32, name: impl Into<String>, kind: IrLayerKind) -> Self {
        IrLayer {
            id,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            offset: Vec2::ZERO,
            properties: Properties::new(),
            kind,
        }
    }
}

/// Object geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum IrObjectShape {
    /// Axis-aligned box of the object size.
    Rectangle,
    /// Ellipse inscribed in the object box.
    Ellipse,
    /// Single point.
    Point,
    /// Closed outline relative to the object position.
    Polygon(Vec<Vec2>),
    /// Open outline relative to the object position.
    Polyline(Vec<Vec2>),
    /// Tile object.
    Tile {
        /// Raw gid of the tile.
        gid: u32,
    },
}

/// Object of an object layer, in Tiled pixels.
#[derive(Debug, Clone)]
pub struct IrObject {
    /// Unique id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Tiled class (formerly type).
    pub class_name: String,
    /// Left edge.
    pub x: f32,
    /// Top edge, y down.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
    /// Clockwise degrees.
    pub rotation: f32,
    /// Hidden objects are kept but not drawn.
    pub visible: bool,
    /// Geometry.
    pub shape: IrObjectShape,
    /// Object custom properties.
    pub properties: Properties,
}
