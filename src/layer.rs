//! Layer tree: tile layers on top of a chunk store, object layers and groups.

use crate::config::DebugDrawOptions;
use crate::ir_map::{IrObject, IrObjectShape};
use crate::navigation::NavigationGraph;
use crate::properties::Properties;
use crate::spatial::chunk::ChunkStore;
use crate::spatial::index::{MapSize, TileCell, TileCoordinate, TileRect, TileSize};
use crate::spatial::transform::{pixel_offset_to_render, GridGeometry, RenderPoint, TileOffset};
use crate::tileset::TilesetRegistry;
use log::{debug, info};
use macroquad::math::{vec2, Rect, Vec2};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Layer id from the map description, unique per map.
pub type LayerId = u32;

/// Tile layer: a chunk store behind one writer lock plus layer state.
///
/// Reads (tile queries, graph building) share the lock; edits and chunk
/// allocation take it exclusively. Each layer locks independently.
#[derive(Debug)]
pub struct TileLayer {
    /// Unique id.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Hidden layers are skipped by view queries.
    pub visible: bool,
    /// Passed to host nodes.
    pub opacity: f32,
    /// Animation speed multiplier for every tile on this layer.
    pub speed: f64,
    /// Layer custom properties.
    pub properties: Properties,
    debug_draw_options: DebugDrawOptions,
    bounds: Option<TileRect>,
    chunks: RwLock<ChunkStore>,
    graph: RwLock<Option<Arc<NavigationGraph>>>,
}

impl TileLayer {
    /// Unbounded layer split into `extent`-sized chunks.
    pub fn infinite(id: LayerId, name: impl Into<String>, geometry: GridGeometry, extent: TileSize) -> Self {
        Self::with_store(id, name.into(), ChunkStore::new(geometry, extent), None)
    }

    /// Bounded layer stored as a single map-sized chunk.
    pub fn finite(id: LayerId, name: impl Into<String>, geometry: GridGeometry, size: MapSize) -> Self {
        Self::with_store(
            id,
            name.into(),
            ChunkStore::finite(geometry, size),
            Some(TileRect::from_size(0, 0, size.width, size.height)),
        )
    }

    fn with_store(id: LayerId, name: String, store: ChunkStore, bounds: Option<TileRect>) -> Self {
        TileLayer {
            id,
            name,
            visible: true,
            opacity: 1.0,
            speed: 1.0,
            properties: Properties::new(),
            debug_draw_options: DebugDrawOptions::empty(),
            bounds,
            chunks: RwLock::new(store),
            graph: RwLock::new(None),
        }
    }

    /// `true` when the layer has no fixed bounds.
    pub fn is_infinite(&self) -> bool {
        self.bounds.is_none()
    }

    /// Map area of a finite layer.
    pub fn bounds(&self) -> Option<TileRect> {
        self.bounds
    }

    /// Shared read access to the chunk store. Do not call other layer
    /// methods while holding the guard.
    pub fn chunks(&self) -> RwLockReadGuard<'_, ChunkStore> {
        self.chunks.read()
    }

    /// Geometry shared with the map.
    pub fn geometry(&self) -> GridGeometry {
        *self.chunks.read().geometry()
    }

    /// Finite layers: inside the map. Infinite layers: inside an allocated chunk.
    pub fn is_valid(&self, coord: TileCoordinate) -> bool {
        match self.bounds {
            Some(b) => b.contains(coord),
            None => self.chunks.read().chunk_for(coord).is_some(),
        }
    }

    /// Coordinate extent: the map for finite layers, the allocated chunks otherwise.
    pub fn tile_rect(&self) -> Option<TileRect> {
        self.bounds.or_else(|| self.chunks.read().allocated_bounds())
    }

    /// `None` for empty cells and anything outside the layer.
    pub fn tile_at(&self, coord: TileCoordinate) -> Option<TileCell> {
        self.chunks.read().get_tile(coord)
    }

    /// Writes a cell. Writes outside a finite layer are dropped.
    pub fn set_tile(&self, coord: TileCoordinate, cell: TileCell) -> Option<TileCell> {
        if let Some(b) = self.bounds {
            if !b.contains(coord) {
                debug!("layer '{}': ignoring write outside bounds at ({}, {})", self.name, coord.x, coord.y);
                return None;
            }
        }
        self.chunks.write().set_tile(coord, cell)
    }

    /// Clears a cell; returns what was there.
    pub fn remove_tile(&self, coord: TileCoordinate) -> Option<TileCell> {
        self.chunks.write().remove_tile(coord)
    }

    /// Non-empty cells.
    pub fn tile_count(&self) -> usize {
        let store = self.chunks.read();
        store.chunk_keys().filter_map(|k| store.chunk(k)).map(|c| c.occupied()).sum()
    }

    /// Render-space layer offset, parent groups included.
    pub fn offset(&self) -> RenderPoint {
        self.chunks.read().base_offset()
    }

    /// Moves the layer and every cached chunk offset with it.
    pub fn set_offset(&self, offset: RenderPoint) {
        self.chunks.write().set_base_offset(offset);
    }

    /// Overlay switches of this layer.
    pub fn debug_draw_options(&self) -> DebugDrawOptions {
        self.debug_draw_options
    }

    /// Replaces the overlay switches.
    pub fn set_debug_draw_options(&mut self, options: DebugDrawOptions) {
        self.debug_draw_options = options;
    }

    /// Render point inside `coord`, layer offset applied.
    pub fn coordinate_to_point(&self, coord: TileCoordinate, offset: TileOffset) -> RenderPoint {
        let store = self.chunks.read();
        store
            .geometry()
            .coordinate_to_point_with_offset(coord, store.base_offset(), offset)
    }

    /// Cell under a render point, layer offset removed.
    pub fn point_to_coordinate(&self, point: RenderPoint) -> TileCoordinate {
        let store = self.chunks.read();
        store.geometry().point_to_coordinate_with_offset(point, store.base_offset())
    }

    /// Cells whose tile data carries property `name`.
    pub fn tiles_with_property(&self, tilesets: &TilesetRegistry, name: &str) -> Vec<(TileCoordinate, TileCell)> {
        let mut hits: Vec<_> = self
            .chunks
            .read()
            .iter()
            .filter(|(_, cell)| {
                tilesets
                    .data_for_cell(*cell)
                    .is_some_and(|d| d.properties.contains(name))
            })
            .collect();
        hits.sort_unstable_by_key(|(c, _)| (c.y, c.x));
        hits
    }

    /// Render-space bounds of the layer's coordinate extent.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let rect = self.tile_rect()?;
        let store = self.chunks.read();
        render_bounds(store.geometry(), rect, store.base_offset())
    }

    /// Last published navigation graph.
    pub fn graph(&self) -> Option<Arc<NavigationGraph>> {
        self.graph.read().clone()
    }

    /// Swaps in a new graph. Readers holding the previous one keep it.
    pub fn publish_graph(&self, graph: NavigationGraph) -> Arc<NavigationGraph> {
        let graph = Arc::new(graph);
        info!("layer '{}': published graph with {} nodes", self.name, graph.node_count());
        *self.graph.write() = Some(Arc::clone(&graph));
        graph
    }

    /// Unpublishes the graph and returns it.
    pub fn clear_graph(&self) -> Option<Arc<NavigationGraph>> {
        self.graph.write().take()
    }
}

/// Union of the bounding boxes of the tiles on the perimeter of `rect`.
pub fn render_bounds(geometry: &GridGeometry, rect: TileRect, offset: RenderPoint) -> Option<Rect> {
    if rect.is_empty() {
        return None;
    }
    let (x0, x1, y0, y1) = (rect.min.x, rect.max.x - 1, rect.min.y, rect.max.y - 1);
    let mut perimeter: Vec<TileCoordinate> = Vec::new();
    for x in x0..=x1 {
        perimeter.push(TileCoordinate::new(x, y0));
        perimeter.push(TileCoordinate::new(x, y1));
    }
    for y in y0..=y1 {
        perimeter.push(TileCoordinate::new(x0, y));
        perimeter.push(TileCoordinate::new(x1, y));
    }
    // staggered rows/columns shift every other line, so include the inner ring too
    if rect.width() > 1 && rect.height() > 1 {
        perimeter.push(TileCoordinate::new(x0 + 1, y0 + 1));
        perimeter.push(TileCoordinate::new(x1 - 1, y1 - 1));
        perimeter.push(TileCoordinate::new(x0 + 1, y1 - 1));
        perimeter.push(TileCoordinate::new(x1 - 1, y0 + 1));
    }
    perimeter
        .into_iter()
        .map(|c| {
            let mut r = geometry.tile_bounds(c);
            r.x += offset.x;
            r.y += offset.y;
            r
        })
        .reduce(|a, b| a.combine_with(b))
}

/// Object geometry; polygon points are in render space once loaded.
pub type ObjectShape = IrObjectShape;

/// Object from an object layer, positioned in render space.
#[derive(Debug, Clone)]
pub struct MapObject {
    /// Object id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Tiled class.
    pub class_name: String,
    /// Top-left corner (bottom-left for tile objects, as in Tiled).
    pub position: RenderPoint,
    /// Width and height in pixels.
    pub size: Vec2,
    /// Clockwise degrees.
    pub rotation: f32,
    /// Visibility flag from the map.
    pub visible: bool,
    /// Geometry.
    pub shape: ObjectShape,
    /// Object custom properties.
    pub properties: Properties,
}

impl MapObject {
    /// Converts a Tiled-pixel object to render space.
    pub fn from_ir(obj: &IrObject, layer_offset: RenderPoint) -> Self {
        let shape = match &obj.shape {
            IrObjectShape::Polygon(pts) => {
                IrObjectShape::Polygon(pts.iter().map(|p| pixel_offset_to_render(p.x, p.y)).collect())
            }
            IrObjectShape::Polyline(pts) => {
                IrObjectShape::Polyline(pts.iter().map(|p| pixel_offset_to_render(p.x, p.y)).collect())
            }
            other => other.clone(),
        };
        MapObject {
            id: obj.id,
            name: obj.name.clone(),
            class_name: obj.class_name.clone(),
            position: pixel_offset_to_render(obj.x, obj.y) + layer_offset,
            size: vec2(obj.width, obj.height),
            rotation: obj.rotation,
            visible: obj.visible,
            shape,
            properties: obj.properties.clone(),
        }
    }

    /// Axis-aligned render-space bounds, ignoring rotation.
    pub fn bounds(&self) -> Rect {
        match &self.shape {
            IrObjectShape::Polygon(pts) | IrObjectShape::Polyline(pts) if !pts.is_empty() => {
                let (mut min, mut max) = (pts[0], pts[0]);
                for p in pts {
                    min = min.min(*p);
                    max = max.max(*p);
                }
                Rect::new(self.position.x + min.x, self.position.y + min.y, max.x - min.x, max.y - min.y)
            }
            IrObjectShape::Tile { .. } => Rect::new(self.position.x, self.position.y, self.size.x, self.size.y),
            _ => Rect::new(self.position.x, self.position.y - self.size.y, self.size.x, self.size.y),
        }
    }
}

/// Layer of free-placed objects.
#[derive(Debug, Clone)]
pub struct ObjectLayer {
    /// Unique id.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Visibility flag.
    pub visible: bool,
    /// Render-space offset, parent groups included.
    pub offset: RenderPoint,
    /// Layer custom properties.
    pub properties: Properties,
    /// Objects in draw order.
    pub objects: Vec<MapObject>,
}

impl ObjectLayer {
    /// First object called `name`.
    pub fn object_by_name(&self, name: &str) -> Option<&MapObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

/// Layer that only nests other layers.
#[derive(Debug)]
pub struct GroupLayer {
    /// Unique id.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// A hidden group hides its children.
    pub visible: bool,
    /// Render-space offset, already folded into the children.
    pub offset: RenderPoint,
    /// Group custom properties.
    pub properties: Properties,
    /// Children in draw order.
    pub layers: Vec<Layer>,
}

/// Any layer of the map tree.
#[derive(Debug)]
pub enum Layer {
    /// Tile layer.
    Tiles(TileLayer),
    /// Object layer.
    Objects(ObjectLayer),
    /// Group of layers.
    Group(GroupLayer),
}

impl Layer {
    /// Id of the wrapped layer.
    pub fn id(&self) -> LayerId {
        match self {
            Layer::Tiles(l) => l.id,
            Layer::Objects(l) => l.id,
            Layer::Group(l) => l.id,
        }
    }

    /// Name of the wrapped layer.
    pub fn name(&self) -> &str {
        match self {
            Layer::Tiles(l) => &l.name,
            Layer::Objects(l) => &l.name,
            Layer::Group(l) => &l.name,
        }
    }

    /// Own visibility flag; parents are not consulted.
    pub fn visible(&self) -> bool {
        match self {
            Layer::Tiles(l) => l.visible,
            Layer::Objects(l) => l.visible,
            Layer::Group(l) => l.visible,
        }
    }

    /// The tile layer, if this is one.
    pub fn as_tiles(&self) -> Option<&TileLayer> {
        match self {
            Layer::Tiles(l) => Some(l),
            _ => None,
        }
    }

    /// Depth-first walk including this layer.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a Layer>) {
        out.push(self);
        if let Layer::Group(g) = self {
            for child in &g.layers {
                child.walk(out);
            }
        }
    }

    /// Depth-first walk including this layer, with mutable access.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Layer)) {
        f(self);
        if let Layer::Group(g) = self {
            for child in &mut g.layers {
                child.walk_mut(f);
            }
        }
    }
}
