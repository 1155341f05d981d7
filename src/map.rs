//! The loaded map and its validation.

use crate::config::{DebugDrawOptions, EngineConfig};
use crate::error::MapError;
use crate::events::{MapEvent, Observer, ObserverId, Observers};
use crate::ir_map::{IrLayer, IrLayerKind, IrMap};
use crate::layer::{GroupLayer, Layer, LayerId, MapObject, ObjectLayer, TileLayer};
use crate::navigation::NavigationGraph;
use crate::properties::Properties;
use crate::spatial::index::{MapSize, TileCell, TileCoordinate, TileSize};
use crate::spatial::transform::{pixel_offset_to_render, GridGeometry, MapOrientation, RenderPoint};
use crate::tileset::{TilesetData, TilesetRegistry};
use log::{info, warn};
use macroquad::math::{Rect, Vec2};
use std::sync::Arc;

/// A loaded map: tilesets, the layer tree and the engine settings it was built with.
#[derive(Debug)]
pub struct Map {
    geometry: GridGeometry,
    size: MapSize,
    infinite: bool,
    /// Map custom properties.
    pub properties: Properties,
    config: EngineConfig,
    tilesets: TilesetRegistry,
    layers: Vec<Layer>,
    observers: Observers,
}

struct Builder<'a> {
    geometry: GridGeometry,
    config: &'a EngineConfig,
    tilesets: &'a TilesetRegistry,
    unresolved: usize,
}

impl Builder<'_> {
    fn layer(&mut self, ir: &IrLayer, parent_offset: RenderPoint) -> Result<Option<Layer>, MapError> {
        let offset = parent_offset + pixel_offset_to_render(ir.offset.x, ir.offset.y);
        let layer = match &ir.kind {
            IrLayerKind::Tiles { width, height, data } => {
                if *width == 0 || *height == 0 {
                    return Err(MapError::InvalidMap(format!(
                        "tile layer '{}' has zero size {}x{}",
                        ir.name, width, height
                    )));
                }
                let expected = width * height;
                if data.len() != expected {
                    return Err(MapError::InvalidLayerSize {
                        layer: ir.name.clone(),
                        expected,
                        actual: data.len(),
                    });
                }
                let size = TileSize::new(*width as u32, *height as u32);
                let mut layer = TileLayer::finite(ir.id, ir.name.as_str(), self.geometry, size);
                layer.set_offset(offset);
                for (idx, raw) in data.iter().enumerate() {
                    let coord = TileCoordinate::new((idx % width) as i32, (idx / width) as i32);
                    self.write(&layer, coord, TileCell(*raw));
                }
                self.finish_tile_layer(&mut layer, ir);
                Layer::Tiles(layer)
            }
            IrLayerKind::Chunks { chunks } => {
                let mut layer = TileLayer::infinite(ir.id, ir.name.as_str(), self.geometry, self.config.chunk_extent);
                layer.set_offset(offset);
                for chunk in chunks {
                    let expected = chunk.width as usize * chunk.height as usize;
                    if chunk.data.len() != expected {
                        return Err(MapError::InvalidLayerSize {
                            layer: ir.name.clone(),
                            expected,
                            actual: chunk.data.len(),
                        });
                    }
                    let w = chunk.width.max(1) as usize;
                    for (idx, raw) in chunk.data.iter().enumerate() {
                        let coord = TileCoordinate::new(chunk.x + (idx % w) as i32, chunk.y + (idx / w) as i32);
                        self.write(&layer, coord, TileCell(*raw));
                    }
                }
                self.finish_tile_layer(&mut layer, ir);
                Layer::Tiles(layer)
            }
            IrLayerKind::Objects { objects } => Layer::Objects(ObjectLayer {
                id: ir.id,
                name: ir.name.clone(),
                visible: ir.visible,
                offset,
                properties: ir.properties.clone(),
                objects: objects.iter().map(|o| MapObject::from_ir(o, offset)).collect(),
            }),
            IrLayerKind::Group { layers } => {
                let mut children = Vec::with_capacity(layers.len());
                for child in layers {
                    if let Some(l) = self.layer(child, offset)? {
                        children.push(l);
                    }
                }
                Layer::Group(GroupLayer {
                    id: ir.id,
                    name: ir.name.clone(),
                    visible: ir.visible,
                    offset,
                    properties: ir.properties.clone(),
                    layers: children,
                })
            }
            IrLayerKind::Unsupported => {
                warn!("skipping unsupported layer '{}'", ir.name);
                return Ok(None);
            }
        };
        Ok(Some(layer))
    }

    fn write(&mut self, layer: &TileLayer, coord: TileCoordinate, cell: TileCell) {
        if cell.is_empty() {
            return;
        }
        if self.tilesets.data_for_cell(cell).is_none() {
            self.unresolved += 1;
            warn!("layer '{}': gid {} at ({}, {}) has no tileset", layer.name, cell.gid(), coord.x, coord.y);
        }
        layer.set_tile(coord, cell);
    }

    fn finish_tile_layer(&self, layer: &mut TileLayer, ir: &IrLayer) {
        layer.visible = ir.visible;
        layer.opacity = ir.opacity;
        layer.properties = ir.properties.clone();
        layer.speed = ir.properties.get_f64("speed").unwrap_or(1.0);
        layer.set_debug_draw_options(self.config.debug_draw_options);
    }
}

impl Map {
    /// Builds the runtime model from a parsed map description.
    pub fn from_ir(ir: &IrMap, config: EngineConfig) -> Result<Self, MapError> {
        if ir.tile_w == 0 || ir.tile_h == 0 {
            return Err(MapError::InvalidMap(format!("tile size {}x{}", ir.tile_w, ir.tile_h)));
        }
        let config = config.sanitized();
        let geometry = GridGeometry::new(ir.orientation, TileSize::new(ir.tile_w, ir.tile_h));
        let tilesets = TilesetRegistry::from_ir(&ir.tilesets)?;

        let mut builder = Builder {
            geometry,
            config: &config,
            tilesets: &tilesets,
            unresolved: 0,
        };
        let mut layers = Vec::with_capacity(ir.layers.len());
        for l in &ir.layers {
            if let Some(layer) = builder.layer(l, Vec2::ZERO)? {
                layers.push(layer);
            }
        }
        let unresolved = builder.unresolved;

        let map = Map {
            geometry,
            size: MapSize::new(ir.width, ir.height),
            infinite: ir.infinite,
            properties: ir.properties.clone(),
            config,
            tilesets,
            layers,
            observers: Observers::new(),
        };
        info!(
            "built {:?} map {}x{} with {} tilesets, {} tile layers ({} unresolved cells)",
            ir.orientation,
            ir.width,
            ir.height,
            map.tilesets.tilesets().len(),
            map.tile_layers().len(),
            unresolved
        );
        Ok(map)
    }

    /// Grid layout.
    pub fn orientation(&self) -> MapOrientation {
        self.geometry.orientation
    }

    /// Orientation and tile size.
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Tile size in pixels.
    pub fn tile_size(&self) -> TileSize {
        self.geometry.tile_size
    }

    /// Size in tiles; meaningless for infinite maps.
    pub fn size(&self) -> MapSize {
        self.size
    }

    /// `true` when tile layers are unbounded.
    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    /// Settings the map was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gid lookup for every tileset.
    pub fn tilesets(&self) -> &TilesetRegistry {
        &self.tilesets
    }

    /// Top-level layers in draw order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Every layer, groups flattened depth-first.
    pub fn all_layers(&self) -> Vec<&Layer> {
        let mut out = Vec::new();
        for l in &self.layers {
            l.walk(&mut out);
        }
        out
    }

    /// Tile layers in draw order, groups flattened.
    pub fn tile_layers(&self) -> Vec<&TileLayer> {
        self.all_layers().into_iter().filter_map(Layer::as_tiles).collect()
    }

    /// Object layers in draw order, groups flattened.
    pub fn object_layers(&self) -> Vec<&ObjectLayer> {
        self.all_layers()
            .into_iter()
            .filter_map(|l| match l {
                Layer::Objects(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    /// Any layer by id, nested ones included.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.all_layers().into_iter().find(|l| l.id() == id)
    }

    /// First layer called `name`, depth-first.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.all_layers().into_iter().find(|l| l.name() == name)
    }

    /// Tile layer by id.
    pub fn tile_layer(&self, id: LayerId) -> Option<&TileLayer> {
        self.layer(id).and_then(Layer::as_tiles)
    }

    /// Mutable tile layer by id.
    pub fn tile_layer_mut(&mut self, id: LayerId) -> Option<&mut TileLayer> {
        self.layers.iter_mut().find_map(|l| find_tiles_mut(l, id))
    }

    /// Map bounds for finite maps; for infinite maps, any allocated chunk.
    pub fn is_valid(&self, coord: TileCoordinate) -> bool {
        if self.infinite {
            self.tile_layers().iter().any(|l| l.is_valid(coord))
        } else {
            coord.x >= 0 && coord.y >= 0 && (coord.x as u32) < self.size.width && (coord.y as u32) < self.size.height
        }
    }

    /// Cell at `coord` on `layer`.
    pub fn tile_at(&self, layer: LayerId, coord: TileCoordinate) -> Option<TileCell> {
        self.tile_layer(layer)?.tile_at(coord)
    }

    /// Non-empty cells at `coord`, bottom layer first.
    pub fn tiles_at(&self, coord: TileCoordinate) -> Vec<(LayerId, TileCell)> {
        self.tile_layers()
            .into_iter()
            .filter_map(|l| l.tile_at(coord).map(|c| (l.id, c)))
            .collect()
    }

    /// Tileset data of the tile at `coord` on `layer`.
    pub fn tile_data_at(&self, layer: LayerId, coord: TileCoordinate) -> Option<&Arc<TilesetData>> {
        let cell = self.tile_at(layer, coord)?;
        self.tilesets.data_for_cell(cell)
    }

    /// Every cell whose tile data carries property `name`, per layer in draw order.
    pub fn tiles_with_property(&self, name: &str) -> Vec<(LayerId, TileCoordinate, TileCell)> {
        self.tile_layers()
            .into_iter()
            .flat_map(|l| {
                l.tiles_with_property(&self.tilesets, name)
                    .into_iter()
                    .map(move |(c, cell)| (l.id, c, cell))
            })
            .collect()
    }

    /// Every object of every object layer.
    pub fn objects(&self) -> impl Iterator<Item = &MapObject> + '_ {
        self.object_layers().into_iter().flat_map(|l| l.objects.iter())
    }

    /// Render-space rect covering every tile layer.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.tile_layers()
            .into_iter()
            .filter_map(TileLayer::bounding_rect)
            .reduce(|a, b| a.combine_with(b))
    }

    /// Edits one cell and notifies observers when it changed.
    pub fn set_tile(&self, layer: LayerId, coord: TileCoordinate, cell: TileCell) -> Option<TileCell> {
        let tl = self.tile_layer(layer)?;
        if !cell.is_empty() && self.tilesets.data_for_cell(cell).is_none() {
            warn!("layer '{}': gid {} has no tileset", tl.name, cell.gid());
        }
        let before = tl.tile_at(coord);
        let previous = tl.set_tile(coord, cell);
        let current = tl.tile_at(coord);
        if before != current {
            self.observers.emit(&MapEvent::TileChanged {
                layer,
                coord,
                previous,
                current,
            });
        }
        previous
    }

    /// Clears one cell; see [`Self::set_tile`].
    pub fn remove_tile(&self, layer: LayerId, coord: TileCoordinate) -> Option<TileCell> {
        self.set_tile(layer, coord, TileCell::EMPTY)
    }

    /// Moves a tile layer. `false` if there is no such tile layer.
    pub fn set_layer_offset(&self, layer: LayerId, offset: RenderPoint) -> bool {
        let Some(tl) = self.tile_layer(layer) else {
            return false;
        };
        tl.set_offset(offset);
        self.observers.emit(&MapEvent::LayerOffsetChanged { layer, offset });
        true
    }

    /// Sets debug flags on one tile layer, or on all of them with `None`.
    pub fn set_debug_draw_options(&mut self, layer: Option<LayerId>, options: DebugDrawOptions) {
        match layer {
            Some(id) => {
                if let Some(tl) = self.tile_layer_mut(id) {
                    tl.set_debug_draw_options(options);
                }
            }
            None => {
                self.config.debug_draw_options = options;
                for l in &mut self.layers {
                    l.walk_mut(&mut |l| {
                        if let Layer::Tiles(t) = l {
                            t.set_debug_draw_options(options);
                        }
                    });
                }
            }
        }
        self.observers.emit(&MapEvent::DebugOptionsChanged { layer, options });
    }

    /// Publishes `graph` on a tile layer and tells observers.
    pub fn publish_graph(&self, layer: LayerId, graph: NavigationGraph) -> Option<Arc<NavigationGraph>> {
        let published = self.tile_layer(layer)?.publish_graph(graph);
        self.observers.emit(&MapEvent::GraphPublished {
            layer,
            nodes: published.node_count(),
        });
        Some(published)
    }

    /// Registers a callback for every [`MapEvent`].
    pub fn observe(&mut self, observer: Observer) -> ObserverId {
        self.observers.register(observer)
    }

    /// Removes an observer. `false` if it was already gone.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Pushes an event raised outside the map (e.g. by the scheduler).
    pub fn notify(&self, event: &MapEvent) {
        self.observers.emit(event);
    }
}

fn find_tiles_mut(layer: &mut Layer, id: LayerId) -> Option<&mut TileLayer> {
    match layer {
        Layer::Tiles(t) if t.id == id => Some(t),
        Layer::Group(g) => g.layers.iter_mut().find_map(|l| find_tiles_mut(l, id)),
        _ => None,
    }
}
