//! Render-space culling: which tiles and chunks a view rect touches.

use crate::layer::{LayerId, TileLayer};
use crate::map::Map;
use crate::spatial::index::{TileCell, TileCoordinate, TileRect};
use crate::tileset::TilesetData;
use macroquad::prelude::*;
use std::sync::Arc;

/// Extra tiles kept around the view so partially visible tiles are never dropped.
const CULL_MARGIN_TILES: i32 = 2;

/// Tile range of `layer` covering the render-space `view`.
///
/// The corners are inverse-transformed; column and row are monotonic in
/// render position for every orientation, so their extremes bound the view.
pub fn visible_tile_rect(layer: &TileLayer, view: Rect) -> Option<TileRect> {
    let corners = [
        vec2(view.x, view.y),
        vec2(view.x + view.w, view.y),
        vec2(view.x, view.y + view.h),
        vec2(view.x + view.w, view.y + view.h),
    ];
    let mut min = TileCoordinate::new(i32::MAX, i32::MAX);
    let mut max = TileCoordinate::new(i32::MIN, i32::MIN);
    for p in corners {
        let c = layer.point_to_coordinate(p);
        min = TileCoordinate::new(min.x.min(c.x), min.y.min(c.y));
        max = TileCoordinate::new(max.x.max(c.x), max.y.max(c.y));
    }

    let rect = TileRect::new(min, max.offset(1, 1)).expand(CULL_MARGIN_TILES);
    let rect = match layer.bounds() {
        Some(b) => rect.intersect(&b),
        None => rect,
    };
    (!rect.is_empty()).then_some(rect)
}

/// Non-empty cells of `layer` inside `view`, ordered by chunk then cell.
pub fn visible_tiles(layer: &TileLayer, view: Rect) -> Vec<(TileCoordinate, TileCell)> {
    let Some(rect) = visible_tile_rect(layer, view) else {
        return Vec::new();
    };
    layer.chunks().tiles_in(rect).collect()
}

/// Animated cells across every visible tile layer inside `view`.
pub fn animated_tiles_in_view(map: &Map, view: Rect) -> Vec<(LayerId, TileCoordinate, Arc<TilesetData>)> {
    let mut out = Vec::new();
    for layer in map.tile_layers() {
        if !layer.visible {
            continue;
        }
        for (coord, cell) in visible_tiles(layer, view) {
            if let Some(data) = map.tilesets().data_for_cell(cell) {
                if data.is_animated() {
                    out.push((layer.id, coord, Arc::clone(data)));
                }
            }
        }
    }
    out
}
