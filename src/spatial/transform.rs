//! Orientation-aware conversion between map coordinates and render points.
//!
//! Map space follows Tiled: origin top-left, rows grow downward. Render space
//! is y-up, so every conversion goes through [`to_render`] / [`from_render`],
//! which are the only places the y axis is flipped.
//!
//! All functions here are pure and safe to call from any thread.

use crate::spatial::index::{TileCoordinate, TileSize};
use macroquad::math::{vec2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A point in render (scene) space.
pub type RenderPoint = Vec2;

/// Axis along which every other row or column is shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaggerAxis {
    /// Columns are shifted.
    X,
    /// Rows are shifted.
    Y,
}

/// Which rows or columns are shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaggerIndex {
    /// Odd ones.
    Odd,
    /// Even ones.
    Even,
}

/// Grid layout of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum MapOrientation {
    /// Square grid.
    Orthogonal,
    /// Diamond grid.
    Isometric,
    /// Hexagons with every other row or column shifted.
    Hexagonal {
        /// Shifted axis.
        stagger_axis: StaggerAxis,
        /// Shifted half.
        stagger_index: StaggerIndex,
        /// Length of the flat hexagon side, in pixels (`hexsidelength`).
        side_length: u32,
    },
    /// Staggered isometric: diamonds packed in shifted rows or columns.
    Staggered {
        /// Shifted axis.
        stagger_axis: StaggerAxis,
        /// Shifted half.
        stagger_index: StaggerIndex,
    },
}

/// Named positions inside a tile's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// Top-left corner.
    TopLeft,
    /// Middle of the top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Middle of the left edge.
    Left,
    /// Box centre.
    #[default]
    Center,
    /// Middle of the right edge.
    Right,
    /// Bottom-left corner.
    BottomLeft,
    /// Middle of the bottom edge.
    Bottom,
    /// Bottom-right corner.
    BottomRight,
}

impl Anchor {
    /// Every anchor, row by row from the top-left.
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::Top,
        Anchor::TopRight,
        Anchor::Left,
        Anchor::Center,
        Anchor::Right,
        Anchor::BottomLeft,
        Anchor::Bottom,
        Anchor::BottomRight,
    ];

    /// Fraction of the bounding box, measured right and down from the top-left.
    fn fraction(self) -> (f64, f64) {
        match self {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::Top => (0.5, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::Left => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::Right => (1.0, 0.5),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::Bottom => (0.5, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
        }
    }
}

/// Where inside a tile the offset-aware conversions should land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileOffset {
    /// Render-space pixels added to the tile origin.
    Pixels {
        /// Rightward shift.
        dx: f32,
        /// Upward shift.
        dy: f32,
    },
    /// A named point of the tile bounding box.
    Anchor(Anchor),
}

impl Default for TileOffset {
    fn default() -> Self {
        TileOffset::Anchor(Anchor::Center)
    }
}

#[inline]
fn to_render(px: f64, py: f64) -> RenderPoint {
    vec2(px as f32, -py as f32)
}

#[inline]
fn from_render(p: RenderPoint) -> (f64, f64) {
    (p.x as f64, -(p.y as f64))
}

/// Converts a Tiled pixel offset (y down) into a render-space offset.
#[inline]
pub fn pixel_offset_to_render(dx: f32, dy: f32) -> RenderPoint {
    to_render(dx as f64, dy as f64)
}

/// Orientation plus tile size: everything the transforms need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridGeometry {
    /// Grid layout.
    pub orientation: MapOrientation,
    /// Tile size in pixels.
    pub tile_size: TileSize,
}

// Tiled's hexagonal render parameters, in integer pixels.
struct Stagger {
    stagger_x: bool,
    stagger_even: bool,
    tile_w: i64,
    tile_h: i64,
    side_x: i64,
    side_y: i64,
    side_offset_x: i64,
    side_offset_y: i64,
    column_width: i64,
    row_height: i64,
}

impl Stagger {
    fn new(tile_size: TileSize, axis: StaggerAxis, index: StaggerIndex, side_length: u32) -> Self {
        let tile_w = (tile_size.width & !1).max(2) as i64;
        let tile_h = (tile_size.height & !1).max(2) as i64;
        let stagger_x = axis == StaggerAxis::X;
        let side = side_length as i64;
        let side_x = if stagger_x { side.min(tile_w) } else { 0 };
        let side_y = if stagger_x { 0 } else { side.min(tile_h) };
        let side_offset_x = (tile_w - side_x) / 2;
        let side_offset_y = (tile_h - side_y) / 2;
        Stagger {
            stagger_x,
            stagger_even: index == StaggerIndex::Even,
            tile_w,
            tile_h,
            side_x,
            side_y,
            side_offset_x,
            side_offset_y,
            column_width: (side_offset_x + side_x).max(1),
            row_height: (side_offset_y + side_y).max(1),
        }
    }

    #[inline]
    fn is_shifted(&self, i: i32) -> bool {
        (i.rem_euclid(2) == 1) != self.stagger_even
    }

    fn top_left(&self, c: TileCoordinate) -> (i64, i64) {
        if self.stagger_x {
            let mut py = c.y as i64 * (self.tile_h + self.side_y);
            if self.is_shifted(c.x) {
                py += self.row_height;
            }
            (c.x as i64 * self.column_width, py)
        } else {
            let mut px = c.x as i64 * (self.tile_w + self.side_x);
            if self.is_shifted(c.y) {
                px += self.column_width;
            }
            (px, c.y as i64 * self.row_height)
        }
    }

    fn center(&self, c: TileCoordinate) -> (f64, f64) {
        let (x0, y0) = self.top_left(c);
        (
            x0 as f64 + self.tile_w as f64 / 2.0,
            y0 as f64 + self.tile_h as f64 / 2.0,
        )
    }

    fn cell_polygon(&self, c: TileCoordinate) -> [(f64, f64); 6] {
        let (x0, y0) = self.top_left(c);
        let (x0, y0) = (x0 as f64, y0 as f64);
        let (w, h) = (self.tile_w as f64, self.tile_h as f64);
        if self.stagger_x {
            let sox = self.side_offset_x as f64;
            let sx = self.side_x as f64;
            [
                (x0 + sox, y0),
                (x0 + sox + sx, y0),
                (x0 + w, y0 + h / 2.0),
                (x0 + sox + sx, y0 + h),
                (x0 + sox, y0 + h),
                (x0, y0 + h / 2.0),
            ]
        } else {
            let soy = self.side_offset_y as f64;
            let sy = self.side_y as f64;
            [
                (x0 + w / 2.0, y0),
                (x0 + w, y0 + soy),
                (x0 + w, y0 + soy + sy),
                (x0 + w / 2.0, y0 + h),
                (x0, y0 + soy + sy),
                (x0, y0 + soy),
            ]
        }
    }

    /// Coarse guess of the cell under the point plus its neighbours.
    fn candidates(&self, px: f64, py: f64) -> impl Iterator<Item = TileCoordinate> + '_ {
        let major = if self.stagger_x {
            (px / self.column_width as f64).floor() as i32
        } else {
            (py / self.row_height as f64).floor() as i32
        };
        (major - 1..=major + 1).flat_map(move |m| {
            let minor = if self.stagger_x {
                let shift = if self.is_shifted(m) { self.row_height } else { 0 };
                ((py - shift as f64) / (self.tile_h + self.side_y) as f64).floor() as i32
            } else {
                let shift = if self.is_shifted(m) { self.column_width } else { 0 };
                ((px - shift as f64) / (self.tile_w + self.side_x) as f64).floor() as i32
            };
            (minor - 1..=minor + 1).map(move |n| {
                if self.stagger_x {
                    TileCoordinate::new(m, n)
                } else {
                    TileCoordinate::new(n, m)
                }
            })
        })
    }

    fn locate(&self, px: f64, py: f64) -> TileCoordinate {
        let mut best: Option<(bool, f64, TileCoordinate)> = None;
        for c in self.candidates(px, py) {
            let inside = point_in_convex(&self.cell_polygon(c), (px, py));
            let (cx, cy) = self.center(c);
            let dist = (cx - px).powi(2) + (cy - py).powi(2);
            let better = match best {
                None => true,
                Some((b_inside, b_dist, _)) => (inside && !b_inside) || (inside == b_inside && dist < b_dist),
            };
            if better {
                best = Some((inside, dist, c));
            }
        }
        best.map(|(_, _, c)| c).unwrap_or_default()
    }
}

fn point_in_convex(poly: &[(f64, f64)], p: (f64, f64)) -> bool {
    const EPS: f64 = 1e-9;
    let mut pos = false;
    let mut neg = false;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
        if cross > EPS {
            pos = true;
        } else if cross < -EPS {
            neg = true;
        }
        if pos && neg {
            return false;
        }
    }
    true
}

impl GridGeometry {
    /// Geometry for `orientation` with `tile_size` pixel tiles.
    pub fn new(orientation: MapOrientation, tile_size: TileSize) -> Self {
        debug_assert!(tile_size.width > 0 && tile_size.height > 0, "zero tile size");
        GridGeometry { orientation, tile_size }
    }

    fn stagger(&self) -> Option<Stagger> {
        match self.orientation {
            MapOrientation::Hexagonal { stagger_axis, stagger_index, side_length } => {
                Some(Stagger::new(self.tile_size, stagger_axis, stagger_index, side_length))
            }
            MapOrientation::Staggered { stagger_axis, stagger_index } => {
                Some(Stagger::new(self.tile_size, stagger_axis, stagger_index, 0))
            }
            _ => None,
        }
    }

    // Origin and bounding-box top-left of a tile, in map-down pixels.
    fn origin_pixels(&self, c: TileCoordinate) -> ((f64, f64), (f64, f64)) {
        let w = self.tile_size.width as f64;
        let h = self.tile_size.height as f64;
        match self.orientation {
            MapOrientation::Orthogonal => {
                let o = (c.x as f64 * w, c.y as f64 * h);
                (o, o)
            }
            MapOrientation::Isometric => {
                let o = ((c.x - c.y) as f64 * w / 2.0, (c.x + c.y) as f64 * h / 2.0);
                (o, (o.0 - w / 2.0, o.1))
            }
            MapOrientation::Hexagonal { .. } | MapOrientation::Staggered { .. } => match self.stagger() {
                Some(s) => {
                    let (x0, y0) = s.top_left(c);
                    (s.center(c), (x0 as f64, y0 as f64))
                }
                None => ((0.0, 0.0), (0.0, 0.0)),
            },
        }
    }

    fn bbox_size(&self) -> (f64, f64) {
        match self.stagger() {
            Some(s) => (s.tile_w as f64, s.tile_h as f64),
            None => (self.tile_size.width as f64, self.tile_size.height as f64),
        }
    }

    /// Render point of the tile origin: the top-left corner for orthogonal
    /// maps, the top vertex of the diamond for isometric maps and the cell
    /// centre for hexagonal and staggered maps.
    pub fn coordinate_to_point(&self, c: TileCoordinate) -> RenderPoint {
        let ((px, py), _) = self.origin_pixels(c);
        to_render(px, py)
    }

    /// The tile whose cell contains `p`. Never fails: any point maps to some
    /// coordinate, whether or not the map has a tile there.
    pub fn point_to_coordinate(&self, p: RenderPoint) -> TileCoordinate {
        let (px, py) = from_render(p);
        let w = self.tile_size.width as f64;
        let h = self.tile_size.height as f64;
        match self.orientation {
            MapOrientation::Orthogonal => {
                TileCoordinate::new((px / w).floor() as i32, (py / h).floor() as i32)
            }
            MapOrientation::Isometric => {
                let u = py / h;
                let v = px / w;
                TileCoordinate::new((u + v).floor() as i32, (u - v).floor() as i32)
            }
            MapOrientation::Hexagonal { .. } | MapOrientation::Staggered { .. } => match self.stagger() {
                Some(s) => s.locate(px, py),
                None => TileCoordinate::default(),
            },
        }
    }

    /// Tile bounding box in render space (`y` is the bottom edge).
    pub fn tile_bounds(&self, c: TileCoordinate) -> Rect {
        let (_, (x0, y0)) = self.origin_pixels(c);
        let (w, h) = self.bbox_size();
        let bottom_left = to_render(x0, y0 + h);
        Rect::new(bottom_left.x, bottom_left.y, w as f32, h as f32)
    }

    /// Render point inside tile `c` picked by `offset`, shifted by the layer offset.
    pub fn coordinate_to_point_with_offset(
        &self,
        c: TileCoordinate,
        layer_offset: RenderPoint,
        offset: TileOffset,
    ) -> RenderPoint {
        let (origin, top_left) = self.origin_pixels(c);
        let local = match offset {
            TileOffset::Pixels { dx, dy } => to_render(origin.0, origin.1) + vec2(dx, dy),
            TileOffset::Anchor(anchor) => {
                let (fx, fy) = anchor.fraction();
                let (w, h) = self.bbox_size();
                to_render(top_left.0 + fx * w, top_left.1 + fy * h)
            }
        };
        local + layer_offset
    }

    /// Inverse of [`Self::coordinate_to_point_with_offset`] for any point in the tile.
    pub fn point_to_coordinate_with_offset(&self, p: RenderPoint, layer_offset: RenderPoint) -> TileCoordinate {
        self.point_to_coordinate(p - layer_offset)
    }
}

/// See [`GridGeometry::coordinate_to_point`].
pub fn coordinate_to_point(coord: TileCoordinate, orientation: MapOrientation, tile_size: TileSize) -> RenderPoint {
    GridGeometry::new(orientation, tile_size).coordinate_to_point(coord)
}

/// See [`GridGeometry::point_to_coordinate`].
pub fn point_to_coordinate(point: RenderPoint, orientation: MapOrientation, tile_size: TileSize) -> TileCoordinate {
    GridGeometry::new(orientation, tile_size).point_to_coordinate(point)
}

/// Offset-aware forward conversion for a layer with its own geometry.
pub fn coordinate_to_point_with_offset(
    coord: TileCoordinate,
    geometry: &GridGeometry,
    layer_offset: RenderPoint,
    offset: TileOffset,
) -> RenderPoint {
    geometry.coordinate_to_point_with_offset(coord, layer_offset, offset)
}

/// Removes the layer offset, then converts back to a coordinate.
pub fn point_to_coordinate_with_offset(
    point: RenderPoint,
    geometry: &GridGeometry,
    layer_offset: RenderPoint,
) -> TileCoordinate {
    geometry.point_to_coordinate_with_offset(point, layer_offset)
}
