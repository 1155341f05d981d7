//! Tile cells, coordinates, rects and chunk index math.

use serde::{Deserialize, Serialize};

/// Side length of infinite-layer chunks when nothing else is configured.
pub const DEFAULT_CHUNK_EXTENT: u32 = 16;

/// Horizontal flip bit of a raw Tiled gid.
pub const FLIP_H: u32 = 0x8000_0000; // bit 31
/// Vertical flip bit.
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
/// Anti-diagonal flip bit.
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
/// 120° rotation bit.
pub const ROTATE_HEX_120: u32 = 0x1000_0000; // bit 28, hexagonal maps only
/// Bits left for the id once the flags are masked off.
pub const GID_MASK: u32 = 0x0FFF_FFFF;

/// One grid slot: a Tiled global id plus its flip/rotation bits.
///
/// Global id 0 is the empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileCell(pub u32);

impl TileCell {
    /// The empty cell.
    pub const EMPTY: TileCell = TileCell(0);

    /// Cell without flags. Flag bits in `gid` are dropped.
    #[inline]
    pub fn new(gid: u32) -> Self {
        TileCell(gid & GID_MASK)
    }

    /// Gid with flags, as stored in Tiled data.
    #[inline] pub fn raw(self) -> u32 { self.0 }
    /// Global id without flags.
    #[inline] pub fn gid(self) -> u32 { self.0 & GID_MASK }
    /// Mirrored left to right.
    #[inline] pub fn flip_h(self) -> bool { (self.0 & FLIP_H) != 0 }
    /// Mirrored top to bottom.
    #[inline] pub fn flip_v(self) -> bool { (self.0 & FLIP_V) != 0 }
    /// Mirrored across the anti-diagonal.
    #[inline] pub fn flip_d(self) -> bool { (self.0 & FLIP_D) != 0 }
    /// Rotated by 120°, hexagonal maps only.
    #[inline] pub fn rotated_hex_120(self) -> bool { (self.0 & ROTATE_HEX_120) != 0 }
    /// `true` for gid 0.
    #[inline] pub fn is_empty(self) -> bool { self.gid() == 0 }

    /// Keeps the flag bits and swaps the id, used when an animation frame
    /// replaces the displayed tile.
    #[inline]
    pub fn with_gid(self, gid: u32) -> Self {
        TileCell((self.0 & !GID_MASK) | (gid & GID_MASK))
    }

    /// Same id with the three flip bits replaced.
    #[inline]
    pub fn with_flags(self, flip_h: bool, flip_v: bool, flip_d: bool) -> Self {
        let mut raw = self.gid();
        if flip_h {
            raw |= FLIP_H;
        }
        if flip_v {
            raw |= FLIP_V;
        }
        if flip_d {
            raw |= FLIP_D;
        }
        TileCell(raw | (self.0 & ROTATE_HEX_120))
    }
}

/// Map-space coordinate. `x` is the column, `y` the row; rows grow downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TileCoordinate {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoordinate {
    /// Coordinate at column `x`, row `y`.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        TileCoordinate { x, y }
    }

    /// Neighbour `dx` columns and `dy` rows away.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        TileCoordinate::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for TileCoordinate {
    fn from((x, y): (i32, i32)) -> Self {
        TileCoordinate::new(x, y)
    }
}

/// Width and height, in pixels for tiles and in tiles for maps and chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSize {
    /// Horizontal extent.
    pub width: u32,
    /// Vertical extent.
    pub height: u32,
}

impl TileSize {
    /// Size of `width` by `height`.
    pub const fn new(width: u32, height: u32) -> Self {
        TileSize { width, height }
    }
}

/// Map dimensions in tiles.
pub type MapSize = TileSize;

/// Inclusive-exclusive rectangle of tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    /// Inclusive.
    pub min: TileCoordinate,
    /// Exclusive.
    pub max: TileCoordinate,
}

impl TileRect {
    /// Rect from its inclusive and exclusive corners.
    pub fn new(min: TileCoordinate, max: TileCoordinate) -> Self {
        TileRect { min, max }
    }

    /// Rect starting at `(x, y)` spanning `width` columns and `height` rows.
    pub fn from_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        TileRect {
            min: TileCoordinate::new(x, y),
            max: TileCoordinate::new(x + width as i32, y + height as i32),
        }
    }

    /// `true` when `c` lies inside.
    #[inline]
    pub fn contains(&self, c: TileCoordinate) -> bool {
        c.x >= self.min.x && c.x < self.max.x && c.y >= self.min.y && c.y < self.max.y
    }

    /// `true` when it holds no coordinate.
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// Columns covered; 0 for inverted rects.
    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x).max(0) as u32
    }

    /// Rows covered.
    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y).max(0) as u32
    }

    /// Smallest rect covering both.
    pub fn union(&self, other: &TileRect) -> TileRect {
        TileRect {
            min: TileCoordinate::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: TileCoordinate::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Overlap of both rects; may be empty.
    pub fn intersect(&self, other: &TileRect) -> TileRect {
        TileRect {
            min: TileCoordinate::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: TileCoordinate::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        }
    }

    /// Grows every side by `by` tiles.
    pub fn expand(&self, by: i32) -> TileRect {
        TileRect {
            min: self.min.offset(-by, -by),
            max: self.max.offset(by, by),
        }
    }

    /// Row-major iteration over every coordinate.
    pub fn coords(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        let (x0, x1) = (self.min.x, self.max.x);
        (self.min.y..self.max.y).flat_map(move |y| (x0..x1).map(move |x| TileCoordinate::new(x, y)))
    }
}

/// Chunk grid position: tile coordinate divided by the chunk extent, rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Chunk column.
    pub x: i32,
    /// Chunk row.
    pub y: i32,
}

impl ChunkCoord {
    /// Key of the chunk at `(x, y)`.
    pub const fn new(x: i32, y: i32) -> Self {
        ChunkCoord { x, y }
    }
}

/// Chunk holding `c`. Negative coordinates round toward negative infinity.
#[inline]
pub fn coord_to_chunk(c: TileCoordinate, extent: TileSize) -> ChunkCoord {
    ChunkCoord {
        x: c.x.div_euclid(extent.width as i32),
        y: c.y.div_euclid(extent.height as i32),
    }
}

/// Row-major cell index of `c` inside its chunk.
#[inline]
pub fn local_index(c: TileCoordinate, extent: TileSize) -> usize {
    let lx = c.x.rem_euclid(extent.width as i32) as usize;
    let ly = c.y.rem_euclid(extent.height as i32) as usize;
    ly * extent.width as usize + lx
}

/// Top-left tile of chunk `cc`.
#[inline]
pub fn chunk_origin(cc: ChunkCoord, extent: TileSize) -> TileCoordinate {
    TileCoordinate::new(cc.x * extent.width as i32, cc.y * extent.height as i32)
}
