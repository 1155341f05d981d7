//! Sparse chunked tile storage.

use crate::spatial::index::{
    chunk_origin, coord_to_chunk, local_index, ChunkCoord, MapSize, TileCell, TileCoordinate, TileRect, TileSize,
};
use crate::spatial::transform::{GridGeometry, RenderPoint};
use ahash::AHashMap;
use log::debug;
use macroquad::math::Vec2;

/// Dense block of cells. Only exists while at least one cell is non-empty.
#[derive(Debug, Clone)]
pub struct Chunk {
    key: ChunkCoord,
    origin: TileCoordinate,
    render_offset: RenderPoint,
    cells: Box<[TileCell]>,
    occupied: usize,
}

impl Chunk {
    fn new(key: ChunkCoord, extent: TileSize) -> Self {
        let len = extent.width as usize * extent.height as usize;
        Chunk {
            key,
            origin: chunk_origin(key, extent),
            render_offset: Vec2::ZERO,
            cells: vec![TileCell::EMPTY; len].into_boxed_slice(),
            occupied: 0,
        }
    }

    /// Position in the chunk grid.
    pub fn key(&self) -> ChunkCoord {
        self.key
    }

    /// Coordinate of the chunk's first cell.
    pub fn origin(&self) -> TileCoordinate {
        self.origin
    }

    /// Render point of the chunk origin, layer offset included.
    pub fn render_offset(&self) -> RenderPoint {
        self.render_offset
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Row-major cells, empty ones included.
    pub fn cells(&self) -> &[TileCell] {
        &self.cells
    }

    /// Non-empty cells with their global coordinates.
    pub fn iter(&self, extent: TileSize) -> impl Iterator<Item = (TileCoordinate, TileCell)> + '_ {
        let w = extent.width as usize;
        let origin = self.origin;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .map(move |(i, c)| (origin.offset((i % w) as i32, (i / w) as i32), *c))
    }
}

/// Sparse tile storage for one layer.
///
/// Coordinates are split into a chunk key and a local index; chunks are
/// allocated on the first non-empty write and dropped when their last cell
/// is cleared. A finite layer is one chunk covering the whole map.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    geometry: GridGeometry,
    extent: TileSize,
    base_offset: RenderPoint,
    chunks: AHashMap<ChunkCoord, Chunk>,
}

impl ChunkStore {
    /// Empty store with `extent`-sized chunks.
    pub fn new(geometry: GridGeometry, extent: TileSize) -> Self {
        debug_assert!(extent.width > 0 && extent.height > 0, "zero-sized chunk extent");
        ChunkStore {
            geometry,
            extent,
            base_offset: Vec2::ZERO,
            chunks: AHashMap::new(),
        }
    }

    /// One chunk sized to the whole map.
    pub fn finite(geometry: GridGeometry, map_size: MapSize) -> Self {
        Self::new(geometry, map_size)
    }

    /// Chunk size in tiles.
    pub fn extent(&self) -> TileSize {
        self.extent
    }

    /// Geometry used for the cached render offsets.
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Layer offset folded into every chunk render offset.
    pub fn base_offset(&self) -> RenderPoint {
        self.base_offset
    }

    /// Moves the layer; every cached chunk offset is recomputed.
    pub fn set_base_offset(&mut self, offset: RenderPoint) {
        if offset == self.base_offset {
            return;
        }
        self.base_offset = offset;
        for chunk in self.chunks.values_mut() {
            chunk.render_offset = self.geometry.coordinate_to_point(chunk.origin) + offset;
        }
    }

    /// `None` for empty cells and unallocated chunks.
    pub fn get_tile(&self, coord: TileCoordinate) -> Option<TileCell> {
        let chunk = self.chunks.get(&coord_to_chunk(coord, self.extent))?;
        let cell = chunk.cells[local_index(coord, self.extent)];
        (!cell.is_empty()).then_some(cell)
    }

    /// Writes `cell` and returns what was there before.
    pub fn set_tile(&mut self, coord: TileCoordinate, cell: TileCell) -> Option<TileCell> {
        let key = coord_to_chunk(coord, self.extent);
        let idx = local_index(coord, self.extent);

        if cell.is_empty() {
            let chunk = self.chunks.get_mut(&key)?;
            let prev = std::mem::replace(&mut chunk.cells[idx], TileCell::EMPTY);
            if prev.is_empty() {
                return None;
            }
            chunk.occupied -= 1;
            if chunk.occupied == 0 {
                self.chunks.remove(&key);
                debug!("released chunk ({}, {})", key.x, key.y);
            }
            return Some(prev);
        }

        let (geometry, extent, base) = (self.geometry, self.extent, self.base_offset);
        let chunk = self.chunks.entry(key).or_insert_with(|| {
            let mut chunk = Chunk::new(key, extent);
            chunk.render_offset = geometry.coordinate_to_point(chunk.origin) + base;
            debug!("allocated chunk ({}, {})", key.x, key.y);
            chunk
        });
        let prev = std::mem::replace(&mut chunk.cells[idx], cell);
        if prev.is_empty() {
            chunk.occupied += 1;
            None
        } else {
            Some(prev)
        }
    }

    /// Clears a cell. Same as writing [`TileCell::EMPTY`].
    pub fn remove_tile(&mut self, coord: TileCoordinate) -> Option<TileCell> {
        self.set_tile(coord, TileCell::EMPTY)
    }

    /// Chunk by key, if allocated.
    pub fn chunk(&self, key: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    /// Chunk holding `coord`, if allocated.
    pub fn chunk_for(&self, coord: TileCoordinate) -> Option<&Chunk> {
        self.chunks.get(&coord_to_chunk(coord, self.extent))
    }

    /// Allocated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// `true` when no chunk is allocated.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Keys of the allocated chunks, unordered.
    pub fn chunk_keys(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Chunks overlapping `rect`, ordered by row then column.
    pub fn chunks_touching(&self, rect: TileRect) -> impl Iterator<Item = &Chunk> + '_ {
        let mut hits: Vec<&Chunk> = if rect.is_empty() {
            Vec::new()
        } else {
            let lo = coord_to_chunk(rect.min, self.extent);
            let hi = coord_to_chunk(rect.max.offset(-1, -1), self.extent);
            let span = (hi.x - lo.x + 1) as i64 * (hi.y - lo.y + 1) as i64;
            if span as usize <= self.chunks.len() {
                (lo.y..=hi.y)
                    .flat_map(|y| (lo.x..=hi.x).map(move |x| ChunkCoord::new(x, y)))
                    .filter_map(|k| self.chunks.get(&k))
                    .collect()
            } else {
                self.chunks
                    .values()
                    .filter(|c| c.key.x >= lo.x && c.key.x <= hi.x && c.key.y >= lo.y && c.key.y <= hi.y)
                    .collect()
            }
        };
        hits.sort_unstable_by_key(|c| (c.key.y, c.key.x));
        hits.into_iter()
    }

    /// Every non-empty cell, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (TileCoordinate, TileCell)> + '_ {
        let extent = self.extent;
        self.chunks.values().flat_map(move |c| c.iter(extent))
    }

    /// Non-empty cells inside `rect`.
    pub fn tiles_in(&self, rect: TileRect) -> impl Iterator<Item = (TileCoordinate, TileCell)> + '_ {
        let extent = self.extent;
        self.chunks_touching(rect)
            .flat_map(move |c| c.iter(extent))
            .filter(move |(coord, _)| rect.contains(*coord))
    }

    /// Union of the allocated chunk extents.
    pub fn allocated_bounds(&self) -> Option<TileRect> {
        self.chunks
            .values()
            .map(|c| TileRect::from_size(c.origin.x, c.origin.y, self.extent.width, self.extent.height))
            .reduce(|a, b| a.union(&b))
    }

    /// Drops every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::transform::MapOrientation;
    use macroquad::math::vec2;

    fn store() -> ChunkStore {
        ChunkStore::new(
            GridGeometry::new(MapOrientation::Orthogonal, TileSize::new(32, 32)),
            TileSize::new(16, 16),
        )
    }

    #[test]
    fn write_allocates_and_clear_releases() {
        let mut s = store();
        let c = TileCoordinate::new(20, 5);
        assert_eq!(s.set_tile(c, TileCell::new(3)), None);
        assert!(s.chunk(ChunkCoord::new(1, 0)).is_some());
        assert_eq!(s.chunk_count(), 1);

        assert_eq!(s.remove_tile(c), Some(TileCell::new(3)));
        assert!(s.is_empty());
    }

    #[test]
    fn empty_write_on_missing_chunk_allocates_nothing() {
        let mut s = store();
        assert_eq!(s.set_tile(TileCoordinate::new(-40, 3), TileCell::EMPTY), None);
        assert!(s.is_empty());
    }

    #[test]
    fn chunk_offset_follows_layer_offset() {
        let mut s = store();
        s.set_tile(TileCoordinate::new(17, 0), TileCell::new(1));
        let key = ChunkCoord::new(1, 0);
        assert_eq!(s.chunk(key).map(|c| c.render_offset()), Some(vec2(512.0, 0.0)));

        s.set_base_offset(vec2(4.0, -8.0));
        assert_eq!(s.chunk(key).map(|c| c.render_offset()), Some(vec2(516.0, -8.0)));

        s.set_tile(TileCoordinate::new(0, 16), TileCell::new(1));
        assert_eq!(s.chunk(ChunkCoord::new(0, 1)).map(|c| c.render_offset()), Some(vec2(4.0, -520.0)));
    }

    #[test]
    fn chunks_touching_is_sorted_and_bounded() {
        let mut s = store();
        for (x, y) in [(40, 40), (0, 0), (20, 0), (0, 20), (-1, -1)] {
            s.set_tile(TileCoordinate::new(x, y), TileCell::new(1));
        }
        let keys: Vec<_> = s
            .chunks_touching(TileRect::from_size(0, 0, 32, 32))
            .map(|c| (c.key().x, c.key().y))
            .collect();
        assert_eq!(keys, vec![(0, 0), (1, 0), (0, 1)]);

        let all: Vec<_> = s.chunks_touching(TileRect::from_size(-1000, -1000, 2000, 2000)).collect();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn tiles_in_filters_to_rect() {
        let mut s = store();
        s.set_tile(TileCoordinate::new(1, 1), TileCell::new(1));
        s.set_tile(TileCoordinate::new(5, 5), TileCell::new(2));
        let hits: Vec<_> = s.tiles_in(TileRect::from_size(0, 0, 3, 3)).collect();
        assert_eq!(hits, vec![(TileCoordinate::new(1, 1), TileCell::new(1))]);
    }
}
