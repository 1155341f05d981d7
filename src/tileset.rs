//! Tilesets, per-tile data and global id lookup.

use crate::error::MapError;
use crate::ir_map::IrTileset;
use crate::properties::Properties;
use crate::spatial::index::{TileCell, TileSize};
use log::warn;
use std::sync::Arc;

/// One animation frame: the global id to show and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    /// Tile shown.
    pub gid: u32,
    /// Display time.
    pub duration_ms: u32,
}

/// Immutable per-tile metadata, shared by every instance of the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetData {
    /// Global id of the tile.
    pub gid: u32,
    /// Id inside its tileset.
    pub local_id: u32,
    /// Tile size in pixels.
    pub size: TileSize,
    /// Animation frames; empty for static tiles.
    pub frames: Vec<AnimationFrame>,
    /// Tile custom properties.
    pub properties: Properties,
}

impl TilesetData {
    /// Static tile without properties.
    pub fn new(gid: u32, size: TileSize) -> Self {
        TilesetData {
            gid,
            local_id: 0,
            size,
            frames: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Sets the animation frames.
    pub fn with_frames(mut self, frames: Vec<AnimationFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Sets the custom properties.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// `true` when the tile has frames.
    #[inline]
    pub fn is_animated(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Sum of all frame durations.
    pub fn cycle_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.duration_ms as u64).sum()
    }

    /// The `walkable` property, if authored.
    pub fn walkable(&self) -> Option<bool> {
        self.properties.get_bool("walkable")
    }

    /// The `obstacle` property; `false` when missing.
    pub fn obstacle(&self) -> bool {
        self.properties.get_bool("obstacle").unwrap_or(false)
    }

    /// Path cost of standing on this tile; 1.0 unless authored.
    pub fn weight(&self) -> f32 {
        self.properties
            .get_f32("weight")
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(1.0)
    }
}

/// Tileset metadata plus the resolved data of every tile.
#[derive(Debug, Clone)]
pub struct Tileset {
    /// Display name.
    pub name: String,
    /// Global id of local tile 0.
    pub first_gid: u32,
    /// Tiles in the atlas.
    pub tilecount: u32,
    /// Tiles per atlas row.
    pub columns: u32,
    /// Tile size in pixels.
    pub tile_size: TileSize,
    /// Pixels between atlas tiles.
    pub spacing: u32,
    /// Pixels around the atlas border.
    pub margin: u32,
    /// Atlas image path.
    pub image: String,
    /// Tileset custom properties.
    pub properties: Properties,
    tiles: Vec<Arc<TilesetData>>,
}

impl Tileset {
    /// Resolves frame ids to global ids and builds per-tile data.
    pub fn from_ir(ir: &IrTileset) -> Self {
        let tile_size = TileSize::new(ir.tile_w, ir.tile_h);
        let mut tiles: Vec<TilesetData> = (0..ir.tilecount)
            .map(|local| TilesetData {
                local_id: local,
                ..TilesetData::new(ir.first_gid + local, tile_size)
            })
            .collect();

        for meta in &ir.tiles {
            let Some(data) = tiles.get_mut(meta.id as usize) else {
                warn!("tileset '{}': metadata for tile {} beyond tilecount {}", ir.name, meta.id, ir.tilecount);
                continue;
            };
            data.properties = meta.properties.clone();
            data.frames = meta
                .animation
                .iter()
                .filter(|f| {
                    let known = f.tile_id < ir.tilecount;
                    if !known {
                        warn!("tileset '{}': tile {} animates unknown tile {}", ir.name, meta.id, f.tile_id);
                    }
                    known
                })
                .map(|f| AnimationFrame {
                    gid: ir.first_gid + f.tile_id,
                    duration_ms: f.duration_ms,
                })
                .collect();
        }

        Tileset {
            name: ir.name.clone(),
            first_gid: ir.first_gid,
            tilecount: ir.tilecount,
            columns: ir.columns.max(1),
            tile_size,
            spacing: ir.spacing,
            margin: ir.margin,
            image: ir.image.clone(),
            properties: ir.properties.clone(),
            tiles: tiles.into_iter().map(Arc::new).collect(),
        }
    }

    /// Data of a local tile.
    pub fn tile(&self, local_id: u32) -> Option<&Arc<TilesetData>> {
        self.tiles.get(local_id as usize)
    }

    /// Data of every tile, by local id.
    pub fn tiles(&self) -> impl Iterator<Item = &Arc<TilesetData>> {
        self.tiles.iter()
    }

    /// Pixel position of a local tile in the atlas image.
    pub fn source_origin(&self, local_id: u32) -> (u32, u32) {
        let col = local_id % self.columns;
        let row = local_id / self.columns;
        (
            self.margin + col * (self.tile_size.width + self.spacing),
            self.margin + row * (self.tile_size.height + self.spacing),
        )
    }
}

/// Global-id lookup across all tilesets of a map.
#[derive(Debug, Clone, Default)]
pub struct TilesetRegistry {
    tilesets: Vec<Tileset>,
    gid_lut: Vec<u16>,
}

impl TilesetRegistry {
    /// Sorts the tilesets and builds the gid lookup table.
    pub fn from_ir(ir: &[IrTileset]) -> Result<Self, MapError> {
        let mut tilesets: Vec<Tileset> = ir.iter().map(Tileset::from_ir).collect();
        tilesets.sort_unstable_by_key(|t| t.first_gid);
        for pair in tilesets.windows(2) {
            if pair[0].first_gid == pair[1].first_gid {
                return Err(MapError::DuplicateTileset {
                    first_gid: pair[0].first_gid,
                });
            }
        }
        if tilesets.len() >= u16::MAX as usize {
            return Err(MapError::InvalidMap(format!("too many tilesets: {}", tilesets.len())));
        }

        let max_gid = tilesets
            .iter()
            .filter(|t| t.tilecount > 0)
            .map(|t| t.first_gid + t.tilecount - 1)
            .max()
            .unwrap_or(0);

        let mut gid_lut = vec![u16::MAX; (max_gid + 1) as usize];
        for (i, t) in tilesets.iter().enumerate() {
            for gid in t.first_gid..(t.first_gid + t.tilecount) {
                gid_lut[gid as usize] = i as u16;
            }
        }

        Ok(TilesetRegistry { tilesets, gid_lut })
    }

    /// Tilesets sorted by first gid.
    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    /// Tileset owning `gid` and the local id inside it.
    #[inline]
    pub fn tileset_for_gid(&self, gid: u32) -> Option<(&Tileset, u32)> {
        let idx = *self.gid_lut.get(gid as usize)?;
        if idx == u16::MAX {
            return None;
        }
        let ts = &self.tilesets[idx as usize];
        Some((ts, gid - ts.first_gid))
    }

    /// Tile data of `gid`; `None` if no tileset covers it.
    pub fn data_for_gid(&self, gid: u32) -> Option<&Arc<TilesetData>> {
        let (ts, local) = self.tileset_for_gid(gid)?;
        ts.tile(local)
    }

    /// Tile data of a cell, flags ignored. `None` for empty cells.
    pub fn data_for_cell(&self, cell: TileCell) -> Option<&Arc<TilesetData>> {
        if cell.is_empty() {
            return None;
        }
        self.data_for_gid(cell.gid())
    }
}
