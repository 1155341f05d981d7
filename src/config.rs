//! Engine configuration.

use crate::error::MapError;
use crate::spatial::index::{TileSize, DEFAULT_CHUNK_EXTENT};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for [`EngineConfig::tile_overlap`], in render pixels.
pub const MAX_TILE_OVERLAP: f32 = 3.0;

/// Which tiles the scheduler visits each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Every tile instance is inspected.
    Full,
    /// Only tiles known to be animated.
    #[default]
    Dynamic,
    /// The host animates tiles itself; the scheduler is idle.
    Actions,
}

bitflags! {
    /// Debug overlay switches. Pure state: the overlay renderer reads them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DebugDrawOptions: u32 {
        /// Tile grid lines.
        const GRID          = 1 << 0;
        /// Layer bounding boxes.
        const BOUNDS        = 1 << 1;
        /// Published navigation graphs.
        const GRAPH         = 1 << 2;
        /// Object outlines.
        const OBJECT_BOUNDS = 1 << 3;
        /// Tile origins.
        const ANCHOR        = 1 << 4;
    }
}

/// Engine-wide settings, passed explicitly to the map and scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mode the scheduler starts in.
    pub update_mode: UpdateMode,
    /// Overlay switches applied to every tile layer at load.
    pub debug_draw_options: DebugDrawOptions,
    /// Padding added to every tile node to hide seams at fractional scales.
    pub tile_overlap: f32,
    /// Link diagonal neighbours when building navigation graphs.
    pub diagonals_allowed: bool,
    /// Chunk size for infinite layers. Finite layers use the map size.
    pub chunk_extent: TileSize,
    /// Global multiplier applied on top of layer and tile speeds.
    pub animation_speed: f64,
    /// Threads used to compute frame decisions; 1 keeps everything on the tick thread.
    pub worker_threads: usize,
    /// Batches that may wait in the worker handoff queue.
    pub decision_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            update_mode: UpdateMode::Dynamic,
            debug_draw_options: DebugDrawOptions::empty(),
            tile_overlap: 0.0,
            diagonals_allowed: false,
            chunk_extent: TileSize::new(DEFAULT_CHUNK_EXTENT, DEFAULT_CHUNK_EXTENT),
            animation_speed: 1.0,
            worker_threads: 1,
            decision_queue_capacity: 4,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; missing keys take their defaults.
    pub fn from_json_str(txt: &str) -> Result<Self, MapError> {
        let cfg: EngineConfig = serde_json::from_str(txt)?;
        Ok(cfg.sanitized())
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let p = path.as_ref();
        let txt = std::fs::read_to_string(p).map_err(|source| MapError::Io {
            path: p.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&txt)
    }

    /// Builder form of [`Self::set_tile_overlap`].
    pub fn with_tile_overlap(mut self, overlap: f32) -> Self {
        self.set_tile_overlap(overlap);
        self
    }

    /// Clamped to `0..=MAX_TILE_OVERLAP`; NaN becomes 0.
    pub fn set_tile_overlap(&mut self, overlap: f32) {
        self.tile_overlap = clamp_overlap(overlap);
    }

    /// Clamps out-of-range values instead of rejecting them.
    pub fn sanitized(mut self) -> Self {
        self.tile_overlap = clamp_overlap(self.tile_overlap);
        self.chunk_extent.width = self.chunk_extent.width.max(1);
        self.chunk_extent.height = self.chunk_extent.height.max(1);
        self.worker_threads = self.worker_threads.max(1);
        self.decision_queue_capacity = self.decision_queue_capacity.max(1);
        if !self.animation_speed.is_finite() {
            self.animation_speed = 1.0;
        }
        self
    }
}

fn clamp_overlap(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, MAX_TILE_OVERLAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_expectations() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.update_mode, UpdateMode::Dynamic);
        assert_eq!(cfg.chunk_extent, TileSize::new(16, 16));
        assert!(cfg.debug_draw_options.is_empty());
    }

    #[test]
    fn overlap_is_clamped() {
        assert_eq!(EngineConfig::default().with_tile_overlap(10.0).tile_overlap, MAX_TILE_OVERLAP);
        assert_eq!(EngineConfig::default().with_tile_overlap(-1.0).tile_overlap, 0.0);
        assert_eq!(EngineConfig::default().with_tile_overlap(f32::NAN).tile_overlap, 0.0);
    }

    #[test]
    fn parses_partial_json() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "update_mode": "full", "tile_overlap": 9.5, "debug_draw_options": "GRID | GRAPH",
                 "chunk_extent": { "width": 0, "height": 8 } }"#,
        )
        .expect("config should parse");
        assert_eq!(cfg.update_mode, UpdateMode::Full);
        assert_eq!(cfg.tile_overlap, MAX_TILE_OVERLAP);
        assert_eq!(cfg.debug_draw_options, DebugDrawOptions::GRID | DebugDrawOptions::GRAPH);
        assert_eq!(cfg.chunk_extent, TileSize::new(1, 8));
        assert_eq!(cfg.worker_threads, 1);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = EngineConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("definitely/not/here.json").unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
    }
}
