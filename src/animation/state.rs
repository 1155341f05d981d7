//! Frame timelines and per-instance playback state.

use crate::tileset::{AnimationFrame, TilesetData};
use std::sync::Arc;

/// Positions this close to a frame boundary (in ms) snap onto it.
const SNAP_MS: f64 = 1e-6;

/// Frame start times for one animated tile, shared by every instance of it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTimeline {
    frames: Vec<AnimationFrame>,
    starts: Vec<u64>,
    cycle_ms: u64,
}

impl FrameTimeline {
    /// Prefix-sums the frame durations.
    pub fn new(frames: &[AnimationFrame]) -> Self {
        let mut starts = Vec::with_capacity(frames.len());
        let mut t = 0u64;
        for f in frames {
            starts.push(t);
            t += f.duration_ms as u64;
        }
        FrameTimeline {
            frames: frames.to_vec(),
            starts,
            cycle_ms: t,
        }
    }

    /// Frames in playback order.
    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    /// Frame count.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `true` for a tile without frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length of one full cycle in milliseconds.
    pub fn cycle_ms(&self) -> u64 {
        self.cycle_ms
    }

    /// When `frame` starts inside the cycle.
    pub fn start_ms(&self, frame: usize) -> Option<u64> {
        self.starts.get(frame).copied()
    }

    /// Length of `frame` in seconds; 0 past the end.
    pub fn duration_s(&self, frame: usize) -> f64 {
        self.frames.get(frame).map(|f| f.duration_ms as f64 / 1000.0).unwrap_or(0.0)
    }

    /// Tile shown by `frame`.
    pub fn frame_gid(&self, frame: usize) -> Option<u32> {
        self.frames.get(frame).map(|f| f.gid)
    }

    /// Single frame or zero-length cycle: nothing to play.
    pub fn is_static(&self) -> bool {
        self.frames.len() < 2 || self.cycle_ms == 0
    }

    /// Frame and in-frame seconds for a position in the cycle (ms, any sign).
    pub fn locate(&self, position_ms: f64) -> (usize, f64) {
        if self.is_static() {
            return (0, 0.0);
        }
        let cycle = self.cycle_ms as f64;
        let mut p = position_ms.rem_euclid(cycle);
        let r = p.round();
        if (p - r).abs() < SNAP_MS {
            p = r;
        }
        if p >= cycle {
            p = 0.0;
        }
        // last frame starting at or before p; zero-length frames are skipped
        let idx = self.starts.partition_point(|s| (*s as f64) <= p).saturating_sub(1);
        (idx, (p - self.starts[idx] as f64) / 1000.0)
    }

    /// Moves `delta_s` seconds (negative plays backwards) from `frame` and
    /// `elapsed`, wrapping as often as needed in one step.
    pub fn advance(&self, frame: usize, elapsed: f64, delta_s: f64) -> (usize, f64) {
        if self.is_static() || delta_s == 0.0 || !delta_s.is_finite() {
            return (frame, elapsed);
        }
        let start = self.starts.get(frame).copied().unwrap_or(0) as f64;
        self.locate(start + elapsed * 1000.0 + delta_s * 1000.0)
    }
}

/// Playback position of one animated tile instance.
#[derive(Debug, Clone)]
pub struct AnimationState {
    data: Arc<TilesetData>,
    timeline: Arc<FrameTimeline>,
    /// Frame currently shown.
    pub frame_index: usize,
    /// Seconds spent in the current frame.
    pub elapsed: f64,
    /// Paused tiles keep their frame and elapsed time.
    pub is_paused: bool,
    /// Per-tile multiplier; negative plays backwards.
    pub speed: f64,
}

impl AnimationState {
    /// State at the start of frame 0, playing at speed 1.
    pub fn new(data: Arc<TilesetData>, timeline: Arc<FrameTimeline>) -> Self {
        AnimationState {
            data,
            timeline,
            frame_index: 0,
            elapsed: 0.0,
            is_paused: false,
            speed: 1.0,
        }
    }

    /// Tileset data of the animated tile.
    pub fn data(&self) -> &Arc<TilesetData> {
        &self.data
    }

    /// Shared frame timeline.
    pub fn timeline(&self) -> &Arc<FrameTimeline> {
        &self.timeline
    }

    /// Global id of the frame this state says is showing.
    pub fn current_gid(&self) -> u32 {
        self.timeline.frame_gid(self.frame_index).unwrap_or(self.data.gid)
    }

    /// Moves to `frame_index`, keeping `elapsed` inside that frame.
    pub fn seek(&mut self, frame_index: usize, elapsed: f64) {
        let len = self.timeline.len().max(1);
        self.frame_index = frame_index % len;
        let max = self.timeline.duration_s(self.frame_index);
        self.elapsed = if elapsed.is_finite() { elapsed.clamp(0.0, max) } else { 0.0 };
    }
}
