//! The callback surface between the engine and whatever owns the scene graph.

use crate::layer::LayerId;
use crate::spatial::index::{TileCell, TileCoordinate};
use crate::tileset::AnimationFrame;
use macroquad::math::Rect;

/// Opaque node id handed out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Everything the host needs to create one tile node.
#[derive(Debug, Clone, PartialEq)]
pub struct TileNodeSpec {
    /// Owning tile layer.
    pub layer: LayerId,
    /// Cell position.
    pub coord: TileCoordinate,
    /// Cell as stored in the layer, flip flags included.
    pub cell: TileCell,
    /// Global id of the image to show first (differs from `cell` for animated tiles).
    pub frame_gid: u32,
    /// Render-space box, padded by the tile overlap. `y` is the bottom edge.
    pub bounds: Rect,
    /// Layer opacity.
    pub opacity: f32,
    /// Draw order of the owning layer.
    pub z_index: usize,
}

/// A declarative animation the host plays on its own while the scheduler is idle.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnimation {
    /// Frames to cycle through.
    pub frames: Vec<AnimationFrame>,
    /// Frame shown when playback starts.
    pub start_frame: usize,
    /// Seconds already spent in `start_frame`.
    pub start_elapsed: f64,
    /// Combined global, layer and tile speed; negative plays backwards.
    pub speed: f64,
    /// Show `start_frame` without advancing.
    pub paused: bool,
}

/// What a host animation was showing when it was stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayedFrame {
    /// Frame on screen.
    pub frame_index: usize,
    /// Seconds spent in it.
    pub elapsed: f64,
}

/// Node lifecycle and texture updates, implemented by the host.
///
/// All calls happen on the thread that runs the scheduler tick.
pub trait TileNodeHost {
    /// Creates a node showing `spec.frame_gid` and returns its handle.
    fn create_tile_node(&mut self, spec: &TileNodeSpec) -> NodeHandle;

    /// Shows another tile image on an existing node.
    fn set_node_texture(&mut self, node: NodeHandle, frame_gid: u32);

    /// Destroys a node; the handle is not reused.
    fn remove_node(&mut self, node: NodeHandle);

    /// Starts a host-driven animation. Returns `false` when unsupported.
    fn run_frame_animation(&mut self, _node: NodeHandle, _animation: &FrameAnimation) -> bool {
        false
    }

    /// Stops a host-driven animation and reports where it stopped, if known.
    fn stop_frame_animation(&mut self, _node: NodeHandle) -> Option<DisplayedFrame> {
        None
    }
}
