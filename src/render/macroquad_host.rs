//! Reference [`TileNodeHost`] that keeps nodes in a table and draws them with macroquad.

use crate::animation::state::FrameTimeline;
use crate::config::DebugDrawOptions;
use crate::layer::Layer;
use crate::map::Map;
use crate::render::host::{DisplayedFrame, FrameAnimation, NodeHandle, TileNodeHost, TileNodeSpec};
use crate::tileset::Tileset;
use anyhow::Context;
use macroquad::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

struct Atlas {
    tileset: Tileset,
    texture: Texture2D,
}

#[derive(Debug)]
struct HostAnimation {
    timeline: FrameTimeline,
    frame: usize,
    elapsed: f64,
    speed: f64,
    paused: bool,
}

#[derive(Debug)]
struct Node {
    spec: TileNodeSpec,
    gid: u32,
    animation: Option<HostAnimation>,
}

/// Draws tile nodes from tileset atlases and plays Actions-mode animations itself.
#[derive(Default)]
pub struct MacroquadHost {
    next_id: u64,
    nodes: BTreeMap<NodeHandle, Node>,
    atlases: Vec<Atlas>,
}

impl MacroquadHost {
    /// Host without nodes or atlases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads one texture per tileset of `map`; image paths are relative to `base_dir`.
    pub async fn load_atlases(&mut self, map: &Map, base_dir: &Path) -> anyhow::Result<()> {
        let mut atlases = Vec::with_capacity(map.tilesets().tilesets().len());
        for ts in map.tilesets().tilesets() {
            let img_path = base_dir.join(&ts.image);
            let img_str = img_path
                .to_str()
                .with_context(|| format!("Non UTF-8 texture path {}", img_path.display()))?;
            let texture = load_texture(img_str)
                .await
                .with_context(|| format!("Loading texture {}", ts.image))?;
            texture.set_filter(FilterMode::Nearest);
            atlases.push(Atlas {
                tileset: ts.clone(),
                texture,
            });
        }
        self.atlases = atlases;
        Ok(())
    }

    /// Live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Global id the node currently shows.
    pub fn node_gid(&self, node: NodeHandle) -> Option<u32> {
        self.nodes.get(&node).map(|n| n.gid)
    }

    /// `true` while the host plays an animation on `node`.
    pub fn is_animating(&self, node: NodeHandle) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.animation.is_some())
    }

    /// Advances host-driven animations by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        for node in self.nodes.values_mut() {
            let Some(anim) = node.animation.as_mut() else {
                continue;
            };
            if anim.paused {
                continue;
            }
            let (frame, elapsed) = anim.timeline.advance(anim.frame, anim.elapsed, dt * anim.speed);
            anim.frame = frame;
            anim.elapsed = elapsed;
            if let Some(gid) = anim.timeline.frame_gid(frame) {
                node.gid = gid;
            }
        }
    }

    fn atlas_for(&self, gid: u32) -> Option<(&Atlas, u32)> {
        self.atlases
            .iter()
            .rev()
            .find(|a| gid >= a.tileset.first_gid && gid < a.tileset.first_gid + a.tileset.tilecount)
            .map(|a| (a, gid - a.tileset.first_gid))
    }

    /// Draws every node, lowest layer first. Screen y is render y negated.
    pub fn draw(&self) {
        let mut order: Vec<(&NodeHandle, &Node)> = self.nodes.iter().collect();
        order.sort_by_key(|(h, n)| (n.spec.z_index, **h));

        for (_, node) in order {
            let Some((atlas, local)) = self.atlas_for(node.gid) else {
                continue;
            };
            let (sx, sy) = atlas.tileset.source_origin(local);
            let ts = atlas.tileset.tile_size;
            let b = node.spec.bounds;
            let cell = node.spec.cell;

            // diagonal flip is a transpose: quarter turn plus a mirror
            let (flip_x, flip_y, rotation) = if cell.flip_d() {
                (cell.flip_v(), !cell.flip_h(), std::f32::consts::FRAC_PI_2)
            } else {
                (cell.flip_h(), cell.flip_v(), 0.0)
            };

            draw_texture_ex(
                &atlas.texture,
                b.x,
                -(b.y + b.h),
                Color::new(1.0, 1.0, 1.0, node.spec.opacity),
                DrawTextureParams {
                    dest_size: Some(vec2(b.w, b.h)),
                    source: Some(Rect::new(sx as f32, sy as f32, ts.width as f32, ts.height as f32)),
                    rotation,
                    flip_x,
                    flip_y,
                    ..Default::default()
                },
            );
        }
    }

    /// Overlays gated by each layer's [`DebugDrawOptions`].
    pub fn draw_debug(&self, map: &Map) {
        let to_screen = |r: Rect| Rect::new(r.x, -(r.y + r.h), r.w, r.h);
        for layer in map.all_layers() {
            match layer {
                Layer::Tiles(tl) => {
                    let opts = tl.debug_draw_options();
                    if opts.contains(DebugDrawOptions::GRID) {
                        for node in self.nodes.values().filter(|n| n.spec.layer == tl.id) {
                            let r = to_screen(node.spec.bounds);
                            draw_rectangle_lines(r.x, r.y, r.w, r.h, 1.0, GRAY);
                        }
                    }
                    if opts.contains(DebugDrawOptions::BOUNDS) {
                        if let Some(r) = tl.bounding_rect().map(to_screen) {
                            draw_rectangle_lines(r.x, r.y, r.w, r.h, 2.0, YELLOW);
                        }
                    }
                    if opts.contains(DebugDrawOptions::GRAPH) {
                        if let Some(graph) = tl.graph() {
                            for n in graph.nodes() {
                                let p = tl.coordinate_to_point(n.coordinate, Default::default());
                                draw_circle(p.x, -p.y, 2.0, GREEN);
                            }
                        }
                    }
                    if opts.contains(DebugDrawOptions::ANCHOR) {
                        let o = tl.offset();
                        draw_circle(o.x, -o.y, 3.0, RED);
                    }
                    if opts.contains(DebugDrawOptions::OBJECT_BOUNDS) {
                        for obj in map.objects() {
                            let r = to_screen(obj.bounds());
                            draw_rectangle_lines(r.x, r.y, r.w, r.h, 1.0, SKYBLUE);
                        }
                    }
                }
                Layer::Objects(_) | Layer::Group(_) => {}
            }
        }
    }
}

impl TileNodeHost for MacroquadHost {
    fn create_tile_node(&mut self, spec: &TileNodeSpec) -> NodeHandle {
        let handle = NodeHandle(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            handle,
            Node {
                spec: spec.clone(),
                gid: spec.frame_gid,
                animation: None,
            },
        );
        handle
    }

    fn set_node_texture(&mut self, node: NodeHandle, frame_gid: u32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.gid = frame_gid;
        }
    }

    fn remove_node(&mut self, node: NodeHandle) {
        self.nodes.remove(&node);
    }

    fn run_frame_animation(&mut self, node: NodeHandle, animation: &FrameAnimation) -> bool {
        let Some(n) = self.nodes.get_mut(&node) else {
            return false;
        };
        let timeline = FrameTimeline::new(&animation.frames);
        if let Some(gid) = timeline.frame_gid(animation.start_frame) {
            n.gid = gid;
        }
        n.animation = Some(HostAnimation {
            timeline,
            frame: animation.start_frame,
            elapsed: animation.start_elapsed,
            speed: animation.speed,
            paused: animation.paused,
        });
        true
    }

    fn stop_frame_animation(&mut self, node: NodeHandle) -> Option<DisplayedFrame> {
        let anim = self.nodes.get_mut(&node)?.animation.take()?;
        Some(DisplayedFrame {
            frame_index: anim.frame,
            elapsed: anim.elapsed,
        })
    }
}
