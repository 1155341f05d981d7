//! Per-tick animation driver.
//!
//! Frame decisions are a pure function of the animation states and the tick
//! delta, so they can be computed on worker threads. Textures are only pushed
//! to the host from the thread calling [`TileUpdateScheduler::tick`].

use crate::animation::state::{AnimationState, FrameTimeline};
use crate::config::{EngineConfig, UpdateMode};
use crate::events::MapEvent;
use crate::layer::{LayerId, TileLayer};
use crate::map::Map;
use crate::render::cull::visible_tiles;
use crate::render::host::{FrameAnimation, NodeHandle, TileNodeHost, TileNodeSpec};
use crate::spatial::index::{TileCell, TileCoordinate};
use crate::tileset::TilesetData;
use ahash::{AHashMap, AHashSet};
use log::{debug, trace, warn};
use macroquad::math::Rect;
use std::sync::Arc;

/// Below this many animated tiles the decision pass stays on the tick thread.
const PARALLEL_THRESHOLD: usize = 512;
const DECISION_BATCH: usize = 256;

/// Identifies one tile instance: a cell of a tile layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Tile layer holding the cell.
    pub layer: LayerId,
    /// Cell position.
    pub coord: TileCoordinate,
}

impl TileKey {
    /// Key for `coord` on `layer`.
    pub fn new(layer: LayerId, coord: TileCoordinate) -> Self {
        TileKey { layer, coord }
    }
}

/// Input of one frame decision.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    /// Instance being advanced.
    pub key: TileKey,
    /// Frame before the move.
    pub frame_index: usize,
    /// Seconds already spent in that frame.
    pub elapsed: f64,
    /// Seconds to move, all speed multipliers applied.
    pub delta: f64,
    /// Timeline of the tile.
    pub timeline: Arc<FrameTimeline>,
}

/// Where one instance ends up after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDecision {
    /// Instance the decision is for.
    pub key: TileKey,
    /// New frame.
    pub frame_index: usize,
    /// Seconds into the new frame.
    pub elapsed: f64,
    /// `true` when the host needs a new texture.
    pub frame_changed: bool,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Instances inspected this tick.
    pub visited: usize,
    /// Instances whose displayed frame changed.
    pub changed: usize,
}

/// Computes the next frame for every input. Pure; safe on any thread.
pub fn decide(inputs: &[DecisionInput]) -> Vec<FrameDecision> {
    inputs
        .iter()
        .map(|i| {
            let (frame_index, elapsed) = i.timeline.advance(i.frame_index, i.elapsed, i.delta);
            FrameDecision {
                key: i.key,
                frame_index,
                elapsed,
                frame_changed: frame_index != i.frame_index,
            }
        })
        .collect()
}

/// Splits `inputs` across scoped workers; batches come back through a bounded queue
/// that this thread drains before returning.
fn decide_parallel(inputs: &[DecisionInput], workers: usize, capacity: usize) -> Vec<FrameDecision> {
    let workers = workers.clamp(1, inputs.len().max(1));
    let per_worker = inputs.len().div_ceil(workers).max(1);
    let (tx, rx) = crossbeam_channel::bounded::<Vec<FrameDecision>>(capacity.max(1));
    let mut out = Vec::with_capacity(inputs.len());

    std::thread::scope(|s| {
        for part in inputs.chunks(per_worker) {
            let tx = tx.clone();
            s.spawn(move || {
                for batch in part.chunks(DECISION_BATCH) {
                    if tx.send(decide(batch)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);
        for batch in rx.iter() {
            out.extend(batch);
        }
    });
    out
}

#[derive(Debug)]
struct TileInstance {
    node: NodeHandle,
    cell: TileCell,
    data: Arc<TilesetData>,
    shown_gid: u32,
    host_animated: bool,
}

/// Owns every tile instance's node handle and animation state.
#[derive(Debug)]
pub struct TileUpdateScheduler {
    mode: UpdateMode,
    animation_speed: f64,
    worker_threads: usize,
    queue_capacity: usize,
    tile_overlap: f32,
    paused: bool,
    instances: AHashMap<TileKey, TileInstance>,
    states: AHashMap<TileKey, AnimationState>,
    timelines: AHashMap<u32, Arc<FrameTimeline>>,
    pending: Vec<TileKey>,
}

impl TileUpdateScheduler {
    /// Scheduler without instances, set up from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        let config = config.clone().sanitized();
        TileUpdateScheduler {
            mode: config.update_mode,
            animation_speed: config.animation_speed,
            worker_threads: config.worker_threads,
            queue_capacity: config.decision_queue_capacity,
            tile_overlap: config.tile_overlap,
            paused: false,
            instances: AHashMap::new(),
            states: AHashMap::new(),
            timelines: AHashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Current update mode.
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Global pause switch; see [`Self::set_paused`].
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pauses every tile. Host-driven animations pick this up on the next Actions entry.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Global speed multiplier.
    pub fn animation_speed(&self) -> f64 {
        self.animation_speed
    }

    /// Non-finite speeds are ignored.
    pub fn set_animation_speed(&mut self, speed: f64) {
        if speed.is_finite() {
            self.animation_speed = speed;
        }
    }

    /// Tile instances with a host node.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instances that currently have an animation state.
    pub fn animated_count(&self) -> usize {
        self.states.len()
    }

    /// `true` if the cell has a host node.
    pub fn contains(&self, key: TileKey) -> bool {
        self.instances.contains_key(&key)
    }

    /// Host node of an instance.
    pub fn node(&self, key: TileKey) -> Option<NodeHandle> {
        self.instances.get(&key).map(|i| i.node)
    }

    /// Animation state of an instance, if it has one.
    pub fn state(&self, key: TileKey) -> Option<&AnimationState> {
        self.states.get(&key)
    }

    /// Global id last pushed to the host for this instance.
    pub fn displayed_gid(&self, key: TileKey) -> Option<u32> {
        self.instances.get(&key).map(|i| i.shown_gid)
    }

    /// Every instance key, unordered.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.instances.keys().copied()
    }

    /// Per-tile speed multiplier. `false` for static or unknown tiles.
    pub fn set_tile_speed(&mut self, key: TileKey, speed: f64) -> bool {
        match self.states.get_mut(&key) {
            Some(st) if speed.is_finite() => {
                st.speed = speed;
                true
            }
            _ => false,
        }
    }

    /// Pauses one animated tile. `false` for static or unknown tiles.
    pub fn set_tile_paused(&mut self, key: TileKey, paused: bool) -> bool {
        match self.states.get_mut(&key) {
            Some(st) => {
                st.is_paused = paused;
                true
            }
            None => false,
        }
    }

    fn timeline_for(&mut self, data: &TilesetData) -> Arc<FrameTimeline> {
        Arc::clone(
            self.timelines
                .entry(data.gid)
                .or_insert_with(|| Arc::new(FrameTimeline::new(&data.frames))),
        )
    }

    fn ensure_state(&mut self, key: TileKey) -> bool {
        if self.states.contains_key(&key) {
            return false;
        }
        let Some(data) = self.instances.get(&key).map(|i| Arc::clone(&i.data)) else {
            return false;
        };
        if !data.is_animated() {
            return false;
        }
        let timeline = self.timeline_for(&data);
        self.states.insert(key, AnimationState::new(data, timeline));
        self.pending.push(key);
        true
    }

    fn ensure_all_states(&mut self) -> usize {
        let keys: Vec<TileKey> = self.instances.keys().copied().collect();
        keys.into_iter().filter(|k| self.ensure_state(*k)).count()
    }

    /// Creates nodes for every cell of one tile layer. Returns how many were created.
    pub fn instantiate_layer(&mut self, map: &Map, layer: LayerId, host: &mut dyn TileNodeHost) -> usize {
        let Some((z, tl)) = find_layer(map, layer) else {
            warn!("no tile layer with id {layer}");
            return 0;
        };
        let cells: Vec<(TileCoordinate, TileCell)> = tl.chunks().iter().collect();
        let mut created = 0;
        for (coord, cell) in cells {
            if self.instantiate_cell(map, tl, z, coord, cell, host) {
                created += 1;
            }
        }
        debug!("layer '{}': instantiated {} tiles", tl.name, created);
        created
    }

    /// Creates nodes for the visible cells of every visible tile layer inside `view`.
    pub fn instantiate_in_view(&mut self, map: &Map, view: Rect, host: &mut dyn TileNodeHost) -> usize {
        let mut created = 0;
        for (z, tl) in map.tile_layers().into_iter().enumerate() {
            if !tl.visible {
                continue;
            }
            for (coord, cell) in visible_tiles(tl, view) {
                if self.instantiate_cell(map, tl, z, coord, cell, host) {
                    created += 1;
                }
            }
        }
        created
    }

    /// Drops instances that fell outside `view`. Returns how many were removed.
    pub fn retain_in_view(&mut self, map: &Map, view: Rect, host: &mut dyn TileNodeHost) -> usize {
        let mut keep = AHashSet::new();
        for tl in map.tile_layers() {
            if !tl.visible {
                continue;
            }
            keep.extend(visible_tiles(tl, view).into_iter().map(|(c, _)| TileKey::new(tl.id, c)));
        }
        let gone: Vec<TileKey> = self.instances.keys().filter(|k| !keep.contains(*k)).copied().collect();
        for key in &gone {
            self.remove_instance(*key, host);
        }
        gone.len()
    }

    fn instantiate_cell(
        &mut self,
        map: &Map,
        layer: &TileLayer,
        z: usize,
        coord: TileCoordinate,
        cell: TileCell,
        host: &mut dyn TileNodeHost,
    ) -> bool {
        let key = TileKey::new(layer.id, coord);
        if self.instances.contains_key(&key) {
            return false;
        }
        let Some(data) = map.tilesets().data_for_cell(cell).cloned() else {
            warn!(
                "layer '{}': gid {} at ({}, {}) has no tileset data; leaving it empty",
                layer.name,
                cell.gid(),
                coord.x,
                coord.y
            );
            return false;
        };

        let mut bounds = map.geometry().tile_bounds(coord);
        let offset = layer.offset();
        bounds.x += offset.x;
        bounds.y += offset.y;
        // oversized tiles grow up and right from the bottom-left corner
        bounds.w = bounds.w.max(data.size.width as f32);
        bounds.h = bounds.h.max(data.size.height as f32);
        let o = self.tile_overlap;
        let bounds = Rect::new(bounds.x - o / 2.0, bounds.y - o / 2.0, bounds.w + o, bounds.h + o);

        let state = data.is_animated().then(|| {
            let timeline = self.timeline_for(&data);
            AnimationState::new(Arc::clone(&data), timeline)
        });
        let frame_gid = state.as_ref().map(|s| s.current_gid()).unwrap_or(cell.gid());

        let node = host.create_tile_node(&TileNodeSpec {
            layer: layer.id,
            coord,
            cell,
            frame_gid,
            bounds,
            opacity: layer.opacity,
            z_index: z,
        });
        self.instances.insert(
            key,
            TileInstance {
                node,
                cell,
                data,
                shown_gid: frame_gid,
                host_animated: false,
            },
        );

        // Full mode creates states lazily while ticking
        if let Some(state) = state {
            if self.mode != UpdateMode::Full {
                self.states.insert(key, state);
            }
        }
        if self.mode == UpdateMode::Actions {
            self.hand_off(key, layer.speed, host);
        }
        true
    }

    /// Re-syncs one instance with the map after an edit.
    pub fn refresh_tile(&mut self, map: &Map, key: TileKey, host: &mut dyn TileNodeHost) -> bool {
        let current = map.tile_at(key.layer, key.coord);
        let existing = self.instances.get(&key).map(|i| i.cell);
        match (existing, current) {
            (None, None) => false,
            (Some(_), None) => self.remove_instance(key, host),
            (Some(old), Some(cell)) if old == cell => false,
            (old, Some(cell)) => {
                if old.is_some() {
                    self.remove_instance(key, host);
                }
                match find_layer(map, key.layer) {
                    Some((z, tl)) => self.instantiate_cell(map, tl, z, key.coord, cell, host),
                    None => false,
                }
            }
        }
    }

    /// Stops and removes the host node of one instance.
    pub fn remove_instance(&mut self, key: TileKey, host: &mut dyn TileNodeHost) -> bool {
        let Some(inst) = self.instances.remove(&key) else {
            return false;
        };
        if inst.host_animated {
            host.stop_frame_animation(inst.node);
        }
        host.remove_node(inst.node);
        self.states.remove(&key);
        self.pending.retain(|k| *k != key);
        true
    }

    /// Removes every node.
    pub fn clear(&mut self, host: &mut dyn TileNodeHost) {
        let keys: Vec<TileKey> = self.instances.keys().copied().collect();
        for key in keys {
            self.remove_instance(key, host);
        }
        self.pending.clear();
    }

    /// Switches mode, returning the previous one.
    ///
    /// Entering Actions flushes pending textures, then hands every animated
    /// tile to the host. Leaving Actions stops each host animation and adopts
    /// the frame it reports; when the host cannot report, the scheduler keeps
    /// its own last frame and pushes that texture again. Either way the
    /// displayed frame matches the state afterwards.
    pub fn set_update_mode(&mut self, map: &Map, mode: UpdateMode, host: &mut dyn TileNodeHost) -> UpdateMode {
        let from = self.mode;
        if from == mode {
            return from;
        }
        if from == UpdateMode::Actions {
            self.take_back(host);
        }
        match mode {
            UpdateMode::Actions => {
                self.apply_pending(host);
                self.ensure_all_states();
                self.apply_pending(host);
                let speeds = layer_speeds(map);
                let keys: Vec<TileKey> = self.states.keys().copied().collect();
                for key in keys {
                    let layer_speed = speeds.get(&key.layer).copied().unwrap_or(1.0);
                    self.hand_off(key, layer_speed, host);
                }
            }
            UpdateMode::Dynamic => {
                self.ensure_all_states();
                self.apply_pending(host);
            }
            UpdateMode::Full => {}
        }
        self.mode = mode;
        debug!("update mode {:?} -> {:?}", from, mode);
        map.notify(&MapEvent::UpdateModeChanged { from, to: mode });
        from
    }

    fn hand_off(&mut self, key: TileKey, layer_speed: f64, host: &mut dyn TileNodeHost) {
        let (Some(st), Some(inst)) = (self.states.get(&key), self.instances.get_mut(&key)) else {
            return;
        };
        let animation = FrameAnimation {
            frames: st.timeline().frames().to_vec(),
            start_frame: st.frame_index,
            start_elapsed: st.elapsed,
            speed: self.animation_speed * layer_speed * st.speed,
            paused: self.paused || st.is_paused,
        };
        inst.host_animated = host.run_frame_animation(inst.node, &animation);
    }

    fn take_back(&mut self, host: &mut dyn TileNodeHost) {
        for (key, st) in self.states.iter_mut() {
            let Some(inst) = self.instances.get_mut(key) else {
                continue;
            };
            if inst.host_animated {
                if let Some(shown) = host.stop_frame_animation(inst.node) {
                    st.seek(shown.frame_index, shown.elapsed);
                }
                inst.host_animated = false;
            }
            let gid = st.current_gid();
            host.set_node_texture(inst.node, gid);
            inst.shown_gid = gid;
        }
    }

    /// Computes this tick's frame decisions and writes them into the states.
    /// Texture changes are queued until [`apply_pending`](Self::apply_pending).
    pub fn decide_tick(&mut self, map: &Map, dt: f64) -> TickReport {
        let visited = match self.mode {
            UpdateMode::Actions => return TickReport::default(),
            UpdateMode::Full => {
                self.ensure_all_states();
                self.instances.len()
            }
            UpdateMode::Dynamic => self.states.len(),
        };
        if self.paused || dt == 0.0 || !dt.is_finite() {
            return TickReport { visited, changed: 0 };
        }

        let speeds = layer_speeds(map);
        let inputs: Vec<DecisionInput> = self
            .states
            .iter()
            .filter(|(_, st)| !st.is_paused && !st.timeline().is_static())
            .filter_map(|(key, st)| {
                let layer_speed = speeds.get(&key.layer).copied().unwrap_or(1.0);
                let delta = dt * self.animation_speed * layer_speed * st.speed;
                (delta != 0.0 && delta.is_finite()).then(|| DecisionInput {
                    key: *key,
                    frame_index: st.frame_index,
                    elapsed: st.elapsed,
                    delta,
                    timeline: Arc::clone(st.timeline()),
                })
            })
            .collect();

        let decisions = if self.worker_threads > 1 && inputs.len() >= PARALLEL_THRESHOLD {
            decide_parallel(&inputs, self.worker_threads, self.queue_capacity)
        } else {
            decide(&inputs)
        };

        let mut changed = 0;
        for d in decisions {
            let Some(st) = self.states.get_mut(&d.key) else {
                continue;
            };
            st.frame_index = d.frame_index;
            st.elapsed = d.elapsed;
            if d.frame_changed {
                self.pending.push(d.key);
                changed += 1;
            }
        }
        TickReport { visited, changed }
    }

    /// Pushes queued texture changes to the host. Returns how many were sent.
    pub fn apply_pending(&mut self, host: &mut dyn TileNodeHost) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_unstable();
        pending.dedup();
        let mut applied = 0;
        for key in pending {
            let (Some(st), Some(inst)) = (self.states.get(&key), self.instances.get_mut(&key)) else {
                continue;
            };
            let gid = st.current_gid();
            if inst.shown_gid != gid {
                host.set_node_texture(inst.node, gid);
                inst.shown_gid = gid;
                applied += 1;
            }
        }
        applied
    }

    /// One frame: decide, then apply on this thread. Idle in Actions mode.
    pub fn tick(&mut self, map: &Map, dt: f64, host: &mut dyn TileNodeHost) -> TickReport {
        let mut report = self.decide_tick(map, dt);
        report.changed = self.apply_pending(host);
        trace!("tick {:?}: visited {} changed {}", self.mode, report.visited, report.changed);
        report
    }
}

fn find_layer(map: &Map, id: LayerId) -> Option<(usize, &TileLayer)> {
    map.tile_layers().into_iter().enumerate().find(|(_, l)| l.id == id)
}

fn layer_speeds(map: &Map) -> AHashMap<LayerId, f64> {
    map.tile_layers().into_iter().map(|l| (l.id, l.speed)).collect()
}
