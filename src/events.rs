//! Map change notifications.

use crate::config::{DebugDrawOptions, UpdateMode};
use crate::layer::LayerId;
use crate::spatial::index::{TileCell, TileCoordinate};
use crate::spatial::transform::RenderPoint;
use parking_lot::RwLock;

/// State changes pushed to registered observers.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A cell was written or cleared.
    TileChanged {
        /// Edited layer.
        layer: LayerId,
        /// Edited cell.
        coord: TileCoordinate,
        /// Cell before the edit.
        previous: Option<TileCell>,
        /// Cell after the edit.
        current: Option<TileCell>,
    },
    /// A tile layer moved.
    LayerOffsetChanged {
        /// Moved layer.
        layer: LayerId,
        /// New render-space offset.
        offset: RenderPoint,
    },
    /// Overlay switches changed.
    DebugOptionsChanged {
        /// `None` when every tile layer was updated.
        layer: Option<LayerId>,
        /// New switches.
        options: DebugDrawOptions,
    },
    /// A navigation graph replaced the previous one.
    GraphPublished {
        /// Layer the graph belongs to.
        layer: LayerId,
        /// Node count of the new graph.
        nodes: usize,
    },
    /// The scheduler switched modes.
    UpdateModeChanged {
        /// Previous mode.
        from: UpdateMode,
        /// New mode.
        to: UpdateMode,
    },
}

/// Callback invoked for every event.
pub type Observer = Box<dyn Fn(&MapEvent) + Send + Sync>;

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Explicitly registered callbacks, invoked synchronously in registration order.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    list: RwLock<Vec<(ObserverId, Observer)>>,
}

impl Observers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer at the end of the list.
    pub fn register(&mut self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.list.write().push((id, observer));
        id
    }

    /// `false` if `id` was not registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let mut list = self.list.write();
        let before = list.len();
        list.retain(|(oid, _)| *oid != id);
        list.len() != before
    }

    /// Calls every observer with `event`.
    pub fn emit(&self, event: &MapEvent) {
        for (_, observer) in self.list.read().iter() {
            observer(event);
        }
    }

    /// Registered observers.
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    /// `true` when nobody listens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("count", &self.len()).finish()
    }
}
