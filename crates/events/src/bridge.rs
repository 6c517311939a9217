use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use vectormap_common::{CameraPosition, GestureType, LabelId, OverlayKind};
use vectormap_engine::{EngineError, EngineEventSink, MapEvent};

use crate::listeners::{LabelClickSlot, MapEventListeners};

/// A property that could not be applied to its native object during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    /// Declared identity of the failing scene node.
    pub node: String,
    pub property: &'static str,
    pub error: EngineError,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.node, self.property, self.error)
    }
}

/// Non-declared observer of camera motion, such as the camera controller.
///
/// Unlike the declared slots it is installed once and survives passes.
pub trait CameraMoveObserver: Send + Sync {
    fn move_started(&self, gesture: GestureType);

    fn move_ended(&self, position: CameraPosition, gesture: GestureType);
}

enum Pending {
    Native(MapEvent),
    Failure(ApplyFailure),
}

#[derive(Default)]
struct BridgeState {
    listeners: MapEventListeners,
    label_slots: HashMap<LabelId, LabelClickSlot>,
    camera_observer: Option<Arc<dyn CameraMoveObserver>>,
    hold_depth: usize,
    held: Vec<Pending>,
}

/// Routes native events to the current listener slots.
///
/// The bridge never calls a slot while holding its own lock, so slots may
/// re-point the bridge or declare a new pass from inside a callback.
#[derive(Default)]
pub struct EventBridge {
    state: Mutex<BridgeState>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-point all declared slots.
    pub fn set_listeners(&self, listeners: MapEventListeners) {
        self.lock().listeners = listeners;
    }

    pub fn set_camera_observer(&self, observer: Option<Arc<dyn CameraMoveObserver>>) {
        self.lock().camera_observer = observer;
    }

    pub fn set_label_slot(&self, id: LabelId, slot: LabelClickSlot) {
        self.lock().label_slots.insert(id, slot);
    }

    pub fn clear_label_slot(&self, id: &LabelId) {
        self.lock().label_slots.remove(id);
    }

    pub fn label_slot_count(&self) -> usize {
        self.lock().label_slots.len()
    }

    /// Start buffering events. Holds nest; delivery resumes when the
    /// outermost hold is released.
    pub fn hold(&self) {
        self.lock().hold_depth += 1;
    }

    /// Release one hold. Returns how many buffered items were delivered.
    pub fn release(&self) -> usize {
        let held = {
            let mut state = self.lock();
            state.hold_depth = state.hold_depth.saturating_sub(1);
            if state.hold_depth > 0 {
                return 0;
            }
            std::mem::take(&mut state.held)
        };
        let n = held.len();
        for item in held {
            match item {
                Pending::Native(event) => self.deliver(event),
                Pending::Failure(failure) => self.deliver_failure(failure),
            }
        }
        if n > 0 {
            tracing::debug!(delivered = n, "flushed held events");
        }
        n
    }

    pub fn is_held(&self) -> bool {
        self.lock().hold_depth > 0
    }

    /// Surface a per-node apply failure through the error slot.
    pub fn report_failure(&self, failure: ApplyFailure) {
        tracing::warn!(%failure, "scene property apply failed");
        {
            let mut state = self.lock();
            if state.hold_depth > 0 {
                state.held.push(Pending::Failure(failure));
                return;
            }
        }
        self.deliver_failure(failure);
    }

    /// Entry point for native events.
    pub fn dispatch(&self, event: MapEvent) {
        {
            let mut state = self.lock();
            if state.hold_depth > 0 {
                tracing::trace!(?event, "event held until pass completes");
                state.held.push(Pending::Native(event));
                return;
            }
        }
        self.deliver(event);
    }

    fn deliver_failure(&self, failure: ApplyFailure) {
        let slot = self.lock().listeners.on_apply_error.clone();
        slot(&failure);
    }

    fn deliver(&self, event: MapEvent) {
        let (listeners, observer, label_slot) = {
            let state = self.lock();
            let label_slot = match &event {
                MapEvent::LabelClicked(id) => state.label_slots.get(id).cloned(),
                _ => None,
            };
            (
                state.listeners.clone(),
                state.camera_observer.clone(),
                label_slot,
            )
        };
        match event {
            MapEvent::MapClicked(position) => (listeners.on_map_click)(position),
            MapEvent::CompassClicked => {
                (listeners.on_compass_click)();
                (listeners.on_overlay_click)("compass", OverlayKind::Compass);
            }
            MapEvent::PoiClicked {
                position,
                poi_type,
                poi_id,
            } => {
                (listeners.on_poi_click)(position, &poi_type, &poi_id);
                (listeners.on_overlay_click)(&poi_id, OverlayKind::Poi);
            }
            MapEvent::TerrainClicked(position) => (listeners.on_terrain_click)(position),
            MapEvent::LabelClicked(id) => {
                if let Some(slot) = label_slot {
                    slot(&id);
                }
                (listeners.on_overlay_click)(&id.0, OverlayKind::Label);
            }
            MapEvent::CameraMoveStarted(gesture) => {
                if let Some(observer) = observer {
                    observer.move_started(gesture);
                }
                (listeners.on_camera_move_start)(gesture);
            }
            MapEvent::CameraMoveEnded(position, gesture) => {
                if let Some(observer) = observer {
                    observer.move_ended(position, gesture);
                }
                (listeners.on_camera_move_end)(position, gesture);
            }
            MapEvent::PaddingChanged => (listeners.on_padding_change)(),
            MapEvent::ViewInfoChanged(info) => (listeners.on_view_info_change)(&info),
        }
    }
}

impl EngineEventSink for EventBridge {
    fn on_event(&self, event: MapEvent) {
        self.dispatch(event);
    }
}
