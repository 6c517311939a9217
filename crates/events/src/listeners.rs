use std::sync::Arc;
use vectormap_common::{CameraPosition, GestureType, LabelId, LatLng, OverlayKind};
use vectormap_engine::MapViewInfo;

use crate::bridge::ApplyFailure;

/// Click slot owned by one label node.
pub type LabelClickSlot = Arc<dyn Fn(&LabelId) + Send + Sync>;

/// Declared callback slots, replaced wholesale on every pass.
///
/// Every slot defaults to a no-op.
#[derive(Clone)]
pub struct MapEventListeners {
    pub on_map_click: Arc<dyn Fn(LatLng) + Send + Sync>,
    pub on_compass_click: Arc<dyn Fn() + Send + Sync>,
    /// Position, poi type, poi id.
    pub on_poi_click: Arc<dyn Fn(LatLng, &str, &str) + Send + Sync>,
    pub on_terrain_click: Arc<dyn Fn(LatLng) + Send + Sync>,
    /// Overlay id and kind; fires for labels, pois and the compass.
    pub on_overlay_click: Arc<dyn Fn(&str, OverlayKind) + Send + Sync>,
    pub on_camera_move_start: Arc<dyn Fn(GestureType) + Send + Sync>,
    pub on_camera_move_end: Arc<dyn Fn(CameraPosition, GestureType) + Send + Sync>,
    pub on_padding_change: Arc<dyn Fn() + Send + Sync>,
    pub on_view_info_change: Arc<dyn Fn(&MapViewInfo) + Send + Sync>,
    pub on_apply_error: Arc<dyn Fn(&ApplyFailure) + Send + Sync>,
}

impl Default for MapEventListeners {
    fn default() -> Self {
        Self {
            on_map_click: Arc::new(|_| {}),
            on_compass_click: Arc::new(|| {}),
            on_poi_click: Arc::new(|_, _, _| {}),
            on_terrain_click: Arc::new(|_| {}),
            on_overlay_click: Arc::new(|_, _| {}),
            on_camera_move_start: Arc::new(|_| {}),
            on_camera_move_end: Arc::new(|_, _| {}),
            on_padding_change: Arc::new(|| {}),
            on_view_info_change: Arc::new(|_| {}),
            on_apply_error: Arc::new(|_| {}),
        }
    }
}

impl MapEventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_map_click(mut self, f: impl Fn(LatLng) + Send + Sync + 'static) -> Self {
        self.on_map_click = Arc::new(f);
        self
    }

    pub fn on_compass_click(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_compass_click = Arc::new(f);
        self
    }

    pub fn on_poi_click(mut self, f: impl Fn(LatLng, &str, &str) + Send + Sync + 'static) -> Self {
        self.on_poi_click = Arc::new(f);
        self
    }

    pub fn on_terrain_click(mut self, f: impl Fn(LatLng) + Send + Sync + 'static) -> Self {
        self.on_terrain_click = Arc::new(f);
        self
    }

    pub fn on_overlay_click(mut self, f: impl Fn(&str, OverlayKind) + Send + Sync + 'static) -> Self {
        self.on_overlay_click = Arc::new(f);
        self
    }

    pub fn on_camera_move_start(mut self, f: impl Fn(GestureType) + Send + Sync + 'static) -> Self {
        self.on_camera_move_start = Arc::new(f);
        self
    }

    pub fn on_camera_move_end(
        mut self,
        f: impl Fn(CameraPosition, GestureType) + Send + Sync + 'static,
    ) -> Self {
        self.on_camera_move_end = Arc::new(f);
        self
    }

    pub fn on_padding_change(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_padding_change = Arc::new(f);
        self
    }

    pub fn on_view_info_change(mut self, f: impl Fn(&MapViewInfo) + Send + Sync + 'static) -> Self {
        self.on_view_info_change = Arc::new(f);
        self
    }

    pub fn on_apply_error(mut self, f: impl Fn(&ApplyFailure) + Send + Sync + 'static) -> Self {
        self.on_apply_error = Arc::new(f);
        self
    }
}

impl std::fmt::Debug for MapEventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEventListeners").finish_non_exhaustive()
    }
}
