use crate::engine::{EngineError, MapEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vectormap_common::{CameraPosition, MapStyle};

/// Options handed to the native `start` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapInitialOptions {
    pub view_name: String,
    pub style: MapStyle,
    pub camera: CameraPosition,
    /// Zoom bounds the engine should enforce; `None` keeps the engine's own.
    pub zoom_bounds: Option<(i32, i32)>,
}

impl Default for MapInitialOptions {
    fn default() -> Self {
        Self {
            view_name: "openmap".into(),
            style: MapStyle::Normal,
            camera: CameraPosition::default(),
            zoom_bounds: None,
        }
    }
}

/// Receiver of native lifecycle reports for one engine handle.
pub trait NativeLifecycleSink: Send + Sync {
    fn ready(&self, engine: Arc<dyn MapEngine>);

    fn paused(&self);

    fn resumed(&self);

    fn destroyed(&self);

    fn error(&self, error: EngineError);
}

/// The native view that owns an engine instance.
///
/// `start` must be called at most once per view; the view reports the engine
/// and every later transition through the given sink.
pub trait MapView: Send + Sync {
    fn start(&self, options: &MapInitialOptions, sink: Arc<dyn NativeLifecycleSink>);

    fn pause(&self);

    fn resume(&self);

    fn finish(&self);
}
