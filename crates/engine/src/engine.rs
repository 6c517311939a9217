use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vectormap_common::{
    ArgbColor, CameraAnimation, CameraPosition, CameraUpdate, DimScreenCover, GestureType,
    LabelId, LatLng, MapPadding, MapStyle, MapWidget, PoiLanguage, WidgetPosition,
};

/// Failure reported by the engine itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("engine rejected {call}: {reason}")]
    Rejected { call: &'static str, reason: String },
    #[error("label {0} is not on the map")]
    UnknownLabel(LabelId),
    #[error("engine failed: {0}")]
    Native(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Called exactly once by the engine when an animated move finishes or fails.
pub type MoveCompletion = Box<dyn FnOnce(EngineResult<()>) + Send + 'static>;

/// A single map-wide setting that the engine applies natively.
#[derive(Debug, Clone, PartialEq)]
pub enum MapSetting {
    Padding(MapPadding),
    Style(MapStyle),
    CameraAnimateEnabled(bool),
    TrackingRotation(bool),
    WidgetPosition(MapWidget, WidgetPosition),
    WidgetVisible(MapWidget, bool),
    CompassBackToNorthOnClick(bool),
    ScaleBarAutoHide(bool),
    PoiVisible(bool),
    PoiClickable(bool),
    PoiLanguage(PoiLanguage),
    PoiScale(f32),
    BuildingHeightScale(f32),
    /// Marks `gestures` as rotating around the fixed screen center (or not).
    FixedCenter { fixed: bool, gestures: Vec<GestureType> },
    DimScreenCover(DimScreenCover),
    DimScreenColor(ArgbColor),
}

/// Handle to a label style registered with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(pub u64);

/// Rasterized icon image, RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl IconImage {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }
}

/// Icon content of a label style, already resolved to something the engine draws.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleIcon {
    Resource(u32),
    Image(IconImage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transition {
    None,
    #[default]
    Alpha,
    Scale,
}

/// Entrance and exit transitions of a label icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelTransition {
    pub entrance: Transition,
    pub exit: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformMethod {
    #[default]
    Default,
    AbsoluteRotation,
    Decal,
    AbsoluteRotationDecal,
}

/// Everything the engine needs to register a label style.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyleSpec {
    pub icon: StyleIcon,
    pub apply_dp_scale: bool,
    /// Icon point pinned to the label position, (0,0) top-left to (1,1) bottom-right.
    pub anchor: Vec2,
    pub min_zoom: i32,
    pub transition: LabelTransition,
}

/// Initial options for a label added to the label layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelOptions {
    pub id: LabelId,
    pub position: LatLng,
    pub style: StyleId,
    pub tag: Option<String>,
    pub rank: i64,
    pub transform: TransformMethod,
    pub clickable: bool,
    pub visible: bool,
}

/// Incremental change to a live label.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelChange {
    /// `duration_ms: None` moves instantly.
    MoveTo { position: LatLng, duration_ms: Option<u32> },
    RotateTo { angle: f32, duration_ms: Option<u32> },
    Style(StyleId),
    Rank(i64),
    Tag(String),
    Visible(bool),
    Clickable(bool),
    Tracking(bool),
}

/// Information the engine reports when the map view is reconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapViewInfo {
    pub view_name: String,
    pub style: MapStyle,
}

/// Native event raised by the engine, usually on its own callback thread.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    MapClicked(LatLng),
    CompassClicked,
    PoiClicked {
        position: LatLng,
        poi_type: String,
        poi_id: String,
    },
    TerrainClicked(LatLng),
    LabelClicked(LabelId),
    CameraMoveStarted(GestureType),
    CameraMoveEnded(CameraPosition, GestureType),
    PaddingChanged,
    ViewInfoChanged(MapViewInfo),
}

/// Receiver of native events. Installed on the engine by the binding layer.
pub trait EngineEventSink: Send + Sync {
    fn on_event(&self, event: MapEvent);
}

/// Capability surface of a live map engine.
///
/// Implementations must tolerate calls from any thread. None of these methods
/// may call back into the caller synchronously except through the installed
/// [`EngineEventSink`].
pub trait MapEngine: Send + Sync {
    fn camera_position(&self) -> CameraPosition;

    fn min_zoom_level(&self) -> i32;

    fn max_zoom_level(&self) -> i32;

    fn zoom_level(&self) -> i32;

    /// Move the camera without animation.
    fn move_camera(&self, update: &CameraUpdate) -> EngineResult<()>;

    /// Start an animated move. `on_done` fires once when the move settles.
    ///
    /// The engine offers no way to stop a running animation; a later move
    /// simply takes over the camera.
    fn animate_camera(
        &self,
        update: &CameraUpdate,
        animation: &CameraAnimation,
        on_done: MoveCompletion,
    ) -> EngineResult<()>;

    fn apply_setting(&self, setting: &MapSetting) -> EngineResult<()>;

    fn create_label_style(&self, spec: &LabelStyleSpec) -> EngineResult<StyleId>;

    /// Release a style and any image it owns.
    fn release_label_style(&self, style: StyleId);

    fn add_label(&self, options: &LabelOptions) -> EngineResult<()>;

    fn update_label(&self, id: &LabelId, change: &LabelChange) -> EngineResult<()>;

    fn remove_label(&self, id: &LabelId);

    /// Install (or clear) the receiver of native events.
    fn set_event_sink(&self, sink: Option<Arc<dyn EngineEventSink>>);
}
