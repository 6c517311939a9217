use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use vectormap_common::{
    ArgbColor, DimScreenCover, GestureType, LabelId, LatLng, MapPadding, MapStyle, OverlayKey,
    PoiLanguage, WidgetPosition,
};
use vectormap_engine::{IconImage, LabelTransition, TransformMethod};
use vectormap_events::LabelClickSlot;

/// Default values for declared labels.
pub struct LabelDefaults;

impl LabelDefaults {
    pub const MIN_ZOOM: i32 = 0;
    pub const MOVE_DURATION_MS: u32 = 300;
    pub const ROTATE_DURATION_MS: u32 = 500;
    pub const ANCHOR: Vec2 = Vec2::new(0.5, 0.5);
}

/// Map-wide view settings declared on every pass.
///
/// A widget position of `None` leaves the engine's placement untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapProperties {
    pub padding: MapPadding,
    pub style: MapStyle,
    pub camera_animate_enabled: bool,
    pub tracking_rotation: bool,
    pub logo_position: Option<WidgetPosition>,
    pub compass_position: Option<WidgetPosition>,
    pub compass_visible: bool,
    pub compass_back_to_north_on_click: bool,
    pub scale_bar_position: Option<WidgetPosition>,
    pub scale_bar_visible: bool,
    pub scale_bar_auto_hide: bool,
    pub poi_visible: bool,
    pub poi_clickable: bool,
    pub poi_language: PoiLanguage,
    pub poi_scale: f32,
    pub building_height_scale: f32,
    /// Gestures that rotate/zoom around the fixed screen center. Every other
    /// gesture is set non-fixed.
    pub fixed_center_gestures: BTreeSet<GestureType>,
    pub dim_screen_cover: DimScreenCover,
    pub dim_screen_color: ArgbColor,
}

impl Default for MapProperties {
    fn default() -> Self {
        Self {
            padding: MapPadding::NONE,
            style: MapStyle::Normal,
            camera_animate_enabled: true,
            tracking_rotation: false,
            logo_position: None,
            compass_position: None,
            compass_visible: true,
            compass_back_to_north_on_click: true,
            scale_bar_position: None,
            scale_bar_visible: false,
            scale_bar_auto_hide: true,
            poi_visible: true,
            poi_clickable: true,
            poi_language: PoiLanguage::Korean,
            poi_scale: 1.0,
            building_height_scale: 1.0,
            fixed_center_gestures: BTreeSet::new(),
            dim_screen_cover: DimScreenCover::None,
            dim_screen_color: ArgbColor::TRANSPARENT,
        }
    }
}

/// Icon rendered from a nested sub-scene.
///
/// Rendering is expensive, so identity is the declared `content_id` plus the
/// target size: the renderer runs again only when one of those changes.
#[derive(Clone)]
pub struct ComposedIcon {
    pub content_id: String,
    pub width: u32,
    pub height: u32,
    pub render: Arc<dyn Fn(u32, u32) -> IconImage + Send + Sync>,
}

impl ComposedIcon {
    pub fn new(
        content_id: impl Into<String>,
        width: u32,
        height: u32,
        render: impl Fn(u32, u32) -> IconImage + Send + Sync + 'static,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            width,
            height,
            render: Arc::new(render),
        }
    }
}

impl PartialEq for ComposedIcon {
    fn eq(&self, other: &Self) -> bool {
        self.content_id == other.content_id
            && self.width == other.width
            && self.height == other.height
    }
}

impl fmt::Debug for ComposedIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedIcon")
            .field("content_id", &self.content_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Where a label's icon comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelIcon {
    /// Engine-bundled image resource.
    Resource(u32),
    #[serde(skip)]
    Bitmap(IconImage),
    #[serde(skip)]
    Composed(ComposedIcon),
}

/// Declared properties of one label overlay.
#[derive(Clone, Serialize, Deserialize)]
pub struct LabelProps {
    pub position: LatLng,
    pub icon: LabelIcon,
    #[serde(default = "default_anchor")]
    pub anchor: Vec2,
    /// Clockwise rotation of the icon, in radians.
    #[serde(default)]
    pub rotate: f32,
    /// Native label id. Generated when not declared.
    #[serde(default)]
    pub label_id: Option<LabelId>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub rank: i64,
    #[serde(default)]
    pub transition: LabelTransition,
    #[serde(default)]
    pub transform: TransformMethod,
    #[serde(default = "default_true")]
    pub enable_animate_move: bool,
    #[serde(default = "default_move_duration")]
    pub animate_move_duration_ms: u32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub clickable: bool,
    #[serde(default = "default_true")]
    pub apply_dp_scale: bool,
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub min_zoom: i32,
    #[serde(skip)]
    pub on_click: Option<LabelClickSlot>,
}

fn default_anchor() -> Vec2 {
    LabelDefaults::ANCHOR
}

fn default_true() -> bool {
    true
}

fn default_move_duration() -> u32 {
    LabelDefaults::MOVE_DURATION_MS
}

impl LabelProps {
    pub fn new(position: LatLng, icon: LabelIcon) -> Self {
        Self {
            position,
            icon,
            anchor: LabelDefaults::ANCHOR,
            rotate: 0.0,
            label_id: None,
            tag: None,
            rank: 0,
            transition: LabelTransition::default(),
            transform: TransformMethod::default(),
            enable_animate_move: true,
            animate_move_duration_ms: LabelDefaults::MOVE_DURATION_MS,
            visible: true,
            clickable: true,
            apply_dp_scale: true,
            tracking: false,
            min_zoom: LabelDefaults::MIN_ZOOM,
            on_click: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.label_id = Some(LabelId(id.into()));
        self
    }

    pub fn with_click(mut self, f: impl Fn(&LabelId) + Send + Sync + 'static) -> Self {
        self.on_click = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LabelProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelProps")
            .field("position", &self.position)
            .field("icon", &self.icon)
            .field("label_id", &self.label_id)
            .field("rank", &self.rank)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

/// One declared overlay, keyed by its stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayDecl {
    pub key: OverlayKey,
    pub label: LabelProps,
}

/// A whole scene: map properties plus the ordered overlay list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDeclaration {
    pub properties: MapProperties,
    pub overlays: Vec<OverlayDecl>,
}

impl SceneDeclaration {
    pub fn with_label(mut self, key: impl Into<String>, label: LabelProps) -> Self {
        self.overlays.push(OverlayDecl {
            key: OverlayKey(key.into()),
            label,
        });
        self
    }
}
