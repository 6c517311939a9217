//! Shared value types for the vectormap binding layer.
//!
//! # Invariants
//! - Every type here is a plain value: no interior mutability, no engine handles.
//! - Camera values are immutable; a move produces a new [`CameraPosition`].

pub mod camera;
pub mod settings;
pub mod types;

pub use camera::{CameraAnimation, CameraDefaults, CameraPosition, CameraUpdate};
pub use settings::{
    ArgbColor, DimScreenCover, MapDirection, MapPadding, MapStyle, MapWidget, PoiLanguage,
    WidgetPosition,
};
pub use types::{GestureType, LabelId, LatLng, OverlayKey, OverlayKind};
