use crate::types::LatLng;
use serde::{Deserialize, Serialize};

/// Camera placement over the map.
///
/// Values are never mutated in place; [`CameraUpdate::apply_to`] returns a new
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub target: LatLng,
    pub zoom_level: i32,
    /// Tilt in radians.
    pub tilt_angle: f64,
    /// Rotation in radians, clockwise from north.
    pub rotation_angle: f64,
    /// Camera height above the target, in meters.
    pub height: f64,
}

impl CameraPosition {
    pub fn new(target: LatLng, zoom_level: i32) -> Self {
        Self {
            target,
            zoom_level,
            ..CameraDefaults::POSITION
        }
    }
}

impl Default for CameraPosition {
    fn default() -> Self {
        CameraDefaults::POSITION
    }
}

/// Static fallbacks used while no engine is bound.
pub struct CameraDefaults;

impl CameraDefaults {
    pub const MIN_ZOOM_LEVEL: i32 = 6;
    pub const MAX_ZOOM_LEVEL: i32 = 21;

    /// Seoul City Hall at street zoom, looking straight down.
    pub const POSITION: CameraPosition = CameraPosition {
        target: LatLng::new(37.566_680_5, 126.978_414_7),
        zoom_level: 15,
        tilt_angle: 0.0,
        rotation_angle: 0.0,
        height: 0.0,
    };
}

/// A camera move request, absolute or relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraUpdate {
    NewPosition(CameraPosition),
    NewCenter(LatLng),
    ZoomTo(i32),
    ZoomIn,
    ZoomOut,
    Tilt(f64),
    Rotate(f64),
}

impl CameraUpdate {
    /// Resolve this update against `from`, producing the target position.
    ///
    /// Zoom results are clamped to `[min_zoom, max_zoom]`.
    pub fn apply_to(&self, from: &CameraPosition, min_zoom: i32, max_zoom: i32) -> CameraPosition {
        let clamp = |z: i32| z.clamp(min_zoom, max_zoom);
        match *self {
            Self::NewPosition(p) => CameraPosition {
                zoom_level: clamp(p.zoom_level),
                ..p
            },
            Self::NewCenter(target) => CameraPosition { target, ..*from },
            Self::ZoomTo(z) => CameraPosition {
                zoom_level: clamp(z),
                ..*from
            },
            Self::ZoomIn => CameraPosition {
                zoom_level: clamp(from.zoom_level.saturating_add(1)),
                ..*from
            },
            Self::ZoomOut => CameraPosition {
                zoom_level: clamp(from.zoom_level.saturating_sub(1)),
                ..*from
            },
            Self::Tilt(tilt_angle) => CameraPosition {
                tilt_angle,
                ..*from
            },
            Self::Rotate(rotation_angle) => CameraPosition {
                rotation_angle,
                ..*from
            },
        }
    }
}

/// Animation parameters for an animated camera move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraAnimation {
    pub duration_ms: u32,
    /// Let the engine lift the camera mid-flight for long moves.
    pub auto_elevation: bool,
    /// Chain onto a running animation instead of restarting from rest.
    pub is_consecutive: bool,
}

impl CameraAnimation {
    pub fn from_millis(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            auto_elevation: false,
            is_consecutive: false,
        }
    }
}
