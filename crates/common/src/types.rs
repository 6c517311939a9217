use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A geographic coordinate in degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Native identifier of a label overlay inside the engine's label layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    /// Generate a fresh, unique label id for labels declared without one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable declared identity of an overlay in the scene declaration.
///
/// Two declarations with the same key in consecutive passes refer to the same
/// scene node; the key is unrelated to the engine's own [`LabelId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayKey(pub String);

impl From<&str> for OverlayKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for OverlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of clickable construct reported by overlay-clicked events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    Label,
    Poi,
    Compass,
}

/// Gesture that caused a camera move, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GestureType {
    OneFingerDoubleTap,
    TwoFingerSingleTap,
    Pan,
    Rotate,
    Zoom,
    Tilt,
    LongTapAndDrag,
    RotateZoom,
    OneFingerZoom,
    /// Programmatic move or a gesture the engine could not classify.
    Unknown,
}

impl GestureType {
    /// Every gesture the engine can report, in declaration order.
    pub const ALL: [GestureType; 10] = [
        GestureType::OneFingerDoubleTap,
        GestureType::TwoFingerSingleTap,
        GestureType::Pan,
        GestureType::Rotate,
        GestureType::Zoom,
        GestureType::Tilt,
        GestureType::LongTapAndDrag,
        GestureType::RotateZoom,
        GestureType::OneFingerZoom,
        GestureType::Unknown,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_label_ids_are_unique() {
        let a = LabelId::generate();
        let b = LabelId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn overlay_key_from_str() {
        let key = OverlayKey::from("home");
        assert_eq!(key.to_string(), "home");
    }

    #[test]
    fn gesture_list_has_no_duplicates() {
        let mut all = GestureType::ALL.to_vec();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), GestureType::ALL.len());
    }
}
