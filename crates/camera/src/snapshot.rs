use serde::{Deserialize, Serialize};
use vectormap_common::{CameraPosition, LatLng};

/// Saved camera state, restored across process restarts.
///
/// The field names are the external wire names, so the JSON form reads
/// `{"latitude":..,"longitude":..,"zoomLevel":..,"tiltAngle":..,"rotationAngle":..,"height":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom_level: i32,
    pub tilt_angle: f64,
    pub rotation_angle: f64,
    pub height: f64,
}

impl From<CameraPosition> for CameraSnapshot {
    fn from(p: CameraPosition) -> Self {
        Self {
            latitude: p.target.latitude,
            longitude: p.target.longitude,
            zoom_level: p.zoom_level,
            tilt_angle: p.tilt_angle,
            rotation_angle: p.rotation_angle,
            height: p.height,
        }
    }
}

impl From<CameraSnapshot> for CameraPosition {
    fn from(s: CameraSnapshot) -> Self {
        Self {
            target: LatLng::new(s.latitude, s.longitude),
            zoom_level: s.zoom_level,
            tilt_angle: s.tilt_angle,
            rotation_angle: s.rotation_angle,
            height: s.height,
        }
    }
}
