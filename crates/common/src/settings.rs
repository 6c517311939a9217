use serde::{Deserialize, Serialize};

/// Base map style selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapStyle {
    #[default]
    Normal,
    Skyview,
}

/// Language used for point-of-interest captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoiLanguage {
    #[default]
    Korean,
    English,
}

impl PoiLanguage {
    /// Language code understood by the engine.
    pub fn code(self) -> &'static str {
        match self {
            Self::Korean => "ko",
            Self::English => "en",
        }
    }
}

/// Map content padding in whole pixels, one value per edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapPadding {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl MapPadding {
    pub const NONE: MapPadding = MapPadding {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub fn uniform(px: i32) -> Self {
        Self {
            left: px,
            top: px,
            right: px,
            bottom: px,
        }
    }
}

/// On-screen widgets the engine draws over the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapWidget {
    Logo,
    Compass,
    ScaleBar,
}

/// Anchor edge/corner a widget is offset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapDirection {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

/// Widget placement: an anchor plus a pixel offset from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidgetPosition {
    pub direction: MapDirection,
    pub x_px: f32,
    pub y_px: f32,
}

impl WidgetPosition {
    pub fn new(direction: MapDirection, x_px: f32, y_px: f32) -> Self {
        Self {
            direction,
            x_px,
            y_px,
        }
    }
}

/// Which layers the dim screen covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DimScreenCover {
    #[default]
    None,
    Map,
    All,
}

/// Packed 0xAARRGGBB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArgbColor(pub u32);

impl ArgbColor {
    pub const TRANSPARENT: ArgbColor = ArgbColor(0);

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poi_language_codes() {
        assert_eq!(PoiLanguage::Korean.code(), "ko");
        assert_eq!(PoiLanguage::English.code(), "en");
    }

    #[test]
    fn uniform_padding() {
        let p = MapPadding::uniform(8);
        assert_eq!(p, MapPadding { left: 8, top: 8, right: 8, bottom: 8 });
        assert_ne!(p, MapPadding::NONE);
    }

    #[test]
    fn argb_alpha_channel() {
        assert_eq!(ArgbColor(0x80FF_0000).alpha(), 0x80);
        assert_eq!(ArgbColor::TRANSPARENT.alpha(), 0);
    }

    #[test]
    fn settings_deserialize_from_json() {
        let style: MapStyle = serde_json::from_str("\"Skyview\"").unwrap();
        assert_eq!(style, MapStyle::Skyview);
        let pos: WidgetPosition =
            serde_json::from_str(r#"{"direction":"TopRight","x_px":8.0,"y_px":100.0}"#).unwrap();
        assert_eq!(pos.direction, MapDirection::TopRight);
    }
}
