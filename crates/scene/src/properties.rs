use std::collections::BTreeSet;
use vectormap_common::{
    ArgbColor, DimScreenCover, GestureType, MapPadding, MapStyle, MapWidget, PoiLanguage,
    WidgetPosition,
};
use vectormap_engine::MapSetting;

use crate::apply::{Applier, sync};
use crate::declaration::MapProperties;

/// Mirror of the map-wide settings: one snapshot slot per tracked property.
///
/// Empty slots mean "never applied", so the first pass applies everything.
#[derive(Debug, Default)]
pub(crate) struct PropertiesNode {
    padding: Option<MapPadding>,
    style: Option<MapStyle>,
    camera_animate_enabled: Option<bool>,
    tracking_rotation: Option<bool>,
    logo_position: Option<Option<WidgetPosition>>,
    compass_position: Option<Option<WidgetPosition>>,
    compass_visible: Option<bool>,
    compass_back_to_north_on_click: Option<bool>,
    scale_bar_position: Option<Option<WidgetPosition>>,
    scale_bar_visible: Option<bool>,
    scale_bar_auto_hide: Option<bool>,
    poi_visible: Option<bool>,
    poi_clickable: Option<bool>,
    poi_language: Option<PoiLanguage>,
    poi_scale: Option<f32>,
    building_height_scale: Option<f32>,
    // Fixed-center is two native calls, one snapshot per half.
    free_gestures: Option<Vec<GestureType>>,
    fixed_gestures: Option<Vec<GestureType>>,
    dim_screen_cover: Option<DimScreenCover>,
    dim_screen_color: Option<ArgbColor>,
}

fn widget_position(widget: MapWidget, position: &Option<WidgetPosition>) -> Vec<MapSetting> {
    position
        .map(|p| vec![MapSetting::WidgetPosition(widget, p)])
        .unwrap_or_default()
}

/// Split gestures into the (non-fixed, fixed) groups of a fixed-center set.
fn gesture_groups(fixed: &BTreeSet<GestureType>) -> (Vec<GestureType>, Vec<GestureType>) {
    GestureType::ALL.into_iter().partition(|g| !fixed.contains(g))
}

fn fixed_center(fixed: bool, gestures: &[GestureType]) -> Vec<MapSetting> {
    if gestures.is_empty() {
        return Vec::new();
    }
    vec![MapSetting::FixedCenter {
        fixed,
        gestures: gestures.to_vec(),
    }]
}

impl PropertiesNode {
    pub fn update(&mut self, props: &MapProperties, a: &mut Applier<'_>) {
        sync(&mut self.padding, &props.padding, "padding", |v| {
            a.settings("padding", &[MapSetting::Padding(*v)])
        });
        sync(&mut self.style, &props.style, "style", |v| {
            a.settings("style", &[MapSetting::Style(*v)])
        });
        sync(
            &mut self.camera_animate_enabled,
            &props.camera_animate_enabled,
            "camera_animate_enabled",
            |v| a.settings("camera_animate_enabled", &[MapSetting::CameraAnimateEnabled(*v)]),
        );
        sync(
            &mut self.tracking_rotation,
            &props.tracking_rotation,
            "tracking_rotation",
            |v| a.settings("tracking_rotation", &[MapSetting::TrackingRotation(*v)]),
        );
        sync(&mut self.logo_position, &props.logo_position, "logo_position", |v| {
            a.settings("logo_position", &widget_position(MapWidget::Logo, v))
        });
        sync(
            &mut self.compass_position,
            &props.compass_position,
            "compass_position",
            |v| a.settings("compass_position", &widget_position(MapWidget::Compass, v)),
        );
        sync(&mut self.compass_visible, &props.compass_visible, "compass_visible", |v| {
            a.settings(
                "compass_visible",
                &[MapSetting::WidgetVisible(MapWidget::Compass, *v)],
            )
        });
        sync(
            &mut self.compass_back_to_north_on_click,
            &props.compass_back_to_north_on_click,
            "compass_back_to_north_on_click",
            |v| {
                a.settings(
                    "compass_back_to_north_on_click",
                    &[MapSetting::CompassBackToNorthOnClick(*v)],
                )
            },
        );
        sync(
            &mut self.scale_bar_position,
            &props.scale_bar_position,
            "scale_bar_position",
            |v| a.settings("scale_bar_position", &widget_position(MapWidget::ScaleBar, v)),
        );
        sync(
            &mut self.scale_bar_visible,
            &props.scale_bar_visible,
            "scale_bar_visible",
            |v| {
                a.settings(
                    "scale_bar_visible",
                    &[MapSetting::WidgetVisible(MapWidget::ScaleBar, *v)],
                )
            },
        );
        sync(
            &mut self.scale_bar_auto_hide,
            &props.scale_bar_auto_hide,
            "scale_bar_auto_hide",
            |v| a.settings("scale_bar_auto_hide", &[MapSetting::ScaleBarAutoHide(*v)]),
        );
        sync(&mut self.poi_visible, &props.poi_visible, "poi_visible", |v| {
            a.settings("poi_visible", &[MapSetting::PoiVisible(*v)])
        });
        sync(&mut self.poi_clickable, &props.poi_clickable, "poi_clickable", |v| {
            a.settings("poi_clickable", &[MapSetting::PoiClickable(*v)])
        });
        sync(&mut self.poi_language, &props.poi_language, "poi_language", |v| {
            a.settings("poi_language", &[MapSetting::PoiLanguage(*v)])
        });
        sync(&mut self.poi_scale, &props.poi_scale, "poi_scale", |v| {
            a.settings("poi_scale", &[MapSetting::PoiScale(*v)])
        });
        sync(
            &mut self.building_height_scale,
            &props.building_height_scale,
            "building_height_scale",
            |v| a.settings("building_height_scale", &[MapSetting::BuildingHeightScale(*v)]),
        );
        // Non-fixed gestures first, then the fixed ones.
        let (free, fixed) = gesture_groups(&props.fixed_center_gestures);
        sync(&mut self.free_gestures, &free, "fixed_center_gestures", |v| {
            a.settings("fixed_center_gestures", &fixed_center(false, v))
        });
        sync(&mut self.fixed_gestures, &fixed, "fixed_center_gestures", |v| {
            a.settings("fixed_center_gestures", &fixed_center(true, v))
        });
        sync(
            &mut self.dim_screen_cover,
            &props.dim_screen_cover,
            "dim_screen_cover",
            |v| a.settings("dim_screen_cover", &[MapSetting::DimScreenCover(*v)]),
        );
        sync(
            &mut self.dim_screen_color,
            &props.dim_screen_color,
            "dim_screen_color",
            |v| a.settings("dim_screen_color", &[MapSetting::DimScreenColor(*v)]),
        );
    }
}
