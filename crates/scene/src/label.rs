use glam::Vec2;
use vectormap_common::{LabelId, LatLng, OverlayKey};
use vectormap_engine::{
    EngineError, IconImage, LabelChange, LabelOptions, LabelStyleSpec, LabelTransition,
    MapEngine, StyleIcon, StyleId,
};
use vectormap_events::{EventBridge, LabelClickSlot};

use crate::apply::{Applier, sync};
use crate::declaration::{ComposedIcon, LabelDefaults, LabelIcon, LabelProps};

/// Declared inputs a label style is derived from.
///
/// A style is rebuilt only when this group changes as a whole.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StyleGroup {
    icon: LabelIcon,
    apply_dp_scale: bool,
    anchor: Vec2,
    min_zoom: i32,
    transition: LabelTransition,
}

impl StyleGroup {
    pub fn of(props: &LabelProps) -> Self {
        Self {
            icon: props.icon.clone(),
            apply_dp_scale: props.apply_dp_scale,
            anchor: props.anchor,
            min_zoom: props.min_zoom,
            transition: props.transition,
        }
    }

    fn resolve(&self) -> LabelStyleSpec {
        let icon = match &self.icon {
            LabelIcon::Resource(id) => StyleIcon::Resource(*id),
            LabelIcon::Bitmap(image) => StyleIcon::Image(image.clone()),
            LabelIcon::Composed(composed) => StyleIcon::Image(render(composed)),
        };
        LabelStyleSpec {
            icon,
            apply_dp_scale: self.apply_dp_scale,
            anchor: self.anchor,
            min_zoom: self.min_zoom,
            transition: self.transition,
        }
    }

    fn register(&self, engine: &dyn MapEngine) -> Result<StyleId, EngineError> {
        engine.create_label_style(&self.resolve())
    }
}

fn render(composed: &ComposedIcon) -> IconImage {
    tracing::debug!(content = %composed.content_id, "rendering composed label icon");
    (composed.render)(composed.width, composed.height)
}

/// Native mirror of one declared label.
pub(crate) struct LabelNode {
    pub key: OverlayKey,
    pub id: LabelId,
    style: StyleId,
    group: Option<StyleGroup>,
    position: Option<LatLng>,
    rotate: Option<f32>,
    tracking: Option<bool>,
    tag: Option<String>,
    rank: Option<i64>,
    visible: Option<bool>,
    clickable: Option<bool>,
}

impl LabelNode {
    /// Register the style and add the label, passing the declared values as
    /// initial options.
    pub fn create(
        key: OverlayKey,
        props: &LabelProps,
        a: &mut Applier<'_>,
        bridge: &EventBridge,
    ) -> Result<Self, EngineError> {
        let group = StyleGroup::of(props);
        let style = group.register(a.engine)?;
        let id = props.label_id.clone().unwrap_or_else(LabelId::generate);
        let options = LabelOptions {
            id: id.clone(),
            position: props.position,
            style,
            tag: props.tag.clone(),
            rank: props.rank,
            transform: props.transform,
            clickable: props.clickable,
            visible: props.visible,
        };
        if let Err(error) = a.engine.add_label(&options) {
            a.engine.release_label_style(style);
            return Err(error);
        }
        tracing::debug!(%key, %id, "label added");

        let mut node = Self {
            key,
            id,
            style,
            group: Some(group),
            position: Some(props.position),
            rotate: Some(0.0),
            tracking: Some(false),
            tag: props.tag.clone(),
            rank: Some(props.rank),
            visible: Some(props.visible),
            clickable: Some(props.clickable),
        };
        if props.tracking {
            sync(&mut node.tracking, &true, "tracking", |_| {
                a.label("tracking", &node.id, LabelChange::Tracking(true))
            });
        }
        if props.rotate != 0.0 {
            let angle = props.rotate;
            let id = node.id.clone();
            sync(&mut node.rotate, &angle, "rotate", |v| {
                a.label(
                    "rotate",
                    &id,
                    LabelChange::RotateTo {
                        angle: *v,
                        duration_ms: None,
                    },
                )
            });
        }
        node.set_click_slot(props.on_click.clone(), bridge);
        Ok(node)
    }

    fn set_click_slot(&self, slot: Option<LabelClickSlot>, bridge: &EventBridge) {
        match slot {
            Some(slot) => bridge.set_label_slot(self.id.clone(), slot),
            None => bridge.clear_label_slot(&self.id),
        }
    }

    /// Whether `props` names a different native label than this node mirrors.
    pub fn needs_replacement(&self, props: &LabelProps) -> bool {
        props.label_id.as_ref().is_some_and(|id| *id != self.id)
    }

    pub fn update(&mut self, props: &LabelProps, a: &mut Applier<'_>, bridge: &EventBridge) {
        self.set_click_slot(props.on_click.clone(), bridge);
        let id = self.id.clone();

        let group = StyleGroup::of(props);
        if self.group.as_ref() != Some(&group) {
            self.restyle(group, a);
        }

        let move_duration = props
            .enable_animate_move
            .then_some(props.animate_move_duration_ms);
        sync(&mut self.position, &props.position, "position", |v| {
            a.label(
                "position",
                &id,
                LabelChange::MoveTo {
                    position: *v,
                    duration_ms: move_duration,
                },
            )
        });
        sync(&mut self.rotate, &props.rotate, "rotate", |v| {
            a.label(
                "rotate",
                &id,
                LabelChange::RotateTo {
                    angle: *v,
                    duration_ms: Some(LabelDefaults::ROTATE_DURATION_MS),
                },
            )
        });
        sync(&mut self.tracking, &props.tracking, "tracking", |v| {
            a.label("tracking", &id, LabelChange::Tracking(*v))
        });
        // An undeclared tag keeps whatever the label carries.
        if let Some(tag) = &props.tag {
            let mut applied = self.tag.take();
            sync(&mut applied, tag, "tag", |v| {
                a.label("tag", &id, LabelChange::Tag(v.clone()))
            });
            self.tag = applied;
        }
        sync(&mut self.rank, &props.rank, "rank", |v| {
            a.label("rank", &id, LabelChange::Rank(*v))
        });
        sync(&mut self.visible, &props.visible, "visible", |v| {
            a.label("visible", &id, LabelChange::Visible(*v))
        });
        sync(&mut self.clickable, &props.clickable, "clickable", |v| {
            a.label("clickable", &id, LabelChange::Clickable(*v))
        });
    }

    /// Build the new style, switch the label to it, then release the old one.
    fn restyle(&mut self, group: StyleGroup, a: &mut Applier<'_>) {
        let style = match group.register(a.engine) {
            Ok(style) => style,
            Err(error) => {
                a.fail("style", error);
                return;
            }
        };
        let id = self.id.clone();
        if !a.label("style", &id, LabelChange::Style(style)) {
            a.engine.release_label_style(style);
            return;
        }
        a.engine.release_label_style(self.style);
        tracing::debug!(key = %self.key, old = ?self.style, new = ?style, "label restyled");
        self.style = style;
        self.group = Some(group);
    }

    /// Remove the label and release everything the node owns.
    pub fn teardown(self, engine: &dyn MapEngine, bridge: &EventBridge) {
        bridge.clear_label_slot(&self.id);
        engine.remove_label(&self.id);
        engine.release_label_style(self.style);
        tracing::debug!(key = %self.key, id = %self.id, "label removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vectormap_engine::{NativeCall, RecordingEngine};

    fn props() -> LabelProps {
        LabelProps::new(LatLng::new(37.5, 127.0), LabelIcon::Resource(1)).with_id("pin")
    }

    fn create(engine: &RecordingEngine, bridge: &EventBridge, props: &LabelProps) -> LabelNode {
        let mut a = Applier::new(engine, bridge, "label:pin".into());
        LabelNode::create(OverlayKey::from("pin"), props, &mut a, bridge).unwrap()
    }

    fn update(
        node: &mut LabelNode,
        engine: &RecordingEngine,
        bridge: &EventBridge,
        props: &LabelProps,
    ) -> usize {
        let mut a = Applier::new(engine, bridge, "label:pin".into());
        node.update(props, &mut a, bridge);
        a.applies
    }

    #[test]
    fn create_passes_initial_options() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let mut p = props();
        p.rank = 4;
        p.tag = Some("cafe".into());
        let node = create(&engine, &bridge, &p);

        let label = engine.label(&node.id).unwrap();
        assert_eq!(label.rank, 4);
        assert_eq!(label.tag.as_deref(), Some("cafe"));
        assert_eq!(engine.apply_count(), 0);
        assert_eq!(engine.live_style_count(), 1);
    }

    #[test]
    fn create_rotates_and_tracks_instantly() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let mut p = props();
        p.rotate = 1.25;
        p.tracking = true;
        let node = create(&engine, &bridge, &p);
        let label = engine.label(&node.id).unwrap();
        assert!(label.tracking);
        assert_eq!(label.rotation, 1.25);
        assert!(engine.calls().contains(&NativeCall::UpdateLabel(
            node.id.clone(),
            LabelChange::RotateTo {
                angle: 1.25,
                duration_ms: None
            }
        )));
    }

    #[test]
    fn generated_ids_are_unique() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let p = LabelProps::new(LatLng::default(), LabelIcon::Resource(1));
        let a = create(&engine, &bridge, &p);
        let b = create(&engine, &bridge, &p);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn identical_update_makes_no_calls() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let p = props();
        let mut node = create(&engine, &bridge, &p);
        engine.clear_calls();
        assert_eq!(update(&mut node, &engine, &bridge, &p), 0);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn move_uses_declared_animation() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let mut p = props();
        let mut node = create(&engine, &bridge, &p);
        engine.clear_calls();

        p.position = LatLng::new(37.6, 127.1);
        p.animate_move_duration_ms = 450;
        update(&mut node, &engine, &bridge, &p);
        p.position = LatLng::new(37.7, 127.2);
        p.enable_animate_move = false;
        update(&mut node, &engine, &bridge, &p);
        p.rotate = 0.5;
        update(&mut node, &engine, &bridge, &p);

        assert_eq!(
            engine.calls(),
            vec![
                NativeCall::UpdateLabel(
                    node.id.clone(),
                    LabelChange::MoveTo {
                        position: LatLng::new(37.6, 127.1),
                        duration_ms: Some(450)
                    }
                ),
                NativeCall::UpdateLabel(
                    node.id.clone(),
                    LabelChange::MoveTo {
                        position: LatLng::new(37.7, 127.2),
                        duration_ms: None
                    }
                ),
                NativeCall::UpdateLabel(
                    node.id.clone(),
                    LabelChange::RotateTo {
                        angle: 0.5,
                        duration_ms: Some(500)
                    }
                ),
            ]
        );
    }

    #[test]
    fn style_rebuilt_only_when_group_changes() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let renders = Arc::new(AtomicUsize::new(0));
        let r = renders.clone();
        let icon = ComposedIcon::new("badge", 24, 24, move |w, h| {
            r.fetch_add(1, Ordering::SeqCst);
            IconImage::solid(w, h, [255, 0, 0, 255])
        });
        let mut p = LabelProps::new(LatLng::default(), LabelIcon::Composed(icon.clone()));
        let mut node = create(&engine, &bridge, &p);
        let first_style = engine.label(&node.id).unwrap().style;

        // Unrelated changes leave the style alone.
        p.rank = 9;
        update(&mut node, &engine, &bridge, &p);
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        p.anchor = Vec2::new(0.5, 1.0);
        update(&mut node, &engine, &bridge, &p);
        assert_eq!(renders.load(Ordering::SeqCst), 2);

        let second_style = engine.label(&node.id).unwrap().style;
        assert_ne!(first_style, second_style);
        assert_eq!(engine.live_style_count(), 1);
        assert!(engine.style(first_style).is_none());
        assert_eq!(engine.style(second_style).unwrap().anchor, Vec2::new(0.5, 1.0));
    }

    #[test]
    fn failed_restyle_keeps_old_style() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let mut p = props();
        let mut node = create(&engine, &bridge, &p);
        let old = engine.label(&node.id).unwrap().style;

        engine.fail_label_updates(node.id.clone());
        p.icon = LabelIcon::Resource(2);
        let mut a = Applier::new(&engine, &bridge, "label:pin".into());
        node.update(&p, &mut a, &bridge);
        assert_eq!(a.failures, 1);
        assert_eq!(engine.label(&node.id).unwrap().style, old);
        assert_eq!(engine.live_style_count(), 1);
    }

    #[test]
    fn undeclared_tag_is_left_alone() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let mut p = props();
        p.tag = Some("a".into());
        let mut node = create(&engine, &bridge, &p);
        engine.clear_calls();
        p.tag = None;
        assert_eq!(update(&mut node, &engine, &bridge, &p), 0);
        p.tag = Some("b".into());
        assert_eq!(update(&mut node, &engine, &bridge, &p), 1);
        assert_eq!(engine.label(&node.id).unwrap().tag.as_deref(), Some("b"));
    }

    #[test]
    fn teardown_releases_resources() {
        let engine = RecordingEngine::new();
        let bridge = EventBridge::new();
        let p = props().with_click(|_| {});
        let node = create(&engine, &bridge, &p);
        assert_eq!(bridge.label_slot_count(), 1);
        node.teardown(&engine, &bridge);
        assert!(engine.label_ids().is_empty());
        assert_eq!(engine.live_style_count(), 0);
        assert_eq!(bridge.label_slot_count(), 0);
    }
}
