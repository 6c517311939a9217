use crate::engine::{
    EngineError, EngineEventSink, EngineResult, LabelChange, LabelOptions, LabelStyleSpec,
    MapEngine, MapEvent, MapSetting, MoveCompletion, StyleId,
};
use crate::view::{MapInitialOptions, MapView, NativeLifecycleSink};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use vectormap_common::{
    CameraAnimation, CameraDefaults, CameraPosition, CameraUpdate, LabelId, LatLng,
};

/// One native call observed by a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    MoveCamera(CameraUpdate),
    AnimateCamera(CameraUpdate, CameraAnimation),
    Setting(MapSetting),
    CreateStyle(StyleId),
    ReleaseStyle(StyleId),
    AddLabel(LabelId),
    UpdateLabel(LabelId, LabelChange),
    RemoveLabel(LabelId),
}

impl NativeCall {
    /// Name of the [`MapEngine`] method that produced this call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveCamera(_) => "move_camera",
            Self::AnimateCamera(..) => "animate_camera",
            Self::Setting(_) => "apply_setting",
            Self::CreateStyle(_) => "create_label_style",
            Self::ReleaseStyle(_) => "release_label_style",
            Self::AddLabel(_) => "add_label",
            Self::UpdateLabel(..) => "update_label",
            Self::RemoveLabel(_) => "remove_label",
        }
    }

    /// Whether this call mutates a property of an existing native object.
    pub fn is_property_apply(&self) -> bool {
        matches!(self, Self::Setting(_) | Self::UpdateLabel(..))
    }
}

/// Current native state of a label on a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLabel {
    pub position: LatLng,
    pub rotation: f32,
    pub style: StyleId,
    pub tag: Option<String>,
    pub rank: i64,
    pub visible: bool,
    pub clickable: bool,
    pub tracking: bool,
}

struct PendingMove {
    target: CameraPosition,
    on_done: MoveCompletion,
}

struct EngineInner {
    position: CameraPosition,
    min_zoom: i32,
    max_zoom: i32,
    calls: Vec<NativeCall>,
    pending: VecDeque<PendingMove>,
    auto_complete: bool,
    failing: HashSet<&'static str>,
    failing_labels: BTreeSet<LabelId>,
    failing_settings: Vec<MapSetting>,
    labels: BTreeMap<LabelId, RecordedLabel>,
    styles: BTreeMap<StyleId, LabelStyleSpec>,
    next_style: u64,
    sink: Option<Arc<dyn EngineEventSink>>,
}

/// In-memory [`MapEngine`] that records every call.
///
/// Animated moves stay pending until the test releases them with
/// [`complete_next_animation`](Self::complete_next_animation), unless
/// auto-completion is switched on.
pub struct RecordingEngine {
    inner: Mutex<EngineInner>,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::with_position(CameraDefaults::POSITION)
    }

    pub fn with_position(position: CameraPosition) -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                position,
                min_zoom: CameraDefaults::MIN_ZOOM_LEVEL,
                max_zoom: CameraDefaults::MAX_ZOOM_LEVEL,
                calls: Vec::new(),
                pending: VecDeque::new(),
                auto_complete: false,
                failing: HashSet::new(),
                failing_labels: BTreeSet::new(),
                failing_settings: Vec::new(),
                labels: BTreeMap::new(),
                styles: BTreeMap::new(),
                next_style: 1,
                sink: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Complete animated moves synchronously inside `animate_camera`.
    pub fn set_auto_complete(&self, auto: bool) {
        self.lock().auto_complete = auto;
    }

    pub fn set_zoom_bounds(&self, min: i32, max: i32) {
        let mut inner = self.lock();
        inner.min_zoom = min;
        inner.max_zoom = max;
    }

    /// Make every call of the named [`MapEngine`] method fail.
    pub fn fail_on(&self, method: &'static str) {
        self.lock().failing.insert(method);
    }

    pub fn succeed_on(&self, method: &'static str) {
        self.lock().failing.remove(method);
    }

    /// Make `update_label` fail for one label only.
    pub fn fail_label_updates(&self, id: LabelId) {
        self.lock().failing_labels.insert(id);
    }

    /// Make `apply_setting` fail for this exact setting value only.
    pub fn fail_setting(&self, setting: MapSetting) {
        self.lock().failing_settings.push(setting);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of property applies (map settings and label changes) recorded.
    pub fn apply_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_property_apply())
            .count()
    }

    pub fn count_of(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.name() == method)
            .count()
    }

    pub fn label(&self, id: &LabelId) -> Option<RecordedLabel> {
        self.lock().labels.get(id).cloned()
    }

    pub fn label_ids(&self) -> Vec<LabelId> {
        self.lock().labels.keys().cloned().collect()
    }

    pub fn live_style_count(&self) -> usize {
        self.lock().styles.len()
    }

    pub fn style(&self, id: StyleId) -> Option<LabelStyleSpec> {
        self.lock().styles.get(&id).cloned()
    }

    pub fn pending_animations(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn has_event_sink(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Settle the oldest pending animation at its target.
    pub fn complete_next_animation(&self) -> bool {
        let next = {
            let mut inner = self.lock();
            let next = inner.pending.pop_front();
            if let Some(ref m) = next {
                inner.position = m.target;
            }
            next
        };
        match next {
            Some(m) => {
                (m.on_done)(Ok(()));
                true
            }
            None => false,
        }
    }

    /// Fail the oldest pending animation; the camera stays where it is.
    pub fn fail_next_animation(&self, error: EngineError) -> bool {
        let next = self.lock().pending.pop_front();
        match next {
            Some(m) => {
                (m.on_done)(Err(error));
                true
            }
            None => false,
        }
    }

    pub fn complete_all_animations(&self) -> usize {
        let mut n = 0;
        while self.complete_next_animation() {
            n += 1;
        }
        n
    }

    /// Deliver a native event to the installed sink, as the engine thread would.
    pub fn emit(&self, event: MapEvent) {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                tracing::debug!(?event, "recording engine: emit");
                sink.on_event(event);
            }
            None => tracing::debug!(?event, "recording engine: no sink, event dropped"),
        }
    }

    fn check(inner: &EngineInner, method: &'static str) -> EngineResult<()> {
        if inner.failing.contains(method) {
            tracing::warn!(method, "recording engine: injected failure");
            return Err(EngineError::Rejected {
                call: method,
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }
}

impl MapEngine for RecordingEngine {
    fn camera_position(&self) -> CameraPosition {
        self.lock().position
    }

    fn min_zoom_level(&self) -> i32 {
        self.lock().min_zoom
    }

    fn max_zoom_level(&self) -> i32 {
        self.lock().max_zoom
    }

    fn zoom_level(&self) -> i32 {
        self.lock().position.zoom_level
    }

    fn move_camera(&self, update: &CameraUpdate) -> EngineResult<()> {
        let mut inner = self.lock();
        Self::check(&inner, "move_camera")?;
        inner.calls.push(NativeCall::MoveCamera(*update));
        inner.position = update.apply_to(&inner.position, inner.min_zoom, inner.max_zoom);
        Ok(())
    }

    fn animate_camera(
        &self,
        update: &CameraUpdate,
        animation: &CameraAnimation,
        on_done: MoveCompletion,
    ) -> EngineResult<()> {
        let mut inner = self.lock();
        Self::check(&inner, "animate_camera")?;
        inner
            .calls
            .push(NativeCall::AnimateCamera(*update, *animation));
        let target = update.apply_to(&inner.position, inner.min_zoom, inner.max_zoom);
        if inner.auto_complete {
            inner.position = target;
            drop(inner);
            on_done(Ok(()));
        } else {
            inner.pending.push_back(PendingMove { target, on_done });
        }
        Ok(())
    }

    fn apply_setting(&self, setting: &MapSetting) -> EngineResult<()> {
        let sink = {
            let mut inner = self.lock();
            Self::check(&inner, "apply_setting")?;
            if inner.failing_settings.contains(setting) {
                tracing::warn!(?setting, "recording engine: setting refused");
                return Err(EngineError::Rejected {
                    call: "apply_setting",
                    reason: format!("{setting:?} refused"),
                });
            }
            inner.calls.push(NativeCall::Setting(setting.clone()));
            match setting {
                MapSetting::Padding(_) => inner.sink.clone(),
                _ => None,
            }
        };
        // Padding changes are reported back synchronously, the way native views
        // re-layout inside the setter.
        if let Some(sink) = sink {
            sink.on_event(MapEvent::PaddingChanged);
        }
        Ok(())
    }

    fn create_label_style(&self, spec: &LabelStyleSpec) -> EngineResult<StyleId> {
        let mut inner = self.lock();
        Self::check(&inner, "create_label_style")?;
        let id = StyleId(inner.next_style);
        inner.next_style += 1;
        inner.styles.insert(id, spec.clone());
        inner.calls.push(NativeCall::CreateStyle(id));
        Ok(id)
    }

    fn release_label_style(&self, style: StyleId) {
        let mut inner = self.lock();
        inner.styles.remove(&style);
        inner.calls.push(NativeCall::ReleaseStyle(style));
    }

    fn add_label(&self, options: &LabelOptions) -> EngineResult<()> {
        let mut inner = self.lock();
        Self::check(&inner, "add_label")?;
        if inner.labels.contains_key(&options.id) {
            return Err(EngineError::Rejected {
                call: "add_label",
                reason: format!("label {} already exists", options.id),
            });
        }
        inner.labels.insert(
            options.id.clone(),
            RecordedLabel {
                position: options.position,
                rotation: 0.0,
                style: options.style,
                tag: options.tag.clone(),
                rank: options.rank,
                visible: options.visible,
                clickable: options.clickable,
                tracking: false,
            },
        );
        inner.calls.push(NativeCall::AddLabel(options.id.clone()));
        Ok(())
    }

    fn update_label(&self, id: &LabelId, change: &LabelChange) -> EngineResult<()> {
        let mut inner = self.lock();
        Self::check(&inner, "update_label")?;
        if inner.failing_labels.contains(id) {
            tracing::warn!(%id, "recording engine: label update refused");
            return Err(EngineError::Rejected {
                call: "update_label",
                reason: format!("label {id} is locked"),
            });
        }
        let label = inner
            .labels
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownLabel(id.clone()))?;
        match change {
            LabelChange::MoveTo { position, .. } => label.position = *position,
            LabelChange::RotateTo { angle, .. } => label.rotation = *angle,
            LabelChange::Style(style) => label.style = *style,
            LabelChange::Rank(rank) => label.rank = *rank,
            LabelChange::Tag(tag) => label.tag = Some(tag.clone()),
            LabelChange::Visible(v) => label.visible = *v,
            LabelChange::Clickable(c) => label.clickable = *c,
            LabelChange::Tracking(t) => label.tracking = *t,
        }
        inner
            .calls
            .push(NativeCall::UpdateLabel(id.clone(), change.clone()));
        Ok(())
    }

    fn remove_label(&self, id: &LabelId) {
        let mut inner = self.lock();
        inner.labels.remove(id);
        inner.calls.push(NativeCall::RemoveLabel(id.clone()));
    }

    fn set_event_sink(&self, sink: Option<Arc<dyn EngineEventSink>>) {
        self.lock().sink = sink;
    }
}

#[derive(Default)]
struct ViewInner {
    start_count: usize,
    pause_count: usize,
    resume_count: usize,
    finish_count: usize,
    options: Option<MapInitialOptions>,
    sink: Option<Arc<dyn NativeLifecycleSink>>,
    ready_on_start: Option<Arc<dyn MapEngine>>,
}

/// In-memory [`MapView`] that records lifecycle calls and lets tests play the
/// native side of the lifecycle.
#[derive(Default)]
pub struct RecordingMapView {
    inner: Mutex<ViewInner>,
}

impl RecordingMapView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `engine` as ready from inside the native `start` call.
    pub fn ready_on_start(engine: Arc<dyn MapEngine>) -> Self {
        let view = Self::default();
        view.lock().ready_on_start = Some(engine);
        view
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sink(&self) -> Option<Arc<dyn NativeLifecycleSink>> {
        self.lock().sink.clone()
    }

    pub fn start_count(&self) -> usize {
        self.lock().start_count
    }

    pub fn pause_count(&self) -> usize {
        self.lock().pause_count
    }

    pub fn resume_count(&self) -> usize {
        self.lock().resume_count
    }

    pub fn finish_count(&self) -> usize {
        self.lock().finish_count
    }

    pub fn started_with(&self) -> Option<MapInitialOptions> {
        self.lock().options.clone()
    }

    /// Returns false when `start` has not been called yet.
    pub fn report_ready(&self, engine: Arc<dyn MapEngine>) -> bool {
        self.sink().map(|s| s.ready(engine)).is_some()
    }

    pub fn report_paused(&self) -> bool {
        self.sink().map(|s| s.paused()).is_some()
    }

    pub fn report_resumed(&self) -> bool {
        self.sink().map(|s| s.resumed()).is_some()
    }

    pub fn report_destroyed(&self) -> bool {
        self.sink().map(|s| s.destroyed()).is_some()
    }

    pub fn report_error(&self, error: EngineError) -> bool {
        self.sink().map(|s| s.error(error)).is_some()
    }
}

impl MapView for RecordingMapView {
    fn start(&self, options: &MapInitialOptions, sink: Arc<dyn NativeLifecycleSink>) {
        let ready = {
            let mut inner = self.lock();
            inner.start_count += 1;
            inner.options = Some(options.clone());
            inner.sink = Some(sink.clone());
            inner.ready_on_start.take()
        };
        if let Some(engine) = ready {
            sink.ready(engine);
        }
    }

    fn pause(&self) {
        self.lock().pause_count += 1;
    }

    fn resume(&self) {
        self.lock().resume_count += 1;
    }

    fn finish(&self) {
        self.lock().finish_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn move_camera_records_and_moves() {
        let engine = RecordingEngine::new();
        engine.move_camera(&CameraUpdate::ZoomTo(10)).unwrap();
        assert_eq!(engine.zoom_level(), 10);
        assert_eq!(engine.calls(), vec![NativeCall::MoveCamera(CameraUpdate::ZoomTo(10))]);
    }

    #[test]
    fn animations_wait_for_release() {
        let engine = RecordingEngine::new();
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        engine
            .animate_camera(
                &CameraUpdate::ZoomTo(18),
                &CameraAnimation::from_millis(300),
                Box::new(move |r| {
                    assert!(r.is_ok());
                    d.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(engine.pending_animations(), 1);
        assert_ne!(engine.zoom_level(), 18);

        assert!(engine.complete_next_animation());
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(engine.zoom_level(), 18);
        assert!(!engine.complete_next_animation());
    }

    #[test]
    fn injected_failures() {
        let engine = RecordingEngine::new();
        engine.fail_on("apply_setting");
        assert!(engine.apply_setting(&MapSetting::PoiVisible(false)).is_err());
        assert_eq!(engine.apply_count(), 0);
        engine.succeed_on("apply_setting");
        assert!(engine.apply_setting(&MapSetting::PoiVisible(false)).is_ok());
        assert_eq!(engine.apply_count(), 1);
    }

    #[test]
    fn update_unknown_label_fails() {
        let engine = RecordingEngine::new();
        let err = engine
            .update_label(&LabelId("ghost".into()), &LabelChange::Visible(false))
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownLabel(LabelId("ghost".into())));
    }

    #[test]
    fn emit_without_sink_is_dropped() {
        let engine = RecordingEngine::new();
        assert!(!engine.has_event_sink());
        engine.emit(MapEvent::CompassClicked);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn view_reports_require_start() {
        let view = RecordingMapView::new();
        assert!(!view.report_paused());
        assert_eq!(view.start_count(), 0);
    }
}
