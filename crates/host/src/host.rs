use std::sync::{Arc, Mutex, MutexGuard};
use vectormap_camera::CameraController;
use vectormap_engine::{MapEngine, MapInitialOptions, MapView};
use vectormap_events::{EventBridge, MapEventListeners};
use vectormap_lifecycle::{
    HostEvent, LifecycleCallbacks, LifecycleError, LifecycleSink, LifecycleState,
    MapResourceLifecycle,
};
use vectormap_scene::{PassReport, SceneBinder, SceneDeclaration};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

struct Bound {
    bridge: Arc<EventBridge>,
    camera: Arc<CameraController>,
    binder: Mutex<SceneBinder>,
    engine: Mutex<Option<Arc<dyn MapEngine>>>,
    scene: Mutex<Option<SceneDeclaration>>,
}

impl Bound {
    fn attach(&self, engine: Arc<dyn MapEngine>) {
        *lock(&self.engine) = Some(engine.clone());
        let bridge: Arc<dyn vectormap_engine::EngineEventSink> = self.bridge.clone();
        engine.set_event_sink(Some(bridge));
        self.camera.bind(Some(engine.clone()));

        let scene = lock(&self.scene).clone();
        self.bridge.hold();
        {
            let mut binder = lock(&self.binder);
            binder.bind(engine);
            if let Some(scene) = scene {
                let report = binder.reconcile(&scene);
                tracing::debug!(created = report.created, "declared scene applied on bind");
            }
        }
        self.bridge.release();
        tracing::info!("map host attached to engine");
    }

    fn detach(&self) {
        let Some(engine) = lock(&self.engine).take() else {
            return;
        };
        engine.set_event_sink(None);
        self.camera.bind(None);
        lock(&self.binder).unbind();
        tracing::info!("map host detached from engine");
    }

    fn render(&self, scene: SceneDeclaration) -> PassReport {
        *lock(&self.scene) = Some(scene.clone());
        self.bridge.hold();
        let report = lock(&self.binder).reconcile(&scene);
        // Held events are delivered once the binder is free again.
        self.bridge.release();
        report
    }
}

/// One map on screen: drives the lifecycle and keeps the binder and camera
/// bound to the engine it produces.
pub struct MapHost {
    lifecycle: MapResourceLifecycle,
    shared: Arc<Bound>,
}

impl MapHost {
    pub fn new(view: Arc<dyn MapView>, options: MapInitialOptions) -> Self {
        let camera = Arc::new(CameraController::with_position(options.camera));
        Self::with_camera(view, options, camera)
    }

    /// Use an existing camera controller, such as one restored from a snapshot.
    pub fn with_camera(
        view: Arc<dyn MapView>,
        options: MapInitialOptions,
        camera: Arc<CameraController>,
    ) -> Self {
        let bridge = Arc::new(EventBridge::new());
        bridge.set_camera_observer(Some(camera.clone()));
        let shared = Arc::new(Bound {
            bridge: bridge.clone(),
            camera,
            binder: Mutex::new(SceneBinder::new(bridge)),
            engine: Mutex::new(None),
            scene: Mutex::new(None),
        });
        let host = Self {
            lifecycle: MapResourceLifecycle::new(view, options),
            shared,
        };
        host.set_lifecycle_callbacks(LifecycleCallbacks::default());
        host
    }

    pub fn camera(&self) -> &Arc<CameraController> {
        &self.shared.camera
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.shared.bridge
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn sink(&self) -> LifecycleSink {
        self.lifecycle.sink()
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.shared.engine).is_some()
    }

    pub fn label_count(&self) -> usize {
        lock(&self.shared.binder).label_count()
    }

    pub fn on_host_event(&self, event: HostEvent) {
        self.lifecycle.on_host_event(event);
    }

    /// Re-point the declared lifecycle slots. Teardown of the bound engine
    /// runs before the declared destroyed/error slot.
    pub fn set_lifecycle_callbacks(&self, callbacks: LifecycleCallbacks) {
        let on_destroyed = {
            let shared = self.shared.clone();
            let user = callbacks.on_destroyed.clone();
            Arc::new(move || {
                shared.detach();
                user();
            })
        };
        let on_error = {
            let shared = self.shared.clone();
            let user = callbacks.on_error.clone();
            Arc::new(move |error: &vectormap_engine::EngineError| {
                shared.detach();
                user(error);
            })
        };
        self.lifecycle.set_callbacks(LifecycleCallbacks {
            on_destroyed,
            on_error,
            ..callbacks
        });
    }

    /// Wait for the engine and bind everything to it. A scene rendered before
    /// the engine was ready is applied now.
    pub async fn run(&self) -> Result<Arc<dyn MapEngine>, LifecycleError> {
        let engine = self.lifecycle.acquire().await?;
        self.shared.attach(engine.clone());
        if self.lifecycle.state().is_terminal() {
            self.shared.detach();
            return Err(LifecycleError::TornDown);
        }
        Ok(engine)
    }

    /// Declare the scene and its listener slots for this pass.
    pub fn render(&self, scene: SceneDeclaration, listeners: MapEventListeners) -> PassReport {
        self.shared.bridge.set_listeners(listeners);
        self.shared.render(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;
    use vectormap_camera::MoveOutcome;
    use vectormap_common::{CameraAnimation, CameraUpdate, GestureType, LatLng};
    use vectormap_engine::{EngineError, MapEvent, RecordingEngine, RecordingMapView};
    use vectormap_scene::{LabelIcon, LabelProps};

    struct Fixture {
        engine: Arc<RecordingEngine>,
        view: Arc<RecordingMapView>,
        host: MapHost,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(RecordingEngine::new());
        let handle: Arc<dyn MapEngine> = engine.clone();
        let view = Arc::new(RecordingMapView::ready_on_start(handle));
        let host = MapHost::new(view.clone(), MapInitialOptions::default());
        Fixture { engine, view, host }
    }

    fn scene() -> SceneDeclaration {
        SceneDeclaration::default().with_label(
            "a",
            LabelProps::new(LatLng::new(37.5, 127.0), LabelIcon::Resource(3)),
        )
    }

    #[tokio::test]
    async fn run_binds_everything_to_the_engine() {
        let f = fixture();
        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();

        assert!(f.host.is_bound());
        assert!(f.engine.has_event_sink());
        assert!(f.host.camera().is_bound());
        assert_eq!(f.view.start_count(), 1);

        let report = f.host.render(scene(), MapEventListeners::new());
        assert_eq!(report.created, 1);
        assert_eq!(f.engine.label_ids().len(), 1);
    }

    #[tokio::test]
    async fn scene_declared_before_ready_is_applied_on_bind() {
        let f = fixture();
        let report = f.host.render(scene(), MapEventListeners::new());
        assert!(report.unbound);
        assert!(f.engine.label_ids().is_empty());

        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();
        assert_eq!(f.host.label_count(), 1);
        assert_eq!(f.engine.label_ids().len(), 1);
    }

    #[tokio::test]
    async fn destroy_unbinds_and_notifies_once() {
        let f = fixture();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = destroyed.clone();
        f.host.set_lifecycle_callbacks(LifecycleCallbacks {
            on_destroyed: Arc::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            }),
            ..LifecycleCallbacks::default()
        });
        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();
        f.host.render(scene(), MapEventListeners::new());

        f.host.on_host_event(HostEvent::Destroyed);
        f.view.report_destroyed();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!f.host.is_bound());
        assert!(!f.host.camera().is_bound());
        assert_eq!(f.host.label_count(), 0);
        assert!(!f.engine.has_event_sink());
        assert_eq!(f.view.finish_count(), 1);
    }

    #[tokio::test]
    async fn engine_error_unbinds() {
        let f = fixture();
        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();
        f.view.report_error(EngineError::Native("context lost".into()));
        assert_eq!(f.host.state(), LifecycleState::Errored);
        assert!(!f.host.is_bound());
    }

    #[tokio::test]
    async fn teardown_before_ready_fails_run() {
        let view = Arc::new(RecordingMapView::new());
        let host = MapHost::new(view, MapInitialOptions::default());
        host.on_host_event(HostEvent::Resumed);
        host.on_host_event(HostEvent::Destroyed);
        assert_eq!(host.run().await.err(), Some(LifecycleError::TornDown));
    }

    #[tokio::test]
    async fn engine_events_reach_camera_and_slots() {
        let f = fixture();
        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();
        let clicks = Arc::new(AtomicUsize::new(0));
        let c = clicks.clone();
        f.host.render(
            scene(),
            MapEventListeners::new().on_map_click(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        f.engine.emit(MapEvent::CameraMoveStarted(GestureType::Pan));
        assert!(f.host.camera().is_moving());
        f.engine.emit(MapEvent::MapClicked(LatLng::default()));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_may_render_reentrantly() {
        let f = fixture();
        let host = Arc::new(f.host);
        host.on_host_event(HostEvent::Resumed);
        host.run().await.unwrap();

        let h = host.clone();
        host.render(
            scene(),
            MapEventListeners::new().on_compass_click(move || {
                h.render(SceneDeclaration::default(), MapEventListeners::new());
            }),
        );
        assert_eq!(host.label_count(), 1);
        f.engine.emit(MapEvent::CompassClicked);
        assert_eq!(host.label_count(), 0);
    }

    #[tokio::test]
    async fn camera_moves_through_host() {
        let f = fixture();
        f.engine.set_auto_complete(true);
        f.host.on_host_event(HostEvent::Resumed);
        f.host.run().await.unwrap();
        let outcome = f
            .host
            .camera()
            .animate(
                CameraUpdate::ZoomTo(18),
                CameraAnimation::from_millis(250),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome, MoveOutcome::Success);
        assert_eq!(f.engine.zoom_level(), 18);
    }
}
