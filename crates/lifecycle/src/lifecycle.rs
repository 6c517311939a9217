use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use vectormap_engine::{EngineError, MapEngine, MapInitialOptions, MapView, NativeLifecycleSink};

/// State of one engine handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Starting,
    Ready,
    Paused,
    Resumed,
    Destroyed,
    Errored,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::Errored)
    }

    /// Whether an engine has been delivered and is still usable.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Ready | Self::Paused | Self::Resumed)
    }
}

/// Host lifecycle input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Resumed,
    Paused,
    Destroyed,
}

/// A transition reported to collaborators. Recorded in the lifecycle's log.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Ready,
    Paused,
    Resumed,
    Destroyed,
    Error(EngineError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("host was torn down before the engine became ready")]
    TornDown,
    #[error("engine failed before becoming ready: {0}")]
    Engine(EngineError),
    #[error("engine handle was already acquired")]
    AlreadyAcquired,
}

/// Declared lifecycle slots, re-pointed by the host on every pass.
#[derive(Clone)]
pub struct LifecycleCallbacks {
    pub on_ready: Arc<dyn Fn(&Arc<dyn MapEngine>) + Send + Sync>,
    pub on_paused: Arc<dyn Fn() + Send + Sync>,
    pub on_resumed: Arc<dyn Fn() + Send + Sync>,
    pub on_destroyed: Arc<dyn Fn() + Send + Sync>,
    pub on_error: Arc<dyn Fn(&EngineError) + Send + Sync>,
}

impl Default for LifecycleCallbacks {
    fn default() -> Self {
        Self {
            on_ready: Arc::new(|_| {}),
            on_paused: Arc::new(|| {}),
            on_resumed: Arc::new(|| {}),
            on_destroyed: Arc::new(|| {}),
            on_error: Arc::new(|_| {}),
        }
    }
}

#[derive(Clone)]
enum Readiness {
    Waiting,
    Ready(Arc<dyn MapEngine>),
    TornDown,
    Failed(EngineError),
}

struct Inner {
    state: LifecycleState,
    host_resumed: bool,
    /// Engine reported ready while the host was not resumed.
    held_ready: Option<Arc<dyn MapEngine>>,
    ready_delivered: bool,
    acquired: bool,
    callbacks: LifecycleCallbacks,
    log: Vec<LifecycleEvent>,
}

struct Shared {
    inner: Mutex<Inner>,
    readiness: watch::Sender<Readiness>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `event` if it is a legal transition. Returns the callback to run
    /// once the lock is released.
    fn transition(
        inner: &mut Inner,
        readiness: &watch::Sender<Readiness>,
        event: LifecycleEvent,
    ) -> Option<Box<dyn FnOnce() + Send>> {
        let from = inner.state;
        let to = match (&event, from) {
            (_, s) if s.is_terminal() => return None,
            (LifecycleEvent::Ready, LifecycleState::Created | LifecycleState::Starting) => {
                LifecycleState::Ready
            }
            (LifecycleEvent::Paused, LifecycleState::Ready | LifecycleState::Resumed) => {
                LifecycleState::Paused
            }
            (LifecycleEvent::Resumed, LifecycleState::Ready | LifecycleState::Paused) => {
                LifecycleState::Resumed
            }
            (LifecycleEvent::Destroyed, _) => LifecycleState::Destroyed,
            (LifecycleEvent::Error(_), _) => LifecycleState::Errored,
            _ => {
                tracing::debug!(?event, ?from, "ignored lifecycle report");
                return None;
            }
        };
        inner.state = to;
        inner.log.push(event.clone());
        tracing::info!(?from, ?to, "map lifecycle transition");

        if !inner.ready_delivered {
            match &event {
                LifecycleEvent::Destroyed => {
                    readiness.send_replace(Readiness::TornDown);
                }
                LifecycleEvent::Error(e) => {
                    readiness.send_replace(Readiness::Failed(e.clone()));
                }
                _ => {}
            }
        }

        let cb = inner.callbacks.clone();
        Some(match event {
            LifecycleEvent::Ready => Box::new(|| {}),
            LifecycleEvent::Paused => Box::new(move || (cb.on_paused)()),
            LifecycleEvent::Resumed => Box::new(move || (cb.on_resumed)()),
            LifecycleEvent::Destroyed => Box::new(move || (cb.on_destroyed)()),
            LifecycleEvent::Error(e) => Box::new(move || (cb.on_error)(&e)),
        })
    }

    fn deliver_ready(
        inner: &mut Inner,
        readiness: &watch::Sender<Readiness>,
        engine: Arc<dyn MapEngine>,
    ) -> Option<Box<dyn FnOnce() + Send>> {
        Self::transition(inner, readiness, LifecycleEvent::Ready)?;
        inner.ready_delivered = true;
        readiness.send_replace(Readiness::Ready(engine.clone()));
        let on_ready = inner.callbacks.on_ready.clone();
        Some(Box::new(move || on_ready(&engine)))
    }

    fn report(&self, event: LifecycleEvent) {
        let notify = {
            let mut inner = self.lock();
            Self::transition(&mut inner, &self.readiness, event)
        };
        if let Some(notify) = notify {
            notify();
        }
    }
}

/// Native-side reporting handle passed to [`MapView::start`].
#[derive(Clone)]
pub struct LifecycleSink {
    shared: Arc<Shared>,
}

impl NativeLifecycleSink for LifecycleSink {
    fn ready(&self, engine: Arc<dyn MapEngine>) {
        let notify = {
            let mut inner = self.shared.lock();
            if inner.state.is_terminal() {
                tracing::warn!("engine reported ready after teardown");
                return;
            }
            if inner.ready_delivered || inner.held_ready.is_some() {
                tracing::warn!("duplicate engine-ready report ignored");
                return;
            }
            if !inner.host_resumed {
                tracing::debug!("engine ready while host is paused; holding");
                inner.held_ready = Some(engine);
                return;
            }
            Shared::deliver_ready(&mut inner, &self.shared.readiness, engine)
        };
        if let Some(notify) = notify {
            notify();
        }
    }

    fn paused(&self) {
        self.shared.report(LifecycleEvent::Paused);
    }

    fn resumed(&self) {
        self.shared.report(LifecycleEvent::Resumed);
    }

    fn destroyed(&self) {
        self.shared.report(LifecycleEvent::Destroyed);
    }

    fn error(&self, error: EngineError) {
        self.shared.report(LifecycleEvent::Error(error));
    }
}

/// Drives one engine handle from construction to teardown.
///
/// The host feeds [`HostEvent`]s; the native view reports back through the
/// [`LifecycleSink`]. No automatic retry: once Errored, a fresh view and a
/// fresh lifecycle are required.
pub struct MapResourceLifecycle {
    view: Arc<dyn MapView>,
    options: MapInitialOptions,
    shared: Arc<Shared>,
}

impl MapResourceLifecycle {
    pub fn new(view: Arc<dyn MapView>, options: MapInitialOptions) -> Self {
        let (readiness, _) = watch::channel(Readiness::Waiting);
        Self {
            view,
            options,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: LifecycleState::Created,
                    host_resumed: false,
                    held_ready: None,
                    ready_delivered: false,
                    acquired: false,
                    callbacks: LifecycleCallbacks::default(),
                    log: Vec::new(),
                }),
                readiness,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lock().state
    }

    pub fn sink(&self) -> LifecycleSink {
        LifecycleSink {
            shared: self.shared.clone(),
        }
    }

    pub fn set_callbacks(&self, callbacks: LifecycleCallbacks) {
        self.shared.lock().callbacks = callbacks;
    }

    /// Transitions reported so far, oldest first.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.shared.lock().log.clone()
    }

    /// Drain and return the transition log.
    pub fn drain_events(&self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.shared.lock().log)
    }

    /// Feed one host lifecycle event.
    pub fn on_host_event(&self, event: HostEvent) {
        enum Native {
            Start,
            Resume,
            Pause,
            Finish,
        }
        let (native, notify) = {
            let mut inner = self.shared.lock();
            if inner.state.is_terminal() {
                tracing::debug!(?event, "host event after teardown ignored");
                return;
            }
            match event {
                HostEvent::Resumed => {
                    inner.host_resumed = true;
                    if inner.state == LifecycleState::Created {
                        inner.state = LifecycleState::Starting;
                        tracing::info!("host resumed; starting engine");
                        (Some(Native::Start), None)
                    } else if let Some(engine) = inner.held_ready.take() {
                        let notify =
                            Shared::deliver_ready(&mut inner, &self.shared.readiness, engine);
                        (None, notify)
                    } else if inner.state.is_live() {
                        (Some(Native::Resume), None)
                    } else {
                        (None, None)
                    }
                }
                HostEvent::Paused => {
                    inner.host_resumed = false;
                    if inner.state.is_live() {
                        (Some(Native::Pause), None)
                    } else {
                        (None, None)
                    }
                }
                HostEvent::Destroyed => {
                    let started = inner.state != LifecycleState::Created;
                    inner.host_resumed = false;
                    inner.held_ready = None;
                    let notify = Shared::transition(
                        &mut inner,
                        &self.shared.readiness,
                        LifecycleEvent::Destroyed,
                    );
                    (started.then_some(Native::Finish), notify)
                }
            }
        };

        if let Some(notify) = notify {
            notify();
        }
        match native {
            Some(Native::Start) => self.view.start(&self.options, Arc::new(self.sink())),
            Some(Native::Resume) => self.view.resume(),
            Some(Native::Pause) => self.view.pause(),
            Some(Native::Finish) => self.view.finish(),
            None => {}
        }
    }

    /// Wait for the engine handle.
    ///
    /// Completes with the engine once it is ready and the host is resumed,
    /// with [`LifecycleError::TornDown`] when the host is destroyed first, or
    /// with [`LifecycleError::Engine`] when the engine fails first.
    pub async fn acquire(&self) -> Result<Arc<dyn MapEngine>, LifecycleError> {
        let mut rx = {
            let mut inner = self.shared.lock();
            if inner.acquired {
                return Err(LifecycleError::AlreadyAcquired);
            }
            inner.acquired = true;
            self.shared.readiness.subscribe()
        };
        let readiness = match rx.wait_for(|r| !matches!(r, Readiness::Waiting)).await {
            Ok(r) => r.clone(),
            Err(_) => Readiness::TornDown,
        };
        match readiness {
            Readiness::Ready(engine) => Ok(engine),
            Readiness::Failed(e) => Err(LifecycleError::Engine(e)),
            Readiness::Waiting | Readiness::TornDown => Err(LifecycleError::TornDown),
        }
    }
}
