use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use vectormap_common::{CameraAnimation, CameraDefaults, CameraPosition, CameraUpdate, GestureType};
use vectormap_engine::{EngineError, EngineResult, MapEngine, same_engine};
use vectormap_events::CameraMoveObserver;

use crate::snapshot::CameraSnapshot;

/// Misuse of the controller. Not recoverable; surfaced as a panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("camera controller is already bound to a different engine; unbind it first")]
    AlreadyBound,
}

/// How an [`CameraController::animate`] call resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The move settled while this request still owned the camera.
    Success,
    /// Superseded by a later move, an unbind, or the caller's own cancellation.
    Cancelled,
    /// The engine rejected or failed the move.
    Failed(EngineError),
}

struct Owner {
    token: u64,
    superseded: oneshot::Sender<()>,
}

enum DeferredAction {
    Jump(CameraUpdate),
    Animate {
        token: u64,
        update: CameraUpdate,
        animation: CameraAnimation,
        done: oneshot::Sender<EngineResult<()>>,
    },
}

struct State {
    engine: Option<Arc<dyn MapEngine>>,
    current: CameraPosition,
    owner: Option<Owner>,
    pending: Option<DeferredAction>,
    next_token: u64,
}

impl State {
    fn owns(&self, token: u64) -> bool {
        self.owner.as_ref().is_some_and(|o| o.token == token)
    }

    /// Drop the current owner, waking its waiter.
    fn supersede(&mut self) {
        if let Some(owner) = self.owner.take() {
            tracing::debug!(token = owner.token, "camera move superseded");
            let _ = owner.superseded.send(());
        }
    }

    fn release(&mut self, token: u64) -> bool {
        if self.owns(token) {
            self.owner = None;
            true
        } else {
            false
        }
    }

    fn run_deferred(&mut self, action: DeferredAction) {
        let Some(engine) = self.engine.clone() else {
            tracing::debug!("deferred camera action dropped on detach");
            return;
        };
        match action {
            DeferredAction::Jump(update) => {
                if let Err(error) = engine.move_camera(&update) {
                    tracing::warn!(%error, "deferred camera jump failed");
                }
                self.current = engine.camera_position();
            }
            DeferredAction::Animate {
                token,
                update,
                animation,
                done,
            } => {
                if !self.owns(token) {
                    return;
                }
                tracing::debug!(token, "starting deferred animated move");
                if let Err(error) = start_animation(&engine, &update, &animation, done) {
                    tracing::warn!(%error, token, "deferred animated move rejected");
                }
            }
        }
    }
}

/// Start a native animated move whose completion lands on `done`.
///
/// On a start failure the error is also sent on `done`, so a deferred waiter
/// resolves instead of hanging.
fn start_animation(
    engine: &Arc<dyn MapEngine>,
    update: &CameraUpdate,
    animation: &CameraAnimation,
    done: oneshot::Sender<EngineResult<()>>,
) -> EngineResult<()> {
    let slot = Arc::new(Mutex::new(Some(done)));
    let on_done = slot.clone();
    let started = engine.animate_camera(
        update,
        animation,
        Box::new(move |result| {
            let tx = on_done.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(tx) = tx {
                let _ = tx.send(result);
            }
        }),
    );
    if let Err(error) = &started {
        let tx = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = tx {
            let _ = tx.send(Err(error.clone()));
        }
    }
    started
}

/// Owns the camera state and arbitrates which animated move is definitive.
///
/// The controller outlives engine handles: it can be bound, unbound and bound
/// again, and `current_position` carries over. Moves requested while unbound are
/// deferred until the next bind.
pub struct CameraController {
    state: Mutex<State>,
    moving: AtomicBool,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    pub fn new() -> Self {
        Self::with_position(CameraDefaults::POSITION)
    }

    pub fn with_position(position: CameraPosition) -> Self {
        Self {
            state: Mutex::new(State {
                engine: None,
                current: position,
                owner: None,
                pending: None,
                next_token: 1,
            }),
            moving: AtomicBool::new(false),
        }
    }

    /// Rebuild a controller from a saved snapshot.
    pub fn restore(snapshot: CameraSnapshot) -> Self {
        Self::with_position(snapshot.into())
    }

    pub fn save(&self) -> CameraSnapshot {
        self.position().into()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach (`Some`) or detach (`None`) the engine.
    ///
    /// # Panics
    /// Attaching while bound to a different engine is a programmer error and
    /// panics with [`CameraError::AlreadyBound`].
    pub fn bind(&self, engine: Option<Arc<dyn MapEngine>>) {
        let mut st = self.lock();
        match (st.engine.take(), engine) {
            (Some(current), Some(new)) => {
                let same = same_engine(&current, &new);
                st.engine = Some(current);
                if same {
                    return;
                }
                drop(st);
                panic!("{}", CameraError::AlreadyBound);
            }
            (None, None) => return,
            (None, Some(new)) => {
                let at = st.current;
                if let Err(error) = new.move_camera(&CameraUpdate::NewPosition(at)) {
                    tracing::warn!(%error, "could not place camera on attach");
                }
                tracing::info!(target = %at.target, zoom = at.zoom_level, "camera bound");
                st.engine = Some(new);
            }
            (Some(old), None) => {
                st.current = old.camera_position();
                st.supersede();
                self.moving.store(false, Ordering::SeqCst);
                tracing::info!("camera unbound");
            }
        }
        if let Some(action) = st.pending.take() {
            st.run_deferred(action);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.lock().engine.is_some()
    }

    /// Whether an animated move currently owns the camera.
    pub fn is_animating(&self) -> bool {
        self.lock().owner.is_some()
    }

    /// Whether the engine reports the camera in motion.
    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::SeqCst)
    }

    /// Live engine position when bound, otherwise the last known one.
    pub fn position(&self) -> CameraPosition {
        let st = self.lock();
        match &st.engine {
            Some(engine) => engine.camera_position(),
            None => st.current,
        }
    }

    pub fn min_zoom_level(&self) -> i32 {
        self.lock()
            .engine
            .as_ref()
            .map_or(CameraDefaults::MIN_ZOOM_LEVEL, |e| e.min_zoom_level())
    }

    pub fn max_zoom_level(&self) -> i32 {
        self.lock()
            .engine
            .as_ref()
            .map_or(CameraDefaults::MAX_ZOOM_LEVEL, |e| e.max_zoom_level())
    }

    /// Current zoom; unknown while unbound.
    pub fn zoom_level(&self) -> Option<i32> {
        self.lock().engine.as_ref().map(|e| e.zoom_level())
    }

    /// Declarative position setter.
    pub fn set_position(&self, position: CameraPosition) -> EngineResult<()> {
        self.jump(CameraUpdate::NewPosition(position))
    }

    /// Move without animation, superseding any in-flight animated move.
    pub fn jump(&self, update: CameraUpdate) -> EngineResult<()> {
        let mut st = self.lock();
        st.supersede();
        match st.engine.clone() {
            Some(engine) => {
                engine.move_camera(&update)?;
                st.current = engine.camera_position();
            }
            None => {
                // Zoom bounds are unknown until bind; the engine clamps then.
                let target = update.apply_to(&st.current, i32::MIN, i32::MAX);
                st.current = target;
                st.pending = Some(DeferredAction::Jump(CameraUpdate::NewPosition(target)));
                tracing::debug!("camera jump deferred until bind");
            }
        }
        Ok(())
    }

    /// Animated move. Resolves once, with whichever of completion,
    /// supersession or `cancel` happens first. A completion already delivered
    /// when `cancel` fires still counts as a success.
    pub async fn animate(
        &self,
        update: CameraUpdate,
        animation: CameraAnimation,
        cancel: &CancellationToken,
    ) -> MoveOutcome {
        if cancel.is_cancelled() {
            return MoveOutcome::Cancelled;
        }
        let (token, superseded, done) = match self.begin_animation(update, animation) {
            Ok(waiter) => waiter,
            Err(error) => return MoveOutcome::Failed(error),
        };

        tokio::select! {
            biased;
            result = done => self.finish_animation(token, result),
            _ = superseded => MoveOutcome::Cancelled,
            _ = cancel.cancelled() => {
                if self.lock().release(token) {
                    tracing::debug!(token, "camera move cancelled by caller");
                }
                MoveOutcome::Cancelled
            }
        }
    }

    fn begin_animation(
        &self,
        update: CameraUpdate,
        animation: CameraAnimation,
    ) -> EngineResult<(
        u64,
        oneshot::Receiver<()>,
        oneshot::Receiver<EngineResult<()>>,
    )> {
        let (superseded_tx, superseded_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let mut st = self.lock();
        let token = st.next_token;
        st.next_token += 1;
        st.supersede();
        st.owner = Some(Owner {
            token,
            superseded: superseded_tx,
        });
        match st.engine.clone() {
            Some(engine) => {
                tracing::debug!(token, ?update, "starting animated move");
                if let Err(error) = start_animation(&engine, &update, &animation, done_tx) {
                    st.release(token);
                    return Err(error);
                }
            }
            None => {
                tracing::debug!(token, "animated move deferred until bind");
                st.pending = Some(DeferredAction::Animate {
                    token,
                    update,
                    animation,
                    done: done_tx,
                });
            }
        }
        Ok((token, superseded_rx, done_rx))
    }

    fn finish_animation(
        &self,
        token: u64,
        result: Result<EngineResult<()>, oneshot::error::RecvError>,
    ) -> MoveOutcome {
        let mut st = self.lock();
        if !st.release(token) {
            return MoveOutcome::Cancelled;
        }
        match result {
            Ok(Ok(())) => {
                if let Some(engine) = &st.engine {
                    st.current = engine.camera_position();
                }
                MoveOutcome::Success
            }
            Ok(Err(error)) => MoveOutcome::Failed(error),
            Err(_) => MoveOutcome::Cancelled,
        }
    }
}

impl CameraMoveObserver for CameraController {
    fn move_started(&self, _gesture: GestureType) {
        self.moving.store(true, Ordering::SeqCst);
    }

    fn move_ended(&self, _position: CameraPosition, _gesture: GestureType) {
        self.moving.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectormap_common::LatLng;
    use vectormap_engine::{NativeCall, RecordingEngine};

    fn anim() -> CameraAnimation {
        CameraAnimation::from_millis(300)
    }

    fn bind(controller: &CameraController, engine: &Arc<RecordingEngine>) {
        let handle: Arc<dyn MapEngine> = engine.clone();
        controller.bind(Some(handle));
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_animate(
        controller: &Arc<CameraController>,
        update: CameraUpdate,
    ) -> tokio::task::JoinHandle<MoveOutcome> {
        let c = controller.clone();
        tokio::spawn(async move { c.animate(update, anim(), &CancellationToken::new()).await })
    }

    #[test]
    #[should_panic(expected = "already bound to a different engine")]
    fn binding_second_engine_panics() {
        let controller = CameraController::new();
        bind(&controller, &Arc::new(RecordingEngine::new()));
        bind(&controller, &Arc::new(RecordingEngine::new()));
    }

    #[test]
    fn unbind_then_rebind_other_engine() {
        let controller = CameraController::new();
        let first = Arc::new(RecordingEngine::new());
        let second = Arc::new(RecordingEngine::new());
        bind(&controller, &first);
        bind(&controller, &first);
        controller.bind(None);
        controller.bind(None);
        bind(&controller, &second);
        assert!(controller.is_bound());
        assert_eq!(first.count_of("move_camera"), 1);
    }

    #[test]
    fn attach_applies_current_position() {
        let at = CameraPosition::new(LatLng::new(35.1796, 129.0756), 12);
        let controller = CameraController::with_position(at);
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        assert_eq!(
            engine.calls(),
            vec![NativeCall::MoveCamera(CameraUpdate::NewPosition(at))]
        );
        assert_eq!(engine.camera_position(), at);
    }

    #[test]
    fn position_survives_detach() {
        let controller = CameraController::new();
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        controller.jump(CameraUpdate::ZoomTo(17)).unwrap();
        controller.bind(None);
        assert_eq!(controller.position().zoom_level, 17);

        let next = Arc::new(RecordingEngine::new());
        bind(&controller, &next);
        assert_eq!(next.zoom_level(), 17);
    }

    #[test]
    fn zoom_accessors_fall_back_when_unbound() {
        let controller = CameraController::new();
        assert_eq!(controller.min_zoom_level(), CameraDefaults::MIN_ZOOM_LEVEL);
        assert_eq!(controller.max_zoom_level(), CameraDefaults::MAX_ZOOM_LEVEL);
        assert_eq!(controller.zoom_level(), None);

        let engine = Arc::new(RecordingEngine::new());
        engine.set_zoom_bounds(3, 18);
        bind(&controller, &engine);
        assert_eq!(controller.min_zoom_level(), 3);
        assert_eq!(controller.max_zoom_level(), 18);
        assert_eq!(controller.zoom_level(), Some(15));
    }

    #[test]
    fn unbound_relative_jump_applies_once() {
        let controller = CameraController::new();
        controller.jump(CameraUpdate::ZoomIn).unwrap();
        assert_eq!(controller.position().zoom_level, 16);

        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        assert_eq!(engine.zoom_level(), 16);
        // The deferred jump ran once and is gone.
        controller.bind(None);
        bind(&controller, &engine);
        assert_eq!(engine.zoom_level(), 16);
    }

    #[test]
    fn unbound_jump_keeps_zoom_outside_default_bounds() {
        let controller = CameraController::new();
        controller.jump(CameraUpdate::ZoomTo(3)).unwrap();
        assert_eq!(controller.position().zoom_level, 3);

        let engine = Arc::new(RecordingEngine::new());
        engine.set_zoom_bounds(3, 18);
        bind(&controller, &engine);
        assert_eq!(engine.zoom_level(), 3);
        assert_eq!(controller.position().zoom_level, 3);
    }

    #[test]
    fn unbound_jump_is_clamped_by_engine_on_bind() {
        let controller = CameraController::new();
        controller.jump(CameraUpdate::ZoomTo(22)).unwrap();

        let engine = Arc::new(RecordingEngine::new());
        engine.set_zoom_bounds(3, 18);
        bind(&controller, &engine);
        assert_eq!(engine.zoom_level(), 18);
        assert_eq!(controller.position().zoom_level, 18);
    }

    #[tokio::test]
    async fn completion_beats_simultaneous_cancel() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);

        let cancel = CancellationToken::new();
        let c = controller.clone();
        let token = cancel.clone();
        let waiter = tokio::spawn(async move {
            c.animate(CameraUpdate::ZoomTo(12), anim(), &token).await
        });
        settle().await;
        engine.complete_next_animation();
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), MoveOutcome::Success);
        assert_eq!(controller.position().zoom_level, 12);
    }

    #[tokio::test]
    async fn unbound_animate_completes_after_bind() {
        let controller = Arc::new(CameraController::new());
        let target = LatLng::new(37.4979, 127.0276);
        let waiter = spawn_animate(&controller, CameraUpdate::NewCenter(target));
        settle().await;
        assert!(!waiter.is_finished());

        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        assert_eq!(engine.pending_animations(), 1);
        engine.complete_next_animation();

        assert_eq!(waiter.await.unwrap(), MoveOutcome::Success);
        assert_eq!(controller.position().target, target);
        assert!(!controller.is_animating());
    }

    #[tokio::test]
    async fn jump_supersedes_deferred_animate() {
        let controller = Arc::new(CameraController::new());
        let waiter = spawn_animate(&controller, CameraUpdate::ZoomTo(19));
        settle().await;

        controller.jump(CameraUpdate::ZoomTo(8)).unwrap();
        assert_eq!(waiter.await.unwrap(), MoveOutcome::Cancelled);

        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        assert_eq!(engine.pending_animations(), 0);
        assert_eq!(engine.zoom_level(), 8);
    }

    #[tokio::test]
    async fn later_animate_wins() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);

        let first_target = LatLng::new(33.4996, 126.5312);
        let second_target = LatLng::new(35.8714, 128.6014);
        let first = spawn_animate(&controller, CameraUpdate::NewCenter(first_target));
        settle().await;
        let second = spawn_animate(&controller, CameraUpdate::NewCenter(second_target));
        settle().await;

        assert_eq!(engine.complete_all_animations(), 2);
        assert_eq!(first.await.unwrap(), MoveOutcome::Cancelled);
        assert_eq!(second.await.unwrap(), MoveOutcome::Success);
        assert_eq!(engine.camera_position().target, second_target);
        assert_eq!(controller.position().target, second_target);
    }

    #[tokio::test]
    async fn jump_cancels_in_flight_animation() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);

        let waiter = spawn_animate(&controller, CameraUpdate::ZoomTo(20));
        settle().await;
        let target = LatLng::new(37.0, 127.0);
        controller.jump(CameraUpdate::NewCenter(target)).unwrap();

        assert_eq!(waiter.await.unwrap(), MoveOutcome::Cancelled);
        assert_eq!(controller.position().target, target);
        assert_eq!(engine.pending_animations(), 1);
    }

    #[tokio::test]
    async fn external_cancellation_releases_ownership() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);

        let cancel = CancellationToken::new();
        let c = controller.clone();
        let token = cancel.clone();
        let waiter = tokio::spawn(async move {
            c.animate(CameraUpdate::ZoomIn, anim(), &token).await
        });
        settle().await;
        assert!(controller.is_animating());

        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), MoveOutcome::Cancelled);
        assert!(!controller.is_animating());
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_move() {
        let controller = CameraController::new();
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = controller
            .animate(CameraUpdate::ZoomIn, anim(), &cancel)
            .await;
        assert_eq!(outcome, MoveOutcome::Cancelled);
        assert_eq!(engine.count_of("animate_camera"), 0);
    }

    #[tokio::test]
    async fn failed_completion_is_reported() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);

        let waiter = spawn_animate(&controller, CameraUpdate::ZoomOut);
        settle().await;
        engine.fail_next_animation(EngineError::Native("interrupted".into()));
        assert_eq!(
            waiter.await.unwrap(),
            MoveOutcome::Failed(EngineError::Native("interrupted".into()))
        );
    }

    #[tokio::test]
    async fn rejected_start_is_reported() {
        let controller = CameraController::new();
        let engine = Arc::new(RecordingEngine::new());
        engine.fail_on("animate_camera");
        bind(&controller, &engine);
        let outcome = controller
            .animate(CameraUpdate::ZoomIn, anim(), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, MoveOutcome::Failed(EngineError::Rejected { .. })));
        assert!(!controller.is_animating());
    }

    #[tokio::test]
    async fn unbind_cancels_in_flight_animation() {
        let controller = Arc::new(CameraController::new());
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        let waiter = spawn_animate(&controller, CameraUpdate::ZoomIn);
        settle().await;
        controller.bind(None);
        assert_eq!(waiter.await.unwrap(), MoveOutcome::Cancelled);
    }

    #[tokio::test]
    async fn auto_completed_move_succeeds() {
        let controller = CameraController::new();
        let engine = Arc::new(RecordingEngine::new());
        engine.set_auto_complete(true);
        bind(&controller, &engine);
        let outcome = controller
            .animate(CameraUpdate::ZoomTo(11), anim(), &CancellationToken::new())
            .await;
        assert_eq!(outcome, MoveOutcome::Success);
        assert_eq!(controller.position().zoom_level, 11);
    }

    #[test]
    fn moving_flag_follows_engine_notifications() {
        let controller = CameraController::new();
        let engine = Arc::new(RecordingEngine::new());
        bind(&controller, &engine);
        controller.move_started(GestureType::Pan);
        assert!(controller.is_moving());
        controller.move_ended(CameraPosition::default(), GestureType::Pan);
        assert!(!controller.is_moving());

        controller.move_started(GestureType::OneFingerZoom);
        controller.bind(None);
        assert!(!controller.is_moving());
    }

    #[test]
    fn save_and_restore() {
        let controller = CameraController::new();
        controller.jump(CameraUpdate::Tilt(-0.5)).unwrap();
        let restored = CameraController::restore(controller.save());
        assert_eq!(restored.position(), controller.position());
    }
}
