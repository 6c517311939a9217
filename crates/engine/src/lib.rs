//! Engine Adapter: capability interface of the external map engine.
//!
//! # Invariants
//! - The binding layer never reaches into engine internals; everything it can
//!   do to the engine is a method of [`MapEngine`] or [`MapView`].
//! - Engine callbacks may arrive on the engine's own thread, so every
//!   capability type is `Send + Sync`.
//!
//! # Fakes
//! [`RecordingEngine`] and [`RecordingMapView`] stand in for a native engine.
//! They record every call, hold animation completions until released, and can
//! be told to fail specific calls. The traits are stable; a native binding
//! implements them without changing consumers.

mod engine;
mod recording;
mod view;

pub use engine::{
    EngineError, EngineEventSink, EngineResult, IconImage, LabelChange, LabelOptions,
    LabelStyleSpec, LabelTransition, MapEngine, MapEvent, MapSetting, MapViewInfo, MoveCompletion,
    StyleIcon, StyleId, TransformMethod, Transition,
};
pub use recording::{NativeCall, RecordedLabel, RecordingEngine, RecordingMapView};
pub use view::{MapInitialOptions, MapView, NativeLifecycleSink};

/// Compare two engine handles by identity, ignoring vtable metadata.
pub fn same_engine(a: &std::sync::Arc<dyn MapEngine>, b: &std::sync::Arc<dyn MapEngine>) -> bool {
    std::ptr::addr_eq(std::sync::Arc::as_ptr(a), std::sync::Arc::as_ptr(b))
}
