//! Map Resource Lifecycle: lifecycle-gated acquisition of the engine handle.
//!
//! # Invariants
//! - Exactly one native `start` call per handle instance.
//! - At most one engine-ready notification per handle instance.
//! - Destroyed and Errored are terminal; no transition leaves them.
//! - Every forwarded transition is reported exactly once.

pub mod lifecycle;

pub use lifecycle::{
    HostEvent, LifecycleCallbacks, LifecycleError, LifecycleEvent, LifecycleSink, LifecycleState,
    MapResourceLifecycle,
};
