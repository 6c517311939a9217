//! Host integration: one map on screen.
//!
//! [`MapHost`] owns the lifecycle, binder, camera and bridge for a single
//! engine handle and keeps them bound to the same engine.
//!
//! # Invariants
//! - Binder and camera are bound to the engine the lifecycle delivered, and
//!   unbound when it is destroyed or fails.
//! - Slots invoked after a pass may declare a new pass re-entrantly.

mod host;

pub use host::MapHost;
