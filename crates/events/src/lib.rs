//! Event bridge: forwards native engine callbacks to the declared slots.
//!
//! # Invariants
//! - A callback always reaches the slot declared most recently, never a stale one.
//! - While a scene pass holds the bridge, events raised by the engine are
//!   buffered and delivered in arrival order once the pass releases it.

mod bridge;
mod listeners;

pub use bridge::{ApplyFailure, CameraMoveObserver, EventBridge};
pub use listeners::{LabelClickSlot, MapEventListeners};
