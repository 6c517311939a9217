//! Camera Controller: camera state and animation ownership.
//!
//! # Invariants
//! - At most one movement owner is active at a time. A new `animate` or `jump`
//!   supersedes the previous owner, whose waiter resolves as cancelled.
//! - At most one deferred action is pending; it runs exactly once on the next
//!   bind-state transition.
//! - The controller lock is held only for bookkeeping, never across a wait.

mod controller;
mod snapshot;

pub use controller::{CameraController, CameraError, MoveOutcome};
pub use snapshot::CameraSnapshot;
