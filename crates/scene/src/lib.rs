//! Scene Binder: keeps declared scene elements mirrored onto the live engine.
//!
//! A pass compares each declared property against the node's snapshot of what
//! was last applied, and only calls the engine for values that changed.
//!
//! # Invariants
//! - A node's snapshot never runs ahead of or behind the native object: it is
//!   updated only after the engine accepts the change.
//! - A node is torn down the moment its element leaves the declaration. A
//!   later declaration with the same key yields a fresh node.
//! - Engine callbacks raised during a pass are held by the event bridge and
//!   delivered after the pass finishes.

mod apply;
mod binder;
mod declaration;
mod label;
mod properties;

pub use binder::{PassReport, SceneBinder, SceneError, ScenePass};
pub use declaration::{
    ComposedIcon, LabelDefaults, LabelIcon, LabelProps, MapProperties, OverlayDecl,
    SceneDeclaration,
};
