use vectormap_common::LabelId;
use vectormap_engine::{EngineError, LabelChange, MapEngine, MapSetting};
use vectormap_events::{ApplyFailure, EventBridge};

/// Applies property changes for one node, counting native calls and routing
/// failures to the bridge's error slot.
pub(crate) struct Applier<'a> {
    pub engine: &'a dyn MapEngine,
    bridge: &'a EventBridge,
    node: String,
    pub applies: usize,
    pub failures: usize,
}

impl<'a> Applier<'a> {
    pub fn new(engine: &'a dyn MapEngine, bridge: &'a EventBridge, node: String) -> Self {
        Self {
            engine,
            bridge,
            node,
            applies: 0,
            failures: 0,
        }
    }

    pub fn fail(&mut self, property: &'static str, error: EngineError) {
        self.failures += 1;
        self.bridge.report_failure(ApplyFailure {
            node: self.node.clone(),
            property,
            error,
        });
    }

    /// Apply settings in order, stopping at the first rejection.
    pub fn settings(&mut self, property: &'static str, settings: &[MapSetting]) -> bool {
        for setting in settings {
            match self.engine.apply_setting(setting) {
                Ok(()) => self.applies += 1,
                Err(error) => {
                    self.fail(property, error);
                    return false;
                }
            }
        }
        true
    }

    pub fn label(&mut self, property: &'static str, id: &LabelId, change: LabelChange) -> bool {
        match self.engine.update_label(id, &change) {
            Ok(()) => {
                self.applies += 1;
                true
            }
            Err(error) => {
                self.fail(property, error);
                false
            }
        }
    }
}

/// Compare `declared` against the snapshot and apply it when it differs.
///
/// The snapshot moves only when `apply` reports success, so a rejected value
/// is retried on the next pass.
pub(crate) fn sync<T: PartialEq + Clone>(
    applied: &mut Option<T>,
    declared: &T,
    property: &'static str,
    apply: impl FnOnce(&T) -> bool,
) {
    if applied.as_ref() == Some(declared) {
        tracing::trace!(property, "unchanged; skipped");
        return;
    }
    if apply(declared) {
        *applied = Some(declared.clone());
    }
}
