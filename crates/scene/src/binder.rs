use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use vectormap_common::OverlayKey;
use vectormap_engine::{MapEngine, same_engine};
use vectormap_events::EventBridge;

use crate::apply::Applier;
use crate::declaration::{LabelProps, MapProperties, SceneDeclaration};
use crate::label::LabelNode;
use crate::properties::PropertiesNode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("scene binder is already bound to a different engine; unbind it first")]
    AlreadyBound,
    #[error("overlay {0} declared twice in one pass")]
    DuplicateKey(OverlayKey),
}

/// What one pass did to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Native property applies (map settings and label changes).
    pub applies: usize,
    pub created: usize,
    pub removed: usize,
    /// Per-node failures, each surfaced through the bridge error slot.
    pub failures: usize,
    /// Keys declared more than once; the repeats were ignored.
    pub duplicates: Vec<OverlayKey>,
    /// The pass ran with no engine bound and touched nothing.
    pub unbound: bool,
}

/// Reconciles declarations onto the bound engine.
pub struct SceneBinder {
    bridge: Arc<EventBridge>,
    engine: Option<Arc<dyn MapEngine>>,
    properties: PropertiesNode,
    labels: BTreeMap<OverlayKey, LabelNode>,
}

impl SceneBinder {
    pub fn new(bridge: Arc<EventBridge>) -> Self {
        Self {
            bridge,
            engine: None,
            properties: PropertiesNode::default(),
            labels: BTreeMap::new(),
        }
    }

    /// # Panics
    /// Binding while bound to a different engine panics with
    /// [`SceneError::AlreadyBound`].
    pub fn bind(&mut self, engine: Arc<dyn MapEngine>) {
        if let Some(current) = &self.engine {
            if same_engine(current, &engine) {
                return;
            }
            panic!("{}", SceneError::AlreadyBound);
        }
        tracing::info!("scene binder bound");
        self.engine = Some(engine);
    }

    /// Forget every node. The engine that owned their native objects is gone,
    /// so nothing is torn down natively; the next bind starts from scratch.
    pub fn unbind(&mut self) {
        if self.engine.take().is_none() {
            return;
        }
        for node in std::mem::take(&mut self.labels).into_values() {
            self.bridge.clear_label_slot(&node.id);
        }
        self.properties = PropertiesNode::default();
        tracing::info!("scene binder unbound");
    }

    pub fn is_bound(&self) -> bool {
        self.engine.is_some()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Native id of the label mirroring `key`, if it exists.
    pub fn label_id(&self, key: &OverlayKey) -> Option<&vectormap_common::LabelId> {
        self.labels.get(key).map(|n| &n.id)
    }

    /// Open a pass: holds the bridge and syncs the map properties.
    pub fn begin_pass(&mut self, properties: &MapProperties) -> ScenePass<'_> {
        let span = tracing::info_span!("scene_pass").entered();
        self.bridge.hold();
        let mut report = PassReport {
            unbound: self.engine.is_none(),
            ..PassReport::default()
        };
        if let Some(engine) = self.engine.clone() {
            let mut a = Applier::new(engine.as_ref(), &self.bridge, "map".into());
            self.properties.update(properties, &mut a);
            report.applies += a.applies;
            report.failures += a.failures;
        }
        ScenePass {
            binder: self,
            declared: HashSet::new(),
            report,
            finished: false,
            _span: span,
        }
    }

    /// Run a whole pass from a declaration value.
    pub fn reconcile(&mut self, scene: &SceneDeclaration) -> PassReport {
        let mut pass = self.begin_pass(&scene.properties);
        for overlay in &scene.overlays {
            // Duplicates are recorded in the report.
            let _ = pass.label(overlay.key.clone(), &overlay.label);
        }
        pass.finish()
    }
}

/// One reconciliation pass. Undeclared nodes are detached on [`finish`], or
/// when the pass is dropped.
///
/// [`finish`]: ScenePass::finish
pub struct ScenePass<'a> {
    binder: &'a mut SceneBinder,
    declared: HashSet<OverlayKey>,
    report: PassReport,
    finished: bool,
    _span: tracing::span::EnteredSpan,
}

impl ScenePass<'_> {
    /// Declare a label under `key`.
    pub fn label(&mut self, key: OverlayKey, props: &LabelProps) -> Result<(), SceneError> {
        if !self.declared.insert(key.clone()) {
            tracing::warn!(%key, "overlay declared twice in one pass; ignoring repeat");
            self.report.duplicates.push(key.clone());
            return Err(SceneError::DuplicateKey(key));
        }
        let Some(engine) = self.binder.engine.clone() else {
            return Ok(());
        };
        let bridge = self.binder.bridge.clone();
        let mut a = Applier::new(engine.as_ref(), &bridge, format!("label:{key}"));

        let replace = self
            .binder
            .labels
            .get(&key)
            .is_some_and(|node| node.needs_replacement(props));
        if replace {
            if let Some(old) = self.binder.labels.remove(&key) {
                old.teardown(engine.as_ref(), &bridge);
                self.report.removed += 1;
            }
        }

        match self.binder.labels.get_mut(&key) {
            Some(node) => node.update(props, &mut a, &bridge),
            None => match LabelNode::create(key.clone(), props, &mut a, &bridge) {
                Ok(node) => {
                    self.binder.labels.insert(key, node);
                    self.report.created += 1;
                }
                Err(error) => a.fail("create", error),
            },
        }
        self.report.applies += a.applies;
        self.report.failures += a.failures;
        Ok(())
    }

    /// Tear down `key` now. A later declaration in this pass creates a fresh node.
    pub fn remove(&mut self, key: &OverlayKey) {
        self.declared.remove(key);
        let Some(engine) = self.binder.engine.clone() else {
            return;
        };
        if let Some(node) = self.binder.labels.remove(key) {
            node.teardown(engine.as_ref(), &self.binder.bridge);
            self.report.removed += 1;
        }
    }

    pub fn finish(mut self) -> PassReport {
        self.complete();
        std::mem::take(&mut self.report)
    }

    fn complete(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(engine) = self.binder.engine.clone() {
            let stale: Vec<OverlayKey> = self
                .binder
                .labels
                .keys()
                .filter(|k| !self.declared.contains(*k))
                .cloned()
                .collect();
            for key in stale {
                if let Some(node) = self.binder.labels.remove(&key) {
                    node.teardown(engine.as_ref(), &self.binder.bridge);
                    self.report.removed += 1;
                }
            }
        }
        tracing::debug!(
            applies = self.report.applies,
            created = self.report.created,
            removed = self.report.removed,
            failures = self.report.failures,
            "scene pass complete"
        );
        self.binder.bridge.release();
    }
}

impl Drop for ScenePass<'_> {
    fn drop(&mut self) {
        self.complete();
    }
}
