//! The editing session.
//!
//! `EditorSession` owns the live document and every editor component that
//! works on it. There is exactly one per page session; the host passes it
//! by reference instead of reaching for globals.
//!
//! Two kinds of change reach the tree:
//!
//! - **Host changes** arrive as queued `MutationRecord`s and are handled in
//!   `on_mutations`: reconciliation, registry cleanup, rebuild scheduling.
//! - **Editor changes** are `TreeMutation` effects applied through
//!   `apply_effects`. Their records are drained right away so the editor
//!   never reconciles against its own edits.
//!
//! Deferred work (debounced layer rebuilds, the initial-processing retry)
//! runs from `tick`.

use crate::config::RuntimeConfig;
use crate::element::{
    DomElement, DragResult, ElementStyles, MoveResult, ParentElement, PositionResult,
};
use crate::identity::IdentityRegistry;
use crate::reconcile::{ReconciliationWatcher, removed_fragments};
use crate::reorder::{DragEvent, DragOutcome, ReorderEngine};
use crate::schedule::{Debouncer, RetryPoll};
use crate::snapshot::{LayerMap, build_layer_tree, build_root_for, default_root, is_filtered};
use crate::style_store::StyleStore;
use livedom_core::hit::{GeometryResolver, PointResolver};
use livedom_core::id::StableId;
use livedom_core::model::{DomNode, DomTree, MutationRecord, Point};
use livedom_core::mutation::{Applied, TreeMutation};
use livedom_core::NodeIndex;
use serde::{Deserialize, Serialize};

/// Notifications for the transport collaborator, drained in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    LayerTreeUpdated {
        root: StableId,
        layers: LayerMap,
    },
    IdentityTransferred {
        /// `None` when the stale duplicate had no stable id yet.
        #[serde(rename = "domId")]
        dom_id: Option<StableId>,
        #[serde(rename = "structuralId")]
        structural_id: String,
    },
}

pub struct EditorSession {
    /// The live document.
    pub tree: DomTree,

    pub config: RuntimeConfig,

    pub(crate) registry: IdentityRegistry,
    watcher: ReconciliationWatcher,
    pub(crate) styles: StyleStore,
    reorder: ReorderEngine,

    /// Layer-tree roots waiting for the burst to settle.
    rebuilds: Debouncer<NodeIndex>,

    /// Initial processing, retried until the document has a root.
    initial: RetryPoll,

    pub(crate) resolver: Box<dyn PointResolver>,

    outbox: Vec<SessionEvent>,

    /// Host records that were pending when the editor applied its own
    /// effects; handled on the next `on_mutations`.
    host_backlog: Vec<MutationRecord>,

    /// Last timestamp seen from the host.
    clock: u64,
}

impl EditorSession {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_tree(DomTree::new(), config)
    }

    pub fn with_tree(tree: DomTree, config: RuntimeConfig) -> Self {
        Self {
            tree,
            registry: IdentityRegistry::new(&config),
            watcher: ReconciliationWatcher::new(&config),
            styles: StyleStore::new(&config),
            reorder: ReorderEngine::new(&config),
            rebuilds: Debouncer::new(config.debounce_ms),
            initial: RetryPoll::new(config.retry_interval_ms, config.retry_max_attempts),
            resolver: Box::new(GeometryResolver),
            outbox: Vec::new(),
            host_backlog: Vec::new(),
            clock: 0,
            config,
        }
    }

    /// Replace the hit-testing capability.
    pub fn set_resolver(&mut self, resolver: impl PointResolver + 'static) {
        self.resolver = Box::new(resolver);
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_pending_rebuild(&self) -> bool {
        self.rebuilds.is_pending()
    }

    pub fn is_dragging(&self) -> bool {
        self.reorder.is_dragging()
    }

    // ─── Host changes ────────────────────────────────────────────────────

    /// Handle every host mutation queued since the last call.
    pub fn on_mutations(&mut self, now_ms: u64) {
        self.clock = now_ms;
        let mut batch = std::mem::take(&mut self.host_backlog);
        batch.extend(self.tree.take_mutations());
        if batch.is_empty() {
            return;
        }
        log::trace!("host batch of {} records", batch.len());

        let result = self.watcher.reconcile(&self.tree, &batch);
        for detached in removed_fragments(&batch) {
            self.registry.forget_removed(detached);
        }

        self.tree.apply_all(result.mutations);
        for transfer in &result.transfers {
            if let Some(id) = transfer.stable_id {
                self.registry.bind(id, transfer.target);
            }
        }
        self.drain_own();

        for parent in result.rebuild {
            self.schedule_rebuild(parent);
        }
        for transfer in result.transfers {
            self.outbox.push(SessionEvent::IdentityTransferred {
                dom_id: transfer.stable_id,
                structural_id: transfer.structural_id,
            });
        }
    }

    /// Run whatever deferred work is due at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        if self.tree.has_pending_mutations() || !self.host_backlog.is_empty() {
            self.on_mutations(now_ms);
        }
        self.clock = now_ms;

        let mut built: Vec<NodeIndex> = Vec::new();
        for key in self.rebuilds.poll(now_ms) {
            let root = if self.tree.contains(key) {
                build_root_for(&self.tree, key, &self.config)
            } else {
                default_root(&self.tree, &self.config)
            };
            if let Some(root) = root
                && !built.contains(&root)
            {
                built.push(root);
                self.emit_layers(root);
            }
        }

        self.poll_initial(now_ms);
    }

    // ─── Layer tree ──────────────────────────────────────────────────────

    /// Build the layer tree now and announce it. Starts from `root` when
    /// given, else from the document's default root.
    pub fn process_dom(&mut self, root: Option<&str>) -> Option<LayerMap> {
        let idx = match root {
            Some(id) => self.registry.resolve(&self.tree, id)?,
            None => default_root(&self.tree, &self.config)?,
        };
        self.emit_layers(idx)
    }

    /// Keep trying `process_dom` until the document has something to
    /// build, up to the configured attempt bound. The first try is now.
    pub fn schedule_initial_processing(&mut self, now_ms: u64) {
        self.clock = now_ms;
        self.initial.start(now_ms);
        self.poll_initial(now_ms);
    }

    fn poll_initial(&mut self, now_ms: u64) {
        if self.initial.is_due(now_ms) {
            let ok = self.process_dom(None).is_some();
            self.initial.record(ok, now_ms);
        }
    }

    fn emit_layers(&mut self, root: NodeIndex) -> Option<LayerMap> {
        let layers = build_layer_tree(&mut self.tree, &mut self.registry, &self.config, root)?;
        let id = self.registry.stable_id(&self.tree, root)?;
        self.outbox.push(SessionEvent::LayerTreeUpdated {
            root: id,
            layers: layers.clone(),
        });
        Some(layers)
    }

    /// Queue a debounced rebuild of the layer tree around `idx`.
    pub(crate) fn schedule_rebuild(&mut self, idx: NodeIndex) {
        if let Some(root) = build_root_for(&self.tree, idx, &self.config) {
            self.rebuilds.schedule(root, self.clock);
        }
    }

    // ─── Editor changes ──────────────────────────────────────────────────

    /// Set host records aside so the editor's own records can be told apart.
    pub(crate) fn begin_edit(&mut self) {
        if self.tree.has_pending_mutations() {
            let host = self.tree.take_mutations();
            self.host_backlog.extend(host);
        }
    }

    /// Drop the records produced by the editor's own edits.
    pub(crate) fn drain_own(&mut self) {
        for record in self.tree.take_mutations() {
            if let MutationRecord::Removed { detached, .. } = &record {
                self.registry.forget_removed(detached);
            }
        }
    }

    /// Apply editor effects in order.
    pub fn apply_effects(&mut self, effects: Vec<TreeMutation>) -> Vec<Applied> {
        if effects.is_empty() {
            return Vec::new();
        }
        self.begin_edit();
        let applied = self.tree.apply_all(effects);
        self.drain_own();
        applied
    }

    // ─── Lookups ─────────────────────────────────────────────────────────

    pub fn resolve(&mut self, dom_id: &str) -> Option<NodeIndex> {
        self.registry.resolve(&self.tree, dom_id)
    }

    /// The element parent of `idx`, never the document node.
    pub(crate) fn element_parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.tree
            .parent(idx)
            .filter(|p| *p != self.tree.root)
            .filter(|p| self.tree.node(*p).is_some_and(DomNode::is_element))
    }

    /// Nearest ancestor-or-self that is an editable element.
    pub(crate) fn editable_at(&self, mut idx: NodeIndex) -> Option<NodeIndex> {
        loop {
            if idx == self.tree.root {
                return None;
            }
            if let Some(node) = self.tree.node(idx)
                && !is_filtered(node, &self.config)
            {
                return Some(idx);
            }
            idx = self.tree.parent(idx)?;
        }
    }

    /// Descriptor for an element, assigning a stable id if needed.
    pub fn describe(&mut self, idx: NodeIndex, with_styles: bool) -> Option<DomElement> {
        let dom_id = self.registry.get_or_assign(&mut self.tree, idx)?;
        let parent = match self.element_parent(idx) {
            Some(p) => self.describe_parent(p),
            None => None,
        };
        let styles = with_styles.then(|| ElementStyles {
            defined: self.styles.query(&self.tree, dom_id.as_str()),
            computed: self
                .tree
                .node(idx)
                .map(|n| n.computed.to_map())
                .unwrap_or_default(),
        });

        let identity = self.registry.identity(&self.tree, idx)?;
        let node = self.tree.node(idx)?;
        Some(DomElement {
            dom_id,
            oid: identity.structural_id,
            instance_id: identity.instance_id,
            component_name: identity.component_name,
            tag_name: node.tag().unwrap_or_default().to_string(),
            rect: node.bounds,
            parent,
            styles,
        })
    }

    fn describe_parent(&mut self, idx: NodeIndex) -> Option<ParentElement> {
        let dom_id = self.registry.get_or_assign(&mut self.tree, idx)?;
        let identity = self.registry.identity(&self.tree, idx)?;
        let node = self.tree.node(idx)?;
        Some(ParentElement {
            dom_id,
            oid: identity.structural_id,
            instance_id: identity.instance_id,
            tag_name: node.tag().unwrap_or_default().to_string(),
            rect: node.bounds,
        })
    }

    // ─── Drag ────────────────────────────────────────────────────────────

    fn drag_step(&mut self, event: DragEvent) -> DragOutcome {
        let step = self.reorder.handle(&self.tree, event);
        self.apply_effects(step.effects);
        step.outcome
    }

    /// Begin dragging. Returns the original sibling index.
    pub fn start_drag(&mut self, dom_id: &str) -> Option<usize> {
        let node = self.resolve(dom_id)?;
        let id = self.registry.get_or_assign(&mut self.tree, node)?;
        match self.drag_step(DragEvent::Start { id, node }) {
            DragOutcome::Started { original_index } => Some(original_index),
            _ => None,
        }
    }

    /// Pointer moved. `delta` is travel since the drag began.
    pub fn drag(&mut self, dom_id: &str, delta: Point, pointer: Point) -> Option<DragOutcome> {
        let node = self.resolve(dom_id)?;
        let id = StableId::intern(dom_id);
        Some(self.drag_step(DragEvent::Move {
            id,
            node,
            delta,
            pointer,
        }))
    }

    /// Finish a drag. `None` when nothing changed or there was no drag.
    pub fn end_drag(&mut self, dom_id: &str) -> Option<DragResult> {
        let node = self.resolve(dom_id)?;
        let id = StableId::intern(dom_id);
        match self.drag_step(DragEvent::End { id, node }) {
            DragOutcome::Positioned { left, top } => {
                Some(DragResult::Positioned(PositionResult { left, top }))
            }
            DragOutcome::Moved {
                parent,
                child,
                new_index,
                ..
            } => {
                self.schedule_rebuild(parent);
                let child = self.describe(child, false)?;
                let parent = self.describe(parent, false)?;
                Some(DragResult::Moved(MoveResult {
                    new_index,
                    child,
                    parent,
                }))
            }
            _ => None,
        }
    }

    /// Abandon every drag and clean up leftover drag state. Returns the
    /// number of sessions restored.
    pub fn end_all_drag(&mut self) -> usize {
        match self.drag_step(DragEvent::EndAll) {
            DragOutcome::Restored { sessions } => sessions,
            _ => 0,
        }
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("nodes", &self.tree.node_count())
            .field("registry", &self.registry.len())
            .field("dragging", &self.reorder.is_dragging())
            .field("events", &self.outbox.len())
            .finish_non_exhaustive()
    }
}
