//! Drag reorder engine.
//!
//! A drag is a small state machine per node: `Start` captures the node's
//! original sibling index and inline style, `Move` offsets the node and
//! walks a hidden placeholder through the sibling list, `End` reads where
//! the placeholder landed and restores everything. Nodes whose effective
//! position is absolute skip index inference and are positioned freely.
//!
//! `ReorderEngine::handle` never touches the tree: it returns the effects
//! to apply, so the state machine runs the same against a live page or a
//! test fixture.
//!
//! Index inference:
//!
//! | Container | Rule |
//! |-----------|------|
//! | grid | content box ÷ tracks → cell → `row * cols + col`, clamped |
//! | flex row | first sibling whose horizontal midpoint is past the pointer |
//! | block / flex column | same, vertical midpoint |
//! | no flex, < 2 children | vertical |

use crate::config::RuntimeConfig;
use livedom_core::id::StableId;
use livedom_core::model::{Display, DomNode, DomTree, FlexDirection, Point, Position, Rect, format_px};
use livedom_core::mutation::TreeMutation;
use livedom_core::NodeIndex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Flow,
    Absolute,
}

/// One in-progress drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub stable_id: StableId,
    /// Last known index of the dragged node.
    pub node: NodeIndex,
    pub container: NodeIndex,
    pub original_index: usize,
    pub saved_style: String,
    pub start_bounds: Rect,
    /// Pointer offset from the node's top-left, captured on the first move.
    pub offset: Option<Point>,
    pub placeholder_index: Option<usize>,
    pub last_position: Option<(f32, f32)>,
    pub mode: DragMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Start {
        id: StableId,
        node: NodeIndex,
    },
    /// `delta` is the pointer travel since the gesture began.
    Move {
        id: StableId,
        node: NodeIndex,
        delta: Point,
        pointer: Point,
    },
    End {
        id: StableId,
        node: NodeIndex,
    },
    /// Restore every session and sweep leftover drag state.
    EndAll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    Started {
        original_index: usize,
    },
    /// Flow move; the placeholder's current slot.
    Placeholder {
        index: usize,
    },
    /// Absolute move or end.
    Positioned {
        left: f32,
        top: f32,
    },
    Moved {
        parent: NodeIndex,
        child: NodeIndex,
        new_index: usize,
        original_index: usize,
    },
    NoChange,
    Restored {
        sessions: usize,
    },
    /// Unknown node, no session, or below the drag threshold.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragStep {
    pub effects: Vec<TreeMutation>,
    pub outcome: DragOutcome,
}

impl DragStep {
    fn ignored() -> Self {
        Self {
            effects: Vec::new(),
            outcome: DragOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReorderEngine {
    config: RuntimeConfig,
    sessions: HashMap<StableId, DragSession>,
}

impl ReorderEngine {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            config: config.clone(),
            sessions: HashMap::new(),
        }
    }

    pub fn session(&self, id: StableId) -> Option<&DragSession> {
        self.sessions.get(&id)
    }

    pub fn is_dragging(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub fn handle(&mut self, tree: &DomTree, event: DragEvent) -> DragStep {
        log::trace!("drag event {event:?}");
        match event {
            DragEvent::Start { id, node } => self.start(tree, id, node),
            DragEvent::Move {
                id,
                node,
                delta,
                pointer,
            } => self.drag(tree, id, node, delta, pointer),
            DragEvent::End { id, node } => self.end(tree, id, node),
            DragEvent::EndAll => self.end_all(tree),
        }
    }

    // ─── Start ───────────────────────────────────────────────────────────

    fn start(&mut self, tree: &DomTree, id: StableId, node: NodeIndex) -> DragStep {
        if let Some(existing) = self.sessions.get(&id) {
            return DragStep {
                effects: Vec::new(),
                outcome: DragOutcome::Started {
                    original_index: existing.original_index,
                },
            };
        }
        let Some(n) = tree.node(node).filter(|n| n.is_element()) else {
            return DragStep::ignored();
        };
        let Some(container) = tree.parent(node).filter(|p| *p != tree.root) else {
            return DragStep::ignored();
        };
        let Some(original_index) = self
            .slots(tree, container)
            .iter()
            .position(|c| *c == node)
        else {
            return DragStep::ignored();
        };

        let saved_style = n.style.to_css_text();
        let mode = match tree.effective_position(node) {
            Position::Absolute | Position::Fixed => DragMode::Absolute,
            _ => DragMode::Flow,
        };

        let mut effects = vec![
            TreeMutation::set_attr(node, &self.config.dragging_attr, "true"),
            TreeMutation::set_attr(node, &self.config.drag_saved_style_attr, &saved_style),
        ];
        if mode == DragMode::Flow {
            let children = tree.children(container);
            let next = children
                .iter()
                .position(|c| *c == node)
                .and_then(|pos| children.get(pos + 1))
                .copied();
            effects.push(TreeMutation::InsertBefore {
                parent: container,
                fragment: self.placeholder(id, n.bounds).into(),
                before: next,
            });
        }

        log::debug!("start {mode:?} drag of {id:?} at index {original_index}");
        self.sessions.insert(
            id,
            DragSession {
                stable_id: id,
                node,
                container,
                original_index,
                saved_style,
                start_bounds: n.bounds,
                offset: None,
                placeholder_index: (mode == DragMode::Flow).then_some(original_index),
                last_position: None,
                mode,
            },
        );
        DragStep {
            effects,
            outcome: DragOutcome::Started { original_index },
        }
    }

    fn placeholder(&self, id: StableId, bounds: Rect) -> DomNode {
        let mut stub = DomNode::element("div").with_attr(&self.config.placeholder_attr, id.as_str());
        stub.style.set("width", &format_px(bounds.width, "px"));
        stub.style.set("height", &format_px(bounds.height, "px"));
        stub.style.set("display", "none");
        stub
    }

    // ─── Move ────────────────────────────────────────────────────────────

    fn drag(
        &mut self,
        tree: &DomTree,
        id: StableId,
        node: NodeIndex,
        delta: Point,
        pointer: Point,
    ) -> DragStep {
        let min = self.config.min_drag_distance;
        if min > 0.0 && delta.x.abs().max(delta.y.abs()) < min {
            return DragStep::ignored();
        }
        let placeholder_attr = self.config.placeholder_attr.clone();
        let Some(session) = self.sessions.get_mut(&id) else {
            return DragStep::ignored();
        };
        if !tree.contains(node) {
            return DragStep::ignored();
        }
        session.node = node;

        match session.mode {
            DragMode::Absolute => {
                let Some(parent) = tree.node(session.container) else {
                    return DragStep::ignored();
                };
                let offset = *session.offset.get_or_insert_with(|| {
                    let origin = Point::new(pointer.x - delta.x, pointer.y - delta.y);
                    Point::new(
                        origin.x - session.start_bounds.x,
                        origin.y - session.start_bounds.y,
                    )
                });
                let left = (pointer.x - offset.x - parent.bounds.x).round();
                let top = (pointer.y - offset.y - parent.bounds.y).round();
                session.last_position = Some((left, top));
                DragStep {
                    effects: vec![
                        TreeMutation::set_style(node, "left", &format_px(left, "px")),
                        TreeMutation::set_style(node, "top", &format_px(top, "px")),
                        TreeMutation::set_style(node, "transform", "none"),
                    ],
                    outcome: DragOutcome::Positioned { left, top },
                }
            }
            DragMode::Flow => {
                let container = session.container;
                let transform = format!(
                    "translate({}, {})",
                    format_px(delta.x, "px"),
                    format_px(delta.y, "px")
                );
                let mut effects = vec![TreeMutation::set_style(node, "transform", &transform)];

                let siblings = others(tree, container, node, &placeholder_attr);
                let target = drop_index(tree, container, &siblings, pointer);
                let stub = find_placeholder(tree, container, id, &placeholder_attr);
                let before = siblings.get(target).copied();

                match stub {
                    Some(stub) => {
                        effects.push(TreeMutation::set_style(stub, "display", "block"));
                        let current = placeholder_slot(tree, container, node, stub, &placeholder_attr);
                        if current != Some(target) {
                            effects.push(TreeMutation::MoveBefore {
                                node: stub,
                                parent: container,
                                before,
                            });
                        }
                    }
                    None => {
                        log::warn!("placeholder for {id:?} is gone, recreating");
                        let bounds = session.start_bounds;
                        let mut fragment = self.placeholder(id, bounds);
                        fragment.style.set("display", "block");
                        effects.push(TreeMutation::InsertBefore {
                            parent: container,
                            fragment: fragment.into(),
                            before,
                        });
                    }
                }
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.placeholder_index = Some(target);
                }
                DragStep {
                    effects,
                    outcome: DragOutcome::Placeholder { index: target },
                }
            }
        }
    }

    // ─── End ─────────────────────────────────────────────────────────────

    fn end(&mut self, tree: &DomTree, id: StableId, node: NodeIndex) -> DragStep {
        let Some(session) = self.sessions.remove(&id) else {
            // No session, but the node may still carry drag state.
            let mut effects = Vec::new();
            if let Some(n) = tree.node(node)
                && n.has_attr(&self.config.dragging_attr)
            {
                effects = self.restore_from_attrs(node, n);
            }
            return DragStep {
                effects,
                outcome: DragOutcome::Ignored,
            };
        };
        let node = if tree.contains(node) { node } else { session.node };

        match session.mode {
            DragMode::Absolute => {
                let (left, top) = session.last_position.unwrap_or_else(|| {
                    let parent = tree.node(session.container).map(|p| p.bounds).unwrap_or_default();
                    (
                        (session.start_bounds.x - parent.x).round(),
                        (session.start_bounds.y - parent.y).round(),
                    )
                });
                let mut effects = self.restore_effects(node, &session.saved_style);
                effects.push(TreeMutation::set_style(node, "left", &format_px(left, "px")));
                effects.push(TreeMutation::set_style(node, "top", &format_px(top, "px")));
                log::debug!("end absolute drag of {id:?} at ({left}, {top})");
                DragStep {
                    effects,
                    outcome: DragOutcome::Positioned { left, top },
                }
            }
            DragMode::Flow => {
                let attr = &self.config.placeholder_attr;
                let stub = find_placeholder(tree, session.container, id, attr);
                let new_index = stub
                    .and_then(|s| placeholder_slot(tree, session.container, node, s, attr))
                    .unwrap_or_else(|| {
                        log::warn!("placeholder for {id:?} missing at drag end");
                        session.original_index
                    });

                let mut effects = Vec::new();
                if let Some(stub) = stub {
                    effects.push(TreeMutation::Remove { node: stub });
                }
                effects.extend(self.restore_effects(node, &session.saved_style));

                log::debug!(
                    "end flow drag of {id:?}: {} -> {new_index}",
                    session.original_index
                );
                let outcome = if new_index != session.original_index {
                    DragOutcome::Moved {
                        parent: session.container,
                        child: node,
                        new_index,
                        original_index: session.original_index,
                    }
                } else {
                    DragOutcome::NoChange
                };
                DragStep { effects, outcome }
            }
        }
    }

    fn end_all(&mut self, tree: &DomTree) -> DragStep {
        let sessions: Vec<DragSession> = self.sessions.drain().map(|(_, s)| s).collect();
        let mut effects = Vec::new();
        let mut handled = HashSet::new();

        for session in &sessions {
            if let Some(stub) = find_placeholder(
                tree,
                session.container,
                session.stable_id,
                &self.config.placeholder_attr,
            ) {
                handled.insert(stub);
                effects.push(TreeMutation::Remove { node: stub });
            }
            if tree.contains(session.node) {
                handled.insert(session.node);
                effects.extend(self.restore_effects(session.node, &session.saved_style));
            }
        }

        // Leftovers from sessions this engine never saw.
        for idx in tree.descendants(tree.root) {
            if handled.contains(&idx) {
                continue;
            }
            let Some(n) = tree.node(idx) else {
                continue;
            };
            if n.has_attr(&self.config.placeholder_attr) {
                effects.push(TreeMutation::Remove { node: idx });
            } else if n.has_attr(&self.config.dragging_attr) {
                effects.extend(self.restore_from_attrs(idx, n));
            }
        }

        if !sessions.is_empty() {
            log::debug!("restored {} drag sessions", sessions.len());
        }
        DragStep {
            effects,
            outcome: DragOutcome::Restored {
                sessions: sessions.len(),
            },
        }
    }

    fn restore_effects(&self, node: NodeIndex, saved_style: &str) -> Vec<TreeMutation> {
        vec![
            TreeMutation::ReplaceStyle {
                node,
                css_text: saved_style.to_string(),
            },
            TreeMutation::remove_attr(node, &self.config.dragging_attr),
            TreeMutation::remove_attr(node, &self.config.drag_saved_style_attr),
        ]
    }

    fn restore_from_attrs(&self, idx: NodeIndex, n: &DomNode) -> Vec<TreeMutation> {
        match n.attr(&self.config.drag_saved_style_attr) {
            Some(saved) => self.restore_effects(idx, saved),
            None => vec![
                TreeMutation::RemoveStyle {
                    node: idx,
                    property: "transform".into(),
                },
                TreeMutation::remove_attr(idx, &self.config.dragging_attr),
            ],
        }
    }

    /// Element children of `container` that count as sibling slots.
    fn slots(&self, tree: &DomTree, container: NodeIndex) -> Vec<NodeIndex> {
        tree.element_children(container)
            .into_iter()
            .filter(|c| {
                tree.node(*c)
                    .is_some_and(|n| !n.has_attr(&self.config.placeholder_attr))
            })
            .collect()
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

fn others(tree: &DomTree, container: NodeIndex, node: NodeIndex, placeholder_attr: &str) -> Vec<NodeIndex> {
    tree.element_children(container)
        .into_iter()
        .filter(|c| *c != node)
        .filter(|c| tree.node(*c).is_some_and(|n| !n.has_attr(placeholder_attr)))
        .collect()
}

fn find_placeholder(
    tree: &DomTree,
    container: NodeIndex,
    id: StableId,
    placeholder_attr: &str,
) -> Option<NodeIndex> {
    tree.children(container)
        .iter()
        .copied()
        .find(|c| tree.node(*c).and_then(|n| n.attr(placeholder_attr)) == Some(id.as_str()))
        .or_else(|| tree.find_by_attr(placeholder_attr, id.as_str()))
}

/// The placeholder's slot among element siblings, not counting the
/// dragged node or other placeholders.
fn placeholder_slot(
    tree: &DomTree,
    container: NodeIndex,
    node: NodeIndex,
    stub: NodeIndex,
    placeholder_attr: &str,
) -> Option<usize> {
    tree.element_children(container)
        .into_iter()
        .filter(|c| *c != node)
        .filter(|c| *c == stub || tree.node(*c).is_some_and(|n| !n.has_attr(placeholder_attr)))
        .position(|c| c == stub)
}

/// Whether siblings in `container` flow horizontally.
pub fn is_horizontal(tree: &DomTree, container: NodeIndex, siblings: &[NodeIndex]) -> bool {
    if let Some(c) = tree.node(container)
        && c.computed.display == Display::Flex
    {
        return c.computed.flex_direction == FlexDirection::Row;
    }
    let (Some(first), Some(second)) = (
        siblings.first().and_then(|i| tree.node(*i)),
        siblings.get(1).and_then(|i| tree.node(*i)),
    ) else {
        return false;
    };
    let dx = (second.bounds.x - first.bounds.x).abs();
    let dy = (second.bounds.y - first.bounds.y).abs();
    dx > dy
}

/// First sibling whose midpoint along the flow axis lies beyond the
/// pointer; `siblings.len()` if none does.
pub fn linear_index(tree: &DomTree, siblings: &[NodeIndex], pointer: Point, horizontal: bool) -> usize {
    siblings
        .iter()
        .position(|s| {
            let Some(n) = tree.node(*s) else {
                return false;
            };
            let (cx, cy) = n.bounds.center();
            if horizontal { pointer.x < cx } else { pointer.y < cy }
        })
        .unwrap_or(siblings.len())
}

/// Map the pointer onto the container's grid cells. Always within
/// `[0, sibling_count]`, even for zero-size containers.
pub fn grid_index(tree: &DomTree, container: NodeIndex, sibling_count: usize, pointer: Point) -> usize {
    let Some(c) = tree.node(container) else {
        return sibling_count;
    };
    let content = c.bounds.inset(c.computed.padding);
    let cols = c.computed.grid_columns.max(1) as usize;
    let rows = if c.computed.grid_rows > 0 {
        c.computed.grid_rows as usize
    } else {
        (sibling_count + 1).div_ceil(cols).max(1)
    };

    let cell = |offset: f32, extent: f32, count: usize| -> usize {
        let size = extent / count as f32;
        if size <= 0.0 || !size.is_finite() {
            return 0;
        }
        let raw = (offset / size).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(count - 1)
        }
    };
    let col = cell(pointer.x - content.x, content.width, cols);
    let row = cell(pointer.y - content.y, content.height, rows);
    (row * cols + col).min(sibling_count)
}

/// Target slot for a drop at `pointer` among `siblings`.
pub fn drop_index(tree: &DomTree, container: NodeIndex, siblings: &[NodeIndex], pointer: Point) -> usize {
    let is_grid = tree
        .node(container)
        .is_some_and(|c| c.computed.display == Display::Grid);
    if is_grid {
        grid_index(tree, container, siblings.len(), pointer)
    } else {
        linear_index(tree, siblings, pointer, is_horizontal(tree, container, siblings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedom_core::layout::{Viewport, resolve_layout};
    use livedom_core::model::ComputedStyle;
    use pretty_assertions::assert_eq;

    fn stack(n: usize) -> (DomTree, NodeIndex, Vec<NodeIndex>) {
        let mut tree = DomTree::new();
        let body = tree.append_child(tree.root, DomNode::element("body")).unwrap();
        let kids = (0..n)
            .map(|i| {
                tree.append_child(
                    body,
                    DomNode::element("div")
                        .with_size(100.0, 50.0)
                        .with_attr("data-ld-id", &format!("ld-{i}")),
                )
                .unwrap()
            })
            .collect();
        resolve_layout(&mut tree, Viewport::default());
        tree.take_mutations();
        (tree, body, kids)
    }

    fn run(engine: &mut ReorderEngine, tree: &mut DomTree, event: DragEvent) -> DragOutcome {
        let step = engine.handle(tree, event);
        tree.apply_all(step.effects);
        step.outcome
    }

    #[test]
    fn linear_index_uses_midpoints() {
        let (tree, body, kids) = stack(3);
        let others = &kids[1..];
        assert!(!is_horizontal(&tree, body, others));
        assert_eq!(linear_index(&tree, others, Point::new(0.0, 60.0), false), 0);
        assert_eq!(linear_index(&tree, others, Point::new(0.0, 110.0), false), 1);
        assert_eq!(linear_index(&tree, others, Point::new(0.0, 140.0), false), 2);
    }

    #[test]
    fn single_child_defaults_to_vertical() {
        let (tree, body, kids) = stack(1);
        assert!(!is_horizontal(&tree, body, &kids));
        assert!(!is_horizontal(&tree, body, &[]));
    }

    #[test]
    fn degenerate_grid_clamps() {
        let mut tree = DomTree::new();
        let grid = tree
            .append_child(
                tree.root,
                DomNode::element("div").with_computed(ComputedStyle {
                    display: Display::Grid,
                    grid_columns: 3,
                    ..ComputedStyle::default()
                }),
            )
            .unwrap();
        assert_eq!(grid_index(&tree, grid, 2, Point::new(500.0, 500.0)), 0);
        assert_eq!(grid_index(&tree, grid, 0, Point::new(-5.0, -5.0)), 0);
    }

    #[test]
    fn flow_drag_walks_placeholder_and_restores() {
        let (mut tree, body, kids) = stack(3);
        tree.node_mut(kids[0]).unwrap().style.set("color", "red");
        let mut engine = ReorderEngine::new(&RuntimeConfig::default());
        let id = StableId::intern("ld-0");

        let started = run(&mut engine, &mut tree, DragEvent::Start { id, node: kids[0] });
        assert_eq!(started, DragOutcome::Started { original_index: 0 });
        assert_eq!(tree.element_children(body).len(), 4);

        let moved = run(
            &mut engine,
            &mut tree,
            DragEvent::Move {
                id,
                node: kids[0],
                delta: Point::new(0.0, 115.0),
                pointer: Point::new(10.0, 140.0),
            },
        );
        assert_eq!(moved, DragOutcome::Placeholder { index: 2 });
        assert_eq!(
            tree.node(kids[0]).unwrap().style.get("transform"),
            Some("translate(0px, 115px)")
        );

        let ended = run(&mut engine, &mut tree, DragEvent::End { id, node: kids[0] });
        assert_eq!(
            ended,
            DragOutcome::Moved {
                parent: body,
                child: kids[0],
                new_index: 2,
                original_index: 0,
            }
        );
        let node = tree.node(kids[0]).unwrap();
        assert_eq!(node.style.to_css_text(), "color: red;");
        assert!(!node.has_attr("data-ld-dragging"));
        assert_eq!(tree.element_children(body), kids);
        assert!(!engine.is_dragging());
    }

    #[test]
    fn release_in_place_is_no_change() {
        let (mut tree, _body, kids) = stack(3);
        let mut engine = ReorderEngine::new(&RuntimeConfig::default());
        let id = StableId::intern("ld-1");
        run(&mut engine, &mut tree, DragEvent::Start { id, node: kids[1] });
        run(
            &mut engine,
            &mut tree,
            DragEvent::Move {
                id,
                node: kids[1],
                delta: Point::new(0.0, 2.0),
                pointer: Point::new(10.0, 77.0),
            },
        );
        let ended = run(&mut engine, &mut tree, DragEvent::End { id, node: kids[1] });
        assert_eq!(ended, DragOutcome::NoChange);
    }

    #[test]
    fn end_all_is_idempotent_and_sweeps_orphans() {
        let (mut tree, body, kids) = stack(2);
        let mut engine = ReorderEngine::new(&RuntimeConfig::default());
        let id = StableId::intern("ld-0");
        run(&mut engine, &mut tree, DragEvent::Start { id, node: kids[0] });

        // Drag state left behind by an earlier engine.
        tree.node_mut(kids[1]).unwrap().set_attr("data-ld-dragging", "true");
        tree.node_mut(kids[1]).unwrap().style.set("transform", "translate(1px, 1px)");

        let outcome = run(&mut engine, &mut tree, DragEvent::EndAll);
        assert_eq!(outcome, DragOutcome::Restored { sessions: 1 });
        assert_eq!(tree.element_children(body), kids);
        assert!(tree.node(kids[1]).unwrap().style.get("transform").is_none());

        let again = run(&mut engine, &mut tree, DragEvent::EndAll);
        assert_eq!(again, DragOutcome::Restored { sessions: 0 });
    }

    #[test]
    fn threshold_ignores_small_moves() {
        let (mut tree, _body, kids) = stack(2);
        let config = RuntimeConfig {
            min_drag_distance: 5.0,
            ..RuntimeConfig::default()
        };
        let mut engine = ReorderEngine::new(&config);
        let id = StableId::intern("ld-0");
        run(&mut engine, &mut tree, DragEvent::Start { id, node: kids[0] });
        let outcome = run(
            &mut engine,
            &mut tree,
            DragEvent::Move {
                id,
                node: kids[0],
                delta: Point::new(2.0, 3.0),
                pointer: Point::new(2.0, 3.0),
            },
        );
        assert_eq!(outcome, DragOutcome::Ignored);
    }
}
