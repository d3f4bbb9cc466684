//! Host document model.
//!
//! The live document is a tree stored in a `StableDiGraph`: nodes are
//! elements and text runs, edges go parent → child. Child order is kept
//! explicitly per parent because DOM order is semantic (it is what drag
//! reorder manipulates). Every structural change is appended to a pending
//! queue of `MutationRecord`s which observers drain in batches, the same
//! way a page-level mutation observer delivers records.

use crate::emitter::emit_declarations;
use crate::parser::parse_declarations;
use crate::stylesheet::Declaration;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

// ─── Geometry ────────────────────────────────────────────────────────────

/// A point in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Box insets (padding).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub const fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// Axis-aligned border box in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Shrink by `edges`, never producing negative sizes.
    pub fn inset(&self, edges: Edges) -> Rect {
        Rect {
            x: self.x + edges.left,
            y: self.y + edges.top,
            width: (self.width - edges.left - edges.right).max(0.0),
            height: (self.height - edges.top - edges.bottom).max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ─── Computed style ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Block,
    Inline,
    Flex,
    Grid,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexDirection {
    #[default]
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

impl Position {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "static" => Some(Position::Static),
            "relative" => Some(Position::Relative),
            "absolute" => Some(Position::Absolute),
            "fixed" => Some(Position::Fixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Static => "static",
            Position::Relative => "relative",
            Position::Absolute => "absolute",
            Position::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// The subset of the host's computed style that identity, snapshot, and
/// reorder logic depend on. Hosts with a real layout engine fill this in;
/// otherwise `layout::resolve_layout` derives `DomNode::bounds` from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedStyle {
    pub display: Display,
    pub position: Position,
    pub flex_direction: FlexDirection,
    /// Number of explicit grid column tracks (0 = none declared).
    pub grid_columns: u32,
    /// Number of explicit grid row tracks (0 = implicit).
    pub grid_rows: u32,
    pub visibility: Visibility,
    pub opacity: f32,
    pub padding: Edges,
    pub gap: f32,
    /// Declared size; `None` means auto.
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Offsets for positioned boxes.
    pub left: Option<f32>,
    pub top: Option<f32>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            position: Position::Static,
            flex_direction: FlexDirection::Row,
            grid_columns: 0,
            grid_rows: 0,
            visibility: Visibility::Visible,
            opacity: 1.0,
            padding: Edges::default(),
            gap: 0.0,
            width: None,
            height: None,
            left: None,
            top: None,
        }
    }
}

impl ComputedStyle {
    /// Flatten to CSS property → value pairs for the call boundary.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let display = match self.display {
            Display::Block => "block",
            Display::Inline => "inline",
            Display::Flex => "flex",
            Display::Grid => "grid",
            Display::None => "none",
        };
        map.insert("display".into(), display.into());
        map.insert("position".into(), self.position.as_str().into());
        if self.display == Display::Flex {
            let dir = match self.flex_direction {
                FlexDirection::Row => "row",
                FlexDirection::Column => "column",
            };
            map.insert("flexDirection".into(), dir.into());
        }
        if self.display == Display::Grid {
            map.insert("gridColumnCount".into(), self.grid_columns.to_string());
            map.insert("gridRowCount".into(), self.grid_rows.to_string());
        }
        let visibility = match self.visibility {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        };
        map.insert("visibility".into(), visibility.into());
        map.insert("opacity".into(), format_px(self.opacity, ""));
        if let Some(w) = self.width {
            map.insert("width".into(), format_px(w, "px"));
        }
        if let Some(h) = self.height {
            map.insert("height".into(), format_px(h, "px"));
        }
        if let Some(l) = self.left {
            map.insert("left".into(), format_px(l, "px"));
        }
        if let Some(t) = self.top {
            map.insert("top".into(), format_px(t, "px"));
        }
        map
    }
}

/// Format a number without a trailing `.0`, followed by `unit`.
pub fn format_px(v: f32, unit: &str) -> String {
    let mut s = format!("{v:.2}");
    if s.contains('.') {
        s = s.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s.push_str(unit);
    s
}

/// Read a plain `<number>px` (or unitless number) value.
pub fn parse_px(value: &str) -> Option<f32> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    v.parse::<f32>().ok().filter(|n| n.is_finite())
}

// ─── Inline style ────────────────────────────────────────────────────────

/// The node's `style` attribute as ordered declarations (kebab-case names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineStyle {
    pub declarations: Vec<Declaration>,
}

impl InlineStyle {
    /// Parse `style` attribute text. Malformed text yields an empty style.
    pub fn from_css_text(text: &str) -> Self {
        match parse_declarations(text) {
            Ok(declarations) => Self { declarations },
            Err(e) => {
                log::warn!("discarding malformed inline style `{text}`: {e}");
                Self::default()
            }
        }
    }

    pub fn to_css_text(&self) -> String {
        emit_declarations(&self.declarations)
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }

    /// Replace or append a declaration.
    pub fn set(&mut self, property: &str, value: &str) {
        if let Some(decl) = self
            .declarations
            .iter_mut()
            .find(|d| d.property == property)
        {
            decl.value = value.to_string();
        } else {
            self.declarations.push(Declaration::new(property, value));
        }
    }

    /// Remove a declaration, returning its previous value.
    pub fn remove(&mut self, property: &str) -> Option<String> {
        let pos = self
            .declarations
            .iter()
            .position(|d| d.property == property)?;
        Some(self.declarations.remove(pos).value)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// The node kinds in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The document itself; always the root.
    Document,
    /// An element with a lowercase tag name.
    Element { tag: String },
    /// A text run.
    Text { content: String },
}

/// A single node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub kind: NodeKind,

    /// Attributes in insertion order.
    pub attributes: SmallVec<[(String, String); 4]>,

    /// Inline `style` declarations.
    pub style: InlineStyle,

    /// Host-computed style.
    pub computed: ComputedStyle,

    /// Host-computed border box.
    pub bounds: Rect,
}

impl DomNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: SmallVec::new(),
            style: InlineStyle::default(),
            computed: ComputedStyle::default(),
            bounds: Rect::default(),
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        })
    }

    pub fn text(content: &str) -> Self {
        Self::with_kind(NodeKind::Text {
            content: content.to_string(),
        })
    }

    pub fn document() -> Self {
        Self::with_kind(NodeKind::Document)
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            self.attributes.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Whether the host renders a box for this node at all.
    pub fn is_rendered(&self) -> bool {
        self.computed.display != Display::None
    }

    /// Rendered, not `visibility: hidden`, and not fully transparent.
    pub fn is_visible(&self) -> bool {
        self.is_rendered()
            && self.computed.visibility == Visibility::Visible
            && self.computed.opacity > 0.0
    }

    // Builder helpers used by hosts and fixtures.

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_computed(mut self, computed: ComputedStyle) -> Self {
        self.computed = computed;
        self
    }

    pub fn with_display(mut self, display: Display) -> Self {
        self.computed.display = display;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.computed.width = Some(width);
        self.computed.height = Some(height);
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }
}

/// A detached subtree: either built off-tree for insertion, or handed back
/// by a removal. `origin` is the index the node had while attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub node: DomNode,
    pub children: Vec<Fragment>,
    pub origin: Option<NodeIndex>,
}

impl Fragment {
    pub fn new(node: DomNode) -> Self {
        Self {
            node,
            children: Vec::new(),
            origin: None,
        }
    }

    pub fn child(mut self, child: impl Into<Fragment>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Pre-order walk over this fragment and all descendants.
    pub fn walk(&self) -> Vec<&Fragment> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(f) = stack.pop() {
            out.push(f);
            for c in f.children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }
}

impl From<DomNode> for Fragment {
    fn from(node: DomNode) -> Self {
        Fragment::new(node)
    }
}

// ─── Mutation records ────────────────────────────────────────────────────

/// One structural change, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    /// `node` (and its subtree) was inserted under `parent`.
    Added { parent: NodeIndex, node: NodeIndex },
    /// A subtree was removed from `parent`. The node indices inside
    /// `detached` are no longer live and may be reused.
    Removed {
        parent: NodeIndex,
        detached: Fragment,
    },
    /// `node` kept its index but changed position or parent.
    Moved {
        from: NodeIndex,
        to: NodeIndex,
        node: NodeIndex,
    },
}

// ─── Document tree ───────────────────────────────────────────────────────

/// The live document.
#[derive(Debug, Clone)]
pub struct DomTree {
    /// The underlying directed graph.
    pub graph: StableDiGraph<DomNode, ()>,

    /// The document node.
    pub root: NodeIndex,

    /// Explicit child order per parent.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,

    /// Structural changes not yet drained by an observer.
    pending: Vec<MutationRecord>,
}

impl DomTree {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(DomNode::document());
        Self {
            graph,
            root,
            child_order: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn contains(&self, idx: NodeIndex) -> bool {
        self.graph.contains_node(idx)
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&DomNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut DomNode> {
        self.graph.node_weight_mut(idx)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the parent index of a node.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        if !self.contains(idx) {
            return None;
        }
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Children of a node in document order.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Element children of a node in document order.
    pub fn element_children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.children(idx)
            .iter()
            .copied()
            .filter(|c| self.graph[*c].is_element())
            .collect()
    }

    /// Position of `idx` among all of its parent's children.
    pub fn index_in_parent(&self, idx: NodeIndex) -> Option<usize> {
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|c| *c == idx)
    }

    /// Pre-order traversal from `start`, including `start`.
    pub fn descendants(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if !self.contains(start) {
            return out;
        }
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            for c in self.children(idx).iter().rev() {
                stack.push(*c);
            }
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `idx`.
    pub fn is_ancestor_of(&self, ancestor: NodeIndex, idx: NodeIndex) -> bool {
        let mut current = self.parent(idx);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// First element in document order carrying `name="value"`.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeIndex> {
        self.descendants(self.root)
            .into_iter()
            .find(|idx| self.graph[*idx].attr(name) == Some(value))
    }

    /// All elements in document order carrying attribute `name`.
    pub fn find_all_with_attr(&self, name: &str) -> Vec<NodeIndex> {
        self.descendants(self.root)
            .into_iter()
            .filter(|idx| self.graph[*idx].has_attr(name))
            .collect()
    }

    /// Concatenated content of the node's direct text children.
    pub fn direct_text(&self, idx: NodeIndex) -> String {
        let mut out = String::new();
        for c in self.children(idx) {
            if let NodeKind::Text { content } = &self.graph[*c].kind {
                out.push_str(content);
            }
        }
        out
    }

    /// Effective `position`: an inline declaration wins over the computed value.
    pub fn effective_position(&self, idx: NodeIndex) -> Position {
        let Some(node) = self.node(idx) else {
            return Position::Static;
        };
        node.style
            .get("position")
            .and_then(Position::parse)
            .unwrap_or(node.computed.position)
    }

    // ─── Structural edits (recorded) ────────────────────────────────────

    /// Insert `fragment` under `parent`, before `before` (or at the end when
    /// `before` is `None` or not a child of `parent`). Records one `Added`.
    pub fn insert_before(
        &mut self,
        parent: NodeIndex,
        fragment: impl Into<Fragment>,
        before: Option<NodeIndex>,
    ) -> Option<NodeIndex> {
        if !self.contains(parent) || matches!(self.graph[parent].kind, NodeKind::Text { .. }) {
            return None;
        }
        let idx = self.attach(parent, fragment.into(), before);
        self.pending.push(MutationRecord::Added { parent, node: idx });
        Some(idx)
    }

    /// Append `fragment` as the last child of `parent`.
    pub fn append_child(
        &mut self,
        parent: NodeIndex,
        fragment: impl Into<Fragment>,
    ) -> Option<NodeIndex> {
        self.insert_before(parent, fragment, None)
    }

    fn attach(&mut self, parent: NodeIndex, fragment: Fragment, before: Option<NodeIndex>) -> NodeIndex {
        let Fragment { node, children, .. } = fragment;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        let order = self.child_order.entry(parent).or_default();
        match before.and_then(|b| order.iter().position(|c| *c == b)) {
            Some(pos) => order.insert(pos, idx),
            None => order.push(idx),
        }
        for child in children {
            self.attach(idx, child, None);
        }
        idx
    }

    /// Detach a subtree. The root cannot be removed. Records one `Removed`.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<Fragment> {
        if idx == self.root {
            return None;
        }
        let parent = self.parent(idx)?;
        if let Some(order) = self.child_order.get_mut(&parent) {
            order.retain(|c| *c != idx);
        }
        let detached = self.detach(idx)?;
        self.pending.push(MutationRecord::Removed {
            parent,
            detached: detached.clone(),
        });
        Some(detached)
    }

    fn detach(&mut self, idx: NodeIndex) -> Option<Fragment> {
        let children = self.child_order.remove(&idx).unwrap_or_default();
        let mut detached_children = Vec::with_capacity(children.len());
        for c in children {
            if let Some(f) = self.detach(c) {
                detached_children.push(f);
            }
        }
        let node = self.graph.remove_node(idx)?;
        Some(Fragment {
            node,
            children: detached_children,
            origin: Some(idx),
        })
    }

    /// Move an attached node under `parent`, before `before` (or to the end).
    /// Refuses to move a node into itself or its own subtree.
    pub fn move_before(
        &mut self,
        idx: NodeIndex,
        parent: NodeIndex,
        before: Option<NodeIndex>,
    ) -> bool {
        if idx == self.root || !self.contains(parent) || idx == parent {
            return false;
        }
        if self.is_ancestor_of(idx, parent) || before == Some(idx) {
            return false;
        }
        let Some(from) = self.parent(idx) else {
            return false;
        };
        if let Some(edge) = self.graph.find_edge(from, idx) {
            self.graph.remove_edge(edge);
        }
        if let Some(order) = self.child_order.get_mut(&from) {
            order.retain(|c| *c != idx);
        }
        self.graph.add_edge(parent, idx, ());
        let order = self.child_order.entry(parent).or_default();
        match before.and_then(|b| order.iter().position(|c| *c == b)) {
            Some(pos) => order.insert(pos, idx),
            None => order.push(idx),
        }
        self.pending.push(MutationRecord::Moved {
            from,
            to: parent,
            node: idx,
        });
        true
    }

    /// Replace the node's children with a single text run (or set the text
    /// of a text node directly).
    pub fn set_text_content(&mut self, idx: NodeIndex, content: &str) -> bool {
        match self.graph.node_weight_mut(idx).map(|n| &mut n.kind) {
            Some(NodeKind::Text { content: c }) => {
                *c = content.to_string();
                true
            }
            Some(NodeKind::Element { .. }) => {
                for c in self.children(idx).to_vec() {
                    self.remove(c);
                }
                if !content.is_empty() {
                    self.append_child(idx, DomNode::text(content));
                }
                true
            }
            _ => false,
        }
    }

    // ─── Mutation queue ─────────────────────────────────────────────────

    /// Drain all pending mutation records in delivery order.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
