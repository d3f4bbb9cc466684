//! Box layout solver.
//!
//! Hosts backed by a real rendering engine report `DomNode::bounds`
//! themselves. Headless hosts and tests call [`resolve_layout`] to derive
//! them from `ComputedStyle`: block children stack vertically, flex lays
//! out along its direction with `gap`, grid fills `grid_columns` equal
//! tracks, and absolute/fixed children sit at their `left`/`top` offsets.
//! Auto heights grow to fit the laid-out children.

use crate::model::*;
use petgraph::graph::NodeIndex;

/// Line box height given to text runs.
pub const TEXT_LINE_HEIGHT: f32 = 16.0;

/// Advance width of one character of a text run.
pub const TEXT_CHAR_WIDTH: f32 = 8.0;

/// The page (viewport) dimensions.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

#[derive(Clone, Copy)]
enum FlowMode {
    Column,
    Row,
    Grid(u32),
}

/// Lay out every node, writing `bounds` in place.
pub fn resolve_layout(tree: &mut DomTree, viewport: Viewport) {
    let root = tree.root;
    if let Some(node) = tree.node_mut(root) {
        node.bounds = Rect::new(0.0, 0.0, viewport.width, viewport.height);
    }
    layout_children(tree, root);
}

/// Lay out the children of `parent` inside its already-placed box.
/// Returns the (width, height) extent of the in-flow content.
fn layout_children(tree: &mut DomTree, parent: NodeIndex) -> (f32, f32) {
    let Some(node) = tree.node(parent) else {
        return (0.0, 0.0);
    };
    let style = node.computed;
    let frame = node.bounds;
    let content = frame.inset(style.padding);
    let mode = match style.display {
        Display::Flex if style.flex_direction == FlexDirection::Row => FlowMode::Row,
        Display::Grid if style.grid_columns > 0 => FlowMode::Grid(style.grid_columns),
        _ => FlowMode::Column,
    };
    let gap = style.gap;

    let mut cursor_x = content.x;
    let mut cursor_y = content.y;
    let mut right = content.x;
    let mut bottom = content.y;
    let mut placed = 0u32;
    let mut row_height = 0.0f32;

    let cell_width = match mode {
        FlowMode::Grid(cols) => {
            ((content.width - gap * (cols.saturating_sub(1)) as f32) / cols as f32).max(0.0)
        }
        _ => 0.0,
    };

    for child in tree.children(parent).to_vec() {
        let Some(child_node) = tree.node(child) else {
            continue;
        };

        if let NodeKind::Text { content: text } = &child_node.kind {
            let width = (text.chars().count() as f32 * TEXT_CHAR_WIDTH).min(content.width);
            let y = if placed == 0 { cursor_y } else { cursor_y + gap };
            let rect = match mode {
                FlowMode::Row => Rect::new(
                    if placed == 0 { cursor_x } else { cursor_x + gap },
                    content.y,
                    width,
                    TEXT_LINE_HEIGHT,
                ),
                _ => Rect::new(content.x, y, width, TEXT_LINE_HEIGHT),
            };
            set_bounds(tree, child, rect);
            match mode {
                FlowMode::Row => cursor_x = rect.x + rect.width,
                _ => cursor_y = rect.y + rect.height,
            }
            right = right.max(rect.x + rect.width);
            bottom = bottom.max(rect.y + rect.height);
            placed += 1;
            continue;
        }

        let computed = child_node.computed;
        if !child_node.is_rendered() {
            set_bounds(tree, child, Rect::new(content.x, content.y, 0.0, 0.0));
            continue;
        }

        if matches!(
            tree.effective_position(child),
            Position::Absolute | Position::Fixed
        ) {
            let (left, top) = offsets(tree, child);
            let rect = Rect::new(
                frame.x + left,
                frame.y + top,
                computed.width.unwrap_or(0.0),
                computed.height.unwrap_or(0.0),
            );
            place(tree, child, rect);
            continue;
        }

        match mode {
            FlowMode::Column => {
                let y = if placed == 0 { cursor_y } else { cursor_y + gap };
                let width = computed.width.unwrap_or(content.width);
                let rect = place(
                    tree,
                    child,
                    Rect::new(content.x, y, width, computed.height.unwrap_or(0.0)),
                );
                cursor_y = rect.y + rect.height;
                right = right.max(rect.x + rect.width);
                bottom = bottom.max(cursor_y);
            }
            FlowMode::Row => {
                let x = if placed == 0 { cursor_x } else { cursor_x + gap };
                let rect = place(
                    tree,
                    child,
                    Rect::new(
                        x,
                        content.y,
                        computed.width.unwrap_or(0.0),
                        computed.height.unwrap_or(0.0),
                    ),
                );
                cursor_x = rect.x + rect.width;
                right = right.max(cursor_x);
                bottom = bottom.max(rect.y + rect.height);
            }
            FlowMode::Grid(cols) => {
                let col = placed % cols;
                if col == 0 && placed > 0 {
                    cursor_y += row_height + gap;
                    row_height = 0.0;
                }
                let x = content.x + col as f32 * (cell_width + gap);
                let rect = place(
                    tree,
                    child,
                    Rect::new(
                        x,
                        cursor_y,
                        computed.width.unwrap_or(cell_width),
                        computed.height.unwrap_or(0.0),
                    ),
                );
                row_height = row_height.max(rect.height);
                right = right.max(rect.x + rect.width);
                bottom = bottom.max(cursor_y + row_height);
            }
        }
        placed += 1;
    }

    ((right - content.x).max(0.0), (bottom - content.y).max(0.0))
}

/// Place `idx` at `rect`, lay out its subtree, then resolve auto sizes
/// from the content extent. Returns the final box.
fn place(tree: &mut DomTree, idx: NodeIndex, rect: Rect) -> Rect {
    set_bounds(tree, idx, rect);
    let (extent_w, extent_h) = layout_children(tree, idx);
    let Some(node) = tree.node_mut(idx) else {
        return rect;
    };
    let pad = node.computed.padding;
    if node.computed.height.is_none() {
        node.bounds.height = extent_h + pad.top + pad.bottom;
    }
    if node.computed.width.is_none() && rect.width == 0.0 {
        node.bounds.width = extent_w + pad.left + pad.right;
    }
    node.bounds
}

fn set_bounds(tree: &mut DomTree, idx: NodeIndex, rect: Rect) {
    if let Some(node) = tree.node_mut(idx) {
        node.bounds = rect;
    }
}

/// `left`/`top` for a positioned box. Inline declarations win.
fn offsets(tree: &DomTree, idx: NodeIndex) -> (f32, f32) {
    let Some(node) = tree.node(idx) else {
        return (0.0, 0.0);
    };
    let left = node
        .style
        .get("left")
        .and_then(parse_px)
        .or(node.computed.left)
        .unwrap_or(0.0);
    let top = node
        .style
        .get("top")
        .and_then(parse_px)
        .or(node.computed.top)
        .unwrap_or(0.0);
    (left, top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block(w: f32, h: f32) -> DomNode {
        DomNode::element("div").with_size(w, h)
    }

    #[test]
    fn block_children_stack_vertically() {
        let mut tree = DomTree::new();
        let body = tree.append_child(tree.root, DomNode::element("body")).unwrap();
        let a = tree.append_child(body, block(100.0, 50.0)).unwrap();
        let b = tree.append_child(body, block(100.0, 50.0)).unwrap();
        resolve_layout(&mut tree, Viewport::default());

        assert_eq!(tree.node(a).unwrap().bounds, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(tree.node(b).unwrap().bounds, Rect::new(0.0, 50.0, 100.0, 50.0));
        // Auto-height body grows to fit.
        assert_eq!(tree.node(body).unwrap().bounds.height, 100.0);
    }

    #[test]
    fn flex_row_respects_gap_and_padding() {
        let mut tree = DomTree::new();
        let style = ComputedStyle {
            display: Display::Flex,
            gap: 10.0,
            padding: Edges::uniform(5.0),
            ..ComputedStyle::default()
        };
        let row = tree
            .append_child(tree.root, DomNode::element("div").with_computed(style))
            .unwrap();
        let a = tree.append_child(row, block(20.0, 20.0)).unwrap();
        let b = tree.append_child(row, block(30.0, 20.0)).unwrap();
        resolve_layout(&mut tree, Viewport::default());

        assert_eq!(tree.node(a).unwrap().bounds, Rect::new(5.0, 5.0, 20.0, 20.0));
        assert_eq!(tree.node(b).unwrap().bounds, Rect::new(35.0, 5.0, 30.0, 20.0));
    }

    #[test]
    fn grid_fills_equal_tracks() {
        let mut tree = DomTree::new();
        let style = ComputedStyle {
            display: Display::Grid,
            grid_columns: 2,
            grid_rows: 2,
            width: Some(200.0),
            height: Some(200.0),
            ..ComputedStyle::default()
        };
        let grid = tree
            .append_child(tree.root, DomNode::element("div").with_computed(style))
            .unwrap();
        let cells: Vec<_> = (0..4)
            .map(|_| {
                tree.append_child(grid, DomNode::element("div").with_size(100.0, 100.0))
                    .unwrap()
            })
            .collect();
        resolve_layout(&mut tree, Viewport::default());

        assert_eq!(tree.node(cells[3]).unwrap().bounds, Rect::new(100.0, 100.0, 100.0, 100.0));
        assert_eq!(tree.node(cells[1]).unwrap().bounds.x, 100.0);
    }

    #[test]
    fn absolute_children_use_inline_offsets() {
        let mut tree = DomTree::new();
        let body = tree
            .append_child(tree.root, DomNode::element("body").with_size(400.0, 400.0))
            .unwrap();
        let mut node = block(10.0, 10.0);
        node.style.set("position", "absolute");
        node.style.set("left", "40px");
        node.style.set("top", "25px");
        let abs = tree.append_child(body, node).unwrap();
        let flow = tree.append_child(body, block(50.0, 50.0)).unwrap();
        resolve_layout(&mut tree, Viewport::default());

        assert_eq!(tree.node(abs).unwrap().bounds, Rect::new(40.0, 25.0, 10.0, 10.0));
        // Out-of-flow siblings do not push flow content.
        assert_eq!(tree.node(flow).unwrap().bounds.y, 0.0);
    }

    #[test]
    fn hidden_children_take_no_space() {
        let mut tree = DomTree::new();
        let body = tree.append_child(tree.root, DomNode::element("body")).unwrap();
        tree.append_child(body, block(10.0, 30.0).with_display(Display::None))
            .unwrap();
        let shown = tree.append_child(body, block(10.0, 30.0)).unwrap();
        resolve_layout(&mut tree, Viewport::default());
        assert_eq!(tree.node(shown).unwrap().bounds.y, 0.0);
    }
}
