//! Content operations: structural edits, text editing, element queries.
//!
//! Every operation addresses nodes by dom id through the identity
//! registry and answers `None` when the id no longer resolves. Structural
//! edits go through `apply_effects` and schedule a layer-tree rebuild of
//! the parent they touched.

use crate::element::{
    ActionElement, ActionLocation, DomElement, InsertPosition, TextEditEnd, TextEditStart,
};
use crate::reorder::drop_index;
use crate::session::EditorSession;
use livedom_core::id::StableId;
use livedom_core::model::{DomNode, DomTree, Fragment, NodeKind, Point};
use livedom_core::mutation::{Applied, TreeMutation};
use livedom_core::NodeIndex;
use livedom_core::parser::{validate_property, validate_value};
use livedom_core::stylesheet::to_kebab_case;
use std::collections::{BTreeMap, HashSet};

/// Ids handed out while building one fragment, and the styles to persist
/// for them once it is inserted.
#[derive(Default)]
struct FragmentPlan {
    claimed: HashSet<String>,
    styled: Vec<(String, BTreeMap<String, String>)>,
}

/// Check every style in `element` and its children before anything is
/// created, so a bad value never leaves a half-styled subtree.
pub fn validate_styles(element: &ActionElement) -> Result<(), String> {
    for (property, value) in &element.styles {
        if value.trim().is_empty() {
            continue;
        }
        validate_property(&to_kebab_case(property))?;
        validate_value(value.trim())?;
    }
    element.children.iter().try_for_each(validate_styles)
}

/// Concatenated text of every text node under `idx`.
pub fn text_content(tree: &DomTree, idx: NodeIndex) -> String {
    let mut out = String::new();
    for d in tree.descendants(idx) {
        if let Some(DomNode {
            kind: NodeKind::Text { content },
            ..
        }) = tree.node(d)
        {
            out.push_str(content);
        }
    }
    out
}

impl EditorSession {
    // ─── Structure ───────────────────────────────────────────────────────

    fn build_fragment(&mut self, element: &ActionElement, plan: &mut FragmentPlan) -> Fragment {
        let id = match &element.dom_id {
            Some(id) if !plan.claimed.contains(id) && self.resolve(id).is_none() => id.clone(),
            requested => {
                if let Some(taken) = requested {
                    log::debug!("dom id {taken} is already in use, assigning a fresh one");
                }
                StableId::generate().as_str().to_string()
            }
        };
        plan.claimed.insert(id.clone());

        let mut node = DomNode::element(&element.tag_name);
        for (name, value) in &element.attributes {
            node.set_attr(name, value);
        }
        node.set_attr(&self.config.stable_id_attr, &id);
        node.set_attr(&self.config.inserted_attr, "true");
        if let Some(oid) = &element.oid {
            node.set_attr(&self.config.structural_id_attr, oid);
        }

        let mut fragment = Fragment::new(node);
        if let Some(text) = element.text_content.as_deref().filter(|t| !t.is_empty()) {
            fragment = fragment.child(DomNode::text(text));
        }
        for child in &element.children {
            fragment = fragment.child(self.build_fragment(child, plan));
        }
        if !element.styles.is_empty() {
            plan.styled.push((id, element.styles.clone()));
        }
        fragment
    }

    /// Persist styles requested for newly created elements.
    fn write_styles(&mut self, styled: Vec<(String, BTreeMap<String, String>)>) {
        if styled.is_empty() {
            return;
        }
        self.begin_edit();
        for (id, styles) in &styled {
            let written = self.styles.update(
                &mut self.tree,
                id,
                styles.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            );
            if let Err(e) = written {
                log::warn!("styles for {id} not written: {e}");
            }
        }
        self.drain_own();
    }

    fn bind_subtree(&mut self, idx: NodeIndex) {
        for d in self.tree.descendants(idx) {
            self.registry.get_or_assign(&mut self.tree, d);
        }
    }

    /// Create `element` (with its children) at `location`.
    pub fn insert_element(
        &mut self,
        element: &ActionElement,
        location: &ActionLocation,
    ) -> Option<DomElement> {
        if let Err(e) = validate_styles(element) {
            log::warn!("not inserting <{}>: {e}", element.tag_name);
            return None;
        }
        let target = self.resolve(&location.target_dom_id)?;
        let before = match location.position {
            InsertPosition::Append => None,
            InsertPosition::Prepend => self.tree.children(target).first().copied(),
            InsertPosition::Index { index } => {
                self.tree.element_children(target).get(index).copied()
            }
        };

        let mut plan = FragmentPlan::default();
        let fragment = self.build_fragment(element, &mut plan);
        let applied = self.apply_effects(vec![TreeMutation::InsertBefore {
            parent: target,
            fragment,
            before,
        }]);
        let Some(Applied::Inserted(idx)) = applied.into_iter().next() else {
            log::warn!("could not insert <{}> into {target:?}", element.tag_name);
            return None;
        };

        self.bind_subtree(idx);
        self.write_styles(plan.styled);
        self.schedule_rebuild(target);
        self.describe(idx, true)
    }

    /// Remove the element; returns its descriptor from before removal.
    pub fn remove_element(&mut self, dom_id: &str) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        let parent = self.tree.parent(idx)?;
        let removed = self.describe(idx, false)?;
        self.apply_effects(vec![TreeMutation::Remove { node: idx }]);
        self.schedule_rebuild(parent);
        Some(removed)
    }

    /// Move among element siblings to `new_index` (clamped).
    pub fn move_element(&mut self, dom_id: &str, new_index: usize) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        let parent = self.tree.parent(idx)?;
        let siblings: Vec<NodeIndex> = self
            .tree
            .element_children(parent)
            .into_iter()
            .filter(|c| *c != idx)
            .collect();
        let index = new_index.min(siblings.len());
        self.apply_effects(vec![TreeMutation::MoveBefore {
            node: idx,
            parent,
            before: siblings.get(index).copied(),
        }]);
        self.schedule_rebuild(parent);
        self.describe(idx, false)
    }

    /// Wrap the listed children of `parent_id` in a new `container`,
    /// placed where the first of them was.
    pub fn group_elements(
        &mut self,
        parent_id: &str,
        container: &ActionElement,
        child_ids: &[String],
    ) -> Option<DomElement> {
        if let Err(e) = validate_styles(container) {
            log::warn!("not grouping into <{}>: {e}", container.tag_name);
            return None;
        }
        let parent = self.resolve(parent_id)?;
        let mut children: Vec<(usize, NodeIndex)> = Vec::new();
        for id in child_ids {
            let Some(idx) = self.resolve(id) else {
                log::debug!("group: {id} not found, skipping");
                continue;
            };
            if self.tree.parent(idx) != Some(parent) {
                log::debug!("group: {id} is not a child of {parent_id}, skipping");
                continue;
            }
            if let Some(pos) = self.tree.index_in_parent(idx)
                && !children.iter().any(|(_, c)| *c == idx)
            {
                children.push((pos, idx));
            }
        }
        children.sort_by_key(|(pos, _)| *pos);
        let (_, first) = *children.first()?;

        let mut plan = FragmentPlan::default();
        let fragment = self.build_fragment(container, &mut plan);
        let applied = self.apply_effects(vec![TreeMutation::InsertBefore {
            parent,
            fragment,
            before: Some(first),
        }]);
        let Some(Applied::Inserted(group)) = applied.into_iter().next() else {
            return None;
        };

        let moves = children
            .iter()
            .map(|(_, c)| TreeMutation::MoveBefore {
                node: *c,
                parent: group,
                before: None,
            })
            .collect();
        self.apply_effects(moves);
        self.bind_subtree(group);
        self.write_styles(plan.styled);
        self.schedule_rebuild(parent);
        self.describe(group, false)
    }

    /// Put the container's children where the container is, then remove
    /// it. Returns the removed container's descriptor.
    pub fn ungroup_elements(&mut self, parent_id: &str, container_id: &str) -> Option<DomElement> {
        let parent = self.resolve(parent_id)?;
        let container = self.resolve(container_id)?;
        if self.tree.parent(container) != Some(parent) {
            return None;
        }
        let removed = self.describe(container, false)?;

        let mut effects: Vec<TreeMutation> = self
            .tree
            .children(container)
            .iter()
            .map(|c| TreeMutation::MoveBefore {
                node: *c,
                parent,
                before: Some(container),
            })
            .collect();
        effects.push(TreeMutation::Remove { node: container });
        self.apply_effects(effects);
        self.schedule_rebuild(parent);
        Some(removed)
    }

    // ─── Text ────────────────────────────────────────────────────────────

    pub fn start_editing_text(&mut self, dom_id: &str) -> Option<TextEditStart> {
        let idx = self.resolve(dom_id)?;
        let original_content = text_content(&self.tree, idx);
        let attr = self.config.editing_attr.clone();
        self.apply_effects(vec![TreeMutation::set_attr(idx, &attr, "true")]);
        Some(TextEditStart { original_content })
    }

    pub fn edit_text(&mut self, dom_id: &str, content: &str) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        self.apply_effects(vec![TreeMutation::SetText {
            node: idx,
            content: content.to_string(),
        }]);
        self.schedule_rebuild(idx);
        self.describe(idx, false)
    }

    pub fn stop_editing_text(&mut self, dom_id: &str) -> Option<TextEditEnd> {
        let idx = self.resolve(dom_id)?;
        let attr = self.config.editing_attr.clone();
        self.apply_effects(vec![TreeMutation::remove_attr(idx, &attr)]);
        Some(TextEditEnd {
            new_content: text_content(&self.tree, idx),
            dom_el: self.describe(idx, false)?,
        })
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn get_element_by_dom_id(&mut self, dom_id: &str, with_styles: bool) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        self.describe(idx, with_styles)
    }

    /// Index among element siblings, placeholders excluded. -1 when the
    /// id does not resolve.
    pub fn get_element_index(&mut self, dom_id: &str) -> i64 {
        let Some(idx) = self.resolve(dom_id) else {
            return -1;
        };
        let Some(parent) = self.tree.parent(idx) else {
            return -1;
        };
        self.tree
            .element_children(parent)
            .into_iter()
            .filter(|c| {
                self.tree
                    .node(*c)
                    .is_some_and(|n| !n.has_attr(&self.config.placeholder_attr))
            })
            .position(|c| c == idx)
            .map_or(-1, |p| p as i64)
    }

    pub fn get_parent_element(&mut self, dom_id: &str) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        let parent = self.element_parent(idx)?;
        self.describe(parent, false)
    }

    pub fn get_children_count(&mut self, dom_id: &str) -> Option<usize> {
        let idx = self.resolve(dom_id)?;
        Some(self.tree.element_children(idx).len())
    }

    /// The editable element under the point.
    pub fn get_element_at_loc(&mut self, x: f32, y: f32, with_styles: bool) -> Option<DomElement> {
        let hit = self.resolver.resolve(&self.tree, x, y)?;
        let idx = self.editable_at(hit)?;
        self.describe(idx, with_styles)
    }

    /// Where a drop at the point would land: the element under it and the
    /// child slot, using the same geometry as drag reordering.
    pub fn get_insert_location(&mut self, x: f32, y: f32) -> Option<ActionLocation> {
        let hit = self.resolver.resolve(&self.tree, x, y)?;
        let target = self.editable_at(hit)?;
        let siblings: Vec<NodeIndex> = self
            .tree
            .element_children(target)
            .into_iter()
            .filter(|c| {
                self.tree
                    .node(*c)
                    .is_some_and(|n| !n.has_attr(&self.config.placeholder_attr))
            })
            .collect();
        let index = drop_index(&self.tree, target, &siblings, Point::new(x, y));
        let dom_id = self.registry.get_or_assign(&mut self.tree, target)?;
        let position = if index >= siblings.len() {
            InsertPosition::Append
        } else {
            InsertPosition::Index { index }
        };
        Some(ActionLocation {
            target_dom_id: dom_id.as_str().to_string(),
            position,
        })
    }

    /// First element in document order that carries a structural id.
    pub fn get_first_tracked_element(&mut self) -> Option<DomElement> {
        let attr = &self.config.structural_id_attr;
        let idx = self.tree.descendants(self.tree.root).into_iter().find(|d| {
            self.tree
                .node(*d)
                .is_some_and(|n| n.is_element() && n.has_attr(attr))
        })?;
        self.describe(idx, false)
    }

    pub fn update_element_instance(
        &mut self,
        dom_id: &str,
        instance_id: &str,
        component_name: Option<&str>,
    ) -> Option<DomElement> {
        let idx = self.resolve(dom_id)?;
        let mut effects = vec![TreeMutation::set_attr(
            idx,
            &self.config.instance_id_attr,
            instance_id,
        )];
        if let Some(name) = component_name {
            effects.push(TreeMutation::set_attr(
                idx,
                &self.config.component_name_attr,
                name,
            ));
        }
        self.apply_effects(effects);
        self.schedule_rebuild(idx);
        self.describe(idx, false)
    }

    pub fn get_computed_style(&mut self, dom_id: &str) -> Option<BTreeMap<String, String>> {
        let idx = self.resolve(dom_id)?;
        Some(self.tree.node(idx)?.computed.to_map())
    }

    // ─── Styles ──────────────────────────────────────────────────────────

    /// Write style properties for `dom_id`; an empty value deletes. The
    /// element need not exist yet. Returns whether the sheet changed, or
    /// an error (and no write) for a property or value that would not
    /// parse back.
    pub fn update_style<'p>(
        &mut self,
        dom_id: &str,
        changes: impl IntoIterator<Item = (&'p str, &'p str)>,
    ) -> Result<bool, String> {
        self.begin_edit();
        let changed = self.styles.update(&mut self.tree, dom_id, changes);
        self.drain_own();
        changed
    }

    pub fn remove_style(&mut self, dom_id: &str, properties: &[&str]) -> bool {
        self.begin_edit();
        let changed = self.styles.remove(&mut self.tree, dom_id, properties);
        self.drain_own();
        changed
    }

    pub fn get_styles(&self, dom_id: &str) -> BTreeMap<String, String> {
        self.styles.query(&self.tree, dom_id)
    }
}
