//! The call contract: `(operation name, positional JSON args) -> JSON`.
//!
//! Operation names are the camelCase names the editor shell calls.
//! Misses answer `null`; only malformed calls are errors.

use crate::edit::validate_styles;
use crate::element::{ActionElement, ActionLocation, PositionResult};
use crate::error::RuntimeError;
use crate::reorder::DragOutcome;
use crate::session::EditorSession;
use livedom_core::model::Point;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Every operation `dispatch` understands.
pub const OPERATIONS: &[&str] = &[
    "processDom",
    "getElementAtLoc",
    "getElementByDomId",
    "getElementIndex",
    "getComputedStyleByDomId",
    "updateElementInstance",
    "getFirstTrackedElement",
    "getParentElement",
    "getChildrenCount",
    "getInsertLocation",
    "startDrag",
    "drag",
    "dragAbsolute",
    "endDrag",
    "endDragAbsolute",
    "endAllDrag",
    "startEditingText",
    "editText",
    "stopEditingText",
    "updateStyle",
    "removeStyle",
    "getStyles",
    "insertElement",
    "removeElement",
    "moveElement",
    "groupElements",
    "ungroupElements",
];

// ─── Arguments ───────────────────────────────────────────────────────────

struct Args<'a> {
    op: &'a str,
    values: &'a [Value],
}

impl Args<'_> {
    fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, RuntimeError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Err(RuntimeError::MissingArgument {
                op: self.op.to_string(),
                index,
            }),
            Some(v) => self.decode(index, v),
        }
    }

    fn opt<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, RuntimeError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => self.decode(index, v).map(Some),
        }
    }

    fn flag(&self, index: usize) -> Result<bool, RuntimeError> {
        Ok(self.opt(index)?.unwrap_or(false))
    }

    fn decode<T: DeserializeOwned>(&self, index: usize, v: &Value) -> Result<T, RuntimeError> {
        T::deserialize(v).map_err(|e| self.invalid(index, e.to_string()))
    }

    fn point(&self, x: usize, y: usize) -> Result<Point, RuntimeError> {
        Ok(Point::new(self.get(x)?, self.get(y)?))
    }

    fn invalid(&self, index: usize, reason: String) -> RuntimeError {
        RuntimeError::InvalidArgument {
            op: self.op.to_string(),
            index,
            reason,
        }
    }

    /// An element argument whose styles all persist cleanly.
    fn element(&self, index: usize) -> Result<ActionElement, RuntimeError> {
        let element: ActionElement = self.get(index)?;
        validate_styles(&element).map_err(|reason| self.invalid(index, reason))?;
        Ok(element)
    }
}

fn reply<T: Serialize>(value: Option<T>) -> Result<Value, RuntimeError> {
    match value {
        Some(v) => Ok(serde_json::to_value(v)?),
        None => Ok(Value::Null),
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────

/// Run one operation against the session.
pub fn dispatch(
    session: &mut EditorSession,
    op: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    log::trace!("dispatch {op} {args:?}");
    let a = Args { op, values: args };

    match op {
        // Layer tree and queries
        "processDom" => {
            let root: Option<String> = a.opt(0)?;
            reply(session.process_dom(root.as_deref()))
        }
        "getElementAtLoc" => {
            let p = a.point(0, 1)?;
            reply(session.get_element_at_loc(p.x, p.y, a.flag(2)?))
        }
        "getElementByDomId" => {
            let id: String = a.get(0)?;
            reply(session.get_element_by_dom_id(&id, a.flag(1)?))
        }
        "getElementIndex" => {
            let id: String = a.get(0)?;
            Ok(Value::from(session.get_element_index(&id)))
        }
        "getComputedStyleByDomId" => {
            let id: String = a.get(0)?;
            reply(session.get_computed_style(&id))
        }
        "updateElementInstance" => {
            let id: String = a.get(0)?;
            let instance: String = a.get(1)?;
            let component: Option<String> = a.opt(2)?;
            reply(session.update_element_instance(&id, &instance, component.as_deref()))
        }
        "getFirstTrackedElement" => reply(session.get_first_tracked_element()),
        "getParentElement" => {
            let id: String = a.get(0)?;
            reply(session.get_parent_element(&id))
        }
        "getChildrenCount" => {
            let id: String = a.get(0)?;
            reply(session.get_children_count(&id))
        }
        "getInsertLocation" => {
            let p = a.point(0, 1)?;
            reply(session.get_insert_location(p.x, p.y))
        }

        // Drag
        "startDrag" => {
            let id: String = a.get(0)?;
            reply(session.start_drag(&id))
        }
        "drag" | "dragAbsolute" => {
            let id: String = a.get(0)?;
            let delta = a.point(1, 2)?;
            let pointer = a.point(3, 4)?;
            match session.drag(&id, delta, pointer) {
                Some(DragOutcome::Positioned { left, top }) => {
                    reply(Some(PositionResult { left, top }))
                }
                _ => Ok(Value::Null),
            }
        }
        "endDrag" | "endDragAbsolute" => {
            let id: String = a.get(0)?;
            reply(session.end_drag(&id))
        }
        "endAllDrag" => Ok(Value::from(session.end_all_drag())),

        // Text
        "startEditingText" => {
            let id: String = a.get(0)?;
            reply(session.start_editing_text(&id))
        }
        "editText" => {
            let id: String = a.get(0)?;
            let content: String = a.get(1)?;
            reply(session.edit_text(&id, &content))
        }
        "stopEditingText" => {
            let id: String = a.get(0)?;
            reply(session.stop_editing_text(&id))
        }

        // Styles
        "updateStyle" => {
            let id: String = a.get(0)?;
            let changes: BTreeMap<String, String> = a.get(1)?;
            let changed = session
                .update_style(&id, changes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .map_err(|reason| a.invalid(1, reason))?;
            Ok(Value::Bool(changed))
        }
        "removeStyle" => {
            let id: String = a.get(0)?;
            let properties: Vec<String> = a.get(1)?;
            let names: Vec<&str> = properties.iter().map(String::as_str).collect();
            Ok(Value::Bool(session.remove_style(&id, &names)))
        }
        "getStyles" => {
            let id: String = a.get(0)?;
            reply(Some(session.get_styles(&id)))
        }

        // Structure
        "insertElement" => {
            let element = a.element(0)?;
            let location: ActionLocation = a.get(1)?;
            reply(session.insert_element(&element, &location))
        }
        "removeElement" => {
            let id: String = a.get(0)?;
            reply(session.remove_element(&id))
        }
        "moveElement" => {
            let id: String = a.get(0)?;
            let index: usize = a.get(1)?;
            reply(session.move_element(&id, index))
        }
        "groupElements" => {
            let parent: String = a.get(0)?;
            let container = a.element(1)?;
            let children: Vec<String> = a.get(2)?;
            reply(session.group_elements(&parent, &container, &children))
        }
        "ungroupElements" => {
            let parent: String = a.get(0)?;
            let container: String = a.get(1)?;
            reply(session.ungroup_elements(&parent, &container))
        }

        _ => Err(RuntimeError::UnknownOperation(op.to_string())),
    }
}
