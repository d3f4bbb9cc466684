//! WASM bridge for livedom: exposes the editing runtime to the page.
//!
//! Compiled via `wasm-pack build --target web` and loaded into the edited
//! page next to a small script that mirrors DOM changes in and applies
//! the runtime's tree back out. Everything crosses the boundary as JSON
//! strings.

mod host;

pub use host::{HostMetrics, HostNode};

use livedom_core::layout::{Viewport, resolve_layout};
use livedom_core::NodeIndex;
use livedom_editor::{EditorSession, OPERATIONS, RuntimeConfig, dispatch};
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;

/// One editing session bound to the page.
#[wasm_bindgen]
pub struct LiveDomRuntime {
    session: EditorSession,
}

#[wasm_bindgen]
impl LiveDomRuntime {
    /// Create a runtime from a (possibly partial, possibly empty) JSON
    /// config.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<LiveDomRuntime, JsValue> {
        console_setup();
        Self::from_config(config_json).map_err(|e| js_sys::Error::new(&e).into())
    }

    /// Invoke a named operation with a JSON array of positional args.
    /// Returns `{"ok":true,"result":...}` or `{"ok":false,"error":"..."}`.
    pub fn call(&mut self, op: &str, args_json: &str) -> String {
        let args: Vec<Value> = if args_json.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str(args_json) {
                Ok(args) => args,
                Err(e) => return failure(&format!("Invalid arguments: {e}")),
            }
        };
        match dispatch(&mut self.session, op, &args) {
            Ok(result) => json!({ "ok": true, "result": result }).to_string(),
            Err(e) => failure(&e.to_string()),
        }
    }

    /// Names of every callable operation.
    pub fn operations(&self) -> js_sys::Array {
        OPERATIONS.iter().map(|op| JsValue::from_str(op)).collect()
    }

    // ─── Host mirror ─────────────────────────────────────────────────────

    /// Mirror a host insertion under `parent_id` (empty = document), before
    /// `before_id` when given. Returns the new node's dom id, or an empty
    /// string if the insertion could not be mirrored.
    pub fn mirror_insert(
        &mut self,
        parent_id: &str,
        before_id: Option<String>,
        node_json: &str,
    ) -> String {
        let Some(parent) = self.node_or_root(parent_id) else {
            log::warn!("mirror insert: unknown parent {parent_id}");
            return String::new();
        };
        let before = before_id.as_deref().and_then(|id| self.session.resolve(id));
        let fragment = match serde_json::from_str::<HostNode>(node_json)
            .map_err(|e| e.to_string())
            .and_then(HostNode::into_fragment)
        {
            Ok(f) => f,
            Err(e) => {
                log::warn!("mirror insert: {e}");
                return String::new();
            }
        };
        self.session
            .tree
            .insert_before(parent, fragment, before)
            .and_then(|idx| self.session.describe(idx, false))
            .map(|el| el.dom_id.as_str().to_string())
            .unwrap_or_default()
    }

    /// Mirror a host removal.
    pub fn mirror_remove(&mut self, dom_id: &str) -> bool {
        match self.session.resolve(dom_id) {
            Some(idx) => self.session.tree.remove(idx).is_some(),
            None => false,
        }
    }

    /// Refresh computed style and bounds reported by the host.
    pub fn mirror_metrics(&mut self, dom_id: &str, metrics_json: &str) -> bool {
        let Ok(metrics) = serde_json::from_str::<HostMetrics>(metrics_json) else {
            return false;
        };
        let Some(idx) = self.session.resolve(dom_id) else {
            return false;
        };
        let Some(node) = self.session.tree.node_mut(idx) else {
            return false;
        };
        if let Some(computed) = metrics.computed {
            node.computed = computed;
        }
        if let Some(bounds) = metrics.bounds {
            node.bounds = bounds;
        }
        true
    }

    /// Derive bounds from computed styles, for hosts without a layout
    /// engine of their own.
    pub fn layout(&mut self, width: f32, height: f32) {
        resolve_layout(&mut self.session.tree, Viewport { width, height });
    }

    // ─── Time and events ─────────────────────────────────────────────────

    /// Handle mirrored host mutations now.
    pub fn notify_mutations(&mut self, now_ms: f64) {
        self.session.on_mutations(to_ms(now_ms));
    }

    /// Run deferred work (debounced rebuilds, initial-processing retries).
    pub fn tick(&mut self, now_ms: f64) {
        self.session.tick(to_ms(now_ms));
    }

    pub fn schedule_initial_processing(&mut self, now_ms: f64) {
        self.session.schedule_initial_processing(to_ms(now_ms));
    }

    /// Pending session events as a JSON array.
    pub fn drain_events(&mut self) -> String {
        let events = self.session.drain_events();
        serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())
    }
}

impl LiveDomRuntime {
    pub fn from_config(config_json: &str) -> Result<Self, String> {
        let config = if config_json.trim().is_empty() {
            RuntimeConfig::default()
        } else {
            RuntimeConfig::from_json(config_json).map_err(|e| format!("Invalid config: {e}"))?
        };
        Ok(Self {
            session: EditorSession::new(config),
        })
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    fn node_or_root(&mut self, dom_id: &str) -> Option<NodeIndex> {
        if dom_id.is_empty() {
            Some(self.session.tree.root)
        } else {
            self.session.resolve(dom_id)
        }
    }
}

fn failure(message: &str) -> String {
    json!({ "ok": false, "error": message }).to_string()
}

fn to_ms(now_ms: f64) -> u64 {
    if now_ms.is_finite() && now_ms > 0.0 {
        now_ms as u64
    } else {
        0
    }
}

// ─── Console logging and panic hook ──────────────────────────────────────

#[cfg(target_arch = "wasm32")]
struct ConsoleLogger;

#[cfg(target_arch = "wasm32")]
impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = JsValue::from_str(&format!("[livedom] {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&msg),
            log::Level::Warn => web_sys::console::warn_1(&msg),
            log::Level::Info => web_sys::console::info_1(&msg),
            _ => web_sys::console::debug_1(&msg),
        }
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
static LOGGER: ConsoleLogger = ConsoleLogger;

fn console_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("livedom WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(log::LevelFilter::Warn);
            }
        });
    }
}

/// Raise or lower console log verbosity: `error`, `warn`, `info`,
/// `debug` or `trace`. Unknown names leave it unchanged.
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> bool {
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => {
            log::set_max_level(filter);
            true
        }
        Err(_) => false,
    }
}
