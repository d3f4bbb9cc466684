pub mod config;
pub mod dispatch;
pub mod edit;
pub mod element;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod reorder;
pub mod schedule;
pub mod session;
pub mod snapshot;
pub mod style_store;

pub use config::RuntimeConfig;
pub use dispatch::{OPERATIONS, dispatch};
pub use element::{
    ActionElement, ActionLocation, DomElement, DragResult, ElementStyles, InsertPosition,
    MoveResult, ParentElement, PositionResult, TextEditEnd, TextEditStart,
};
pub use error::RuntimeError;
pub use identity::{Identity, IdentityRegistry};
pub use reconcile::{DuplicateSource, IdentityTransfer, Reconciliation, ReconciliationWatcher};
pub use reorder::{DragEvent, DragMode, DragOutcome, DragSession, DragStep, ReorderEngine};
pub use schedule::{Debouncer, RetryPoll};
pub use session::{EditorSession, SessionEvent};
pub use snapshot::{LayerMap, LayerNode, build_layer_tree};
pub use style_store::StyleStore;
