pub mod emitter;
pub mod hit;
pub mod id;
pub mod layout;
pub mod model;
pub mod mutation;
pub mod parser;
pub mod stylesheet;

pub use emitter::{emit_declarations, emit_stylesheet};
pub use hit::{GeometryResolver, PointResolver};
pub use id::StableId;
pub use layout::{Viewport, resolve_layout};
pub use model::*;
pub use mutation::{Applied, TreeMutation};
pub use parser::{parse_declarations, parse_stylesheet};
pub use stylesheet::{Declaration, StyleRule, Stylesheet};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
