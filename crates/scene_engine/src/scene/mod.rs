//! # Scene Graph
//!
//! Nodes, the data they are configured from, and the machinery that walks
//! them.
//!
//! ## Organization
//!
//! - **Node**: construction from parameter sources and children
//! - **Data scope**: chained variable bindings for dynamic nodes
//! - **Traversal**: depth-first render and pick passes
//! - **Scene**: lifecycle, render loop and the pick protocol
//! - **Scene manager**: registry of live scenes and the active marker

pub mod data_scope;
pub mod graph_context;
pub mod node;
pub mod process;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod scene_manager;
pub mod traversal;
pub mod value;

#[cfg(test)]
mod tests;

pub use data_scope::DataScope;
pub use graph_context::GraphContext;
pub use node::{extract_config, Node, NodeArg, NodeConfig, ParameterSource};
pub use process::{Process, ProcessTable};
pub use scene::{IdleFunc, Scene, StartOptions, DEFAULT_CANVAS_ID};
pub use scene_manager::SceneManager;
pub use traversal::{NodeContext, PassOutcome, PickedEvent, Traversal, TraversalMode};
pub use value::{Params, Value};
