//! # Scene Engine
//!
//! A scene graph engine: an ordered tree of nodes is walked depth-first once
//! per frame, and the visit hooks of those nodes drive a set of pluggable
//! render backends.
//!
//! ## Features
//!
//! - **Backend registry**: independent render-state modules that react to
//!   lifecycle events without knowing about each other
//! - **Traversal**: symmetric pre/post visit hooks threading a shared context
//! - **Data scopes**: chained variable bindings for dynamically configured nodes
//! - **Scene lifecycle**: create, activate, render, pick and destroy, with a
//!   timer-driven render loop and a two-pass pick protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let (engine, timers) = SceneEngine::with_timer_queue(EngineConfig::default())?;
//!     engine.install_backend(ProgramBackend::new())?;
//!     engine.install_backend(MaterialBackend::new())?;
//!
//!     let scene = engine.create_scene(vec![
//!         Params::new().with("canvasId", "viewport").into(),
//!         nodes::material(vec![Params::new().into()])?.into(),
//!     ])?;
//!     scene.start(StartOptions::new().with_fps(30.0))?;
//!     timers.run_for(std::time::Duration::from_secs(1));
//!     scene.destroy()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;
pub mod config;
pub mod foundation;

pub mod backend;
pub mod events;
pub mod nodes;
pub mod scene;

mod engine;

pub use engine::SceneEngine;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        backend::{Backend, BackendContext, MaterialBackend, ProgramBackend},
        config::Config,
        core::{EngineConfig, RenderLoopConfig, SceneError},
        events::{Event, EventArg, EventBus, EventType},
        foundation::time::{Scheduler, TimerQueue},
        nodes,
        scene::{DataScope, GraphContext, Node, NodeArg, NodeContext, Params, PickedEvent, Scene, StartOptions, Value},
        SceneEngine,
    };
}
