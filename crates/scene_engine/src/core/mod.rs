//! # Core Engine Module
//!
//! Shared abstractions every other subsystem depends on.
//!
//! ## Organization
//!
//! - **Config**: Engine and render loop settings
//! - **Error**: The [`SceneError`] taxonomy

pub mod config;
pub mod error;

pub use config::{EngineConfig, RenderLoopConfig, DEFAULT_FPS};
pub use error::SceneError;
