//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Handle types for slot-map backed tables
//! - Timer scheduling for render loops
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod time;
