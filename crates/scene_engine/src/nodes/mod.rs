//! Node factories
//!
//! Concrete node types built on [`Node::extend`]: each fills in its own
//! parameter defaults and talks to its backend from the visit hooks.

pub mod material;

pub use material::material;
