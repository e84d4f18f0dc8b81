//! Scene lifecycle bookkeeping
//!
//! ```text
//! uninitialized ──create──► created ──activate──► activated ──deactivate──► deactivated
//!                              │                                               │
//!                              └──────────────destroy──────────────────────────┴──► destroyed
//! ```
//!
//! At most one scene is active at any instant. The manager only records
//! state transitions; the engine fires the matching events once it has
//! released the manager.

use std::rc::Weak;

use crate::core::SceneError;
use crate::foundation::collections::{SceneId, SlotMap};

use super::scene::SceneInner;

struct SceneEntry {
    handle: Weak<SceneInner>,
    renders: u64,
}

/// Transition reported by [`SceneManager::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Scene now active
    pub activated: SceneId,
    /// Scene that was active before and got deactivated
    pub displaced: Option<SceneId>,
}

/// Result of destroying a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destruction {
    /// Whether the scene was active and got deactivated first
    pub was_active: bool,
    /// Whether no live scenes remain
    pub was_last: bool,
}

/// Registry of live scenes and the active-scene marker
#[derive(Default)]
pub struct SceneManager {
    scenes: SlotMap<SceneId, SceneEntry>,
    active: Option<SceneId>,
}

impl SceneManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene, allocating a fresh id
    pub(crate) fn create(&mut self, handle: Weak<SceneInner>) -> SceneId {
        let id = self.scenes.insert(SceneEntry { handle, renders: 0 });
        log::info!("Created scene {id:?}");
        id
    }

    /// Make `id` the active scene
    pub fn activate(&mut self, id: SceneId) -> Result<Activation, SceneError> {
        let entry = self.scenes.get_mut(id).ok_or_else(|| unknown(id))?;
        entry.renders += 1;
        let displaced = self.active.replace(id).filter(|previous| *previous != id);
        log::debug!("Activated scene {id:?}");
        Ok(Activation { activated: id, displaced })
    }

    /// Clear the active marker, returning the scene that was active
    pub fn deactivate(&mut self) -> Option<SceneId> {
        let previous = self.active.take();
        if let Some(id) = previous {
            log::debug!("Deactivated scene {id:?}");
        }
        previous
    }

    /// Remove a scene
    pub fn destroy(&mut self, id: SceneId) -> Result<Destruction, SceneError> {
        self.scenes.remove(id).ok_or_else(|| unknown(id))?;
        let was_active = self.active == Some(id);
        if was_active {
            self.active = None;
        }
        log::info!("Destroyed scene {id:?}");
        Ok(Destruction {
            was_active,
            was_last: self.scenes.is_empty(),
        })
    }

    /// Whether `id` is the active scene; unknown ids are an error
    pub fn is_active(&self, id: SceneId) -> Result<bool, SceneError> {
        if !self.scenes.contains_key(id) {
            return Err(unknown(id));
        }
        Ok(self.active == Some(id))
    }

    /// Whether `id` is live
    pub fn contains(&self, id: SceneId) -> bool {
        self.scenes.contains_key(id)
    }

    /// Currently active scene
    pub const fn active(&self) -> Option<SceneId> {
        self.active
    }

    /// Number of times a scene has been activated
    pub fn render_count(&self, id: SceneId) -> Result<u64, SceneError> {
        self.scenes.get(id).map(|entry| entry.renders).ok_or_else(|| unknown(id))
    }

    /// Number of live scenes
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether no scenes are live
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub(crate) fn handles(&self) -> Vec<(SceneId, Weak<SceneInner>)> {
        self.scenes
            .iter()
            .map(|(id, entry)| (id, Weak::clone(&entry.handle)))
            .collect()
    }
}

fn unknown(id: SceneId) -> SceneError {
    SceneError::InvalidSceneGraph(format!("scene {id:?} has been destroyed or was never created"))
}
