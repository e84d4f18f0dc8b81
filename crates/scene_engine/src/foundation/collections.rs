//! Handle types for the engine's slot-map tables

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Identifier of a live scene; a re-created scene never reuses one
    pub struct SceneId;

    /// Identifier of an asynchronous process tracked for a scene
    pub struct ProcessId;

    /// Identifier of a repeating task in a scheduler
    pub struct TimerId;
}
