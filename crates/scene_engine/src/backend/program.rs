//! Shader program backend
//!
//! Stands in for the graphics-API program object: it tracks which program is
//! bound and the uniform variables pushed into it. Other backends write their
//! state here with [`ProgramBackend::set_var`] when geometry is about to draw.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::SceneError;
use crate::events::{Event, EventArg, EventBus, EventType};
use crate::scene::Value;

use super::{Backend, BackendContext};

/// Type string the program backend is installed under
pub const PROGRAM_BACKEND: &str = "program";

#[derive(Debug, Default)]
struct ProgramState {
    active: Option<String>,
    vars: HashMap<String, Value>,
}

/// Uniform variable store for the bound program
#[derive(Debug, Default)]
pub struct ProgramBackend {
    events: RefCell<Option<EventBus>>,
    state: RefCell<ProgramState>,
}

impl ProgramBackend {
    /// Create an unbound backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a program; its variables start out empty
    pub fn activate(&self, name: impl Into<String>) {
        let name = name.into();
        log::debug!("Activating program '{name}'");
        let mut state = self.state.borrow_mut();
        state.active = Some(name);
        state.vars.clear();
    }

    /// Unbind the current program and fire `program-deactivated`
    pub fn deactivate(&self) -> Result<(), SceneError> {
        let Some(name) = self.state.borrow_mut().active.take() else {
            return Ok(());
        };
        log::debug!("Deactivating program '{name}'");

        let events = self.events.borrow().clone();
        match events {
            Some(events) => events.fire_event(
                &Event::new(EventType::ProgramDeactivated).with_arg("program", EventArg::Message(name)),
            ),
            None => Err(SceneError::runtime("Program backend used before install")),
        }
    }

    /// Name of the bound program
    pub fn active_program(&self) -> Option<String> {
        self.state.borrow().active.clone()
    }

    /// Push a uniform variable
    pub fn set_var(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state.borrow_mut().vars.insert(name.into(), value.into());
    }

    /// Current value of a uniform variable
    pub fn var(&self, name: &str) -> Option<Value> {
        self.state.borrow().vars.get(name).cloned()
    }
}

impl Backend for ProgramBackend {
    fn backend_type(&self) -> &str {
        PROGRAM_BACKEND
    }

    fn install(&self, ctx: &BackendContext) -> Result<(), SceneError> {
        self.events.replace(Some(ctx.events.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendRegistry;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_vars_cleared_on_activate() {
        let program = ProgramBackend::new();
        program.activate("phong");
        program.set_var("scene_Alpha", 0.5);
        assert_eq!(program.var("scene_Alpha"), Some(Value::Number(0.5)));

        program.activate("flat");
        assert_eq!(program.var("scene_Alpha"), None);
        assert_eq!(program.active_program().as_deref(), Some("flat"));
    }

    #[test]
    fn test_deactivate_fires_event() {
        let events = EventBus::new();
        let registry = BackendRegistry::new(events.clone());
        let program = registry.install_backend(ProgramBackend::new()).unwrap();

        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        events.on_event(EventType::ProgramDeactivated, move |_: &Event| -> Result<(), SceneError> {
            counter.set(counter.get() + 1);
            Ok(())
        });

        program.deactivate().unwrap();
        assert_eq!(fired.get(), 0);

        program.activate("phong");
        program.deactivate().unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(program.active_program(), None);
    }

    #[test]
    fn test_deactivate_before_install() {
        let program = ProgramBackend::new();
        program.activate("phong");
        assert!(program.deactivate().is_err());
    }
}
