//! Backend registry
//!
//! A backend owns one category of render state (material, shader program,
//! geometry, ...). Each backend is installed once under its type string and
//! wires itself to the [`EventBus`] during [`Backend::install`]; nodes then
//! look it up by type from inside their visit hooks.
//!
//! ```text
//! install_backend(b) ──► registry[b.type] = b ──► b.install(ctx)
//!                                                    └─► ctx.events.on_event(...)
//! ```

pub mod material;
pub mod program;

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::SceneError;
use crate::events::EventBus;

pub use material::{Color, Material, MaterialBackend, MATERIAL_BACKEND, MATERIAL_VAR};
pub use program::{ProgramBackend, PROGRAM_BACKEND};

/// Shared context handed to every backend at install time
#[derive(Clone, Debug)]
pub struct BackendContext {
    /// Lifecycle event bus
    pub events: EventBus,
    /// Registry the backend is being installed into
    pub backends: BackendRegistry,
}

/// Render-state module that reacts to lifecycle events
pub trait Backend: Any {
    /// Unique type string the backend is registered under
    fn backend_type(&self) -> &str;

    /// Hook the backend up to the engine
    ///
    /// Every event subscription must be made before this returns.
    fn install(&self, ctx: &BackendContext) -> Result<(), SceneError>;
}

#[derive(Clone)]
struct Installed {
    backend: Rc<dyn Backend>,
    any: Rc<dyn Any>,
}

/// Table of installed backends keyed by type string
///
/// Cloning yields another handle onto the same table.
#[derive(Clone)]
pub struct BackendRegistry {
    events: EventBus,
    backends: Rc<RefCell<HashMap<String, Installed>>>,
}

impl BackendRegistry {
    /// Create an empty registry whose backends subscribe on `events`
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            backends: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Register `backend` under its type and install it
    ///
    /// A previous backend of the same type is replaced. If install fails
    /// the previous registration is restored and the error returned.
    pub fn install_backend<B: Backend>(&self, backend: B) -> Result<Rc<B>, SceneError> {
        let backend = Rc::new(backend);
        let backend_type = backend.backend_type().to_string();
        let installed = Installed {
            backend: Rc::clone(&backend) as Rc<dyn Backend>,
            any: Rc::clone(&backend) as Rc<dyn Any>,
        };

        let previous = self.backends.borrow_mut().insert(backend_type.clone(), installed);
        if previous.is_some() {
            log::warn!("Replacing installed backend '{backend_type}'");
        }

        let ctx = BackendContext {
            events: self.events.clone(),
            backends: self.clone(),
        };
        if let Err(e) = backend.install(&ctx) {
            let mut backends = self.backends.borrow_mut();
            match previous {
                Some(previous) => backends.insert(backend_type.clone(), previous),
                None => backends.remove(&backend_type),
            };
            log::error!("Backend '{backend_type}' failed to install: {e}");
            return Err(e);
        }

        log::debug!("Installed backend '{backend_type}'");
        Ok(backend)
    }

    /// Look up a backend by type
    pub fn get_backend(&self, backend_type: &str) -> Result<Rc<dyn Backend>, SceneError> {
        self.backends
            .borrow()
            .get(backend_type)
            .map(|installed| Rc::clone(&installed.backend))
            .ok_or_else(|| SceneError::BackendNotFound(backend_type.to_string()))
    }

    /// Look up a backend by type and downcast it to its concrete type
    pub fn get_backend_as<B: Backend>(&self, backend_type: &str) -> Result<Rc<B>, SceneError> {
        downcast(&self.backends.borrow(), backend_type)
    }

    /// Whether a backend of this type is installed
    pub fn is_installed(&self, backend_type: &str) -> bool {
        self.backends.borrow().contains_key(backend_type)
    }

    /// Handle that does not keep the table alive
    ///
    /// Event handlers registered by a backend hold one of these, since the
    /// bus they sit on is itself owned through the registry.
    pub fn downgrade(&self) -> WeakBackendRegistry {
        WeakBackendRegistry {
            backends: Rc::downgrade(&self.backends),
        }
    }

    /// Installed backend types, sorted
    pub fn installed_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.backends.borrow().keys().cloned().collect();
        types.sort();
        types
    }
}

/// Non-owning handle onto a [`BackendRegistry`]
#[derive(Clone)]
pub struct WeakBackendRegistry {
    backends: Weak<RefCell<HashMap<String, Installed>>>,
}

impl WeakBackendRegistry {
    /// Look up a backend by concrete type; fails once the registry is gone
    pub fn get_backend_as<B: Backend>(&self, backend_type: &str) -> Result<Rc<B>, SceneError> {
        let backends = self
            .backends
            .upgrade()
            .ok_or_else(|| SceneError::runtime("Backend registry has been dropped"))?;
        let backends = backends.borrow();
        downcast(&backends, backend_type)
    }
}

fn downcast<B: Backend>(backends: &HashMap<String, Installed>, backend_type: &str) -> Result<Rc<B>, SceneError> {
    let any = backends
        .get(backend_type)
        .map(|installed| Rc::clone(&installed.any))
        .ok_or_else(|| SceneError::BackendNotFound(backend_type.to_string()))?;

    any.downcast::<B>().map_err(|_| SceneError::BackendMismatch {
        backend_type: backend_type.to_string(),
        expected: std::any::type_name::<B>(),
    })
}

impl fmt::Debug for WeakBackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBackendRegistry")
            .field("alive", &(self.backends.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("installed", &self.installed_types())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventType};
    use std::cell::Cell;

    struct CountingBackend {
        kind: &'static str,
        installs: Rc<Cell<u32>>,
        activations: Rc<Cell<u32>>,
    }

    impl CountingBackend {
        fn new(kind: &'static str) -> Self {
            Self {
                kind,
                installs: Rc::new(Cell::new(0)),
                activations: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Backend for CountingBackend {
        fn backend_type(&self) -> &str {
            self.kind
        }

        fn install(&self, ctx: &BackendContext) -> Result<(), SceneError> {
            self.installs.set(self.installs.get() + 1);
            let activations = Rc::clone(&self.activations);
            ctx.events.on_event(EventType::SceneActivated, move |_: &Event| -> Result<(), SceneError> {
                activations.set(activations.get() + 1);
                Ok(())
            });
            Ok(())
        }
    }

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn backend_type(&self) -> &str {
            "geometry"
        }

        fn install(&self, _ctx: &BackendContext) -> Result<(), SceneError> {
            Err(SceneError::runtime("no vertex buffers"))
        }
    }

    #[test]
    fn test_install_then_get_returns_same_instance() {
        let registry = BackendRegistry::new(EventBus::new());
        let installed = registry.install_backend(CountingBackend::new("material")).unwrap();
        assert_eq!(installed.installs.get(), 1);

        let found = registry.get_backend_as::<CountingBackend>("material").unwrap();
        assert!(Rc::ptr_eq(&installed, &found));
        assert_eq!(registry.get_backend("material").unwrap().backend_type(), "material");
    }

    #[test]
    fn test_unregistered_type_is_not_found() {
        let registry = BackendRegistry::new(EventBus::new());
        assert!(matches!(
            registry.get_backend("lights"),
            Err(SceneError::BackendNotFound(kind)) if kind == "lights"
        ));
    }

    #[test]
    fn test_install_subscribes_before_events_fire() {
        let events = EventBus::new();
        let registry = BackendRegistry::new(events.clone());
        let backend = registry.install_backend(CountingBackend::new("camera")).unwrap();

        events.fire(EventType::SceneActivated).unwrap();
        assert_eq!(backend.activations.get(), 1);
    }

    #[test]
    fn test_reinstall_overwrites() {
        let registry = BackendRegistry::new(EventBus::new());
        let first = registry.install_backend(CountingBackend::new("material")).unwrap();
        let second = registry.install_backend(CountingBackend::new("material")).unwrap();

        let found = registry.get_backend_as::<CountingBackend>("material").unwrap();
        assert!(Rc::ptr_eq(&second, &found));
        assert!(!Rc::ptr_eq(&first, &found));
        assert_eq!(registry.installed_types(), vec!["material".to_string()]);
    }

    #[test]
    fn test_failed_install_is_rolled_back() {
        let registry = BackendRegistry::new(EventBus::new());
        assert!(registry.install_backend(FailingBackend).is_err());
        assert!(!registry.is_installed("geometry"));
    }

    #[test]
    fn test_downcast_to_wrong_type() {
        let registry = BackendRegistry::new(EventBus::new());
        registry.install_backend(CountingBackend::new("material")).unwrap();
        assert!(matches!(
            registry.get_backend_as::<FailingBackend>("material"),
            Err(SceneError::BackendMismatch { .. })
        ));
    }
}
