//! Lifecycle event bus
//!
//! Backends never call each other directly. They subscribe to lifecycle
//! events when they are installed and react by rebuilding or re-pushing
//! their cached render state.
//!
//! Key principles:
//! - Typed event names (no string keys at call sites)
//! - Key-value arguments (no order dependency)
//! - Synchronous delivery in subscription order
//! - No handler isolation: the first failing handler aborts the dispatch

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::core::SceneError;
use crate::foundation::collections::SceneId;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A scene became the active scene
    SceneActivated,
    /// The active scene was deactivated
    SceneDeactivated,
    /// The bound shader program was released
    ProgramDeactivated,
    /// Geometry is about to be drawn
    GeoDrawing,
    /// A fatal or advisory runtime error was raised
    Error,
    /// Scene time moved forward
    TimeUpdated,
    /// The last live scene was destroyed
    Reset,
}

impl EventType {
    /// Canonical event name
    pub const fn name(self) -> &'static str {
        match self {
            Self::SceneActivated => "scene-activated",
            Self::SceneDeactivated => "scene-deactivated",
            Self::ProgramDeactivated => "program-deactivated",
            Self::GeoDrawing => "geo-drawing",
            Self::Error => "error",
            Self::TimeUpdated => "time-updated",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variant for type-safe event arguments
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    /// Scene the event concerns
    Scene(SceneId),
    /// Epoch time in milliseconds
    Time(u64),
    /// Error carried by an `error` event
    Exception(SceneError),
    /// Whether an error unwinds the traversal
    Fatal(bool),
    /// Free-form text
    Message(String),
}

/// Event with type and key-value arguments
#[derive(Debug, Clone)]
pub struct Event {
    /// Type of event
    pub event_type: EventType,
    args: HashMap<&'static str, EventArg>,
}

impl Event {
    /// Create a new event with no arguments
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            args: HashMap::new(),
        }
    }

    /// Build the payload of an `error` event
    pub fn error(exception: SceneError, fatal: bool) -> Self {
        Self::new(EventType::Error)
            .with_arg("exception", EventArg::Exception(exception))
            .with_arg("fatal", EventArg::Fatal(fatal))
    }

    /// Add an argument to the event (builder pattern)
    #[must_use]
    pub fn with_arg(mut self, key: &'static str, value: EventArg) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&EventArg> {
        self.args.get(key)
    }

    /// Get scene argument if present
    pub fn get_scene(&self) -> Option<SceneId> {
        match self.get_arg("scene") {
            Some(EventArg::Scene(id)) => Some(*id),
            _ => None,
        }
    }

    /// Get time argument if present
    pub fn get_time(&self) -> Option<u64> {
        match self.get_arg("time") {
            Some(EventArg::Time(ms)) => Some(*ms),
            _ => None,
        }
    }

    /// Get exception argument if present
    pub fn get_exception(&self) -> Option<&SceneError> {
        match self.get_arg("exception") {
            Some(EventArg::Exception(e)) => Some(e),
            _ => None,
        }
    }

    /// Get fatal flag if present
    pub fn get_fatal(&self) -> Option<bool> {
        match self.get_arg("fatal") {
            Some(EventArg::Fatal(fatal)) => Some(*fatal),
            _ => None,
        }
    }
}

/// Event handler trait
///
/// An error returned from a handler stops delivery and is handed back to
/// whoever fired the event.
pub trait EventHandler {
    /// Handle an event
    fn on_event(&mut self, event: &Event) -> Result<(), SceneError>;
}

impl<F> EventHandler for F
where
    F: FnMut(&Event) -> Result<(), SceneError>,
{
    fn on_event(&mut self, event: &Event) -> Result<(), SceneError> {
        self(event)
    }
}

type SharedHandler = Rc<RefCell<dyn EventHandler>>;

/// Publish/subscribe channel for lifecycle events
///
/// Cloning yields another handle onto the same subscriber table, which is
/// how backends keep hold of the bus inside their own handlers.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Rc<RefCell<HashMap<EventType, Vec<SharedHandler>>>>,
}

impl EventBus {
    /// Create a new bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers for one type run in registration order
    pub fn on_event(&self, event_type: EventType, handler: impl EventHandler + 'static) {
        let handler: SharedHandler = Rc::new(RefCell::new(handler));
        self.handlers.borrow_mut().entry(event_type).or_default().push(handler);
    }

    /// Deliver an event to every current subscriber
    ///
    /// Handlers may fire other events while running. A handler that is
    /// already running further up the stack is skipped.
    pub fn fire_event(&self, event: &Event) -> Result<(), SceneError> {
        let snapshot: Vec<SharedHandler> = self
            .handlers
            .borrow()
            .get(&event.event_type)
            .map(|handlers| handlers.iter().map(Rc::clone).collect())
            .unwrap_or_default();

        for handler in snapshot {
            let Ok(mut handler) = handler.try_borrow_mut() else {
                log::warn!("Skipping handler already dispatching '{}'", event.event_type);
                continue;
            };
            handler.on_event(event)?;
        }
        Ok(())
    }

    /// Fire an event that carries no arguments
    pub fn fire(&self, event_type: EventType) -> Result<(), SceneError> {
        self.fire_event(&Event::new(event_type))
    }

    /// Report an error that unwinds the current traversal
    ///
    /// Fires `error` with `fatal: true` and hands the error back so the
    /// caller can `return Err(bus.fatal_error(e))`.
    pub fn fatal_error(&self, exception: SceneError) -> SceneError {
        if let Err(e) = self.fire_event(&Event::error(exception.clone(), true)) {
            log::error!("Error handler failed while reporting '{exception}': {e}");
        }
        exception
    }

    /// Report an advisory error; traversal carries on
    pub fn error(&self, exception: SceneError) {
        if let Err(e) = self.fire_event(&Event::error(exception.clone(), false)) {
            log::error!("Error handler failed while reporting '{exception}': {e}");
        }
    }

    /// Number of handlers subscribed to a type
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.borrow().get(&event_type).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        f.debug_struct("EventBus")
            .field("event_types", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> impl EventHandler {
        let log = Rc::clone(log);
        move |event: &Event| -> Result<(), SceneError> {
            log.borrow_mut().push(format!("{tag}:{}", event.event_type));
            Ok(())
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on_event(EventType::GeoDrawing, recorder(&log, "a"));
        bus.on_event(EventType::GeoDrawing, recorder(&log, "b"));
        bus.on_event(EventType::SceneActivated, recorder(&log, "c"));

        bus.fire(EventType::GeoDrawing).unwrap();
        assert_eq!(*log.borrow(), vec!["a:geo-drawing", "b:geo-drawing"]);
    }

    #[test]
    fn test_failing_handler_stops_dispatch() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on_event(EventType::Error, recorder(&log, "first"));
        bus.on_event(EventType::Error, |_: &Event| -> Result<(), SceneError> { Err(SceneError::runtime("boom")) });
        bus.on_event(EventType::Error, recorder(&log, "third"));

        let result = bus.fire(EventType::Error);
        assert_eq!(result, Err(SceneError::runtime("boom")));
        assert_eq!(*log.borrow(), vec!["first:error"]);
    }

    #[test]
    fn test_reentrant_dispatch_of_other_event() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = bus.clone();
        bus.on_event(EventType::SceneActivated, move |_: &Event| -> Result<(), SceneError> { inner.fire(EventType::TimeUpdated) });
        bus.on_event(EventType::TimeUpdated, recorder(&log, "time"));

        bus.fire(EventType::SceneActivated).unwrap();
        assert_eq!(*log.borrow(), vec!["time:time-updated"]);
    }

    #[test]
    fn test_handler_subscribed_during_dispatch_waits_for_next_fire() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = bus.clone();
        let late = recorder(&log, "late");
        let mut late = Some(late);
        bus.on_event(EventType::GeoDrawing, move |_: &Event| -> Result<(), SceneError> {
            if let Some(handler) = late.take() {
                inner.on_event(EventType::GeoDrawing, handler);
            }
            Ok(())
        });

        bus.fire(EventType::GeoDrawing).unwrap();
        assert!(log.borrow().is_empty());
        bus.fire(EventType::GeoDrawing).unwrap();
        assert_eq!(*log.borrow(), vec!["late:geo-drawing"]);
    }

    #[test]
    fn test_fatal_and_advisory_errors() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on_event(EventType::Error, move |event: &Event| -> Result<(), SceneError> {
            sink.borrow_mut().push(event.get_fatal().unwrap_or_default());
            Ok(())
        });

        bus.error(SceneError::runtime("texture missing"));
        let returned = bus.fatal_error(SceneError::runtime("context lost"));
        assert_eq!(returned, SceneError::runtime("context lost"));
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn test_error_event_payload() {
        let event = Event::error(SceneError::runtime("lost context"), true);
        assert_eq!(event.event_type.name(), "error");
        assert_eq!(event.get_fatal(), Some(true));
        assert_eq!(event.get_exception(), Some(&SceneError::runtime("lost context")));
        assert_eq!(event.get_scene(), None);
    }
}
