//! Core engine implementation
//!
//! [`SceneEngine`] owns the event bus, the backend registry, the scene
//! registry with its active-scene marker, and the scheduler driving render
//! loops. Nothing is process-wide, so several engines can coexist in one
//! process without sharing state.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::{Backend, BackendRegistry};
use crate::core::{EngineConfig, SceneError};
use crate::events::{Event, EventArg, EventBus, EventType};
use crate::foundation::collections::SceneId;
use crate::foundation::time::{Scheduler, TimerQueue};
use crate::scene::{NodeArg, Scene, SceneManager};

pub(crate) struct EngineInner {
    config: EngineConfig,
    events: EventBus,
    backends: BackendRegistry,
    scenes: RefCell<SceneManager>,
    scheduler: Rc<dyn Scheduler>,
}

/// Main engine handle
///
/// Cloning is cheap and yields another handle onto the same engine.
#[derive(Clone)]
pub struct SceneEngine {
    inner: Rc<EngineInner>,
}

impl SceneEngine {
    /// Create an engine whose render loops run on `scheduler`
    pub fn new(config: EngineConfig, scheduler: Rc<dyn Scheduler>) -> Result<Self, SceneError> {
        config.validate()?;
        log::info!("Initializing scene engine...");

        let events = EventBus::new();
        let backends = BackendRegistry::new(events.clone());

        if config.log_errors {
            events.on_event(EventType::Error, |event: &Event| -> Result<(), SceneError> {
                if let Some(exception) = event.get_exception() {
                    if event.get_fatal() == Some(true) {
                        log::error!("Fatal error: {exception}");
                    } else {
                        log::warn!("Error: {exception}");
                    }
                }
                Ok(())
            });
        }

        Ok(Self {
            inner: Rc::new(EngineInner {
                config,
                events,
                backends,
                scenes: RefCell::new(SceneManager::new()),
                scheduler,
            }),
        })
    }

    /// Create an engine driven by a fresh [`TimerQueue`]
    pub fn with_timer_queue(config: EngineConfig) -> Result<(Self, Rc<TimerQueue>), SceneError> {
        let timers = Rc::new(TimerQueue::new());
        let engine = Self::new(config, Rc::clone(&timers) as Rc<dyn Scheduler>)?;
        Ok((engine, timers))
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Lifecycle event bus
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Backend registry
    pub fn backends(&self) -> &BackendRegistry {
        &self.inner.backends
    }

    /// Scheduler driving render loops
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.inner.scheduler.as_ref()
    }

    /// Scene registry
    pub fn scenes(&self) -> Ref<'_, SceneManager> {
        self.inner.scenes.borrow()
    }

    pub(crate) fn scenes_mut(&self) -> std::cell::RefMut<'_, SceneManager> {
        self.inner.scenes.borrow_mut()
    }

    /// Install a backend; see [`BackendRegistry::install_backend`]
    pub fn install_backend<B: Backend>(&self, backend: B) -> Result<Rc<B>, SceneError> {
        self.inner.backends.install_backend(backend)
    }

    /// Look up a backend by type
    pub fn get_backend(&self, backend_type: &str) -> Result<Rc<dyn Backend>, SceneError> {
        self.inner.backends.get_backend(backend_type)
    }

    /// Look up a backend by type and concrete Rust type
    pub fn get_backend_as<B: Backend>(&self, backend_type: &str) -> Result<Rc<B>, SceneError> {
        self.inner.backends.get_backend_as(backend_type)
    }

    /// Create a scene from a literal configuration followed by child nodes
    pub fn create_scene(&self, args: Vec<NodeArg>) -> Result<Scene, SceneError> {
        Scene::new(self.clone(), args)
    }

    /// Make a scene the active one, deactivating whichever scene was
    ///
    /// Fires `scene-deactivated` for the displaced scene, then
    /// `scene-activated` and `time-updated`.
    pub fn activate_scene(&self, id: SceneId) -> Result<(), SceneError> {
        let activation = self.inner.scenes.borrow_mut().activate(id)?;
        if let Some(displaced) = activation.displaced {
            self.fire_scene_event(EventType::SceneDeactivated, displaced)?;
        }
        self.fire_scene_event(EventType::SceneActivated, id)?;
        self.inner.events.fire_event(
            &Event::new(EventType::TimeUpdated)
                .with_arg("scene", EventArg::Scene(id))
                .with_arg("time", EventArg::Time(now_millis())),
        )
    }

    /// Clear the active scene, firing `scene-deactivated` if there was one
    pub fn deactivate_scene(&self) -> Result<(), SceneError> {
        let previous = self.inner.scenes.borrow_mut().deactivate();
        match previous {
            Some(id) => self.fire_scene_event(EventType::SceneDeactivated, id),
            None => Ok(()),
        }
    }

    /// Remove a scene, deactivating it first if needed
    ///
    /// Fires `reset` once the last live scene is gone.
    pub fn destroy_scene(&self, id: SceneId) -> Result<(), SceneError> {
        let destruction = self.inner.scenes.borrow_mut().destroy(id)?;
        let mut result = Ok(());
        if destruction.was_active {
            result = self.fire_scene_event(EventType::SceneDeactivated, id);
        }
        // The scene is gone either way, so the reset still has to go out
        if destruction.was_last {
            log::info!("Last scene destroyed, resetting");
            result = result.and(self.inner.events.fire(EventType::Reset));
        }
        result
    }

    /// Whether a live scene is the active one
    pub fn is_scene_active(&self, id: SceneId) -> Result<bool, SceneError> {
        self.inner.scenes.borrow().is_active(id)
    }

    /// Currently active scene
    pub fn active_scene(&self) -> Option<SceneId> {
        self.inner.scenes.borrow().active()
    }

    /// Number of live scenes
    pub fn live_scene_count(&self) -> usize {
        self.inner.scenes.borrow().len()
    }

    /// Destroy every live scene, stopping their render loops
    ///
    /// Every scene is destroyed even when an observer fails; the first
    /// error is returned afterwards.
    pub fn reset_all(&self) -> Result<(), SceneError> {
        let handles = self.inner.scenes.borrow().handles();
        log::info!("Resetting {} scene(s)", handles.len());
        let mut first_error = None;
        for (id, handle) in handles.into_iter().rev() {
            let destroyed = match handle.upgrade() {
                Some(inner) => Scene::from_inner(inner).destroy(),
                None => self.destroy_scene(id),
            };
            if let Err(e) = destroyed {
                log::error!("Failed to destroy scene {id:?} during reset: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Report an error that aborts the current pass
    pub fn fatal_error(&self, exception: SceneError) -> SceneError {
        self.inner.events.fatal_error(exception)
    }

    /// Report an advisory error
    pub fn error(&self, exception: SceneError) {
        self.inner.events.error(exception);
    }

    fn fire_scene_event(&self, event_type: EventType, id: SceneId) -> Result<(), SceneError> {
        self.inner
            .events
            .fire_event(&Event::new(event_type).with_arg("scene", EventArg::Scene(id)))
    }
}

impl fmt::Debug for SceneEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneEngine")
            .field("config", &self.inner.config)
            .field("backends", &self.inner.backends)
            .field("live_scenes", &self.live_scene_count())
            .field("active_scene", &self.active_scene())
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::value::Params;
    use crate::scene::Node;
    use std::cell::RefCell;

    fn engine() -> SceneEngine {
        SceneEngine::with_timer_queue(EngineConfig::default()).unwrap().0
    }

    fn record(engine: &SceneEngine, log: &Rc<RefCell<Vec<String>>>, event_type: EventType) {
        let log = Rc::clone(log);
        engine.events().on_event(event_type, move |event: &Event| -> Result<(), SceneError> {
            log.borrow_mut().push(event.event_type.name().to_string());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_default_fps(0.0);
        assert!(matches!(
            SceneEngine::with_timer_queue(config),
            Err(SceneError::Config(_))
        ));
    }

    #[test]
    fn test_activation_events_in_order() {
        let engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        for event_type in [EventType::SceneActivated, EventType::SceneDeactivated, EventType::TimeUpdated] {
            record(&engine, &log, event_type);
        }

        let a = engine.create_scene(vec![Params::new().into()]).unwrap();
        let b = engine.create_scene(vec![Params::new().into()]).unwrap();
        a.render().unwrap();
        let a_id = a.id().unwrap();
        let b_id = b.ensure_created();

        log.borrow_mut().clear();
        engine.activate_scene(a_id).unwrap();
        engine.activate_scene(b_id).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["scene-activated", "time-updated", "scene-deactivated", "scene-activated", "time-updated"]
        );
        assert_eq!(engine.active_scene(), Some(b_id));
    }

    #[test]
    fn test_time_updated_carries_time() {
        let engine = engine();
        let time = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&time);
        engine.events().on_event(EventType::TimeUpdated, move |event: &Event| -> Result<(), SceneError> {
            *sink.borrow_mut() = event.get_time();
            Ok(())
        });
        engine.create_scene(vec![Params::new().into()]).unwrap().render().unwrap();
        assert!(time.borrow().is_some_and(|ms| ms > 0));
    }

    #[test]
    fn test_reset_fired_after_last_scene() {
        let engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&engine, &log, EventType::Reset);

        let a = engine.create_scene(vec![Params::new().into()]).unwrap();
        let b = engine.create_scene(vec![Params::new().into()]).unwrap();
        a.render().unwrap();
        b.render().unwrap();

        a.destroy().unwrap();
        assert!(log.borrow().is_empty());
        b.destroy().unwrap();
        assert_eq!(*log.borrow(), vec!["reset"]);
    }

    #[test]
    fn test_reset_all_leaves_no_live_scenes() {
        let engine = engine();
        let scenes: Vec<Scene> = (0..3)
            .map(|_| engine.create_scene(vec![Params::new().into()]).unwrap())
            .collect();
        let ids: Vec<SceneId> = scenes
            .iter()
            .map(|scene| {
                scene.render().unwrap();
                scene.id().unwrap()
            })
            .collect();

        engine.reset_all().unwrap();
        assert_eq!(engine.live_scene_count(), 0);
        for (scene, id) in scenes.iter().zip(ids) {
            assert!(!scene.is_active());
            assert!(matches!(engine.is_scene_active(id), Err(SceneError::InvalidSceneGraph(_))));
        }
    }

    #[test]
    fn test_reset_all_handles_dropped_scenes() {
        let engine = engine();
        let scene = engine.create_scene(vec![Params::new().into()]).unwrap();
        scene.render().unwrap();
        drop(scene);

        assert_eq!(engine.live_scene_count(), 1);
        engine.reset_all().unwrap();
        assert_eq!(engine.live_scene_count(), 0);
    }

    #[test]
    fn test_reset_all_survives_failing_observer() {
        let engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&engine, &log, EventType::Reset);

        let scenes: Vec<Scene> = (0..3)
            .map(|_| engine.create_scene(vec![Params::new().into()]).unwrap())
            .collect();
        for scene in &scenes {
            scene.render().unwrap();
        }
        // The active scene is torn down first and its observer fails
        let last = scenes.last().unwrap();
        engine.activate_scene(last.id().unwrap()).unwrap();
        engine
            .events()
            .on_event(EventType::SceneDeactivated, |_: &Event| -> Result<(), SceneError> {
                Err(SceneError::runtime("observer failed"))
            });

        assert_eq!(
            engine.reset_all(),
            Err(SceneError::Runtime("observer failed".to_string()))
        );
        assert_eq!(engine.live_scene_count(), 0);
        assert!(scenes.iter().all(|scene| !scene.is_active()));
        assert_eq!(*log.borrow(), vec!["reset"]);
    }

    #[test]
    fn test_failing_observer_still_resets_after_last_scene() {
        let engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&engine, &log, EventType::Reset);

        let broken = Node::empty().on_pre_visit(|_| Err(SceneError::runtime("draw failed")));
        let scene = engine
            .create_scene(vec![Params::new().into(), broken.into()])
            .unwrap();
        assert!(scene.render().is_err());
        engine
            .events()
            .on_event(EventType::SceneDeactivated, |_: &Event| -> Result<(), SceneError> {
                Err(SceneError::runtime("observer failed"))
            });

        assert!(scene.destroy().is_err());
        assert_eq!(engine.live_scene_count(), 0);
        assert_eq!(*log.borrow(), vec!["reset"]);
    }

    #[test]
    fn test_engines_are_independent() {
        let first = engine();
        let second = engine();
        first.create_scene(vec![Params::new().into()]).unwrap().render().unwrap();
        assert_eq!(first.live_scene_count(), 1);
        assert_eq!(second.live_scene_count(), 0);
    }
}
