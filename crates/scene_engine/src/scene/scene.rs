//! Root of a scene graph
//!
//! A [`Scene`] is the entry and exit point of traversal. It binds external
//! data into the root data scope, renders single frames or runs a
//! timer-driven render loop, and resolves picks with a pick pass followed by
//! a render pass.
//!
//! ```text
//! render()  ──► ensure created ──► activate ──► traverse ──► deactivate
//! pick(x,y) ──► [pick pass: record hit path] ──► [render pass: notify path]
//! start()   ──► every 1000/fps ms: idle_func(scene); if still running, render
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::{RenderLoopConfig, SceneError};
use crate::engine::SceneEngine;
use crate::foundation::collections::{ProcessId, SceneId, TimerId};
use crate::foundation::time::RepeatingTask;

use super::data_scope::DataScope;
use super::graph_context::GraphContext;
use super::node::{extract_config, Node, NodeArg};
use super::process::ProcessTable;
use super::traversal::{PassOutcome, PickedEvent, Traversal, TraversalMode};
use super::value::Params;

/// Canvas a scene binds to when its configuration names none
pub const DEFAULT_CANVAS_ID: &str = "_scenejs-default-canvas";

/// Callback run before each render loop frame
pub type IdleFunc = Box<dyn FnMut(&Scene)>;

/// Options for [`Scene::start`]
#[derive(Default)]
pub struct StartOptions {
    /// Frames per second; the engine default when absent
    pub fps: Option<f64>,
    idle_func: Option<IdleFunc>,
}

impl StartOptions {
    /// Options with no idle function and the default frame rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Options taking their frame rate from a loop configuration
    pub const fn from_config(config: RenderLoopConfig) -> Self {
        Self {
            fps: Some(config.fps),
            idle_func: None,
        }
    }

    /// Set the frame rate
    #[must_use]
    pub const fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Run `idle_func` before every frame
    #[must_use]
    pub fn with_idle_func(mut self, idle_func: impl FnMut(&Scene) + 'static) -> Self {
        self.idle_func = Some(Box::new(idle_func));
        self
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("fps", &self.fps)
            .field("idle_func", &self.idle_func.is_some())
            .finish()
    }
}

#[derive(Default)]
struct SceneState {
    id: Option<SceneId>,
    data: Params,
    configs: Params,
    running: bool,
    timer: Option<TimerId>,
    pending_pick: Option<(f64, f64)>,
    last_pick: Option<PickedEvent>,
}

pub(crate) struct SceneInner {
    engine: SceneEngine,
    root: Node,
    canvas_id: String,
    state: RefCell<SceneState>,
    processes: RefCell<ProcessTable>,
}

impl Drop for SceneInner {
    // The loop task holds only a weak handle to this scene
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            self.engine.scheduler().cancel(timer);
            log::debug!("Cancelled render loop of dropped scene");
        }
    }
}

/// Handle to a scene
///
/// Cloning yields another handle onto the same scene.
#[derive(Clone)]
pub struct Scene {
    inner: Rc<SceneInner>,
}

impl Scene {
    pub(crate) fn new(engine: SceneEngine, args: Vec<NodeArg>) -> Result<Self, SceneError> {
        let config = extract_config(args)?;
        if !config.cachable {
            return Err(engine.fatal_error(SceneError::InvalidNodeConfig(
                "Dynamic configuration of scene node is not supported".to_string(),
            )));
        }

        let root = Node::from_config(config).with_kind("scene");
        let canvas_id = root
            .evaluate(&DataScope::default())
            .text("canvasId")
            .unwrap_or(DEFAULT_CANVAS_ID)
            .to_string();

        Ok(Self {
            inner: Rc::new(SceneInner {
                engine,
                root,
                canvas_id,
                state: RefCell::new(SceneState::default()),
                processes: RefCell::new(ProcessTable::new()),
            }),
        })
    }

    pub(crate) const fn from_inner(inner: Rc<SceneInner>) -> Self {
        Self { inner }
    }

    /// Current scene id; `None` until first rendered and after destroy
    pub fn id(&self) -> Option<SceneId> {
        self.inner.state.borrow().id
    }

    /// Canvas this scene renders to
    pub fn canvas_id(&self) -> &str {
        &self.inner.canvas_id
    }

    /// Root node of the graph
    pub fn root(&self) -> &Node {
        &self.inner.root
    }

    /// Engine the scene belongs to
    pub fn engine(&self) -> &SceneEngine {
        &self.inner.engine
    }

    /// Render one frame
    ///
    /// Has no effect while a render loop is running.
    pub fn render(&self) -> Result<(), SceneError> {
        self.render_with_context(&mut GraphContext::new())
    }

    /// Render one frame, threading a caller-owned context through the hooks
    pub fn render_with_context(&self, graph: &mut GraphContext) -> Result<(), SceneError> {
        if self.is_running() {
            return Ok(());
        }
        self.render_frame(graph)
    }

    /// Resolve what lies under a canvas coordinate
    ///
    /// On an idle scene this runs a pick pass and then a render pass at
    /// once, and returns the hit. On a looping scene the pick is served by
    /// the next tick and `None` is returned; see [`Scene::last_pick`].
    pub fn pick(&self, x: f64, y: f64) -> Result<Option<PickedEvent>, SceneError> {
        let running = {
            let mut state = self.inner.state.borrow_mut();
            if state.id.is_none() {
                return Err(SceneError::InvalidSceneGraph(
                    "Attempted pick on Scene that has been destroyed or not yet rendered".to_string(),
                ));
            }
            if state.running {
                state.pending_pick = Some((x, y));
            }
            state.running
        };

        if running {
            log::debug!("Deferring pick at ({x}, {y}) to next frame");
            return Ok(None);
        }
        self.pick_frame(x, y, &mut GraphContext::new())
    }

    /// Hit found by the most recent pick
    pub fn last_pick(&self) -> Option<PickedEvent> {
        self.inner.state.borrow().last_pick.clone()
    }

    /// Start rendering in a loop
    ///
    /// Does nothing if the loop is already running.
    pub fn start(&self, options: StartOptions) -> Result<(), SceneError> {
        if self.is_running() {
            return Ok(());
        }

        let engine = &self.inner.engine;
        let loop_config = RenderLoopConfig::new(options.fps.unwrap_or(engine.config().default_fps));
        loop_config.validate()?;

        let weak = Rc::downgrade(&self.inner);
        let mut idle_func = options.idle_func;
        let task: RepeatingTask = Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let scene = Self::from_inner(inner);
            if let Some(idle_func) = idle_func.as_mut() {
                idle_func(&scene);
            }
            // The idle function may have stopped the loop
            if scene.is_running() {
                if let Err(e) = scene.render_frame(&mut GraphContext::new()) {
                    log::error!("Render loop frame failed for scene {:?}: {e}", scene.id());
                }
            }
        });

        let timer = engine.scheduler().schedule_repeating(loop_config.interval(), task);
        let mut state = self.inner.state.borrow_mut();
        state.running = true;
        state.timer = Some(timer);
        log::info!("Started render loop at {} fps", loop_config.fps);
        Ok(())
    }

    /// Stop the render loop; no further frames are rendered by it
    pub fn stop(&self) {
        let timer = {
            let mut state = self.inner.state.borrow_mut();
            if !state.running {
                return;
            }
            state.running = false;
            state.timer.take()
        };
        if let Some(timer) = timer {
            self.inner.engine.scheduler().cancel(timer);
        }
        log::info!("Stopped render loop for scene {:?}", self.id());
    }

    /// Whether a render loop is running
    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    /// Replace the data map bound into the root data scope
    pub fn set_data(&self, data: Params) -> &Self {
        self.inner.state.borrow_mut().data = data;
        self
    }

    /// Data map set with [`Scene::set_data`]
    pub fn get_data(&self) -> Params {
        self.inner.state.borrow().data.clone()
    }

    /// Replace the per-sid parameter overrides, `{sid: {param: value}}`
    pub fn set_configs(&self, configs: Params) -> &Self {
        self.inner.state.borrow_mut().configs = configs;
        self
    }

    /// Overrides set with [`Scene::set_configs`]
    pub fn get_configs(&self) -> Params {
        self.inner.state.borrow().configs.clone()
    }

    /// Destroy the scene, stopping its loop
    ///
    /// Rendering again re-creates it under a new id.
    pub fn destroy(&self) -> Result<(), SceneError> {
        let Some(id) = self.id() else {
            return Ok(());
        };
        self.stop();
        {
            let mut state = self.inner.state.borrow_mut();
            state.id = None;
            state.pending_pick = None;
        }
        self.inner.processes.borrow_mut().clear();
        self.inner.engine.destroy_scene(id)
    }

    /// Whether the scene exists, i.e. has been rendered and not destroyed
    pub fn is_active(&self) -> bool {
        self.id().is_some()
    }

    /// Outstanding asynchronous processes as of the end of the last pass
    pub fn get_num_processes(&self) -> usize {
        if self.is_active() {
            self.inner.processes.borrow().count()
        } else {
            0
        }
    }

    /// Mark a process finished; takes effect at the next pass
    pub fn finish_process(&self, id: ProcessId) -> bool {
        self.inner.processes.borrow_mut().finish(id)
    }

    pub(crate) fn ensure_created(&self) -> SceneId {
        if let Some(id) = self.id() {
            return id;
        }
        let id = self.inner.engine.scenes_mut().create(Rc::downgrade(&self.inner));
        self.inner.state.borrow_mut().id = Some(id);
        id
    }

    fn render_frame(&self, graph: &mut GraphContext) -> Result<(), SceneError> {
        let pending = self.inner.state.borrow_mut().pending_pick.take();
        match pending {
            Some((x, y)) => self.pick_frame(x, y, graph).map(|_| ()),
            None => self.pass(TraversalMode::Render, None, graph).map(|_| ()),
        }
    }

    fn pick_frame(&self, x: f64, y: f64, graph: &mut GraphContext) -> Result<Option<PickedEvent>, SceneError> {
        let hit = self.pass(TraversalMode::Pick { x, y }, None, graph)?.hit;
        self.inner.state.borrow_mut().last_pick.clone_from(&hit);
        self.pass(TraversalMode::Render, hit.clone(), graph)?;
        Ok(hit)
    }

    fn pass(
        &self,
        mode: TraversalMode,
        deliver: Option<PickedEvent>,
        graph: &mut GraphContext,
    ) -> Result<PassOutcome, SceneError> {
        let id = self.ensure_created();
        let engine = &self.inner.engine;
        engine.activate_scene(id)?;

        let (scope, configs) = {
            let state = self.inner.state.borrow();
            (Rc::new(DataScope::from_params(&state.data)), state.configs.clone())
        };

        self.inner
            .processes
            .borrow_mut()
            .begin_pass(
                engine.scheduler().now(),
                engine.config().process_timeout_ms.map(std::time::Duration::from_millis),
            );
        let outcome = Traversal::new(mode, engine.events(), engine.backends())
            .with_scene(id)
            .with_configs(&configs)
            .with_processes(&self.inner.processes)
            .delivering(deliver)
            .run(&self.inner.root, graph, &scope);
        self.inner.processes.borrow_mut().end_pass();

        // A failed pass leaves the scene active
        let outcome = outcome?;
        engine.deactivate_scene()?;
        Ok(outcome)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scene")
            .field("id", &state.id)
            .field("canvas_id", &self.inner.canvas_id)
            .field("running", &state.running)
            .field("data", &state.data)
            .finish_non_exhaustive()
    }
}
