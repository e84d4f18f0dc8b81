//! Depth-first traversal engine
//!
//! For every node the engine:
//!
//! 1. delivers a picked notification if the node lies on a recorded hit path
//! 2. runs the pre-visit hook
//! 3. evaluates the node's parameters (unless the hook already did)
//! 4. visits the children in order, in a new data scope if the node binds data
//! 5. runs the post-visit hook
//!
//! Whatever a pre-visit hook writes into the [`GraphContext`] is visible to
//! the whole subtree and must be put back by the matching post-visit hook.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::backend::{Backend, BackendRegistry};
use crate::core::SceneError;
use crate::events::{Event, EventBus};
use crate::foundation::collections::{ProcessId, SceneId};

use super::data_scope::DataScope;
use super::graph_context::GraphContext;
use super::node::Node;
use super::process::ProcessTable;
use super::value::Params;

/// What a pass does with geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraversalMode {
    /// Draw as usual
    Render,
    /// Hit-test against a canvas coordinate instead of drawing
    Pick {
        /// Canvas X coordinate
        x: f64,
        /// Canvas Y coordinate
        y: f64,
    },
}

/// A resolved pick
///
/// `path` holds the child indices leading from the root to the hit node;
/// every node on that path is notified during the following render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedEvent {
    /// Canvas X coordinate
    pub x: f64,
    /// Canvas Y coordinate
    pub y: f64,
    /// Child indices from the root to the hit node
    pub path: Vec<usize>,
}

/// Summary of a finished pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    /// Nodes visited
    pub visited: usize,
    /// Hit found by a pick pass
    pub hit: Option<PickedEvent>,
}

/// One traversal pass over a scene graph
pub struct Traversal<'e> {
    mode: TraversalMode,
    events: &'e EventBus,
    backends: &'e BackendRegistry,
    configs: Option<&'e Params>,
    processes: Option<&'e RefCell<ProcessTable>>,
    scene: Option<SceneId>,
    deliver: Option<PickedEvent>,
    path: RefCell<Vec<usize>>,
    hit: RefCell<Option<Vec<usize>>>,
    visited: Cell<usize>,
}

impl<'e> Traversal<'e> {
    /// Create a pass in the given mode
    pub fn new(mode: TraversalMode, events: &'e EventBus, backends: &'e BackendRegistry) -> Self {
        Self {
            mode,
            events,
            backends,
            configs: None,
            processes: None,
            scene: None,
            deliver: None,
            path: RefCell::new(Vec::new()),
            hit: RefCell::new(None),
            visited: Cell::new(0),
        }
    }

    /// Tag the pass with the scene it renders
    #[must_use]
    pub const fn with_scene(mut self, scene: SceneId) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Per-sid parameter overrides (`{sid: {param: value}}`)
    #[must_use]
    pub const fn with_configs(mut self, configs: &'e Params) -> Self {
        self.configs = Some(configs);
        self
    }

    /// Process table hooks may start processes in
    #[must_use]
    pub const fn with_processes(mut self, processes: &'e RefCell<ProcessTable>) -> Self {
        self.processes = Some(processes);
        self
    }

    /// Deliver picked notifications along a hit path during this pass
    #[must_use]
    pub fn delivering(mut self, hit: Option<PickedEvent>) -> Self {
        self.deliver = hit;
        self
    }

    /// Mode of this pass
    pub const fn mode(&self) -> TraversalMode {
        self.mode
    }

    /// Walk the graph rooted at `root`
    pub fn run(
        &self,
        root: &Node,
        graph: &mut GraphContext,
        scope: &Rc<DataScope>,
    ) -> Result<PassOutcome, SceneError> {
        self.path.borrow_mut().clear();
        self.hit.replace(None);
        self.visited.set(0);

        log::trace!("Starting {:?} pass over {} nodes", self.mode, root.subtree_len());
        self.visit(root, graph, scope)?;

        let hit = match self.mode {
            TraversalMode::Pick { x, y } => self.hit.take().map(|path| PickedEvent { x, y, path }),
            TraversalMode::Render => None,
        };
        Ok(PassOutcome {
            visited: self.visited.get(),
            hit,
        })
    }

    fn visit(&self, node: &Node, graph: &mut GraphContext, scope: &Rc<DataScope>) -> Result<(), SceneError> {
        self.visited.set(self.visited.get() + 1);

        let params = {
            let mut ctx = NodeContext::new(self, node, scope, graph, None);
            if let (Some(listener), Some(event)) = (node.picked.as_deref(), self.picked_here()) {
                log::debug!("Delivering pick at ({}, {}) to {} node", event.x, event.y, node.kind());
                listener(&event, &mut ctx)?;
            }
            if let Some(hook) = node.pre_visit.as_deref() {
                hook(&mut ctx)?;
            }
            ctx.into_params()
        };

        let bound;
        let child_scope = if node.binds_data() {
            let mut data = DataScope::child(scope);
            data.put_all(&params);
            bound = Rc::new(data);
            &bound
        } else {
            scope
        };

        for (index, child) in node.children().iter().enumerate() {
            self.path.borrow_mut().push(index);
            let result = self.visit(child, graph, child_scope);
            self.path.borrow_mut().pop();
            result?;
        }

        if let Some(hook) = node.post_visit.as_deref() {
            let mut ctx = NodeContext::new(self, node, scope, graph, Some(params));
            hook(&mut ctx)?;
        }
        Ok(())
    }

    fn picked_here(&self) -> Option<PickedEvent> {
        let event = self.deliver.as_ref()?;
        event.path.starts_with(&self.path.borrow()).then(|| event.clone())
    }

    fn overrides_for(&self, node: &Node) -> Option<&'e Params> {
        let sid = node.sid()?;
        self.configs?.map(sid)
    }
}

/// What a hook sees of the pass it runs in
pub struct NodeContext<'t, 'g> {
    traversal: &'t Traversal<'t>,
    node: &'t Node,
    scope: &'t DataScope,
    graph: &'g mut GraphContext,
    params: Option<Cow<'t, Params>>,
}

impl<'t, 'g> NodeContext<'t, 'g> {
    fn new(
        traversal: &'t Traversal<'t>,
        node: &'t Node,
        scope: &'t DataScope,
        graph: &'g mut GraphContext,
        params: Option<Cow<'t, Params>>,
    ) -> Self {
        Self {
            traversal,
            node,
            scope,
            graph,
            params,
        }
    }

    /// Shared per-pass context
    pub fn graph(&self) -> &GraphContext {
        self.graph
    }

    /// Shared per-pass context, writable
    pub fn graph_mut(&mut self) -> &mut GraphContext {
        self.graph
    }

    /// The node's parameters for this pass
    ///
    /// Evaluated at most once per pass, with scene config overrides for the
    /// node's sid applied on top.
    pub fn params(&mut self) -> &Params {
        let (traversal, node, scope) = (self.traversal, self.node, self.scope);
        self.params.get_or_insert_with(|| evaluate(traversal, node, scope))
    }

    fn into_params(mut self) -> Cow<'t, Params> {
        match self.params.take() {
            Some(params) => params,
            None => evaluate(self.traversal, self.node, self.scope),
        }
    }

    /// Type name of the node being visited
    pub fn node_kind(&self) -> &str {
        self.node.kind()
    }

    /// Scoped id of the node being visited
    pub fn node_sid(&self) -> Option<&str> {
        self.node.sid()
    }

    /// Mode of the current pass
    pub const fn mode(&self) -> TraversalMode {
        self.traversal.mode
    }

    /// Whether this is a pick pass
    pub const fn is_picking(&self) -> bool {
        matches!(self.traversal.mode, TraversalMode::Pick { .. })
    }

    /// Coordinate being hit-tested, in pick passes only
    pub const fn pick_point(&self) -> Option<(f64, f64)> {
        match self.traversal.mode {
            TraversalMode::Pick { x, y } => Some((x, y)),
            TraversalMode::Render => None,
        }
    }

    /// Record the current node as lying under the pick point
    ///
    /// The last hit reported in a pass wins. Returns false outside pick passes.
    pub fn report_hit(&self) -> bool {
        if !self.is_picking() {
            return false;
        }
        let path = self.traversal.path.borrow().clone();
        log::debug!("Pick hit on {} node at {:?}", self.node.kind(), path);
        self.traversal.hit.replace(Some(path));
        true
    }

    /// Child indices from the root to this node
    pub fn path(&self) -> Vec<usize> {
        self.traversal.path.borrow().clone()
    }

    /// Depth of this node, the root being 0
    pub fn depth(&self) -> usize {
        self.traversal.path.borrow().len()
    }

    /// Scene being rendered, if the pass belongs to one
    pub const fn scene(&self) -> Option<SceneId> {
        self.traversal.scene
    }

    /// Lifecycle event bus
    pub const fn events(&self) -> &EventBus {
        self.traversal.events
    }

    /// Fire an event on the bus
    pub fn fire_event(&self, event: &Event) -> Result<(), SceneError> {
        self.traversal.events.fire_event(event)
    }

    /// Look up an installed backend
    pub fn backend(&self, backend_type: &str) -> Result<Rc<dyn Backend>, SceneError> {
        self.traversal.backends.get_backend(backend_type)
    }

    /// Look up an installed backend by concrete type
    pub fn backend_as<B: Backend>(&self, backend_type: &str) -> Result<Rc<B>, SceneError> {
        self.traversal.backends.get_backend_as(backend_type)
    }

    /// Report an error that aborts the pass; use as `return Err(ctx.fatal_error(e))`
    pub fn fatal_error(&self, exception: SceneError) -> SceneError {
        self.traversal.events.fatal_error(exception)
    }

    /// Report an advisory error and carry on
    pub fn error(&self, exception: SceneError) {
        self.traversal.events.error(exception);
    }

    /// Start tracking an asynchronous process for the scene
    pub fn start_process(&self, description: impl Into<String>) -> Result<ProcessId, SceneError> {
        self.traversal
            .processes
            .ok_or_else(|| SceneError::InvalidSceneGraph("pass has no scene to own processes".to_string()))?
            .borrow_mut()
            .start(description)
    }

    /// Finish a process started in this or an earlier pass
    pub fn finish_process(&self, id: ProcessId) -> bool {
        self.traversal
            .processes
            .is_some_and(|processes| processes.borrow_mut().finish(id))
    }
}

fn evaluate<'t>(traversal: &Traversal<'t>, node: &'t Node, scope: &DataScope) -> Cow<'t, Params> {
    let mut params = node.evaluate(scope);
    if let Some(overrides) = traversal.overrides_for(node) {
        params.to_mut().apply_overrides(overrides);
    }
    params
}
