//! Scene graph nodes and their construction
//!
//! A node is built from a list of arguments: a parameter source followed by
//! zero or more children. The source is either a literal [`Params`] map,
//! which can be evaluated once and cached, or a callback that is re-run
//! against the current [`DataScope`] on every pass.
//!
//! ```text
//! Node::new(vec![
//!     Params::new().with("angle", 45.0).into(),   // literal, cachable
//!     child_a.into(),
//!     child_b.into(),
//! ])
//! ```

use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::core::SceneError;

use super::data_scope::DataScope;
use super::traversal::{NodeContext, PickedEvent};
use super::value::Params;

/// Callback producing parameters from the current data scope
pub type ParamsFn = Rc<dyn Fn(&DataScope) -> Params>;

/// Pre- or post-visit hook
pub type VisitHook = Box<dyn Fn(&mut NodeContext<'_, '_>) -> Result<(), SceneError>>;

/// Listener for picked notifications
pub type PickedListener = Box<dyn Fn(&PickedEvent, &mut NodeContext<'_, '_>) -> Result<(), SceneError>>;

/// Where a node's parameters come from
#[derive(Clone)]
pub enum ParameterSource {
    /// Fixed parameter map
    Literal(Params),
    /// Evaluated against the data scope on every pass
    Dynamic(ParamsFn),
}

impl ParameterSource {
    /// Wrap a callback
    pub fn dynamic(f: impl Fn(&DataScope) -> Params + 'static) -> Self {
        Self::Dynamic(Rc::new(f))
    }

    /// Whether evaluated parameters may be reused across passes
    pub const fn is_cachable(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Evaluate against a scope
    pub fn resolve(&self, scope: &DataScope) -> Params {
        match self {
            Self::Literal(params) => params.clone(),
            Self::Dynamic(f) => f(scope),
        }
    }
}

impl fmt::Debug for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(params) => f.debug_tuple("Literal").field(params).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// One constructor argument of a node
pub enum NodeArg {
    /// Literal parameter map
    Literal(Params),
    /// Parameter callback
    Dynamic(ParamsFn),
    /// Child node
    Child(Node),
}

impl NodeArg {
    /// Wrap a parameter callback
    pub fn dynamic(f: impl Fn(&DataScope) -> Params + 'static) -> Self {
        Self::Dynamic(Rc::new(f))
    }

    const fn describe(&self) -> &'static str {
        match self {
            Self::Literal(_) => "parameter map",
            Self::Dynamic(_) => "parameter callback",
            Self::Child(_) => "node",
        }
    }
}

impl From<Params> for NodeArg {
    fn from(params: Params) -> Self {
        Self::Literal(params)
    }
}

impl From<Node> for NodeArg {
    fn from(node: Node) -> Self {
        Self::Child(node)
    }
}

impl From<ParameterSource> for NodeArg {
    fn from(source: ParameterSource) -> Self {
        match source {
            ParameterSource::Literal(params) => Self::Literal(params),
            ParameterSource::Dynamic(f) => Self::Dynamic(f),
        }
    }
}

/// Result of classifying a node's constructor arguments
#[derive(Debug)]
pub struct NodeConfig {
    /// Parameter source
    pub source: ParameterSource,
    /// True only for literal sources
    pub cachable: bool,
    /// Children in the order given
    pub children: Vec<Node>,
}

/// Split constructor arguments into a parameter source and children
pub fn extract_config(args: Vec<NodeArg>) -> Result<NodeConfig, SceneError> {
    let mut args = args.into_iter();
    let source = match args.next() {
        None => {
            return Err(SceneError::InvalidNodeConfig(
                "expected a configuration followed by zero or more child nodes".to_string(),
            ))
        }
        Some(NodeArg::Literal(params)) => ParameterSource::Literal(params),
        Some(NodeArg::Dynamic(f)) => ParameterSource::Dynamic(f),
        Some(NodeArg::Child(_)) => {
            return Err(SceneError::InvalidNodeConfig(
                "first argument must be a configuration, not a node".to_string(),
            ))
        }
    };

    let children = args
        .enumerate()
        .map(|(i, arg)| match arg {
            NodeArg::Child(node) => Ok(node),
            other => Err(SceneError::InvalidNodeConfig(format!(
                "argument {} must be a child node, got a {}",
                i + 1,
                other.describe()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NodeConfig {
        cachable: source.is_cachable(),
        source,
        children,
    })
}

/// A unit of the scene graph
pub struct Node {
    kind: Cow<'static, str>,
    sid: Option<String>,
    source: ParameterSource,
    cachable: bool,
    defaults: Params,
    cached: OnceCell<Params>,
    binds_data: bool,
    children: Vec<Node>,
    pub(crate) pre_visit: Option<VisitHook>,
    pub(crate) post_visit: Option<VisitHook>,
    pub(crate) picked: Option<PickedListener>,
}

impl Node {
    /// Build a node from constructor arguments
    pub fn new(args: Vec<NodeArg>) -> Result<Self, SceneError> {
        Ok(Self::from_config(extract_config(args)?))
    }

    /// Build a node whose parameters fall back to `defaults` for every key
    /// the caller leaves undefined
    pub fn extend(args: Vec<NodeArg>, defaults: Params) -> Result<Self, SceneError> {
        let mut node = Self::new(args)?;
        node.defaults = defaults;
        Ok(node)
    }

    /// Build a node from an already classified config
    pub fn from_config(config: NodeConfig) -> Self {
        Self {
            kind: Cow::Borrowed("node"),
            sid: None,
            source: config.source,
            cachable: config.cachable,
            defaults: Params::new(),
            cached: OnceCell::new(),
            binds_data: false,
            children: config.children,
            pre_visit: None,
            post_visit: None,
            picked: None,
        }
    }

    /// Childless node with literal parameters
    pub fn literal(params: Params) -> Self {
        Self::from_config(NodeConfig {
            source: ParameterSource::Literal(params),
            cachable: true,
            children: Vec::new(),
        })
    }

    /// Childless node with empty parameters
    pub fn empty() -> Self {
        Self::literal(Params::new())
    }

    /// Set the hook run before the children are visited
    #[must_use]
    pub fn on_pre_visit(
        mut self,
        hook: impl Fn(&mut NodeContext<'_, '_>) -> Result<(), SceneError> + 'static,
    ) -> Self {
        self.pre_visit = Some(Box::new(hook));
        self
    }

    /// Set the hook run after the children are visited
    #[must_use]
    pub fn on_post_visit(
        mut self,
        hook: impl Fn(&mut NodeContext<'_, '_>) -> Result<(), SceneError> + 'static,
    ) -> Self {
        self.post_visit = Some(Box::new(hook));
        self
    }

    /// Listen for picked notifications on this node
    #[must_use]
    pub fn on_picked(
        mut self,
        listener: impl Fn(&PickedEvent, &mut NodeContext<'_, '_>) -> Result<(), SceneError> + 'static,
    ) -> Self {
        self.picked = Some(Box::new(listener));
        self
    }

    /// Give the node a scoped id that scene configs can target
    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Name the node type, used in log output
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Bind the evaluated parameters into a new data scope for the children
    #[must_use]
    pub const fn binding_data(mut self) -> Self {
        self.binds_data = true;
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Node type name
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Scoped id, if any
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Whether evaluated parameters are reused across passes
    pub const fn is_cachable(&self) -> bool {
        self.cachable
    }

    /// Whether children see a new data scope
    pub const fn binds_data(&self) -> bool {
        self.binds_data
    }

    /// Parameter source
    pub const fn source(&self) -> &ParameterSource {
        &self.source
    }

    /// Children in visit order
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Total number of nodes in this subtree
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }

    /// Evaluate parameters, defaults applied
    ///
    /// Literal sources are evaluated on first use and borrowed from the
    /// cache afterwards; callbacks run every time.
    pub fn evaluate(&self, scope: &DataScope) -> Cow<'_, Params> {
        match &self.source {
            ParameterSource::Literal(params) if self.cachable => Cow::Borrowed(self.cached.get_or_init(|| {
                let mut params = params.clone();
                params.apply_defaults(&self.defaults);
                params
            })),
            source => {
                let mut params = source.resolve(scope);
                params.apply_defaults(&self.defaults);
                Cow::Owned(params)
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("sid", &self.sid)
            .field("source", &self.source)
            .field("cachable", &self.cachable)
            .field("binds_data", &self.binds_data)
            .field("children", &self.children)
            .field("pre_visit", &self.pre_visit.is_some())
            .field("post_visit", &self.post_visit.is_some())
            .field("picked", &self.picked.is_some())
            .finish()
    }
}
