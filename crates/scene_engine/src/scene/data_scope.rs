//! Parent-linked data scopes
//!
//! A scene's data map becomes the root scope of every pass. Nodes that bind
//! data open a child scope for their subtree; lookups walk from the nearest
//! scope outwards, so a child's binding shadows its ancestors' and siblings
//! never see each other's bindings.

use std::collections::HashMap;
use std::rc::Rc;

use super::value::{Params, Value};

/// Immutable-once-shared key/value lookup chain
#[derive(Debug, Clone, Default)]
pub struct DataScope {
    parent: Option<Rc<DataScope>>,
    data: HashMap<String, Value>,
}

impl DataScope {
    /// Create a scope with the given parent
    pub fn new(parent: Option<Rc<Self>>) -> Self {
        Self {
            parent,
            data: HashMap::new(),
        }
    }

    /// Create a root scope holding a data map
    pub fn from_params(params: &Params) -> Self {
        let mut scope = Self::default();
        scope.put_all(params);
        scope
    }

    /// Create a child scope that falls back to `parent`
    pub fn child(parent: &Rc<Self>) -> Self {
        Self::new(Some(Rc::clone(parent)))
    }

    /// Bind a value at this level only
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Bind every entry of a map at this level
    pub fn put_all(&mut self, params: &Params) {
        for (key, value) in params.iter() {
            self.data.insert(key.to_string(), value.clone());
        }
    }

    /// Nearest binding for `key`, searching outwards through the parents
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.data.get(key) {
                return Some(value);
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Nearest binding as a number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Nearest binding as a string
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Parent scope, if any
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Number of scopes in the chain, this one included
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut scope = self;
        while let Some(parent) = scope.parent.as_deref() {
            depth += 1;
            scope = parent;
        }
        depth
    }
}
