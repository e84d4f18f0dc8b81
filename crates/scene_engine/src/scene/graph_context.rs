//! Per-pass side channel from parents to descendants
//!
//! A parent writes a field in its pre-visit hook, every descendant can read
//! it, and the parent puts the previous value back in its post-visit hook so
//! the next sibling subtree starts from a clean slate.

use std::collections::HashMap;

use super::value::Value;

/// Mutable state shared by every hook of one traversal pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphContext {
    values: HashMap<String, Value>,
}

impl GraphContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the previous value for later [`restore`](Self::restore)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Read a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Put back what [`set`](Self::set) returned
    pub fn restore(&mut self, key: impl Into<String>, previous: Option<Value>) {
        let key = key.into();
        match previous {
            Some(value) => {
                self.values.insert(key, value);
            }
            None => {
                self.values.remove(&key);
            }
        }
    }

    /// Whether no fields are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_restore() {
        let mut ctx = GraphContext::new();
        let outer = ctx.set("depth", 1);
        let inner = ctx.set("depth", 2);
        assert_eq!(inner, Some(Value::from(1)));

        ctx.restore("depth", inner);
        assert_eq!(ctx.get("depth"), Some(&Value::from(1)));
        ctx.restore("depth", outer);
        assert!(ctx.is_empty());
    }
}
