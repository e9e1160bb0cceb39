use std::collections::HashMap;

use serde_json::Value;

/// One level of render variables.
///
/// Script return values merge in loosely: objects contribute their entries
/// (last write wins), arrays merge item by item, null and scalars are
/// ignored. That lets a setup script return one object, a list of objects,
/// or nothing at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderScope {
    variables: HashMap<String, Value>,
}

impl RenderScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn merge(&mut self, value: &Value) {
        match value {
            Value::Object(entries) => {
                for (key, entry) in entries {
                    self.variables.insert(key.clone(), entry.clone());
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.merge(item);
                }
            }
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }
}

/// Nested scopes used while walking the bound element tree. Directives
/// push a scope for their children and pop it on the way out.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    scopes: Vec<RenderScope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![RenderScope::new()],
        }
    }

    pub fn push(&mut self, scope: RenderScope) {
        self.scopes.push(scope);
    }

    pub fn push_new(&mut self) -> &mut RenderScope {
        self.scopes.push(RenderScope::new());
        self.scopes.last_mut().unwrap_or_else(|| unreachable!())
    }

    pub fn pop(&mut self) -> Option<RenderScope> {
        // The root scope stays.
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Innermost binding of the name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Snapshot of every visible variable, inner scopes shadowing outer
    /// ones. This is what expression evaluation receives; the stack itself
    /// is never handed to a script.
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            for (key, value) in scope.variables() {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn merge_skips_null_and_scalars() {
        let mut scope = RenderScope::new();
        scope.merge(&Value::Null);
        scope.merge(&json!(42));
        scope.merge(&json!("loose string"));
        assert!(scope.is_empty());
    }

    #[test]
    fn merge_flattens_objects_and_arrays() {
        let mut scope = RenderScope::new();
        scope.merge(&json!([{"a": 1}, {"b": 2}, null, [{"c": 3}]]));
        assert_eq!(scope.get("a"), Some(&json!(1)));
        assert_eq!(scope.get("b"), Some(&json!(2)));
        assert_eq!(scope.get("c"), Some(&json!(3)));
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut scope = RenderScope::new();
        scope.merge(&json!({"title": "old"}));
        scope.merge(&json!({"title": "new"}));
        assert_eq!(scope.get("title"), Some(&json!("new")));
    }

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let mut stack = ScopeStack::new();
        stack.push_new().set("x", json!(1));
        stack.push_new().set("x", json!(2));
        assert_eq!(stack.get("x"), Some(&json!(2)));
        assert_eq!(stack.flatten().get("x"), Some(&json!(2)));

        stack.pop();
        assert_eq!(stack.get("x"), Some(&json!(1)));
    }

    #[test]
    fn the_root_scope_cannot_be_popped() {
        let mut stack = ScopeStack::new();
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
    }
}
