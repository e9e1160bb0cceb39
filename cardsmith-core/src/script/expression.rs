use std::collections::HashMap;

use mlua::{Lua, LuaSerdeExt};
use serde_json::Value;

use crate::error::{CardError, CardResult};
use crate::scope::ScopeStack;
use crate::script::runner::{sandboxed_state, ScriptLimits};

/// A single bound-attribute expression, syntax-checked at bind time and
/// evaluated against render variables at draw time.
///
/// The source is wrapped in `return (...)` so it must be an expression,
/// never a statement list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
}

impl Expression {
    /// Compiles the expression once in a throwaway interpreter to reject
    /// malformed sources early. Nothing is executed here.
    pub fn prepare(source: impl Into<String>) -> CardResult<Self> {
        let source = source.into();
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(CardError::Script("empty bound expression".to_string()));
        }

        let lua = Lua::new();
        lua.load(Self::wrap(trimmed))
            .into_function()
            .map_err(|err| {
                CardError::Script(format!("invalid expression '{trimmed}': {err}"))
            })?;

        Ok(Self {
            source: trimmed.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates in a fresh sandboxed state with the given variables set
    /// as globals. A nil result becomes an explicit null.
    pub fn evaluate(
        &self,
        env: &HashMap<String, Value>,
        limits: &ScriptLimits,
    ) -> CardResult<Value> {
        let state = sandboxed_state(limits, None)?;
        for (name, value) in env {
            let lua_value = state.lua.to_value(value).map_err(CardError::from)?;
            state
                .lua
                .globals()
                .set(name.as_str(), lua_value)
                .map_err(CardError::from)?;
        }

        let result: mlua::Value = state
            .lua
            .load(Self::wrap(&self.source))
            .set_name("expression")
            .eval()
            .map_err(|err| state.map_error(err))?;
        state.into_json(result)
    }

    /// Evaluates against everything visible on the scope stack.
    pub fn evaluate_with_scope(
        &self,
        scopes: &ScopeStack,
        limits: &ScriptLimits,
    ) -> CardResult<Value> {
        self.evaluate(&scopes.flatten(), limits)
    }

    fn wrap(source: &str) -> String {
        format!("return ({source})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn prepare_rejects_statements_and_garbage() {
        assert!(matches!(
            Expression::prepare("local x = 1"),
            Err(CardError::Script(_))
        ));
        assert!(matches!(Expression::prepare("   "), Err(CardError::Script(_))));
        assert!(matches!(Expression::prepare("1 +"), Err(CardError::Script(_))));
    }

    #[test]
    fn evaluates_with_environment_variables() {
        let expr = Expression::prepare("cost * 2").unwrap();
        let mut env = HashMap::new();
        env.insert("cost".to_string(), json!(7));
        let result = expr.evaluate(&env, &ScriptLimits::default()).unwrap();
        assert_eq!(result, json!(14));
    }

    #[test]
    fn missing_variables_read_as_nil() {
        let expr = Expression::prepare("missing == nil").unwrap();
        let result = expr
            .evaluate(&HashMap::new(), &ScriptLimits::default())
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn nil_results_normalize_to_null() {
        let expr = Expression::prepare("nil").unwrap();
        let result = expr
            .evaluate(&HashMap::new(), &ScriptLimits::default())
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn scope_stack_shadowing_reaches_expressions() {
        let expr = Expression::prepare("n + 1").unwrap();
        let mut scopes = ScopeStack::new();
        scopes.push_new().set("n", json!(1));
        scopes.push_new().set("n", json!(10));
        let result = expr
            .evaluate_with_scope(&scopes, &ScriptLimits::default())
            .unwrap();
        assert_eq!(result, json!(11));
    }

    #[test]
    fn source_keeps_the_trimmed_text() {
        let expr = Expression::prepare("  cost > 3  ").unwrap();
        assert_eq!(expr.source(), "cost > 3");
    }
}
