//! Sandboxed Luau execution for face setup scripts and bound expressions.

pub mod expression;
pub mod host;
pub mod runner;

pub use expression::Expression;
pub use host::{system_module, HostContext};
pub use runner::{
    CancelToken, HostModuleFn, PreparedModule, ScriptLimits, ScriptRunner,
    DEFAULT_MAX_RECURSION, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT,
};
