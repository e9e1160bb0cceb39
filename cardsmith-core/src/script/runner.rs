use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{Lua, LuaSerdeExt, VmState};
use serde_json::Value;

use crate::error::{CardError, CardResult, LimitKind};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RECURSION: usize = 900;
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Resource caps enforced on every execution, all at once.
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    pub timeout: Duration,
    pub max_recursion: usize,
    pub memory_limit_bytes: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_recursion: DEFAULT_MAX_RECURSION,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }
}

/// Named script source, parsed once and reusable across isolated runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedModule {
    pub name: String,
    pub source: String,
}

impl PreparedModule {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// External cancellation signal, observed at every interrupt checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Builds the table a host module exposes, once per isolated state.
pub type HostModuleFn = Arc<dyn Fn(&Lua) -> mlua::Result<mlua::Table> + Send + Sync>;

// Which check tripped the interrupt, recorded so the surfaced error can
// tell cancellation apart from resource limits.
const TRIP_NONE: u8 = 0;
const TRIP_TIMEOUT: u8 = 1;
const TRIP_RECURSION: u8 = 2;
const TRIP_CANCELLED: u8 = 3;

/// A sandboxed, re-entrant script evaluator.
///
/// Modules are registered up front by name; `execute` then spins up a
/// fresh sandboxed interpreter per call, so concurrent executions share
/// nothing. Registration is not thread-safe and must finish before the
/// first `execute`.
#[derive(Clone)]
pub struct ScriptRunner {
    modules: HashMap<String, String>,
    host_modules: Vec<(String, HostModuleFn)>,
    main_source: Option<String>,
    limits: ScriptLimits,
}

impl ScriptRunner {
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            modules: HashMap::new(),
            host_modules: Vec::new(),
            main_source: None,
            limits,
        }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules
            .keys()
            .map(String::as_str)
            .chain(self.host_modules.iter().map(|(name, _)| name.as_str()))
    }

    /// Registers a module loadable through `require(name)`.
    pub fn add_module(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> CardResult<()> {
        let name = name.into();
        if self.has_module(&name) {
            return Err(CardError::DuplicateModule { name });
        }
        self.modules.insert(name, source.into());
        Ok(())
    }

    /// Registers a host-provided module built from native functions.
    pub fn add_host_module(
        &mut self,
        name: impl Into<String>,
        builder: HostModuleFn,
    ) -> CardResult<()> {
        let name = name.into();
        if self.has_module(&name) {
            return Err(CardError::DuplicateModule { name });
        }
        self.host_modules.push((name, builder));
        Ok(())
    }

    /// Installs the main module. Its chunk must evaluate to the entry
    /// function the host invokes.
    pub fn set_main(&mut self, source: impl Into<String>) {
        self.main_source = Some(source.into());
    }

    fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
            || self.host_modules.iter().any(|(existing, _)| existing == name)
    }

    /// Runs the main entry function with positional arguments on a worker
    /// thread, so a pathological script cannot stall the caller's task.
    pub async fn execute(&self, args: Vec<Value>, cancel: CancelToken) -> CardResult<Value> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.execute_blocking(args, cancel))
            .await
            .map_err(|err| CardError::Io(std::io::Error::other(err)))?
    }

    /// Synchronous variant of [`execute`](Self::execute); same isolation.
    pub fn execute_blocking(&self, args: Vec<Value>, cancel: CancelToken) -> CardResult<Value> {
        let main = self
            .main_source
            .as_deref()
            .ok_or(CardError::MissingMainModule)?;

        let state = sandboxed_state(&self.limits, Some(cancel))?;
        install_require(
            &state.lua,
            self.modules.clone(),
            self.host_modules.iter().cloned().collect(),
        )
        .map_err(CardError::from)?;

        let entry: mlua::Function = match state.lua.load(main).set_name("main").eval() {
            Ok(mlua::Value::Function(function)) => function,
            Ok(_) => return Err(CardError::MainNotAFunction),
            Err(err) => return Err(state.map_error(err)),
        };

        let lua_args = args
            .iter()
            .map(|arg| state.lua.to_value(arg))
            .collect::<mlua::Result<mlua::MultiValue>>()
            .map_err(CardError::from)?;

        let result: mlua::Value = entry.call(lua_args).map_err(|err| state.map_error(err))?;
        state.into_json(result)
    }
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field(
                "host_modules",
                &self.host_modules.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("has_main", &self.main_source.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

// ── Isolated state construction ───────────────────────────────────────────

pub(crate) struct SandboxState {
    pub(crate) lua: Lua,
    trip: Arc<AtomicU8>,
}

impl SandboxState {
    /// Maps an interpreter error back to the limit or cancellation that
    /// caused it, when the interrupt recorded one.
    pub(crate) fn map_error(&self, err: mlua::Error) -> CardError {
        match self.trip.load(Ordering::Relaxed) {
            TRIP_TIMEOUT => CardError::ScriptResourceExceeded {
                limit: LimitKind::Timeout,
            },
            TRIP_RECURSION => CardError::ScriptResourceExceeded {
                limit: LimitKind::Recursion,
            },
            TRIP_CANCELLED => CardError::ScriptCancelled,
            _ => err.into(),
        }
    }

    /// Normalizes a script result: nil becomes an explicit null.
    pub(crate) fn into_json(self, value: mlua::Value) -> CardResult<Value> {
        if value.is_nil() {
            return Ok(Value::Null);
        }
        self.lua.from_value(value).map_err(CardError::from)
    }
}

/// Fresh interpreter with the sandbox, the memory cap, and an interrupt
/// enforcing timeout, recursion depth and cancellation.
pub(crate) fn sandboxed_state(
    limits: &ScriptLimits,
    cancel: Option<CancelToken>,
) -> CardResult<SandboxState> {
    let lua = Lua::new();
    lua.sandbox(true).map_err(CardError::from)?;
    lua.set_memory_limit(limits.memory_limit_bytes)
        .map_err(CardError::from)?;

    // Script print output goes to the log, never to stdout.
    let print_fn = lua
        .create_function(|_, args: mlua::Variadic<String>| {
            log::debug!("[script print] {}", args.join("\t"));
            Ok(())
        })
        .map_err(CardError::from)?;
    lua.globals().set("print", print_fn).map_err(CardError::from)?;

    let trip = Arc::new(AtomicU8::new(TRIP_NONE));
    let trip_check = Arc::clone(&trip);
    let started = Instant::now();
    let timeout = limits.timeout;
    let max_recursion = limits.max_recursion;
    lua.set_interrupt(move |lua| {
        if let Some(cancel) = &cancel {
            if cancel.is_cancelled() {
                trip_check.store(TRIP_CANCELLED, Ordering::Relaxed);
                return Err(mlua::Error::RuntimeError("execution cancelled".to_string()));
            }
        }
        if started.elapsed() > timeout {
            trip_check.store(TRIP_TIMEOUT, Ordering::Relaxed);
            return Err(mlua::Error::RuntimeError("execution timed out".to_string()));
        }
        // A frame existing at the cap means the stack is deeper than allowed.
        if lua.inspect_stack(max_recursion, |_| ()).is_some() {
            trip_check.store(TRIP_RECURSION, Ordering::Relaxed);
            return Err(mlua::Error::RuntimeError(
                "recursion limit exceeded".to_string(),
            ));
        }
        Ok(VmState::Continue)
    });

    Ok(SandboxState { lua, trip })
}

/// Installs a `require` resolving only the registered modules, with
/// per-state caching so a module body runs at most once per execution.
fn install_require(
    lua: &Lua,
    modules: HashMap<String, String>,
    host_modules: HashMap<String, HostModuleFn>,
) -> mlua::Result<()> {
    let loaded = lua.create_table()?;
    let require = lua.create_function(move |lua, name: String| {
        let cached: mlua::Value = loaded.get(name.as_str())?;
        if !cached.is_nil() {
            return Ok(cached);
        }

        let value: mlua::Value = if let Some(builder) = host_modules.get(&name) {
            mlua::Value::Table(builder(lua)?)
        } else if let Some(source) = modules.get(&name) {
            lua.load(source.as_str()).set_name(&name).eval()?
        } else {
            return Err(mlua::Error::RuntimeError(format!(
                "module '{name}' is not registered"
            )));
        };

        loaded.set(name.as_str(), value.clone())?;
        Ok(value)
    })?;
    lua.globals().set("require", require)?;
    Ok(())
}
