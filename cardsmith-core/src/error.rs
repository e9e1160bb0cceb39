use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use cardsmith_ctml::CtmlError;

pub type CardResult<T> = Result<T, CardError>;

/// Which sandbox limit a script ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Timeout,
    Recursion,
    Memory,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LimitKind::Timeout => "timeout",
            LimitKind::Recursion => "recursion",
            LimitKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CardError {
    #[error(transparent)]
    Ctml(#[from] CtmlError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid card set definition: {0}")]
    Definition(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("No entry point found under '{path}'")]
    EntryPointNotFound { path: PathBuf },

    #[error("Resource not found: '{path}'")]
    ResourceNotFound { path: PathBuf },

    #[error("Nested archives are not supported: '{path}' contains another archive")]
    NestedArchive { path: PathBuf },

    #[error("Duplicate script name '{name}'")]
    DuplicateScriptName { name: String },

    #[error("Duplicate module name '{name}'")]
    DuplicateModule { name: String },

    #[error("Face document must contain a template section")]
    MissingTemplate,

    #[error("Face document contains more than one template section")]
    MultipleTemplates,

    #[error("Face document contains more than one setup script")]
    MultipleSetupScripts,

    #[error("Script tag needs an inline body or a 'src' attribute")]
    ScriptMissingSource,

    #[error("Non-setup script tags need a 'name' attribute")]
    ScriptMissingName,

    #[error("Script exceeded its {limit} limit")]
    ScriptResourceExceeded { limit: LimitKind },

    #[error("Script execution was cancelled")]
    ScriptCancelled,

    #[error("Script error: {0}")]
    Script(String),

    #[error("The main module did not evaluate to a function")]
    MainNotAFunction,

    #[error("No main module has been registered")]
    MissingMainModule,

    #[error("The '{scheme}' scheme is not supported")]
    ResolverNotSupported { scheme: String },
}

impl From<mlua::Error> for CardError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::MemoryError(_) => CardError::ScriptResourceExceeded {
                limit: LimitKind::Memory,
            },
            other => CardError::Script(other.to_string()),
        }
    }
}
