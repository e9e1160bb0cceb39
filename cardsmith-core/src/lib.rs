//! # Cardsmith Core
//!
//! Loading and execution layer for cardsmith card sets: resolves card set
//! definitions from directories, zip bundles or HTTP locations, parses and
//! binds their face templates through [`cardsmith_ctml`], and runs face
//! setup scripts inside a sandboxed Luau interpreter with hard resource
//! limits.
//!
//! ## Quick tour
//! ```ignore
//! use cardsmith_core::{CancelToken, CardLoader};
//!
//! let loader = CardLoader::new();
//! let set = loader.load("./my-cards").await?;
//! if let Some(face) = set.front_faces.get("hero") {
//!     let vars = face.run_setup(vec![], CancelToken::new()).await?;
//! }
//! # Ok::<(), cardsmith_core::CardError>(())
//! ```

pub mod error;
pub mod loader;
pub mod logging;
pub mod model;
pub mod path;
pub mod render;
pub mod resolver;
pub mod scope;
pub mod script;

pub use error::{CardError, CardResult, LimitKind};
pub use loader::{CardLoader, EntryPoint, LoadedCardSet, LoadedFace};
pub use logging::init_logging;
pub use model::{CardResources, CardSet};
pub use path::{PathKind, ResourcePath};
pub use render::{RenderFormat, RenderOptions, VectorRenderer};
pub use resolver::{FetchedFile, FileResolver};
pub use scope::{RenderScope, ScopeStack};
pub use script::{
    CancelToken, Expression, HostContext, PreparedModule, ScriptLimits, ScriptRunner,
};
