//! Loading card sets from directories, archives and remote locations.

pub mod archive;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use cardsmith_ctml::{
    bind_template, parse_template_with_config, AstAttributeKind, AstElement, BoundElement,
    CtmlError, ParserConfig, SizeContext,
};

use crate::error::{CardError, CardResult};
use crate::loader::archive::TempDirGuard;
use crate::model::CardSet;
use crate::path::{extension_for_mime, ResourcePath};
use crate::resolver::FileResolver;
use crate::script::{
    system_module, CancelToken, Expression, HostContext, PreparedModule, ScriptLimits,
    ScriptRunner,
};

const ENTRY_POINT_NAMES: [&str; 3] = ["index", "main", "card"];
const ENTRY_POINT_EXTENSIONS: [&str; 3] = ["json", "cards", "zip"];

/// Module name the face setup script is registered under.
const SETUP_MODULE: &str = "face-script";
/// Module name of the host-provided card set API.
const SYSTEM_MODULE: &str = "system";

// The synthesized main module. The setup script must itself evaluate to a
// function; this forwards the render arguments to it.
const FACE_MAIN: &str = "local setup = require(\"face-script\")\n\
                         return function(...)\n    return setup(...)\nend\n";

/// What a location resolves to once the entry file is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// A JSON card set definition.
    File(PathBuf),
    /// A zip bundle that must be extracted first.
    Archive(PathBuf),
}

/// One face of a card: its bound template plus the scripts it declared.
#[derive(Debug)]
pub struct LoadedFace {
    pub template: Vec<BoundElement>,
    /// The template children as parsed, before binding.
    pub raw_elements: Vec<AstElement>,
    pub setup_script: Option<PreparedModule>,
    pub named_scripts: HashMap<String, PreparedModule>,
    /// Present only when the face declared a setup script.
    pub runner: Option<ScriptRunner>,
}

impl LoadedFace {
    /// Runs the setup script with positional arguments. Faces without one
    /// yield `None`.
    pub async fn run_setup(
        &self,
        args: Vec<Value>,
        cancel: CancelToken,
    ) -> CardResult<Option<Value>> {
        match &self.runner {
            Some(runner) => runner.execute(args, cancel).await.map(Some),
            None => Ok(None),
        }
    }
}

/// A fully loaded card set: definition, faces, shared scripts and the
/// temporary directories that must eventually be cleaned up.
#[derive(Debug)]
pub struct LoadedCardSet {
    pub definition: CardSet,
    pub working_directory: PathBuf,
    pub entry_file: PathBuf,
    pub back_face: Option<LoadedFace>,
    pub front_faces: HashMap<String, LoadedFace>,
    pub shared_scripts: HashMap<String, PreparedModule>,
    /// Live variable table shared with face scripts via the system module.
    pub variables: Arc<RwLock<HashMap<String, Value>>>,
    pub current_frame: i32,
    /// Extraction and download directories owned by this set.
    pub cleanup_paths: Vec<PathBuf>,
}

impl LoadedCardSet {
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        if let Ok(mut variables) = self.variables.write() {
            variables.insert(name.into(), value);
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.read().ok()?.get(name).cloned()
    }

    /// Removes the temporary directories this set owns. Best effort;
    /// failures are logged and skipped.
    pub fn cleanup(&mut self) {
        for path in self.cleanup_paths.drain(..) {
            if let Err(err) = std::fs::remove_dir_all(&path) {
                log::warn!("failed to clean up '{}': {err}", path.display());
            }
        }
    }
}

/// Loads card sets from a local path, a directory, a zip bundle or an
/// HTTP(S) location.
#[derive(Debug, Clone)]
pub struct CardLoader {
    resolver: FileResolver,
    limits: ScriptLimits,
    strict: bool,
    parser_config: ParserConfig,
}

impl Default for CardLoader {
    fn default() -> Self {
        Self {
            resolver: FileResolver::new(),
            limits: ScriptLimits::default(),
            strict: true,
            parser_config: ParserConfig::default(),
        }
    }
}

impl CardLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches template binding to lenient mode: recoverable binding
    /// problems are logged and skipped instead of failing the load.
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn with_limits(mut self, limits: ScriptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser_config = config;
        self
    }

    pub async fn load(&self, location: &str) -> CardResult<LoadedCardSet> {
        let path = ResourcePath::new(location);
        if path.is_local() {
            self.load_path(&path.absolute(None)).await
        } else {
            self.load_remote(&path).await
        }
    }

    async fn load_path(&self, path: &Path) -> CardResult<LoadedCardSet> {
        match determine_entry_point(path)? {
            EntryPoint::File(file) => self.load_definition(&file).await,
            EntryPoint::Archive(file) => self.load_archive(&file).await,
        }
    }

    async fn load_archive(&self, archive_file: &Path) -> CardResult<LoadedCardSet> {
        let guard = TempDirGuard::create()?;
        let source = archive_file.to_path_buf();
        let dest = guard.path().to_path_buf();
        tokio::task::spawn_blocking(move || archive::extract_zip(&source, &dest))
            .await
            .map_err(|err| CardError::Io(std::io::Error::other(err)))??;

        match determine_entry_point(guard.path())? {
            // The guard still owns the directory here, so the partial
            // extraction is removed on the error path.
            EntryPoint::Archive(nested) => Err(CardError::NestedArchive { path: nested }),
            EntryPoint::File(file) => {
                let mut set = self.load_definition(&file).await?;
                set.cleanup_paths.push(guard.keep());
                Ok(set)
            }
        }
    }

    async fn load_remote(&self, path: &ResourcePath) -> CardResult<LoadedCardSet> {
        let fetched = self.resolver.fetch(path).await?;

        let guard = TempDirGuard::create()?;
        let file_name = fetched.file_name.clone().unwrap_or_else(|| {
            let extension = extension_for_mime(fetched.mime_type.as_deref().unwrap_or(""));
            format!("download.{extension}")
        });
        let target = guard.path().join(&file_name);
        tokio::fs::write(&target, &fetched.bytes).await?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(CardError::ResourceNotFound { path: target });
        }

        let mut set = match classify_file(&target) {
            EntryPoint::Archive(file) => self.load_archive(&file).await?,
            EntryPoint::File(file) => self.load_definition(&file).await?,
        };
        set.cleanup_paths.push(guard.keep());
        Ok(set)
    }

    async fn load_definition(&self, entry_file: &Path) -> CardResult<LoadedCardSet> {
        let working_directory = entry_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let text = self
            .read_resource(&working_directory, &entry_file.to_string_lossy())
            .await?;
        let definition: CardSet = serde_json::from_str(&text)?;
        let root_context = definition.root_context()?;

        let mut shared_scripts = HashMap::new();
        for (name, reference) in &definition.resources.scripts {
            let source = self.read_resource(&working_directory, reference).await?;
            shared_scripts.insert(name.clone(), PreparedModule::new(name.clone(), source));
        }

        let variables = Arc::new(RwLock::new(HashMap::new()));

        let back_face = match &definition.back {
            Some(reference) => Some(
                self.load_face(
                    &working_directory,
                    reference,
                    &root_context,
                    &shared_scripts,
                    &variables,
                )
                .await?,
            ),
            None => None,
        };

        let mut front_faces = HashMap::new();
        for (variant, reference) in &definition.variants {
            let face = self
                .load_face(
                    &working_directory,
                    reference,
                    &root_context,
                    &shared_scripts,
                    &variables,
                )
                .await?;
            front_faces.insert(variant.clone(), face);
        }

        Ok(LoadedCardSet {
            definition,
            working_directory,
            entry_file: entry_file.to_path_buf(),
            back_face,
            front_faces,
            shared_scripts,
            variables,
            current_frame: 0,
            cleanup_paths: Vec::new(),
        })
    }

    /// Parses one face document: exactly one `<template>` root plus any
    /// number of `<script>` roots, of which at most one is the setup script.
    async fn load_face(
        &self,
        dir: &Path,
        reference: &str,
        root_context: &SizeContext,
        shared_scripts: &HashMap<String, PreparedModule>,
        variables: &Arc<RwLock<HashMap<String, Value>>>,
    ) -> CardResult<LoadedFace> {
        let markup = self.read_resource(dir, reference).await?;
        let roots = parse_template_with_config(&markup, &self.parser_config)?;

        let mut template_element: Option<&AstElement> = None;
        let mut setup_script: Option<PreparedModule> = None;
        let mut named_scripts: HashMap<String, PreparedModule> = HashMap::new();

        for root in &roots {
            if root.tag.eq_ignore_ascii_case("template") {
                if template_element.is_some() {
                    return Err(CardError::MultipleTemplates);
                }
                template_element = Some(root);
            } else if root.tag.eq_ignore_ascii_case("script") {
                let source = self.script_source(dir, root).await?;
                if is_setup_script(root) {
                    if setup_script.is_some() {
                        return Err(CardError::MultipleSetupScripts);
                    }
                    setup_script = Some(PreparedModule::new(SETUP_MODULE, source));
                } else {
                    let name = root
                        .attribute("name")
                        .map(|attr| attr.value_str().trim().to_string())
                        .filter(|name| !name.is_empty())
                        .ok_or(CardError::ScriptMissingName)?;
                    if named_scripts.contains_key(&name) || shared_scripts.contains_key(&name) {
                        return Err(CardError::DuplicateScriptName { name });
                    }
                    named_scripts.insert(name.clone(), PreparedModule::new(name, source));
                }
            } else {
                return Err(CtmlError::UnknownElement {
                    tag: root.tag.clone(),
                    line: root.position.line,
                    column: root.position.column,
                }
                .into());
            }
        }

        let template_element = template_element.ok_or(CardError::MissingTemplate)?;
        let raw_elements = template_element.child_elements().to_vec();
        let template = bind_template(&raw_elements, self.strict)?;

        // Malformed bound expressions fail the load, not the first render.
        for element in &template {
            for source in element.bound_expressions() {
                Expression::prepare(source)?;
            }
        }

        let runner = match &setup_script {
            Some(setup) => {
                let mut runner = ScriptRunner::new(self.limits.clone());
                for module in shared_scripts.values() {
                    runner.add_module(module.name.clone(), module.source.clone())?;
                }
                for module in named_scripts.values() {
                    runner.add_module(module.name.clone(), module.source.clone())?;
                }
                runner.add_module(setup.name.clone(), setup.source.clone())?;

                let host = Arc::new(HostContext {
                    context: root_context.clone(),
                    variables: Arc::clone(variables),
                });
                runner.add_host_module(SYSTEM_MODULE, system_module(host))?;
                runner.set_main(FACE_MAIN);
                Some(runner)
            }
            None => None,
        };

        Ok(LoadedFace {
            template,
            raw_elements,
            setup_script,
            named_scripts,
            runner,
        })
    }

    /// A script's source comes from its inline body first, then its `src`
    /// attribute.
    async fn script_source(&self, dir: &Path, element: &AstElement) -> CardResult<String> {
        if let Some(body) = element.text() {
            let trimmed = body.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        if let Some(attr) = element.attribute("src") {
            let reference = attr.value_str().trim();
            if !reference.is_empty() {
                return self.read_resource(dir, reference).await;
            }
        }
        Err(CardError::ScriptMissingSource)
    }

    async fn read_resource(&self, dir: &Path, reference: &str) -> CardResult<String> {
        let path = ResourcePath::new(reference);
        if path.is_local() {
            let fs_path = path.absolute(Some(dir));
            match tokio::fs::read(&fs_path).await {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(CardError::ResourceNotFound { path: fs_path })
                }
                Err(err) => Err(err.into()),
            }
        } else {
            let fetched = self.resolver.fetch(&path).await?;
            Ok(String::from_utf8_lossy(&fetched.bytes).into_owned())
        }
    }
}

fn is_setup_script(element: &AstElement) -> bool {
    element
        .attribute("setup")
        .map(|attr| match attr.kind {
            AstAttributeKind::BooleanFlag => true,
            _ => attr.value_str().trim().eq_ignore_ascii_case("true"),
        })
        .unwrap_or(false)
}

fn classify_file(path: &Path) -> EntryPoint {
    let is_archive = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if is_archive {
        EntryPoint::Archive(path.to_path_buf())
    } else {
        EntryPoint::File(path.to_path_buf())
    }
}

/// Finds the entry point at a location. Files are classified directly;
/// directories are searched for well-known entry names in order.
pub fn determine_entry_point(path: &Path) -> CardResult<EntryPoint> {
    if path.is_file() {
        return Ok(classify_file(path));
    }
    if path.is_dir() {
        for name in ENTRY_POINT_NAMES {
            for extension in ENTRY_POINT_EXTENSIONS {
                let candidate = path.join(format!("{name}.{extension}"));
                if candidate.is_file() {
                    return Ok(classify_file(&candidate));
                }
            }
        }
        return Err(CardError::EntryPointNotFound {
            path: path.to_path_buf(),
        });
    }
    Err(CardError::ResourceNotFound {
        path: path.to_path_buf(),
    })
}
