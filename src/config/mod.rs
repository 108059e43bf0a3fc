//! Configuration management
//!
//! A config file declares the modules to vendor. Loading is a pure
//! parse-then-validate step; the sync engine trusts every invariant checked
//! here and does not re-validate.

pub mod cli;

pub use cli::{Cli, Command, LogFormat, SyncArgs};

use crate::mapper::{clean_path, escapes_root};
use crate::types::DemodError;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The only supported schema generation
pub const SUPPORTED_VERSION: u32 = 1;

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "demod.toml";

/// Top-level config file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Schema version (missing or 0 means 1)
    #[serde(default)]
    pub version: u32,

    /// Optional root every module `dest` is joined onto
    #[serde(default)]
    pub dest_root: Option<PathBuf>,

    /// Modules in declaration order
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// One named unit of vendored content
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Module {
    #[serde(default)]
    pub name: String,

    /// Repository URL or local path
    #[serde(default)]
    pub repo: String,

    /// Branch, tag, or commit
    #[serde(default)]
    pub revision: String,

    /// Destination directory, fully owned by this module
    #[serde(default)]
    pub dest: PathBuf,

    #[serde(default)]
    pub paths: Vec<PathSpec>,
}

/// One source-to-destination mapping rule within a module
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PathSpec {
    /// Repository-relative source path
    #[serde(default)]
    pub src: String,

    /// Rename target (`as` in the config file); empty means `src`
    #[serde(default, rename = "as")]
    pub rename: String,

    /// Glob patterns relative to `src`
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl PathSpec {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Self::default()
        }
    }

    pub fn with_rename(mut self, rename: impl Into<String>) -> Self {
        self.rename = rename.into();
        self
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// `as` if set, otherwise `src`
    pub fn effective_dest(&self) -> &str {
        if self.rename.is_empty() {
            &self.src
        } else {
            &self.rename
        }
    }
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        repo: impl Into<String>,
        revision: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            revision: revision.into(),
            dest: dest.into(),
            paths: Vec::new(),
        }
    }

    pub fn with_path(mut self, spec: PathSpec) -> Self {
        self.paths.push(spec);
        self
    }

    /// Source paths handed to sparse checkout, in declaration order
    pub fn src_paths(&self) -> Vec<&str> {
        self.paths.iter().map(|p| p.src.as_str()).collect()
    }
}

impl Config {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, DemodError> {
        let content = fs::read_to_string(path).map_err(|e| {
            DemodError::Config(format!("reading config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text
    pub fn from_toml_str(content: &str) -> Result<Self, DemodError> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| DemodError::Config(format!("parsing config: {}", e)))?;
        config.validate()?;
        config.resolve_dest_root();
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&mut self) -> Result<(), DemodError> {
        if self.version == 0 {
            self.version = SUPPORTED_VERSION;
        }
        if self.version != SUPPORTED_VERSION {
            return Err(DemodError::Config(format!(
                "unsupported config version: {} (expected {})",
                self.version, SUPPORTED_VERSION
            )));
        }

        for (i, module) in self.modules.iter().enumerate() {
            validate_module(i, module)?;
        }

        Ok(())
    }

    fn resolve_dest_root(&mut self) {
        let Some(root) = self.dest_root.as_deref() else {
            return;
        };
        if root.as_os_str().is_empty() {
            return;
        }
        for module in &mut self.modules {
            module.dest = clean_path(root.join(strip_root(&module.dest)));
        }
    }
}

fn validate_module(i: usize, module: &Module) -> Result<(), DemodError> {
    if module.name.is_empty() {
        return Err(DemodError::Config(format!("modules[{}]: name is required", i)));
    }

    let required = |field: &str| {
        DemodError::Config(format!(
            "modules[{}] ({}): {} is required",
            i, module.name, field
        ))
    };
    if module.repo.is_empty() {
        return Err(required("repo"));
    }
    if module.revision.is_empty() {
        return Err(required("revision"));
    }
    if module.dest.as_os_str().is_empty() {
        return Err(required("dest"));
    }
    if module.paths.is_empty() {
        return Err(required("paths"));
    }

    let mut seen: HashSet<PathBuf> = HashSet::new();
    for (j, spec) in module.paths.iter().enumerate() {
        if spec.src.is_empty() {
            return Err(required(&format!("paths[{}].src", j)));
        }

        if escapes_root(&clean_path(&spec.src)) {
            return Err(DemodError::Config(format!(
                "modules[{}] ({}): paths[{}] has invalid src path {:?}: path traversal is not allowed",
                i, module.name, j, spec.src
            )));
        }

        let dest_path = spec.effective_dest();
        let cleaned = clean_path(dest_path);
        if escapes_root(&cleaned) {
            return Err(DemodError::Config(format!(
                "modules[{}] ({}): paths[{}] has invalid dest path {:?}: path traversal is not allowed",
                i, module.name, j, dest_path
            )));
        }

        if !seen.insert(strip_root(&cleaned)) {
            return Err(DemodError::Config(format!(
                "modules[{}] ({}): duplicate dest path {:?} in paths",
                i,
                module.name,
                cleaned.display().to_string()
            )));
        }
    }

    Ok(())
}

/// Drop any root or prefix so the path joins underneath another one.
fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::RootDir | std::path::Component::Prefix(_)))
        .collect()
}
