//! Path mapping: turns a module's path specs into concrete copy rules
//!
//! Everything here is pure. Exclude globs use relative-path semantics:
//! `*` and `?` stop at `/`, `**` spans any number of segments, and a
//! trailing `/**` also matches the directory it names.

use crate::config::{Module, PathSpec};
use crate::types::{DemodError, PlannedCopy};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};

/// Compiled exclusion predicate for one path spec
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
    patterns: Vec<String>,
}

impl ExcludeMatcher {
    /// Compile a list of glob patterns
    ///
    /// # Errors
    /// * `DemodError::InvalidPattern` naming the first pattern that fails to compile
    pub fn new(patterns: &[String]) -> Result<Self, DemodError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(compile_glob(pattern, pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**") {
                if !dir.is_empty() {
                    builder.add(compile_glob(dir, pattern)?);
                }
            }
        }

        let set = builder.build().map_err(|source| DemodError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            set,
            patterns: patterns.to_vec(),
        })
    }

    /// Matcher that excludes nothing
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// True if `relative` (relative to the path spec's source root) matches any pattern
    pub fn is_excluded(&self, relative: &Path) -> bool {
        !self.set.is_empty() && self.set.is_match(relative)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn compile_glob(glob: &str, pattern: &str) -> Result<Glob, DemodError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map_err(|source| DemodError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Concrete copy rule derived from a `PathSpec`
#[derive(Debug, Clone)]
pub struct PathMapping {
    /// Cleaned repository-relative source path
    pub src: PathBuf,

    /// Cleaned destination path relative to the module dest
    pub dest_base: PathBuf,

    pub exclude: ExcludeMatcher,
}

impl PathMapping {
    /// Location of the source inside a checked-out workspace
    pub fn source_root(&self, workdir: &Path) -> PathBuf {
        join_under(workdir, &self.src)
    }

    /// The (src, dest) pair this mapping produces under `dest`
    pub fn planned_copy(&self, dest: &Path) -> PlannedCopy {
        PlannedCopy {
            src: self.src.clone(),
            dest: join_under(dest, &self.dest_base),
            exclude: self.exclude.patterns().to_vec(),
        }
    }
}

/// Map a single path spec
pub fn map_path_spec(spec: &PathSpec) -> Result<PathMapping, DemodError> {
    Ok(PathMapping {
        src: clean_path(&spec.src),
        dest_base: clean_path(spec.effective_dest()),
        exclude: ExcludeMatcher::new(&spec.exclude)?,
    })
}

/// Map every path spec of a module, in declaration order
pub fn plan_module(module: &Module) -> Result<Vec<PathMapping>, DemodError> {
    module.paths.iter().map(map_path_spec).collect()
}

/// Lexically clean a path: drop `.` segments, fold `name/..` pairs, and
/// return `.` for an empty result. Leading `..` segments are kept so callers
/// can detect traversal; `..` directly under a root is dropped.
pub fn clean_path(path: impl AsRef<Path>) -> PathBuf {
    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;

    for component in path.as_ref().components() {
        match component {
            Component::Prefix(_) | Component::RootDir => cleaned.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    cleaned.pop();
                    depth -= 1;
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            Component::Normal(part) => {
                cleaned.push(part);
                depth += 1;
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// True if a cleaned path climbs above its starting directory
pub fn escapes_root(cleaned: &Path) -> bool {
    matches!(cleaned.components().next(), Some(Component::ParentDir))
}

/// Join only the normal segments of `relative` onto `root`.
pub fn join_under(root: &Path, relative: &Path) -> PathBuf {
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }
    joined
}
