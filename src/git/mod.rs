//! Version-control driver
//!
//! The sync engine only sees the [`Vcs`] capability (four synchronous
//! primitives) and the [`Fetcher`] built on top of it, so tests can swap in
//! fakes that never spawn a process.

mod fetcher;

pub use fetcher::{FetchRequest, Fetcher, RepoFetcher};

use crate::types::DemodError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// The four git primitives the fetch protocol needs
pub trait Vcs: Send + Sync {
    /// Shallow, checkout-less, blob-filtered clone of `repo` into `workdir`
    fn clone_repo(&self, repo: &str, workdir: &Path) -> Result<(), DemodError>;

    /// Enable cone-mode sparse checkout
    fn sparse_checkout_init(&self, workdir: &Path) -> Result<(), DemodError>;

    /// Restrict the working tree to `paths`
    fn sparse_checkout_set(&self, workdir: &Path, paths: &[&str]) -> Result<(), DemodError>;

    /// Populate the working tree at `revision`
    fn checkout(&self, workdir: &Path, revision: &str) -> Result<(), DemodError>;
}

/// `Vcs` backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, in `workdir` when given, returning combined output.
    ///
    /// # Errors
    /// * `DemodError::Git` when git cannot start or exits unsuccessfully;
    ///   the captured stdout and stderr are included
    pub fn run<I, S>(&self, workdir: Option<&Path>, args: I) -> Result<String, DemodError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect();
        let subcommand = args.first().cloned().unwrap_or_default();
        debug!(cmd = %self.program.display(), args = ?args, "exec");

        let mut command = Command::new(&self.program);
        command.args(&args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| DemodError::Git {
            command: subcommand.clone(),
            status: "not started".to_string(),
            output: e.to_string(),
        })?;

        let mut message = String::from_utf8_lossy(&output.stdout).into_owned();
        message.push_str(&String::from_utf8_lossy(&output.stderr));
        let message = message.trim_end().to_string();

        if !output.status.success() {
            return Err(DemodError::Git {
                command: subcommand,
                status: output.status.to_string(),
                output: message,
            });
        }

        debug!(result = %message, "output");
        Ok(message)
    }
}

impl Vcs for GitCli {
    fn clone_repo(&self, repo: &str, workdir: &Path) -> Result<(), DemodError> {
        let workdir = workdir.to_string_lossy().into_owned();
        self.run(
            None,
            [
                "clone",
                "--filter=blob:none",
                "--no-checkout",
                "--depth",
                "1",
                repo,
                workdir.as_str(),
            ],
        )
        .map(drop)
    }

    fn sparse_checkout_init(&self, workdir: &Path) -> Result<(), DemodError> {
        self.run(Some(workdir), ["sparse-checkout", "init", "--cone"])
            .map(drop)
    }

    fn sparse_checkout_set(&self, workdir: &Path, paths: &[&str]) -> Result<(), DemodError> {
        let args = ["sparse-checkout", "set"].into_iter().chain(paths.iter().copied());
        self.run(Some(workdir), args).map(drop)
    }

    fn checkout(&self, workdir: &Path, revision: &str) -> Result<(), DemodError> {
        match self.run(Some(workdir), ["checkout", revision]) {
            Ok(_) => Ok(()),
            Err(checkout_err) => {
                // Tags, other branches, and older commits are not in the depth-1 clone.
                debug!(revision, error = %checkout_err, "revision not in shallow clone, fetching it");
                self.run(Some(workdir), ["fetch", "--depth", "1", "origin", revision])
                    .and_then(|_| self.run(Some(workdir), ["checkout", "FETCH_HEAD"]))
                    .map(drop)
                    .map_err(|fallback_err| with_fallback(checkout_err, fallback_err))
            }
        }
    }
}

/// Keep the first checkout failure as the error, with the fallback's
/// failure appended to its output.
fn with_fallback(first: DemodError, fallback: DemodError) -> DemodError {
    match first {
        DemodError::Git {
            command,
            status,
            output,
        } => DemodError::Git {
            command,
            status,
            output: format!("{}\nthen {}", output, fallback),
        },
        other => other,
    }
}
