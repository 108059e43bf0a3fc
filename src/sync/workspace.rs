//! Ephemeral per-module workspace

use crate::types::DemodError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{trace, warn};

const WORKSPACE_PREFIX: &str = "demod-";
const CHECKOUT_DIR: &str = "repo";

/// Private temporary directory holding one module's sparse checkout.
///
/// The directory is removed when the workspace is released or dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace in the system temp directory
    pub fn acquire() -> Result<Self, DemodError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        trace!(path = %dir.path().display(), "workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the checkout goes; not created until the fetch clones into it
    pub fn repo_dir(&self) -> PathBuf {
        self.dir.path().join(CHECKOUT_DIR)
    }

    /// Remove the workspace, logging instead of failing if cleanup breaks.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => trace!(path = %path.display(), "workspace released"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove workspace"),
        }
    }
}
