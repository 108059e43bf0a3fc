//! Sync engine
//!
//! [`ModuleSyncer`] runs one module end to end; [`SyncCoordinator`] fans the
//! modules of a config out over a blocking thread pool and gathers a
//! [`SyncReport`](crate::types::SyncReport).

mod coordinator;
mod module;
mod workspace;

pub use coordinator::SyncCoordinator;
pub use module::ModuleSyncer;
pub use workspace::Workspace;

use crate::config::Config;
use crate::git::{GitCli, RepoFetcher};
use crate::types::{DemodError, SyncStage};

/// Knobs for a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Report the plan without touching any destination
    pub dry_run: bool,

    /// Upper bound on modules synced at once; `None` means one per module
    pub jobs: Option<usize>,
}

/// Events emitted while syncing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A module entered a new stage
    Stage { module: String, stage: SyncStage },

    /// A module finished, successfully or not
    ModuleFinished { module: String, success: bool },

    /// Every module has finished
    Complete { succeeded: usize, failed: usize },
}

/// Optional callback used to receive sync events.
pub type SyncCallback = dyn Fn(&SyncEvent) + Send + Sync;

/// Sync every module in `config` with the git CLI.
///
/// # Errors
/// Returns the first module failure by completion order. Modules that had
/// not started when it happened fail with a cancellation error.
pub fn sync_all(config: &Config, options: &SyncOptions) -> Result<(), DemodError> {
    let coordinator = SyncCoordinator::new(RepoFetcher::new(GitCli::default()), options.clone());
    coordinator.run(config)?.into_result().map(drop)
}

fn emit_event(on_event: Option<&SyncCallback>, event: SyncEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}
