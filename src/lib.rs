//! # demod - Declarative git module synchronizer
//!
//! Vendors slices of upstream git repositories into a local tree. A config
//! file names each module's repository, revision, and the sub-paths to copy
//! (with optional rename and exclude globs); `sync` fetches each module with
//! a shallow sparse checkout and replaces its destination with a filtered
//! copy.

// Module declarations
pub mod config;
pub mod mapper;
pub mod executor;
pub mod git;
pub mod sync;
pub mod ui;
pub mod commands;
pub mod types;

// Re-export commonly used types
pub use types::{DemodError, SyncOutcome, SyncReport};
pub use config::{Config, Module, PathSpec};
pub use sync::{sync_all, SyncOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
