//! Error types for demod

use super::FetchStage;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for demod operations
#[derive(Debug, Error)]
pub enum DemodError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (version, missing fields, unsafe paths)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exclude glob that failed to compile
    #[error("invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A git invocation exited unsuccessfully
    #[error("git {command} failed ({status}):\n{output}")]
    Git {
        command: String,
        status: String,
        output: String,
    },

    /// One stage of the fetch protocol failed
    #[error("{stage}: {source}")]
    Fetch {
        stage: FetchStage,
        #[source]
        source: Box<DemodError>,
    },

    /// Filesystem failure while materializing a path
    #[error("copying {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to clear the module destination before copying
    #[error("removing dest {path}: {source}")]
    RemoveDest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Module skipped because a sibling module already failed
    #[error("skipped: another module already failed")]
    Cancelled,

    /// Worker task panicked or could not be joined
    #[error("sync task failed: {0}")]
    Task(String),

    /// Error attributed to a named module
    #[error("[{module}] {source}")]
    Module {
        module: String,
        #[source]
        source: Box<DemodError>,
    },
}

impl DemodError {
    /// Attribute this error to a module, keeping an existing attribution.
    pub fn in_module(self, module: &str) -> Self {
        match self {
            DemodError::Module { .. } => self,
            other => DemodError::Module {
                module: module.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Wrap this error with the fetch stage that produced it.
    pub fn at_stage(self, stage: FetchStage) -> Self {
        DemodError::Fetch {
            stage,
            source: Box::new(self),
        }
    }

    /// Name of the module this error is attributed to, if any
    pub fn module_name(&self) -> Option<&str> {
        match self {
            DemodError::Module { module, .. } => Some(module),
            _ => None,
        }
    }

    /// The error without its module attribution
    pub fn root(&self) -> &DemodError {
        match self {
            DemodError::Module { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is a sibling-failure cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self.root(), DemodError::Cancelled)
    }

    /// Check if this error is a configuration-level failure
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.root(),
            DemodError::Config(_) | DemodError::InvalidPattern { .. }
        )
    }

    /// Check if this error came from the VCS fetch protocol
    pub fn is_fetch_error(&self) -> bool {
        matches!(self.root(), DemodError::Fetch { .. } | DemodError::Git { .. })
    }

    /// Check if this error came from materializing files
    pub fn is_copy_error(&self) -> bool {
        matches!(
            self.root(),
            DemodError::Copy { .. } | DemodError::RemoveDest { .. }
        )
    }

    /// Short label used to group errors in summaries
    pub fn kind_label(&self) -> &'static str {
        match self.root() {
            DemodError::Io(_) => "I/O error",
            DemodError::Config(_) | DemodError::InvalidPattern { .. } => "Configuration error",
            DemodError::Git { .. } | DemodError::Fetch { .. } => "Fetch error",
            DemodError::Copy { .. } | DemodError::RemoveDest { .. } => "Copy error",
            DemodError::Cancelled => "Cancelled",
            DemodError::Task(_) => "Task failure",
            DemodError::Module { .. } => "Module error",
        }
    }
}
