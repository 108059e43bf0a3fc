//! Core type definitions for demod

mod error;
mod outcome;
mod stage;

pub use error::DemodError;
pub use outcome::{CopyStats, ModuleReport, PlannedCopy, SyncOutcome, SyncReport};
pub use stage::{FetchStage, SyncStage};
