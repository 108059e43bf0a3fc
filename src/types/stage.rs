//! Pipeline stages used for progress events and error attribution

use std::fmt;

/// States of a single module sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Acquiring a workspace and fetching the sparse checkout
    Fetching,
    /// Turning path specs into concrete mappings
    Mapping,
    /// Reporting the plan without touching the destination
    DryRunReport,
    /// Removing the existing destination tree
    Replacing,
    /// Materializing path specs under the destination
    Copying,
    /// Finished successfully
    Done,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Fetching => "fetching",
            SyncStage::Mapping => "mapping",
            SyncStage::DryRunReport => "dry-run",
            SyncStage::Replacing => "replacing",
            SyncStage::Copying => "copying",
            SyncStage::Done => "done",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps of the sparse fetch protocol, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Clone,
    SparseInit,
    SparseSet,
    Checkout,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchStage::Clone => "clone",
            FetchStage::SparseInit => "sparse-checkout init",
            FetchStage::SparseSet => "sparse-checkout set",
            FetchStage::Checkout => "checkout",
        };
        f.write_str(label)
    }
}
