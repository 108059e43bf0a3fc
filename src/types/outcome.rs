//! Per-module results and the aggregate report

use super::DemodError;
use std::fmt;
use std::path::PathBuf;

/// One (source, destination) pair of a module's copy plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    /// Repository-relative source path
    pub src: PathBuf,

    /// Module destination joined with the effective destination path
    pub dest: PathBuf,

    /// Exclude patterns applied while copying
    pub exclude: Vec<String>,
}

impl fmt::Display for PlannedCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src.display(), self.dest.display())?;
        if !self.exclude.is_empty() {
            write!(f, " (exclude: {})", self.exclude.join(", "))?;
        }
        Ok(())
    }
}

/// Counters for what a live copy wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub symlinks: usize,
    pub bytes: u64,
}

impl CopyStats {
    pub fn merge(&mut self, other: CopyStats) {
        self.files += other.files;
        self.symlinks += other.symlinks;
        self.bytes += other.bytes;
    }
}

/// Successful result of one module sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleReport {
    pub planned_copies: Vec<PlannedCopy>,
    pub stats: CopyStats,
}

/// Outcome of one module within a coordinated run
#[derive(Debug)]
pub struct SyncOutcome {
    pub module: String,
    pub error: Option<DemodError>,
    pub planned_copies: Vec<PlannedCopy>,
    pub stats: CopyStats,
    /// Position in which this module finished (0 = first)
    pub completion: usize,
}

impl SyncOutcome {
    pub fn from_result(
        module: String,
        result: Result<ModuleReport, DemodError>,
        completion: usize,
    ) -> Self {
        match result {
            Ok(report) => Self {
                module,
                error: None,
                planned_copies: report.planned_copies,
                stats: report.stats,
                completion,
            },
            Err(error) => Self {
                module,
                error: Some(error),
                planned_copies: Vec::new(),
                stats: CopyStats::default(),
                completion,
            },
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of every module in a config, in config order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SyncOutcome::success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success())
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.success()).count()
    }

    pub fn total_stats(&self) -> CopyStats {
        let mut total = CopyStats::default();
        for outcome in &self.outcomes {
            total.merge(outcome.stats);
        }
        total
    }

    /// The first error by completion order, if any module failed.
    pub fn first_error(&self) -> Option<&DemodError> {
        self.failed()
            .min_by_key(|outcome| outcome.completion)
            .and_then(|outcome| outcome.error.as_ref())
    }

    /// Collapse into the single error a caller sees, or the outcomes on success.
    pub fn into_result(self) -> Result<Vec<SyncOutcome>, DemodError> {
        let first = self
            .outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| !outcome.success())
            .min_by_key(|(_, outcome)| outcome.completion)
            .map(|(index, _)| index);

        match first {
            None => Ok(self.outcomes),
            Some(index) => {
                let mut outcomes = self.outcomes;
                let outcome = outcomes.swap_remove(index);
                Err(outcome
                    .error
                    .unwrap_or_else(|| DemodError::Task("missing module error".to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(module: &str, completion: usize) -> SyncOutcome {
        SyncOutcome::from_result(
            module.to_string(),
            Err(DemodError::Config(format!("{module} broke")).in_module(module)),
            completion,
        )
    }

    fn succeeded(module: &str, completion: usize) -> SyncOutcome {
        SyncOutcome::from_result(module.to_string(), Ok(ModuleReport::default()), completion)
    }

    #[test]
    fn test_into_result_returns_first_error_by_completion() {
        let report = SyncReport {
            outcomes: vec![failed("a", 2), succeeded("b", 0), failed("c", 1)],
        };

        assert!(!report.is_success());
        assert_eq!(report.succeeded_count(), 1);
        assert_eq!(
            report.first_error().and_then(DemodError::module_name),
            Some("c")
        );

        let error = report.into_result().expect_err("report has failures");
        assert_eq!(error.module_name(), Some("c"));
    }

    #[test]
    fn test_into_result_success_keeps_config_order() {
        let report = SyncReport {
            outcomes: vec![succeeded("a", 1), succeeded("b", 0)],
        };
        let outcomes = report.into_result().expect("all modules succeeded");
        let names: Vec<_> = outcomes.iter().map(|o| o.module.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_total_stats_sums_modules() {
        let mut a = succeeded("a", 0);
        a.stats = CopyStats { files: 2, symlinks: 1, bytes: 10 };
        let mut b = succeeded("b", 1);
        b.stats = CopyStats { files: 3, symlinks: 0, bytes: 5 };

        let report = SyncReport { outcomes: vec![a, b] };
        assert_eq!(
            report.total_stats(),
            CopyStats { files: 5, symlinks: 1, bytes: 15 }
        );
    }

    #[test]
    fn test_planned_copy_display() {
        let copy = PlannedCopy {
            src: PathBuf::from("lib"),
            dest: PathBuf::from("vendor/foo/vendor/lib"),
            exclude: vec!["**/*.md".to_string()],
        };
        assert_eq!(
            copy.to_string(),
            "lib -> vendor/foo/vendor/lib (exclude: **/*.md)"
        );
    }
}
