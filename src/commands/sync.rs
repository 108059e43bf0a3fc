//! Main sync command

use crate::git::{Fetcher, GitCli, RepoFetcher};
use crate::sync::{SyncCoordinator, SyncEvent, SyncOptions};
use crate::types::{DemodError, SyncReport};
use crate::ui::ProgressReporter;
use crate::Config;
use indicatif::HumanBytes;
use std::collections::BTreeMap;

/// Run the sync operation with the git CLI
pub fn run(
    config: &Config,
    options: &SyncOptions,
    reporter: ProgressReporter,
) -> Result<(), DemodError> {
    run_with(config, options, RepoFetcher::new(GitCli::default()), reporter)
}

/// Run the sync operation with any fetcher.
///
/// Prints the dry-run plan or a sync summary to stdout and, when any module
/// failed, an error summary to stderr. Returns the first module failure.
pub fn run_with<F: Fetcher + 'static>(
    config: &Config,
    options: &SyncOptions,
    fetcher: F,
    mut reporter: ProgressReporter,
) -> Result<(), DemodError> {
    reporter.start(config.modules.len() as u64);

    let progress_cb = {
        let reporter = reporter.clone();
        move |event: &SyncEvent| match event {
            SyncEvent::Stage { module, stage } => reporter.set_stage(module, *stage),
            SyncEvent::ModuleFinished { module, success } => {
                reporter.finish_module(module, *success)
            }
            SyncEvent::Complete { succeeded, failed } => reporter.finish(*succeeded, *failed),
        }
    };

    let report = SyncCoordinator::new(fetcher, options.clone())
        .with_callback(progress_cb)
        .run(config)?;

    if options.dry_run {
        println!("{}", format_dry_run_plan(&report));
        println!("Dry-run mode: no changes were made.");
    } else if report.is_success() {
        println!("{}", format_sync_summary(&report));
    }

    if !report.is_success() {
        eprintln!("{}", format_error_summary(&report));
    }

    report.into_result().map(drop)
}

fn format_dry_run_plan(report: &SyncReport) -> String {
    if report.outcomes.is_empty() {
        return "Dry-run plan:\n  (no modules configured)".to_string();
    }

    let mut lines = vec!["Dry-run plan:".to_string()];
    for outcome in &report.outcomes {
        lines.push(format!("  {}", outcome.module));
        if !outcome.success() {
            lines.push("    (failed)".to_string());
            continue;
        }
        if outcome.planned_copies.is_empty() {
            lines.push("    (no planned copies)".to_string());
        }
        for copy in &outcome.planned_copies {
            lines.push(format!("    COPY  {}", copy));
        }
    }
    lines.join("\n")
}

fn format_sync_summary(report: &SyncReport) -> String {
    let stats = report.total_stats();
    format!(
        "Synced {} module(s): {} files, {} symlinks | {}",
        report.succeeded_count(),
        stats.files,
        stats.symlinks,
        HumanBytes(stats.bytes)
    )
}

fn format_error_summary(report: &SyncReport) -> String {
    let mut groups: BTreeMap<&'static str, Vec<(&str, &DemodError)>> = BTreeMap::new();
    for outcome in report.failed() {
        if let Some(error) = &outcome.error {
            groups
                .entry(error.kind_label())
                .or_default()
                .push((outcome.module.as_str(), error));
        }
    }

    let mut lines = vec!["Error summary:".to_string()];
    for (kind, items) in groups {
        lines.push(format!("  {} ({}):", kind, items.len()));
        for (module, error) in items.iter().take(3) {
            lines.push(format!("    - {}: {}", module, first_line(error.root())));
            if let Some(suggestion) = suggestion(error) {
                lines.push(format!("      Try: {}", suggestion));
            }
        }
        if items.len() > 3 {
            lines.push(format!("    - ... {} more", items.len() - 3));
        }
    }
    lines.join("\n")
}

fn first_line(error: &DemodError) -> String {
    let message = error.to_string();
    message.lines().next().unwrap_or_default().to_string()
}

fn suggestion(error: &DemodError) -> Option<&'static str> {
    if error.is_config_error() {
        Some("Fix the module definition in the config file.")
    } else if error.is_fetch_error() {
        Some("Check the repository URL, the revision, and network access. Run with -v to see git output.")
    } else if error.is_copy_error() {
        Some("Check permissions and free space under the destination.")
    } else {
        None
    }
}
